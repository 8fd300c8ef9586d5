//! Common errors

use std::{error::Error as StdError, fmt};

use thiserror::Error;

/// Obtaining an up-to-date token failed
///
/// The cached tokens are left as they were before the attempt.
#[derive(Debug, Error)]
#[error("refresh failed")]
pub struct RefreshError {
    #[from]
    source: RefreshTokensError,
}

impl RefreshError {
    /// The reason the refresh failed
    pub fn reason(&self) -> &RefreshTokensError {
        &self.source
    }
}

/// An error while exchanging the refresh token for new tokens
#[derive(Debug, Error)]
pub enum RefreshTokensError {
    /// The identity provider rejected the exchange or could not be reached
    #[error("token exchange failed")]
    Exchange {
        /// The error reported by the refresher
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },

    /// The exchange succeeded but returned no authentication result
    #[error("refresh response has no AuthenticationResult")]
    MissingAuthenticationResult,

    /// The authentication result did not include an access token
    #[error("refresh response has no AccessToken")]
    MissingAccessToken,

    /// The authentication result did not include an ID token
    #[error("refresh response has no IdToken")]
    MissingIdToken,
}

impl RefreshTokensError {
    pub(crate) fn exchange(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self::Exchange {
            source: source.into(),
        }
    }

    /// Whether the identity provider returned a response missing required fields
    pub fn is_malformed_response(&self) -> bool {
        !matches!(self, Self::Exchange { .. })
    }
}

/// A structured error reported by the identity provider
///
/// The error that caused a client-side failure, such as a refused connection, is
/// kept as data in [`original_error()`][ServiceError::original_error] and is
/// *not* exposed through [`source()`][StdError::source]. Use
/// [`classify::is_network_error()`][crate::classify::is_network_error] to look
/// through it.
pub struct ServiceError {
    code: String,
    message: String,
    original: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ServiceError {
    /// The refresh token is invalid, revoked or expired, or the client is not allowed the flow
    pub const NOT_AUTHORIZED: &'static str = "NotAuthorizedException";
    /// The user the refresh token belongs to no longer exists
    pub const USER_NOT_FOUND: &'static str = "UserNotFoundException";
    /// The request was throttled
    pub const TOO_MANY_REQUESTS: &'static str = "TooManyRequestsException";
    /// The user pool or app client does not exist
    pub const RESOURCE_NOT_FOUND: &'static str = "ResourceNotFoundException";
    /// The request was malformed
    pub const INVALID_PARAMETER: &'static str = "InvalidParameterException";
    /// The identity provider failed internally
    pub const INTERNAL_ERROR: &'static str = "InternalErrorException";
    /// The request could not be sent
    pub const REQUEST_ERROR: &'static str = "RequestError";
    /// The response could not be read or decoded
    pub const SERIALIZATION_ERROR: &'static str = "SerializationError";
    /// The provider returned an error body that could not be understood
    pub const UNKNOWN_ERROR: &'static str = "UnknownError";

    /// Constructs a provider error with no original cause
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            original: None,
        }
    }

    /// Constructs a provider error that records the error that caused it
    pub fn with_original(
        code: impl Into<String>,
        message: impl Into<String>,
        original: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            original: Some(original.into()),
        }
    }

    /// The machine-readable error code, such as `NotAuthorizedException`
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error that caused this one, if any
    pub fn original_error(&self) -> Option<&(dyn StdError + 'static)> {
        self.original
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }

    /// Whether this error carries the given code
    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Debug for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ServiceError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("original", &self.original)
            .finish()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(original) = &self.original {
            write!(f, "\ncaused by: {}", original)?;
        }
        Ok(())
    }
}

impl StdError for ServiceError {}

/// The cache could not be built from its configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The identity provider endpoint could not be derived
    #[error("invalid identity provider endpoint '{endpoint}'")]
    InvalidEndpoint {
        /// The offending endpoint
        endpoint: String,
        /// Why the endpoint was rejected
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

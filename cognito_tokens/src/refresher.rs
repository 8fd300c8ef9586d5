//! The refresh exchange

use std::error;

use async_trait::async_trait;
use cognito_clock::DurationSecs;
use serde::{Deserialize, Serialize, Serializer};

use crate::{AccessToken, ClientIdRef, IdToken, RefreshToken, RefreshTokenRef};

#[cfg(feature = "cognito")]
pub mod cognito;

/// The authentication flow requested from the identity provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum AuthFlow {
    /// Exchanges a refresh token for new access and ID tokens
    RefreshTokenAuth,
}

impl AuthFlow {
    /// The wire name of the flow
    pub const fn as_str(self) -> &'static str {
        match self {
            AuthFlow::RefreshTokenAuth => "REFRESH_TOKEN_AUTH",
        }
    }
}

/// A request to exchange a refresh token for new tokens
#[derive(Clone, Copy, Debug)]
pub struct RefreshRequest<'a> {
    /// The flow to perform; always [`AuthFlow::RefreshTokenAuth`] when issued by the cache
    pub auth_flow: AuthFlow,

    /// The app client the tokens were issued to
    pub client_id: &'a ClientIdRef,

    /// The refresh token to exchange
    pub refresh_token: &'a RefreshTokenRef,
}

impl<'a> RefreshRequest<'a> {
    /// Constructs a refresh token exchange request
    pub fn new(client_id: &'a ClientIdRef, refresh_token: &'a RefreshTokenRef) -> Self {
        Self {
            auth_flow: AuthFlow::RefreshTokenAuth,
            client_id,
            refresh_token,
        }
    }
}

impl Serialize for RefreshRequest<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        #[derive(Serialize)]
        struct AuthParameters<'a> {
            #[serde(rename = "REFRESH_TOKEN")]
            refresh_token: &'a RefreshTokenRef,
        }

        let mut ser = serializer.serialize_struct("InitiateAuthRequest", 3)?;
        ser.serialize_field("AuthFlow", &self.auth_flow)?;
        ser.serialize_field("ClientId", self.client_id)?;
        ser.serialize_field(
            "AuthParameters",
            &AuthParameters {
                refresh_token: self.refresh_token,
            },
        )?;
        ser.end()
    }
}

/// The outcome of a successful exchange
///
/// Every field is optional on the wire. The cache treats a missing
/// authentication result, access token or ID token as a contract violation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RefreshResponse {
    /// The issued tokens
    #[serde(default)]
    pub authentication_result: Option<AuthenticationResult>,
}

impl RefreshResponse {
    /// Constructs a response carrying a new access and ID token
    pub fn with_tokens(access_token: AccessToken, id_token: IdToken) -> Self {
        Self {
            authentication_result: Some(AuthenticationResult {
                access_token: Some(access_token),
                id_token: Some(id_token),
                ..AuthenticationResult::default()
            }),
        }
    }
}

/// Tokens issued by the identity provider
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthenticationResult {
    /// The new access token
    #[serde(default)]
    pub access_token: Option<AccessToken>,

    /// The new ID token
    #[serde(default)]
    pub id_token: Option<IdToken>,

    /// A rotated refresh token
    ///
    /// Cognito does not rotate refresh tokens in this flow, and the cache
    /// keeps its original refresh token regardless.
    #[serde(default)]
    pub refresh_token: Option<RefreshToken>,

    /// Lifetime of the new tokens
    #[serde(default)]
    pub expires_in: Option<DurationSecs>,

    /// Token type, normally `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Performs the refresh exchange against the identity provider
///
/// Implementations own any timeout or cancellation policy for the exchange. The
/// cache performs exactly one call per refresh and never retries.
#[async_trait]
pub trait Refresher: Send + Sync {
    /// The error type returned when the exchange fails
    type Error: error::Error + Send + Sync + 'static;

    /// Exchanges a refresh token for new tokens
    async fn refresh(&self, request: &RefreshRequest<'_>) -> Result<RefreshResponse, Self::Error>;
}

#[async_trait]
impl<T: Refresher + ?Sized> Refresher for std::sync::Arc<T> {
    type Error = T::Error;

    async fn refresh(&self, request: &RefreshRequest<'_>) -> Result<RefreshResponse, Self::Error> {
        (**self).refresh(request).await
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::{ClientId, RefreshToken};

    #[test]
    fn serializes_initiate_auth_body() -> Result<()> {
        let client_id = ClientId::from_static("1234");
        let refresh_token = RefreshToken::from_static("refresh_token");
        let request = RefreshRequest::new(&client_id, &refresh_token);

        let body = serde_json::to_value(request)?;
        assert_eq!(
            body,
            serde_json::json!({
                "AuthFlow": "REFRESH_TOKEN_AUTH",
                "ClientId": "1234",
                "AuthParameters": { "REFRESH_TOKEN": "refresh_token" },
            })
        );
        Ok(())
    }

    #[test]
    fn deserializes_authentication_result() -> Result<()> {
        const DATA: &str = r#"{
            "AuthenticationResult": {
                "AccessToken": "access",
                "IdToken": "id",
                "ExpiresIn": 3600,
                "TokenType": "Bearer"
            },
            "ChallengeParameters": {}
        }"#;

        let resp: RefreshResponse = serde_json::from_str(DATA)?;
        let result = resp.authentication_result.unwrap_or_default();
        assert_eq!(result.access_token.as_deref().map(|t| t.as_str()), Some("access"));
        assert_eq!(result.id_token.as_deref().map(|t| t.as_str()), Some("id"));
        assert_eq!(result.expires_in, Some(DurationSecs(3600)));
        assert!(result.refresh_token.is_none());
        Ok(())
    }

    #[test]
    fn missing_result_deserializes_to_none() -> Result<()> {
        let resp: RefreshResponse = serde_json::from_str(r#"{"ChallengeName":"MFA"}"#)?;
        assert!(resp.authentication_result.is_none());
        Ok(())
    }

    #[test]
    fn flow_wire_name_matches_serialization() -> Result<()> {
        let flow = AuthFlow::RefreshTokenAuth;
        assert_eq!(serde_json::to_value(flow)?, flow.as_str());
        Ok(())
    }
}

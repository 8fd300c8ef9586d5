//! Classification of errors returned while refreshing tokens
//!
//! Callers use these to decide between retrying after a transient network
//! failure, asking the user to sign in again when the identity provider rejects
//! the refresh token, and surfacing anything else as-is.
//!
//! ```
//! use cognito_tokens::{classify, ServiceError};
//!
//! let rejected = ServiceError::new(ServiceError::NOT_AUTHORIZED, "Refresh Token has expired");
//! let unreachable = ServiceError::with_original(
//!     ServiceError::REQUEST_ERROR,
//!     "send request failed",
//!     std::io::Error::from(std::io::ErrorKind::ConnectionReset),
//! );
//!
//! assert!(!classify::is_network_error(&rejected));
//! assert!(classify::is_network_error(&unreachable));
//! assert_eq!(
//!     classify::as_service_error(&rejected).map(ServiceError::code),
//!     Some("NotAuthorizedException"),
//! );
//! ```
//!
//! Neither function fails: errors they do not understand are reported as not
//! found or as not network related.

use std::{error::Error as StdError, io, iter};

use crate::ServiceError;

/// Iterates over `err` and every error reachable through [`source()`][StdError::source]
fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    iter::successors(Some(err), |e| (*e).source())
}

/// Finds the first provider error in `err`'s source chain
///
/// A common code to look for is [`ServiceError::NOT_AUTHORIZED`], which the
/// identity provider returns once the refresh token has expired or been revoked.
pub fn as_service_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a ServiceError> {
    chain(err).find_map(|e| e.downcast_ref::<ServiceError>())
}

/// Like [`as_service_error()`], reporting not found when there is no error
pub fn as_service_error_opt<'a>(
    err: Option<&'a (dyn StdError + 'static)>,
) -> Option<&'a ServiceError> {
    err.and_then(as_service_error)
}

/// Checks whether `err` was caused by a network failure
///
/// The source chain is searched first. Provider errors keep the client-side error
/// that caused them in a data field rather than exposing it as a source, so the
/// original error of the first provider error in the chain is checked as well.
pub fn is_network_error(err: &(dyn StdError + 'static)) -> bool {
    if chain(err).any(is_network_failure) {
        return true;
    }

    as_service_error(err)
        .and_then(ServiceError::original_error)
        .is_some_and(is_network_error)
}

/// Like [`is_network_error()`], returning `false` when there is no error
pub fn is_network_error_opt(err: Option<&(dyn StdError + 'static)>) -> bool {
    err.is_some_and(is_network_error)
}

fn is_network_failure(err: &(dyn StdError + 'static)) -> bool {
    if let Some(err) = err.downcast_ref::<io::Error>() {
        return is_network_io_kind(err.kind())
            || is_address_lookup_failure(err)
            || err
                .get_ref()
                .is_some_and(|inner| is_network_error(inner));
    }

    if err.is::<tokio::time::error::Elapsed>() {
        return true;
    }

    #[cfg(feature = "cognito")]
    if let Some(err) = err.downcast_ref::<reqwest::Error>() {
        return err.is_connect() || err.is_timeout();
    }

    false
}

fn is_network_io_kind(kind: io::ErrorKind) -> bool {
    use io::ErrorKind::*;

    matches!(
        kind,
        ConnectionRefused
            | ConnectionReset
            | ConnectionAborted
            | NotConnected
            | NetworkUnreachable
            | NetworkDown
            | HostUnreachable
            | AddrInUse
            | AddrNotAvailable
            | BrokenPipe
            | TimedOut
            | UnexpectedEof
    )
}

/// Host name resolution failures reported by `std::net::ToSocketAddrs`
///
/// These carry no stable error kind, only a message prefix.
fn is_address_lookup_failure(err: &io::Error) -> bool {
    err.raw_os_error().is_none()
        && err
            .to_string()
            .starts_with("failed to lookup address information")
}

/// A caller-facing verdict on an error
#[derive(Clone, Copy, Debug)]
pub enum ErrorClass<'a> {
    /// A network failure; the operation may succeed if retried later
    Network,
    /// The identity provider rejected the refresh token; the user must sign in again
    NotAuthorized,
    /// Some other provider error
    Service(&'a ServiceError),
    /// Not a provider or network error
    Other,
}

impl ErrorClass<'_> {
    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorClass::Network => true,
            ErrorClass::Service(err) => {
                err.is(ServiceError::TOO_MANY_REQUESTS) || err.is(ServiceError::INTERNAL_ERROR)
            }
            ErrorClass::NotAuthorized | ErrorClass::Other => false,
        }
    }
}

/// Classifies an error, with network failures taking precedence over provider codes
pub fn classify<'a>(err: &'a (dyn StdError + 'static)) -> ErrorClass<'a> {
    if is_network_error(err) {
        return ErrorClass::Network;
    }

    match as_service_error(err) {
        Some(service) if service.is(ServiceError::NOT_AUTHORIZED) => ErrorClass::NotAuthorized,
        Some(service) => ErrorClass::Service(service),
        None => ErrorClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    /// Adds context to an error the way intermediate layers do
    #[derive(Debug, thiserror::Error)]
    #[error("{context}")]
    struct Wrapped {
        context: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    }

    fn wrap(context: &'static str, err: impl Into<Box<dyn StdError + Send + Sync>>) -> Wrapped {
        Wrapped {
            context,
            source: err.into(),
        }
    }

    #[derive(Debug)]
    struct Unrelated;

    impl fmt::Display for Unrelated {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("not a provider error")
        }
    }

    impl StdError for Unrelated {}

    fn not_authorized() -> ServiceError {
        ServiceError::new(ServiceError::NOT_AUTHORIZED, "Refresh Token has expired")
    }

    fn connection_refused() -> io::Error {
        io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connect to cognito-idp.eu-west-2.amazonaws.com refused",
        )
    }

    #[test]
    fn finds_top_level_service_error() {
        let err = not_authorized();
        let found = as_service_error(&err).map(ServiceError::code);
        assert_eq!(found, Some(ServiceError::NOT_AUTHORIZED));
    }

    #[test]
    fn finds_wrapped_service_error() {
        let err = wrap("wrap the error", not_authorized());
        let found = as_service_error(&err).map(ServiceError::code);
        assert_eq!(found, Some(ServiceError::NOT_AUTHORIZED));
    }

    #[test]
    fn finds_doubly_wrapped_service_error() {
        let err = wrap("another layer", wrap("wrap the error", not_authorized()));
        let found = as_service_error(&err).map(ServiceError::code);
        assert_eq!(found, Some(ServiceError::NOT_AUTHORIZED));
    }

    #[test]
    fn no_error_has_no_service_error() {
        assert!(as_service_error_opt(None).is_none());
    }

    #[test]
    fn unrelated_error_has_no_service_error() {
        assert!(as_service_error(&Unrelated).is_none());
        assert!(as_service_error(&wrap("context", Unrelated)).is_none());
    }

    #[test]
    fn service_error_over_network_error() {
        let err = ServiceError::with_original("code", "message", connection_refused());
        assert!(is_network_error(&err));
    }

    #[test]
    fn wrapped_service_error_over_network_error() {
        let err = wrap(
            "wrap the error",
            ServiceError::with_original("code", "message", connection_refused()),
        );
        assert!(is_network_error(&err));
    }

    #[test]
    fn plain_network_error() {
        assert!(is_network_error(&connection_refused()));
    }

    #[test]
    fn wrapped_network_error() {
        assert!(is_network_error(&wrap("another layer", connection_refused())));
    }

    #[test]
    fn no_error_is_not_network_error() {
        assert!(!is_network_error_opt(None));
    }

    #[test]
    fn unrelated_error_is_not_network_error() {
        assert!(!is_network_error(&Unrelated));
        assert!(!is_network_error(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn service_error_without_original_is_not_network_error() {
        assert!(!is_network_error(&ServiceError::new("code", "message")));
    }

    #[test]
    fn service_error_over_unrelated_error_is_not_network_error() {
        let err =
            ServiceError::with_original(ServiceError::SERIALIZATION_ERROR, "bad body", Unrelated);
        assert!(!is_network_error(&err));
    }

    #[test]
    fn network_error_nested_in_io_error() {
        let err = io::Error::new(io::ErrorKind::Other, connection_refused());
        assert!(is_network_error(&err));
    }

    #[test]
    fn unreachable_network_kinds_are_network_errors() {
        for kind in [
            io::ErrorKind::NetworkUnreachable,
            io::ErrorKind::NetworkDown,
            io::ErrorKind::HostUnreachable,
        ] {
            let err = wrap("exchange failed", io::Error::from(kind));
            assert!(is_network_error(&err), "{:?}", kind);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unreachable_os_errors_are_network_errors() {
        // ENETDOWN, ENETUNREACH, EHOSTUNREACH
        for code in [100, 101, 113] {
            let err = io::Error::from_raw_os_error(code);
            assert!(is_network_error(&err), "os error {}: {:?}", code, err.kind());
        }
    }

    #[test]
    fn failed_host_lookup_is_network_error() {
        use std::net::ToSocketAddrs;

        match "no-such-host.invalid:443".to_socket_addrs() {
            Err(err) => {
                assert!(is_network_error(&err), "{:?}", err);
                let wrapped = ServiceError::with_original(
                    ServiceError::REQUEST_ERROR,
                    "send request failed",
                    err,
                );
                assert!(is_network_error(&wrapped));
            }
            Ok(addrs) => panic!("reserved host resolved to {:?}", addrs.collect::<Vec<_>>()),
        }
    }

    #[tokio::test]
    async fn elapsed_timeout_is_network_error() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await;

        match elapsed {
            Err(err) => assert!(is_network_error(&wrap("exchange timed out", err))),
            Ok(()) => unreachable!("pending future completed"),
        }
    }

    #[test]
    fn classification_prefers_network() {
        let unreachable = wrap(
            "refresh failed",
            ServiceError::with_original(
                ServiceError::REQUEST_ERROR,
                "send request failed",
                connection_refused(),
            ),
        );
        assert!(matches!(classify(&unreachable), ErrorClass::Network));
        assert!(classify(&unreachable).is_retryable());

        assert!(matches!(classify(&not_authorized()), ErrorClass::NotAuthorized));
        assert!(!classify(&not_authorized()).is_retryable());

        let throttled = ServiceError::new(ServiceError::TOO_MANY_REQUESTS, "Rate exceeded");
        assert!(matches!(
            classify(&throttled),
            ErrorClass::Service(e) if e.is(ServiceError::TOO_MANY_REQUESTS)
        ));
        assert!(classify(&throttled).is_retryable());

        assert!(matches!(classify(&Unrelated), ErrorClass::Other));
    }
}

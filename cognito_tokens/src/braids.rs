use aliri_braid::braid;
use std::fmt;

macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    limited_reveal(&self.0, &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    limited_reveal(&self.0, &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

fn limited_reveal(unprotected: &str, f: &mut fmt::Formatter, default_len: usize) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

/// The app client ID registered with the user pool
#[braid(serde)]
pub struct ClientId;

/// The AWS region hosting the user pool, such as `eu-west-2`
#[braid(serde)]
pub struct Region;

/// A Cognito access token
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

limited_reveal!(AccessTokenRef: "ACCESS TOKEN", 15);

/// A Cognito ID token
#[braid(serde, debug = "owned", display = "owned")]
pub struct IdToken;

limited_reveal!(IdTokenRef: "ID TOKEN", 15);

/// A Cognito refresh token
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

limited_reveal!(RefreshTokenRef: "REFRESH TOKEN", 5);

/// The token handed out by the cache for use in an `Authorization` header
///
/// Depending on the cache's policy this holds either the access token or
/// the ID token.
#[braid(serde, debug = "owned", display = "owned")]
pub struct BearerToken;

limited_reveal!(BearerTokenRef: "BEARER TOKEN", 15);

impl BearerTokenRef {
    /// Formats the token as an `Authorization` header value
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", &self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_redacted_by_default() {
        let token = RefreshToken::from_static("very-secret-refresh-token");
        assert_eq!(format!("{:?}", token), "***REFRESH TOKEN***");
        assert_eq!(format!("{}", token), "***REFRESH TOKEN***");
    }

    #[test]
    fn alternate_debug_reveals_a_prefix() {
        let token = AccessTokenRef::from_static("eyJhbGciOiJIUzI1NiJ9.payload.signature");
        assert_eq!(format!("{:#?}", token), "\"eyJhbGciOiJIUz…\"");
        assert_eq!(format!("{:#8?}", token), "\"eyJhbGc…\"");
    }

    #[test]
    fn client_id_is_not_secret() {
        let client_id = ClientId::from_static("1234");
        assert_eq!(client_id.to_string(), "1234");
    }

    #[test]
    fn bearer_header() {
        let token = BearerToken::from_static("abc.def.ghi");
        assert_eq!(token.authorization_header(), "Bearer abc.def.ghi");
    }
}

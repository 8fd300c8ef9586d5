//! Unverified expiry extraction from JWTs
//!
//! The cache only needs to know when a token stops being usable. It never
//! trusts the token for anything else, so the signature is not checked.

use std::error;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cognito_clock::UnixTime;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum MalformedToken {
    #[error("token does not have three segments")]
    Segments,
    #[error("token payload is not base64url")]
    Encoding(#[from] base64::DecodeError),
    #[error("token payload is not a JSON claims object")]
    Claims(#[from] serde_json::Error),
    #[error("token has no expiry claim")]
    MissingExpiry,
}

#[derive(Deserialize)]
struct ExpiryClaim {
    #[serde(default)]
    exp: Option<f64>,
}

macro_rules! expect_three {
    ($iter:expr) => {{
        let mut i = $iter;
        match (i.next(), i.next(), i.next(), i.next()) {
            (Some(first), Some(second), Some(third), None) => Some((first, second, third)),
            _ => None,
        }
    }};
}

/// Reads the `exp` claim of a JWT without verifying its signature
///
/// **WARNING:** *The returned value has not been validated and must not be used to
/// authenticate the token.* It is only suitable for deciding whether a token obtained
/// from a trusted source is due for renewal.
///
/// Tokens that cannot be parsed, or that carry no expiry, are reported as expiring at
/// [`UnixTime::EPOCH`] so that they are always considered expired.
pub fn token_expiry(token: &str) -> UnixTime {
    match decode_expiry(token) {
        Ok(exp) => exp,
        Err(error) => {
            tracing::trace!(
                error = (&error as &dyn error::Error),
                "unable to read token expiry, treating token as expired"
            );
            UnixTime::EPOCH
        }
    }
}

pub(crate) fn decode_expiry(token: &str) -> Result<UnixTime, MalformedToken> {
    let (_header, payload, _signature) =
        expect_three!(token.split('.')).ok_or(MalformedToken::Segments)?;
    let raw = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let claims: ExpiryClaim = serde_json::from_slice(&raw)?;
    let exp = claims.exp.ok_or(MalformedToken::MissingExpiry)?;

    if exp.is_finite() && exp > 0.0 {
        Ok(UnixTime(exp as u64))
    } else {
        Ok(UnixTime::EPOCH)
    }
}

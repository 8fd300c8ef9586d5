//! A self-refreshing cache for Cognito user pool tokens
//!
//! A client that signs a user in through a Cognito user pool ends up with three
//! tokens: a short-lived access token, a short-lived ID token, and a long-lived
//! refresh token. [`TokenCache`] holds these for one user and hands out whichever
//! of the access or ID token the application is configured to use. When that
//! token is about to expire, the cache exchanges the refresh token for a new pair
//! before handing it out, so consumers of the token need not be aware of its
//! lifetime at all.
//!
//! Expiry is read from the token's `exp` claim *without* verifying its signature.
//! Tokens whose expiry cannot be read are always refreshed.
//!
//! When a refresh fails, the [`classify`] module helps decide what to do next:
//! retry later after a network failure, or ask the user to sign in again when the
//! refresh token has been rejected.
//!
//! ```no_run
//! use cognito_tokens::{
//!     classify::{self, ErrorClass},
//!     AccessToken, CacheConfig, ClientId, IdToken, RefreshToken, Region, TokenCache,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::new(
//!     AccessToken::from_static("eyJ…access"),
//!     IdToken::from_static("eyJ…id"),
//!     RefreshToken::from_static("eyJ…refresh"),
//!     ClientId::from_static("1example23456789"),
//!     Region::from_static("eu-west-2"),
//! );
//!
//! let cache = TokenCache::from_config(config)?;
//!
//! match cache.get_auth_token().await {
//!     Ok(token) => {
//!         let _header = token.authorization_header();
//!     }
//!     Err(error) => match classify::classify(&error) {
//!         ErrorClass::Network => tracing::warn!("identity provider unreachable, retry later"),
//!         ErrorClass::NotAuthorized => tracing::info!("refresh token rejected, sign in again"),
//!         _ => return Err(error.into()),
//!     },
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `cognito` (default): Provides [`CognitoRefresher`], which calls the Cognito
//!   `InitiateAuth` API using [reqwest], and [`TokenCache::from_config`].
//! * `rustls-tls` (default) and `default-tls`: Select the TLS backend used by reqwest.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod cache;
pub mod classify;
mod error;
pub mod jwt;
mod refresher;

pub use braids::*;
pub use cache::{CacheConfig, TokenCache, TokenStatus, DEFAULT_EXPIRY_MARGIN};
pub use cognito_clock as clock;
pub use error::{ConfigError, RefreshError, RefreshTokensError, ServiceError};
#[cfg(feature = "cognito")]
pub use refresher::cognito::CognitoRefresher;
pub use refresher::{AuthFlow, AuthenticationResult, RefreshRequest, RefreshResponse, Refresher};

//! The self-refreshing token cache

use std::{fmt, time::Duration};

use cognito_clock::{Clock, DurationSecs, System, UnixTime};
use serde::{Deserialize, Deserializer};
use tokio::sync::{Mutex, RwLock};

use crate::{
    jwt, AccessToken, BearerToken, ClientId, ClientIdRef, IdToken, RefreshError, RefreshRequest,
    RefreshToken, RefreshTokensError, Refresher, Region,
};

/// The margin used when none, or a zero margin, is configured
pub const DEFAULT_EXPIRY_MARGIN: DurationSecs = DurationSecs(5);

/// Initial tokens and policy for a [`TokenCache`]
///
/// Deserializes from any serde format. Token fields redact themselves when
/// debug printed.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// The current access token
    pub access_token: AccessToken,

    /// The current ID token
    pub id_token: IdToken,

    /// The refresh token used to obtain new tokens
    pub refresh_token: RefreshToken,

    /// The app client the tokens were issued to
    pub client_id: ClientId,

    /// The region of the user pool
    pub region: Region,

    /// Hand out the ID token instead of the access token
    #[serde(default)]
    pub prefer_id_token: bool,

    /// How long before its expiry a token is already treated as expired
    ///
    /// Given in seconds. Falls back to [`DEFAULT_EXPIRY_MARGIN`] when absent,
    /// zero or negative.
    #[serde(default, deserialize_with = "positive_margin")]
    pub expiry_margin: Option<DurationSecs>,
}

impl CacheConfig {
    /// Constructs a configuration that hands out the access token with the default margin
    pub fn new(
        access_token: AccessToken,
        id_token: IdToken,
        refresh_token: RefreshToken,
        client_id: ClientId,
        region: Region,
    ) -> Self {
        Self {
            access_token,
            id_token,
            refresh_token,
            client_id,
            region,
            prefer_id_token: false,
            expiry_margin: None,
        }
    }

    /// Hands out the ID token instead of the access token
    pub fn prefer_id_token(mut self) -> Self {
        self.prefer_id_token = true;
        self
    }

    /// Sets the expiry margin, rounding fractional seconds up
    ///
    /// A zero margin selects [`DEFAULT_EXPIRY_MARGIN`].
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = Some(DurationSecs::from_duration_ceil(margin));
        self
    }

    fn effective_margin(&self) -> DurationSecs {
        self.expiry_margin
            .filter(|m| m.0 > 0)
            .unwrap_or(DEFAULT_EXPIRY_MARGIN)
    }
}

fn positive_margin<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DurationSecs>, D::Error> {
    let secs = Option::<i64>::deserialize(deserializer)?;
    Ok(secs
        .and_then(|s| u64::try_from(s).ok())
        .filter(|&s| s > 0)
        .map(DurationSecs))
}

/// The lifecycle status of the token the cache would hand out
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token can be used as-is
    Fresh,
    /// The token is expired, about to expire, or its expiry cannot be read
    Stale,
}

struct TokenPair {
    access_token: AccessToken,
    id_token: IdToken,
}

/// A cache for one user's Cognito tokens that refreshes them when they go stale
///
/// The cache can be shared between tasks, for example behind an `Arc`. Callers
/// holding a fresh token never wait on a refresh. When the token goes stale, only
/// one caller performs the exchange; others that noticed staleness at the same
/// time wait for it and then use its result.
///
/// The refresh token is never replaced. Once it expires every refresh fails with
/// an error that [`classify`][crate::classify] recognises as
/// [`ServiceError::NOT_AUTHORIZED`][crate::ServiceError::NOT_AUTHORIZED], and the
/// host application has to sign the user in again.
pub struct TokenCache<R, C = System> {
    tokens: RwLock<TokenPair>,
    refresh_token: RefreshToken,
    client_id: ClientId,
    prefer_id_token: bool,
    expiry_margin: DurationSecs,
    refresh_gate: Mutex<()>,
    refresher: R,
    clock: C,
}

#[cfg(feature = "cognito")]
#[cfg_attr(docsrs, doc(cfg(feature = "cognito")))]
impl TokenCache<crate::CognitoRefresher, System> {
    /// Constructs a cache that refreshes against the configured region's user pool
    pub fn from_config(config: CacheConfig) -> Result<Self, crate::ConfigError> {
        Self::from_config_with_client(config, reqwest::Client::new())
    }

    /// Constructs a cache that refreshes using the given HTTP client
    pub fn from_config_with_client(
        config: CacheConfig,
        client: reqwest::Client,
    ) -> Result<Self, crate::ConfigError> {
        let refresher = crate::CognitoRefresher::new(client, &config.region)?;
        Ok(Self::with_refresher(config, refresher))
    }
}

impl<R: Refresher> TokenCache<R, System> {
    /// Constructs a cache that refreshes using the given refresher
    pub fn with_refresher(config: CacheConfig, refresher: R) -> Self {
        let expiry_margin = config.effective_margin();

        tracing::debug!(
            client_id = %config.client_id,
            region = %config.region,
            prefer_id_token = config.prefer_id_token,
            expiry_margin = expiry_margin.0,
            "constructing token cache"
        );

        Self {
            tokens: RwLock::new(TokenPair {
                access_token: config.access_token,
                id_token: config.id_token,
            }),
            refresh_token: config.refresh_token,
            client_id: config.client_id,
            prefer_id_token: config.prefer_id_token,
            expiry_margin,
            refresh_gate: Mutex::new(()),
            refresher,
            clock: System,
        }
    }
}

impl<R, C> TokenCache<R, C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenCache<R, D> {
        TokenCache {
            tokens: self.tokens,
            refresh_token: self.refresh_token,
            client_id: self.client_id,
            prefer_id_token: self.prefer_id_token,
            expiry_margin: self.expiry_margin,
            refresh_gate: self.refresh_gate,
            refresher: self.refresher,
            clock,
        }
    }

    /// The app client the tokens were issued to
    pub fn client_id(&self) -> &ClientIdRef {
        &self.client_id
    }

    /// Whether the ID token is handed out instead of the access token
    pub fn prefers_id_token(&self) -> bool {
        self.prefer_id_token
    }

    /// How long before its expiry a token is already treated as expired
    pub fn expiry_margin(&self) -> DurationSecs {
        self.expiry_margin
    }

    /// The refresher used to obtain new tokens
    pub fn refresher(&self) -> &R {
        &self.refresher
    }

    /// A snapshot of the cached access token
    pub async fn access_token(&self) -> AccessToken {
        self.tokens.read().await.access_token.clone()
    }

    /// A snapshot of the cached ID token
    pub async fn id_token(&self) -> IdToken {
        self.tokens.read().await.id_token.clone()
    }

    async fn active_token(&self) -> BearerToken {
        let tokens = self.tokens.read().await;
        let token = if self.prefer_id_token {
            tokens.id_token.as_str()
        } else {
            tokens.access_token.as_str()
        };
        BearerToken::new(token.to_owned())
    }
}

impl<R, C: Clock> TokenCache<R, C> {
    fn is_stale(&self, token: &str) -> bool {
        let expiry = jwt::token_expiry(token);
        stale_at(expiry, self.expiry_margin, self.clock.now())
    }

    /// Reports whether the token that would be handed out is fresh, without refreshing it
    pub async fn token_status(&self) -> TokenStatus {
        if self.is_stale(self.active_token().await.as_str()) {
            TokenStatus::Stale
        } else {
            TokenStatus::Fresh
        }
    }
}

fn stale_at(expiry: UnixTime, margin: DurationSecs, now: UnixTime) -> bool {
    now >= expiry - margin
}

impl<R: Refresher, C: Clock> TokenCache<R, C> {
    /// Gets a token that is not about to expire, refreshing the cached tokens first if needed
    ///
    /// The access token is returned unless the cache prefers the ID token. No
    /// request is made while that token is fresh. A failed refresh leaves both
    /// cached tokens unchanged and is not retried.
    pub async fn get_auth_token(&self) -> Result<BearerToken, RefreshError> {
        let token = self.active_token().await;
        if !self.is_stale(token.as_str()) {
            tracing::trace!("cached token is fresh");
            return Ok(token);
        }

        tracing::debug!(
            prefer_id_token = self.prefer_id_token,
            "cached token is stale, refreshing"
        );
        self.refresh_tokens().await?;

        Ok(self.active_token().await)
    }

    async fn refresh_tokens(&self) -> Result<(), RefreshTokensError> {
        let _gate = self.refresh_gate.lock().await;

        if !self.is_stale(self.active_token().await.as_str()) {
            tracing::debug!("tokens were refreshed by a concurrent caller");
            return Ok(());
        }

        let request = RefreshRequest::new(&self.client_id, &self.refresh_token);
        let response = match self.refresher.refresh(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn std::error::Error),
                    "token refresh failed"
                );
                return Err(RefreshTokensError::exchange(error));
            }
        };

        let result = response
            .authentication_result
            .ok_or(RefreshTokensError::MissingAuthenticationResult)?;
        let access_token = result
            .access_token
            .filter(|t| !t.as_str().is_empty())
            .ok_or(RefreshTokensError::MissingAccessToken)?;
        let id_token = result
            .id_token
            .filter(|t| !t.as_str().is_empty())
            .ok_or(RefreshTokensError::MissingIdToken)?;

        let access_expiry = jwt::token_expiry(access_token.as_str());
        let id_expiry = jwt::token_expiry(id_token.as_str());

        {
            let mut tokens = self.tokens.write().await;
            tokens.access_token = access_token;
            tokens.id_token = id_token;
        }

        tracing::info!(
            access_token.expiry = access_expiry.0,
            id_token.expiry = id_expiry.0,
            "stored refreshed tokens"
        );

        Ok(())
    }
}

impl<R, C> fmt::Debug for TokenCache<R, C>
where
    R: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("client_id", &self.client_id)
            .field("refresh_token", &self.refresh_token)
            .field("prefer_id_token", &self.prefer_id_token)
            .field("expiry_margin", &self.expiry_margin)
            .field("refresher", &self.refresher)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

//! A refresher that calls the Cognito Identity Provider `InitiateAuth` API

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;

use super::{RefreshRequest, RefreshResponse, Refresher};
use crate::{ConfigError, RegionRef, ServiceError};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const AMZ_TARGET: &str = "x-amz-target";
const INITIATE_AUTH: &str = "AWSCognitoIdentityProviderService.InitiateAuth";

/// Refreshes tokens against a Cognito user pool
///
/// `InitiateAuth` with the refresh token flow is an unsigned call, so no AWS
/// credentials are required; only the region of the user pool.
///
/// Transport failures are reported as a [`ServiceError`] with code
/// [`ServiceError::REQUEST_ERROR`] that keeps the underlying [`reqwest::Error`]
/// as its original error.
#[derive(Clone, Debug)]
pub struct CognitoRefresher {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl CognitoRefresher {
    /// Constructs a refresher for the user pool's regional endpoint
    pub fn new(client: reqwest::Client, region: &RegionRef) -> Result<Self, ConfigError> {
        let endpoint = format!("https://cognito-idp.{}.amazonaws.com/", region);
        let endpoint =
            reqwest::Url::parse(&endpoint).map_err(|source| ConfigError::InvalidEndpoint {
                endpoint,
                source: source.into(),
            })?;

        Ok(Self { client, endpoint })
    }

    /// Sends requests to `endpoint` instead of the regional endpoint
    pub fn with_endpoint(mut self, endpoint: reqwest::Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// The endpoint that requests are sent to
    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: String,
    #[serde(default, alias = "Message")]
    message: String,
}

fn service_error_from_body(status: StatusCode, body: &[u8]) -> ServiceError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(e) => {
            // Error types may be namespaced, as in `aws.cognito#NotAuthorizedException`
            let code = e.kind.rsplit('#').next().unwrap_or_default();
            ServiceError::new(code, e.message)
        }
        Err(error) => ServiceError::with_original(
            ServiceError::UNKNOWN_ERROR,
            format!("unexpected error response with status {}", status.as_u16()),
            error,
        ),
    }
}

#[async_trait]
impl Refresher for CognitoRefresher {
    type Error = ServiceError;

    async fn refresh(&self, request: &RefreshRequest<'_>) -> Result<RefreshResponse, ServiceError> {
        initiate_auth(&self.client, self.endpoint.clone(), request).await
    }
}

#[tracing::instrument(
    err,
    skip(client, endpoint, request),
    fields(
        endpoint = %endpoint,
        auth_flow = request.auth_flow.as_str(),
        client_id = %request.client_id,
    ),
)]
async fn initiate_auth(
    client: &reqwest::Client,
    endpoint: reqwest::Url,
    request: &RefreshRequest<'_>,
) -> Result<RefreshResponse, ServiceError> {
    tracing::trace!("requesting tokens from user pool");

    let body = serde_json::to_vec(request).map_err(|error| {
        ServiceError::with_original(
            ServiceError::SERIALIZATION_ERROR,
            "failed to encode InitiateAuth request",
            error,
        )
    })?;

    let resp = client
        .post(endpoint)
        .header(header::CONTENT_TYPE, AMZ_JSON)
        .header(AMZ_TARGET, INITIATE_AUTH)
        .body(body)
        .send()
        .await
        .map_err(|error| {
            ServiceError::with_original(ServiceError::REQUEST_ERROR, "send request failed", error)
        })?;

    let status = resp.status();
    tracing::debug!(
        response.status = status.as_u16(),
        "received InitiateAuth response"
    );

    let body = resp.bytes().await.map_err(|error| {
        ServiceError::with_original(
            ServiceError::SERIALIZATION_ERROR,
            "failed to read response body",
            error,
        )
    })?;

    if !status.is_success() {
        return Err(service_error_from_body(status, &body));
    }

    serde_json::from_slice(&body).map_err(|error| {
        ServiceError::with_original(
            ServiceError::SERIALIZATION_ERROR,
            "failed to decode InitiateAuth response",
            error,
        )
    })
}

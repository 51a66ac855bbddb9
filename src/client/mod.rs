use crate::rate_limit::{RateLimitError, RateLimiter};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

pub mod pagination;
pub mod v1;
pub mod v2;

pub use pagination::{Page, PageRequest};
pub use v1::TypefullyV1Client;
pub use v2::TypefullyV2Client;

pub const DEFAULT_V1_BASE_URL: &str = "https://api.typefully.com/v1/";
pub const DEFAULT_V2_BASE_URL: &str = "https://api.typefully.com/v2/";
const APP_BASE_URL: &str = "https://typefully.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Which revision of the Typefully API an account talks to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    #[default]
    V1,
    V2,
}

impl ApiVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            ApiVersion::V1 => DEFAULT_V1_BASE_URL,
            ApiVersion::V2 => DEFAULT_V2_BASE_URL,
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typefully editor URL for a draft.
pub fn get_draft_url(draft_id: &str) -> String {
    format!("{APP_BASE_URL}/?d={draft_id}")
}

/// Public preview URL for a shared draft.
pub fn get_share_url(share_id: &str) -> String {
    format!("{APP_BASE_URL}/share/{share_id}")
}

/// Connection state shared by both API revisions: base URL, credentials,
/// the header scheme of the revision, and optional local pacing.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    http: HttpClient,
    base_url: Url,
    api_key: String,
    version: ApiVersion,
    limiter: Option<RateLimiter>,
}

impl Transport {
    pub(crate) fn new(
        version: ApiVersion,
        api_key: impl Into<String>,
        base_url: Option<Url>,
    ) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::Validation("api_key cannot be empty".into()));
        }
        let base_url = match base_url {
            Some(url) => url,
            None => Url::parse(version.default_base_url()).map_err(ClientError::InvalidBaseUrl)?,
        };
        let http = HttpClient::builder()
            .user_agent(format!("typefully-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(ClientError::HttpClient)?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url),
            api_key,
            version,
            limiter: None,
        })
    }

    pub(crate) fn set_rate_limiter(&mut self, limiter: RateLimiter) {
        self.limiter = Some(limiter);
    }

    fn endpoint(&self, fragment: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(fragment)
            .map_err(ClientError::InvalidEndpoint)
    }

    /// Start a request with the revision's auth header attached.
    pub(crate) fn request(&self, method: Method, fragment: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.endpoint(fragment)?;
        let builder = self.http.request(method, url);
        Ok(match self.version {
            ApiVersion::V1 => builder.header("X-API-KEY", format!("Bearer {}", self.api_key)),
            ApiVersion::V2 => builder.bearer_auth(&self.api_key),
        })
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, ClientError> {
        let response = self.dispatch(builder, context).await?;
        response.json::<T>().await.map_err(ClientError::Http)
    }

    pub(crate) async fn send_empty(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<(), ClientError> {
        self.dispatch(builder, context).await.map(drop)
    }

    async fn dispatch(&self, builder: RequestBuilder, context: &str) -> Result<Response, ClientError> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await?;
        }
        tracing::debug!(version = %self.version, context, "sending Typefully request");
        let response = builder.send().await.map_err(ClientError::Http)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, context, "Typefully request failed");
            return Err(error_from_response(response).await);
        }
        // the server already accepted the request; a ledger write failure must not hide that
        if let Some(limiter) = &self.limiter {
            if let Err(err) = limiter.record_success(OffsetDateTime::now_utc()).await {
                tracing::warn!(error = %err, context, "failed to record request in usage ledger");
            }
        }
        Ok(response)
    }
}

async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden,
        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited {
            retry_after: response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok()),
        },
        StatusCode::BAD_REQUEST => {
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<Value>(&body) {
                Ok(detail) => ClientError::BadRequest { detail },
                Err(_) => ClientError::BadRequestUnparsed,
            }
        }
        _ => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("unable to read error body"));
            ClientError::Api { status, message }
        }
    }
}

fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path().trim_end_matches('/'));
        url.set_path(&path);
    }
    url
}

/// Typefully returns numeric ids on some endpoints and strings on others.
pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[source] url::ParseError),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[source] url::ParseError),
    #[error("HTTP client build error: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("request validation failed: {0}")]
    Validation(String),
    #[error("Invalid API key. Check your configuration and regenerate if needed.")]
    Unauthorized,
    #[error("API key doesn't have permission for this operation.")]
    Forbidden,
    #[error("Rate limit exceeded. Please wait a few minutes before trying again.")]
    RateLimited { retry_after: Option<u64> },
    #[error("Bad request: {detail}")]
    BadRequest { detail: Value },
    #[error("Bad request. Check your input parameters.")]
    BadRequestUnparsed,
    #[error("Typefully API error ({}): {message}", status.as_u16())]
    Api { status: StatusCode, message: String },
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

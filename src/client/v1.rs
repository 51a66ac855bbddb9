//! Client for the single-account API (`/v1`).

use super::{de_id, get_draft_url, get_share_url, ApiVersion, ClientError, Transport};
use crate::rate_limit::RateLimiter;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

#[derive(Debug, Clone)]
pub struct TypefullyV1Client {
    transport: Transport,
}

impl TypefullyV1Client {
    /// Create a client targeting the public API.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            transport: Transport::new(ApiVersion::V1, api_key, None)?,
        })
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: Url) -> Result<Self, ClientError> {
        Ok(Self {
            transport: Transport::new(ApiVersion::V1, api_key, Some(base_url))?,
        })
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.transport.set_rate_limiter(limiter);
        self
    }

    /// Create a draft, or schedule it when `schedule_date` is given.
    pub async fn create_draft(&self, request: &CreateDraftRequest) -> Result<DraftReceipt, ClientError> {
        if request.content.trim().is_empty() {
            return Err(ClientError::Validation("content cannot be empty".into()));
        }
        let builder = self
            .transport
            .request(Method::POST, "drafts/")?
            .json(request);
        let mut receipt: DraftReceipt = self.transport.send_json(builder, "creating draft").await?;
        receipt.url = Some(get_draft_url(&receipt.id));
        if receipt.share_url.is_none() {
            receipt.share_url = Some(get_share_url(&receipt.id));
        }
        Ok(receipt)
    }

    pub async fn get_recently_scheduled(
        &self,
        content_filter: Option<ContentFilter>,
    ) -> Result<DraftList, ClientError> {
        let mut builder = self
            .transport
            .request(Method::GET, "drafts/recently-scheduled/")?;
        if let Some(filter) = content_filter {
            builder = builder.query(&[("content_filter", filter.as_str())]);
        }
        let list: DraftList = self
            .transport
            .send_json(builder, "retrieving scheduled drafts")
            .await?;
        Ok(list.with_urls())
    }

    pub async fn get_recently_published(&self) -> Result<DraftList, ClientError> {
        let builder = self
            .transport
            .request(Method::GET, "drafts/recently-published/")?;
        let list: DraftList = self
            .transport
            .send_json(builder, "retrieving published drafts")
            .await?;
        Ok(list.with_urls())
    }

    /// Latest notifications; `activity` covers publishing events, `inbox`
    /// covers replies and comments.
    pub async fn get_notifications(
        &self,
        kind: NotificationKind,
    ) -> Result<NotificationList, ClientError> {
        let builder = self
            .transport
            .request(Method::GET, "notifications/")?
            .query(&[("kind", kind.as_str())]);
        self.transport
            .send_json(builder, "retrieving notifications")
            .await
    }

    pub async fn mark_notifications_read(
        &self,
        kind: Option<NotificationKind>,
        username: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut payload = Map::new();
        if let Some(kind) = kind {
            payload.insert("kind".into(), Value::String(kind.as_str().into()));
        }
        if let Some(username) = username {
            payload.insert("username".into(), Value::String(username.into()));
        }
        let builder = self
            .transport
            .request(Method::POST, "notifications/mark-all-read/")?
            .json(&payload);
        self.transport
            .send_json(builder, "marking notifications as read")
            .await
    }
}

/// Body of `POST /v1/drafts/`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CreateDraftRequest {
    pub content: String,
    pub threadify: bool,
    pub share: bool,
    #[serde(rename = "auto_retweet_enabled")]
    pub auto_retweet: bool,
    #[serde(rename = "auto_plug_enabled")]
    pub auto_plug: bool,
    /// ISO-8601 timestamp or `next-free-slot`; omitted for plain drafts.
    #[serde(rename = "schedule-date", skip_serializing_if = "Option::is_none")]
    pub schedule_date: Option<String>,
}

impl CreateDraftRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            threadify: true,
            share: true,
            auto_retweet: false,
            auto_plug: false,
            schedule_date: None,
        }
    }
}

/// Response of the create endpoint, with editor and share URLs filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftReceipt {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftList {
    #[serde(default)]
    pub drafts: Vec<DraftSummary>,
}

impl DraftList {
    fn with_urls(mut self) -> Self {
        for draft in &mut self.drafts {
            if draft.url.is_none() {
                draft.url = Some(get_draft_url(&draft.id));
            }
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftSummary {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub text_first_tweet: Option<String>,
    #[serde(default)]
    pub num_tweets: Option<u32>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub published_on: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationList {
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

/// A notification; `payload.action` is e.g. `draft_published` or `new_reply`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(default, deserialize_with = "super::de_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Notification {
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }

    /// `Some(false)` when the payload reports a failed publish.
    pub fn success(&self) -> Option<bool> {
        self.payload.get("success").and_then(Value::as_bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Activity,
    Inbox,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Activity => "activity",
            NotificationKind::Inbox => "inbox",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentFilter {
    Threads,
    Tweets,
}

impl ContentFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFilter::Threads => "threads",
            ContentFilter::Tweets => "tweets",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client(api_key: &str, server: &MockServer) -> TypefullyV1Client {
        let url = Url::parse(&format!("{}/v1/", server.base_url())).expect("url parse");
        TypefullyV1Client::with_base_url(api_key, url).expect("client")
    }

    #[tokio::test]
    async fn create_draft_sends_v1_payload_and_enhances_urls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/drafts/")
                    .header("x-api-key", "Bearer secret")
                    .json_body(json!({
                        "content": "Hello\n\n\n\nWorld",
                        "threadify": true,
                        "share": true,
                        "auto_retweet_enabled": false,
                        "auto_plug_enabled": false
                    }));
                then.status(200).json_body(json!({ "id": 4242, "share_url": null }));
            })
            .await;

        let client = test_client("secret", &server);
        let receipt = client
            .create_draft(&CreateDraftRequest::new("Hello\n\n\n\nWorld"))
            .await
            .expect("create draft");
        assert_eq!(receipt.id, "4242");
        assert_eq!(receipt.url.as_deref(), Some("https://typefully.com/?d=4242"));
        assert_eq!(
            receipt.share_url.as_deref(),
            Some("https://typefully.com/share/4242")
        );
    }

    #[tokio::test]
    async fn create_draft_includes_schedule_date_when_set() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/drafts/")
                    .body_contains("\"schedule-date\":\"next-free-slot\"");
                then.status(200).json_body(json!({
                    "id": "d1",
                    "share_url": "https://typefully.com/share/custom",
                    "scheduled_date": "2024-11-15T14:30:00Z"
                }));
            })
            .await;

        let client = test_client("secret", &server);
        let request = CreateDraftRequest {
            schedule_date: Some("next-free-slot".into()),
            ..CreateDraftRequest::new("scheduled")
        };
        let receipt = client.create_draft(&request).await.expect("create draft");
        mock.assert_async().await;
        assert_eq!(
            receipt.share_url.as_deref(),
            Some("https://typefully.com/share/custom")
        );
        assert_eq!(receipt.scheduled_date.as_deref(), Some("2024-11-15T14:30:00Z"));
    }

    #[tokio::test]
    async fn create_draft_rejects_empty_content() {
        let server = MockServer::start_async().await;
        let client = test_client("secret", &server);
        let err = client
            .create_draft(&CreateDraftRequest::new("   "))
            .await
            .expect_err("validation");
        assert!(matches!(err, ClientError::Validation(msg) if msg.contains("content")));
    }

    #[tokio::test]
    async fn recently_scheduled_passes_filter_and_fills_urls() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/drafts/recently-scheduled/")
                    .query_param("content_filter", "threads");
                then.status(200).json_body(json!({
                    "drafts": [
                        { "id": "a1", "text_first_tweet": "First", "num_tweets": 3 },
                        { "id": "a2", "url": "https://typefully.com/custom" }
                    ]
                }));
            })
            .await;

        let client = test_client("secret", &server);
        let list = client
            .get_recently_scheduled(Some(ContentFilter::Threads))
            .await
            .expect("scheduled");
        assert_eq!(list.drafts.len(), 2);
        assert_eq!(
            list.drafts[0].url.as_deref(),
            Some("https://typefully.com/?d=a1")
        );
        assert_eq!(
            list.drafts[1].url.as_deref(),
            Some("https://typefully.com/custom")
        );
        assert_eq!(list.drafts[0].num_tweets, Some(3));
    }

    #[tokio::test]
    async fn recently_published_without_drafts_key_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/drafts/recently-published/");
                then.status(200).json_body(json!({}));
            })
            .await;

        let client = test_client("secret", &server);
        let list = client.get_recently_published().await.expect("published");
        assert!(list.drafts.is_empty());
    }

    #[tokio::test]
    async fn notifications_query_kind() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/notifications/")
                    .query_param("kind", "inbox");
                then.status(200).json_body(json!({
                    "notifications": [
                        { "id": "n1", "kind": "inbox", "payload": { "action": "new_reply" } }
                    ]
                }));
            })
            .await;

        let client = test_client("secret", &server);
        let list = client
            .get_notifications(NotificationKind::Inbox)
            .await
            .expect("notifications");
        assert_eq!(list.notifications[0].action(), Some("new_reply"));
    }

    #[tokio::test]
    async fn mark_read_sends_only_given_fields() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/notifications/mark-all-read/")
                    .json_body(json!({ "username": "jack" }));
                then.status(200).json_body(json!({ "ok": true }));
            })
            .await;

        let client = test_client("secret", &server);
        let response = client
            .mark_notifications_read(None, Some("jack"))
            .await
            .expect("mark read");
        mock.assert_async().await;
        assert_eq!(response, json!({ "ok": true }));
    }
}

//! Client for the multi-platform API (`/v2`), where drafts belong to a
//! social set and listings are paginated.

use super::pagination::{collect_all, Page, PageRequest};
use super::{de_id, de_opt_id, get_draft_url, ApiVersion, ClientError, Transport};
use crate::rate_limit::RateLimiter;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

/// Separator that splits content into individual posts of a thread.
pub const THREAD_SEPARATOR: &str = "\n\n\n\n";

#[derive(Debug, Clone)]
pub struct TypefullyV2Client {
    transport: Transport,
}

impl TypefullyV2Client {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            transport: Transport::new(ApiVersion::V2, api_key, None)?,
        })
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: Url) -> Result<Self, ClientError> {
        Ok(Self {
            transport: Transport::new(ApiVersion::V2, api_key, Some(base_url))?,
        })
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.transport.set_rate_limiter(limiter);
        self
    }

    pub async fn list_social_sets(&self, page: PageRequest) -> Result<Page<SocialSet>, ClientError> {
        let builder = self
            .transport
            .request(Method::GET, "social-sets")?
            .query(&page.query());
        self.transport
            .send_json(builder, "listing social sets")
            .await
    }

    pub async fn list_all_social_sets(
        &self,
        limit: u32,
        max_items: usize,
    ) -> Result<Vec<SocialSet>, ClientError> {
        collect_all(limit, max_items, |page| self.list_social_sets(page)).await
    }

    pub async fn get_social_set(&self, social_set_id: &str) -> Result<SocialSet, ClientError> {
        validate_segment("social_set_id", social_set_id)?;
        let builder = self
            .transport
            .request(Method::GET, &format!("social-sets/{social_set_id}"))?;
        self.transport
            .send_json(builder, "retrieving social set")
            .await
    }

    pub async fn create_draft(
        &self,
        social_set_id: &str,
        request: &DraftRequest,
    ) -> Result<Draft, ClientError> {
        validate_segment("social_set_id", social_set_id)?;
        if request.platforms.is_empty() {
            return Err(ClientError::Validation(
                "at least one platform must be enabled".into(),
            ));
        }
        if request
            .platforms
            .values()
            .all(|platform| platform.posts.is_empty())
        {
            return Err(ClientError::Validation("content cannot be empty".into()));
        }
        let builder = self
            .transport
            .request(Method::POST, &format!("social-sets/{social_set_id}/drafts"))?
            .json(request);
        let draft: Draft = self.transport.send_json(builder, "creating draft").await?;
        Ok(draft.with_url())
    }

    /// Update a draft; only fields set on `request` are sent.
    pub async fn update_draft(
        &self,
        social_set_id: &str,
        draft_id: &str,
        request: &DraftRequest,
    ) -> Result<Draft, ClientError> {
        validate_segment("social_set_id", social_set_id)?;
        validate_segment("draft_id", draft_id)?;
        if request.is_empty() {
            return Err(ClientError::Validation("nothing to update".into()));
        }
        let builder = self
            .transport
            .request(
                Method::PATCH,
                &format!("social-sets/{social_set_id}/drafts/{draft_id}"),
            )?
            .json(request);
        let draft: Draft = self.transport.send_json(builder, "updating draft").await?;
        Ok(draft.with_url())
    }

    pub async fn get_draft(&self, social_set_id: &str, draft_id: &str) -> Result<Draft, ClientError> {
        validate_segment("social_set_id", social_set_id)?;
        validate_segment("draft_id", draft_id)?;
        let builder = self.transport.request(
            Method::GET,
            &format!("social-sets/{social_set_id}/drafts/{draft_id}"),
        )?;
        let draft: Draft = self.transport.send_json(builder, "retrieving draft").await?;
        Ok(draft.with_url())
    }

    pub async fn delete_draft(&self, social_set_id: &str, draft_id: &str) -> Result<(), ClientError> {
        validate_segment("social_set_id", social_set_id)?;
        validate_segment("draft_id", draft_id)?;
        let builder = self.transport.request(
            Method::DELETE,
            &format!("social-sets/{social_set_id}/drafts/{draft_id}"),
        )?;
        self.transport.send_empty(builder, "deleting draft").await
    }

    pub async fn list_drafts(
        &self,
        social_set_id: &str,
        status: Option<DraftStatus>,
        page: PageRequest,
    ) -> Result<Page<Draft>, ClientError> {
        validate_segment("social_set_id", social_set_id)?;
        let mut builder = self
            .transport
            .request(Method::GET, &format!("social-sets/{social_set_id}/drafts"))?
            .query(&page.query());
        if let Some(status) = status {
            builder = builder.query(&[("status", status.as_str())]);
        }
        let mut page: Page<Draft> = self.transport.send_json(builder, "listing drafts").await?;
        page.results = page.results.into_iter().map(Draft::with_url).collect();
        Ok(page)
    }

    pub async fn list_all_drafts(
        &self,
        social_set_id: &str,
        status: Option<DraftStatus>,
        limit: u32,
        max_items: usize,
    ) -> Result<Vec<Draft>, ClientError> {
        collect_all(limit, max_items, |page| {
            self.list_drafts(social_set_id, status, page)
        })
        .await
    }
}

fn validate_segment(name: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::Validation(format!("{name} cannot be empty")));
    }
    if value.contains('/') || value.contains('?') || value.contains('#') {
        return Err(ClientError::Validation(format!(
            "{name} contains invalid characters"
        )));
    }
    Ok(())
}

/// Split content into thread posts on four consecutive newlines.
pub fn split_thread(content: &str, threadify: bool) -> Vec<String> {
    let parts: Vec<&str> = if threadify {
        content.split(THREAD_SEPARATOR).collect()
    } else {
        vec![content]
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// A named group of linked platform accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialSet {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SocialSet {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    X,
    Linkedin,
    Mastodon,
    Threads,
    Bluesky,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Linkedin => "linkedin",
            Platform::Mastodon => "mastodon",
            Platform::Threads => "threads",
            Platform::Bluesky => "bluesky",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformPosts {
    pub enabled: bool,
    pub posts: Vec<PostBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostBody {
    pub text: String,
}

/// Body of the create and update endpoints. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DraftRequest {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub platforms: BTreeMap<Platform, PlatformPosts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_title: Option<String>,
    /// `now`, `next-free-slot`, or an ISO-8601 timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DraftRequest {
    /// Same posts on every listed platform.
    pub fn with_content(mut self, content: &str, platforms: &[Platform], threadify: bool) -> Self {
        let posts: Vec<PostBody> = split_thread(content, threadify)
            .into_iter()
            .map(|text| PostBody { text })
            .collect();
        for platform in platforms {
            self.platforms.insert(
                *platform,
                PlatformPosts {
                    enabled: true,
                    posts: posts.clone(),
                },
            );
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &DraftRequest::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Draft,
    Scheduled,
    Published,
    Error,
}

impl DraftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DraftStatus::Draft => "draft",
            DraftStatus::Scheduled => "scheduled",
            DraftStatus::Published => "published",
            DraftStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draft {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub social_set_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub draft_title: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub share_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Draft {
    fn with_url(mut self) -> Self {
        if self.url.is_none() {
            self.url = Some(get_draft_url(&self.id));
        }
        self
    }
}

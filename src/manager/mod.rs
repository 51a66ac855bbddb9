//! Multi-account layer: maps account aliases to API clients and applies the
//! local policies (scheduling switch, threadify/share defaults, social-set
//! lookup) on top of the raw endpoints.

use crate::client::v1::{
    self, ContentFilter, DraftSummary, NotificationKind, NotificationList, TypefullyV1Client,
};
use crate::client::v2::{Draft, DraftRequest, DraftStatus, Platform, SocialSet, TypefullyV2Client};
use crate::client::{ApiVersion, ClientError, PageRequest};
use crate::config::accounts::{AccountProfile, AccountRecord};
use crate::config::{ConfigPaths, Settings};
use crate::rate_limit::{RateLimitConfig, RateLimitError, RateLimiter, RateStatus};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use url::Url;

pub mod analytics;
pub mod social_sets;

pub use analytics::AnalyticsReport;
pub use social_sets::SocialSetDirectory;

pub const NEXT_FREE_SLOT: &str = "next-free-slot";

/// Client bound to the API revision of one account.
#[derive(Debug, Clone)]
pub enum AccountClient {
    V1(TypefullyV1Client),
    V2(TypefullyV2Client),
}

impl AccountClient {
    pub fn api_version(&self) -> ApiVersion {
        match self {
            AccountClient::V1(_) => ApiVersion::V1,
            AccountClient::V2(_) => ApiVersion::V2,
        }
    }
}

#[derive(Debug, Clone)]
struct ManagedAccount {
    profile: AccountProfile,
    client: AccountClient,
    limiter: Option<RateLimiter>,
}

pub struct TypefullyManager {
    settings: Settings,
    accounts: BTreeMap<String, ManagedAccount>,
    social_sets: Mutex<HashMap<String, Arc<SocialSetDirectory>>>,
}

impl TypefullyManager {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            accounts: BTreeMap::new(),
            social_sets: Mutex::new(HashMap::new()),
        }
    }

    /// Build clients, each paced by its own persisted rate limiter.
    pub async fn connect(
        paths: &ConfigPaths,
        settings: Settings,
        records: BTreeMap<String, AccountRecord>,
        base_url: Option<Url>,
    ) -> Result<Self, ManagerError> {
        let mut manager = Self::new(settings);
        for (alias, record) in records {
            let limiter = RateLimiter::new(
                paths.clone(),
                &alias,
                RateLimitConfig::from_settings(&manager.settings),
            )
            .await?;
            let client = match record.profile.api_version {
                ApiVersion::V1 => AccountClient::V1(
                    match &base_url {
                        Some(url) => TypefullyV1Client::with_base_url(record.api_key, url.clone())?,
                        None => TypefullyV1Client::new(record.api_key)?,
                    }
                    .with_rate_limiter(limiter.clone()),
                ),
                ApiVersion::V2 => AccountClient::V2(
                    match &base_url {
                        Some(url) => TypefullyV2Client::with_base_url(record.api_key, url.clone())?,
                        None => TypefullyV2Client::new(record.api_key)?,
                    }
                    .with_rate_limiter(limiter.clone()),
                ),
            };
            manager.accounts.insert(
                alias,
                ManagedAccount {
                    profile: record.profile,
                    client,
                    limiter: Some(limiter),
                },
            );
        }
        Ok(manager)
    }

    /// Register an account with a ready-made client.
    pub fn insert_account(&mut self, alias: impl Into<String>, profile: AccountProfile, client: AccountClient) {
        self.accounts.insert(
            alias.into(),
            ManagedAccount {
                profile,
                client,
                limiter: None,
            },
        );
    }

    pub fn account_names(&self) -> Vec<String> {
        self.accounts.keys().cloned().collect()
    }

    pub fn get_client(&self, account: &str) -> Result<&AccountClient, ManagerError> {
        self.account(account).map(|managed| &managed.client)
    }

    fn account(&self, account: &str) -> Result<&ManagedAccount, ManagerError> {
        self.accounts
            .get(account)
            .ok_or_else(|| ManagerError::AccountNotFound {
                name: account.to_string(),
                available: self.account_names().join(", "),
            })
    }

    pub async fn rate_status(&self, account: &str) -> Result<Option<RateStatus>, ManagerError> {
        match &self.account(account)?.limiter {
            Some(limiter) => Ok(Some(limiter.status(OffsetDateTime::now_utc()).await?)),
            None => Ok(None),
        }
    }

    /// Create a draft for one account, honouring the scheduling switch.
    pub async fn create_draft(
        &self,
        account: &str,
        input: &DraftInput,
    ) -> Result<DraftOutcome, ManagerError> {
        let managed = self.account(account)?;
        let decision = resolve_schedule(&self.settings, input.schedule, input.schedule_date.as_deref());
        if decision.downgraded {
            tracing::warn!(
                account,
                "scheduling is disabled; creating draft only (set \"scheduling_enabled\": true in config.json to enable)"
            );
        }

        match &managed.client {
            AccountClient::V1(client) => {
                let request = v1::CreateDraftRequest {
                    threadify: self.settings.default_threadify,
                    share: self.settings.default_share,
                    schedule_date: decision.publish_at.clone(),
                    ..v1::CreateDraftRequest::new(input.content.clone())
                };
                let receipt = client.create_draft(&request).await?;
                Ok(DraftOutcome {
                    account: account.to_string(),
                    api_version: ApiVersion::V1,
                    status: OutcomeStatus::from_decision(&decision),
                    id: receipt.id.clone(),
                    url: receipt.url.clone(),
                    share_url: receipt.share_url.clone(),
                    scheduled_date: receipt.scheduled_date.clone().or(decision.publish_at),
                    response: serde_json::to_value(&receipt).unwrap_or(Value::Null),
                })
            }
            AccountClient::V2(client) => {
                if input.content.trim().is_empty() {
                    return Err(ClientError::Validation("content cannot be empty".into()).into());
                }
                let social_set_id = self
                    .social_set_for(account, managed, input.social_set.as_deref())
                    .await?;
                let platforms = default_platforms(&input.platforms);
                let request = DraftRequest {
                    draft_title: input.title.clone(),
                    publish_at: decision.publish_at.clone(),
                    share: Some(self.settings.default_share),
                    tags: input.tags.clone(),
                    ..DraftRequest::default()
                }
                .with_content(&input.content, &platforms, self.settings.default_threadify);
                let draft = client.create_draft(&social_set_id, &request).await?;
                Ok(DraftOutcome::from_v2(account, OutcomeStatus::from_decision(&decision), draft, decision.publish_at))
            }
        }
    }

    /// Patch an existing v2 draft. Scheduling follows the same switch as creation.
    pub async fn update_draft(
        &self,
        account: &str,
        draft_id: &str,
        update: &DraftUpdate,
    ) -> Result<DraftOutcome, ManagerError> {
        let managed = self.account(account)?;
        let AccountClient::V2(client) = &managed.client else {
            return Err(ManagerError::unsupported(
                "updating drafts",
                managed.client.api_version(),
            ));
        };
        let social_set_id = self
            .social_set_for(account, managed, update.social_set.as_deref())
            .await?;
        let decision = resolve_schedule(&self.settings, update.schedule, update.schedule_date.as_deref());
        if decision.downgraded {
            tracing::warn!(account, draft_id, "scheduling is disabled; leaving publish time unchanged");
        }
        let mut request = DraftRequest {
            draft_title: update.title.clone(),
            publish_at: decision.publish_at.clone(),
            tags: update.tags.clone(),
            ..DraftRequest::default()
        };
        if let Some(content) = &update.content {
            let platforms = default_platforms(&update.platforms);
            request = request.with_content(content, &platforms, self.settings.default_threadify);
        }
        let draft = client.update_draft(&social_set_id, draft_id, &request).await?;
        Ok(DraftOutcome::from_v2(account, OutcomeStatus::from_decision(&decision), draft, decision.publish_at))
    }

    pub async fn get_draft(
        &self,
        account: &str,
        draft_id: &str,
        social_set: Option<&str>,
    ) -> Result<Draft, ManagerError> {
        let managed = self.account(account)?;
        let AccountClient::V2(client) = &managed.client else {
            return Err(ManagerError::unsupported(
                "fetching a single draft",
                managed.client.api_version(),
            ));
        };
        let social_set_id = self.social_set_for(account, managed, social_set).await?;
        Ok(client.get_draft(&social_set_id, draft_id).await?)
    }

    pub async fn delete_draft(
        &self,
        account: &str,
        draft_id: &str,
        social_set: Option<&str>,
    ) -> Result<(), ManagerError> {
        let managed = self.account(account)?;
        let AccountClient::V2(client) = &managed.client else {
            return Err(ManagerError::unsupported(
                "deleting drafts",
                managed.client.api_version(),
            ));
        };
        let social_set_id = self.social_set_for(account, managed, social_set).await?;
        Ok(client.delete_draft(&social_set_id, draft_id).await?)
    }

    /// List drafts as flat rows; v1 reads the "recently" endpoints, v2 pages
    /// through the drafts of a social set.
    pub async fn list_drafts(
        &self,
        account: &str,
        query: &DraftQuery,
    ) -> Result<Vec<DraftRow>, ManagerError> {
        let managed = self.account(account)?;
        match &managed.client {
            AccountClient::V1(client) => {
                let mut rows = Vec::new();
                let (scheduled, published) = match query.status {
                    None => (true, true),
                    Some(DraftStatus::Scheduled) => (true, false),
                    Some(DraftStatus::Published) => (false, true),
                    Some(other) => {
                        return Err(ManagerError::unsupported(
                            status_operation(other),
                            ApiVersion::V1,
                        ))
                    }
                };
                if scheduled {
                    let list = client.get_recently_scheduled(query.content_filter).await?;
                    rows.extend(list.drafts.iter().map(|d| DraftRow::from_v1(d, "scheduled")));
                }
                if published {
                    let list = client.get_recently_published().await?;
                    rows.extend(list.drafts.iter().map(|d| DraftRow::from_v1(d, "published")));
                }
                if let Some(limit) = query.limit {
                    rows.truncate(limit as usize);
                }
                Ok(rows)
            }
            AccountClient::V2(client) => {
                let social_set_id = self
                    .social_set_for(account, managed, query.social_set.as_deref())
                    .await?;
                let drafts = if query.all {
                    client
                        .list_all_drafts(
                            &social_set_id,
                            query.status,
                            self.settings.page_size,
                            query.limit.map(|l| l as usize).unwrap_or(self.settings.max_items),
                        )
                        .await?
                } else {
                    let limit = query.limit.unwrap_or(self.settings.page_size);
                    client
                        .list_drafts(&social_set_id, query.status, PageRequest::first(limit))
                        .await?
                        .results
                };
                Ok(drafts.iter().map(DraftRow::from).collect())
            }
        }
    }

    pub async fn notifications(
        &self,
        account: &str,
        kind: NotificationKind,
    ) -> Result<NotificationList, ManagerError> {
        match &self.account(account)?.client {
            AccountClient::V1(client) => Ok(client.get_notifications(kind).await?),
            other => Err(ManagerError::unsupported("notifications", other.api_version())),
        }
    }

    pub async fn mark_notifications_read(
        &self,
        account: &str,
        kind: Option<NotificationKind>,
        username: Option<&str>,
    ) -> Result<Value, ManagerError> {
        match &self.account(account)?.client {
            AccountClient::V1(client) => Ok(client.mark_notifications_read(kind, username).await?),
            other => Err(ManagerError::unsupported(
                "marking notifications read",
                other.api_version(),
            )),
        }
    }

    /// Published drafts plus one secondary feed: activity notifications on
    /// v1, scheduled drafts on v2. `social_set` picks the v2 set and is
    /// ignored on v1.
    pub async fn analytics(
        &self,
        account: &str,
        days: u32,
        social_set: Option<&str>,
    ) -> Result<AnalyticsReport, ManagerError> {
        let managed = self.account(account)?;
        let now = OffsetDateTime::now_utc();
        match &managed.client {
            AccountClient::V1(client) => {
                let published = client.get_recently_published().await?;
                let activity = client.get_notifications(NotificationKind::Activity).await?;
                Ok(analytics::build_v1_report(account, days, &published, &activity, now))
            }
            AccountClient::V2(client) => {
                let social_set_id = self.social_set_for(account, managed, social_set).await?;
                let published = client
                    .list_all_drafts(
                        &social_set_id,
                        Some(DraftStatus::Published),
                        self.settings.page_size,
                        self.settings.max_items,
                    )
                    .await?;
                let scheduled = client
                    .list_all_drafts(
                        &social_set_id,
                        Some(DraftStatus::Scheduled),
                        self.settings.page_size,
                        self.settings.max_items,
                    )
                    .await?;
                Ok(analytics::build_v2_report(account, days, &published, &scheduled, now))
            }
        }
    }

    pub async fn social_sets(&self, account: &str) -> Result<Vec<SocialSet>, ManagerError> {
        let managed = self.account(account)?;
        let directory = self.directory(account, managed).await?;
        Ok(directory.sets().to_vec())
    }

    pub async fn social_set(&self, account: &str, key: &str) -> Result<SocialSet, ManagerError> {
        let managed = self.account(account)?;
        let AccountClient::V2(client) = &managed.client else {
            return Err(ManagerError::unsupported(
                "social sets",
                managed.client.api_version(),
            ));
        };
        let id = self.resolve_social_set(account, key).await?;
        Ok(client.get_social_set(&id).await?)
    }

    /// Map a social-set name, `@username`, or id to its id.
    ///
    /// Numeric keys are taken as ids without a lookup. Otherwise the
    /// account's directory is loaded once and reused.
    pub async fn resolve_social_set(&self, account: &str, key: &str) -> Result<String, ManagerError> {
        let key = key.trim();
        if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
            return Ok(key.to_string());
        }
        let managed = self.account(account)?;
        let directory = self.directory(account, managed).await?;
        directory
            .resolve(key)
            .map(str::to_string)
            .ok_or_else(|| ManagerError::SocialSetNotFound {
                name: key.to_string(),
                available: directory.names().join(", "),
            })
    }

    async fn social_set_for(
        &self,
        account: &str,
        managed: &ManagedAccount,
        explicit: Option<&str>,
    ) -> Result<String, ManagerError> {
        if let Some(key) = explicit.or(managed.profile.social_set.as_deref()) {
            return self.resolve_social_set(account, key).await;
        }
        let directory = self.directory(account, managed).await?;
        match directory.sets() {
            [only] => Ok(only.id.clone()),
            [] => Err(ManagerError::NoSocialSets {
                account: account.to_string(),
            }),
            _ => Err(ManagerError::AmbiguousSocialSet {
                account: account.to_string(),
                available: directory.names().join(", "),
            }),
        }
    }

    async fn directory(
        &self,
        account: &str,
        managed: &ManagedAccount,
    ) -> Result<Arc<SocialSetDirectory>, ManagerError> {
        let AccountClient::V2(client) = &managed.client else {
            return Err(ManagerError::unsupported(
                "social sets",
                managed.client.api_version(),
            ));
        };
        let mut cache = self.social_sets.lock().await;
        if let Some(directory) = cache.get(account) {
            return Ok(directory.clone());
        }
        let sets = client
            .list_all_social_sets(self.settings.page_size, self.settings.max_items)
            .await?;
        tracing::debug!(account, count = sets.len(), "loaded social sets");
        let directory = Arc::new(SocialSetDirectory::new(sets));
        cache.insert(account.to_string(), directory.clone());
        Ok(directory)
    }
}

fn default_platforms(platforms: &[Platform]) -> Vec<Platform> {
    if platforms.is_empty() {
        vec![Platform::X]
    } else {
        platforms.to_vec()
    }
}

fn status_operation(status: DraftStatus) -> &'static str {
    match status {
        DraftStatus::Draft => "listing unscheduled drafts",
        DraftStatus::Error => "listing failed drafts",
        DraftStatus::Scheduled => "listing scheduled drafts",
        DraftStatus::Published => "listing published drafts",
    }
}

/// Seam used by cross-posting so the fan-out can run against any publisher.
#[async_trait]
pub trait DraftPublisher: Send + Sync {
    async fn publish(&self, account: &str, input: &DraftInput) -> Result<DraftOutcome, ManagerError>;

    fn scheduling_enabled(&self) -> bool;
}

#[async_trait]
impl DraftPublisher for TypefullyManager {
    async fn publish(&self, account: &str, input: &DraftInput) -> Result<DraftOutcome, ManagerError> {
        self.create_draft(account, input).await
    }

    fn scheduling_enabled(&self) -> bool {
        self.settings.scheduling_enabled
    }
}

/// Per-account result of a cross-post.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CrossPostResult {
    Posted(DraftOutcome),
    Failed { error: String },
}

/// Create one draft per account from `content`. Accounts without content are
/// skipped and a failure on one account does not stop the others.
pub async fn cross_post<P>(
    publisher: &P,
    accounts: &[String],
    content: &BTreeMap<String, String>,
    schedule: bool,
) -> BTreeMap<String, CrossPostResult>
where
    P: DraftPublisher + ?Sized,
{
    let status = if schedule && publisher.scheduling_enabled() {
        "scheduled"
    } else {
        "drafted"
    };
    let mut results = BTreeMap::new();
    for account in accounts {
        let Some(text) = content.get(account) else {
            tracing::warn!(account = %account, "no content provided; skipping");
            continue;
        };
        let input = DraftInput {
            content: text.clone(),
            schedule,
            ..DraftInput::default()
        };
        let result = match publisher.publish(account, &input).await {
            Ok(outcome) => {
                tracing::info!(
                    account = %account,
                    status,
                    url = outcome.url.as_deref().unwrap_or(""),
                    "cross-post succeeded"
                );
                CrossPostResult::Posted(outcome)
            }
            Err(err) => {
                tracing::error!(account = %account, error = %err, "cross-post failed");
                CrossPostResult::Failed {
                    error: err.to_string(),
                }
            }
        };
        results.insert(account.clone(), result);
    }
    results
}

/// Outcome of the scheduling switch for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub publish_at: Option<String>,
    /// Scheduling was requested but is disabled in the settings.
    pub downgraded: bool,
}

pub fn resolve_schedule(settings: &Settings, schedule: bool, date: Option<&str>) -> ScheduleDecision {
    if !schedule {
        return ScheduleDecision {
            publish_at: None,
            downgraded: false,
        };
    }
    if !settings.scheduling_enabled {
        return ScheduleDecision {
            publish_at: None,
            downgraded: true,
        };
    }
    let publish_at = date
        .map(str::trim)
        .filter(|date| !date.is_empty())
        .unwrap_or(NEXT_FREE_SLOT);
    ScheduleDecision {
        publish_at: Some(publish_at.to_string()),
        downgraded: false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftInput {
    pub content: String,
    pub schedule: bool,
    pub schedule_date: Option<String>,
    pub social_set: Option<String>,
    pub platforms: Vec<Platform>,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftUpdate {
    pub content: Option<String>,
    pub platforms: Vec<Platform>,
    pub schedule: bool,
    pub schedule_date: Option<String>,
    pub social_set: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftQuery {
    pub status: Option<DraftStatus>,
    pub content_filter: Option<ContentFilter>,
    pub social_set: Option<String>,
    pub limit: Option<u32>,
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Drafted,
    Scheduled,
}

impl OutcomeStatus {
    fn from_decision(decision: &ScheduleDecision) -> Self {
        if decision.publish_at.is_some() {
            OutcomeStatus::Scheduled
        } else {
            OutcomeStatus::Drafted
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DraftOutcome {
    pub account: String,
    pub api_version: ApiVersion,
    pub status: OutcomeStatus,
    pub id: String,
    pub url: Option<String>,
    pub share_url: Option<String>,
    pub scheduled_date: Option<String>,
    pub response: Value,
}

impl DraftOutcome {
    fn from_v2(account: &str, status: OutcomeStatus, draft: Draft, publish_at: Option<String>) -> Self {
        Self {
            account: account.to_string(),
            api_version: ApiVersion::V2,
            status,
            id: draft.id.clone(),
            url: draft.url.clone(),
            share_url: draft.share_url.clone(),
            scheduled_date: draft.scheduled_date.clone().or(publish_at),
            response: serde_json::to_value(&draft).unwrap_or(Value::Null),
        }
    }
}

/// Draft listing row shared by both revisions.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DraftRow {
    pub id: String,
    pub status: String,
    pub preview: Option<String>,
    pub posts: Option<u32>,
    pub date: Option<String>,
    pub url: Option<String>,
}

impl DraftRow {
    fn from_v1(draft: &DraftSummary, status: &str) -> Self {
        Self {
            id: draft.id.clone(),
            status: status.to_string(),
            preview: draft
                .text_first_tweet
                .clone()
                .or_else(|| draft.text.clone()),
            posts: draft.num_tweets,
            date: draft
                .scheduled_date
                .clone()
                .or_else(|| draft.published_on.clone()),
            url: draft.url.clone(),
        }
    }
}

impl From<&Draft> for DraftRow {
    fn from(draft: &Draft) -> Self {
        Self {
            id: draft.id.clone(),
            status: draft.status.clone().unwrap_or_else(|| "unknown".into()),
            preview: draft.preview.clone().or_else(|| draft.draft_title.clone()),
            posts: None,
            date: draft
                .scheduled_date
                .clone()
                .or_else(|| draft.published_at.clone()),
            url: draft.url.clone(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ManagerError {
    #[error("Account '{name}' not found. Available: {available}")]
    AccountNotFound { name: String, available: String },
    #[error("{operation} is not available for {version} accounts")]
    Unsupported {
        operation: &'static str,
        version: ApiVersion,
    },
    #[error("Social set '{name}' not found. Available: {available}")]
    SocialSetNotFound { name: String, available: String },
    #[error("account '{account}' has several social sets ({available}); pass --social-set or set a default")]
    AmbiguousSocialSet { account: String, available: String },
    #[error("account '{account}' has no social sets")]
    NoSocialSets { account: String },
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

impl ManagerError {
    fn unsupported(operation: &'static str, version: ApiVersion) -> Self {
        ManagerError::Unsupported { operation, version }
    }
}

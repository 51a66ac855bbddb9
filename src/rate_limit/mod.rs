use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Jitter, Quota, RateLimiter as GovernorRateLimiter,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use time::{
    format_description::FormatItem, macros::format_description, Date, Duration as TimeDuration,
    OffsetDateTime,
};
use tokio::sync::Mutex;

use crate::config::{ConfigPaths, Settings};

const DEFAULT_JITTER_UP_TO_MS: u64 = 100;

/// Local pacing: a per-minute request quota plus an optional daily ceiling.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub per_minute: NonZeroU32,
    pub daily_quota: Option<NonZeroU32>,
    pub jitter_max: StdDuration,
    quota: Quota,
}

impl RateLimitConfig {
    pub fn new(per_minute: NonZeroU32) -> Self {
        Self {
            per_minute,
            daily_quota: None,
            jitter_max: StdDuration::from_millis(DEFAULT_JITTER_UP_TO_MS),
            quota: Quota::per_minute(per_minute),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.requests_per_minute).with_daily_quota(settings.daily_quota)
    }

    pub fn with_daily_quota(mut self, daily: Option<NonZeroU32>) -> Self {
        self.daily_quota = daily;
        self
    }

    #[cfg(test)]
    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.quota = quota;
        self
    }

    fn jitter(&self) -> Jitter {
        Jitter::up_to(self.jitter_max)
    }
}

/// Request pacing for one account, backed by a persisted usage ledger.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    usage: Arc<Mutex<UsageLedger>>,
    config: RateLimitConfig,
    jitter: Jitter,
}

impl RateLimiter {
    pub async fn new(
        paths: ConfigPaths,
        account: &str,
        config: RateLimitConfig,
    ) -> Result<Self, RateLimitError> {
        paths.ensure_exists()?;
        let usage = UsageLedger::load(&paths, account)?;
        Ok(Self {
            limiter: Arc::new(GovernorRateLimiter::direct(config.quota)),
            usage: Arc::new(Mutex::new(usage)),
            jitter: config.jitter(),
            config,
        })
    }

    /// Wait until the quota allows one more request, failing fast once the
    /// daily ceiling is spent.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        if let Some(limit) = self.config.daily_quota {
            let usage = self.usage.lock().await;
            let used = usage.daily_used(OffsetDateTime::now_utc().date());
            if used >= limit.get() {
                return Err(RateLimitError::DailyQuotaExhausted { limit: limit.get() });
            }
        }
        self.limiter.until_ready_with_jitter(self.jitter).await;
        Ok(())
    }

    /// Record a completed request and persist the counters.
    pub async fn record_success(&self, now: OffsetDateTime) -> Result<RateStatus, RateLimitError> {
        let mut usage = self.usage.lock().await;
        usage.record(1, now);
        usage.persist()?;
        Ok(usage.status(&self.config, now))
    }

    pub async fn status(&self, now: OffsetDateTime) -> Result<RateStatus, RateLimitError> {
        let usage = self.usage.lock().await;
        Ok(usage.status(&self.config, now))
    }
}

#[derive(Debug, Clone)]
struct UsageLedger {
    path: PathBuf,
    snapshot: UsageSnapshot,
}

impl UsageLedger {
    fn load(paths: &ConfigPaths, account: &str) -> Result<Self, RateLimitError> {
        let path = paths.usage_dir().join(format!("{account}.json"));
        let snapshot = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => UsageSnapshot::new(account),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(RateLimitError::Deserialize)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => UsageSnapshot::new(account),
            Err(source) => return Err(RateLimitError::Io { path, source }),
        };
        Ok(Self { path, snapshot })
    }

    fn persist(&self) -> Result<(), RateLimitError> {
        let contents =
            serde_json::to_vec_pretty(&self.snapshot).map_err(RateLimitError::Serialize)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RateLimitError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, contents).map_err(|source| RateLimitError::Io {
            path: self.path.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600)).map_err(
                |source| RateLimitError::Io {
                    path: self.path.clone(),
                    source,
                },
            )?;
        }
        Ok(())
    }

    fn record(&mut self, amount: u32, now: OffsetDateTime) {
        let minute = minute_bucket(now);
        let window = self.snapshot.minute.get_or_insert(MinuteWindow {
            start: minute,
            count: 0,
        });
        if window.start != minute {
            window.start = minute;
            window.count = 0;
        }
        window.count = window.count.saturating_add(amount);

        let day = now.date();
        let daily = self.snapshot.daily.get_or_insert(DayWindow {
            date: day,
            count: 0,
        });
        if daily.date != day {
            daily.date = day;
            daily.count = 0;
        }
        daily.count = daily.count.saturating_add(amount);
    }

    fn daily_used(&self, day: Date) -> u32 {
        self.snapshot
            .daily
            .as_ref()
            .filter(|window| window.date == day)
            .map(|window| window.count)
            .unwrap_or(0)
    }

    fn status(&self, config: &RateLimitConfig, now: OffsetDateTime) -> RateStatus {
        let minute = minute_bucket(now);
        let minute_used = self
            .snapshot
            .minute
            .as_ref()
            .filter(|window| window.start == minute)
            .map(|window| window.count)
            .unwrap_or(0);
        let day = now.date();
        let daily_used = self.daily_used(day);

        RateStatus {
            minute_limit: config.per_minute.get(),
            minute_used,
            minute_remaining: config.per_minute.get().saturating_sub(minute_used),
            minute_reset_at: minute.checked_add(TimeDuration::minutes(1)).unwrap_or(now),
            daily_limit: config.daily_quota.map(NonZeroU32::get),
            daily_used,
            daily_remaining: config
                .daily_quota
                .map(|limit| limit.get().saturating_sub(daily_used)),
            daily_reset_at: day
                .next_day()
                .map(|next| next.midnight().assume_utc()),
        }
    }
}

fn minute_bucket(now: OffsetDateTime) -> OffsetDateTime {
    let start = time::Time::from_hms(now.hour(), now.minute(), 0).unwrap_or(time::Time::MIDNIGHT);
    now.replace_time(start)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UsageSnapshot {
    account: String,
    #[serde(default)]
    minute: Option<MinuteWindow>,
    #[serde(default)]
    daily: Option<DayWindow>,
}

impl UsageSnapshot {
    fn new(account: &str) -> Self {
        Self {
            account: account.to_string(),
            minute: None,
            daily: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MinuteWindow {
    #[serde(with = "time::serde::rfc3339")]
    start: OffsetDateTime,
    count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DayWindow {
    #[serde(with = "serde_date")]
    date: Date,
    count: u32,
}

mod serde_date {
    use super::*;

    const FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = date.format(FORMAT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Date::parse(&value, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Usage counters for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateStatus {
    pub minute_limit: u32,
    pub minute_used: u32,
    pub minute_remaining: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub minute_reset_at: OffsetDateTime,
    pub daily_limit: Option<u32>,
    pub daily_used: u32,
    pub daily_remaining: Option<u32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub daily_reset_at: Option<OffsetDateTime>,
}

#[derive(thiserror::Error, Debug)]
pub enum RateLimitError {
    #[error("I/O error at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize usage file: {0}")]
    Deserialize(#[source] serde_json::Error),
    #[error("failed to serialize usage file: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("daily request quota of {limit} reached; try again tomorrow or raise daily_quota")]
    DailyQuotaExhausted { limit: u32 },
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::time::Instant;

    fn temp_paths() -> (ConfigPaths, tempfile::TempDir) {
        let tmp = tempdir().expect("tempdir");
        let paths = ConfigPaths::from_base_dir(tmp.path());
        (paths, tmp)
    }

    fn nz(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).expect("non zero")
    }

    #[tokio::test]
    async fn records_and_persists_usage() {
        let (paths, _guard) = temp_paths();
        let limiter = RateLimiter::new(paths.clone(), "main", RateLimitConfig::new(nz(10)))
            .await
            .expect("limiter");
        let now = OffsetDateTime::now_utc();
        limiter.record_success(now).await.expect("record");
        let status = limiter.record_success(now).await.expect("record");
        assert_eq!(status.minute_used, 2);
        assert_eq!(status.minute_remaining, 8);

        let reloaded = RateLimiter::new(paths, "main", RateLimitConfig::new(nz(10)))
            .await
            .expect("reloaded");
        let status = reloaded.status(now).await.expect("status");
        assert_eq!(status.minute_used, 2);
        assert_eq!(status.daily_used, 2);
    }

    #[tokio::test]
    async fn minute_window_resets_after_boundary() {
        let (paths, _guard) = temp_paths();
        let limiter = RateLimiter::new(paths, "main", RateLimitConfig::new(nz(5)))
            .await
            .expect("limiter");
        let now = OffsetDateTime::now_utc();
        limiter.record_success(now).await.expect("record");
        let next_minute = minute_bucket(now) + TimeDuration::minutes(1);
        let status = limiter.status(next_minute).await.expect("status");
        assert_eq!(status.minute_used, 0);
        assert_eq!(status.minute_remaining, 5);
    }

    #[tokio::test]
    async fn daily_quota_is_enforced_before_sending() {
        let (paths, _guard) = temp_paths();
        let config = RateLimitConfig::new(nz(100)).with_daily_quota(Some(nz(1)));
        let limiter = RateLimiter::new(paths, "main", config)
            .await
            .expect("limiter");
        limiter.acquire().await.expect("first request");
        limiter
            .record_success(OffsetDateTime::now_utc())
            .await
            .expect("record");
        let err = limiter.acquire().await.expect_err("quota exhausted");
        assert!(matches!(err, RateLimitError::DailyQuotaExhausted { limit: 1 }));
    }

    #[tokio::test]
    async fn limiter_waits_when_quota_exceeded() {
        let (paths, _guard) = temp_paths();
        let quota = Quota::per_second(nz(1));
        let config = RateLimitConfig::new(nz(1)).with_quota(quota);
        let limiter = RateLimiter::new(paths, "main", config)
            .await
            .expect("limiter");

        limiter.acquire().await.expect("first");
        let start = Instant::now();
        limiter.acquire().await.expect("second");
        assert!(start.elapsed() >= StdDuration::from_millis(900));
    }
}

use crate::client::v1::{DraftList, DraftSummary, Notification, NotificationList};
use crate::client::v2::Draft;
use crate::client::ApiVersion;
use serde::Serialize;
use std::collections::BTreeMap;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

/// Combined view built from two read endpoints of one account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalyticsReport {
    pub account: String,
    pub api_version: ApiVersion,
    pub period: String,
    pub days: u32,
    pub summary: AnalyticsSummary,
    pub recently_published: Vec<PublishedItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub activity_notifications: Vec<Notification>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upcoming: Vec<PublishedItem>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AnalyticsSummary {
    pub published_count: usize,
    /// Published items whose date falls inside the period; undated items are not counted.
    pub published_in_period: usize,
    pub total_posts: u32,
    pub scheduled_count: usize,
    pub failed_publishes: usize,
    pub notification_actions: BTreeMap<String, usize>,
}

/// A published or scheduled draft, flattened across API revisions.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PublishedItem {
    pub id: String,
    pub preview: Option<String>,
    pub posts: Option<u32>,
    pub date: Option<String>,
    pub url: Option<String>,
}

impl From<&DraftSummary> for PublishedItem {
    fn from(draft: &DraftSummary) -> Self {
        Self {
            id: draft.id.clone(),
            preview: draft
                .text_first_tweet
                .clone()
                .or_else(|| draft.text.clone()),
            posts: draft.num_tweets,
            date: draft
                .published_on
                .clone()
                .or_else(|| draft.scheduled_date.clone()),
            url: draft.url.clone(),
        }
    }
}

impl From<&Draft> for PublishedItem {
    fn from(draft: &Draft) -> Self {
        Self {
            id: draft.id.clone(),
            preview: draft.preview.clone().or_else(|| draft.draft_title.clone()),
            posts: None,
            date: draft
                .published_at
                .clone()
                .or_else(|| draft.scheduled_date.clone()),
            url: draft.url.clone(),
        }
    }
}

pub fn period_label(days: u32) -> String {
    format!("Last {days} days")
}

pub fn build_v1_report(
    account: &str,
    days: u32,
    published: &DraftList,
    activity: &NotificationList,
    now: OffsetDateTime,
) -> AnalyticsReport {
    let items: Vec<PublishedItem> = published.drafts.iter().map(PublishedItem::from).collect();
    let mut summary = summarize_published(&items, days, now);
    summary.total_posts = published
        .drafts
        .iter()
        .map(|draft| draft.num_tweets.unwrap_or(1))
        .sum();
    for notification in &activity.notifications {
        let action = notification.action().unwrap_or("unknown").to_string();
        *summary.notification_actions.entry(action).or_default() += 1;
        if notification.success() == Some(false) {
            summary.failed_publishes += 1;
        }
    }
    AnalyticsReport {
        account: account.to_string(),
        api_version: ApiVersion::V1,
        period: period_label(days),
        days,
        summary,
        recently_published: items,
        activity_notifications: activity.notifications.clone(),
        upcoming: Vec::new(),
    }
}

pub fn build_v2_report(
    account: &str,
    days: u32,
    published: &[Draft],
    scheduled: &[Draft],
    now: OffsetDateTime,
) -> AnalyticsReport {
    let items: Vec<PublishedItem> = published.iter().map(PublishedItem::from).collect();
    let mut summary = summarize_published(&items, days, now);
    summary.total_posts = published.len() as u32;
    summary.scheduled_count = scheduled.len();
    summary.failed_publishes = published
        .iter()
        .chain(scheduled)
        .filter(|draft| draft.status.as_deref() == Some("error"))
        .count();
    AnalyticsReport {
        account: account.to_string(),
        api_version: ApiVersion::V2,
        period: period_label(days),
        days,
        summary,
        recently_published: items,
        activity_notifications: Vec::new(),
        upcoming: scheduled.iter().map(PublishedItem::from).collect(),
    }
}

fn summarize_published(items: &[PublishedItem], days: u32, now: OffsetDateTime) -> AnalyticsSummary {
    let cutoff = now - Duration::days(i64::from(days));
    let published_in_period = items
        .iter()
        .filter_map(|item| item.date.as_deref())
        .filter_map(|date| OffsetDateTime::parse(date, &Rfc3339).ok())
        .filter(|date| *date >= cutoff)
        .count();
    AnalyticsSummary {
        published_count: items.len(),
        published_in_period,
        ..AnalyticsSummary::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn drafts(value: serde_json::Value) -> DraftList {
        serde_json::from_value(value).expect("draft list")
    }

    #[test]
    fn v1_report_counts_period_posts_and_actions() {
        let now = datetime!(2024-11-15 12:00 UTC);
        let published = drafts(json!({
            "drafts": [
                { "id": "a", "num_tweets": 3, "published_on": "2024-11-14T09:00:00Z" },
                { "id": "b", "published_on": "2024-10-01T09:00:00Z" },
                { "id": "c", "num_tweets": 2, "published_on": "not a date" }
            ]
        }));
        let activity: NotificationList = serde_json::from_value(json!({
            "notifications": [
                { "id": "n1", "kind": "activity", "payload": { "action": "draft_published", "success": true } },
                { "id": "n2", "kind": "activity", "payload": { "action": "draft_published", "success": false } },
                { "id": "n3", "kind": "activity", "payload": { "action": "auto_plug_published" } }
            ]
        }))
        .expect("notifications");

        let report = build_v1_report("main", 7, &published, &activity, now);
        assert_eq!(report.period, "Last 7 days");
        assert_eq!(report.summary.published_count, 3);
        assert_eq!(report.summary.published_in_period, 1);
        assert_eq!(report.summary.total_posts, 6);
        assert_eq!(report.summary.failed_publishes, 1);
        assert_eq!(report.summary.notification_actions["draft_published"], 2);
        assert_eq!(report.summary.notification_actions["auto_plug_published"], 1);
    }

    #[test]
    fn v2_report_counts_upcoming_and_errors() {
        let now = datetime!(2024-11-15 12:00 UTC);
        let published: Vec<Draft> = serde_json::from_value(json!([
            { "id": 1, "status": "published", "published_at": "2024-11-15T08:00:00Z" },
            { "id": 2, "status": "error" }
        ]))
        .expect("published");
        let scheduled: Vec<Draft> = serde_json::from_value(json!([
            { "id": 3, "status": "scheduled", "scheduled_date": "2024-11-20T08:00:00Z" }
        ]))
        .expect("scheduled");

        let report = build_v2_report("brand", 30, &published, &scheduled, now);
        assert_eq!(report.summary.published_count, 2);
        assert_eq!(report.summary.published_in_period, 1);
        assert_eq!(report.summary.scheduled_count, 1);
        assert_eq!(report.summary.failed_publishes, 1);
        assert_eq!(report.upcoming[0].date.as_deref(), Some("2024-11-20T08:00:00Z"));
        let value = serde_json::to_value(&report).expect("serialise");
        assert!(value.get("activity_notifications").is_none());
    }
}

use crate::{
    client::{
        v1::{ContentFilter, Notification, NotificationKind},
        v2::{Draft, DraftStatus, Platform, SocialSet},
        ApiVersion, ClientError,
    },
    config::{
        accounts::{merge_accounts, AccountExport, AccountProfile, AccountRecord, AccountSource, AccountStore},
        env, ConfigPaths, Settings,
    },
    manager::{
        cross_post, AnalyticsReport, CrossPostResult, DraftInput, DraftOutcome, DraftQuery,
        DraftRow, DraftUpdate, OutcomeStatus, TypefullyManager,
    },
    rate_limit::RateStatus,
    Error,
};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "typefully", version = env!("CARGO_PKG_VERSION"), arg_required_else_help = true)]
pub struct Cli {
    /// Override the account alias to use for this invocation.
    #[arg(long, short = 'A', global = true)]
    pub account: Option<String>,

    /// Output format for command results.
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Human)]
    pub output: OutputFormat,

    /// Custom API base URL including the version segment (e.g. http://localhost:8080/v1/).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Configuration directory (defaults to the platform config dir).
    #[arg(long, global = true, env = "TYPEFULLY_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Env file with TYPEFULLY_API_KEY_<ACCOUNT> lines (defaults to <config-dir>/.env).
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Display current rate-limit usage.
    Status,
    /// Create, inspect, and cross-post drafts.
    Drafts {
        #[command(subcommand)]
        command: DraftsCommand,
    },
    /// Read or acknowledge notifications (v1 accounts).
    Notifications {
        #[command(subcommand)]
        command: NotificationsCommand,
    },
    /// Summarise recent publishing activity.
    Analytics {
        /// Days to look back.
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Social set name, username, or id (v2).
        #[arg(long)]
        social_set: Option<String>,
    },
    /// Browse social sets (v2 accounts).
    SocialSets {
        #[command(subcommand)]
        command: SocialSetsCommand,
    },
    /// Manage stored Typefully accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum DraftsCommand {
    /// Create a draft, or schedule it when scheduling is enabled.
    Create(CreateDraftArgs),
    /// Update an existing draft (v2).
    Update(UpdateDraftArgs),
    /// Show one draft (v2).
    Get(DraftRefArgs),
    /// Delete a draft (v2).
    Delete(DraftRefArgs),
    /// List scheduled and published drafts.
    List(ListDraftsArgs),
    /// Create one draft per account.
    CrossPost(CrossPostArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum NotificationsCommand {
    /// List the latest notifications.
    List {
        #[arg(long, value_enum, default_value_t = NotificationKind::Activity)]
        kind: NotificationKind,
    },
    /// Mark notifications as read.
    MarkRead {
        #[arg(long, value_enum)]
        kind: Option<NotificationKind>,
        /// Only mark notifications for this connected username.
        #[arg(long)]
        username: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SocialSetsCommand {
    /// List social sets of the account.
    List,
    /// Show a social set by name, username, or id.
    Show { social_set: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AccountsCommand {
    /// List configured accounts, including those from the env file.
    List,
    /// Add a new account alias.
    Add(AddAccountArgs),
    /// Set an existing account as default.
    Use { alias: String },
    /// Remove an account alias and its credentials.
    Remove { alias: String },
    /// Export account metadata without secrets.
    Export {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AddAccountArgs {
    /// Alias used to reference this account.
    #[arg(long)]
    pub alias: String,
    /// API key from Typefully settings.
    #[arg(long, env = "TYPEFULLY_API_KEY")]
    pub api_key: String,
    /// API revision the key belongs to (defaults to default_api_version).
    #[arg(long, value_enum)]
    pub api_version: Option<ApiVersion>,
    /// Default social set (name or id) for v2 accounts.
    #[arg(long)]
    pub social_set: Option<String>,
    /// Optional friendly label.
    #[arg(long)]
    pub label: Option<String>,
    /// Optional description for humans/LLMs.
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ContentArgs {
    /// Draft text; separate thread posts with four newlines.
    pub content: Option<String>,
    /// Read the draft text from a file.
    #[arg(long, conflicts_with = "content")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PostingArgs {
    /// Request scheduling (ignored unless scheduling_enabled is true).
    #[arg(long)]
    pub schedule: bool,
    /// ISO-8601 date or next-free-slot; used only with --schedule.
    #[arg(long = "schedule-date", alias = "date")]
    pub schedule_date: Option<String>,
    /// Social set name, username, or id (v2).
    #[arg(long)]
    pub social_set: Option<String>,
    /// Target platform (repeatable, v2; defaults to x).
    #[arg(long = "platform", value_enum)]
    pub platforms: Vec<Platform>,
    /// Draft title (v2).
    #[arg(long)]
    pub title: Option<String>,
    /// Tag to attach (repeatable, v2).
    #[arg(long = "tag")]
    pub tags: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CreateDraftArgs {
    #[command(flatten)]
    pub content: ContentArgs,
    #[command(flatten)]
    pub posting: PostingArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateDraftArgs {
    pub draft_id: String,
    /// Replacement text.
    #[arg(long)]
    pub content: Option<String>,
    /// Read the replacement text from a file.
    #[arg(long, conflicts_with = "content")]
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub posting: PostingArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DraftRefArgs {
    pub draft_id: String,
    #[arg(long)]
    pub social_set: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListDraftsArgs {
    #[arg(long, value_enum)]
    pub status: Option<DraftStatus>,
    /// Only threads or single tweets (v1 scheduled list).
    #[arg(long, value_enum)]
    pub filter: Option<ContentFilter>,
    #[arg(long)]
    pub social_set: Option<String>,
    /// Maximum number of drafts to show.
    #[arg(long)]
    pub limit: Option<u32>,
    /// Follow pagination until max_items (v2).
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CrossPostArgs {
    /// Accounts to post to.
    #[arg(long, num_args = 1.., value_delimiter = ',', required = true)]
    pub accounts: Vec<String>,
    /// Text used for every account without an entry in --content-json.
    #[arg(long)]
    pub content: Option<String>,
    /// JSON object mapping account alias to text.
    #[arg(long)]
    pub content_json: Option<PathBuf>,
    #[arg(long)]
    pub schedule: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

pub async fn execute(cli: Cli) -> Result<(), Error> {
    let paths = ConfigPaths::resolve(cli.config_dir.as_deref())?;
    let account_store = AccountStore::new(paths.clone())?;
    let settings = Settings::load(&paths)?;
    let env_accounts = load_env_accounts(&paths, cli.env_file.as_deref())?;
    let records = merge_accounts(
        account_store.records()?,
        env_accounts,
        settings.default_api_version,
    );

    if let Commands::Accounts { command } = &cli.command {
        return handle_account_command(&account_store, &records, &settings, command, cli.output);
    }

    let base_url = parse_base_url(cli.base_url.as_deref())?;
    let manager = TypefullyManager::connect(&paths, settings.clone(), records.clone(), base_url).await?;

    if let Commands::Drafts {
        command: DraftsCommand::CrossPost(args),
    } = &cli.command
    {
        let content = cross_post_content(args)?;
        let results = cross_post(&manager, &args.accounts, &content, args.schedule).await;
        return render_cross_post(&results, cli.output);
    }

    let account = resolve_account(
        cli.account.as_deref(),
        account_store.default_alias()?,
        &settings,
        &records,
    )?;
    tracing::debug!(account = %account, "resolved account");

    match &cli.command {
        Commands::Status => {
            let status = manager.rate_status(&account).await?;
            render_status(&account, status.as_ref(), cli.output)?;
        }
        Commands::Drafts { command } => {
            handle_drafts_command(&manager, &account, command, cli.output).await?;
        }
        Commands::Notifications {
            command: NotificationsCommand::List { kind },
        } => {
            let list = manager.notifications(&account, *kind).await?;
            render_notifications(&list.notifications, cli.output)?;
        }
        Commands::Notifications {
            command: NotificationsCommand::MarkRead { kind, username },
        } => {
            let response = manager
                .mark_notifications_read(&account, *kind, username.as_deref())
                .await?;
            match cli.output {
                OutputFormat::Human => println!("Marked notifications as read for '{account}'."),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
            }
        }
        Commands::Analytics { days, social_set } => {
            let report = manager
                .analytics(&account, *days, social_set.as_deref())
                .await?;
            render_analytics(&report, cli.output)?;
        }
        Commands::SocialSets {
            command: SocialSetsCommand::List,
        } => {
            let sets = manager.social_sets(&account).await?;
            render_social_sets(&sets, cli.output)?;
        }
        Commands::SocialSets {
            command: SocialSetsCommand::Show { social_set },
        } => {
            let set = manager.social_set(&account, social_set).await?;
            render_social_sets(std::slice::from_ref(&set), cli.output)?;
        }
        Commands::Accounts { .. } => unreachable!(),
    }

    Ok(())
}

async fn handle_drafts_command(
    manager: &TypefullyManager,
    account: &str,
    command: &DraftsCommand,
    format: OutputFormat,
) -> Result<(), Error> {
    match command {
        DraftsCommand::Create(args) => {
            let content = read_content(args.content.content.as_deref(), args.content.file.as_deref())?
                .ok_or_else(|| Error::Input("provide draft text or --file".into()))?;
            let posting = &args.posting;
            let input = DraftInput {
                content,
                schedule: posting.schedule,
                schedule_date: posting.schedule_date.clone(),
                social_set: posting.social_set.clone(),
                platforms: posting.platforms.clone(),
                title: posting.title.clone(),
                tags: posting.tags.clone(),
            };
            let outcome = manager.create_draft(account, &input).await?;
            render_outcome(&outcome, format)?;
        }
        DraftsCommand::Update(args) => {
            let posting = &args.posting;
            let update = DraftUpdate {
                content: read_content(args.content.as_deref(), args.file.as_deref())?,
                platforms: posting.platforms.clone(),
                schedule: posting.schedule,
                schedule_date: posting.schedule_date.clone(),
                social_set: posting.social_set.clone(),
                title: posting.title.clone(),
                tags: posting.tags.clone(),
            };
            let outcome = manager.update_draft(account, &args.draft_id, &update).await?;
            render_outcome(&outcome, format)?;
        }
        DraftsCommand::Get(args) => {
            let draft = manager
                .get_draft(account, &args.draft_id, args.social_set.as_deref())
                .await?;
            render_draft(&draft, format)?;
        }
        DraftsCommand::Delete(args) => {
            manager
                .delete_draft(account, &args.draft_id, args.social_set.as_deref())
                .await?;
            match format {
                OutputFormat::Human => println!("Deleted draft '{}'.", args.draft_id),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "deleted": true,
                        "id": args.draft_id,
                    }))?
                ),
            }
        }
        DraftsCommand::List(args) => {
            let query = DraftQuery {
                status: args.status,
                content_filter: args.filter,
                social_set: args.social_set.clone(),
                limit: args.limit,
                all: args.all,
            };
            let rows = manager.list_drafts(account, &query).await?;
            render_draft_rows(&rows, format)?;
        }
        DraftsCommand::CrossPost(_) => unreachable!(),
    }
    Ok(())
}

fn parse_base_url(base: Option<&str>) -> Result<Option<Url>, Error> {
    base.map(Url::parse)
        .transpose()
        .map_err(|err| Error::Client(ClientError::InvalidBaseUrl(err)))
}

/// Env accounts from an explicit file, the default `.env` when present, and
/// the process environment.
fn load_env_accounts(paths: &ConfigPaths, explicit: Option<&Path>) -> Result<Vec<env::EnvAccount>, Error> {
    let accounts = match explicit {
        Some(path) => env::discover(path)?,
        None if paths.env_file().exists() => env::discover(&paths.env_file())?,
        None => env::scan(std::env::vars()),
    };
    Ok(accounts)
}

/// Pick the account for this invocation: explicit flag, stored default,
/// `default_account` from settings, then the only configured account.
pub fn resolve_account(
    override_alias: Option<&str>,
    stored_default: Option<String>,
    settings: &Settings,
    records: &BTreeMap<String, AccountRecord>,
) -> Result<String, Error> {
    if let Some(alias) = override_alias {
        return Ok(alias.to_string());
    }
    if let Some(alias) = stored_default.or_else(|| settings.default_account.clone()) {
        return Ok(alias);
    }
    let mut aliases = records.keys();
    match (aliases.next(), aliases.next()) {
        (Some(only), None) => Ok(only.clone()),
        _ => Err(Error::NoDefaultAccount),
    }
}

fn read_content(inline: Option<&str>, file: Option<&Path>) -> Result<Option<String>, Error> {
    match (inline, file) {
        (Some(text), _) => Ok(Some(text.to_string())),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map(Some)
            .map_err(|source| Error::ReadInput {
                path: path.to_path_buf(),
                source,
            }),
        (None, None) => Ok(None),
    }
}

fn cross_post_content(args: &CrossPostArgs) -> Result<BTreeMap<String, String>, Error> {
    let mut content = BTreeMap::new();
    if let Some(text) = &args.content {
        for account in &args.accounts {
            content.insert(account.clone(), text.clone());
        }
    }
    if let Some(path) = &args.content_json {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ReadInput {
            path: path.clone(),
            source,
        })?;
        let mapped: BTreeMap<String, String> = serde_json::from_str(&raw)?;
        content.extend(mapped);
    }
    if content.is_empty() {
        return Err(Error::Input("provide --content or --content-json".into()));
    }
    Ok(content)
}

fn render_status(account: &str, status: Option<&RateStatus>, format: OutputFormat) -> Result<(), Error> {
    let Some(status) = status else {
        println!("No usage recorded for '{account}'.");
        return Ok(());
    };
    match format {
        OutputFormat::Human => {
            println!(
                "Minute usage: {}/{} (resets at {})",
                status.minute_used, status.minute_limit, status.minute_reset_at
            );
            match (status.daily_limit, status.daily_reset_at) {
                (Some(limit), Some(reset)) => println!(
                    "Daily usage: {}/{limit} (remaining {}) - resets at {reset}",
                    status.daily_used,
                    status.daily_remaining.unwrap_or(0)
                ),
                _ => println!("Daily usage: {} (no daily quota)", status.daily_used),
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(status)?);
        }
    }
    Ok(())
}

fn render_outcome(outcome: &DraftOutcome, format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            match (outcome.status, &outcome.scheduled_date) {
                (OutcomeStatus::Scheduled, Some(date)) => {
                    println!("Draft scheduled for {date} on '{}'", outcome.account)
                }
                _ => println!("Draft created on '{}'", outcome.account),
            }
            if let Some(url) = &outcome.url {
                println!("Edit: {url}");
            }
            if let Some(share_url) = &outcome.share_url {
                println!("Preview: {share_url}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome)?);
        }
    }
    Ok(())
}

fn render_draft(draft: &Draft, format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            let rows = vec![DraftTableRow::from(&DraftRow::from(draft))];
            println!("{}", Table::new(rows));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(draft)?);
        }
    }
    Ok(())
}

fn render_draft_rows(rows: &[DraftRow], format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            if rows.is_empty() {
                println!("No drafts found.");
                return Ok(());
            }
            let table_rows: Vec<_> = rows.iter().map(DraftTableRow::from).collect();
            println!("{}", Table::new(table_rows));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
    }
    Ok(())
}

fn render_notifications(notifications: &[Notification], format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            if notifications.is_empty() {
                println!("No notifications.");
                return Ok(());
            }
            let rows: Vec<_> = notifications.iter().map(NotificationRow::from).collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(notifications)?);
        }
    }
    Ok(())
}

fn render_analytics(report: &AnalyticsReport, format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            let summary = &report.summary;
            println!("{} ({}) - {}", report.account, report.api_version, report.period);
            println!(
                "Published: {} ({} in period, {} posts)",
                summary.published_count, summary.published_in_period, summary.total_posts
            );
            if report.api_version == ApiVersion::V2 {
                println!("Scheduled: {}", summary.scheduled_count);
            }
            println!("Failed publishes: {}", summary.failed_publishes);
            for (action, count) in &summary.notification_actions {
                println!("  {action}: {count}");
            }
            if !report.recently_published.is_empty() {
                let rows: Vec<_> = report
                    .recently_published
                    .iter()
                    .map(|item| PublishedRow {
                        id: item.id.clone(),
                        date: or_na(&item.date),
                        preview: preview(item.preview.as_deref()),
                        url: or_na(&item.url),
                    })
                    .collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

fn render_social_sets(sets: &[SocialSet], format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            let rows: Vec<_> = sets.iter().map(SocialSetRow::from).collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(sets)?);
        }
    }
    Ok(())
}

fn render_cross_post(results: &BTreeMap<String, CrossPostResult>, format: OutputFormat) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            let rows: Vec<_> = results
                .iter()
                .map(|(account, result)| match result {
                    CrossPostResult::Posted(outcome) => CrossPostRow {
                        account: account.clone(),
                        status: match outcome.status {
                            OutcomeStatus::Scheduled => "scheduled".into(),
                            OutcomeStatus::Drafted => "drafted".into(),
                        },
                        detail: or_na(&outcome.url),
                    },
                    CrossPostResult::Failed { error } => CrossPostRow {
                        account: account.clone(),
                        status: "failed".into(),
                        detail: error.clone(),
                    },
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
    }
    Ok(())
}

fn handle_account_command(
    store: &AccountStore,
    records: &BTreeMap<String, AccountRecord>,
    settings: &Settings,
    command: &AccountsCommand,
    format: OutputFormat,
) -> Result<(), Error> {
    match command {
        AccountsCommand::List => {
            render_account_list(records, format)?;
        }
        AccountsCommand::Add(args) => {
            store.add_account(
                &args.alias,
                &args.api_key,
                AccountProfile {
                    label: args.label.clone(),
                    description: args.description.clone(),
                    api_version: args.api_version.unwrap_or(settings.default_api_version),
                    social_set: args.social_set.clone(),
                },
            )?;
            println!("Added account '{}'.", args.alias);
        }
        AccountsCommand::Use { alias } => {
            store.set_default(alias)?;
            println!("Set '{}' as the default account.", alias);
        }
        AccountsCommand::Remove { alias } => {
            store.remove_account(alias)?;
            println!("Removed account '{}'.", alias);
        }
        AccountsCommand::Export { json } => {
            let exports = store.export_accounts()?;
            if *json || matches!(format, OutputFormat::Json) {
                println!("{}", serde_json::to_string_pretty(&exports)?);
            } else {
                let rows: Vec<_> = exports.iter().map(ExportRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
    }
    Ok(())
}

fn render_account_list(
    records: &BTreeMap<String, AccountRecord>,
    format: OutputFormat,
) -> Result<(), Error> {
    match format {
        OutputFormat::Human => {
            if records.is_empty() {
                println!("No accounts configured. Add one with `typefully accounts add` or a TYPEFULLY_API_KEY_<ACCOUNT> line in .env.");
                return Ok(());
            }
            let rows: Vec<_> = records.values().map(AccountRow::from).collect();
            println!("{}", Table::new(rows));
        }
        OutputFormat::Json => {
            let payload: Vec<_> = records
                .values()
                .map(|account| {
                    serde_json::json!({
                        "alias": account.alias,
                        "label": account.profile.label,
                        "description": account.profile.description,
                        "api_version": account.profile.api_version,
                        "social_set": account.profile.social_set,
                        "source": account.source,
                        "default": account.is_default,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }
    Ok(())
}

fn or_na(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "n/a".into())
}

fn yes_no(flag: bool) -> String {
    let text = if flag { "yes" } else { "no" };
    text.to_string()
}

/// First line of a draft, capped for table cells.
fn preview(text: Option<&str>) -> String {
    const MAX_CHARS: usize = 60;
    let Some(text) = text else {
        return "n/a".into();
    };
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > MAX_CHARS {
        let cut: String = line.chars().take(MAX_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[derive(Tabled)]
struct DraftTableRow {
    id: String,
    status: String,
    date: String,
    preview: String,
    url: String,
}

impl From<&DraftRow> for DraftTableRow {
    fn from(row: &DraftRow) -> Self {
        Self {
            id: row.id.clone(),
            status: row.status.clone(),
            date: or_na(&row.date),
            preview: preview(row.preview.as_deref()),
            url: or_na(&row.url),
        }
    }
}

#[derive(Tabled)]
struct NotificationRow {
    id: String,
    kind: String,
    action: String,
}

impl From<&Notification> for NotificationRow {
    fn from(notification: &Notification) -> Self {
        Self {
            id: or_na(&notification.id),
            kind: or_na(&notification.kind),
            action: notification.action().unwrap_or("n/a").to_string(),
        }
    }
}

#[derive(Tabled)]
struct PublishedRow {
    id: String,
    date: String,
    preview: String,
    url: String,
}

#[derive(Tabled)]
struct SocialSetRow {
    id: String,
    name: String,
    username: String,
}

impl From<&SocialSet> for SocialSetRow {
    fn from(set: &SocialSet) -> Self {
        Self {
            id: set.id.clone(),
            name: or_na(&set.name),
            username: or_na(&set.username),
        }
    }
}

#[derive(Tabled)]
struct CrossPostRow {
    account: String,
    status: String,
    detail: String,
}

#[derive(Tabled)]
struct AccountRow {
    alias: String,
    version: String,
    label: String,
    source: String,
    default: String,
}

impl From<&AccountRecord> for AccountRow {
    fn from(record: &AccountRecord) -> Self {
        Self {
            alias: record.alias.clone(),
            version: record.profile.api_version.to_string(),
            label: or_na(&record.profile.label),
            source: match record.source {
                AccountSource::Stored => "stored".into(),
                AccountSource::Environment => "env".into(),
            },
            default: yes_no(record.is_default),
        }
    }
}

#[derive(Tabled)]
struct ExportRow {
    alias: String,
    version: String,
    label: String,
    social_set: String,
    default: String,
    description: String,
}

impl From<&AccountExport> for ExportRow {
    fn from(export: &AccountExport) -> Self {
        Self {
            alias: export.alias.clone(),
            version: export.api_version.to_string(),
            label: or_na(&export.label),
            social_set: or_na(&export.social_set),
            default: yes_no(export.is_default),
            description: export.description.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(alias: &str) -> (String, AccountRecord) {
        (
            alias.to_string(),
            AccountRecord {
                alias: alias.to_string(),
                api_key: "key".into(),
                profile: AccountProfile::default(),
                is_default: false,
                source: AccountSource::Environment,
            },
        )
    }

    #[test]
    fn resolve_account_prefers_flag_then_defaults() {
        let records: BTreeMap<_, _> = [record("a"), record("b")].into_iter().collect();
        let settings = Settings {
            default_account: Some("b".into()),
            ..Settings::default()
        };

        let chosen = resolve_account(Some("x"), Some("a".into()), &settings, &records).expect("flag");
        assert_eq!(chosen, "x");
        let chosen = resolve_account(None, Some("a".into()), &settings, &records).expect("stored");
        assert_eq!(chosen, "a");
        let chosen = resolve_account(None, None, &settings, &records).expect("settings");
        assert_eq!(chosen, "b");
        let err = resolve_account(None, None, &Settings::default(), &records).expect_err("ambiguous");
        assert!(matches!(err, Error::NoDefaultAccount));
    }

    #[test]
    fn resolve_account_uses_single_account() {
        let records: BTreeMap<_, _> = [record("solo")].into_iter().collect();
        let chosen = resolve_account(None, None, &Settings::default(), &records).expect("single");
        assert_eq!(chosen, "solo");
    }

    #[test]
    fn cross_post_content_merges_shared_and_mapped_text() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("content.json");
        std::fs::write(&path, r#"{ "b": "for b", "c": "for c" }"#).expect("write");
        let args = CrossPostArgs {
            accounts: vec!["a".into(), "b".into()],
            content: Some("shared".into()),
            content_json: Some(path),
            schedule: false,
        };
        let content = cross_post_content(&args).expect("content");
        assert_eq!(content["a"], "shared");
        assert_eq!(content["b"], "for b");
        assert_eq!(content["c"], "for c");
    }

    #[test]
    fn preview_truncates_first_line() {
        assert_eq!(preview(Some("short\nsecond")), "short");
        let long = "x".repeat(80);
        assert_eq!(preview(Some(&long)).chars().count(), 60);
        assert_eq!(preview(None), "n/a");
    }

    #[test]
    fn cli_parses_cross_post_accounts() {
        let cli = Cli::try_parse_from([
            "typefully",
            "drafts",
            "cross-post",
            "--accounts",
            "a,b",
            "--content",
            "hi",
        ])
        .expect("parse");
        match cli.command {
            Commands::Drafts {
                command: DraftsCommand::CrossPost(args),
            } => assert_eq!(args.accounts, vec!["a", "b"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_analytics_social_set() {
        let cli = Cli::try_parse_from([
            "typefully",
            "analytics",
            "--days",
            "30",
            "--social-set",
            "Founder",
        ])
        .expect("parse");
        match cli.command {
            Commands::Analytics { days, social_set } => {
                assert_eq!(days, 30);
                assert_eq!(social_set.as_deref(), Some("Founder"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

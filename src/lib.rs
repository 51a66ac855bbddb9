use clap::Parser;
use std::path::PathBuf;

pub mod cli;
pub mod client;
pub mod config;
pub mod logging;
pub mod manager;
pub mod rate_limit;

/// Entry point used by the binary crate.
pub fn run() -> Result<(), crate::Error> {
    let cli = cli::Cli::parse();
    logging::init(cli.verbose);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(cli::execute(cli))
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Accounts(#[from] config::accounts::AccountStoreError),
    #[error(transparent)]
    RateLimit(#[from] rate_limit::RateLimitError),
    #[error(transparent)]
    Client(#[from] client::ClientError),
    #[error(transparent)]
    Manager(#[from] manager::ManagerError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Runtime(#[from] std::io::Error),
    #[error("failed to read {path:?}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Input(String),
    #[error(
        "no default account configured; add one with `typefully accounts add`, set TYPEFULLY_API_KEY_<ACCOUNT> in .env, or pass --account"
    )]
    NoDefaultAccount,
}

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Variable read for filter directives, e.g. `TYPEFULLY_LOG=typefully_cli=debug`.
pub const LOG_ENV: &str = "TYPEFULLY_LOG";

/// Level used when `TYPEFULLY_LOG` is unset; each `-v` raises it one step.
pub fn default_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the stderr subscriber. Stdout stays reserved for command output.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(default_level(verbosity).into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    // a subscriber may already be set when embedded or under test
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .try_init();
}

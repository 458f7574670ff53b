//! Tracing subscriber setup shared by the daemon and tools.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level`; a level that does not parse means `info`.
/// Fails if a subscriber is already installed.
pub fn init(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(filter_for(level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.trim()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

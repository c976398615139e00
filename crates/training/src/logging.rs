//! Tracing setup for the command-line tools.

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Install a global subscriber writing to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let subscriber = Registry::default().with(env_filter).with(stderr_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;
    Ok(())
}

//! Logging setup for the command line front end.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// HTTP client internals are noisy at debug; keep them at warn unless
/// `RUST_LOG` says otherwise.
const QUIET_DEPS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"];

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let mut directives = vec![level.to_string()];
            directives.extend(QUIET_DEPS.iter().map(|d| d.to_string()));
            EnvFilter::try_new(directives.join(","))
                .map_err(|e| anyhow::anyhow!("invalid log level {level:?}: {e}"))?
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}

//! Log setup for applications embedding the sync core.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter, e.g. `kpt_sync=debug`.
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

/// Install a global fmt subscriber filtered by `LOG_LEVEL` (default INFO).
///
/// Fails if the host already installed a global subscriber.
pub fn init_tracing() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var(LOG_LEVEL_VAR)
                .from_env_lossy(),
        )
        .try_init()
}

pub mod commands;
pub mod executor;
pub mod models;
pub mod updaters;
pub mod utils;

pub use commands::{SelfUpdater, UpdateOutcome, UpdatePrompt, XmlSettingsStore};
pub use executor::{CancelToken, Downloader, Installer};
pub use models::{UpdateChoice, UpdateInfo, UpdaterConfig};
pub use utils::{Logger, UpdaterError, UpdaterResult};

/// Install `env_logger` with an `info` default, overridable through `RUST_LOG`.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

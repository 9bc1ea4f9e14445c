pub mod self_update;
pub mod settings;

pub use self_update::{SelfUpdater, UpdateOutcome, UpdatePrompt};
pub use settings::{default_settings_path, XmlSettingsStore, SETTINGS_FILE_NAME};

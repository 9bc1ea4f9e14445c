use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::{SettingsStore, UpdaterConfig};
use crate::utils::xml_settings::{parse_settings_xml, render_settings_xml};
use crate::utils::{Logger, SettingsError};

pub const SETTINGS_FILE_NAME: &str = "updaterConfig.xml";

/// `<config dir>/<program>/updaterConfig.xml`, falling back to the working directory.
pub fn default_settings_path(program_name: &str) -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(program_name))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(SETTINGS_FILE_NAME)
}

/// Updater settings persisted as a flat XML document.
pub struct XmlSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
    defaults: BTreeMap<String, String>,
    logger: Arc<dyn Logger>,
}

impl XmlSettingsStore {
    pub fn new(path: impl Into<PathBuf>, logger: Arc<dyn Logger>) -> Self {
        Self {
            path: path.into(),
            values: BTreeMap::new(),
            defaults: BTreeMap::new(),
            logger,
        }
    }

    /// Load settings from `path`. A missing file is created empty and the
    /// store starts out with no values (call [`Self::define_defaults`]).
    pub fn load(path: impl Into<PathBuf>, logger: Arc<dyn Logger>) -> Result<Self, SettingsError> {
        let mut store = Self::new(path, logger);
        store.reload()?;
        Ok(store)
    }

    pub fn reload(&mut self) -> Result<(), SettingsError> {
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if !self.path.exists() {
            self.logger.warn("Updater configuration file not found!");
            self.logger.info("Creating new configuration file...");
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
            std::fs::File::create(&self.path).map_err(io_err)?;
            self.logger.info(&format!(
                "Updater configuration file successfully created at {}",
                self.path.display()
            ));
            return Ok(());
        }

        let xml = std::fs::read_to_string(&self.path).map_err(io_err)?;
        let loaded = parse_settings_xml(&xml)?;
        self.values.extend(loaded);
        self.logger.info(&format!(
            "Loaded updater configuration from file: {}",
            self.path.display()
        ));
        Ok(())
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let xml = render_settings_xml(&self.values)?;
        std::fs::write(&self.path, xml).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.logger.info(&format!(
            "Updater configuration saved to file: {}",
            self.path.display()
        ));
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_default(&self, key: &str) -> Option<&str> {
        self.defaults.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Install defaults. They become the live values only when nothing has
    /// been loaded or set yet.
    pub fn define_defaults(&mut self, defaults: BTreeMap<String, String>) {
        if self.values.is_empty() {
            self.values = defaults.clone();
        }
        self.defaults = defaults;
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn config(&self) -> Result<UpdaterConfig, SettingsError> {
        UpdaterConfig::from_settings(self)
    }
}

impl SettingsStore for XmlSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildChannel, PROPERTY_PROGRAM_NAME};
    use crate::utils::MemoryLogger;

    fn defaults() -> BTreeMap<String, String> {
        let config = UpdaterConfig {
            update_url: "http://example.test/check".into(),
            program_name: "Foo".into(),
            version_string: "1.0".into(),
            build_channel: BuildChannel::Beta,
            check_on_startup: true,
            delete_old_version: false,
        };
        config.to_settings()
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);
        let logger = Arc::new(MemoryLogger::new());

        let store = XmlSettingsStore::load(&path, logger.clone()).unwrap();
        assert!(path.is_file());
        assert!(store.values().is_empty());
        assert!(logger.contains(log::Level::Warn, "not found"));

        // An empty file loads as an empty mapping.
        let again = XmlSettingsStore::load(&path, logger).unwrap();
        assert!(again.values().is_empty());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let logger = Arc::new(MemoryLogger::new());

        let mut store = XmlSettingsStore::load(&path, logger.clone()).unwrap();
        store.define_defaults(defaults());
        store.set("deleteOldVersion", "true");
        store.save().unwrap();

        let reloaded = XmlSettingsStore::load(&path, logger).unwrap();
        assert_eq!(reloaded.values(), store.values());
        let config = reloaded.config().unwrap();
        assert_eq!(config.build_channel, BuildChannel::Beta);
        assert!(config.delete_old_version);
    }

    #[test]
    fn test_defaults_do_not_override_loaded_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(
            &path,
            "<updaterConfiguration><programName>Bar</programName></updaterConfiguration>",
        )
        .unwrap();

        let mut store = XmlSettingsStore::load(&path, Arc::new(MemoryLogger::new())).unwrap();
        store.define_defaults(defaults());
        assert_eq!(store.get(PROPERTY_PROGRAM_NAME), Some("Bar"));
        assert_eq!(store.get_default(PROPERTY_PROGRAM_NAME), Some("Foo"));
        assert_eq!(store.get("updateURL"), None);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE_NAME);
        std::fs::write(&path, "<updaterConfiguration><a>").unwrap();
        assert!(matches!(
            XmlSettingsStore::load(&path, Arc::new(MemoryLogger::new())),
            Err(SettingsError::Xml(_))
        ));
    }

    #[test]
    fn test_default_settings_path() {
        let path = default_settings_path("Foo");
        assert!(path.ends_with(Path::new("Foo").join(SETTINGS_FILE_NAME)));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::update::{BuildChannel, UpdateQueryRequest};
use crate::utils::SettingsError;

pub const PROPERTY_UPDATE_URL: &str = "updateURL";
pub const PROPERTY_PROGRAM_NAME: &str = "programName";
pub const PROPERTY_VERSION_STRING: &str = "versionString";
pub const PROPERTY_BUILD_STATE: &str = "buildState";
pub const PROPERTY_CHECK_ON_STARTUP: &str = "checkOnStartup";
pub const PROPERTY_DELETE_OLD_VERSION: &str = "deleteOldVersion";

/// Read-only view of named string settings.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

impl SettingsStore for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterConfig {
    pub update_url: String,
    pub program_name: String,
    pub version_string: String,
    pub build_channel: BuildChannel,
    pub check_on_startup: bool,
    pub delete_old_version: bool,
}

impl UpdaterConfig {
    pub fn from_settings(store: &dyn SettingsStore) -> Result<Self, SettingsError> {
        let required = |key: &str| {
            store
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| SettingsError::MissingKey(key.to_string()))
        };

        let build_state = required(PROPERTY_BUILD_STATE)?;
        let build_channel: BuildChannel =
            build_state.parse().map_err(|_| SettingsError::InvalidValue {
                key: PROPERTY_BUILD_STATE.to_string(),
                value: build_state.clone(),
            })?;

        Ok(Self {
            update_url: required(PROPERTY_UPDATE_URL)?,
            program_name: required(PROPERTY_PROGRAM_NAME)?,
            version_string: required(PROPERTY_VERSION_STRING)?,
            build_channel,
            check_on_startup: parse_flag(store.get(PROPERTY_CHECK_ON_STARTUP)),
            delete_old_version: parse_flag(store.get(PROPERTY_DELETE_OLD_VERSION)),
        })
    }

    pub fn query_request(&self) -> UpdateQueryRequest {
        UpdateQueryRequest::new(
            self.update_url.clone(),
            self.program_name.clone(),
            self.version_string.clone(),
            self.build_channel,
        )
    }

    /// Flatten back into the key/value form the settings file stores.
    pub fn to_settings(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(PROPERTY_UPDATE_URL.to_string(), self.update_url.clone());
        m.insert(PROPERTY_PROGRAM_NAME.to_string(), self.program_name.clone());
        m.insert(PROPERTY_VERSION_STRING.to_string(), self.version_string.clone());
        m.insert(PROPERTY_BUILD_STATE.to_string(), self.build_channel.as_str().to_string());
        m.insert(PROPERTY_CHECK_ON_STARTUP.to_string(), self.check_on_startup.to_string());
        m.insert(PROPERTY_DELETE_OLD_VERSION.to_string(), self.delete_old_version.to_string());
        m
    }
}

fn parse_flag(value: Option<String>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

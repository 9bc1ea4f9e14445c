use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire format of `buildTimestamp`.
pub const BUILD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Human format used by [`UpdateInfo::details`].
pub const BUILD_DATE_DISPLAY_FORMAT: &str = "%B %d, %Y %I:%M:%S %p";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BuildChannel {
    All,
    Alpha,
    Beta,
    #[default]
    Stable,
}

impl BuildChannel {
    /// Value sent as the `buildState` query parameter.
    pub fn as_str(&self) -> &str {
        match self {
            BuildChannel::All => "*",
            BuildChannel::Alpha => "alpha",
            BuildChannel::Beta => "beta",
            BuildChannel::Stable => "stable",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            BuildChannel::All => "All",
            BuildChannel::Alpha => "Alpha",
            BuildChannel::Beta => "Beta",
            BuildChannel::Stable => "Stable",
        }
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown build channel: {0}")]
pub struct UnknownBuildChannel(pub String);

impl FromStr for BuildChannel {
    type Err = UnknownBuildChannel;

    /// Accepts either the query value or the display name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "*" | "all" => Ok(BuildChannel::All),
            "alpha" => Ok(BuildChannel::Alpha),
            "beta" => Ok(BuildChannel::Beta),
            "stable" => Ok(BuildChannel::Stable),
            _ => Err(UnknownBuildChannel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateQueryRequest {
    pub program_name: String,
    pub version_string: String,
    pub build_channel: BuildChannel,
    pub endpoint: String,
}

impl UpdateQueryRequest {
    pub fn new(
        endpoint: impl Into<String>,
        program_name: impl Into<String>,
        version_string: impl Into<String>,
        build_channel: BuildChannel,
    ) -> Self {
        Self {
            program_name: program_name.into(),
            version_string: version_string.into(),
            build_channel,
            endpoint: endpoint.into(),
        }
    }

    pub fn query_pairs(&self) -> [(&str, &str); 3] {
        [
            ("programName", self.program_name.as_str()),
            ("versionString", self.version_string.as_str()),
            ("buildState", self.build_channel.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub available: bool,
    pub version_string: String,
    pub build_state: String,
    pub build_timestamp: Option<NaiveDateTime>,
    pub download_url: String,
    pub description: String,
}

impl UpdateInfo {
    pub fn not_available() -> Self {
        Self::default()
    }

    /// Text shown when the user asks for more information about an update.
    pub fn details(&self) -> String {
        let build_date = self
            .build_timestamp
            .map(|ts| ts.format(BUILD_DATE_DISPLAY_FORMAT).to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "Version: {}\nBuild state: {}\nBuild date: {}\n\nDescription: {}",
            self.version_string, self.build_state, build_date, self.description
        )
    }
}

/// What the user decided when offered an update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateChoice {
    Proceed,
    Decline,
    ShowMoreInfo,
}

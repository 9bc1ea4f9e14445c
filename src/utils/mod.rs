pub mod command;
pub mod error;
pub mod http_client;
pub mod logger;
pub mod xml_settings;

pub use error::{
    DownloadError, InstallError, QueryError, SettingsError, UpdaterError, UpdaterResult,
};
pub use logger::{LogFacade, Logger, MemoryLogger};

/// File name of the last path segment of `url`, ignoring query and fragment.
/// Backslashes some servers emit as JSON escapes are dropped first.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(&url.replace('\\', "")).ok()?;
    let name = parsed.path_segments()?.next_back()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("http://example.test/foo-1.1.zip").as_deref(),
            Some("foo-1.1.zip")
        );
        assert_eq!(
            file_name_from_url("http:\\/\\/example.test\\/dl\\/foo.jar?token=abc").as_deref(),
            Some("foo.jar")
        );
        assert_eq!(file_name_from_url("http://example.test/"), None);
        assert_eq!(file_name_from_url("foo"), None);
    }
}

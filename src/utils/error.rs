use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid update URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP {code} - {message}")]
    HttpStatus { code: u16, message: String },

    #[error("Too many redirects while requesting {0}")]
    TooManyRedirects(String),

    #[error("Malformed update response: {0}")]
    MalformedResponse(String),

    #[error("Could not create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Invalid download URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Connection to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("HTTP {code} - {message}")]
    Http { code: u16, message: String },

    #[error("Too many redirects while downloading {0}")]
    TooManyRedirects(String),

    #[error("Server never reported a content length ({attempts} attempts)")]
    UnknownLength { attempts: u32 },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `partial_file` is set only when the destination was created.
    #[error("Download cancelled after {bytes_transferred} bytes")]
    Cancelled {
        partial_file: Option<PathBuf>,
        bytes_transferred: u64,
    },

    #[error("Could not create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("A download is already in progress")]
    AlreadyInProgress,

    #[error("Download task failed: {0}")]
    TaskFailed(String),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("{0}")]
    Usage(String),

    #[error("Error: file not found - {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to launch {}: {source}", .path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract installer from {} to {}: {source}", .from.display(), .to.display())]
    Payload {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Missing setting: {0}")]
    MissingKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("Update check failed: {0}")]
    Query(#[from] QueryError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Install failed: {0}")]
    Install(#[from] InstallError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl Serialize for UpdaterError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type UpdaterResult<T> = Result<T, UpdaterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = DownloadError::Http { code: 404, message: "Not Found".into() };
        assert_eq!(err.to_string(), "HTTP 404 - Not Found");

        let err = InstallError::NotFound(PathBuf::from("/tmp/missing.bin"));
        assert_eq!(err.to_string(), "Error: file not found - /tmp/missing.bin");
    }

    #[test]
    fn test_wrapped_error_serializes_as_string() {
        let err: UpdaterError = QueryError::ConnectionFailed("refused".into()).into();
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Update check failed: Connection failed: refused\"");
    }
}

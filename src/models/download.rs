use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Buffer size used when copying a response body to disk.
pub const CHUNK_SIZE: usize = 16 * 1024;
/// Connection attempts allowed while the server keeps omitting a content length.
pub const MAX_UNKNOWN_LENGTH_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != SessionStatus::InProgress
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    pub percent: u8,
}

/// Mutable state of a single download attempt.
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub url: String,
    pub destination: PathBuf,
    total_size: Option<u64>,
    bytes_transferred: u64,
    retry_count: u32,
    percent: u8,
    status: SessionStatus,
}

impl DownloadSession {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            total_size: None,
            bytes_transferred: 0,
            retry_count: 0,
            percent: 0,
            status: SessionStatus::InProgress,
        }
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn progress(&self) -> DownloadProgress {
        DownloadProgress {
            bytes_downloaded: self.bytes_transferred,
            total_bytes: self.total_size,
            percent: self.percent,
        }
    }

    /// Record a response without a content length. Returns `true` when another
    /// attempt may be made; once the cap is reached the session fails.
    pub fn record_unknown_length(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.retry_count += 1;
        if self.retry_count >= MAX_UNKNOWN_LENGTH_ATTEMPTS {
            self.status = SessionStatus::Failed;
            false
        } else {
            true
        }
    }

    /// Start the copy phase. Counters restart because the file is truncated.
    pub fn begin_transfer(&mut self, total_size: u64) {
        self.total_size = Some(total_size);
        self.bytes_transferred = 0;
        self.percent = 0;
    }

    /// Account for `len` more bytes. Returns the new rounded percentage when
    /// it went up, `None` otherwise. Errors if the declared size would be
    /// exceeded.
    pub fn record_chunk(&mut self, len: usize) -> Result<Option<u8>, u64> {
        let next = self.bytes_transferred + len as u64;
        if let Some(total) = self.total_size {
            if next > total {
                return Err(next);
            }
        }
        self.bytes_transferred = next;

        let pct = match self.total_size {
            Some(0) => 100,
            Some(total) => ((next as f64 / total as f64) * 100.0).round().min(100.0) as u8,
            None => 0,
        };
        if pct > self.percent {
            self.percent = pct;
            Ok(Some(pct))
        } else {
            Ok(None)
        }
    }

    /// Only an in-progress session can become cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.status == SessionStatus::InProgress {
            self.status = SessionStatus::Cancelled;
            true
        } else {
            false
        }
    }

    pub fn complete(&mut self) {
        if self.status == SessionStatus::InProgress {
            if self.total_size == Some(0) {
                self.percent = 100;
            }
            self.status = SessionStatus::Completed;
        }
    }

    pub fn fail(&mut self) {
        if self.status == SessionStatus::InProgress {
            self.status = SessionStatus::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_is_monotonic_and_capped() {
        let mut s = DownloadSession::new("http://x.test/a.bin", "/tmp/a.bin");
        s.begin_transfer(1000);
        assert_eq!(s.record_chunk(4), Ok(None));
        assert_eq!(s.record_chunk(2), Ok(Some(1)));
        assert_eq!(s.record_chunk(4), Ok(None));
        assert_eq!(s.record_chunk(990), Ok(Some(100)));
        assert_eq!(s.bytes_transferred(), 1000);
        assert_eq!(s.record_chunk(1), Err(1001));
        assert_eq!(s.bytes_transferred(), 1000);
    }

    #[test]
    fn test_unknown_length_cap() {
        let mut s = DownloadSession::new("http://x.test/a.bin", "/tmp/a.bin");
        let mut allowed = 0;
        while s.record_unknown_length() {
            allowed += 1;
        }
        assert_eq!(allowed, MAX_UNKNOWN_LENGTH_ATTEMPTS - 1);
        assert_eq!(s.retry_count(), MAX_UNKNOWN_LENGTH_ATTEMPTS);
        assert_eq!(s.status(), SessionStatus::Failed);
        assert!(!s.record_unknown_length());
        assert_eq!(s.retry_count(), MAX_UNKNOWN_LENGTH_ATTEMPTS);
    }

    #[test]
    fn test_cancel_only_from_in_progress() {
        let mut s = DownloadSession::new("http://x.test/a.bin", "/tmp/a.bin");
        assert!(s.cancel());
        assert!(!s.cancel());
        assert_eq!(s.status(), SessionStatus::Cancelled);
        s.complete();
        assert_eq!(s.status(), SessionStatus::Cancelled);

        let mut done = DownloadSession::new("http://x.test/a.bin", "/tmp/a.bin");
        done.complete();
        assert!(!done.cancel());
        assert_eq!(done.status(), SessionStatus::Completed);
    }

    #[test]
    fn test_zero_length_completes_at_full_percent() {
        let mut s = DownloadSession::new("http://x.test/empty", "/tmp/empty");
        s.begin_transfer(0);
        s.complete();
        assert_eq!(s.percent(), 100);
        assert_eq!(s.status(), SessionStatus::Completed);
    }
}

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::models::{DownloadProgress, DownloadSession, SessionStatus, CHUNK_SIZE, MAX_UNKNOWN_LENGTH_ATTEMPTS};
use crate::utils::http_client::{create_http_client, get_with_one_redirect};
use crate::utils::{DownloadError, Logger};

/// Shared flag the owner sets to stop a download at the next chunk boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the "download active" flag however the session ends.
struct ActiveGuard(Arc<AtomicBool>);

impl ActiveGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, DownloadError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| DownloadError::AlreadyInProgress)?;
        Ok(Self(flag.clone()))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs at most one download at a time.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    logger: Arc<dyn Logger>,
    active: Arc<AtomicBool>,
}

impl Downloader {
    pub fn new(client: reqwest::Client, logger: Arc<dyn Logger>) -> Self {
        Self {
            client,
            logger,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Result<Self, DownloadError> {
        let client = create_http_client().map_err(DownloadError::Client)?;
        Ok(Self::new(client, logger))
    }

    pub fn is_downloading(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Download on the current task, reporting progress through `on_progress`.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        on_progress: &(dyn Fn(&DownloadProgress) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<PathBuf, DownloadError> {
        let _guard = ActiveGuard::acquire(&self.active)?;
        download(&self.client, url, destination, on_progress, cancel, self.logger.as_ref()).await
    }

    /// Download on a background task. Progress arrives on the returned handle.
    pub fn spawn(
        &self,
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        cancel: CancelToken,
    ) -> Result<DownloadHandle, DownloadError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DownloadError::TaskFailed(e.to_string()))?;
        let guard = ActiveGuard::acquire(&self.active)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let logger = self.logger.clone();
        let url = url.into();
        let destination = destination.into();
        let task_cancel = cancel.clone();

        let task = runtime.spawn(async move {
            let _guard = guard;
            let forward = move |progress: &DownloadProgress| {
                let _ = tx.send(progress.clone());
            };
            download(&client, &url, &destination, &forward, &task_cancel, logger.as_ref()).await
        });

        Ok(DownloadHandle {
            cancel,
            progress: rx,
            task,
        })
    }
}

pub struct DownloadHandle {
    cancel: CancelToken,
    progress: mpsc::UnboundedReceiver<DownloadProgress>,
    task: JoinHandle<Result<PathBuf, DownloadError>>,
}

impl DownloadHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Next progress report; `None` once the download task has finished.
    pub async fn next_progress(&mut self) -> Option<DownloadProgress> {
        self.progress.recv().await
    }

    pub async fn wait(self) -> Result<PathBuf, DownloadError> {
        self.task
            .await
            .map_err(|e| DownloadError::TaskFailed(e.to_string()))?
    }
}

fn parse_download_url(url: &str) -> Result<Url, DownloadError> {
    let cleaned = url.replace('\\', "");
    Url::parse(&cleaned).map_err(|e| DownloadError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn io_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Fetch `url` into `destination`.
///
/// A response without a content length is retried immediately, up to
/// [`MAX_UNKNOWN_LENGTH_ATTEMPTS`] connections in total, after which the
/// download fails with [`DownloadError::UnknownLength`]. HTTP and mid-stream
/// errors are terminal. On cancellation or failure the partial file stays on
/// disk for the caller to dispose of.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    on_progress: &(dyn Fn(&DownloadProgress) + Send + Sync),
    cancel: &CancelToken,
    logger: &dyn Logger,
) -> Result<PathBuf, DownloadError> {
    let target = parse_download_url(url)?;
    let mut session = DownloadSession::new(target.as_str(), destination);
    let result = run_session(client, &target, &mut session, on_progress, cancel, logger).await;

    match &result {
        Ok(_) => logger.info("Download complete."),
        Err(DownloadError::Cancelled { .. }) => logger.info("Download cancelled by user."),
        Err(e) => logger.error(&format!("Download failed ({}): {}", session.status().as_str(), e)),
    }
    result
}

async fn run_session(
    client: &reqwest::Client,
    url: &Url,
    session: &mut DownloadSession,
    on_progress: &(dyn Fn(&DownloadProgress) + Send + Sync),
    cancel: &CancelToken,
    logger: &dyn Logger,
) -> Result<PathBuf, DownloadError> {
    let destination = session.destination.clone();

    let (response, total) = loop {
        if cancel.is_cancelled() {
            session.cancel();
            return Err(DownloadError::Cancelled {
                partial_file: None,
                bytes_transferred: 0,
            });
        }

        logger.info(&format!("Downloading update from {}...", url));
        let response = match get_with_one_redirect(client, url, &[], logger).await {
            Ok(r) => r,
            Err(e) => {
                session.fail();
                return Err(e.into());
            }
        };

        match response.content_length() {
            Some(total) => break (response, total),
            None => {
                drop(response);
                if !session.record_unknown_length() {
                    return Err(DownloadError::UnknownLength {
                        attempts: session.retry_count(),
                    });
                }
                logger.info(&format!(
                    "Retrying download... ({} of {})",
                    session.retry_count() + 1,
                    MAX_UNKNOWN_LENGTH_ATTEMPTS
                ));
            }
        }
    };

    session.begin_transfer(total);
    logger.info(&format!("File size: {} bytes", total));

    let mut file = match tokio::fs::File::create(&destination).await {
        Ok(f) => f,
        Err(e) => {
            session.fail();
            return Err(io_error(&destination, e));
        }
    };

    let copied = copy_body(response, &mut file, session, on_progress, cancel).await;
    // Flush on every exit path so the partial file holds exactly what was counted.
    let flushed = file.flush().await.map_err(|e| io_error(&destination, e));
    drop(file);

    if let Err(e) = copied.and(flushed) {
        session.fail();
        return Err(e);
    }

    if session.status() == SessionStatus::Cancelled {
        return Err(DownloadError::Cancelled {
            partial_file: Some(destination),
            bytes_transferred: session.bytes_transferred(),
        });
    }

    if session.bytes_transferred() < total {
        session.fail();
        return Err(io_error(
            &destination,
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "connection closed after {} of {} bytes",
                    session.bytes_transferred(),
                    total
                ),
            ),
        ));
    }

    session.complete();
    if total == 0 {
        on_progress(&session.progress());
    }
    Ok(destination)
}

async fn copy_body(
    response: reqwest::Response,
    file: &mut tokio::fs::File,
    session: &mut DownloadSession,
    on_progress: &(dyn Fn(&DownloadProgress) + Send + Sync),
    cancel: &CancelToken,
) -> Result<(), DownloadError> {
    let destination = session.destination.clone();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| io_error(&destination, std::io::Error::other(e)))?;

        for piece in chunk.chunks(CHUNK_SIZE) {
            if cancel.is_cancelled() {
                session.cancel();
                return Ok(());
            }

            let advanced = session.record_chunk(piece.len()).map_err(|received| {
                io_error(
                    &destination,
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!(
                            "received {} bytes, more than the declared {}",
                            received,
                            session.total_size().unwrap_or(0)
                        ),
                    ),
                )
            })?;

            file.write_all(piece)
                .await
                .map_err(|e| io_error(&destination, e))?;

            if advanced.is_some() {
                on_progress(&session.progress());
            }
        }
    }

    Ok(())
}

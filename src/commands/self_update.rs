use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::executor::{CancelToken, Downloader, Installer};
use crate::models::{DownloadProgress, InstallRequest, UpdateChoice, UpdateInfo, UpdaterConfig};
use crate::updaters::{HttpUpdateChecker, UpdateChecker};
use crate::utils::{file_name_from_url, DownloadError, InstallError, Logger, UpdaterError, UpdaterResult};

/// Front end that asks the user what to do and shows how the update is going.
pub trait UpdatePrompt: Send + Sync {
    fn choose(&self, update: &UpdateInfo) -> UpdateChoice;

    fn show_details(&self, details: &str);

    fn on_progress(&self, _progress: &DownloadProgress) {}

    fn on_error(&self, _error: &UpdaterError) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum UpdateOutcome {
    UpToDate,
    Declined,
    Cancelled,
    /// The installer is running; the application should exit with `exit_code`.
    HandedOff {
        #[serde(rename = "exitCode")]
        exit_code: i32,
    },
}

pub struct SelfUpdater {
    config: UpdaterConfig,
    checker: Arc<dyn UpdateChecker>,
    downloader: Downloader,
    installer: Installer,
    logger: Arc<dyn Logger>,
    download_dir: PathBuf,
    current_package: Option<PathBuf>,
}

impl SelfUpdater {
    pub fn new(
        config: UpdaterConfig,
        checker: Arc<dyn UpdateChecker>,
        downloader: Downloader,
        installer: Installer,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            config,
            checker,
            downloader,
            installer,
            logger,
            download_dir: std::env::temp_dir(),
            current_package: None,
        }
    }

    /// Wire up the HTTP checker, downloader and the helper shipped next to
    /// the running executable.
    pub fn from_config(config: UpdaterConfig, logger: Arc<dyn Logger>) -> UpdaterResult<Self> {
        let installer = Installer::from_current_exe(&config.program_name, logger.clone())?;
        Ok(Self::new(
            config,
            Arc::new(HttpUpdateChecker::with_logger(logger.clone())?),
            Downloader::with_logger(logger.clone())?,
            installer,
            logger,
        ))
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// The file replaced by the update. Defaults to the running executable.
    pub fn with_current_package(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_package = Some(path.into());
        self
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn should_check_on_startup(&self) -> bool {
        self.config.check_on_startup
    }

    pub async fn check(&self) -> UpdaterResult<UpdateInfo> {
        let request = self.config.query_request();
        Ok(self.checker.check_for_update(&request).await?)
    }

    /// Check, ask, download and hand off to the installer.
    pub async fn run(&self, prompt: &dyn UpdatePrompt, cancel: CancelToken) -> UpdaterResult<UpdateOutcome> {
        let result = self.run_inner(prompt, cancel).await;
        if let Err(ref e) = result {
            prompt.on_error(e);
        }
        result
    }

    async fn run_inner(&self, prompt: &dyn UpdatePrompt, cancel: CancelToken) -> UpdaterResult<UpdateOutcome> {
        let update = self.check().await?;
        if !update.available {
            return Ok(UpdateOutcome::UpToDate);
        }

        loop {
            match prompt.choose(&update) {
                UpdateChoice::Proceed => break,
                UpdateChoice::Decline => {
                    self.logger.info("Update declined.");
                    return Ok(UpdateOutcome::Declined);
                }
                UpdateChoice::ShowMoreInfo => prompt.show_details(&update.details()),
            }
        }

        let destination = self.download_destination(&update)?;
        let mut handle = self
            .downloader
            .spawn(update.download_url.clone(), destination.clone(), cancel)?;
        while let Some(progress) = handle.next_progress().await {
            prompt.on_progress(&progress);
        }

        let downloaded = match handle.wait().await {
            Ok(path) => path,
            Err(DownloadError::Cancelled { partial_file, .. }) => {
                if let Some(path) = partial_file {
                    remove_partial(&path, self.logger.as_ref());
                }
                return Ok(UpdateOutcome::Cancelled);
            }
            Err(e) => return Err(e.into()),
        };

        let exit_code = self.hand_off(&downloaded)?;
        Ok(UpdateOutcome::HandedOff { exit_code })
    }

    fn download_destination(&self, update: &UpdateInfo) -> UpdaterResult<PathBuf> {
        let file_name = file_name_from_url(&update.download_url).ok_or_else(|| {
            UpdaterError::Download(DownloadError::InvalidUrl {
                url: update.download_url.clone(),
                reason: "no file name in URL path".to_string(),
            })
        })?;
        Ok(self.download_dir.join(file_name))
    }

    fn hand_off(&self, new_package: &Path) -> UpdaterResult<i32> {
        let payload = self.installer.extract_installer_payload()?;
        let mut request = InstallRequest::new(new_package, payload).wait_for(std::process::id());

        if self.config.delete_old_version {
            let old = match self.current_package {
                Some(ref path) => path.clone(),
                None => std::env::current_exe().map_err(InstallError::from)?,
            };
            request = request.delete_old(old);
        }

        Ok(self.installer.relaunch(&request)?)
    }
}

fn remove_partial(path: &Path, logger: &dyn Logger) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => logger.warn(&format!(
            "Could not remove partial download {}: {}",
            path.display(),
            e
        )),
    }
}

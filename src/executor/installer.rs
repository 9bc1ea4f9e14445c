use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::models::InstallRequest;
use crate::utils::command::{make_executable, spawn_detached};
use crate::utils::{InstallError, Logger};

pub const INSTALLER_BIN_NAME: &str = "update-installer";
/// Exit code the application should terminate with after a successful handoff.
pub const EXIT_AFTER_HANDOFF: i32 = 0;

pub fn installer_file_name() -> String {
    format!("{}{}", INSTALLER_BIN_NAME, std::env::consts::EXE_SUFFIX)
}

/// `<temp>/<program>-installer`, outside anything the update replaces.
pub fn default_staging_dir(program_name: &str) -> PathBuf {
    let safe: String = program_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    std::env::temp_dir().join(format!("{}-installer", safe))
}

/// Stages the helper program and hands the update over to it.
pub struct Installer {
    payload_source: PathBuf,
    staging_dir: PathBuf,
    logger: Arc<dyn Logger>,
}

impl Installer {
    pub fn new(
        payload_source: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            payload_source: payload_source.into(),
            staging_dir: staging_dir.into(),
            logger,
        }
    }

    /// Use the helper binary shipped next to the running executable.
    pub fn from_current_exe(program_name: &str, logger: Arc<dyn Logger>) -> Result<Self, InstallError> {
        let exe = std::env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| InstallError::NotFound(exe.clone()))?;
        Ok(Self::new(
            dir.join(installer_file_name()),
            default_staging_dir(program_name),
            logger,
        ))
    }

    pub fn payload_source(&self) -> &Path {
        &self.payload_source
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Copy the helper into the staging directory so it can run after the
    /// main package has been replaced or deleted.
    pub fn extract_installer_payload(&self) -> Result<PathBuf, InstallError> {
        if !self.payload_source.is_file() {
            return Err(InstallError::NotFound(self.payload_source.clone()));
        }

        self.logger.info(&format!(
            "Extracting installer to {}",
            self.staging_dir.display()
        ));
        let target = self.staging_dir.join(installer_file_name());
        let payload_err = |source: std::io::Error| InstallError::Payload {
            from: self.payload_source.clone(),
            to: target.clone(),
            source,
        };

        std::fs::create_dir_all(&self.staging_dir).map_err(payload_err)?;
        std::fs::copy(&self.payload_source, &target).map_err(payload_err)?;
        make_executable(&target).map_err(payload_err)?;
        Ok(target)
    }

    /// Start the helper detached and return the exit code the caller should
    /// terminate with. The helper is never waited on.
    pub fn relaunch(&self, request: &InstallRequest) -> Result<i32, InstallError> {
        if !request.installer_payload.is_file() {
            return Err(InstallError::NotFound(request.installer_payload.clone()));
        }
        if !request.new_package.is_file() {
            return Err(InstallError::NotFound(request.new_package.clone()));
        }

        let args = request.to_args();
        self.logger.info(&format!(
            "Launching installer: {} {}",
            request.installer_payload.display(),
            args.iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        ));

        let mut cmd = Command::new(&request.installer_payload);
        cmd.args(&args);
        if let Some(dir) = request.installer_payload.parent() {
            cmd.current_dir(dir);
        }
        let child = spawn_detached(&mut cmd).map_err(|source| InstallError::Launch {
            path: request.installer_payload.clone(),
            source,
        })?;
        self.logger.info(&format!("Installer started (pid {})", child.id()));

        Ok(EXIT_AFTER_HANDOFF)
    }
}

use std::ffi::OsString;
use std::path::PathBuf;

/// Everything the helper process needs to swap versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub new_package: PathBuf,
    /// Removed by the helper after the new version starts.
    pub old_package: Option<PathBuf>,
    pub installer_payload: PathBuf,
    /// Process the helper waits on before touching any files.
    pub wait_pid: Option<u32>,
    /// Handed to the new version when the helper starts it.
    pub launch_args: Vec<OsString>,
}

impl InstallRequest {
    pub fn new(new_package: impl Into<PathBuf>, installer_payload: impl Into<PathBuf>) -> Self {
        Self {
            new_package: new_package.into(),
            old_package: None,
            installer_payload: installer_payload.into(),
            wait_pid: None,
            launch_args: Vec::new(),
        }
    }

    pub fn delete_old(mut self, old_package: impl Into<PathBuf>) -> Self {
        self.old_package = Some(old_package.into());
        self
    }

    pub fn wait_for(mut self, pid: u32) -> Self {
        self.wait_pid = Some(pid);
        self
    }

    pub fn launch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.launch_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Arguments passed to the helper: `[-w <pid>] [-d <old>] <new> [-- <launch args>..]`.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(pid) = self.wait_pid {
            args.push("-w".into());
            args.push(pid.to_string().into());
        }
        if let Some(ref old) = self.old_package {
            args.push("-d".into());
            args.push(old.clone().into_os_string());
        }
        args.push(self.new_package.clone().into_os_string());
        if !self.launch_args.is_empty() {
            args.push("--".into());
            args.extend(self.launch_args.iter().cloned());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_minimal() {
        let req = InstallRequest::new("/tmp/foo-1.1", "/tmp/installer");
        assert_eq!(req.to_args(), vec![OsString::from("/tmp/foo-1.1")]);
    }

    #[test]
    fn test_args_full() {
        let req = InstallRequest::new("/tmp/foo-1.1", "/tmp/installer")
            .delete_old("/opt/foo-1.0")
            .wait_for(4242);
        let args: Vec<String> = req
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-w", "4242", "-d", "/opt/foo-1.0", "/tmp/foo-1.1"]);
    }

    #[test]
    fn test_launch_args_follow_separator() {
        let req = InstallRequest::new("/tmp/foo-1.1", "/tmp/installer").launch_args(["--restart", "foo"]);
        let args: Vec<String> = req
            .to_args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["/tmp/foo-1.1", "--", "--restart", "foo"]);
    }
}

pub mod download;
pub mod install_helper;
pub mod installer;

pub use download::{download, CancelToken, DownloadHandle, Downloader};
pub use installer::{default_staging_dir, installer_file_name, Installer, EXIT_AFTER_HANDOFF};

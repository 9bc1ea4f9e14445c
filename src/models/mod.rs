pub mod download;
pub mod install;
pub mod settings;
pub mod update;

pub use download::*;
pub use install::*;
pub use settings::*;
pub use update::*;

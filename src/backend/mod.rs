use crate::error::Result;
use crate::utils::PackageName;
use serde::Deserialize;
use std::path::PathBuf;

pub mod command;
pub mod factory;

pub use command::CommandRunner;
pub use factory::BackendFactory;

/// One row of the package manager's "outdated" listing, exactly as reported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutdatedPackage {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "version", default)]
    pub current_version: String,
    #[serde(default)]
    pub latest_version: String,
}

impl OutdatedPackage {
    #[cfg(test)]
    pub fn new(
        name: impl Into<String>,
        current_version: impl Into<String>,
        latest_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            current_version: current_version.into(),
            latest_version: latest_version.into(),
        }
    }
}

/// The package manager as seen by the upgrade engine.
///
/// Names crossing this boundary are always validated [`PackageName`]s.
/// Implementations must honour a bounded timeout and report it as
/// [`GuardianError::TimedOut`](crate::error::GuardianError::TimedOut).
pub trait PackageBackend {
    fn list_outdated(&self) -> Result<Vec<OutdatedPackage>>;

    /// Raw "required by" entries; may contain blanks.
    fn show_reverse_dependencies(&self, name: &PackageName) -> Result<Vec<String>>;

    fn freeze_installed_state(&self) -> Result<String>;

    /// Upgrade one package to its latest version. A non-zero exit is an error.
    fn install_upgrade(&self, name: &PackageName) -> Result<()>;

    /// Try to load `module` in the target interpreter.
    fn probe_import(&self, module: &str) -> Result<()>;

    /// `sys.prefix` of the target interpreter when it runs inside a virtual
    /// environment, `None` when it runs from its base installation.
    fn virtualenv_prefix(&self) -> Result<Option<PathBuf>>;

    /// Interpreter path the backend drives, used for environment detection.
    fn interpreter(&self) -> &str;
}

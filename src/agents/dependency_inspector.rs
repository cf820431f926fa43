use crate::backend::PackageBackend;
use crate::error::Result;
use crate::utils::PackageName;
use std::collections::BTreeSet;

/// Answers "who depends on this package" for risk estimation.
pub struct DependencyInspector<'a> {
    backend: &'a dyn PackageBackend,
}

impl<'a> DependencyInspector<'a> {
    pub fn new(backend: &'a dyn PackageBackend) -> Self {
        Self { backend }
    }

    /// Installed packages that require `name`, blanks and duplicates removed.
    ///
    /// A failed lookup is returned rather than swallowed so the caller can warn
    /// the operator. The assessment step (`orchestrator::assess`) then classifies
    /// the package with an empty dependent set, so a lookup failure never blocks
    /// an upgrade.
    pub fn find_dependents(&self, name: &str) -> Result<BTreeSet<String>> {
        let name = PackageName::parse(name)?;
        let raw = self.backend.show_reverse_dependencies(&name)?;

        Ok(raw
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect())
    }
}

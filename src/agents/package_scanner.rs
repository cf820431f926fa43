use crate::agents::candidate::is_protected;
use crate::backend::{OutdatedPackage, PackageBackend};
use crate::error::Result;
use crate::utils::PackageName;

/// Result of one outdated-package scan.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub packages: Vec<OutdatedPackage>,
    /// Names dropped at ingestion because they failed sanitization
    pub rejected: Vec<String>,
}

/// PackageScanner pulls the outdated listing and filters it down to upgrade candidates
pub struct PackageScanner<'a> {
    backend: &'a dyn PackageBackend,
}

impl<'a> PackageScanner<'a> {
    pub fn new(backend: &'a dyn PackageBackend) -> Self {
        Self { backend }
    }

    pub fn scan(&self) -> Result<ScanReport> {
        let rows = self.backend.list_outdated()?;
        let mut report = ScanReport::default();

        for row in rows {
            if PackageName::parse(&row.name).is_err() {
                log::warn!("Rejected package name from backend listing: {:?}", row.name);
                report.rejected.push(row.name);
                continue;
            }

            if is_protected(&row.name) {
                log::debug!("Skipping protected package {}", row.name);
                continue;
            }

            if row.current_version.is_empty() || row.latest_version.is_empty() {
                log::debug!("Skipping {} with incomplete version data", row.name);
                continue;
            }

            report.packages.push(row);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn filters_invalid_protected_and_incomplete_rows() {
        let backend = FakeBackend::new().with_outdated(vec![
            OutdatedPackage::new("requests", "2.31.0", "2.32.0"),
            OutdatedPackage::new("evil;rm", "1.0", "2.0"),
            OutdatedPackage::new("python", "3.11", "3.12"),
            OutdatedPackage::new("numpy", "", "2.0.0"),
            OutdatedPackage::new("pip", "23.0", "24.0"),
        ]);

        let report = PackageScanner::new(&backend).scan().unwrap();
        let names: Vec<_> = report.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["requests", "pip"]);
        assert_eq!(report.rejected, vec!["evil;rm"]);
    }

    #[test]
    fn listing_failure_propagates() {
        let backend = FakeBackend::new().failing_listing();
        assert!(PackageScanner::new(&backend).scan().is_err());
    }
}

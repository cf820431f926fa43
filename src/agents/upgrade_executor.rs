use crate::agents::candidate::PackageCandidate;
use crate::agents::session::SessionLog;
use crate::backend::PackageBackend;
use crate::error::GuardianError;
use crate::utils::PackageName;
use std::fmt;

/// Registry names whose importable module is named differently.
const KNOWN_IMPORT_NAMES: &[(&str, &str)] = &[
    ("Pillow", "PIL"),
    ("scikit-learn", "sklearn"),
    ("scikit-image", "skimage"),
    ("beautifulsoup4", "bs4"),
    ("PyYAML", "yaml"),
    ("python-dateutil", "dateutil"),
    ("attrs", "attr"),
    ("msgpack", "msgpack"),
    ("protobuf", "google.protobuf"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InvalidName(String),
    Backend(String),
    TimedOut(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::InvalidName(msg) => write!(f, "invalid package name ({msg})"),
            FailureReason::Backend(msg) => write!(f, "package manager error ({msg})"),
            FailureReason::TimedOut(msg) => write!(f, "timed out ({msg})"),
        }
    }
}

impl From<GuardianError> for FailureReason {
    fn from(err: GuardianError) -> Self {
        match err {
            GuardianError::InputRejected(msg) => FailureReason::InvalidName(msg),
            err if err.is_timeout() => FailureReason::TimedOut(err.to_string()),
            other => FailureReason::Backend(other.to_string()),
        }
    }
}

/// Result of applying one upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Success,
    /// Installed, but no import name for the package could be loaded afterwards.
    SuccessWithVerifyFailure,
    Failure(FailureReason),
}

impl UpgradeOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, UpgradeOutcome::Failure(_))
    }
}

/// How an import name is derived from the registry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStrategy {
    KnownException,
    Underscored,
    Lowercased,
    Raw,
}

impl ImportStrategy {
    pub const ORDER: [ImportStrategy; 4] = [
        ImportStrategy::KnownException,
        ImportStrategy::Underscored,
        ImportStrategy::Lowercased,
        ImportStrategy::Raw,
    ];

    pub fn module_for(self, package: &str) -> Option<String> {
        match self {
            ImportStrategy::KnownException => KNOWN_IMPORT_NAMES
                .iter()
                .find(|(registry, _)| *registry == package)
                .map(|(_, module)| module.to_string()),
            ImportStrategy::Underscored => Some(package.replace('-', "_")),
            ImportStrategy::Lowercased => Some(package.replace('-', "_").to_lowercase()),
            ImportStrategy::Raw => Some(package.to_string()),
        }
    }
}

/// Module names to try for `package`, in resolution order.
pub fn import_candidates(package: &str) -> impl Iterator<Item = (ImportStrategy, String)> + '_ {
    ImportStrategy::ORDER
        .into_iter()
        .filter_map(move |strategy| strategy.module_for(package).map(|m| (strategy, m)))
}

/// What the post-upgrade import check found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Module that loaded, if any
    pub loaded: Option<String>,
    /// (module, error) for every attempt that failed before the first success
    pub failures: Vec<(String, String)>,
}

/// Tally for one executed batch, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<(String, UpgradeOutcome)>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    pub fn verify_warning_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == UpgradeOutcome::SuccessWithVerifyFailure)
            .count()
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }
}

/// Applies upgrades one package at a time and checks they still import.
pub struct UpgradeExecutor<'a> {
    backend: &'a dyn PackageBackend,
}

impl<'a> UpgradeExecutor<'a> {
    pub fn new(backend: &'a dyn PackageBackend) -> Self {
        Self { backend }
    }

    pub fn apply(&self, candidate: &PackageCandidate, log: &mut SessionLog) -> UpgradeOutcome {
        let name = match PackageName::parse(candidate.name()) {
            Ok(name) => name,
            Err(err) => {
                log.record(format!("Refused to upgrade {:?}: {err}", candidate.name()));
                return UpgradeOutcome::Failure(err.into());
            }
        };

        log.record(format!(
            "Upgrading {name}: {} → {}",
            candidate.current_version(),
            candidate.latest_version()
        ));

        if let Err(err) = self.backend.install_upgrade(&name) {
            let reason = FailureReason::from(err);
            log.record(format!("Failed to upgrade {name}: {reason}"));
            return UpgradeOutcome::Failure(reason);
        }

        let report = self.verify_detailed(name.as_str());
        match &report.loaded {
            Some(module) => {
                log.record(format!("{name} upgraded successfully (import {module} ok)"));
                UpgradeOutcome::Success
            }
            None => {
                let tried: Vec<_> = report.failures.iter().map(|(m, _)| m.as_str()).collect();
                log.record(format!(
                    "{name} upgraded but could not be imported (tried: {})",
                    tried.join(", ")
                ));
                UpgradeOutcome::SuccessWithVerifyFailure
            }
        }
    }

    /// Run every candidate in order. Failures never stop the batch.
    pub fn apply_batch<F>(
        &self,
        selected: &[PackageCandidate],
        log: &mut SessionLog,
        mut on_outcome: F,
    ) -> BatchReport
    where
        F: FnMut(&PackageCandidate, &UpgradeOutcome),
    {
        let mut report = BatchReport::default();
        for candidate in selected {
            let outcome = self.apply(candidate, log);
            on_outcome(candidate, &outcome);
            report
                .outcomes
                .push((candidate.name().to_string(), outcome));
        }
        log.record(format!(
            "Batch finished: {} upgraded, {} failed",
            report.success_count(),
            report.failure_count()
        ));
        report
    }

    /// Probe import names lazily, stopping at the first that loads.
    pub fn verify_detailed(&self, package: &str) -> VerifyReport {
        let mut report = VerifyReport::default();
        for (strategy, module) in import_candidates(package) {
            match self.backend.probe_import(&module) {
                Ok(()) => {
                    log::debug!("{package}: import {module} ok via {strategy:?}");
                    report.loaded = Some(module);
                    return report;
                }
                Err(err) => report.failures.push((module, err.to_string())),
            }
        }
        log::info!("Could not verify {package}: no importable module found");
        report
    }
}

use crate::agents::candidate::PackageCandidate;
use crate::agents::dependency_inspector::DependencyInspector;
use crate::agents::package_scanner::PackageScanner;
use crate::agents::risk_classifier::RiskTier;
use crate::agents::session::context::{
    CycleJournal, SessionLedger, SessionRecord, SessionStatus, UpgradeSession,
};
use crate::agents::session::interaction::{MenuChoice, Notice, Presenter};
use crate::agents::snapshot_manager::SnapshotManager;
use crate::agents::upgrade_executor::{BatchReport, UpgradeExecutor, UpgradeOutcome};
use crate::backend::{OutdatedPackage, PackageBackend};
use crate::error::Result;
use crate::utils::PackageName;

/// Where the interactive loop currently is. States that own a session carry it,
/// so a session can only be reached from the state that created it.
#[derive(Debug)]
pub enum SessionState {
    Scanning,
    UpToDate,
    Assessing(Vec<OutdatedPackage>),
    Presenting(Vec<PackageCandidate>),
    Selecting(Vec<PackageCandidate>),
    Confirming(Vec<PackageCandidate>),
    Snapshotting {
        session: UpgradeSession,
        selected: Vec<PackageCandidate>,
    },
    Executing {
        session: UpgradeSession,
        selected: Vec<PackageCandidate>,
    },
    Reporting {
        session: UpgradeSession,
        report: BatchReport,
    },
    Terminal,
}

/// Drives scan → assess → select → confirm → snapshot → execute → report rounds
/// until the operator exits.
pub struct SessionOrchestrator<'a> {
    backend: &'a dyn PackageBackend,
    presenter: &'a mut dyn Presenter,
    ledger: &'a mut SessionLedger,
    journal: CycleJournal,
    records: Vec<SessionRecord>,
}

impl<'a> SessionOrchestrator<'a> {
    pub fn new(
        backend: &'a dyn PackageBackend,
        presenter: &'a mut dyn Presenter,
        ledger: &'a mut SessionLedger,
    ) -> Self {
        Self {
            backend,
            presenter,
            ledger,
            journal: CycleJournal::new(),
            records: Vec::new(),
        }
    }

    /// Run until Terminal. The ledger is rendered even when a prompt fails.
    pub fn run(mut self) -> Result<Vec<SessionRecord>> {
        let mut state = SessionState::Scanning;
        let outcome = loop {
            if matches!(state, SessionState::Terminal) {
                break Ok(());
            }
            state = match self.step(state) {
                Ok(next) => next,
                Err(err) => break Err(err),
            };
        };

        self.presenter.render_ledger(self.ledger);
        outcome.map(|()| self.records)
    }

    /// Perform the work of `state` and return the state that follows it.
    pub fn step(&mut self, state: SessionState) -> Result<SessionState> {
        match state {
            SessionState::Scanning => self.on_scanning(),
            SessionState::UpToDate => self.on_up_to_date(),
            SessionState::Assessing(packages) => {
                let candidates =
                    assess(self.backend, &mut *self.presenter, &mut self.journal, packages);
                Ok(SessionState::Presenting(candidates))
            }
            SessionState::Presenting(candidates) => {
                self.presenter.render_grouped_by_tier(&candidates);
                Ok(SessionState::Selecting(candidates))
            }
            SessionState::Selecting(candidates) => self.on_selecting(candidates),
            SessionState::Confirming(selected) => self.on_confirming(selected),
            SessionState::Snapshotting { session, selected } => {
                Ok(self.on_snapshotting(session, selected))
            }
            SessionState::Executing { session, selected } => {
                Ok(self.on_executing(session, selected))
            }
            SessionState::Reporting { session, report } => Ok(self.on_reporting(session, report)),
            SessionState::Terminal => Ok(SessionState::Terminal),
        }
    }

    fn on_scanning(&mut self) -> Result<SessionState> {
        self.journal = CycleJournal::new();
        match scan(self.backend, &mut *self.presenter, &mut self.journal) {
            Ok(packages) if packages.is_empty() => Ok(SessionState::UpToDate),
            Ok(packages) => Ok(SessionState::Assessing(packages)),
            Err(err) => {
                log::warn!("Scan failed: {err}");
                self.presenter
                    .notify(Notice::Error, &format!("Could not list outdated packages: {err}"));
                if self.presenter.confirm("Retry scan?", false)? {
                    Ok(SessionState::Scanning)
                } else {
                    Ok(SessionState::Terminal)
                }
            }
        }
    }

    fn on_up_to_date(&mut self) -> Result<SessionState> {
        self.presenter
            .notify(Notice::Success, "All packages are up to date!");
        if self.presenter.confirm("Check again?", false)? {
            Ok(SessionState::Scanning)
        } else {
            Ok(SessionState::Terminal)
        }
    }

    fn on_selecting(&mut self, candidates: Vec<PackageCandidate>) -> Result<SessionState> {
        let choice = self.presenter.prompt_choice(&MenuChoice::ALL)?;
        self.journal.note(format!("Operator chose: {choice}"));

        let selected: Vec<PackageCandidate> = match choice {
            MenuChoice::Refresh => return Ok(SessionState::Scanning),
            MenuChoice::Exit => return Ok(SessionState::Terminal),
            MenuChoice::ApplyLow => with_tiers(candidates, &[RiskTier::Low]),
            MenuChoice::ApplyLowAndMedium => {
                with_tiers(candidates, &[RiskTier::Low, RiskTier::Medium])
            }
            MenuChoice::CriticalOnly => {
                let critical: Vec<_> = candidates
                    .into_iter()
                    .filter(PackageCandidate::is_critical_infra)
                    .collect();
                if critical.is_empty() {
                    self.presenter.notify(
                        Notice::Warning,
                        "No critical packages (pip, setuptools, wheel) need upgrading",
                    );
                    return Ok(SessionState::Scanning);
                }
                critical
            }
            MenuChoice::Custom => {
                let raw = self
                    .presenter
                    .prompt_free_text("Package names (comma-separated)")?;
                self.pick_custom(candidates, &raw)
            }
        };

        if selected.is_empty() {
            self.presenter.notify(Notice::Warning, "No packages selected");
            return Ok(SessionState::Scanning);
        }
        Ok(SessionState::Confirming(selected))
    }

    /// Keep candidates named in `raw`. Invalid or unknown names are dropped with a warning.
    fn pick_custom(&mut self, candidates: Vec<PackageCandidate>, raw: &str) -> Vec<PackageCandidate> {
        let mut wanted: Vec<PackageName> = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match PackageName::parse(entry) {
                Ok(name) => {
                    let known = candidates
                        .iter()
                        .any(|c| c.name().eq_ignore_ascii_case(name.as_str()));
                    if known {
                        wanted.push(name);
                    } else {
                        let message = format!("{name} is not in the list of outdated packages");
                        self.journal.note(&message);
                        self.presenter.notify(Notice::Warning, &message);
                    }
                }
                Err(_) => {
                    let message = format!("Skipping invalid package name: {entry}");
                    self.journal.note(&message);
                    self.presenter.notify(Notice::Warning, &message);
                }
            }
        }

        candidates
            .into_iter()
            .filter(|c| {
                wanted
                    .iter()
                    .any(|w| c.name().eq_ignore_ascii_case(w.as_str()))
            })
            .collect()
    }

    fn on_confirming(&mut self, selected: Vec<PackageCandidate>) -> Result<SessionState> {
        self.presenter.notify(
            Notice::Info,
            &format!("Selected {} package(s) for upgrade:", selected.len()),
        );
        for candidate in &selected {
            self.presenter
                .notify(Notice::Info, &format!("  • {}", candidate.describe()));
        }

        if !self.presenter.confirm("Proceed with upgrade?", false)? {
            self.journal.note("Upgrade declined by operator");
            log::debug!(
                "No session created; {} pending log entries discarded",
                self.journal.entries().len()
            );
            self.presenter.notify(Notice::Warning, "Upgrade cancelled");
            return Ok(SessionState::Scanning);
        }

        let names: Vec<_> = selected.iter().map(PackageCandidate::name).collect();
        self.journal
            .note(format!("Selected for upgrade: {}", names.join(", ")));

        let journal = std::mem::take(&mut self.journal);
        let session = match self.ledger.open_session(journal) {
            Ok(session) => session,
            Err(err) => {
                log::warn!("Could not open session log: {err}");
                self.presenter.notify(
                    Notice::Error,
                    &format!("Could not start upgrade session: {err}"),
                );
                return Ok(SessionState::Scanning);
            }
        };
        self.presenter.notify(
            Notice::Info,
            &format!(
                "Session {} logging to {}",
                session.id(),
                session.log_path().display()
            ),
        );
        Ok(SessionState::Snapshotting { session, selected })
    }

    fn on_snapshotting(
        &mut self,
        mut session: UpgradeSession,
        selected: Vec<PackageCandidate>,
    ) -> SessionState {
        let log_dir = session.log_dir().to_path_buf();
        let manager = SnapshotManager::new(self.backend, &log_dir);

        self.presenter
            .notify(Notice::Info, "Creating snapshot of current environment...");
        match manager.capture_snapshot(&session.snapshot_target()) {
            Ok(path) => {
                session
                    .log()
                    .record(format!("Snapshot saved to {}", path.display()));
                self.presenter
                    .notify(Notice::Success, &format!("Snapshot saved: {}", path.display()));
                session.set_snapshot(path);
            }
            Err(err) => {
                let message = format!("Failed to create snapshot: {err}");
                session.log().record(&message);
                self.presenter.notify(Notice::Warning, &message);
                if !self.operator_overrides("Snapshot failed. Continue anyway?") {
                    return self.abort(session);
                }
                session.log().record("Operator chose to continue without snapshot");
            }
        }

        match manager.build_rollback(&session.rollback_target(), &selected) {
            Ok(artifact) => {
                session.log().record(format!(
                    "Rollback script created: {} ({} pinned)",
                    artifact.path.display(),
                    artifact.pinned
                ));
                for name in &artifact.skipped {
                    let message = format!("{name:?} left out of rollback script: invalid name");
                    session.log().record(&message);
                    self.presenter.notify(Notice::Warning, &message);
                }
                self.presenter.notify(
                    Notice::Success,
                    &format!("Rollback script: {}", artifact.path.display()),
                );
                session.set_rollback(artifact.path);
            }
            Err(err) => {
                let message = format!("Failed to create rollback script: {err}");
                session.log().record(&message);
                self.presenter.notify(Notice::Warning, &message);
                if !self.operator_overrides("Rollback script could not be written. Continue anyway?")
                {
                    return self.abort(session);
                }
                session
                    .log()
                    .record("Operator chose to continue without rollback script");
            }
        }

        SessionState::Executing { session, selected }
    }

    fn on_executing(
        &mut self,
        mut session: UpgradeSession,
        selected: Vec<PackageCandidate>,
    ) -> SessionState {
        let executor = UpgradeExecutor::new(self.backend);
        let presenter = &mut *self.presenter;
        let total = selected.len();
        let mut position = 0;

        let report = executor.apply_batch(&selected, session.log(), |candidate, outcome| {
            position += 1;
            let name = candidate.name();
            match outcome {
                UpgradeOutcome::Success => presenter.notify(
                    Notice::Success,
                    &format!("[{position}/{total}] {name} upgraded"),
                ),
                UpgradeOutcome::SuccessWithVerifyFailure => presenter.notify(
                    Notice::Warning,
                    &format!("[{position}/{total}] {name} upgraded, but import check failed"),
                ),
                UpgradeOutcome::Failure(reason) => presenter.notify(
                    Notice::Error,
                    &format!("[{position}/{total}] {name} failed: {reason}"),
                ),
            }
        });

        SessionState::Reporting { session, report }
    }

    fn on_reporting(&mut self, mut session: UpgradeSession, report: BatchReport) -> SessionState {
        self.presenter
            .render_outcome_summary(&report, session.rollback());
        let lost = session.log().write_failures();
        if lost > 0 {
            self.presenter.notify(
                Notice::Warning,
                &format!(
                    "{lost} line(s) could not be written to {}",
                    session.log_path().display()
                ),
            );
        }
        let record = session.finish(SessionStatus::Completed);
        self.records.push(record);
        SessionState::Scanning
    }

    fn abort(&mut self, session: UpgradeSession) -> SessionState {
        self.presenter.notify(Notice::Warning, "Upgrade cancelled");
        self.records.push(session.finish(SessionStatus::Aborted));
        SessionState::Scanning
    }

    /// A failed or closed prompt counts as declining.
    fn operator_overrides(&mut self, question: &str) -> bool {
        self.presenter.confirm(question, false).unwrap_or_else(|err| {
            log::warn!("Prompt failed, treating as no: {err}");
            false
        })
    }
}

/// Scan and assess once. Touches no session state, so it is safe for read-only use.
pub fn survey(
    backend: &dyn PackageBackend,
    presenter: &mut dyn Presenter,
    journal: &mut CycleJournal,
) -> Result<Vec<PackageCandidate>> {
    let packages = scan(backend, presenter, journal)?;
    Ok(assess(backend, presenter, journal, packages))
}

fn scan(
    backend: &dyn PackageBackend,
    presenter: &mut dyn Presenter,
    journal: &mut CycleJournal,
) -> Result<Vec<OutdatedPackage>> {
    journal.note("Scanning for outdated packages");
    let report = PackageScanner::new(backend).scan()?;

    for name in &report.rejected {
        let message = format!("Skipping invalid package name from package manager: {name:?}");
        journal.note(&message);
        presenter.notify(Notice::Warning, &message);
    }
    journal.note(format!("Found {} outdated package(s)", report.packages.len()));
    Ok(report.packages)
}

fn assess(
    backend: &dyn PackageBackend,
    presenter: &mut dyn Presenter,
    journal: &mut CycleJournal,
    packages: Vec<OutdatedPackage>,
) -> Vec<PackageCandidate> {
    let inspector = DependencyInspector::new(backend);
    let pb = presenter.progress(packages.len());

    let mut candidates = Vec::with_capacity(packages.len());
    for package in packages {
        pb.set_message(package.name.clone());
        // Dependents must be known before the tier is computed.
        let dependents = match inspector.find_dependents(&package.name) {
            Ok(found) => found,
            Err(err) => {
                let message = format!("Could not check dependents of {}: {err}", package.name);
                journal.note(&message);
                presenter.notify(Notice::Warning, &message);
                Default::default()
            }
        };
        let candidate = PackageCandidate::assess(package, dependents);
        journal.note(format!(
            "{} classified {}",
            candidate.describe(),
            candidate.risk_tier()
        ));
        candidates.push(candidate);
        pb.inc(1);
    }
    pb.finish_and_clear();
    candidates
}

fn with_tiers(candidates: Vec<PackageCandidate>, tiers: &[RiskTier]) -> Vec<PackageCandidate> {
    candidates
        .into_iter()
        .filter(|c| tiers.contains(&c.risk_tier()))
        .collect()
}

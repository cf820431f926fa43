//! In-memory doubles for the package manager and the operator.

use crate::agents::candidate::PackageCandidate;
use crate::agents::session::SessionLedger;
use crate::agents::session::interaction::{MenuChoice, Notice, Presenter};
use crate::agents::upgrade_executor::BatchReport;
use crate::backend::{OutdatedPackage, PackageBackend};
use crate::error::{GuardianError, Result};
use crate::utils::PackageName;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Scriptable [`PackageBackend`] that records every call it receives.
#[derive(Debug)]
pub struct FakeBackend {
    outdated: RefCell<VecDeque<Vec<OutdatedPackage>>>,
    listing_fails: bool,
    dependents: BTreeMap<String, Vec<String>>,
    dependents_fail: BTreeSet<String>,
    freeze: Option<String>,
    install_fails: BTreeSet<String>,
    install_times_out: BTreeSet<String>,
    importable: BTreeSet<String>,
    interpreter: String,
    virtualenv: Option<PathBuf>,
    virtualenv_query_fails: bool,
    list_calls: RefCell<usize>,
    show_calls: RefCell<Vec<String>>,
    freeze_calls: RefCell<usize>,
    install_calls: RefCell<Vec<String>>,
    probe_calls: RefCell<Vec<String>>,
    virtualenv_calls: RefCell<usize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            outdated: RefCell::new(VecDeque::new()),
            listing_fails: false,
            dependents: BTreeMap::new(),
            dependents_fail: BTreeSet::new(),
            freeze: Some("requests==2.31.0\n".to_string()),
            install_fails: BTreeSet::new(),
            install_times_out: BTreeSet::new(),
            importable: BTreeSet::new(),
            interpreter: "python3".to_string(),
            virtualenv: None,
            virtualenv_query_fails: false,
            list_calls: RefCell::new(0),
            show_calls: RefCell::new(Vec::new()),
            freeze_calls: RefCell::new(0),
            install_calls: RefCell::new(Vec::new()),
            probe_calls: RefCell::new(Vec::new()),
            virtualenv_calls: RefCell::new(0),
        }
    }

    /// Listing returned by every scan until another one is queued.
    pub fn with_outdated(self, packages: Vec<OutdatedPackage>) -> Self {
        self.outdated.borrow_mut().push_back(packages);
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn with_dependents(mut self, name: &str, dependents: &[&str]) -> Self {
        self.dependents.insert(
            name.to_string(),
            dependents.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    pub fn failing_dependents(mut self, name: &str) -> Self {
        self.dependents_fail.insert(name.to_string());
        self
    }

    pub fn with_freeze(mut self, text: &str) -> Self {
        self.freeze = Some(text.to_string());
        self
    }

    pub fn failing_freeze(mut self) -> Self {
        self.freeze = None;
        self
    }

    pub fn failing_install(mut self, name: &str) -> Self {
        self.install_fails.insert(name.to_string());
        self
    }

    pub fn timing_out_install(mut self, name: &str) -> Self {
        self.install_times_out.insert(name.to_string());
        self
    }

    pub fn with_importable(mut self, modules: &[&str]) -> Self {
        self.importable
            .extend(modules.iter().map(|m| m.to_string()));
        self
    }

    pub fn with_interpreter(mut self, python: &str) -> Self {
        self.interpreter = python.to_string();
        self
    }

    /// The interpreter reports `prefix` as its virtual environment.
    pub fn with_virtualenv(mut self, prefix: &str) -> Self {
        self.virtualenv = Some(PathBuf::from(prefix));
        self
    }

    pub fn failing_virtualenv_query(mut self) -> Self {
        self.virtualenv_query_fails = true;
        self
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.borrow()
    }

    pub fn show_calls(&self) -> Vec<String> {
        self.show_calls.borrow().clone()
    }

    pub fn freeze_calls(&self) -> usize {
        *self.freeze_calls.borrow()
    }

    pub fn install_calls(&self) -> Vec<String> {
        self.install_calls.borrow().clone()
    }

    pub fn probe_calls(&self) -> Vec<String> {
        self.probe_calls.borrow().clone()
    }

    pub fn virtualenv_calls(&self) -> usize {
        *self.virtualenv_calls.borrow()
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageBackend for FakeBackend {
    fn list_outdated(&self) -> Result<Vec<OutdatedPackage>> {
        *self.list_calls.borrow_mut() += 1;
        if self.listing_fails {
            return Err(GuardianError::Backend("pip list exited with 1".into()));
        }
        let mut queue = self.outdated.borrow_mut();
        if queue.len() > 1 {
            return Ok(queue.pop_front().unwrap_or_default());
        }
        Ok(queue.front().cloned().unwrap_or_default())
    }

    fn show_reverse_dependencies(&self, name: &PackageName) -> Result<Vec<String>> {
        self.show_calls.borrow_mut().push(name.to_string());
        if self.dependents_fail.contains(name.as_str()) {
            return Err(GuardianError::Backend(format!("pip show {name} failed")));
        }
        Ok(self
            .dependents
            .get(name.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn freeze_installed_state(&self) -> Result<String> {
        *self.freeze_calls.borrow_mut() += 1;
        self.freeze
            .clone()
            .ok_or_else(|| GuardianError::Backend("pip freeze exited with 1".into()))
    }

    fn install_upgrade(&self, name: &PackageName) -> Result<()> {
        self.install_calls.borrow_mut().push(name.to_string());
        if self.install_times_out.contains(name.as_str()) {
            return Err(GuardianError::TimedOut {
                command: format!("pip install --upgrade {name}"),
                seconds: 300,
            });
        }
        if self.install_fails.contains(name.as_str()) {
            return Err(GuardianError::Backend(format!("could not install {name}")));
        }
        Ok(())
    }

    fn probe_import(&self, module: &str) -> Result<()> {
        self.probe_calls.borrow_mut().push(module.to_string());
        if self.importable.contains(module) {
            Ok(())
        } else {
            Err(GuardianError::Backend(format!(
                "ModuleNotFoundError: No module named '{module}'"
            )))
        }
    }

    fn virtualenv_prefix(&self) -> Result<Option<PathBuf>> {
        *self.virtualenv_calls.borrow_mut() += 1;
        if self.virtualenv_query_fails {
            return Err(GuardianError::Backend("python -c exited with 1".into()));
        }
        Ok(self.virtualenv.clone())
    }

    fn interpreter(&self) -> &str {
        &self.interpreter
    }
}

/// Operator that answers from a fixed script and remembers what it was shown.
#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    choices: VecDeque<MenuChoice>,
    texts: VecDeque<String>,
    confirms: VecDeque<bool>,
    pub notices: Vec<(Notice, String)>,
    pub questions: Vec<String>,
    pub rendered_tiers: Vec<Vec<String>>,
    pub summaries: Vec<(usize, usize, Option<PathBuf>)>,
    pub ledger: Vec<PathBuf>,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn choose(mut self, choice: MenuChoice) -> Self {
        self.choices.push_back(choice);
        self
    }

    pub fn type_text(mut self, text: &str) -> Self {
        self.texts.push_back(text.to_string());
        self
    }

    pub fn answer(mut self, yes: bool) -> Self {
        self.confirms.push_back(yes);
        self
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.notices
            .iter()
            .filter(|(level, _)| *level == Notice::Warning)
            .map(|(_, msg)| msg.as_str())
            .collect()
    }
}

impl Presenter for ScriptedPresenter {
    fn render_grouped_by_tier(&mut self, candidates: &[PackageCandidate]) {
        self.rendered_tiers
            .push(candidates.iter().map(|c| c.name().to_string()).collect());
    }

    fn render_outcome_summary(&mut self, report: &BatchReport, rollback: Option<&Path>) {
        self.summaries.push((
            report.success_count(),
            report.failure_count(),
            rollback.map(Path::to_path_buf),
        ));
    }

    fn render_ledger(&mut self, ledger: &SessionLedger) {
        self.ledger = ledger.logs().to_vec();
    }

    fn notify(&mut self, level: Notice, message: &str) {
        self.notices.push((level, message.to_string()));
    }

    fn prompt_choice(&mut self, _options: &[MenuChoice]) -> Result<MenuChoice> {
        Ok(self.choices.pop_front().unwrap_or(MenuChoice::Exit))
    }

    fn prompt_free_text(&mut self, _label: &str) -> Result<String> {
        self.texts.pop_front().ok_or(GuardianError::UserCancelled)
    }

    fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        self.questions.push(question.to_string());
        Ok(self.confirms.pop_front().unwrap_or(default))
    }
}

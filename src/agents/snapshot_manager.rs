use crate::agents::candidate::PackageCandidate;
use crate::backend::PackageBackend;
use crate::error::Result;
use crate::utils::PackageName;
use crate::utils::PathValidator;
use crate::utils::artifact_file::{PRIVATE_FILE_MODE, PRIVATE_SCRIPT_MODE, write_private};
use jiff::Zoned;
use std::path::{Path, PathBuf};

/// A rollback script written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackArtifact {
    pub path: PathBuf,
    /// Number of pin directives written
    pub pinned: usize,
    /// Candidates left out because their names failed sanitization
    pub skipped: Vec<String>,
}

/// Records the pre-upgrade state and generates restore procedures.
///
/// Artifacts may only be written directly inside `log_dir`.
pub struct SnapshotManager<'a> {
    backend: &'a dyn PackageBackend,
    log_dir: &'a Path,
}

impl<'a> SnapshotManager<'a> {
    pub fn new(backend: &'a dyn PackageBackend, log_dir: &'a Path) -> Self {
        Self { backend, log_dir }
    }

    /// Write the backend's full installed-package listing verbatim to `target`.
    pub fn capture_snapshot(&self, target: &Path) -> Result<PathBuf> {
        let frozen = self.backend.freeze_installed_state()?;
        let target = PathValidator::validate_artifact_path(target, self.log_dir)?;
        write_private(&target, &frozen, PRIVATE_FILE_MODE)?;
        log::debug!("Snapshot written to {}", target.display());
        Ok(target)
    }

    /// Write a script pinning every valid selected candidate back to its current
    /// version, installed through the backend's own interpreter.
    pub fn build_rollback(
        &self,
        target: &Path,
        selected: &[PackageCandidate],
    ) -> Result<RollbackArtifact> {
        let created = Zoned::now().strftime("%Y-%m-%d %H:%M:%S").to_string();
        let script = RollbackScript::render(selected, self.backend.interpreter(), &created);
        let target = PathValidator::validate_artifact_path(target, self.log_dir)?;
        write_private(&target, &script.body, PRIVATE_SCRIPT_MODE)?;

        for name in &script.skipped {
            log::warn!("Left {name:?} out of rollback script: invalid package name");
        }

        Ok(RollbackArtifact {
            path: target,
            pinned: script.pinned,
            skipped: script.skipped,
        })
    }
}

/// Rendered rollback script text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackScript {
    pub body: String,
    pub pinned: usize,
    pub skipped: Vec<String>,
}

impl RollbackScript {
    pub fn render(selected: &[PackageCandidate], python: &str, created: &str) -> Self {
        let installer = format!("{} -m pip install", shell_quote(python));
        let mut body = String::new();
        body.push_str("#!/bin/bash\n");
        body.push_str("# Rollback script generated by pipguard\n");
        body.push_str(&format!("# Created: {created}\n"));
        body.push_str("# Run this script to restore previous package versions\n\n");
        body.push_str("echo 'Rolling back packages...'\n\n");

        let mut pinned = 0;
        let mut skipped = Vec::new();
        for candidate in selected {
            match PackageName::parse(candidate.name()) {
                Ok(name) => {
                    let pin = format!("{name}=={}", candidate.current_version());
                    body.push_str(&format!("{installer} {}\n", shell_quote(&pin)));
                    pinned += 1;
                }
                Err(_) => skipped.push(candidate.name().to_string()),
            }
        }

        body.push_str("\necho 'Rollback complete!'\n");

        Self {
            body,
            pinned,
            skipped,
        }
    }
}

/// Single-quote for POSIX shells; versions come from the backend verbatim.
fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

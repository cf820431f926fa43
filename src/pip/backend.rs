use crate::backend::{CommandRunner, OutdatedPackage, PackageBackend};
use crate::error::{GuardianError, Result};
use crate::utils::PackageName;
use std::path::PathBuf;
use std::time::Duration;

const IMPORT_PROBE: &str = "import importlib, sys; importlib.import_module(sys.argv[1])";
const VIRTUALENV_QUERY: &str =
    "import sys; print(sys.prefix if sys.prefix != sys.base_prefix else '')";

/// Drives `python -m pip` for a single interpreter.
pub struct PipBackend {
    python: String,
    runner: CommandRunner,
}

impl PipBackend {
    pub fn new(python: impl Into<String>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            runner: CommandRunner::new(timeout),
        }
    }

    fn pip(&self, args: &[&str]) -> Result<String> {
        let mut full = vec!["-m", "pip"];
        full.extend_from_slice(args);
        let output = self.runner.run_checked(&self.python, &full)?;
        Ok(output.stdout)
    }
}

impl PackageBackend for PipBackend {
    fn list_outdated(&self) -> Result<Vec<OutdatedPackage>> {
        let stdout = self.pip(&["list", "--outdated", "--format=json"])?;
        parse_outdated_listing(&stdout)
    }

    fn show_reverse_dependencies(&self, name: &PackageName) -> Result<Vec<String>> {
        let stdout = self.pip(&["show", name.as_str()])?;
        Ok(parse_required_by(&stdout))
    }

    fn freeze_installed_state(&self) -> Result<String> {
        self.pip(&["freeze"])
    }

    fn install_upgrade(&self, name: &PackageName) -> Result<()> {
        self.pip(&["install", "--upgrade", name.as_str()])?;
        Ok(())
    }

    fn probe_import(&self, module: &str) -> Result<()> {
        let output = self
            .runner
            .run(&self.python, &["-c", IMPORT_PROBE, module])?;
        if output.success() {
            Ok(())
        } else {
            Err(GuardianError::Backend(format!(
                "import {module} failed: {}",
                last_line(&output.stderr)
            )))
        }
    }

    fn virtualenv_prefix(&self) -> Result<Option<PathBuf>> {
        let output = self
            .runner
            .run_checked(&self.python, &["-c", VIRTUALENV_QUERY])?;
        Ok(parse_virtualenv_prefix(&output.stdout))
    }

    fn interpreter(&self) -> &str {
        &self.python
    }
}

/// An empty answer from the interpreter means the interpreter runs from its base installation.
pub fn parse_virtualenv_prefix(stdout: &str) -> Option<PathBuf> {
    let prefix = stdout.trim();
    (!prefix.is_empty()).then(|| PathBuf::from(prefix))
}

/// Parses `pip list --outdated --format=json`. Empty output means nothing is outdated.
pub fn parse_outdated_listing(stdout: &str) -> Result<Vec<OutdatedPackage>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(stdout)?)
}

/// Extracts the comma-separated `Required-by:` entries from `pip show` output.
///
/// Entries are returned raw (trimmed); filtering blanks is the caller's job.
pub fn parse_required_by(show_output: &str) -> Vec<String> {
    show_output
        .lines()
        .find_map(|line| line.strip_prefix("Required-by:"))
        .map(|rest| rest.split(',').map(|d| d.trim().to_string()).collect())
        .unwrap_or_default()
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOW_OUTPUT: &str = "Name: urllib3\n\
Version: 2.2.1\n\
Summary: HTTP library with thread-safe connection pooling\n\
Requires: \n\
Required-by: botocore, requests, , selenium\n";

    #[test]
    fn required_by_line_is_split_on_commas() {
        assert_eq!(
            parse_required_by(SHOW_OUTPUT),
            vec!["botocore", "requests", "", "selenium"]
        );
    }

    #[test]
    fn missing_required_by_line_yields_nothing() {
        assert!(parse_required_by("Name: x\nVersion: 1.0\n").is_empty());
    }

    #[test]
    fn empty_required_by_yields_single_blank_entry() {
        let parsed = parse_required_by("Name: x\nRequired-by:\n");
        assert!(parsed.iter().all(|d| d.is_empty()));
    }

    #[test]
    fn outdated_listing_parses_json_and_tolerates_empty_output() {
        let rows = parse_outdated_listing(
            r#"[{"name":"pip","version":"23.0","latest_version":"24.0","latest_filetype":"wheel"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].name, "pip");
        assert_eq!(rows[0].latest_version, "24.0");
        assert!(parse_outdated_listing("  \n").unwrap().is_empty());
    }

    #[test]
    fn virtualenv_prefix_is_read_from_interpreter_output() {
        assert_eq!(
            parse_virtualenv_prefix("/home/me/.venvs/tools\n"),
            Some(PathBuf::from("/home/me/.venvs/tools"))
        );
        assert_eq!(parse_virtualenv_prefix("\n"), None);
    }

    #[test]
    fn last_line_skips_trailing_blank_lines() {
        assert_eq!(
            last_line("Traceback\nModuleNotFoundError: No module named 'x'\n\n"),
            "ModuleNotFoundError: No module named 'x'"
        );
    }

    #[test]
    fn malformed_listing_is_json_error() {
        let err = parse_outdated_listing("not json").unwrap_err();
        assert!(matches!(err, GuardianError::Json(_)));
    }
}

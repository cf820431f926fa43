use crate::error::{GuardianError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

/// Keeps session artifacts out of system directories and inside the log directory.
pub struct PathValidator;

impl PathValidator {
    /// Creates (if needed) and canonicalises the artifact directory.
    ///
    /// A freshly created directory is restricted to its owner.
    pub fn prepare_log_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        Self::reject_system_path(path)?;

        if !path.exists() {
            fs::create_dir_all(path).map_err(|e| {
                GuardianError::Config(format!(
                    "Could not create log directory '{}': {e}",
                    path.display()
                ))
            })?;
            restrict_to_owner(path, 0o700)?;
        }

        let canonical = path.canonicalize().map_err(|e| {
            GuardianError::Config(format!("Invalid log directory '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(GuardianError::Config(format!(
                "Log directory '{}' is not a directory",
                canonical.display()
            )));
        }

        Self::reject_system_path(&canonical)?;
        Ok(canonical)
    }

    /// Ensures an artifact path resolves to a direct child of the log directory.
    pub fn validate_artifact_path(
        artifact: impl AsRef<Path>,
        log_dir: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let artifact = artifact.as_ref();
        let log_dir = log_dir.as_ref();

        let file_name = artifact.file_name().ok_or_else(|| {
            GuardianError::Config(format!(
                "Artifact path '{}' has no file name",
                artifact.display()
            ))
        })?;

        let parent = artifact.parent().unwrap_or_else(|| Path::new("."));
        let canonical_parent = parent
            .canonicalize()
            .map_err(|e| unreachable_dir("artifact directory", parent, e))?;
        let canonical_base = log_dir
            .canonicalize()
            .map_err(|e| unreachable_dir("log directory", log_dir, e))?;

        if canonical_parent != canonical_base {
            return Err(GuardianError::Config(
                "Artifact path is outside the log directory".to_string(),
            ));
        }

        Ok(canonical_parent.join(file_name))
    }

    fn reject_system_path(path: &Path) -> Result<()> {
        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) {
                return Err(GuardianError::Config(format!(
                    "Writing artifacts under system directory '{}' is not allowed",
                    forbidden
                )));
            }

            if let Ok(canonical_forbidden) = forbidden_path.canonicalize() {
                if path.starts_with(&canonical_forbidden) {
                    return Err(GuardianError::Config(format!(
                        "Writing artifacts under system directory '{}' is not allowed",
                        forbidden
                    )));
                }
            }
        }
        Ok(())
    }
}

// The directory existed when the run started; losing it is an I/O failure.
fn unreachable_dir(what: &str, path: &Path, err: io::Error) -> GuardianError {
    GuardianError::Io(io::Error::new(
        err.kind(),
        format!("Cannot reach {what} '{}': {err}", path.display()),
    ))
}

/// Applies an owner-only permission mode. No-op off unix.
pub fn restrict_to_owner(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(mode);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn prepare_log_dir_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("pip-upgrade-logs");
        let prepared = PathValidator::prepare_log_dir(&logs).unwrap();
        assert!(prepared.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn created_log_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        let prepared = PathValidator::prepare_log_dir(&logs).unwrap();
        let mode = fs::metadata(prepared).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn prepare_log_dir_rejects_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("file.txt");
        fs::write(&file_path, "test").unwrap();
        let err = PathValidator::prepare_log_dir(&file_path).unwrap_err();
        assert!(matches!(err, GuardianError::Config(_)));
    }

    #[test]
    fn prepare_log_dir_rejects_system_directory() {
        assert!(PathValidator::prepare_log_dir("/etc/pipguard").is_err());
    }

    #[test]
    fn vanished_log_dir_is_io_error() {
        let dir = tempdir().unwrap();
        let logs = PathValidator::prepare_log_dir(dir.path().join("logs")).unwrap();
        fs::remove_dir(&logs).unwrap();

        let err = PathValidator::validate_artifact_path(logs.join("rollback.sh"), &logs)
            .unwrap_err();
        assert!(matches!(err, GuardianError::Io(_)));
        assert!(err.to_string().contains("Cannot reach"));
    }

    #[test]
    fn validate_artifact_path_rejects_escape() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        let outside = dir.path().join("rollback.sh");
        assert!(PathValidator::validate_artifact_path(&outside, &logs).is_err());
        let inside = logs.join("rollback.sh");
        assert!(PathValidator::validate_artifact_path(&inside, &logs).is_ok());
    }
}

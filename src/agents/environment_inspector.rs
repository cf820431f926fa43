use crate::backend::PackageBackend;
use crate::error::{GuardianError, Result};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    Venv,
    Conda,
    Homebrew,
    System,
    Unknown,
}

impl EnvironmentKind {
    pub fn safe_to_modify(self) -> bool {
        matches!(
            self,
            EnvironmentKind::Venv | EnvironmentKind::Conda | EnvironmentKind::Homebrew
        )
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EnvironmentKind::Venv => "Virtual Environment",
            EnvironmentKind::Conda => "Conda Environment",
            EnvironmentKind::Homebrew => "Homebrew Python",
            EnvironmentKind::System => "System Python",
            EnvironmentKind::Unknown => "Unknown Python Environment",
        };
        f.write_str(label)
    }
}

/// The interpreter pip will be run with and what kind of installation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonEnvironment {
    pub kind: EnvironmentKind,
    pub name: String,
    pub interpreter: PathBuf,
}

impl PythonEnvironment {
    pub fn safe_to_modify(&self) -> bool {
        self.kind.safe_to_modify()
    }
}

/// Decides whether the target interpreter may be modified at all.
pub struct EnvironmentInspector;

impl EnvironmentInspector {
    /// Inspect the interpreter the backend drives, asking it for its own prefix.
    pub fn detect(backend: &dyn PackageBackend) -> PythonEnvironment {
        let path_var = env::var_os("PATH");
        let interpreter = resolve_interpreter(backend.interpreter(), path_var.as_deref());
        let prefix = backend.virtualenv_prefix().unwrap_or_else(|err| {
            log::warn!(
                "Could not ask {} whether it runs in a virtual environment: {err}",
                interpreter.display()
            );
            None
        });
        Self::classify(|key| env::var(key).ok(), &interpreter, prefix.as_deref())
    }

    /// Pure detection. `venv_prefix` is what the interpreter reported about itself.
    /// Activation variables of this process only count for an interpreter that
    /// lives under them.
    pub fn classify<F>(
        lookup: F,
        interpreter: &Path,
        venv_prefix: Option<&Path>,
    ) -> PythonEnvironment
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let owns = |root: &String| interpreter.starts_with(root);
        let path = interpreter.to_string_lossy();

        let (kind, name) = if let Some(prefix) = venv_prefix {
            (EnvironmentKind::Venv, base_name(prefix))
        } else if let Some(venv) = present("VIRTUAL_ENV").filter(owns) {
            (EnvironmentKind::Venv, base_name(Path::new(&venv)))
        } else if let Some(conda) = present("CONDA_DEFAULT_ENV")
            .filter(|_| present("CONDA_PREFIX").as_ref().is_some_and(owns))
        {
            (EnvironmentKind::Conda, conda)
        } else if path.contains("/opt/homebrew") || path.contains("/usr/local/Cellar") {
            (EnvironmentKind::Homebrew, "Homebrew Global".to_string())
        } else if path.starts_with("/usr/bin") || path.starts_with("/System") {
            (EnvironmentKind::System, "System Python".to_string())
        } else {
            (EnvironmentKind::Unknown, "Unknown".to_string())
        };

        log::debug!("Detected {kind} ({name}) at {path}");
        PythonEnvironment {
            kind,
            name,
            interpreter: interpreter.to_path_buf(),
        }
    }

    pub fn ensure_safe(environment: &PythonEnvironment) -> Result<()> {
        match environment.kind {
            kind if kind.safe_to_modify() => Ok(()),
            EnvironmentKind::System => Err(GuardianError::EnvironmentUnsafe(format!(
                "{} is managed by the operating system. Create a virtual environment instead: \
                 python3 -m venv myenv && source myenv/bin/activate",
                environment.interpreter.display()
            ))),
            _ => Err(GuardianError::EnvironmentUnsafe(format!(
                "{} is not recognized as safe to modify",
                environment.interpreter.display()
            ))),
        }
    }
}

fn base_name(root: &Path) -> String {
    match root.file_name() {
        Some(base) => base.to_string_lossy().into_owned(),
        None => root.display().to_string(),
    }
}

/// Resolve a bare interpreter name against `PATH`; paths are returned as given.
pub fn resolve_interpreter(python: &str, path_var: Option<&std::ffi::OsStr>) -> PathBuf {
    let candidate = Path::new(python);
    if candidate.components().count() > 1 {
        return candidate.to_path_buf();
    }

    path_var
        .into_iter()
        .flat_map(env::split_paths)
        .map(|dir| dir.join(python))
        .find(|full| full.is_file())
        .unwrap_or_else(|| candidate.to_path_buf())
}

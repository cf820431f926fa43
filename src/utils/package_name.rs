use crate::error::{GuardianError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("package name pattern is a valid regex")
});

/// Substrings that are rejected even when every character is individually allowed.
const SUSPICIOUS: &[&str] = &["..", "__", "&&", "||", ";", "|", ">", "<", "`", "$"];

/// A package name that passed the injection checks.
///
/// Every call into the package-manager backend takes a `&PackageName`, so an
/// unchecked string can never reach a command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(GuardianError::InputRejected(
                "package name is empty".to_string(),
            ));
        }

        if !NAME_PATTERN.is_match(raw) {
            return Err(GuardianError::InputRejected(format!(
                "'{raw}' contains characters outside [A-Za-z0-9._-]"
            )));
        }

        if let Some(pattern) = SUSPICIOUS.iter().find(|p| raw.contains(**p)) {
            return Err(GuardianError::InputRejected(format!(
                "'{raw}' contains suspicious sequence '{pattern}'"
            )));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

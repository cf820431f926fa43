use crate::agents::candidate::PackageCandidate;
use crate::pip::ParsedVersion;
use colored::{ColoredString, Colorize};
use std::fmt;

/// Coarse upgrade risk, ordered from safest to most sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Low,
        RiskTier::Medium,
        RiskTier::High,
        RiskTier::Critical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Critical => "CRITICAL",
        }
    }

    pub fn colored_label(self) -> ColoredString {
        match self {
            RiskTier::Low => self.label().green(),
            RiskTier::Medium => self.label().yellow(),
            RiskTier::High => self.label().red(),
            RiskTier::Critical => self.label().magenta(),
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Patch bumps become MEDIUM once more than this many packages depend on the target.
const PATCH_DEPENDENT_THRESHOLD: usize = 3;

pub struct RiskClassifier;

impl RiskClassifier {
    pub fn classify(candidate: &PackageCandidate) -> RiskTier {
        Self::tier_for(
            candidate.parsed_current(),
            candidate.parsed_latest(),
            candidate.dependents().len(),
            candidate.is_critical_infra(),
        )
    }

    /// The whole rule table. Rules are evaluated top to bottom; first match wins.
    pub fn tier_for(
        current: ParsedVersion,
        latest: ParsedVersion,
        dependent_count: usize,
        is_critical_infra: bool,
    ) -> RiskTier {
        if is_critical_infra {
            return RiskTier::Critical;
        }

        // Unparseable and minor-downgrade both land on MEDIUM; they are kept
        // as separate rules because they mean different things.
        if current.is_unparseable() || latest.is_unparseable() {
            return RiskTier::Medium;
        }

        if latest.major != current.major {
            return RiskTier::High;
        }

        if latest.minor > current.minor {
            return if dependent_count > 0 {
                RiskTier::Medium
            } else {
                RiskTier::Low
            };
        }

        if latest.minor < current.minor {
            return RiskTier::Medium;
        }

        if latest.patch > current.patch {
            return if dependent_count > PATCH_DEPENDENT_THRESHOLD {
                RiskTier::Medium
            } else {
                RiskTier::Low
            };
        }

        RiskTier::Low
    }
}

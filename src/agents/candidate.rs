use crate::agents::risk_classifier::{RiskClassifier, RiskTier};
use crate::backend::OutdatedPackage;
use crate::pip::ParsedVersion;
use std::collections::BTreeSet;

/// The package manager and its bootstrap tooling.
pub const CRITICAL_INFRA: &[&str] = &["pip", "setuptools", "wheel"];

/// Never offered for upgrade.
pub const PROTECTED_PACKAGES: &[&str] = &["python", "distribute"];

pub const DEV_TOOLS: &[&str] = &[
    "pytest",
    "black",
    "mypy",
    "flake8",
    "pylint",
    "coverage",
    "tox",
    "sphinx",
    "isort",
    "autopep8",
    "pre-commit",
];

fn in_set(set: &[&str], name: &str) -> bool {
    set.iter().any(|entry| entry.eq_ignore_ascii_case(name))
}

pub fn is_critical_infra(name: &str) -> bool {
    in_set(CRITICAL_INFRA, name)
}

pub fn is_protected(name: &str) -> bool {
    in_set(PROTECTED_PACKAGES, name)
}

pub fn is_dev_tool(name: &str) -> bool {
    in_set(DEV_TOOLS, name)
}

/// A package eligible for upgrade in the current scan cycle.
///
/// Built once per cycle by [`PackageCandidate::assess`] and immutable after
/// that; the risk tier is derived, never assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCandidate {
    name: String,
    current_version: String,
    latest_version: String,
    parsed_current: ParsedVersion,
    parsed_latest: ParsedVersion,
    dependents: BTreeSet<String>,
    risk_tier: RiskTier,
    is_critical_infra: bool,
    is_dev_tool: bool,
}

impl PackageCandidate {
    pub fn assess(package: OutdatedPackage, dependents: BTreeSet<String>) -> Self {
        let mut candidate = Self {
            parsed_current: ParsedVersion::parse(&package.current_version),
            parsed_latest: ParsedVersion::parse(&package.latest_version),
            is_critical_infra: is_critical_infra(&package.name),
            is_dev_tool: is_dev_tool(&package.name),
            name: package.name,
            current_version: package.current_version,
            latest_version: package.latest_version,
            dependents,
            risk_tier: RiskTier::Low,
        };
        candidate.risk_tier = RiskClassifier::classify(&candidate);
        candidate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn latest_version(&self) -> &str {
        &self.latest_version
    }

    pub fn parsed_current(&self) -> ParsedVersion {
        self.parsed_current
    }

    pub fn parsed_latest(&self) -> ParsedVersion {
        self.parsed_latest
    }

    pub fn dependents(&self) -> &BTreeSet<String> {
        &self.dependents
    }

    pub fn risk_tier(&self) -> RiskTier {
        self.risk_tier
    }

    pub fn is_critical_infra(&self) -> bool {
        self.is_critical_infra
    }

    pub fn is_dev_tool(&self) -> bool {
        self.is_dev_tool
    }

    pub fn describe(&self) -> String {
        format!(
            "{}: {} → {}",
            self.name, self.current_version, self.latest_version
        )
    }
}

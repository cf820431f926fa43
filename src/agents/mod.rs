pub mod candidate;
pub mod dependency_inspector;
pub mod environment_inspector;
pub mod package_scanner;
pub mod risk_classifier;
pub mod session;
pub mod snapshot_manager;
pub mod upgrade_executor;

pub use candidate::PackageCandidate;
pub use environment_inspector::{EnvironmentInspector, PythonEnvironment};
pub use risk_classifier::RiskTier;
pub use snapshot_manager::SnapshotManager;

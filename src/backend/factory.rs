use crate::backend::PackageBackend;
use crate::config::GuardianConfig;
use crate::pip::PipBackend;
use std::sync::Arc;
use std::time::Duration;

pub struct BackendFactory;

impl BackendFactory {
    pub fn create_pip(config: &GuardianConfig) -> Arc<dyn PackageBackend> {
        Arc::new(PipBackend::new(
            config.python.clone(),
            Duration::from_secs(config.command_timeout_secs),
        ))
    }
}

use std::sync::Arc;

use crate::backend::MonitoringBackend;
use crate::config::AppConfig;

/// Shared application context handed to every tool call. Never mutated after
/// construction.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn MonitoringBackend>,
}

impl AppContext {
    pub fn new(config: AppConfig, backend: Arc<dyn MonitoringBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.config.server.name
    }

    pub fn server_version(&self) -> &str {
        &self.config.server.version
    }
}

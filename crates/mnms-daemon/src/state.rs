//! Application state management

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::auth::{OperatorKeys, TokenSigner};
use crate::config::Config;
use crate::metrics::{LogMetricsSink, MetricsSink};
use crate::script::ScriptBuilder;
use crate::store::{DeviceStore, KeyStore, MemoryDeviceStore, MemoryKeyStore};

/// Shared application state
pub struct AppState {
    /// Signs one-shot tokens (enrollment, telemetry)
    pub signer: TokenSigner,
    /// Signs the renewable token the device scheduler fetches tasks with
    pub task_signer: TokenSigner,
    /// Keys accepted on the read-back routes
    pub operators: OperatorKeys,
    /// Device-side script generator
    pub scripts: ScriptBuilder,
    /// Device registry
    pub devices: Arc<dyn DeviceStore>,
    /// Enrollment keys
    pub keys: Arc<dyn KeyStore>,
    /// Time-series writer
    pub metrics: Arc<dyn MetricsSink>,
}

impl AppState {
    /// Create application state with in-memory collaborators
    pub fn new(config: &Config) -> Result<Arc<Self>> {
        config.validate()?;
        let keys = Arc::new(MemoryKeyStore::from_config(&config.enrollment_keys));
        info!(keys = config.enrollment_keys.len(), "Loaded enrollment keys");
        Self::with_collaborators(
            config,
            Arc::new(MemoryDeviceStore::new()),
            keys,
            Arc::new(LogMetricsSink),
        )
    }

    /// Create application state around injected collaborators
    pub fn with_collaborators(
        config: &Config,
        devices: Arc<dyn DeviceStore>,
        keys: Arc<dyn KeyStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Arc<Self>> {
        let signer = TokenSigner::new(
            &config.auth.secret,
            Duration::from_secs(config.auth.token_ttl_secs),
        );
        let task_signer = TokenSigner::new(
            &config.auth.secret,
            Duration::from_secs(config.auth.task_token_ttl_secs),
        );
        let operators = OperatorKeys::new(&config.auth.secret, &config.auth.operator_keys)?;
        let scripts = ScriptBuilder::new(&config.daemon.public_url, config.scheduler.clone());

        Ok(Arc::new(Self {
            signer,
            task_signer,
            operators,
            scripts,
            devices,
            keys,
            metrics,
        }))
    }
}

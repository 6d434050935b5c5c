//! Gateway builder
//!
//! This module wires the property store, the device controller and the
//! accessor together.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use eiscp_client::GatewayBuilder;
//! use eiscp_transport::DeviceAddress;
//!
//! # async fn run() -> eiscp_core::EiscpResult<()> {
//! let gateway = GatewayBuilder::new().model("TX-NR616").build()?;
//! gateway
//!     .controller
//!     .set_device(DeviceAddress::new("192.168.1.50", 60128))
//!     .await;
//! let volume = gateway.accessor.get("MVL").await;
//! # Ok(())
//! # }
//! ```

use crate::accessor::{CommandSender, PropertyAccessor, DEFAULT_WAIT};
use crate::controller::GatewayController;
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::store::PropertyStore;
use crate::updater::PropertyUpdater;
use eiscp_core::EiscpResult;
use eiscp_session::{ModelProfile, ModelTable, SessionConfig, DEFAULT_MODEL};
use std::sync::Arc;
use std::time::Duration;

/// Builder for a [`Gateway`]
///
/// # Default Settings
/// - Model: TX-NR616
/// - Session timings: see [`SessionConfig::default`]
/// - Accessor wait: 1 second
/// - Metrics: disabled
#[derive(Clone)]
pub struct GatewayBuilder {
    /// Receiver model, looked up in `models` on build
    model: String,
    /// Known receiver models
    models: ModelTable,
    /// Session timings and framing
    session: SessionConfig,
    /// Deadline for get/set answers
    wait: Duration,
    /// Stats destination
    metrics: Arc<dyn MetricsSink>,
}

/// A wired gateway
///
/// The accessor sends through the controller, and the controller's sessions
/// publish into the store.
pub struct Gateway {
    pub controller: Arc<GatewayController>,
    pub accessor: Arc<PropertyAccessor>,
    pub store: Arc<PropertyStore>,
}

impl GatewayBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            models: ModelTable::new(),
            session: SessionConfig::default(),
            wait: DEFAULT_WAIT,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Select the receiver model
    ///
    /// # Arguments
    /// * `name` - Model name as registered in the model table (e.g. "TX-NR616")
    pub fn model(mut self, name: impl Into<String>) -> Self {
        self.model = name.into();
        self
    }

    /// Register an additional receiver model
    pub fn register_model(mut self, profile: ModelProfile) -> Self {
        self.models.register(profile);
        self
    }

    /// Replace the session configuration
    ///
    /// The model profile inside `config` is replaced by the selected model on
    /// build.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Quiet time before a keep-alive query
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.session.read_timeout = timeout;
        self
    }

    /// Time a keep-alive query may go unanswered before the link is suspect
    pub fn liveness_window(mut self, window: Duration) -> Self {
        self.session.liveness_window = window;
        self
    }

    /// Pause between failed dials
    pub fn dial_backoff(mut self, backoff: Duration) -> Self {
        self.session.dial_backoff = backoff;
        self
    }

    /// Upper bound for one dial attempt
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.session.connect_timeout = Some(timeout);
        self
    }

    /// Deadline for get/set answers
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Stats destination
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the gateway
    ///
    /// No connection is made. Call [`GatewayController::set_device`] to start
    /// one.
    ///
    /// # Errors
    /// Returns `EiscpError::UnknownModel` if the selected model is not in the
    /// model table.
    pub fn build(self) -> EiscpResult<Gateway> {
        let mut session = self.session;
        session.model = self.models.get(&self.model)?.clone();

        let store = Arc::new(PropertyStore::new());
        let updater = Arc::new(PropertyUpdater::new(store.clone(), self.metrics.clone()));
        let controller = Arc::new(GatewayController::new(session, updater));
        let sender: Arc<dyn CommandSender> = controller.clone();
        let accessor = Arc::new(PropertyAccessor::new(
            store.clone(),
            sender,
            self.metrics,
            self.wait,
        ));

        Ok(Gateway {
            controller,
            accessor,
            store,
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerStatus;
    use eiscp_core::EiscpError;
    use tokio_test::assert_ok;

    #[test]
    fn test_build_defaults() {
        let gateway = assert_ok!(GatewayBuilder::new().build());
        assert_eq!(gateway.controller.status(), ControllerStatus::Disconnected);
        assert!(gateway.store.is_empty());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let result = GatewayBuilder::new().model("XX-0000").build();
        assert!(matches!(result, Err(EiscpError::UnknownModel(_))));
    }

    #[test]
    fn test_registered_model_accepted() {
        let profile = ModelProfile::new("TX-NR1009", [2, 0, 0, 0], b"\r".to_vec());
        let result = GatewayBuilder::new()
            .register_model(profile)
            .model("TX-NR1009")
            .build();
        let gateway = assert_ok!(result);
        assert!(gateway.store.is_empty());
    }
}

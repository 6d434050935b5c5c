//! Inbound command handling

use crate::metrics::MetricsSink;
use crate::store::PropertyStore;
use eiscp_core::Command;
use eiscp_session::InboundHandler;
use std::sync::Arc;

/// Feeds every command the device reports into the property store
pub struct PropertyUpdater {
    store: Arc<PropertyStore>,
    metrics: Arc<dyn MetricsSink>,
}

impl PropertyUpdater {
    pub fn new(store: Arc<PropertyStore>, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }
}

impl InboundHandler for PropertyUpdater {
    fn on_command(&self, command: &Command) {
        let property = self
            .store
            .upsert(command.code().clone(), command.parameter().as_str());

        if let Some(level) = property.hex_value() {
            log::debug!("Sending stat update {} {}", property.code, level);
            self.metrics.gauge(&format!("update.{}", property.code), level);
        }
    }
}

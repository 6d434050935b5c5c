//! Get/set access to device properties
//!
//! Both operations send a command and then wait, bounded by a short deadline,
//! for the read loop to publish the answer into the [`PropertyStore`]. A
//! timeout is an ordinary outcome: `get` yields an empty value and `set`
//! yields false. An unknown code and an unreachable device look the same.

use crate::metrics::MetricsSink;
use crate::store::PropertyStore;
use eiscp_core::{Command, Parameter, Property, PropertyCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How long get/set wait for the device to answer
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

/// Queues commands for the device
#[cfg_attr(test, mockall::automock)]
pub trait CommandSender: Send + Sync {
    /// Returns false if the command could not be queued
    fn send(&self, command: &Command) -> bool;
}

/// Resolves property reads and writes against the device
pub struct PropertyAccessor {
    store: Arc<PropertyStore>,
    sender: Arc<dyn CommandSender>,
    metrics: Arc<dyn MetricsSink>,
    wait: Duration,
}

impl PropertyAccessor {
    pub fn new(
        store: Arc<PropertyStore>,
        sender: Arc<dyn CommandSender>,
        metrics: Arc<dyn MetricsSink>,
        wait: Duration,
    ) -> Self {
        Self {
            store,
            sender,
            metrics,
            wait,
        }
    }

    /// Current value of `code`
    ///
    /// Served from the cache when present. Otherwise the device is queried
    /// and the answer awaited; returns an empty string if none arrives in
    /// time.
    pub async fn get(&self, code: &str) -> String {
        let Ok(code) = PropertyCode::new(code) else {
            log::debug!("Ignoring get for invalid property {:?}", code);
            return String::new();
        };

        let property = match self.store.get(&code) {
            Some(property) => Some(property),
            None => self.query(&code).await,
        };
        let Some(property) = property else {
            log::debug!("No value for {} within {:?}", code, self.wait);
            return String::new();
        };
        log::debug!("Got value {:?} for {}", property.value, code);

        if let Some(number) = property.decimal_value() {
            self.metrics.absolute(&format!("get.{}", code), number);
        }
        property.value
    }

    /// Assign `value` to `code` and wait for the device to confirm it
    ///
    /// Returns false if the device reports a different value (for example a
    /// clamped level) or does not answer in time.
    pub async fn set(&self, code: &str, value: &str) -> bool {
        let Ok(code) = PropertyCode::new(code) else {
            log::debug!("Ignoring set for invalid property {:?}", code);
            return false;
        };
        let Ok(parameter) = Parameter::value(value) else {
            log::debug!("Ignoring set of {} to invalid value {:?}", code, value);
            return false;
        };

        let mut rx = self.store.subscribe(&code);
        self.sender.send(&Command::new(code.clone(), parameter));
        let confirmed = self
            .wait_for(&mut rx, |property| property.value == value)
            .await;

        match confirmed {
            Some(property) => {
                if let Some(number) = property.decimal_value() {
                    self.metrics.absolute(&format!("post.{}", code), number);
                }
                true
            }
            None => {
                log::debug!(
                    "Property {} should have been set to {:?} but is {:?}",
                    code,
                    value,
                    self.store.value(&code)
                );
                false
            }
        }
    }

    async fn query(&self, code: &PropertyCode) -> Option<Property> {
        let mut rx = self.store.subscribe(code);
        self.sender.send(&Command::query(code.clone()));
        log::debug!("Waiting for {}", code);
        self.wait_for(&mut rx, |_| true).await
    }

    /// Wait until the cached property satisfies `accept`
    async fn wait_for(
        &self,
        rx: &mut watch::Receiver<Option<Property>>,
        accept: impl Fn(&Property) -> bool,
    ) -> Option<Property> {
        let waited = tokio::time::timeout(
            self.wait,
            rx.wait_for(|property| property.as_ref().is_some_and(&accept)),
        )
        .await;
        match waited {
            Ok(Ok(property)) => property.clone(),
            _ => None,
        }
    }
}

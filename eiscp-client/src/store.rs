//! Property cache
//!
//! Every code gets its own `watch` slot. The read loop publishes into the slot
//! and accessors wait on a receiver until the value they need shows up.

use eiscp_core::{Property, PropertyCode};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type Slot = watch::Sender<Option<Property>>;

/// Last known value of every property the device reported
#[derive(Debug, Default)]
pub struct PropertyStore {
    slots: Mutex<HashMap<PropertyCode, Slot>>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<PropertyCode, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached property for `code`
    pub fn get(&self, code: &PropertyCode) -> Option<Property> {
        self.slots().get(code).and_then(|slot| slot.borrow().clone())
    }

    /// Cached value for `code`
    pub fn value(&self, code: &PropertyCode) -> Option<String> {
        self.get(code).map(|property| property.value)
    }

    /// Record a value reported by the device and wake its waiters
    ///
    /// Last write wins. Returns the stored property.
    pub fn upsert(&self, code: PropertyCode, value: &str) -> Property {
        let property = Property::new(code.clone(), value);
        self.slots()
            .entry(code)
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(property.clone()));
        property
    }

    /// Receiver for changes to `code`
    ///
    /// Subscribe before sending the command whose answer you wait for, so the
    /// answer cannot slip in between.
    pub fn subscribe(&self, code: &PropertyCode) -> watch::Receiver<Option<Property>> {
        self.slots()
            .entry(code.clone())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    /// Number of properties with a cached value
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.borrow().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn code(s: &str) -> PropertyCode {
        PropertyCode::new(s).unwrap()
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let store = PropertyStore::new();
        assert!(store.is_empty());
        assert_eq!(store.value(&code("PWR")), None);

        store.upsert(code("PWR"), "00");
        store.upsert(code("PWR"), "01");
        let stored = store.upsert(code("MVL"), "2A");
        assert_eq!(stored.value, "2A");
        assert_eq!(store.value(&code("PWR")).as_deref(), Some("01"));
        assert_eq!(store.get(&code("MVL")).unwrap().hex_value(), Some(42));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_subscribe_alone_does_not_cache() {
        let store = PropertyStore::new();
        let rx = store.subscribe(&code("SLI"));
        assert!(rx.borrow().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_is_woken_by_upsert() {
        let store = Arc::new(PropertyStore::new());
        let mut rx = store.subscribe(&code("MVL"));

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.upsert(code("MVL"), "30");
        });

        let value = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|p| p.as_ref().is_some_and(|p| p.value == "30")),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(value.unwrap().value, "30");
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::component::{ComponentEvent, PropertyUpdate};

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type UpdateCallback = Arc<dyn Fn(&PropertyUpdate) + Send + Sync>;
type EventCallback = Arc<dyn Fn(&ComponentEvent) + Send + Sync>;
type LivenessCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Stores callbacks by kind and dispatches notifications to them.
///
/// Dispatch works on a snapshot, so a callback may unsubscribe itself or
/// others without deadlocking.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use serde_json::json;
/// use shelly_lib::{CallbackRegistry, PropertyUpdate};
///
/// let registry = CallbackRegistry::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// let id = registry.on_update(move |update| {
///     assert_eq!(update.component, "switch:0");
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// registry.dispatch_update(&PropertyUpdate::new("switch:0", "state", json!(true)));
/// assert!(registry.unsubscribe(id));
/// registry.dispatch_update(&PropertyUpdate::new("switch:0", "state", json!(false)));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
pub struct CallbackRegistry {
    next_id: AtomicU64,
    update_callbacks: RwLock<HashMap<SubscriptionId, UpdateCallback>>,
    event_callbacks: RwLock<HashMap<SubscriptionId, EventCallback>>,
    liveness_callbacks: RwLock<HashMap<SubscriptionId, LivenessCallback>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            update_callbacks: RwLock::new(HashMap::new()),
            event_callbacks: RwLock::new(HashMap::new()),
            liveness_callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a property update callback.
    pub fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyUpdate) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.update_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a component event callback.
    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ComponentEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.event_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers an online/offline callback.
    pub fn on_liveness<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.liveness_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Removes a callback of any kind.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.update_callbacks.write().remove(&id).is_some()
            || self.event_callbacks.write().remove(&id).is_some()
            || self.liveness_callbacks.write().remove(&id).is_some()
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.update_callbacks.write().clear();
        self.event_callbacks.write().clear();
        self.liveness_callbacks.write().clear();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Notifies update subscribers.
    pub fn dispatch_update(&self, update: &PropertyUpdate) {
        let callbacks: Vec<_> = self.update_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(update);
        }
    }

    /// Notifies event subscribers.
    pub fn dispatch_event(&self, event: &ComponentEvent) {
        let callbacks: Vec<_> = self.event_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Notifies liveness subscribers.
    pub fn dispatch_liveness(&self, online: bool) {
        let callbacks: Vec<_> = self.liveness_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(online);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.update_callbacks.read().len()
            + self.event_callbacks.read().len()
            + self.liveness_callbacks.read().len()
    }

    /// Whether no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use serde_json::json;

    use super::*;

    #[test]
    fn subscription_id_display() {
        assert_eq!(SubscriptionId::new(42).to_string(), "Sub(42)");
    }

    #[test]
    fn update_callback_until_unsubscribed() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let id = registry.on_update(move |update| {
            assert_eq!(update.property, "state");
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(registry.callback_count(), 1);

        let update = PropertyUpdate::new("switch:0", "state", json!(true));
        registry.dispatch_update(&update);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.dispatch_update(&update);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn kinds_are_separate() {
        let registry = CallbackRegistry::new();
        let events = Arc::new(AtomicU32::new(0));
        let events_clone = events.clone();
        let online = Arc::new(RwLock::new(None));
        let online_clone = online.clone();

        registry.on_event(move |_| {
            events_clone.fetch_add(1, Ordering::SeqCst);
        });
        registry.on_liveness(move |value| *online_clone.write() = Some(value));

        registry.dispatch_liveness(false);
        assert_eq!(*online.read(), Some(false));
        assert_eq!(events.load(Ordering::SeqCst), 0);

        registry.dispatch_event(&ComponentEvent {
            component: "input:0".into(),
            event: "single_push".into(),
        });
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_during_dispatch() {
        let registry = Arc::new(CallbackRegistry::new());
        let slot = Arc::new(RwLock::new(None::<SubscriptionId>));
        let inner_registry = Arc::clone(&registry);
        let inner_slot = Arc::clone(&slot);

        let id = registry.on_liveness(move |_| {
            if let Some(id) = *inner_slot.read() {
                inner_registry.unsubscribe(id);
            }
        });
        *slot.write() = Some(id);

        registry.dispatch_liveness(true);
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_removes_all() {
        let registry = CallbackRegistry::new();
        registry.on_update(|_| {});
        registry.on_event(|_| {});
        registry.clear();
        assert!(registry.is_empty());
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{RwLock, broadcast};

use super::ManagerConfig;
use crate::device::Device;
use crate::discovery::{
    DeviceFilter, DeviceStore, DiscoveredDevice, Discovery, DiscoveryRegistry, MemoryStore,
    is_valid_ipv4,
};
use crate::error::{DeviceError, Error, Result};
use crate::event::{DeviceId, EventBus, ShellyEvent};
use crate::subscription::Subscribable;

/// Owns the discovery registry and every live device.
///
/// Discovery records from any source go through
/// [`handle_discovered`](Self::handle_discovered): the registry merges them
/// by id, the white and black lists are applied, and a [`Device`] is
/// created. Device updates and events are republished on the manager's
/// [`EventBus`].
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use shelly_lib::discovery::{DiscoveredDevice, FileStore};
/// use shelly_lib::manager::{DeviceManager, ManagerConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let store = Arc::new(FileStore::new("/var/lib/shelly"));
///     let manager = DeviceManager::new(ManagerConfig::default(), store);
///     let mut events = manager.subscribe();
///
///     manager.load_stored().await;
///     manager
///         .handle_discovered(DiscoveredDevice::new("ShellyPlus1-A8032AB12345", "192.168.1.40", 80, None))
///         .await;
///
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
/// }
/// ```
#[derive(Debug)]
pub struct DeviceManager {
    config: ManagerConfig,
    filter: DeviceFilter,
    registry: Mutex<DiscoveryRegistry>,
    store: Arc<dyn DeviceStore>,
    /// Live devices, keyed by the id the device reports.
    devices: Arc<RwLock<HashMap<DeviceId, Device>>>,
    event_bus: EventBus,
    shut_down: AtomicBool,
}

impl DeviceManager {
    /// Creates a manager persisting into `store`.
    #[must_use]
    pub fn new(config: ManagerConfig, store: Arc<dyn DeviceStore>) -> Self {
        Self {
            filter: DeviceFilter::new(config.whitelist.iter(), config.blacklist.iter()),
            registry: Mutex::new(DiscoveryRegistry::new(Arc::clone(&store))),
            store,
            devices: Arc::new(RwLock::new(HashMap::new())),
            event_bus: EventBus::new(),
            shut_down: AtomicBool::new(false),
            config,
        }
    }

    /// Creates a manager with an in-memory store.
    #[must_use]
    pub fn in_memory(config: ManagerConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// The configuration the manager was built with.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShellyEvent> {
        self.event_bus.subscribe()
    }

    /// Returns the number of active event subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.event_bus.subscriber_count()
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    /// Feeds one discovery record through dedup, filtering and device
    /// creation.
    ///
    /// Returns the id of the device created for this record, if any.
    pub async fn handle_discovered(&self, device: DiscoveredDevice) -> Option<DeviceId> {
        if self.shut_down.load(Ordering::SeqCst) {
            tracing::debug!(device = %device.id, "Ignoring discovery after shutdown");
            return None;
        }

        let outcome = self.registry.lock().discovered(device);
        let Discovery::New(device) = outcome else {
            return None;
        };
        self.event_bus
            .publish(ShellyEvent::Discovered(device.clone()));

        if !self.filter.allows(&device.id) {
            return None;
        }
        self.create_device(device).await
    }

    /// Replays stored identifiers when storage discovery is enabled.
    pub async fn load_stored(&self) -> Vec<DeviceId> {
        if !self.config.enable_storage_discover {
            return Vec::new();
        }
        let stored = self.registry.lock().stored();
        tracing::debug!(count = stored.len(), "Loading stored shelly devices");
        self.replay(stored).await
    }

    /// Replays the static `device_ip` entries when config discovery is
    /// enabled. Entries whose host is not an IPv4 address are skipped.
    pub async fn load_configured(&self) -> Vec<DeviceId> {
        if !self.config.enable_config_discover {
            return Vec::new();
        }
        let configured: Vec<DiscoveredDevice> = self
            .config
            .device_ip
            .iter()
            .filter(|(id, host)| {
                let valid = is_valid_ipv4(host);
                if !valid {
                    tracing::error!(device = %id, host = %host, "Configured device has no valid IPv4 address");
                }
                valid
            })
            .map(|(id, host)| DiscoveredDevice::new(id, host.clone(), 0, None))
            .collect();
        self.replay(configured).await
    }

    /// Records are connected concurrently so one silent host does not hold
    /// up the others.
    async fn replay(&self, records: Vec<DiscoveredDevice>) -> Vec<DeviceId> {
        let pending = records
            .into_iter()
            .map(|record| self.handle_discovered(record));
        join_all(pending).await.into_iter().flatten().collect()
    }

    /// Waits until `failsafe_count` devices exist or `timeout` elapses.
    ///
    /// Returns `true` if the count was reached.
    pub async fn wait_for_failsafe(&self, timeout: Duration) -> bool {
        let target = self.config.failsafe_count;
        let poll = self.config.failsafe_poll;
        let wait = async {
            loop {
                if self.devices.read().await.len() >= target {
                    return;
                }
                tokio::time::sleep(poll).await;
            }
        };
        let reached = tokio::time::timeout(timeout, wait).await.is_ok();
        if reached {
            tracing::info!(count = target, "Failsafe device count reached");
        } else {
            let found = self.device_count().await;
            tracing::warn!(expected = target, found, "Timed out waiting for shelly devices");
        }
        reached
    }

    // =========================================================================
    // Device creation
    // =========================================================================

    async fn create_device(&self, record: DiscoveredDevice) -> Option<DeviceId> {
        let address = device_address(&record);
        if self.is_known(&record.id, &address).await {
            tracing::info!(device = %record.id, host = %address, "Shelly device already exists");
            return None;
        }

        let device = match self.connect(&record, &address).await {
            Ok(device) => device,
            Err(e) => {
                tracing::error!(device = %record.id, host = %address, error = %e, "Failed to create shelly device");
                return None;
            }
        };

        if let Err(e) = device.validate() {
            tracing::error!(device = %device.id(), host = %address, error = %e, "Invalid shelly device");
            device.destroy();
            return None;
        }
        if !device.is_cached() {
            self.cache_payloads(&record.id, &device);
        }

        let id = device.id().clone();
        {
            let mut devices = self.devices.write().await;
            let duplicate = devices.contains_key(&id)
                || devices.values().any(|known| known.host() == device.host());
            if duplicate || self.shut_down.load(Ordering::SeqCst) {
                tracing::info!(device = %id, "Shelly device created concurrently, dropping duplicate");
                device.destroy();
                return None;
            }
            self.forward_events(&device);
            devices.insert(id.clone(), device);
        }
        self.event_bus.publish(ShellyEvent::added(id.clone()));
        Some(id)
    }

    /// Caches under the id the device reports and, when the record named it
    /// differently, under the record id too, since that is the key a later
    /// fallback looks up.
    fn cache_payloads(&self, record_id: &DeviceId, device: &Device) {
        let payloads = device.payloads();
        let mut keys = vec![device.id()];
        if record_id != device.id() && !record_id.is_empty() {
            keys.push(record_id);
        }
        for key in keys {
            if let Err(e) = self.store.save_payloads(key, payloads) {
                tracing::warn!(device = %key, error = %e, "Failed to cache device payloads");
            }
        }
    }

    async fn is_known(&self, id: &DeviceId, address: &str) -> bool {
        let devices = self.devices.read().await;
        devices.contains_key(id) || devices.values().any(|device| device.host() == address)
    }

    async fn connect(&self, record: &DiscoveredDevice, address: &str) -> Result<Device> {
        let options = self.config.options.clone();
        match Device::create(address, options.clone()).await {
            Ok(device) => Ok(device),
            Err(e @ (Error::Device(DeviceError::Unreachable { .. }) | Error::Protocol(_))) => {
                let Some(payloads) = self.store.load_payloads(&record.id)? else {
                    return Err(e);
                };
                tracing::warn!(device = %record.id, host = %address, error = %e, "Device unreachable, using cached payloads");
                let transport = options.http_config(address).into_client()?;
                Device::from_payloads(address, transport, options, payloads)
            }
            Err(e) => Err(e),
        }
    }

    fn forward_events(&self, device: &Device) {
        let bus = self.event_bus.clone();
        let id = device.id().clone();
        device.on_update(move |update| {
            bus.publish(ShellyEvent::updated(id.clone(), update.clone()));
        });

        let bus = self.event_bus.clone();
        let id = device.id().clone();
        device.on_event(move |event| {
            bus.publish(ShellyEvent::event(id.clone(), event.clone()));
        });
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Returns a handle to one device.
    pub async fn device(&self, id: &DeviceId) -> Option<Device> {
        self.devices.read().await.get(id).cloned()
    }

    /// Returns the ids of every device.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.read().await.keys().cloned().collect()
    }

    /// Returns the number of devices.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Returns the number of registered discovery records.
    #[must_use]
    pub fn discovered_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Destroys and removes one device.
    ///
    /// Returns `true` if the device existed.
    pub async fn remove_device(&self, id: &DeviceId) -> bool {
        let removed = self.devices.write().await.remove(id);
        match removed {
            Some(device) => {
                device.destroy();
                self.event_bus.publish(ShellyEvent::removed(id.clone()));
                true
            }
            None => false,
        }
    }

    /// Destroys every device. Later discoveries are ignored. Safe to call
    /// more than once.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let devices: Vec<Device> = self.devices.write().await.drain().map(|(_, d)| d).collect();
        for device in &devices {
            device.destroy();
        }
        tracing::info!(count = devices.len(), "Device manager shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::in_memory(ManagerConfig::default())
    }
}

/// `host` for the default port, `host:port` otherwise.
fn device_address(record: &DiscoveredDevice) -> String {
    match record.port {
        0 | 80 => record.host.clone(),
        port => format!("{}:{port}", record.host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, host: &str) -> DiscoveredDevice {
        DiscoveredDevice::new(id, host, 80, None)
    }

    #[test]
    fn address_includes_custom_ports() {
        assert_eq!(device_address(&record("a", "10.0.0.1")), "10.0.0.1");
        assert_eq!(
            device_address(&DiscoveredDevice::new("a", "10.0.0.1", 0, None)),
            "10.0.0.1"
        );
        assert_eq!(
            device_address(&DiscoveredDevice::new("a", "127.0.0.1", 8081, None)),
            "127.0.0.1:8081"
        );
    }

    #[tokio::test]
    async fn blacklisted_devices_are_registered_but_not_created() {
        let manager = DeviceManager::in_memory(
            ManagerConfig::default().with_blacklist(["shelly1-aabbcc"]),
        );
        let mut events = manager.subscribe();

        let created = manager
            .handle_discovered(record("Shelly1-AABBCC", "192.0.2.1"))
            .await;

        assert!(created.is_none());
        assert_eq!(manager.discovered_count(), 1);
        assert_eq!(manager.device_count().await, 0);
        assert!(matches!(events.try_recv(), Ok(ShellyEvent::Discovered(_))));
    }

    #[tokio::test]
    async fn known_records_are_not_propagated_twice() {
        let manager =
            DeviceManager::in_memory(ManagerConfig::default().with_whitelist(["someone-else"]));
        let mut events = manager.subscribe();

        manager.handle_discovered(record("shelly1-x", "192.0.2.1")).await;
        manager.handle_discovered(record("shelly1-x", "192.0.2.1")).await;

        assert!(matches!(events.try_recv(), Ok(ShellyEvent::Discovered(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn configured_entries_require_ipv4() {
        let manager = DeviceManager::in_memory(
            ManagerConfig::default()
                .with_whitelist(["nobody"])
                .with_device_ip("shelly1-a", "10.0.0.7")
                .with_device_ip("shelly1-b", "shelly1-b.local"),
        );
        manager.load_configured().await;
        assert_eq!(manager.discovered_count(), 1);
    }

    #[tokio::test]
    async fn config_discovery_can_be_disabled() {
        let mut config = ManagerConfig::default().with_device_ip("shelly1-a", "10.0.0.7");
        config.enable_config_discover = false;
        let manager = DeviceManager::in_memory(config);
        assert!(manager.load_configured().await.is_empty());
        assert_eq!(manager.discovered_count(), 0);
    }

    #[tokio::test]
    async fn discovery_keeps_previously_stored_devices() {
        let store = Arc::new(MemoryStore::with_devices(vec![
            record("shelly1-aaaaaa", "192.0.2.1"),
            record("shellyplus1-bbbbbb", "192.0.2.2"),
        ]));
        let manager =
            DeviceManager::new(ManagerConfig::default().with_whitelist(["nobody"]), store.clone());

        manager
            .handle_discovered(record("shellyplus1-cccccc", "192.0.2.3"))
            .await;

        let mut ids: Vec<String> = store
            .load()
            .unwrap()
            .into_iter()
            .map(|device| device.id.as_str().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, ["shelly1-aaaaaa", "shellyplus1-bbbbbb", "shellyplus1-cccccc"]);
    }

    #[test]
    fn manager_futures_can_be_spawned() {
        fn assert_send<T: Send>(_: &T) {}

        let manager = DeviceManager::default();
        assert_send(&manager.wait_for_failsafe(Duration::from_secs(1)));
        assert_send(&manager.load_stored());
        assert_send(&manager.load_configured());
        assert_send(&manager.handle_discovered(record("shelly1-x", "192.0.2.1")));
        assert_send(&manager.shutdown());
    }

    #[tokio::test(start_paused = true)]
    async fn failsafe_times_out_without_devices() {
        let manager = DeviceManager::in_memory(ManagerConfig::default().with_failsafe_count(1));
        assert!(!manager.wait_for_failsafe(Duration::from_secs(5)).await);

        let empty = DeviceManager::default();
        assert!(empty.wait_for_failsafe(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_stops_discovery() {
        let manager = DeviceManager::default();
        manager.shutdown().await;
        manager.shutdown().await;
        assert!(manager.is_shut_down());
        assert!(
            manager
                .handle_discovered(record("shelly1-x", "192.0.2.1"))
                .await
                .is_none()
        );
        assert_eq!(manager.discovered_count(), 0);
        assert!(!manager.remove_device(&DeviceId::new("shelly1-x")).await);
    }
}

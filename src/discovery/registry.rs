// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The devices-by-id registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{DeviceStore, DiscoveredDevice};
use crate::event::DeviceId;

/// Outcome of feeding one record into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// First sighting. The record should be propagated to device creation.
    New(DiscoveredDevice),
    /// Same id, same host. Nothing to do.
    Known,
    /// Same id, different host. The registry now holds the new host.
    Drift {
        /// Host the id was registered with before.
        previous_host: String,
    },
}

/// Merges discovery records from every source by normalized id.
///
/// Two maps are kept: the ids seen during this run, and the persisted list.
/// The persisted list starts from whatever the store held at construction
/// and only ever grows or takes a newer host, so saving it never drops
/// records that have not been replayed yet.
#[derive(Debug)]
pub struct DiscoveryRegistry {
    devices: BTreeMap<DeviceId, DiscoveredDevice>,
    persisted: BTreeMap<DeviceId, DiscoveredDevice>,
    store: Arc<dyn DeviceStore>,
}

impl DiscoveryRegistry {
    /// Creates a registry persisting into `store`, seeded with the list the
    /// store already holds.
    ///
    /// A store that cannot be read is logged and treated as empty.
    #[must_use]
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        let persisted = match store.load() {
            Ok(devices) => devices
                .into_iter()
                .filter(|device| !device.id.is_empty())
                .map(|device| (device.id.clone(), device))
                .collect(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load stored devices");
                BTreeMap::new()
            }
        };
        tracing::debug!(count = persisted.len(), "Loaded stored shelly devices");
        Self {
            devices: BTreeMap::new(),
            persisted,
            store,
        }
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DeviceStore> {
        &self.store
    }

    /// Applies the dedup and drift rules to one record.
    pub fn discovered(&mut self, device: DiscoveredDevice) -> Discovery {
        if device.id.is_empty() {
            tracing::warn!(host = %device.host, "Ignoring discovery without device id");
            return Discovery::Known;
        }

        match self.devices.get_mut(&device.id) {
            Some(known) if known.host == device.host => {
                tracing::info!(device = %device.id, host = %device.host, "Shelly device already discovered");
                Discovery::Known
            }
            Some(known) => {
                let previous_host = std::mem::replace(&mut known.host, device.host.clone());
                known.port = device.port;
                if device.generation.is_some() {
                    known.generation = device.generation;
                }
                tracing::warn!(device = %device.id, "Shelly device is already discovered with a different host");
                tracing::warn!(
                    device = %device.id,
                    from = %previous_host,
                    to = %device.host,
                    "Set new address for shelly device"
                );
                tracing::warn!("Please restart for the change to take effect");
                self.persisted.insert(device.id.clone(), known.clone());
                self.persist();
                Discovery::Drift { previous_host }
            }
            None => {
                tracing::info!(
                    device = %device.id,
                    host = %device.host,
                    port = device.port,
                    generation = ?device.generation,
                    "Discovered shelly device"
                );
                self.devices.insert(device.id.clone(), device.clone());
                self.persisted.insert(device.id.clone(), device.clone());
                self.persist();
                Discovery::New(device)
            }
        }
    }

    /// Returns the persisted records whose host is a valid IPv4 address.
    ///
    /// Records with another host stay persisted; they are only skipped here.
    #[must_use]
    pub fn stored(&self) -> Vec<DiscoveredDevice> {
        self.persisted
            .values()
            .filter(|device| {
                let valid = device.has_ipv4_host();
                if !valid {
                    tracing::error!(device = %device.id, host = %device.host, "Stored device has an invalid host");
                }
                valid
            })
            .cloned()
            .collect()
    }

    /// Looks up a record.
    #[must_use]
    pub fn get(&self, id: &DeviceId) -> Option<&DiscoveredDevice> {
        self.devices.get(id)
    }

    /// Number of registered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterates over the records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredDevice> {
        self.devices.values()
    }

    fn persist(&self) {
        let devices: Vec<_> = self.persisted.values().cloned().collect();
        tracing::debug!(count = devices.len(), "Saving discovered shelly devices");
        if let Err(e) = self.store.save(&devices) {
            tracing::error!(error = %e, "Failed to save discovered devices");
        }
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Manager configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::DeviceOptions;

/// Configuration of a [`DeviceManager`](super::DeviceManager).
///
/// # Examples
///
/// ```
/// use shelly_lib::manager::ManagerConfig;
///
/// let config: ManagerConfig = serde_json::from_str(r#"{
///     "blacklist": ["shellyplug-s-0a1b2c"],
///     "device_ip": {"shelly1-aabbcc": "192.168.1.31"},
///     "failsafe_count": 2
/// }"#).unwrap();
/// assert!(config.enable_storage_discover);
/// assert_eq!(config.device_ip.len(), 1);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Options applied to every device.
    pub options: DeviceOptions,
    /// When not empty, only these ids are created.
    pub whitelist: Vec<String>,
    /// Ids that are never created.
    pub blacklist: Vec<String>,
    /// Statically configured devices, id to IPv4 host.
    pub device_ip: BTreeMap<String, String>,
    /// Whether stored identifiers are replayed on start.
    pub enable_storage_discover: bool,
    /// Whether `device_ip` entries are replayed on start.
    pub enable_config_discover: bool,
    /// Number of devices to wait for before the host reports ready.
    pub failsafe_count: usize,
    /// Poll period of [`wait_for_failsafe`](super::DeviceManager::wait_for_failsafe).
    #[serde(with = "crate::config::duration_millis")]
    pub failsafe_poll: Duration,
}

impl ManagerConfig {
    /// Default failsafe poll period.
    pub const DEFAULT_FAILSAFE_POLL: Duration = Duration::from_millis(250);

    /// Creates a configuration with the given device options.
    #[must_use]
    pub fn new(options: DeviceOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Sets the white list.
    #[must_use]
    pub fn with_whitelist<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the black list.
    #[must_use]
    pub fn with_blacklist<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a statically configured device.
    #[must_use]
    pub fn with_device_ip(mut self, id: impl Into<String>, host: impl Into<String>) -> Self {
        self.device_ip.insert(id.into(), host.into());
        self
    }

    /// Sets the failsafe device count.
    #[must_use]
    pub fn with_failsafe_count(mut self, count: usize) -> Self {
        self.failsafe_count = count;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            options: DeviceOptions::default(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            device_ip: BTreeMap::new(),
            enable_storage_discover: true,
            enable_config_discover: true,
            failsafe_count: 0,
            failsafe_poll: Self::DEFAULT_FAILSAFE_POLL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_lists() {
        let config = ManagerConfig::default()
            .with_whitelist(["a", "b"])
            .with_blacklist(vec!["c".to_string()])
            .with_device_ip("shelly1-x", "10.0.0.2")
            .with_failsafe_count(3);
        assert_eq!(config.whitelist, ["a", "b"]);
        assert_eq!(config.blacklist, ["c"]);
        assert_eq!(config.device_ip["shelly1-x"], "10.0.0.2");
        assert_eq!(config.failsafe_count, 3);
    }

    #[test]
    fn nested_device_options_deserialize() {
        let config: ManagerConfig = serde_json::from_value(serde_json::json!({
            "options": {"password": "pw", "live_channel": false},
            "enable_config_discover": false,
            "failsafe_poll": 10
        }))
        .unwrap();
        assert_eq!(config.options.password.as_deref(), Some("pw"));
        assert!(!config.options.live_channel);
        assert!(!config.enable_config_discover);
        assert_eq!(config.failsafe_poll, Duration::from_millis(10));
    }
}

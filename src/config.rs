// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device options.
//!
//! [`DeviceOptions`] gathers everything a device needs besides its host:
//! credentials, the RPC source tag, liveness thresholds and timer delays.
//! It derives `Deserialize` so an application can keep it in a JSON file;
//! durations are written in seconds, the debounce delay in milliseconds.

use std::time::Duration;

use serde::Deserialize;

use crate::protocol::{DEFAULT_SOURCE, HttpConfig, LiveChannelConfig};

/// Options applied to every device a caller creates.
///
/// # Examples
///
/// ```
/// use shelly_lib::DeviceOptions;
/// use std::time::Duration;
///
/// let options = DeviceOptions::default()
///     .with_password("secret")
///     .with_coiot_peer("192.168.1.10:5683")
///     .with_liveness_interval(Duration::from_secs(30));
/// assert_eq!(options.password.as_deref(), Some("secret"));
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    /// User name for Gen1 Basic auth.
    pub username: String,
    /// Password for both auth schemes.
    pub password: Option<String>,
    /// Source tag sent as `src` in RPC frames.
    pub source: String,
    /// HTTP request timeout.
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// Period of the liveness check.
    #[serde(with = "duration_secs")]
    pub liveness_interval: Duration,
    /// Age of the last update after which the device is re-polled.
    #[serde(with = "duration_secs")]
    pub repoll_after: Duration,
    /// Age of the last update after which a staleness warning is logged.
    #[serde(with = "duration_secs")]
    pub stale_after: Duration,
    /// Delay before a Gen2/Gen3 device opens its live channel.
    #[serde(with = "duration_secs")]
    pub live_channel_delay: Duration,
    /// Whether Gen2/Gen3 devices open a live channel at all.
    pub live_channel: bool,
    /// Coalescing window for color channel writes.
    #[serde(with = "duration_millis")]
    pub color_debounce: Duration,
    /// Expected CoIoT peer (`<ipv4>:5683`) of Gen1 devices. `mcast` is
    /// always accepted.
    pub coiot_peer: Option<String>,
}

impl DeviceOptions {
    /// Default liveness check period.
    pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_secs(60);
    /// Default re-poll threshold.
    pub const DEFAULT_REPOLL_AFTER: Duration = Duration::from_secs(9 * 60);
    /// Default staleness warning threshold.
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10 * 60);
    /// Default live channel start delay.
    pub const DEFAULT_LIVE_CHANNEL_DELAY: Duration = Duration::from_secs(10);
    /// Default color coalescing window.
    pub const DEFAULT_COLOR_DEBOUNCE: Duration = Duration::from_millis(500);

    /// Sets the password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets user name and password.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    /// Sets the RPC source tag.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the liveness check period.
    #[must_use]
    pub fn with_liveness_interval(mut self, interval: Duration) -> Self {
        self.liveness_interval = interval;
        self
    }

    /// Sets both liveness thresholds.
    #[must_use]
    pub fn with_liveness_thresholds(mut self, repoll_after: Duration, stale_after: Duration) -> Self {
        self.repoll_after = repoll_after;
        self.stale_after = stale_after;
        self
    }

    /// Sets the live channel start delay.
    #[must_use]
    pub fn with_live_channel_delay(mut self, delay: Duration) -> Self {
        self.live_channel_delay = delay;
        self
    }

    /// Disables the Gen2/Gen3 live channel; the device relies on polling.
    #[must_use]
    pub fn without_live_channel(mut self) -> Self {
        self.live_channel = false;
        self
    }

    /// Sets the color coalescing window.
    #[must_use]
    pub fn with_color_debounce(mut self, delay: Duration) -> Self {
        self.color_debounce = delay;
        self
    }

    /// Sets the expected Gen1 CoIoT peer.
    #[must_use]
    pub fn with_coiot_peer(mut self, peer: impl Into<String>) -> Self {
        self.coiot_peer = Some(peer.into());
        self
    }

    /// Builds the HTTP transport configuration for `host`.
    #[must_use]
    pub fn http_config(&self, host: &str) -> HttpConfig {
        let config = HttpConfig::new(host)
            .with_timeout(self.request_timeout)
            .with_source(self.source.clone());
        match &self.password {
            Some(password) => config.with_credentials(self.username.clone(), password.clone()),
            None => config,
        }
    }

    /// Builds the live channel configuration for `host`.
    #[must_use]
    pub fn live_channel_config(&self, host: &str) -> LiveChannelConfig {
        LiveChannelConfig::new(host)
            .with_password(self.password.clone())
            .with_source(self.source.clone())
            .with_connect_timeout(self.request_timeout)
    }
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            username: HttpConfig::DEFAULT_USERNAME.to_string(),
            password: None,
            source: DEFAULT_SOURCE.to_string(),
            request_timeout: HttpConfig::DEFAULT_TIMEOUT,
            liveness_interval: Self::DEFAULT_LIVENESS_INTERVAL,
            repoll_after: Self::DEFAULT_REPOLL_AFTER,
            stale_after: Self::DEFAULT_STALE_AFTER,
            live_channel_delay: Self::DEFAULT_LIVE_CHANNEL_DELAY,
            live_channel: true,
            color_debounce: Self::DEFAULT_COLOR_DEBOUNCE,
            coiot_peer: None,
        }
    }
}

/// Serde helper reading a [`Duration`] from whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Serde helper reading a [`Duration`] from milliseconds.
pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_match_firmware_timings() {
        let options = DeviceOptions::default();
        assert_eq!(options.liveness_interval, Duration::from_secs(60));
        assert_eq!(options.repoll_after, Duration::from_secs(540));
        assert_eq!(options.stale_after, Duration::from_secs(600));
        assert_eq!(options.color_debounce, Duration::from_millis(500));
        assert!(options.live_channel);
        assert_eq!(options.username, "admin");
    }

    #[test]
    fn deserializes_partial_json() {
        let options: DeviceOptions = serde_json::from_value(json!({
            "password": "pw",
            "liveness_interval": 5,
            "color_debounce": 50,
            "coiot_peer": "10.0.0.2:5683"
        }))
        .unwrap();
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert_eq!(options.liveness_interval, Duration::from_secs(5));
        assert_eq!(options.color_debounce, Duration::from_millis(50));
        assert_eq!(options.stale_after, DeviceOptions::DEFAULT_STALE_AFTER);
    }

    #[test]
    fn http_config_carries_credentials() {
        let config = DeviceOptions::default()
            .with_password("pw")
            .http_config("10.0.0.3");
        assert_eq!(config.base_url(), "http://10.0.0.3");
    }
}

// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device aggregate.
//!
//! A [`Device`] owns the component set of one physical unit. It is built
//! from three payloads (identity, settings, status), keeps its components
//! current from polls and live pushes, and dispatches commands.
//!
//! # Lifecycle
//!
//! - [`Device::create`] fetches the payloads and starts the background
//!   tasks. It fails with [`DeviceError::Unreachable`] when the identity
//!   fetch fails.
//! - [`Device::from_payloads`] builds a device from cached payloads. It is
//!   marked cached and offline until the first successful update.
//! - A liveness task re-polls the device when no update arrived for
//!   [`DeviceOptions::repoll_after`] and logs a warning past
//!   [`DeviceOptions::stale_after`].
//! - Gen2/Gen3 devices open a live channel after
//!   [`DeviceOptions::live_channel_delay`].
//! - [`Device::destroy`] stops everything and clears subscriptions.
//!
//! # Commands
//!
//! Commands never touch local state. Their effect shows up through the next
//! push or poll. On Gen2/Gen3 devices with a ready live channel commands go
//! over the socket, otherwise over HTTP.
//!
//! ```no_run
//! use shelly_lib::{Device, DeviceOptions};
//!
//! # async fn example() -> shelly_lib::Result<()> {
//! let device = Device::create("192.168.1.40", DeviceOptions::default().with_password("secret")).await?;
//! device.on("switch:0").await?;
//! device.set_level("light:0", 40).await?;
//! device.destroy();
//! # Ok(())
//! # }
//! ```

mod coiot;
mod payload;
mod tasks;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use coiot::{CoiotIssue, MULTICAST_PEER};
pub use payload::{ComponentRecord, DevicePayloads, Identity, Profile};

use crate::command::{Command, NativeRequest};
use crate::component::{Component, ComponentEvent, PropertyUpdate};
use crate::config::DeviceOptions;
use crate::debounce::Debouncer;
use crate::error::{DeviceError, ParseError, Result};
use crate::event::DeviceId;
use crate::protocol::{ChannelState, HttpClient, LiveChannel, LiveUpdate, Params, Transport};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::types::{ColorChannel, Generation, Percent, RgbColor};

/// Debounce key group for color channel writes.
const COLOR_GROUP: &str = "color";

#[derive(Debug, Clone, Copy)]
struct LastSeen {
    at: DateTime<Utc>,
    instant: Instant,
}

impl LastSeen {
    fn now() -> Self {
        Self {
            at: Utc::now(),
            instant: Instant::now(),
        }
    }
}

struct Inner<T> {
    id: DeviceId,
    host: String,
    identity: Identity,
    name: String,
    options: DeviceOptions,
    transport: T,
    payloads: DevicePayloads,
    cached: bool,
    components: RwLock<BTreeMap<String, Component>>,
    has_update: AtomicBool,
    online: AtomicBool,
    last_seen: RwLock<LastSeen>,
    callbacks: CallbackRegistry,
    live: Mutex<Option<LiveChannel>>,
    colors: Debouncer<(String, &'static str)>,
    pending_colors: Mutex<HashMap<String, RgbColor>>,
    cancel: CancellationToken,
    destroyed: AtomicBool,
}

impl<T> Inner<T> {
    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// One physical Shelly device.
///
/// Cloning is cheap and yields a handle to the same device.
pub struct Device<T: Transport = HttpClient> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Device<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Device<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.inner.id)
            .field("host", &self.inner.host)
            .field("model", &self.inner.identity.model)
            .field("generation", &self.inner.identity.generation)
            .field("cached", &self.inner.cached)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Connects to `host` over HTTP and builds the device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Unreachable`] if the identity fetch fails,
    /// or a protocol or parse error if settings or status cannot be read.
    pub async fn create(host: &str, options: DeviceOptions) -> Result<Self> {
        let transport = options.http_config(host).into_client()?;
        Self::create_with(host, transport, options).await
    }
}

impl<T: Transport> Device<T> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Builds the device over a custom transport.
    ///
    /// # Errors
    ///
    /// Same as [`Device::create`].
    pub async fn create_with(host: &str, transport: T, options: DeviceOptions) -> Result<Self> {
        let payloads = Self::fetch_payloads(host, &transport).await?;
        let device = Self::assemble(host, transport, options, payloads, false)?;
        device.start();
        Ok(device)
    }

    /// Builds a device from cached payloads. The device starts offline and
    /// comes online on the first successful update.
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the payloads do not describe a device.
    pub fn from_payloads(
        host: &str,
        transport: T,
        options: DeviceOptions,
        payloads: DevicePayloads,
    ) -> Result<Self> {
        let device = Self::assemble(host, transport, options, payloads, true)?;
        device.start();
        Ok(device)
    }

    /// Fetches identity, settings and status.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Unreachable`] if the identity fetch fails.
    pub async fn fetch_payloads(host: &str, transport: &T) -> Result<DevicePayloads> {
        let shelly = transport
            .fetch_identity()
            .await
            .map_err(|e| DeviceError::Unreachable {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        let generation = Identity::decode(&shelly)?.generation;
        let (status_method, settings_method) = if generation.is_rpc() {
            ("Shelly.GetStatus", "Shelly.GetConfig")
        } else {
            ("status", "settings")
        };

        let params = Params::new();
        let status = transport.call(status_method, &params, generation).await?;
        let settings = transport.call(settings_method, &params, generation).await?;
        Ok(DevicePayloads {
            shelly,
            settings,
            status,
        })
    }

    fn assemble(
        host: &str,
        transport: T,
        options: DeviceOptions,
        payloads: DevicePayloads,
        cached: bool,
    ) -> Result<Self> {
        let identity = Identity::decode(&payloads.shelly)?;
        let generation = identity.generation;
        let raw_id = payload::device_id(&identity, &payloads.settings)
            .ok_or_else(|| ParseError::MissingField("device id".into()))?;
        let id = DeviceId::new(&raw_id);
        let name = payload::device_name(generation, &payloads.settings)
            .unwrap_or_else(|| id.to_string());

        let admits = |component_id: &str| {
            let prefix = component_id.split(':').next().unwrap_or(component_id);
            identity.profile.as_ref().is_none_or(|p| p.admits(prefix))
        };

        let mut components = BTreeMap::new();
        for record in payload::settings_records(generation, &payloads.settings) {
            if !admits(&record.id) {
                tracing::debug!(device = %id, component = %record.id, "Skipped by profile");
                continue;
            }
            let mut component = Component::from_id(record.id.clone());
            component.merge(&record.data);
            components.insert(record.id, component);
        }
        if !generation.is_rpc() {
            for record in payload::status_records(generation, &payloads.status) {
                if payload::is_status_only(&record.id) && !components.contains_key(&record.id) {
                    components.insert(record.id.clone(), Component::from_id(record.id));
                }
            }
        }

        let has_update = payload::has_update(generation, &payloads.status).unwrap_or(false);
        let status = payloads.status.clone();
        let inner = Inner {
            id,
            host: host.to_string(),
            identity,
            name,
            colors: Debouncer::new(options.color_debounce),
            options,
            transport,
            payloads,
            cached,
            components: RwLock::new(components),
            has_update: AtomicBool::new(has_update),
            online: AtomicBool::new(!cached),
            last_seen: RwLock::new(LastSeen::now()),
            callbacks: CallbackRegistry::new(),
            live: Mutex::new(None),
            pending_colors: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            destroyed: AtomicBool::new(false),
        };
        let device = Self {
            inner: Arc::new(inner),
        };
        device.apply(&status);

        if generation == Generation::Gen1 {
            for issue in device.coiot_issues() {
                tracing::error!(device = %device.id(), "{issue}. Updates will only arrive by polling");
            }
        }

        tracing::info!(
            device = %device.id(),
            model = %device.model(),
            generation = %generation,
            name = %device.name(),
            host = %device.host(),
            firmware = %device.firmware(),
            cached,
            components = device.inner.components.read().len(),
            "Shelly device created"
        );
        Ok(device)
    }

    fn start(&self) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(tasks::supervise_liveness(
            weak.clone(),
            self.inner.cancel.clone(),
            self.inner.options.liveness_interval,
        ));

        if self.generation().is_rpc() && self.inner.options.live_channel {
            tokio::spawn(tasks::pump_live_channel(
                weak,
                self.inner.cancel.clone(),
                self.inner.options.live_channel_delay,
                self.inner.options.live_channel_config(&self.inner.host),
            ));
        }
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Normalized device id.
    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.inner.id
    }

    /// Host the device was created with.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Model code.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.inner.identity.model
    }

    /// MAC address.
    #[must_use]
    pub fn mac(&self) -> &str {
        &self.inner.identity.mac
    }

    /// Firmware version.
    #[must_use]
    pub fn firmware(&self) -> &str {
        &self.inner.identity.firmware
    }

    /// Hardware generation.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.inner.identity.generation
    }

    /// Whether authentication is enabled on the device.
    #[must_use]
    pub fn auth_required(&self) -> bool {
        self.inner.identity.auth
    }

    /// Dual-mode profile.
    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.inner.identity.profile.as_ref()
    }

    /// Whether a firmware update is available.
    #[must_use]
    pub fn has_update(&self) -> bool {
        self.inner.has_update.load(Ordering::Relaxed)
    }

    /// Whether the device was built from cached payloads.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.inner.cached
    }

    /// Whether an update arrived since construction (always true for live
    /// devices, false for cached ones until they answer).
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Time of the last update.
    #[must_use]
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.inner.last_seen.read().at
    }

    /// Payloads the device was built from.
    #[must_use]
    pub fn payloads(&self) -> &DevicePayloads {
        &self.inner.payloads
    }

    /// State of the live channel, if one was opened.
    #[must_use]
    pub fn live_channel_state(&self) -> Option<ChannelState> {
        self.inner.live.lock().as_ref().map(LiveChannel::state)
    }

    /// Whether [`destroy`](Self::destroy) was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    /// Checks that every identity attribute is present and the device has
    /// at least one component.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::InvalidConfiguration`] naming the first gap.
    pub fn validate(&self) -> std::result::Result<(), DeviceError> {
        let fields = [
            ("name", self.name()),
            ("id", self.id().as_str()),
            ("host", self.host()),
            ("mac", self.mac()),
            ("model", self.model()),
            ("firmware", self.firmware()),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
            return Err(DeviceError::InvalidConfiguration(format!("missing {field}")));
        }
        if self.inner.components.read().is_empty() {
            return Err(DeviceError::InvalidConfiguration("no components".into()));
        }
        Ok(())
    }

    /// Problems with the Gen1 CoIoT peer configuration.
    #[must_use]
    pub fn coiot_issues(&self) -> Vec<CoiotIssue> {
        let components = self.inner.components.read();
        coiot::check(components.get("coiot"), self.inner.options.coiot_peer.as_deref())
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Snapshot of one component.
    #[must_use]
    pub fn component(&self, id: &str) -> Option<Component> {
        self.inner.components.read().get(id).cloned()
    }

    /// Snapshot of all components in id order.
    #[must_use]
    pub fn components(&self) -> Vec<Component> {
        self.inner.components.read().values().cloned().collect()
    }

    /// Component ids in order.
    #[must_use]
    pub fn component_ids(&self) -> Vec<String> {
        self.inner.components.read().keys().cloned().collect()
    }

    /// Reads one property.
    #[must_use]
    pub fn get_value(&self, component_id: &str, key: &str) -> Option<Value> {
        self.inner
            .components
            .read()
            .get(component_id)
            .and_then(|c| c.get_value(key).cloned())
    }

    /// Validates and stores one property, notifying subscribers on change.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::ComponentNotFound`] or the validation error.
    /// A rejected value leaves the component unchanged and notifies nobody.
    pub fn set_value(&self, component_id: &str, key: &str, value: Value) -> Result<bool> {
        let changed = {
            let mut components = self.inner.components.write();
            let component = components
                .get_mut(component_id)
                .ok_or_else(|| DeviceError::ComponentNotFound(component_id.to_string()))?;
            component.set_value(key, value.clone()).inspect_err(|e| {
                tracing::warn!(device = %self.id(), component = component_id, error = %e, "Rejected property write");
            })?
        };
        if changed {
            self.inner
                .callbacks
                .dispatch_update(&PropertyUpdate::new(component_id, key, value));
        }
        Ok(changed)
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Applies a status payload or push and refreshes the liveness
    /// timestamp. Returns the effective changes, which were also dispatched
    /// to subscribers.
    pub fn update(&self, payload: &Value) -> Vec<PropertyUpdate> {
        if self.is_destroyed() {
            tracing::debug!(device = %self.id(), "Ignoring update for destroyed device");
            return Vec::new();
        }
        let changes = self.apply(payload);
        self.touch();
        changes
    }

    /// Polls the status and applies it.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the device state is left as is.
    pub async fn fetch_update(&self) -> Result<Vec<PropertyUpdate>> {
        self.ensure_alive()?;
        let method = if self.generation().is_rpc() {
            "Shelly.GetStatus"
        } else {
            "status"
        };
        let status = self
            .inner
            .transport
            .call(method, &Params::new(), self.generation())
            .await
            .inspect_err(|e| {
                tracing::error!(device = %self.id(), host = %self.host(), error = %e, "Error fetching device status");
            })?;
        Ok(self.update(&status))
    }

    fn apply(&self, payload: &Value) -> Vec<PropertyUpdate> {
        let generation = self.generation();
        let records = payload::status_records(generation, payload);
        let changes: Vec<PropertyUpdate> = {
            let mut components = self.inner.components.write();
            records
                .iter()
                .filter_map(|record| {
                    components
                        .get_mut(&record.id)
                        .map(|component| component.merge(&record.data))
                })
                .flatten()
                .collect()
        };
        if let Some(flag) = payload::has_update(generation, payload) {
            self.inner.has_update.store(flag, Ordering::Relaxed);
        }
        for change in &changes {
            self.inner.callbacks.dispatch_update(change);
        }
        changes
    }

    fn touch(&self) {
        *self.inner.last_seen.write() = LastSeen::now();
        if !self.inner.online.swap(true, Ordering::SeqCst) {
            tracing::info!(device = %self.id(), "Device is online");
            self.inner.callbacks.dispatch_liveness(true);
        }
    }

    fn handle_live_update(&self, update: LiveUpdate) {
        match update {
            LiveUpdate::Status(params) => {
                self.update(&Value::Object(params));
            }
            LiveUpdate::Events(events) => {
                if self.is_destroyed() {
                    return;
                }
                for event in events {
                    tracing::debug!(device = %self.id(), component = %event.component, event = %event.event, "Device event");
                    self.inner.callbacks.dispatch_event(&ComponentEvent {
                        component: event.component,
                        event: event.event,
                    });
                }
                self.touch();
            }
        }
    }

    async fn check_liveness(&self) {
        let seen = *self.inner.last_seen.read();
        let age = seen.instant.elapsed();
        if age > self.inner.options.repoll_after {
            tracing::debug!(device = %self.id(), "Re-polling quiet device");
            // failures are logged by fetch_update
            let _ = self.fetch_update().await;
        }
        if age > self.inner.options.stale_after {
            tracing::warn!(
                device = %self.id(),
                host = %self.host(),
                last_seen = %seen.at,
                minutes = age.as_secs() / 60,
                "Device has not been seen recently. Check the device connection"
            );
        } else {
            tracing::info!(device = %self.id(), host = %self.host(), last_seen = %seen.at, "Device last seen");
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Sends a command to one component.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::ComponentNotFound`],
    /// [`DeviceError::UnsupportedCommand`], [`DeviceError::Destroyed`] or
    /// the transport error.
    pub async fn execute(&self, component_id: &str, command: Command) -> Result<()> {
        self.ensure_alive()?;
        let request = {
            let components = self.inner.components.read();
            let component = components
                .get(component_id)
                .ok_or_else(|| DeviceError::ComponentNotFound(component_id.to_string()))?;
            command.to_request(component, self.generation())?
        };
        tracing::debug!(
            device = %self.id(),
            component = component_id,
            %command,
            method = %request.method,
            "Sending command"
        );
        self.send(&request).await
    }

    async fn send(&self, request: &NativeRequest) -> Result<()> {
        let generation = self.generation();
        if generation.is_rpc() {
            let sent = {
                let live = self.inner.live.lock();
                live.as_ref()
                    .filter(|channel| channel.state() == ChannelState::Ready)
                    .map(|channel| channel.send_request(&request.method, &request.params))
            };
            match sent {
                Some(Ok(())) => return Ok(()),
                Some(Err(e)) => {
                    tracing::warn!(device = %self.id(), error = %e, "Live channel send failed, using HTTP");
                }
                None => {}
            }
        }
        self.inner
            .transport
            .call(&request.method, &request.params, generation)
            .await?;
        Ok(())
    }

    /// Switches a component on.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn on(&self, component_id: &str) -> Result<()> {
        self.execute(component_id, Command::On).await
    }

    /// Switches a component off.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn off(&self, component_id: &str) -> Result<()> {
        self.execute(component_id, Command::Off).await
    }

    /// Toggles a component.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn toggle(&self, component_id: &str) -> Result<()> {
        self.execute(component_id, Command::Toggle).await
    }

    /// Sets brightness in percent.
    ///
    /// # Errors
    ///
    /// Returns a value error above 100, otherwise see
    /// [`execute`](Self::execute).
    pub async fn set_level(&self, component_id: &str, level: u8) -> Result<()> {
        let level = Percent::new(level)?;
        self.execute(component_id, Command::SetBrightness(level)).await
    }

    /// Sets the color immediately.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn set_color_rgb(&self, component_id: &str, red: u8, green: u8, blue: u8) -> Result<()> {
        self.execute(component_id, Command::SetColor(RgbColor::new(red, green, blue)))
            .await
    }

    /// Opens a cover.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn open(&self, component_id: &str) -> Result<()> {
        self.execute(component_id, Command::Open).await
    }

    /// Closes a cover.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn close(&self, component_id: &str) -> Result<()> {
        self.execute(component_id, Command::Close).await
    }

    /// Stops a cover.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn stop(&self, component_id: &str) -> Result<()> {
        self.execute(component_id, Command::Stop).await
    }

    /// Moves a cover to a position in percent.
    ///
    /// # Errors
    ///
    /// Returns a value error above 100, otherwise see
    /// [`execute`](Self::execute).
    pub async fn go_to_position(&self, component_id: &str, position: u8) -> Result<()> {
        let position = Percent::new(position)?;
        self.execute(component_id, Command::GoToPosition(position))
            .await
    }

    /// Writes one color channel. Writes within the debounce window are
    /// coalesced into a single color command; channels not written are
    /// taken from the component's current color.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::ComponentNotFound`] or
    /// [`DeviceError::UnsupportedCommand`] right away. Send failures of the
    /// coalesced command are logged.
    pub fn set_color_channel(&self, component_id: &str, channel: ColorChannel, value: u8) -> Result<()> {
        self.ensure_alive()?;
        let current = {
            let components = self.inner.components.read();
            let component = components
                .get(component_id)
                .ok_or_else(|| DeviceError::ComponentNotFound(component_id.to_string()))?;
            if !component.capabilities().color {
                return Err(DeviceError::UnsupportedCommand {
                    component: component_id.to_string(),
                    command: COLOR_GROUP,
                }
                .into());
            }
            component.color().unwrap_or_default()
        };

        let pending = {
            let mut colors = self.inner.pending_colors.lock();
            let entry = colors.entry(component_id.to_string()).or_insert(current);
            *entry = entry.with_channel(channel, value);
            *entry
        };
        tracing::trace!(device = %self.id(), component = component_id, color = %pending, "Color write queued");

        let weak = Arc::downgrade(&self.inner);
        let id = component_id.to_string();
        self.inner
            .colors
            .schedule((id.clone(), COLOR_GROUP), async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let device = Device { inner };
                let Some(color) = device.inner.pending_colors.lock().remove(&id) else {
                    return;
                };
                if let Err(e) = device.execute(&id, Command::SetColor(color)).await {
                    tracing::warn!(device = %device.id(), component = %id, error = %e, "Color command failed");
                }
            });
        Ok(())
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stops the timers and the live channel and drops all subscriptions.
    /// Safe to call any number of times.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();
        if let Some(channel) = self.inner.live.lock().take() {
            channel.stop();
        }
        self.inner.colors.cancel_all();
        self.inner.pending_colors.lock().clear();
        self.inner.callbacks.clear();
        tracing::info!(device = %self.id(), host = %self.host(), "Device destroyed");
    }

    fn ensure_alive(&self) -> std::result::Result<(), DeviceError> {
        if self.is_destroyed() {
            Err(DeviceError::Destroyed)
        } else {
            Ok(())
        }
    }
}

impl<T: Transport> Subscribable for Device<T> {
    fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyUpdate) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_update(callback)
    }

    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ComponentEvent) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_event(callback)
    }

    fn on_liveness<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_liveness(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::{Error, ProtocolError};

    type CallLog = Arc<Mutex<Vec<(String, Params)>>>;

    #[derive(Clone, Default)]
    struct MockTransport {
        identity: Option<Value>,
        responses: HashMap<String, Value>,
        calls: CallLog,
    }

    impl MockTransport {
        fn new(identity: Value) -> Self {
            Self {
                identity: Some(identity),
                ..Self::default()
            }
        }

        fn respond(mut self, method: &str, value: Value) -> Self {
            self.responses.insert(method.to_string(), value);
            self
        }

        fn calls_to(&self, method: &str) -> Vec<Params> {
            self.calls
                .lock()
                .iter()
                .filter(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    impl Transport for MockTransport {
        async fn fetch_identity(&self) -> std::result::Result<Value, ProtocolError> {
            self.identity
                .clone()
                .ok_or_else(|| ProtocolError::InvalidAddress("connection refused".into()))
        }

        async fn call(
            &self,
            method: &str,
            params: &Params,
            _generation: Generation,
        ) -> std::result::Result<Value, ProtocolError> {
            self.calls.lock().push((method.to_string(), params.clone()));
            Ok(self.responses.get(method).cloned().unwrap_or_else(|| json!({})))
        }
    }

    fn quiet_options() -> DeviceOptions {
        DeviceOptions::default()
            .without_live_channel()
            .with_liveness_interval(Duration::from_secs(3600))
    }

    fn gen1_transport() -> MockTransport {
        MockTransport::new(json!({"type": "SHSW-25", "mac": "AABBCCDDEEFF", "auth": false, "fw": "20230913-112003/v1.14.0-gcb84623", "mode": "relay"}))
            .respond(
                "settings",
                json!({
                    "name": "Garage",
                    "device": {"hostname": "shellyswitch25-AABBCC"},
                    "relays": [{"name": "Door", "ison": false}, {"ison": false}],
                    "rollers": [{"state": "stop"}],
                    "coiot": {"enabled": true, "peer": "mcast"}
                }),
            )
            .respond(
                "status",
                json!({
                    "relays": [{"ison": true}, {"ison": false}],
                    "meters": [{"power": 12.5}],
                    "has_update": true
                }),
            )
    }

    fn gen2_transport() -> MockTransport {
        MockTransport::new(json!({"id": "shellyplusrgbwpm-A1B2C3", "model": "SNDC-0D4P10WW", "mac": "A1B2C3", "gen": 2, "fw_id": "20240430-105751/1.3.1-gd8534ee", "auth_en": false}))
            .respond(
                "Shelly.GetConfig",
                json!({
                    "sys": {"device": {"name": "Desk strip"}, "sntp": {"server": "time.google.com"}},
                    "rgb:0": {"id": 0, "name": null},
                    "switch:0": {"id": 0, "name": "Fan"}
                }),
            )
            .respond(
                "Shelly.GetStatus",
                json!({
                    "sys": {"available_updates": {"stable": {"version": "1.4.0"}}},
                    "rgb:0": {"id": 0, "output": false, "brightness": 50, "rgb": [10, 20, 30]},
                    "switch:0": {"id": 0, "output": false}
                }),
            )
    }

    #[tokio::test]
    async fn gen1_relays_become_switches() {
        let transport = gen1_transport();
        let device = Device::create_with("10.0.0.5", transport, quiet_options())
            .await
            .unwrap();

        assert_eq!(device.id().as_str(), "shellyswitch25-aabbcc");
        assert_eq!(device.name(), "Garage");
        assert_eq!(device.firmware(), "v1.14.0-gcb84623");
        assert!(device.has_update());
        assert!(device.is_online());
        assert!(!device.is_cached());

        let relay = device.component("relay:0").unwrap();
        assert_eq!(relay.state(), Some(true));
        assert!(relay.capabilities().switchable);
        // relay profile hides the roller
        assert!(device.component("roller:0").is_none());
        assert!(device.component("meter:0").is_some());
        assert!(device.validate().is_ok());
        device.destroy();
    }

    #[tokio::test]
    async fn gen1_settings_state_survives_empty_status() {
        let transport = MockTransport::new(json!({"type": "SHSW-1", "mac": "E8DB84AABBCC", "fw": "20230913-112003/v1.14.0-gcb84623"}))
            .respond("settings", json!({"device": {"hostname": "shelly1-AABBCC"}, "relays": [{"ison": true}]}))
            .respond("status", json!({}));
        let device = Device::create_with("10.0.0.7", transport, quiet_options())
            .await
            .unwrap();

        assert_eq!(device.component("relay:0").unwrap().state(), Some(true));
        assert_eq!(device.name(), "shelly1-aabbcc");
        // no coiot section at all
        assert_eq!(device.coiot_issues(), vec![CoiotIssue::Missing]);
        device.destroy();
    }

    #[tokio::test]
    async fn gen2_creation_reads_name_and_updates() {
        let device = Device::create_with("10.0.0.6", gen2_transport(), quiet_options())
            .await
            .unwrap();

        assert_eq!(device.generation(), Generation::Gen2);
        assert_eq!(device.name(), "Desk strip");
        assert!(device.has_update());
        assert_eq!(
            device.component("rgb:0").unwrap().color(),
            Some(RgbColor::new(10, 20, 30))
        );
        assert!(device.component("sntp").is_some());
        device.destroy();
    }

    #[tokio::test]
    async fn push_notifies_once_per_change() {
        let device = Device::create_with("10.0.0.6", gen2_transport(), quiet_options())
            .await
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        device.on_update(move |update| sink.lock().push(update.clone()));

        let mut params = Params::new();
        params.insert("switch:0".into(), json!({"id": 0, "output": true}));
        device.handle_live_update(LiveUpdate::Status(params.clone()));
        device.handle_live_update(LiveUpdate::Status(params));

        let seen = seen.lock();
        let states: Vec<_> = seen.iter().filter(|u| u.property == "state").collect();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].component, "switch:0");
        assert_eq!(states[0].value, json!(true));
        device.destroy();
    }

    #[tokio::test]
    async fn live_events_reach_subscribers() {
        let device = Device::create_with("10.0.0.6", gen2_transport(), quiet_options())
            .await
            .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        device.on_event(move |event| {
            assert_eq!(event.event, "single_push");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        device.handle_live_update(LiveUpdate::Events(vec![crate::protocol::LiveEvent {
            component: "input:0".into(),
            event: "single_push".into(),
            ts: None,
        }]));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        device.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn color_channel_writes_are_coalesced() {
        let transport = gen2_transport();
        let device = Device::create_with("10.0.0.6", transport.clone(), quiet_options())
            .await
            .unwrap();

        device.set_color_channel("rgb:0", ColorChannel::Red, 255).unwrap();
        device.set_color_channel("rgb:0", ColorChannel::Green, 128).unwrap();
        device.set_color_channel("rgb:0", ColorChannel::Blue, 0).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        let sets = transport.calls_to("RGB.Set");
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0]["rgb"], json!([255, 128, 0]));
        assert_eq!(sets[0]["id"], json!(0));
        device.destroy();
    }

    #[tokio::test]
    async fn commands_do_not_touch_state() {
        let transport = gen2_transport();
        let device = Device::create_with("10.0.0.6", transport.clone(), quiet_options())
            .await
            .unwrap();

        device.on("switch:0").await.unwrap();
        let sets = transport.calls_to("Switch.Set");
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0]["on"], json!(true));
        assert_eq!(device.component("switch:0").unwrap().state(), Some(false));
        device.destroy();
    }

    #[tokio::test]
    async fn invalid_writes_and_commands_are_rejected() {
        let device = Device::create_with("10.0.0.6", gen2_transport(), quiet_options())
            .await
            .unwrap();

        assert!(device.set_value("rgb:0", "brightness", json!(150)).is_err());
        assert_eq!(
            device.get_value("rgb:0", "brightness"),
            Some(json!(50))
        );
        assert!(matches!(
            device.open("switch:0").await,
            Err(Error::Device(DeviceError::UnsupportedCommand { .. }))
        ));
        assert!(matches!(
            device.on("switch:9").await,
            Err(Error::Device(DeviceError::ComponentNotFound(_)))
        ));
        assert!(matches!(
            device.set_level("rgb:0", 101).await,
            Err(Error::Value(_))
        ));
        device.destroy();
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_final() {
        let device = Device::create_with("10.0.0.6", gen2_transport(), quiet_options())
            .await
            .unwrap();
        device.on_update(|_| {});
        device.destroy();
        device.destroy();

        assert!(device.is_destroyed());
        assert!(device.update(&json!({"switch:0": {"output": true}})).is_empty());
        assert!(matches!(
            device.toggle("switch:0").await,
            Err(Error::Device(DeviceError::Destroyed))
        ));
    }

    #[tokio::test]
    async fn unreachable_identity_is_reported() {
        let transport = MockTransport::default();
        let err = Device::create_with("10.0.0.9", transport, quiet_options())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Device(DeviceError::Unreachable { ref host, .. }) if host == "10.0.0.9"
        ));
    }

    #[tokio::test]
    async fn cached_device_starts_offline() {
        let transport = gen2_transport();
        let payloads = Device::fetch_payloads("10.0.0.6", &transport).await.unwrap();
        let device = Device::from_payloads("10.0.0.6", transport, quiet_options(), payloads).unwrap();
        assert!(device.is_cached());
        assert!(!device.is_online());

        let online = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&online);
        device.on_liveness(move |state| flag.store(state, Ordering::SeqCst));
        device.update(&json!({"switch:0": {"output": true}}));
        assert!(device.is_online());
        assert!(online.load(Ordering::SeqCst));
        device.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_device_is_polled_again() {
        let transport = gen2_transport();
        let options = DeviceOptions::default()
            .without_live_channel()
            .with_liveness_interval(Duration::from_secs(60));
        let device = Device::create_with("10.0.0.6", transport.clone(), options)
            .await
            .unwrap();
        assert_eq!(transport.calls_to("Shelly.GetStatus").len(), 1);

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(transport.calls_to("Shelly.GetStatus").len() >= 2);
        device.destroy();
    }
}

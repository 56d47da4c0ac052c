// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast bus for [`ShellyEvent`]s.

use tokio::sync::broadcast;

use super::ShellyEvent;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out channel for manager events.
///
/// Receivers that fall more than the capacity behind get
/// `RecvError::Lagged` and skip the oldest events. Publishing never blocks
/// and never fails when nobody listens.
///
/// # Examples
///
/// ```
/// use shelly_lib::event::{DeviceId, EventBus, ShellyEvent};
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ShellyEvent::added(DeviceId::new("ShellyPlus1-A8032AB12345")));
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.device_id().as_str(), "shellyplus1-a8032ab12345");
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ShellyEvent>,
}

impl EventBus {
    /// Creates a bus with capacity 256.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, as `tokio::sync::broadcast` does.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShellyEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event, returning how many receivers got it.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelly_lib::event::{DeviceId, EventBus, ShellyEvent};
    ///
    /// let bus = EventBus::new();
    /// let id = DeviceId::new("shelly1-aabbcc");
    /// assert_eq!(bus.publish(ShellyEvent::removed(id.clone())), 0);
    ///
    /// let _rx = bus.subscribe();
    /// assert_eq!(bus.publish(ShellyEvent::removed(id)), 1);
    /// ```
    pub fn publish(&self, event: ShellyEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceId;

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(ShellyEvent::added(DeviceId::new("a"))), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let _rx2 = bus.clone().subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn every_subscriber_receives() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let id = DeviceId::new("shelly1-abc");
        assert_eq!(bus.publish(ShellyEvent::removed(id.clone())), 2);

        assert_eq!(rx1.recv().await.unwrap().device_id(), &id);
        assert_eq!(rx2.recv().await.unwrap().device_id(), &id);
    }

    #[tokio::test]
    async fn slow_subscriber_lags() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for n in 0..4 {
            bus.publish(ShellyEvent::added(DeviceId::new(&format!("d{n}"))));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().device_id().as_str(), "d2");
    }
}

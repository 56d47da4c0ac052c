// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background tasks owned by a device.
//!
//! Both tasks hold a weak reference to the device and a clone of its
//! cancellation token, so dropping or destroying the device ends them.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{Device, Inner};
use crate::protocol::{LiveChannel, LiveChannelConfig, Transport};

/// Periodic liveness check.
pub(super) async fn supervise_liveness<T: Transport>(
    device: Weak<Inner<T>>,
    cancel: CancellationToken,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = device.upgrade() else {
            break;
        };
        Device { inner }.check_liveness().await;
    }
    tracing::trace!("Liveness task exiting");
}

/// Opens the live channel after `delay` and pumps its updates into the
/// device until the channel closes. The channel is not reopened; the
/// liveness re-poll covers the gap.
pub(super) async fn pump_live_channel<T: Transport>(
    device: Weak<Inner<T>>,
    cancel: CancellationToken,
    delay: Duration,
    config: LiveChannelConfig,
) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(delay) => {}
    }

    let (updates, mut receiver) = mpsc::unbounded_channel();
    {
        let Some(inner) = device.upgrade() else {
            return;
        };
        let channel = LiveChannel::start(config, updates);
        let mut slot = inner.live.lock();
        if inner.is_destroyed() {
            channel.stop();
            return;
        }
        *slot = Some(channel);
    }

    loop {
        let update = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            update = receiver.recv() => update,
        };
        let Some(inner) = device.upgrade() else {
            break;
        };
        let device = Device { inner };
        match update {
            Some(update) => device.handle_live_update(update),
            None => {
                tracing::warn!(
                    device = %device.id(),
                    host = %device.host(),
                    "Live channel closed, relying on polling"
                );
                break;
            }
        }
    }
}

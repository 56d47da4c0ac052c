// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keyed trailing-edge debouncing.
//!
//! Each key has at most one pending task. Scheduling again for the same key
//! aborts the pending task and restarts the delay, so only the last action
//! of a burst runs.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

struct Pending {
    token: u64,
    handle: JoinHandle<()>,
}

struct Slots<K> {
    next_token: u64,
    pending: HashMap<K, Pending>,
}

/// Runs the last action scheduled for a key after a quiet period.
pub struct Debouncer<K> {
    delay: Duration,
    slots: Arc<Mutex<Slots<K>>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Creates a debouncer with the given quiet period.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Arc::new(Mutex::new(Slots {
                next_token: 0,
                pending: HashMap::new(),
            })),
        }
    }

    /// Quiet period.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` for `key`, replacing any pending action.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn schedule<F>(&self, key: K, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let slots = Arc::clone(&self.slots);
        let mut guard = self.slots.lock();
        guard.next_token += 1;
        let token = guard.next_token;

        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut guard = slots.lock();
                if guard.pending.get(&task_key).is_some_and(|p| p.token == token) {
                    guard.pending.remove(&task_key);
                }
            }
            action.await;
        });

        if let Some(previous) = guard.pending.insert(key, Pending { token, handle }) {
            previous.handle.abort();
        }
    }

    /// Aborts every pending action.
    pub fn cancel_all(&self) {
        let mut guard = self.slots.lock();
        for (_, pending) in guard.pending.drain() {
            pending.handle.abort();
        }
    }

    /// Number of keys with a pending action.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots.lock().pending.len()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, pending) in self.slots.lock().pending.drain() {
            pending.handle.abort();
        }
    }
}

impl<K> std::fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.slots.lock().pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_runs_only_last_action() {
        let debouncer = Debouncer::new(Duration::from_millis(500));
        let last = Arc::new(AtomicU32::new(0));
        let runs = Arc::new(AtomicU32::new(0));

        for value in 1..=3 {
            let last = Arc::clone(&last);
            let runs = Arc::clone(&runs);
            debouncer.schedule("color", async move {
                last.store(value, Ordering::SeqCst);
                runs.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(debouncer.pending(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(last.load(Ordering::SeqCst), 3);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let runs = Arc::new(AtomicU32::new(0));
        for key in ["light:0", "light:1"] {
            let runs = Arc::clone(&runs);
            debouncer.schedule(key, async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_drops_pending() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        debouncer.schedule(1u8, async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel_all();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(debouncer.pending(), 0);
    }
}

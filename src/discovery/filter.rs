// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! White and black list filtering.

use crate::event::DeviceId;

fn normalized<I>(items: I) -> Vec<DeviceId>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| DeviceId::new(item.as_ref()))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Decides which discovered ids become devices.
///
/// An empty whitelist admits everything. The blacklist always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    whitelist: Vec<DeviceId>,
    blacklist: Vec<DeviceId>,
}

impl DeviceFilter {
    /// Creates a filter from raw ids; entries are normalized.
    #[must_use]
    pub fn new<W, B>(whitelist: W, blacklist: B) -> Self
    where
        W: IntoIterator,
        W::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            whitelist: normalized(whitelist),
            blacklist: normalized(blacklist),
        }
    }

    /// Whether `id` may be turned into a device. Rejections are logged.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelly_lib::discovery::DeviceFilter;
    /// use shelly_lib::event::DeviceId;
    ///
    /// let filter = DeviceFilter::new(Vec::<String>::new(), ["Shelly1-AABBCC"]);
    /// assert!(!filter.allows(&DeviceId::new("shelly1-aabbcc")));
    /// assert!(filter.allows(&DeviceId::new("shellyplus1-ddeeff")));
    /// ```
    #[must_use]
    pub fn allows(&self, id: &DeviceId) -> bool {
        if !self.whitelist.is_empty() && !self.whitelist.contains(id) {
            tracing::warn!(device = %id, "Skipping device because not in whitelist");
            return false;
        }
        if self.blacklist.contains(id) {
            tracing::warn!(device = %id, "Skipping device because in blacklist");
            return false;
        }
        true
    }
}

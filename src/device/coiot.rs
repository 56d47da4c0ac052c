// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gen1 CoIoT peer configuration check.
//!
//! Gen1 devices push updates over CoIoT only to the configured peer. A
//! misconfigured peer does not prevent the device from working, it only
//! means updates arrive by polling, so problems are reported and logged
//! but never fail construction.

use std::fmt;

use serde_json::Value;

use crate::component::Component;

/// Peer value that makes the device multicast its updates.
pub const MULTICAST_PEER: &str = "mcast";

/// Why a Gen1 device will not push CoIoT updates to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoiotIssue {
    /// Settings have no `coiot` section.
    Missing,
    /// CoIoT is disabled.
    Disabled,
    /// No peer is configured.
    NoPeer,
    /// The peer is neither multicast nor the expected address.
    WrongPeer {
        /// Configured peer.
        peer: String,
        /// Peer we expected, if one is configured.
        expected: Option<String>,
    },
}

impl fmt::Display for CoiotIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("CoIoT service not found"),
            Self::Disabled => f.write_str("CoIoT is not enabled"),
            Self::NoPeer => f.write_str("CoIoT peer is not set"),
            Self::WrongPeer { peer, expected: Some(expected) } => {
                write!(f, "CoIoT peer {peer} is not {MULTICAST_PEER} or {expected}")
            }
            Self::WrongPeer { peer, expected: None } => {
                write!(f, "CoIoT peer {peer} is not {MULTICAST_PEER}")
            }
        }
    }
}

/// Checks the `coiot` component against the expected peer.
///
/// Returns every problem found, in the order they would be fixed.
#[must_use]
pub fn check(coiot: Option<&Component>, expected_peer: Option<&str>) -> Vec<CoiotIssue> {
    let Some(coiot) = coiot else {
        return vec![CoiotIssue::Missing];
    };

    let mut issues = Vec::new();
    if coiot.get_value("enabled").and_then(Value::as_bool) != Some(true) {
        issues.push(CoiotIssue::Disabled);
    }
    match coiot.get_value("peer").and_then(Value::as_str).filter(|p| !p.is_empty()) {
        None => issues.push(CoiotIssue::NoPeer),
        Some(peer) if peer == MULTICAST_PEER || Some(peer) == expected_peer => {}
        Some(peer) => issues.push(CoiotIssue::WrongPeer {
            peer: peer.to_string(),
            expected: expected_peer.map(str::to_string),
        }),
    }
    issues
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn coiot(enabled: bool, peer: &str) -> Component {
        let mut component = Component::from_id("coiot");
        component.set_value("enabled", json!(enabled)).unwrap();
        component.set_value("peer", json!(peer)).unwrap();
        component
    }

    #[test]
    fn missing_section() {
        assert_eq!(check(None, None), vec![CoiotIssue::Missing]);
    }

    #[test]
    fn multicast_is_always_fine() {
        assert!(check(Some(&coiot(true, "mcast")), Some("10.0.0.2:5683")).is_empty());
    }

    #[test]
    fn expected_peer_is_fine() {
        assert!(check(Some(&coiot(true, "10.0.0.2:5683")), Some("10.0.0.2:5683")).is_empty());
    }

    #[test]
    fn disabled_and_empty_peer() {
        assert_eq!(
            check(Some(&coiot(false, "")), None),
            vec![CoiotIssue::Disabled, CoiotIssue::NoPeer]
        );
    }

    #[test]
    fn wrong_peer() {
        let issues = check(Some(&coiot(true, "10.0.0.9:5683")), Some("10.0.0.2:5683"));
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].to_string(),
            "CoIoT peer 10.0.0.9:5683 is not mcast or 10.0.0.2:5683"
        );
    }
}

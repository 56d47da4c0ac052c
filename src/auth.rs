// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Challenge parsing and credential computation.
//!
//! Shelly devices use two schemes:
//!
//! - **Basic** on Gen1 firmware, `Authorization: Basic base64(user:pass)`.
//! - A **SHA-256 digest variant** on Gen2/Gen3 firmware. The hash chain
//!   always uses the literal user `admin` in HA1 and the fixed
//!   `dummy_method:dummy_uri` pair in HA2, so generic digest
//!   implementations produce responses the device rejects.
//!
//! The digest result is either embedded in the RPC body as an `auth` object
//! or rendered as an `Authorization: Digest ...` header for REST calls.
//!
//! # Examples
//!
//! ```
//! use shelly_lib::auth::{self, AuthScheme};
//!
//! let params = auth::parse_challenge(
//!     r#"Digest qop="auth", realm="shellyplus1-a8032ab1b2c4", nonce="1716556501", algorithm=SHA-256"#,
//!     AuthScheme::Digest,
//! ).unwrap();
//! assert_eq!(params["realm"], "shellyplus1-a8032ab1b2c4");
//!
//! let digest = auth::compute_digest_response(
//!     "admin", "secret", 1_716_556_501, 42, &params["realm"], 1,
//! );
//! assert_eq!(digest.response.len(), 64);
//! ```

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ProtocolError;

/// User name the firmware hashes into HA1, whatever the caller sends.
pub const DIGEST_USERNAME: &str = "admin";

/// Algorithm label sent alongside every digest response.
pub const DIGEST_ALGORITHM: &str = "SHA-256";

/// Fixed HA2 input used by the firmware verifier.
const DIGEST_HA2_INPUT: &str = "dummy_method:dummy_uri";

/// Upper bound (exclusive) of generated client nonces.
const CNONCE_BOUND: u64 = 1_000_000_000;

/// Authentication scheme announced in a `www-authenticate` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Basic realm="..."`.
    Basic,
    /// `Digest realm="...", nonce="..."`.
    Digest,
}

impl AuthScheme {
    /// Header prefix for this scheme.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Digest => "Digest",
        }
    }

    /// Detects the scheme of a challenge header, case-insensitively.
    #[must_use]
    pub fn detect(header: &str) -> Option<Self> {
        [Self::Digest, Self::Basic]
            .into_iter()
            .find(|scheme| strip_scheme(header.trim(), *scheme).is_some())
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Digest credentials computed for one request or handshake.
///
/// Serializes to the `auth` object expected inside Gen2/Gen3 RPC frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestAuth {
    /// Realm from the challenge (the device id).
    pub realm: String,
    /// User name sent back to the device.
    pub username: String,
    /// Server nonce.
    pub nonce: u64,
    /// Client nonce.
    pub cnonce: u64,
    /// Hex-encoded SHA-256 response.
    pub response: String,
    /// Always `SHA-256`.
    pub algorithm: &'static str,
    /// Nonce counter that went into the hash.
    #[serde(skip)]
    pub nc: u32,
}

impl DigestAuth {
    /// Renders the value of a REST `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self, uri: &str) -> String {
        format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{uri}\", \
             algorithm={}, response=\"{}\", qop=auth, nc={:08x}, cnonce=\"{}\"",
            self.username, self.realm, self.nonce, self.algorithm, self.response, self.nc, self.cnonce
        )
    }
}

/// Parses a `Basic`/`Digest` challenge into its key/value parameters.
///
/// Values may be quoted; quoted values can contain commas and `=`.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedHeader`] when the scheme prefix is
/// absent, a parameter has no `=`, or a Digest challenge lacks `realm` or
/// `nonce`.
pub fn parse_challenge(
    header: &str,
    scheme: AuthScheme,
) -> Result<HashMap<String, String>, ProtocolError> {
    let rest = strip_scheme(header.trim(), scheme).ok_or_else(|| {
        ProtocolError::MalformedHeader(format!("expected {scheme} challenge, got {header:?}"))
    })?;

    let mut params = HashMap::new();
    for part in split_params(rest) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').ok_or_else(|| {
            ProtocolError::MalformedHeader(format!("parameter without value: {part:?}"))
        })?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        params.insert(key.trim().to_ascii_lowercase(), value.to_string());
    }

    if scheme == AuthScheme::Digest {
        for required in ["realm", "nonce"] {
            if !params.contains_key(required) {
                return Err(ProtocolError::MalformedHeader(format!(
                    "digest challenge without {required}"
                )));
            }
        }
    }

    Ok(params)
}

/// Returns `base64(username:password)`.
#[must_use]
pub fn compute_basic_credential(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

/// Computes the vendor digest response.
///
/// `HA1 = H("admin:" realm ":" password)`, `HA2 = H("dummy_method:dummy_uri")`,
/// `response = H(HA1 ":" nonce ":" nc ":" cnonce ":auth:" HA2)`.
///
/// Pure: the client nonce comes from the caller (see [`random_cnonce`]).
#[must_use]
pub fn compute_digest_response(
    username: &str,
    password: &str,
    nonce: u64,
    cnonce: u64,
    realm: &str,
    nc: u32,
) -> DigestAuth {
    let ha1 = sha256_hex(&format!("{DIGEST_USERNAME}:{realm}:{password}"));
    let ha2 = sha256_hex(DIGEST_HA2_INPUT);
    let response = sha256_hex(&format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}"));

    DigestAuth {
        realm: realm.to_string(),
        username: username.to_string(),
        nonce,
        cnonce,
        response,
        algorithm: DIGEST_ALGORITHM,
        nc,
    }
}

/// Computes a digest straight from parsed challenge parameters.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedHeader`] if `realm` is missing or
/// `nonce`/`nc` are not decimal numbers.
pub fn digest_from_challenge(
    params: &HashMap<String, String>,
    password: &str,
    cnonce: u64,
) -> Result<DigestAuth, ProtocolError> {
    let realm = params
        .get("realm")
        .ok_or_else(|| ProtocolError::MalformedHeader("digest challenge without realm".into()))?;
    let nonce = params
        .get("nonce")
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| ProtocolError::MalformedHeader("digest nonce is not numeric".into()))?;
    let nc = match params.get("nc") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ProtocolError::MalformedHeader(format!("invalid nc {raw:?}")))?,
        None => 1,
    };

    Ok(compute_digest_response(
        DIGEST_USERNAME,
        password,
        nonce,
        cnonce,
        realm,
        nc,
    ))
}

/// Draws a fresh client nonce.
#[must_use]
pub fn random_cnonce() -> u64 {
    rand::thread_rng().gen_range(0..CNONCE_BOUND)
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

fn strip_scheme(header: &str, scheme: AuthScheme) -> Option<&str> {
    let prefix = scheme.prefix();
    let head = header.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &header[prefix.len()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Splits on commas that are not inside double quotes.
fn split_params(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in input.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&input[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

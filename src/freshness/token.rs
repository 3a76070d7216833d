// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::verify::rfc3339;
use crate::Error;

/// Minimum number of random bytes in a token value
pub const MIN_VALUE_LEN: usize = 8;

/// A single-use, time-bounded freshness value (nonce) handed to the enclave
/// and later checked against the one embedded in its attestation document.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawToken")]
pub struct FreshnessToken {
    #[serde_as(as = "Base64")]
    value: Vec<u8>,
    #[serde(with = "rfc3339")]
    issued_at: SystemTime,
    #[serde(with = "rfc3339")]
    expires_at: SystemTime,
}

#[serde_as]
#[derive(Deserialize)]
struct RawToken {
    #[serde_as(as = "Base64")]
    value: Vec<u8>,
    #[serde(with = "rfc3339")]
    issued_at: SystemTime,
    #[serde(with = "rfc3339")]
    expires_at: SystemTime,
}

impl TryFrom<RawToken> for FreshnessToken {
    type Error = Error;

    fn try_from(r: RawToken) -> Result<Self, Self::Error> {
        FreshnessToken::new(r.value, r.issued_at, r.expires_at)
    }
}

impl FreshnessToken {
    /// Assemble a token from its parts, e.g. after retrieving it from the
    /// relying party's session state.
    pub fn new(
        value: Vec<u8>,
        issued_at: SystemTime,
        expires_at: SystemTime,
    ) -> Result<Self, Error> {
        if value.len() < MIN_VALUE_LEN {
            return Err(Error::InvalidToken(format!(
                "value is {} bytes, need at least {MIN_VALUE_LEN}",
                value.len()
            )));
        }

        if expires_at <= issued_at {
            return Err(Error::InvalidToken(
                "expiry must be later than issuance".to_string(),
            ));
        }

        Ok(Self {
            value,
            issued_at,
            expires_at,
        })
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// A token is valid through its expiry instant, not one tick after.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }
}

// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The verify module takes a decoded attestation document through chain
//! validation, signature verification, revocation checking and freshness
//! binding.  [`AttestationVerifier`] composes the stages; each one is also
//! usable on its own.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! use nitrotoken::freshness::FreshnessToken;
//! use nitrotoken::store::{MemoCrlStore, TrustAnchor};
//! use nitrotoken::verify::{AttestationVerifier, VerifierConfig};
//!
//! const doc: &str = include_str!("../../testdata/nitro-valid.b64");
//!
//! // the document was produced on 2022-04-28T23:58:40.249Z
//! let produced = UNIX_EPOCH + Duration::from_millis(1651190320249);
//!
//! // the token the relying party handed to the enclave
//! let token = FreshnessToken::new(
//!     vec![0x32, 0x28, 0xac, 0x46, 0xcd, 0xfc, 0x0c, 0xcc],
//!     produced - Duration::from_secs(1),
//!     produced + Duration::from_secs(60),
//! )
//! .expect("assembling token");
//!
//! let verifier = AttestationVerifier::new(
//!     TrustAnchor::aws_nitro_root_g1().expect("loading root"),
//!     MemoCrlStore::new(),
//!     VerifierConfig::default(),
//! )
//! .expect("creating verifier");
//!
//! let res = verifier
//!     .verify(doc, produced, &token, produced)
//!     .expect("verifying document");
//!
//! assert_eq!(res.payload.pcrs.len(), 16);
//!
//! // no CRLs were supplied: the soft-fail policy kicks in
//! assert!(!res.warnings.is_empty());
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

pub use self::chain::{validate_chain, ChainCert, ValidatedChain, Validity, MAX_CHAIN_LEN};
pub use self::config::{RevocationConfig, VerifierConfig};
pub use self::errors::{Stage, VerifyError, Warning};
pub use self::revocation::check_revocation;
pub use self::signature::verify_signature;
pub use self::verifier::{check_freshness_binding, AttestationVerifier, VerificationResult};

mod chain;
mod config;
mod errors;
mod revocation;
mod signature;
mod verifier;

/// RFC 3339 rendering of `t`, in UTC
pub fn display_time(t: &SystemTime) -> String {
    let (secs, nanos) = match t.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            let secs = -(d.as_secs() as i64);
            match d.subsec_nanos() {
                0 => (secs, 0),
                n => (secs - 1, 1_000_000_000 - n),
            }
        }
    };

    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        None => format!("{t:?}"),
    }
}

/// Parse an RFC 3339 timestamp
pub fn parse_time(s: &str) -> Result<SystemTime, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(SystemTime::from)
}

/// Seconds since the UNIX epoch (negative before it) to a SystemTime
pub(crate) fn from_unix(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

pub(crate) mod rfc3339 {
    use std::time::SystemTime;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &SystemTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::display_time(t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SystemTime, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_time(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_rendering() {
        let t = UNIX_EPOCH + Duration::from_millis(1651190320249);

        assert_eq!(display_time(&t), "2022-04-28T23:58:40.249Z");
        assert_eq!(parse_time("2022-04-28T23:58:40.249Z").unwrap(), t);
        assert_eq!(parse_time("2022-04-29T01:58:40.249+02:00").unwrap(), t);
    }

    #[test]
    fn time_before_epoch() {
        assert_eq!(display_time(&from_unix(-1)), "1969-12-31T23:59:59Z");
    }
}

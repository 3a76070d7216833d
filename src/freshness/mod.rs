// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Freshness tokens bind an attestation document to a single request.  The
//! relying party issues a [`FreshnessToken`] through a [`NonceAuthority`],
//! hands its value to the enclave, and later checks that the document carries
//! the same value before the token expires.

pub use self::authority::{NonceAuthority, DEFAULT_VALUE_LEN};
pub use self::entropy::{IEntropySource, OsEntropy};
pub use self::token::{FreshnessToken, MIN_VALUE_LEN};

mod authority;
mod entropy;
mod token;

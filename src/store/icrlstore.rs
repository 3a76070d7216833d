// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;

/// Interface to wherever certificate revocation lists are retrieved from.
pub trait ICrlStore {
    /// Fetch the DER-encoded CRL published at the given distribution point
    fn fetch(&self, url: &str) -> Result<Vec<u8>, Error>;
}

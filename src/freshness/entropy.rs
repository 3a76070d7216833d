// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::Error;

/// Interface to a cryptographically secure source of random bytes.
pub trait IEntropySource {
    /// Fill `buf` entirely with random bytes
    fn fill(&self, buf: &mut [u8]) -> Result<(), Error>;
}

/// Random bytes from OpenSSL's CSPRNG, seeded by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl IEntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), Error> {
        openssl::rand::rand_bytes(buf).map_err(|e| Error::EntropyUnavailable(e.to_string()))
    }
}

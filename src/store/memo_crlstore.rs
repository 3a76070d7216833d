// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::RwLock;

use super::errors::Error;
use super::ICrlStore;
use crate::evidence::base64;

/// CRLs held in memory, indexed by distribution point URL.  Useful for
/// offline verification and testing.
#[derive(Debug)]
pub struct MemoCrlStore {
    p: RwLock<HashMap<String, Vec<u8>>>,
}

impl Default for MemoCrlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoCrlStore {
    /// Returns a new empty CrlStore
    pub fn new() -> Self {
        Self {
            p: Default::default(),
        }
    }

    /// Stash the DER-encoded CRL for the given distribution point
    pub fn insert(&self, url: &str, der: Vec<u8>) -> Result<(), Error> {
        self.p
            .write()
            .map_err(|e| Error::Sema(e.to_string()))?
            .insert(url.to_string(), der);

        Ok(())
    }

    /// Add to an existing (and possibly empty) CrlStore the CRLs loaded from
    /// the given JSON object, mapping each URL to a base64-encoded DER CRL
    pub fn load_json(&self, j: &str) -> Result<(), Error> {
        let crls: HashMap<String, String> =
            serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        for (url, b64) in crls.iter() {
            let der = base64::decode_str(b64).map_err(|e| Error::Syntax(format!("{url}: {e}")))?;
            self.insert(url, der)?;
        }

        Ok(())
    }
}

impl ICrlStore for MemoCrlStore {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.p
            .read()
            .map_err(|e| Error::Sema(e.to_string()))?
            .get(url)
            .cloned()
            .ok_or_else(|| Error::NotFound(url.to_string()))
    }
}

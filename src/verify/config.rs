// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evidence::{Algorithm, DEFAULT_MAX_DOCUMENT_SIZE};
use crate::freshness::{DEFAULT_VALUE_LEN, MIN_VALUE_LEN};
use crate::store::{
    Error, HttpCrlStore, TrustAnchor, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CRL_SIZE,
};

/// Verifier settings.  Every field has a default, so `{}` is a valid
/// configuration.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Signing algorithms accepted in the protected header
    pub allowed_algorithms: Vec<Algorithm>,
    /// Largest accepted CBOR document, in bytes
    pub max_document_size: usize,
    /// Number of random bytes in issued freshness tokens
    pub token_value_len: usize,
    pub revocation: RevocationConfig,
    /// SHA-256 of the pinned root's DER encoding, hex-encoded
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub root_fingerprint: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevocationConfig {
    pub enabled: bool,
    /// Upper bound on a single CRL download
    pub timeout_ms: u64,
    pub max_crl_size: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            allowed_algorithms: vec![Algorithm::Es384],
            max_document_size: DEFAULT_MAX_DOCUMENT_SIZE,
            token_value_len: DEFAULT_VALUE_LEN,
            revocation: Default::default(),
            root_fingerprint: None,
        }
    }
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
            max_crl_size: DEFAULT_MAX_CRL_SIZE,
        }
    }
}

impl VerifierConfig {
    /// Load and validate a JSON-encoded configuration
    pub fn from_json(j: &str) -> Result<Self, Error> {
        let cfg: VerifierConfig = serde_json::from_str(j).map_err(|e| Error::Syntax(e.to_string()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.allowed_algorithms.is_empty() {
            return Err(Error::Sema("no allowed algorithms".to_string()));
        }

        // only named ECDSA algorithms can be verified
        if let Some(alg) = self
            .allowed_algorithms
            .iter()
            .find(|a| matches!(a, Algorithm::Other(_)))
        {
            return Err(Error::Sema(format!(
                "unsupported entry in allowed_algorithms: {alg} (use ES256, ES384 or ES512)"
            )));
        }

        if self.max_document_size == 0 {
            return Err(Error::Sema("max_document_size must be positive".to_string()));
        }

        if self.token_value_len < MIN_VALUE_LEN {
            return Err(Error::Sema(format!(
                "token_value_len must be at least {MIN_VALUE_LEN}"
            )));
        }

        if self.revocation.timeout_ms == 0 {
            return Err(Error::Sema("revocation timeout must be positive".to_string()));
        }

        if let Some(fp) = &self.root_fingerprint {
            if fp.len() != 32 {
                return Err(Error::Sema(format!(
                    "root_fingerprint: expecting 32 bytes, got {}",
                    fp.len()
                )));
            }
        }

        Ok(())
    }

    /// Make sure `root` is the one pinned by fingerprint, if any
    pub fn check_root(&self, root: &TrustAnchor) -> Result<(), Error> {
        match &self.root_fingerprint {
            Some(fp) => root.check_fingerprint(fp),
            None => Ok(()),
        }
    }

    /// An HTTP CRL store honouring the configured limits
    pub fn http_crl_store(&self) -> Result<HttpCrlStore, Error> {
        HttpCrlStore::with_limits(
            Duration::from_millis(self.revocation.timeout_ms),
            self.revocation.max_crl_size,
        )
    }
}

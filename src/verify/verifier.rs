// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::time::SystemTime;

use openssl::memcmp;
use serde::Serialize;
use tracing::{debug, warn};

use super::chain::validate_chain;
use super::config::VerifierConfig;
use super::errors::{Stage, VerifyError, Warning};
use super::revocation::check_revocation;
use super::rfc3339;
use super::signature::verify_signature;
use crate::evidence::{AttestationDocument, Evidence};
use crate::freshness::FreshnessToken;
use crate::store::{self, ICrlStore, TrustAnchor};
use crate::Error;

/// The outcome of a successful verification
#[derive(Debug, Serialize)]
pub struct VerificationResult {
    /// The verified payload
    pub payload: AttestationDocument,
    #[serde(with = "rfc3339")]
    pub verified_at: SystemTime,
    /// Non-fatal findings, e.g. CRLs that could not be consulted
    pub warnings: Vec<Warning>,
}

impl VerificationResult {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Verifies attestation documents against a pinned root, consulting CRLs
/// through `S`.
#[derive(Debug)]
pub struct AttestationVerifier<S: ICrlStore> {
    root: TrustAnchor,
    crl_store: S,
    config: VerifierConfig,
}

impl<S: ICrlStore> AttestationVerifier<S> {
    pub fn new(root: TrustAnchor, crl_store: S, config: VerifierConfig) -> Result<Self, store::Error> {
        config.validate()?;
        config.check_root(&root)?;

        Ok(Self {
            root,
            crl_store,
            config,
        })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify a base64-encoded attestation document.
    ///
    /// Certificate validity is evaluated at `reference_time`.  Token expiry
    /// and CRL currency are evaluated at `now`.
    pub fn verify(
        &self,
        text: &str,
        reference_time: SystemTime,
        token: &FreshnessToken,
        now: SystemTime,
    ) -> Result<VerificationResult, VerifyError> {
        let evidence = Evidence::decode_base64(text, self.config.max_document_size)
            .map_err(|e| VerifyError::new(Stage::Decode, e))?;

        self.verify_evidence(evidence, reference_time, token, now)
    }

    /// Like [`AttestationVerifier::verify`], for a CBOR-encoded document
    pub fn verify_bytes(
        &self,
        cbor: &[u8],
        reference_time: SystemTime,
        token: &FreshnessToken,
        now: SystemTime,
    ) -> Result<VerificationResult, VerifyError> {
        let evidence = Evidence::decode_with_limit(cbor, self.config.max_document_size)
            .map_err(|e| VerifyError::new(Stage::Decode, e))?;

        self.verify_evidence(evidence, reference_time, token, now)
    }

    /// Verify against the current system time
    pub fn verify_now(
        &self,
        text: &str,
        token: &FreshnessToken,
    ) -> Result<VerificationResult, VerifyError> {
        let now = SystemTime::now();

        self.verify(text, now, token, now)
    }

    fn verify_evidence(
        &self,
        evidence: Evidence,
        reference_time: SystemTime,
        token: &FreshnessToken,
        now: SystemTime,
    ) -> Result<VerificationResult, VerifyError> {
        let doc = &evidence.document;

        debug!(module_id = %doc.module_id, "validating certificate chain");

        let chain = validate_chain(&doc.certificate, &doc.cabundle, &self.root, reference_time)
            .map_err(|e| VerifyError::new(Stage::ValidateChain, e))?;

        debug!("verifying signature");

        let tbs = evidence
            .to_be_signed()
            .map_err(|e| VerifyError::new(Stage::VerifySignature, e))?;

        verify_signature(
            &tbs,
            &evidence.signature,
            &chain.leaf().x509,
            evidence.algorithm,
            &self.config.allowed_algorithms,
        )
        .map_err(|e| VerifyError::new(Stage::VerifySignature, e))?;

        let warnings = if self.config.revocation.enabled {
            debug!("checking revocation");

            check_revocation(&chain, &self.crl_store, now)
                .map_err(|e| VerifyError::new(Stage::CheckRevocation, e))?
        } else {
            let w = Warning::RevocationCheckIndeterminate {
                index: None,
                reason: "revocation checking is disabled".to_string(),
            };
            warn!("{w}");
            vec![w]
        };

        check_freshness_binding(doc.nonce.as_deref(), token, now)
            .map_err(|e| VerifyError::new(Stage::CheckFreshnessBinding, e))?;

        debug!(warnings = warnings.len(), "attestation document verified");

        Ok(VerificationResult {
            payload: evidence.document,
            verified_at: now,
            warnings,
        })
    }
}

/// The document must carry exactly the token's value, and the token must
/// not have expired at `now`.
pub fn check_freshness_binding(
    value: Option<&[u8]>,
    token: &FreshnessToken,
    now: SystemTime,
) -> Result<(), Error> {
    let expected = token.value();

    let matches = match value {
        Some(v) => v.len() == expected.len() && memcmp::eq(v, expected),
        None => false,
    };

    if !matches {
        return Err(Error::FreshnessMismatch {
            expected_len: expected.len(),
            actual_len: value.map(<[u8]>::len),
        });
    }

    if token.is_expired(now) {
        return Err(Error::FreshnessExpired {
            expires_at: token.expires_at(),
        });
    }

    Ok(())
}

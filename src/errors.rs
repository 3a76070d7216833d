// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use crate::verify::Validity;

/// Failure kinds produced while decoding and verifying an attestation
/// document, or while issuing a freshness token.
#[derive(thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed transport encoding: {0}")]
    MalformedEncoding(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Malformed certificate chain: {0}")]
    ChainMalformed(String),
    #[error("Untrusted root: {0}")]
    UntrustedRoot(String),
    #[error("Certificate {index} expired: validity {validity}")]
    CertificateExpired { index: usize, validity: Validity },
    #[error("Certificate {index} not yet valid: validity {validity}")]
    CertificateNotYetValid { index: usize, validity: Validity },
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),
    #[error("Certificate {index} was revoked (serial {serial})")]
    CertificateRevoked { index: usize, serial: String },
    #[error("Mismatched freshness value: {}", describe_mismatch(.expected_len, .actual_len))]
    FreshnessMismatch {
        /// length of the issued token value
        expected_len: usize,
        /// length of the value found in the document, `None` if absent
        actual_len: Option<usize>,
    },
    #[error("Expired freshness token: expired at {}", crate::verify::display_time(.expires_at))]
    FreshnessExpired { expires_at: std::time::SystemTime },
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

fn describe_mismatch(expected_len: &usize, actual_len: &Option<usize>) -> String {
    match *actual_len {
        None => format!("document carries no value, token has {expected_len} bytes"),
        Some(n) if n != *expected_len => {
            format!("document carries {n} bytes, token has {expected_len} bytes")
        }
        Some(_) => format!("values of {expected_len} bytes differ"),
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

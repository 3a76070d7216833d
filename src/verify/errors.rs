// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use crate::Error;

/// Verification pipeline stages, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Decode,
    ValidateChain,
    VerifySignature,
    CheckRevocation,
    CheckFreshnessBinding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Decode => "decode",
            Stage::ValidateChain => "validate-chain",
            Stage::VerifySignature => "verify-signature",
            Stage::CheckRevocation => "check-revocation",
            Stage::CheckFreshnessBinding => "check-freshness-binding",
        };
        write!(f, "{s}")
    }
}

/// A verification failure and the stage that produced it
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{stage}: {source}")]
pub struct VerifyError {
    pub stage: Stage,
    pub source: Error,
}

impl VerifyError {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }
}

/// Non-fatal findings reported alongside a successful verification
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Warning {
    /// The revocation status of a certificate could not be established.
    /// `index` is `None` when revocation checking is turned off altogether.
    RevocationCheckIndeterminate { index: Option<usize>, reason: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::RevocationCheckIndeterminate {
                index: Some(i),
                reason,
            } => write!(f, "revocation status of certificate {i} unknown: {reason}"),
            Warning::RevocationCheckIndeterminate {
                index: None,
                reason,
            } => write!(f, "revocation status unknown: {reason}"),
        }
    }
}

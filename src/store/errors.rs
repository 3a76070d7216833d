// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

/// Errors loading trust anchors, CRLs and verifier configuration
#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Input that does not parse (PEM, DER, JSON, base64)
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Well-formed input with unacceptable content
    #[error("semantic error: {0}")]
    Sema(String),
    /// No CRL is known for the given URL
    #[error("no CRL for {0}")]
    NotFound(String),
    /// CRL retrieval failed
    #[error("fetching CRL: {0}")]
    Fetch(String),
}

// `{:?}` renders the same as `{}`
impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

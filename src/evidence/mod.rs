// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! The evidence module decodes an AWS Nitro Enclaves attestation document
//! into an [`Evidence`] object: the COSE Sign1 envelope, the declared signing
//! algorithm and the typed [`AttestationDocument`] payload.
//!
//! # Example
//!
//! ```
//! use nitrotoken::evidence::{Algorithm, Evidence, DEFAULT_MAX_DOCUMENT_SIZE};
//!
//! const doc: &str = include_str!("../../testdata/nitro-valid.b64");
//!
//! let e = Evidence::decode_base64(doc, DEFAULT_MAX_DOCUMENT_SIZE)
//!     .expect("decoding attestation document");
//!
//! assert_eq!(e.algorithm, Algorithm::Es384);
//!
//! // the bytes the enclave's signing key actually signed
//! let tbs = e.to_be_signed().expect("building Sig_structure");
//! assert!(!tbs.is_empty());
//! ```

pub use self::common::*;
pub use self::cose::{sig_structure, Algorithm, CoseSign1};
pub use self::document::AttestationDocument;
pub use self::evidence::Evidence;

pub mod base64;
mod common;
mod cose;
mod document;
#[allow(clippy::module_inception)]
mod evidence;

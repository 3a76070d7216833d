// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! AWS Nitro Enclaves attestation document verification.
//!
//! This crate provides an API to decode and verify attestation documents
//! produced by the Nitro Secure Module of an AWS Nitro enclave.  For detailed
//! information about the format, see "Verifying the root of trust" in the
//! [AWS Nitro Enclaves User Guide][NE].
//!
//! The API allows:
//! * Issuing single-use, time-bounded freshness tokens ([`freshness`])
//! * Decoding a base64 or CBOR-encoded attestation document ([`evidence`])
//! * Validating its certificate chain against a pinned root, checking the
//!   COSE signature and the revocation status of each certificate, and
//!   binding the document to a freshness token ([`verify`])
//!
//! [NE]: https://docs.aws.amazon.com/enclaves/latest/user/verify-root.html

pub use errors::Error;

pub mod evidence;
pub mod freshness;
pub mod store;
pub mod verify;

mod errors;

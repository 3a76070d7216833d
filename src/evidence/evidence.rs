// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;

use super::base64;
use super::common::DEFAULT_MAX_DOCUMENT_SIZE;
use super::cose::{Algorithm, CoseSign1};
use super::document::AttestationDocument;
use crate::Error;

/// Collects all the components of a Nitro Enclaves attestation document
#[derive(Debug)]
pub struct Evidence {
    /// Algorithm declared in the protected header
    pub algorithm: Algorithm,
    /// Decoded payload
    pub document: AttestationDocument,
    /// Raw signature, as found in the envelope
    pub signature: Vec<u8>,
    /// COSE Sign1 envelope, with protected header and payload as received
    pub cose: CoseSign1,
}

impl Evidence {
    /// Decode a CBOR-encoded attestation document and instantiate an Evidence
    /// object.
    pub fn decode(buf: &[u8]) -> Result<Evidence, Error> {
        Self::decode_with_limit(buf, DEFAULT_MAX_DOCUMENT_SIZE)
    }

    /// Like [`Evidence::decode`], rejecting documents larger than `max_size`
    /// bytes before any parsing takes place.
    pub fn decode_with_limit(buf: &[u8], max_size: usize) -> Result<Evidence, Error> {
        if buf.len() > max_size {
            return Err(Error::MalformedInput(format!(
                "document is {} bytes, limit is {max_size}",
                buf.len()
            )));
        }

        let cose = CoseSign1::from_bytes(buf)?;

        let algorithm = cose.algorithm()?;

        let document = AttestationDocument::decode(&cose.payload)?;

        debug!(
            module_id = %document.module_id,
            %algorithm,
            cabundle = document.cabundle.len(),
            "decoded attestation document"
        );

        Ok(Evidence {
            algorithm,
            document,
            signature: cose.signature.clone(),
            cose,
        })
    }

    /// Decode the base64 transport encoding of an attestation document.
    /// Transport errors are reported as [`Error::MalformedEncoding`].
    pub fn decode_base64(text: &str, max_size: usize) -> Result<Evidence, Error> {
        let limit = base64::encoded_limit(max_size);

        if text.len() > limit {
            return Err(Error::MalformedInput(format!(
                "encoded document is {} bytes, limit is {limit}",
                text.len()
            )));
        }

        let buf = base64::decode_str(text)?;

        Self::decode_with_limit(&buf, max_size)
    }

    /// The exact bytes the signature was computed over
    pub fn to_be_signed(&self) -> Result<Vec<u8>, Error> {
        self.cose.to_be_signed()
    }
}

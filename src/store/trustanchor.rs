// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use openssl::hash::{hash, MessageDigest};
use openssl::memcmp;
use openssl::x509::X509;

use super::errors::Error;

const AWS_NITRO_ROOT_G1: &str = include_str!("../../certs/aws-nitro-enclaves-root-g1.pem");

/// SHA-256 of the DER encoding of the AWS Nitro Enclaves Root-G1 certificate
pub const AWS_NITRO_ROOT_G1_FINGERPRINT: [u8; 32] = [
    0x64, 0x1a, 0x03, 0x21, 0xa3, 0xe2, 0x44, 0xef, 0xe4, 0x56, 0x46, 0x31, 0x95, 0xd6, 0x06, 0x31,
    0x7e, 0xd7, 0xcd, 0xcc, 0x3c, 0x17, 0x56, 0xe0, 0x98, 0x93, 0xf3, 0xc6, 0x8f, 0x79, 0xbb, 0x5b,
];

/// The pinned root certificate that terminates every accepted chain.  It is
/// supplied out-of-band and never taken from the attestation document.
#[derive(Clone, Debug)]
pub struct TrustAnchor {
    der: Vec<u8>,
    x509: X509,
}

impl TrustAnchor {
    /// Load a root certificate from its PEM encoding (RFC 7468)
    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let x509 = X509::from_pem(pem.as_bytes()).map_err(|e| Error::Syntax(e.to_string()))?;

        let der = x509.to_der().map_err(|e| Error::Syntax(e.to_string()))?;

        Self::check_self_signed(&x509)?;

        Ok(Self { der, x509 })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let x509 = X509::from_der(der).map_err(|e| Error::Syntax(e.to_string()))?;

        Self::check_self_signed(&x509)?;

        Ok(Self {
            der: der.to_vec(),
            x509,
        })
    }

    /// The AWS Nitro Enclaves Root-G1 certificate, as published by AWS
    pub fn aws_nitro_root_g1() -> Result<Self, Error> {
        let ta = Self::from_pem(AWS_NITRO_ROOT_G1)?;

        ta.check_fingerprint(&AWS_NITRO_ROOT_G1_FINGERPRINT)?;

        Ok(ta)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    /// SHA-256 over the DER encoding
    pub fn fingerprint(&self) -> Result<Vec<u8>, Error> {
        let d = hash(MessageDigest::sha256(), &self.der).map_err(|e| Error::Sema(e.to_string()))?;

        Ok(d.to_vec())
    }

    /// Make sure this is the root the caller meant to pin
    pub fn check_fingerprint(&self, expected: &[u8]) -> Result<(), Error> {
        let actual = self.fingerprint()?;

        if actual.len() != expected.len() || !memcmp::eq(&actual, expected) {
            return Err(Error::Sema(format!(
                "root fingerprint mismatch: expecting {}, got {}",
                hex::encode(expected),
                hex::encode(&actual)
            )));
        }

        Ok(())
    }

    fn check_self_signed(x509: &X509) -> Result<(), Error> {
        let pkey = x509.public_key().map_err(|e| Error::Syntax(e.to_string()))?;

        let ok = x509
            .verify(&pkey)
            .map_err(|e| Error::Sema(e.to_string()))?;

        if !ok {
            return Err(Error::Sema("root certificate is not self-signed".to_string()));
        }

        Ok(())
    }
}

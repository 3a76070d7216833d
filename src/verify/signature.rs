// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::x509::X509Ref;

use crate::evidence::Algorithm;
use crate::Error;

/// Curve, digest and coordinate length for each supported ECDSA algorithm
fn ecdsa_params(alg: Algorithm) -> Option<(Nid, MessageDigest, usize)> {
    match alg {
        Algorithm::Es256 => Some((Nid::X9_62_PRIME256V1, MessageDigest::sha256(), 32)),
        Algorithm::Es384 => Some((Nid::SECP384R1, MessageDigest::sha384(), 48)),
        Algorithm::Es512 => Some((Nid::SECP521R1, MessageDigest::sha512(), 66)),
        Algorithm::Other(_) => None,
    }
}

/// Check the COSE signature (`r || s`) over `tbs` with the public key in
/// `leaf`.  Only algorithms in `allowed` are accepted, and the leaf key must
/// sit on the curve `alg` prescribes.
pub fn verify_signature(
    tbs: &[u8],
    signature: &[u8],
    leaf: &X509Ref,
    alg: Algorithm,
    allowed: &[Algorithm],
) -> Result<(), Error> {
    if !allowed.contains(&alg) {
        return Err(Error::UnsupportedAlgorithm(format!("{alg} is not allowed")));
    }

    let Some((nid, md, n)) = ecdsa_params(alg) else {
        return Err(Error::UnsupportedAlgorithm(alg.to_string()));
    };

    let pkey = leaf
        .public_key()
        .map_err(|e| Error::SignatureInvalid(format!("leaf public key: {e}")))?;

    let ec = pkey
        .ec_key()
        .map_err(|_| Error::SignatureInvalid("leaf public key is not an EC key".to_string()))?;

    if ec.group().curve_name() != Some(nid) {
        return Err(Error::SignatureInvalid(format!(
            "leaf key curve does not match {alg}"
        )));
    }

    if signature.len() != 2 * n {
        return Err(Error::SignatureInvalid(format!(
            "expecting {} signature bytes, got {}",
            2 * n,
            signature.len()
        )));
    }

    let to_bn = |b: &[u8]| BigNum::from_slice(b).map_err(|e| Error::SignatureInvalid(e.to_string()));

    let sig = EcdsaSig::from_private_components(to_bn(&signature[..n])?, to_bn(&signature[n..])?)
        .map_err(|e| Error::SignatureInvalid(e.to_string()))?;

    let digest = hash(md, tbs).map_err(|e| Error::SignatureInvalid(e.to_string()))?;

    let ok = sig
        .verify(&digest, &ec)
        .map_err(|e| Error::SignatureInvalid(e.to_string()))?;

    if !ok {
        return Err(Error::SignatureInvalid(
            "signature does not verify".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{Evidence, DEFAULT_MAX_DOCUMENT_SIZE};
    use openssl::x509::X509;

    const NITRO_VALID: &str = include_str!("../../testdata/nitro-valid.b64");
    const EXAMPLE_DOCUMENT: &str = include_str!("../../testdata/example-document.b64");

    const ES384_ONLY: &[Algorithm] = &[Algorithm::Es384];

    fn load(text: &str) -> (Evidence, Vec<u8>, X509) {
        let e = Evidence::decode_base64(text, DEFAULT_MAX_DOCUMENT_SIZE).unwrap();
        let tbs = e.to_be_signed().unwrap();
        let leaf = X509::from_der(&e.document.certificate).unwrap();
        (e, tbs, leaf)
    }

    #[test]
    fn nitro_signature_verifies() {
        let (e, tbs, leaf) = load(NITRO_VALID);

        verify_signature(&tbs, &e.signature, &leaf, e.algorithm, ES384_ONLY).unwrap();
    }

    #[test]
    fn example_signature_verifies() {
        let (e, tbs, leaf) = load(EXAMPLE_DOCUMENT);

        verify_signature(&tbs, &e.signature, &leaf, e.algorithm, ES384_ONLY).unwrap();
    }

    #[test]
    fn flipped_payload_bit() {
        let (e, mut tbs, leaf) = load(NITRO_VALID);

        let last = tbs.len() - 1;
        tbs[last] ^= 0x01;

        let r = verify_signature(&tbs, &e.signature, &leaf, e.algorithm, ES384_ONLY);

        assert!(matches!(r, Err(Error::SignatureInvalid(_))));
    }

    #[test]
    fn truncated_signature() {
        let (e, tbs, leaf) = load(NITRO_VALID);

        let r = verify_signature(&tbs, &e.signature[..95], &leaf, e.algorithm, ES384_ONLY);

        assert!(matches!(r, Err(Error::SignatureInvalid(_))));
    }

    #[test]
    fn algorithm_not_allowed() {
        let (e, tbs, leaf) = load(NITRO_VALID);

        let r = verify_signature(&tbs, &e.signature, &leaf, e.algorithm, &[Algorithm::Es256]);

        assert!(matches!(r, Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn unknown_algorithm() {
        let (e, tbs, leaf) = load(NITRO_VALID);

        let other = Algorithm::Other(-8);

        let r = verify_signature(&tbs, &e.signature, &leaf, other, &[other]);

        assert!(matches!(r, Err(Error::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn curve_mismatch() {
        let (e, tbs, leaf) = load(NITRO_VALID);

        // allowed, but the leaf carries a P-384 key
        let r = verify_signature(
            &tbs,
            &e.signature,
            &leaf,
            Algorithm::Es256,
            &[Algorithm::Es256, Algorithm::Es384],
        );

        assert!(matches!(r, Err(Error::SignatureInvalid(_))));
    }
}

// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::io::Cursor;

use ciborium::Value;
use serde::{Deserialize, Serialize};

use crate::Error;

const COSE_SIGN1_TAG: u64 = 18;
const HEADER_ALG: i128 = 1;
const HEADER_CRIT: i128 = 2;
const SIG_CONTEXT: &str = "Signature1";

/// Signing algorithm declared in the COSE protected header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "ES256")]
    Es256,
    #[serde(rename = "ES384")]
    Es384,
    #[serde(rename = "ES512")]
    Es512,
    /// Any other COSE algorithm identifier
    #[serde(untagged)]
    Other(i64),
}

impl Algorithm {
    pub fn from_cose_id(id: i64) -> Self {
        match id {
            -7 => Algorithm::Es256,
            -35 => Algorithm::Es384,
            -36 => Algorithm::Es512,
            other => Algorithm::Other(other),
        }
    }

    pub fn cose_id(&self) -> i64 {
        match self {
            Algorithm::Es256 => -7,
            Algorithm::Es384 => -35,
            Algorithm::Es512 => -36,
            Algorithm::Other(id) => *id,
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Es256 => write!(f, "ES256"),
            Algorithm::Es384 => write!(f, "ES384"),
            Algorithm::Es512 => write!(f, "ES512"),
            Algorithm::Other(id) => write!(f, "COSE algorithm {id}"),
        }
    }
}

/// A COSE_Sign1 envelope (RFC 9052 §4.2), tagged or untagged.  The protected
/// header and the payload are kept as the exact byte strings received, since
/// the signature is computed over them.
#[derive(Debug, Clone)]
pub struct CoseSign1 {
    pub protected: Vec<u8>,
    pub unprotected: Vec<(Value, Value)>,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl CoseSign1 {
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let v = from_slice_exact(data, "COSE_Sign1")?;

        let v = match v {
            Value::Tag(COSE_SIGN1_TAG, inner) => *inner,
            Value::Tag(t, _) => {
                return Err(Error::MalformedInput(format!(
                    "expecting tag {COSE_SIGN1_TAG}, got {t}"
                )))
            }
            other => other,
        };

        let mut items = match v {
            Value::Array(a) if a.len() == 4 => a.into_iter(),
            Value::Array(a) => {
                return Err(Error::MalformedInput(format!(
                    "COSE_Sign1 MUST have 4 elements, got {}",
                    a.len()
                )))
            }
            _ => return Err(Error::MalformedInput("expecting array type".to_string())),
        };

        let mut next = || items.next().unwrap_or(Value::Null);

        let protected = match next() {
            Value::Bytes(b) => b,
            _ => return Err(Error::MalformedInput("protected MUST be bstr".to_string())),
        };

        let unprotected = match next() {
            Value::Map(m) => m,
            _ => return Err(Error::MalformedInput("unprotected MUST be map".to_string())),
        };

        let payload = match next() {
            Value::Bytes(b) => b,
            Value::Null => {
                return Err(Error::MalformedInput(
                    "detached payload not supported".to_string(),
                ))
            }
            _ => return Err(Error::MalformedInput("payload MUST be bstr".to_string())),
        };

        let signature = match next() {
            Value::Bytes(b) => b,
            _ => return Err(Error::MalformedInput("signature MUST be bstr".to_string())),
        };

        Ok(Self {
            protected,
            unprotected,
            payload,
            signature,
        })
    }

    /// Decode the algorithm from the protected header, enforcing that any
    /// critical header parameter is one we understand.
    pub fn algorithm(&self) -> Result<Algorithm, Error> {
        let header = self.protected_map()?;

        let mut alg = None;

        for (k, v) in header.iter() {
            let Value::Integer(i) = k else {
                continue;
            };

            match i128::from(*i) {
                HEADER_ALG => {
                    if alg.is_some() {
                        return Err(Error::MalformedInput("duplicated alg header".to_string()));
                    }
                    let id = v
                        .as_integer()
                        .and_then(|i| i64::try_from(i).ok())
                        .ok_or_else(|| Error::MalformedInput("alg MUST be int".to_string()))?;
                    alg = Some(Algorithm::from_cose_id(id));
                }
                HEADER_CRIT => check_crit(v)?,
                _ => continue,
            }
        }

        alg.ok_or_else(|| Error::MalformedInput("missing alg in protected header".to_string()))
    }

    /// Encode the Sig_structure (RFC 9052 §4.4) the signature is computed
    /// over.  The protected header and payload go in exactly as received.
    pub fn to_be_signed(&self) -> Result<Vec<u8>, Error> {
        sig_structure(&self.protected, &self.payload)
    }

    fn protected_map(&self) -> Result<Vec<(Value, Value)>, Error> {
        // a zero-length protected header stands for the empty map
        if self.protected.is_empty() {
            return Ok(Vec::new());
        }

        match from_slice_exact(&self.protected, "protected header")? {
            Value::Map(m) => Ok(m),
            _ => Err(Error::MalformedInput(
                "protected header MUST be map".to_string(),
            )),
        }
    }
}

/// `["Signature1", protected, external_aad = h'', payload]`
pub fn sig_structure(protected: &[u8], payload: &[u8]) -> Result<Vec<u8>, Error> {
    let v = Value::Array(vec![
        Value::Text(SIG_CONTEXT.to_string()),
        Value::Bytes(protected.to_vec()),
        Value::Bytes(Vec::new()),
        Value::Bytes(payload.to_vec()),
    ]);

    let mut buf = Vec::with_capacity(protected.len() + payload.len() + 24);
    ciborium::ser::into_writer(&v, &mut buf)
        .map_err(|e| Error::MalformedInput(format!("encoding Sig_structure: {e}")))?;

    Ok(buf)
}

fn check_crit(v: &Value) -> Result<(), Error> {
    let Some(labels) = v.as_array() else {
        return Err(Error::MalformedInput("crit MUST be array".to_string()));
    };

    for l in labels.iter() {
        match l {
            Value::Integer(i) if i128::from(*i) == HEADER_ALG => continue,
            Value::Text(t) if t == "alg" => continue,
            other => {
                return Err(Error::MalformedInput(format!(
                    "unsupported critical header {other:?}"
                )))
            }
        }
    }

    Ok(())
}

/// Decode exactly one CBOR item from `data`, rejecting trailing bytes.
pub(crate) fn from_slice_exact(data: &[u8], what: &str) -> Result<Value, Error> {
    let mut reader = Cursor::new(data);

    let v: Value = ciborium::de::from_reader(&mut reader)
        .map_err(|e| Error::MalformedInput(format!("{what}: {e}")))?;

    if reader.position() != data.len() as u64 {
        return Err(Error::MalformedInput(format!("trailing bytes after {what}")));
    }

    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn sig_structure_framing() {
        let tbs = sig_structure(&hex!("a1013822"), &hex!("a0")).unwrap();

        assert_eq!(
            tbs,
            hex!("846a5369676e61747572653144a10138224041a0").to_vec()
        );
    }

    #[test]
    fn tagged_and_untagged_envelopes() {
        let untagged = hex!("8444a1013822a041a04100");
        let tagged = hex!("d28444a1013822a041a04100");

        for buf in [&untagged[..], &tagged[..]] {
            let c = CoseSign1::from_bytes(buf).unwrap();

            assert_eq!(c.algorithm().unwrap(), Algorithm::Es384);
            assert_eq!(c.payload, vec![0xa0]);
            assert_eq!(c.signature, vec![0x00]);
        }
    }

    #[test]
    fn wrong_tag() {
        let buf = hex!("d38444a1013822a041a04100");

        assert!(matches!(
            CoseSign1::from_bytes(&buf),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn trailing_bytes() {
        let buf = hex!("8444a1013822a041a0410000");

        assert!(CoseSign1::from_bytes(&buf).is_err());
    }

    #[test]
    fn wrong_arity() {
        let buf = hex!("8344a1013822a041a0");

        assert!(CoseSign1::from_bytes(&buf).is_err());
    }

    #[test]
    fn unknown_algorithm_is_decoded() {
        // {1: -7}
        let buf = hex!("8443a10126a041a04100");

        let c = CoseSign1::from_bytes(&buf).unwrap();

        assert_eq!(c.algorithm().unwrap(), Algorithm::Es256);

        // {1: -259}
        let buf = hex!("8445a101390102a041a04100");

        let c = CoseSign1::from_bytes(&buf).unwrap();

        assert_eq!(c.algorithm().unwrap(), Algorithm::Other(-259));
    }

    #[test]
    fn missing_algorithm() {
        // protected = {4: h'01'}
        let buf = hex!("8444a1044101a041a04100");

        let c = CoseSign1::from_bytes(&buf).unwrap();

        assert!(matches!(c.algorithm(), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn unknown_critical_header() {
        // protected = {1: -35, 2: [4]}
        let buf = hex!("8447a2013822028104a041a04100");

        let c = CoseSign1::from_bytes(&buf).unwrap();

        assert!(c.algorithm().is_err());
    }
}

// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitmask::*;
use ciborium::Value;
use serde::Serialize;
use serde_with::base64::Base64;
use serde_with::serde_as;

use super::common::*;
use super::cose::from_slice_exact;
use crate::Error;

const MODULE_ID: &str = "module_id";
const DIGEST: &str = "digest";
const TIMESTAMP: &str = "timestamp";
const PCRS: &str = "pcrs";
const CERTIFICATE: &str = "certificate";
const CABUNDLE: &str = "cabundle";
const PUBLIC_KEY: &str = "public_key";
const USER_DATA: &str = "user_data";
const NONCE: &str = "nonce";

bitmask! {
    #[derive(Debug)]
    mask ClaimsSet: u16 where flags Claims {
        ModuleID    = 0x01,
        Digest      = 0x02,
        Timestamp   = 0x04,
        Pcrs        = 0x08,
        Certificate = 0x10,
        CaBundle    = 0x20,
        PublicKey   = 0x40,
        UserData    = 0x80,
        Nonce       = 0x100,
    }
}

/// The payload of a Nitro Enclaves attestation document.  For syntax and
/// semantics, see "Verifying the root of trust", AWS Nitro Enclaves User Guide.
#[serde_as]
#[derive(Debug, Serialize)]
pub struct AttestationDocument {
    pub module_id: String, // text, non-empty
    pub digest: String,    // "SHA256" | "SHA384" | "SHA512"
    pub timestamp: u64,    // milliseconds since the UNIX epoch
    #[serde_as(as = "BTreeMap<_, Base64>")]
    pub pcrs: BTreeMap<u32, Vec<u8>>, // index 0..31 -> digest
    #[serde_as(as = "Base64")]
    pub certificate: Vec<u8>, // DER, signs the document
    #[serde_as(as = "Vec<Base64>")]
    pub cabundle: Vec<Vec<u8>>, // DER, as transmitted (root first)
    #[serde_as(as = "Option<Base64>")]
    pub public_key: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    pub user_data: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    pub nonce: Option<Vec<u8>>,

    #[serde(skip)]
    claims_set: ClaimsSet,
}

impl Default for AttestationDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl AttestationDocument {
    pub fn new() -> Self {
        Self {
            module_id: String::from(""),
            digest: String::from(""),
            timestamp: 0,
            pcrs: Default::default(),
            certificate: Default::default(),
            cabundle: Default::default(),
            public_key: None,
            user_data: None,
            nonce: None,
            claims_set: ClaimsSet::none(),
        }
    }

    /// Decode a CBOR encoded attestation document payload
    pub fn decode(buf: &[u8]) -> Result<AttestationDocument, Error> {
        let v = from_slice_exact(buf, "payload")?;

        let mut doc: AttestationDocument = Default::default();

        if let Value::Map(contents) = v {
            doc.parse(&contents)?;
        } else {
            return Err(Error::MalformedInput("expecting map type".to_string()));
        }

        doc.validate()?;

        Ok(doc)
    }

    /// The instant the Nitro hypervisor produced the document
    pub fn produced_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.timestamp)
    }

    /// Re-encode the payload in the order the Nitro Secure Module emits it.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        let opt_bstr = |v: &Option<Vec<u8>>| match v {
            Some(b) => Value::Bytes(b.clone()),
            None => Value::Null,
        };

        let pcrs = self
            .pcrs
            .iter()
            .map(|(k, v)| (Value::Integer((*k).into()), Value::Bytes(v.clone())))
            .collect();

        let cabundle = self.cabundle.iter().cloned().map(Value::Bytes).collect();

        let v = Value::Map(vec![
            (MODULE_ID.into(), Value::Text(self.module_id.clone())),
            (DIGEST.into(), Value::Text(self.digest.clone())),
            (TIMESTAMP.into(), Value::Integer(self.timestamp.into())),
            (PCRS.into(), Value::Map(pcrs)),
            (CERTIFICATE.into(), Value::Bytes(self.certificate.clone())),
            (CABUNDLE.into(), Value::Array(cabundle)),
            (PUBLIC_KEY.into(), opt_bstr(&self.public_key)),
            (USER_DATA.into(), opt_bstr(&self.user_data)),
            (NONCE.into(), opt_bstr(&self.nonce)),
        ]);

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&v, &mut buf)
            .map_err(|e| Error::MalformedInput(format!("encoding payload: {e}")))?;

        Ok(buf)
    }

    fn parse(&mut self, contents: &[(Value, Value)]) -> Result<(), Error> {
        for (k, v) in contents.iter() {
            if let Value::Text(key) = k {
                match key.as_str() {
                    MODULE_ID => self.set_module_id(v)?,
                    DIGEST => self.set_digest(v)?,
                    TIMESTAMP => self.set_timestamp(v)?,
                    PCRS => self.set_pcrs(v)?,
                    CERTIFICATE => self.set_certificate(v)?,
                    CABUNDLE => self.set_cabundle(v)?,
                    PUBLIC_KEY => self.set_public_key(v)?,
                    USER_DATA => self.set_user_data(v)?,
                    NONCE => self.set_nonce(v)?,
                    _ => continue,
                }
            } else {
                return Err(Error::MalformedInput(
                    "non-text key in attestation document".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), Error> {
        // public_key, user_data and nonce are optional
        let mandatory_claims = [
            (Claims::ModuleID, MODULE_ID),
            (Claims::Digest, DIGEST),
            (Claims::Timestamp, TIMESTAMP),
            (Claims::Pcrs, PCRS),
            (Claims::Certificate, CERTIFICATE),
            (Claims::CaBundle, CABUNDLE),
        ];

        for (c, n) in mandatory_claims.iter() {
            if !self.claims_set.contains(*c) {
                return Err(Error::MalformedInput(format!("missing {n}")));
            }
        }

        // pcrs may come before digest in the map
        for (i, m) in self.pcrs.iter() {
            if !is_valid_measurement(m, &self.digest) {
                return Err(Error::MalformedInput(format!(
                    "pcr {i}: expecting {} digest, got {} bytes",
                    self.digest,
                    m.len()
                )));
            }
        }

        Ok(())
    }

    fn check_dup(&mut self, c: Claims, n: &str) -> Result<(), Error> {
        if self.claims_set.contains(c) {
            return Err(Error::MalformedInput(format!("duplicated {n}")));
        }

        self.claims_set.set(c);

        Ok(())
    }

    fn set_module_id(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::ModuleID, MODULE_ID)?;

        let x = to_tstr(v, MODULE_ID)?;

        if x.is_empty() {
            return Err(Error::MalformedInput("empty module_id".to_string()));
        }

        self.module_id = x;

        Ok(())
    }

    fn set_digest(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::Digest, DIGEST)?;

        let x = to_tstr(v, DIGEST)?;

        if digest_len(&x).is_none() {
            return Err(Error::MalformedInput(format!("unknown digest {x}")));
        }

        self.digest = x;

        Ok(())
    }

    fn set_timestamp(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::Timestamp, TIMESTAMP)?;

        let x = to_uint(v, TIMESTAMP)?;

        if x == 0 {
            return Err(Error::MalformedInput("zero timestamp".to_string()));
        }

        self.timestamp = x;

        Ok(())
    }

    fn set_pcrs(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::Pcrs, PCRS)?;

        let Value::Map(entries) = v else {
            return Err(Error::MalformedInput("pcrs MUST be map".to_string()));
        };

        if entries.is_empty() || entries.len() > MAX_PCRS {
            return Err(Error::MalformedInput(format!(
                "pcrs: expecting 1..={MAX_PCRS} entries, got {}",
                entries.len()
            )));
        }

        for (k, m) in entries.iter() {
            let i = to_uint(k, "pcr index")?;

            if i >= MAX_PCRS as u64 {
                return Err(Error::MalformedInput(format!("pcr index {i} out of range")));
            }

            let m = to_bstr(m, "pcr")?;

            if self.pcrs.insert(i as u32, m).is_some() {
                return Err(Error::MalformedInput(format!("duplicated pcr {i}")));
            }
        }

        Ok(())
    }

    fn set_certificate(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::Certificate, CERTIFICATE)?;

        self.certificate = to_der(v, CERTIFICATE)?;

        Ok(())
    }

    fn set_cabundle(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::CaBundle, CABUNDLE)?;

        let Some(certs) = v.as_array() else {
            return Err(Error::MalformedInput("cabundle MUST be array".to_string()));
        };

        if certs.is_empty() || certs.len() > MAX_CABUNDLE_LEN {
            return Err(Error::MalformedInput(format!(
                "cabundle: expecting 1..={MAX_CABUNDLE_LEN} entries, got {}",
                certs.len()
            )));
        }

        self.cabundle = certs
            .iter()
            .map(|c| to_der(c, "cabundle entry"))
            .collect::<Result<_, _>>()?;

        Ok(())
    }

    fn set_public_key(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::PublicKey, PUBLIC_KEY)?;

        let x = to_opt_bstr(v, PUBLIC_KEY)?;

        if let Some(k) = &x {
            if k.is_empty() || k.len() > MAX_PUBLIC_KEY_LEN {
                return Err(Error::MalformedInput(format!(
                    "public_key: expecting 1..={MAX_PUBLIC_KEY_LEN} bytes, got {}",
                    k.len()
                )));
            }
        }

        self.public_key = x;

        Ok(())
    }

    fn set_user_data(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::UserData, USER_DATA)?;

        self.user_data = to_bounded_opt_bstr(v, USER_DATA, MAX_USER_DATA_LEN)?;

        Ok(())
    }

    fn set_nonce(&mut self, v: &Value) -> Result<(), Error> {
        self.check_dup(Claims::Nonce, NONCE)?;

        self.nonce = to_bounded_opt_bstr(v, NONCE, MAX_NONCE_LEN)?;

        Ok(())
    }
}

fn to_der(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    let x = to_bstr(v, n)?;

    if x.is_empty() || x.len() > MAX_CERT_LEN {
        return Err(Error::MalformedInput(format!(
            "{n}: expecting 1..={MAX_CERT_LEN} bytes, got {}",
            x.len()
        )));
    }

    Ok(x)
}

fn to_bounded_opt_bstr(v: &Value, n: &str, max: usize) -> Result<Option<Vec<u8>>, Error> {
    let x = to_opt_bstr(v, n)?;

    match &x {
        Some(b) if b.len() > max => Err(Error::MalformedInput(format!(
            "{n}: at most {max} bytes, got {}",
            b.len()
        ))),
        _ => Ok(x),
    }
}

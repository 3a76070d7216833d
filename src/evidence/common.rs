// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use ciborium::Value;

use crate::Error;

pub const MAX_CERT_LEN: usize = 1024;
pub const MAX_CABUNDLE_LEN: usize = 16;
pub const MAX_PCRS: usize = 32;
pub const MAX_PUBLIC_KEY_LEN: usize = 1024;
pub const MAX_USER_DATA_LEN: usize = 512;
pub const MAX_NONCE_LEN: usize = 512;

/// Default cap on the size of a CBOR-encoded attestation document
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 32 * 1024;

/// Returns the digest length associated with a Nitro digest identifier
pub fn digest_len(value: &str) -> Option<usize> {
    match value {
        "SHA256" => Some(32),
        "SHA384" => Some(48),
        "SHA512" => Some(64),
        _ => None,
    }
}

pub fn is_valid_measurement(value: &[u8], digest: &str) -> bool {
    digest_len(digest) == Some(value.len())
}

pub(crate) fn to_bstr(v: &Value, n: &str) -> Result<Vec<u8>, Error> {
    v.as_bytes()
        .cloned()
        .ok_or_else(|| Error::MalformedInput(format!("{n} MUST be bstr")))
}

pub(crate) fn to_tstr(v: &Value, n: &str) -> Result<String, Error> {
    v.as_text()
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedInput(format!("{n} MUST be tstr")))
}

pub(crate) fn to_uint(v: &Value, n: &str) -> Result<u64, Error> {
    let i = v
        .as_integer()
        .ok_or_else(|| Error::MalformedInput(format!("{n} MUST be uint")))?;

    u64::try_from(i).map_err(|_| Error::MalformedInput(format!("{n} out of range")))
}

/// A bstr that may also be encoded as null when not supplied by the enclave
pub(crate) fn to_opt_bstr(v: &Value, n: &str) -> Result<Option<Vec<u8>>, Error> {
    match v {
        Value::Null => Ok(None),
        _ => to_bstr(v, n).map(Some),
    }
}

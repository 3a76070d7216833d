// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use base64::{self, engine::general_purpose, Engine as _};

use crate::Error;

/// decodes bytes from a (standard, padded) base64-encoded string, ignoring
/// whitespace, including line breaks in wrapped text
pub fn decode_str(v: &str) -> Result<Vec<u8>, Error> {
    let compact: Vec<u8> = v
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();

    general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| Error::MalformedEncoding(e.to_string()))
}

/// encodes bytes as a standard, padded base64 string
pub fn encode(v: &[u8]) -> String {
    general_purpose::STANDARD.encode(v)
}

/// Upper bound on the length of the base64 text carrying `max_bytes` bytes of
/// payload, with room for CRLF line breaks every 64 characters.
pub fn encoded_limit(max_bytes: usize) -> usize {
    let encoded = max_bytes.div_ceil(3) * 4;
    encoded + encoded / 32 + 4
}

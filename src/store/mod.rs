// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

//! Out-of-band inputs to verification: the pinned [`TrustAnchor`] and the
//! stores certificate revocation lists are fetched from.

pub use self::errors::Error;
pub use self::http_crlstore::{HttpCrlStore, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CRL_SIZE};
pub use self::icrlstore::ICrlStore;
pub use self::memo_crlstore::MemoCrlStore;
pub use self::trustanchor::{TrustAnchor, AWS_NITRO_ROOT_G1_FINGERPRINT};

mod errors;
mod http_crlstore;
mod icrlstore;
mod memo_crlstore;
mod trustanchor;

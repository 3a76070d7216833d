// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use super::errors::Error;
use super::ICrlStore;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CRL_SIZE: u64 = 1024 * 1024;

/// Retrieves CRLs from their HTTP distribution points, with a bounded wait
/// and a bounded response size.
///
/// Requests are made with `reqwest`'s blocking client, which panics when
/// used from within an async runtime.  From async code, run verification
/// through `tokio::task::spawn_blocking` (or build the store and verify on a
/// dedicated thread).
#[derive(Debug, Clone)]
pub struct HttpCrlStore {
    client: Client,
    max_size: u64,
}

impl HttpCrlStore {
    pub fn new() -> Result<Self, Error> {
        Self::with_limits(DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_CRL_SIZE)
    }

    pub fn with_limits(timeout: Duration, max_size: u64) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;

        Ok(Self { client, max_size })
    }
}

impl ICrlStore for HttpCrlStore {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, Error> {
        debug!("downloading CRL from {url}");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::Fetch(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "{url}: HTTP status {}",
                response.status()
            )));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_size {
                return Err(Error::Fetch(format!(
                    "{url}: CRL is {len} bytes, limit is {}",
                    self.max_size
                )));
            }
        }

        // the declared length may be missing or wrong
        let mut crl = Vec::new();
        response
            .take(self.max_size + 1)
            .read_to_end(&mut crl)
            .map_err(|e| Error::Fetch(format!("{url}: {e}")))?;

        if crl.len() as u64 > self.max_size {
            return Err(Error::Fetch(format!(
                "{url}: CRL exceeds {} bytes",
                self.max_size
            )));
        }

        debug!("downloaded {} bytes CRL from {url}", crl.len());

        Ok(crl)
    }
}

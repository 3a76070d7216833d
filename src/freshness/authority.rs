// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use std::thread;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use super::entropy::{IEntropySource, OsEntropy};
use super::token::{FreshnessToken, MIN_VALUE_LEN};
use crate::Error;

/// Default number of random bytes in an issued token
pub const DEFAULT_VALUE_LEN: usize = 32;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Issues freshness tokens with a bounded lifetime.
#[derive(Debug)]
pub struct NonceAuthority<E: IEntropySource = OsEntropy> {
    entropy: E,
    value_len: usize,
}

impl Default for NonceAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceAuthority {
    /// A NonceAuthority drawing from the OpenSSL CSPRNG
    pub fn new() -> Self {
        Self::with_entropy(OsEntropy)
    }

    /// True once `now` is past the token's expiry instant
    pub fn is_expired(token: &FreshnessToken, now: SystemTime) -> bool {
        token.is_expired(now)
    }
}

impl<E: IEntropySource> NonceAuthority<E> {
    pub fn with_entropy(entropy: E) -> Self {
        Self {
            entropy,
            value_len: DEFAULT_VALUE_LEN,
        }
    }

    /// Change the number of random bytes in issued tokens
    pub fn with_value_len(mut self, value_len: usize) -> Result<Self, Error> {
        if value_len < MIN_VALUE_LEN {
            return Err(Error::InvalidToken(format!(
                "value length {value_len} is below the minimum of {MIN_VALUE_LEN}"
            )));
        }

        self.value_len = value_len;

        Ok(self)
    }

    /// Issue a token valid from now for `lifetime`
    pub fn issue(&self, lifetime: Duration) -> Result<FreshnessToken, Error> {
        self.issue_at(SystemTime::now(), lifetime)
    }

    /// Issue a token valid from `now` for `lifetime`
    pub fn issue_at(&self, now: SystemTime, lifetime: Duration) -> Result<FreshnessToken, Error> {
        if lifetime.is_zero() {
            return Err(Error::InvalidToken("zero lifetime".to_string()));
        }

        let expires_at = now
            .checked_add(lifetime)
            .ok_or_else(|| Error::InvalidToken("lifetime out of range".to_string()))?;

        let value = self.draw()?;

        debug!(len = value.len(), ?lifetime, "issued freshness token");

        FreshnessToken::new(value, now, expires_at)
    }

    fn draw(&self) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; self.value_len];
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;

        loop {
            match self.entropy.fill(&mut buf) {
                Ok(()) => return Ok(buf),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "entropy source failed, retrying");
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(Error::EntropyUnavailable(format!(
                        "giving up after {MAX_ATTEMPTS} attempts: {e}"
                    )))
                }
            }
        }
    }
}

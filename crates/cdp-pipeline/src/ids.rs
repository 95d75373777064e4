//! Random identifiers, unique for the lifetime of one generator
//!
//! [`UniqueIdGenerator`] is shared by every generation task of a run. The
//! seen-set lives behind a mutex and the membership check and insert happen
//! under one lock acquisition, so two tasks can never both receive the same
//! value.

use cdp_common::{CdpError, Result};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::trace;

/// `a-z`, `A-Z`, `0-9`
pub const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `A-Z`
pub const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random string of `size` characters drawn from `alphabet`, no uniqueness guarantee
pub fn generate(size: usize, alphabet: &[u8]) -> Result<String> {
    check_space(size, alphabet)?;
    Ok(sample(&mut rand::rng(), size, alphabet))
}

fn sample<R: Rng + ?Sized>(rng: &mut R, size: usize, alphabet: &[u8]) -> String {
    (0..size)
        .map(|_| char::from(alphabet[rng.random_range(0..alphabet.len())]))
        .collect()
}

fn check_space(size: usize, alphabet: &[u8]) -> Result<()> {
    if size == 0 {
        return Err(CdpError::config("identifier size must be greater than 0"));
    }
    if alphabet.is_empty() {
        return Err(CdpError::config("identifier alphabet cannot be empty"));
    }
    if !alphabet.is_ascii() {
        return Err(CdpError::config("identifier alphabet must be ASCII"));
    }
    let distinct: HashSet<u8> = alphabet.iter().copied().collect();
    if distinct.len() != alphabet.len() {
        return Err(CdpError::config(
            "identifier alphabet must not repeat characters",
        ));
    }
    Ok(())
}

/// Number of distinct strings in the space, `None` when it does not fit in a u128
fn capacity(size: usize, alphabet_len: usize) -> Option<u128> {
    let exp = u32::try_from(size).ok()?;
    (alphabet_len as u128).checked_pow(exp)
}

/// Identifier source that never repeats a value it has returned
#[derive(Debug, Default)]
pub struct UniqueIdGenerator {
    seen: Mutex<HashSet<String>>,
    max_attempts: Option<usize>,
}

impl UniqueIdGenerator {
    /// Generator that resamples on collision without an attempt cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that gives up after `max_attempts` draws for a single call
    pub fn with_max_attempts(max_attempts: usize) -> Self {
        Self {
            seen: Mutex::default(),
            max_attempts: Some(max_attempts),
        }
    }

    /// Next unseen identifier of `size` characters from `alphabet`
    ///
    /// Without an attempt cap this only fails once the whole space of
    /// `alphabet.len() ^ size` strings has been handed out. With a cap, a call
    /// fails after that many consecutive collisions.
    pub fn next(&self, size: usize, alphabet: &[u8]) -> Result<String> {
        check_space(size, alphabet)?;
        let capacity = capacity(size, alphabet.len());
        let mut rng = rand::rng();
        let mut attempts = 0usize;

        loop {
            let candidate = sample(&mut rng, size, alphabet);
            attempts += 1;

            let mut seen = self
                .seen
                .lock()
                .map_err(|e| CdpError::poisoned("identifier seen-set", e))?;

            if !seen.contains(&candidate) {
                seen.insert(candidate.clone());
                if attempts > 1 {
                    trace!(attempts, "Resolved identifier collision");
                }
                return Ok(candidate);
            }

            match (self.max_attempts, capacity) {
                (Some(max_attempts), _) if attempts >= max_attempts => {
                    return Err(CdpError::IdRetryExhausted { attempts });
                },
                // Scanned only on collision
                (None, Some(capacity)) => {
                    let in_space = seen
                        .iter()
                        .filter(|s| s.len() == size && s.bytes().all(|b| alphabet.contains(&b)))
                        .count() as u128;
                    if in_space >= capacity {
                        return Err(CdpError::IdSpaceExhausted { size, capacity });
                    }
                },
                _ => {},
            }
        }
    }

    /// Number of identifiers handed out so far
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .map(|seen| seen.len())
            .unwrap_or_else(|e| e.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

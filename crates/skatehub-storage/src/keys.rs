//! Storage key generation.
//!
//! Keys are drawn uniformly from `A-Z0-9` using a cryptographically secure
//! generator. At the default length of 16 the key space is 36^16, so keys are
//! not guessable and collisions are negligible.

use rand::rngs::StdRng;
use rand::{CryptoRng, Rng, SeedableRng};
use std::sync::Mutex;

const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Default key length
pub const DEFAULT_KEY_LENGTH: usize = 16;

/// Random storage key generator.
///
/// Owns its random source instead of using ambient thread-local state, so tests
/// can pass a seeded generator and get repeatable keys.
pub struct KeyGenerator<R = StdRng> {
    rng: Mutex<R>,
    length: usize,
}

impl KeyGenerator<StdRng> {
    /// Generator seeded from the operating system's entropy source.
    pub fn new(length: usize) -> Self {
        Self::with_rng(StdRng::from_os_rng(), length)
    }

    /// Deterministic generator for tests.
    pub fn seeded(seed: u64, length: usize) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), length)
    }
}

impl Default for KeyGenerator<StdRng> {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_LENGTH)
    }
}

impl<R> KeyGenerator<R>
where
    R: CryptoRng,
{
    pub fn with_rng(rng: R, length: usize) -> Self {
        Self {
            rng: Mutex::new(rng),
            length,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Generate a key of the configured length.
    pub fn generate(&self) -> String {
        // A panic while holding the lock cannot leave the generator in a bad state.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (0..self.length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

//! Memoised password checks.
//!
//! Remembers the outcome of each (password, hash) comparison for a fixed
//! time-to-live so repeated requests with the same credential skip Argon2.
//! Hits answer faster than misses, and plaintext passwords stay in memory
//! until their entry is pruned.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::password::{Argon2Comparer, HashComparer, PasswordError};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_PRUNE_THRESHOLD: usize = 100;

struct CachedCheck {
    checked_at: Instant,
    is_valid: bool,
}

pub struct PasswordCache<C = Argon2Comparer> {
    comparer: C,
    ttl: Duration,
    prune_threshold: usize,
    entries: Mutex<HashMap<(String, String), CachedCheck>>,
}

impl PasswordCache<Argon2Comparer> {
    pub fn new(ttl: Duration, prune_threshold: usize) -> Self {
        Self::with_comparer(Argon2Comparer, ttl, prune_threshold)
    }
}

impl Default for PasswordCache<Argon2Comparer> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_PRUNE_THRESHOLD)
    }
}

impl<C: HashComparer> PasswordCache<C> {
    pub fn with_comparer(comparer: C, ttl: Duration, prune_threshold: usize) -> Self {
        Self {
            comparer,
            ttl,
            prune_threshold,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `password` matches `hash`, answering from the cache when a
    /// comparison of the same pair is younger than the TTL.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        self.verify_at(password, hash, Instant::now())
    }

    fn verify_at(&self, password: &str, hash: &str, now: Instant) -> Result<bool, PasswordError> {
        let key = (password.to_string(), hash.to_string());

        if let Some(cached) = self.lock().get(&key) {
            if now.saturating_duration_since(cached.checked_at) < self.ttl {
                return Ok(cached.is_valid);
            }
        }

        // Lock released while hashing; two racing misses just compare twice.
        let is_valid = self.comparer.compare(password, hash)?;

        let mut entries = self.lock();
        entries.insert(key, CachedCheck { checked_at: now, is_valid });
        if entries.len() > self.prune_threshold {
            let ttl = self.ttl;
            let before = entries.len();
            entries.retain(|_, entry| now.saturating_duration_since(entry.checked_at) <= ttl);
            log::debug!("Pruned {} expired password cache entries", before - entries.len());
        }

        Ok(is_valid)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), CachedCheck>> {
        // Entries are re-derivable, so a poisoned map is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

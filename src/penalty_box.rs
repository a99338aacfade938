//! Non-blocking throttling for repeated kid-misses.
//!
//! A kid-miss usually means the signing key rotated and the JWKS hasn't
//! been fetched yet — but it can also mean an attacker is probing `kid`
//! values to force a fetch storm. The penalty box makes misses expensive
//! without ever running a background timer: expiry is checked lazily,
//! against [`Instant::now`], the next time anyone asks.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::PenaltyBoxError;

/// Default cooldown applied after a kid-miss.
pub const DEFAULT_PENALTY: Duration = Duration::from_secs(10);

/// Tracks, per `(uri, kid)`, how long to wait before trying that kid again.
pub struct PenaltyBox {
    until: DashMap<(String, String), Instant>,
    duration: Duration,
}

impl Default for PenaltyBox {
    fn default() -> Self {
        Self::new()
    }
}

impl PenaltyBox {
    /// A penalty box using [`DEFAULT_PENALTY`].
    pub fn new() -> Self {
        Self::with_duration(DEFAULT_PENALTY)
    }

    /// A penalty box with a custom cooldown.
    pub fn with_duration(duration: Duration) -> Self {
        Self { until: DashMap::new(), duration }
    }

    /// Return an error if `(uri, kid)` is still cooling down.
    pub fn wait(&self, uri: &str, kid: &str) -> Result<(), PenaltyBoxError> {
        let Some(entry) = self.until.get(&(uri.to_string(), kid.to_string())) else {
            return Ok(());
        };
        let until = *entry;
        drop(entry);
        let now = Instant::now();
        if now >= until {
            return Ok(());
        }
        Err(PenaltyBoxError {
            uri: uri.to_string(),
            kid: kid.to_string(),
            retry_after_ms: (until - now).as_millis() as u64,
        })
    }

    /// Arm the cooldown for `(uri, kid)` after a fetch that still didn't
    /// produce this kid.
    pub fn register_failed_attempt(&self, uri: &str, kid: &str) {
        let until = Instant::now() + self.duration;
        self.until.insert((uri.to_string(), kid.to_string()), until);
        tracing::warn!(uri, kid, cooldown_ms = self.duration.as_millis() as u64, "penalty box armed");
    }

    /// Clear any cooldown for `(uri, kid)` after a successful resolution.
    pub fn register_successful_attempt(&self, uri: &str, kid: &str) {
        self.until.remove(&(uri.to_string(), kid.to_string()));
    }

    /// Clear every cooldown for `uri` (e.g. after the caller hydrates the
    /// cache with a fresh JWKS out of band).
    pub fn release_uri(&self, uri: &str) {
        self.until.retain(|(u, _), _| u != uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_kid_is_not_penalized() {
        let pb = PenaltyBox::new();
        assert!(pb.wait("uri", "kid").is_ok());
    }

    #[test]
    fn failed_attempt_blocks_until_cooldown_elapses() {
        let pb = PenaltyBox::with_duration(Duration::from_millis(50));
        pb.register_failed_attempt("uri", "kid");
        assert!(pb.wait("uri", "kid").is_err());
        std::thread::sleep(Duration::from_millis(60));
        assert!(pb.wait("uri", "kid").is_ok());
    }

    #[test]
    fn success_clears_the_penalty() {
        let pb = PenaltyBox::with_duration(Duration::from_secs(10));
        pb.register_failed_attempt("uri", "kid");
        pb.register_successful_attempt("uri", "kid");
        assert!(pb.wait("uri", "kid").is_ok());
    }

    #[test]
    fn penalty_is_scoped_per_kid() {
        let pb = PenaltyBox::with_duration(Duration::from_secs(10));
        pb.register_failed_attempt("uri", "kid-a");
        assert!(pb.wait("uri", "kid-b").is_ok());
    }

    #[test]
    fn release_uri_clears_all_kids_for_that_uri() {
        let pb = PenaltyBox::with_duration(Duration::from_secs(10));
        pb.register_failed_attempt("uri", "a");
        pb.register_failed_attempt("uri", "b");
        pb.release_uri("uri");
        assert!(pb.wait("uri", "a").is_ok());
        assert!(pb.wait("uri", "b").is_ok());
    }
}

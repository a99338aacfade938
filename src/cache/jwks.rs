//! A per-URI JWKS cache with single-flight fetch coordination.
//!
//! At most one outbound fetch per URI runs at a time: concurrent callers
//! that miss the cache all wait on the same [`tokio::sync::Mutex`] and, on
//! waking, re-check the cache before fetching again. A failed fetch leaves
//! the cache empty and the mutex unlocked, so the very next caller may
//! retry immediately.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{JwksCacheError, KidNotFoundInJwksError};
use crate::fetch::JwksFetcher;
use crate::jwk::{find_jwk_in_jwks, Jwk, JwkSet};
use crate::jwt::DecomposedJwt;
use crate::penalty_box::PenaltyBox;

fn kid_not_found(uri: &str, kid: &str) -> JwksCacheError {
    JwksCacheError::KidNotFound(KidNotFoundInJwksError { uri: Some(uri.to_string()), kid: kid.to_string() })
}

struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// Caches JWKS bodies by URI, fetching through a [`JwksFetcher`] on miss and
/// cooperating with a [`PenaltyBox`] to throttle repeated kid-misses.
pub struct JwksCache {
    entries: DashMap<String, CachedJwks>,
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
    fetcher: Arc<dyn JwksFetcher>,
    penalty_box: Arc<PenaltyBox>,
}

impl JwksCache {
    /// Build a cache around `fetcher`, sharing `penalty_box` with whatever
    /// else throttles the same kids (the key-object cache does not need
    /// one; provider facades share one box across their issuer entries).
    pub fn new(fetcher: Arc<dyn JwksFetcher>, penalty_box: Arc<PenaltyBox>) -> Self {
        Self { entries: DashMap::new(), inflight: DashMap::new(), fetcher, penalty_box }
    }

    /// Seed the cache for `uri` directly, without fetching.
    pub fn add_jwks(&self, uri: &str, jwks: JwkSet) {
        self.entries.insert(uri.to_string(), CachedJwks { jwks, fetched_at: Instant::now() });
    }

    /// Drop the cached JWKS for `uri`, forcing the next lookup to fetch.
    pub fn invalidate(&self, uri: &str) {
        self.entries.remove(uri);
    }

    /// When the currently-cached JWKS for `uri` was fetched or seeded, if
    /// anything is cached for it.
    pub fn cached_since(&self, uri: &str) -> Option<Instant> {
        self.entries.get(uri).map(|e| e.fetched_at)
    }

    /// Return the cached JWKS for `uri`, fetching it if necessary. Multiple
    /// concurrent calls for the same `uri` share one outbound fetch.
    pub async fn get_jwks(&self, uri: &str) -> Result<JwkSet, JwksCacheError> {
        if let Some(entry) = self.entries.get(uri) {
            return Ok(entry.jwks.clone());
        }

        let lock = self
            .inflight
            .entry(uri.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // The mutex holder that won the race already populated the cache.
        if let Some(entry) = self.entries.get(uri) {
            return Ok(entry.jwks.clone());
        }

        tracing::debug!(uri, "jwks cache miss, fetching");
        let bytes = self.fetcher.fetch(uri).await.inspect_err(|e| {
            tracing::warn!(uri, error = %e, "jwks fetch failed");
        })?;
        let jwks: JwkSet =
            serde_json::from_slice(&bytes).map_err(|e| JwksCacheError::Malformed(format!("invalid JWKS JSON: {e}")))?;
        self.add_jwks(uri, jwks.clone());
        Ok(jwks)
    }

    /// Return the JWK matching `decomposed`'s `kid` from whatever is
    /// already cached for `uri`, without fetching.
    pub fn get_cached_jwk(&self, uri: &str, decomposed: &DecomposedJwt) -> Result<Jwk, JwksCacheError> {
        let kid = decomposed.header.kid.as_deref().ok_or(JwksCacheError::MissingKid)?;
        let entry = self
            .entries
            .get(uri)
            .ok_or_else(|| JwksCacheError::NotAvailableInCache { uri: uri.to_string() })?;
        find_jwk_in_jwks(&entry.jwks, kid).cloned().ok_or_else(|| kid_not_found(uri, kid))
    }

    /// Resolve the JWK matching `decomposed`'s `kid`, fetching and
    /// penalty-boxing as needed.
    pub async fn get_jwk(&self, uri: &str, decomposed: &DecomposedJwt) -> Result<Jwk, JwksCacheError> {
        let kid = decomposed.header.kid.as_deref().ok_or(JwksCacheError::MissingKid)?;

        if let Some(entry) = self.entries.get(uri) {
            if let Some(jwk) = find_jwk_in_jwks(&entry.jwks, kid) {
                return Ok(jwk.clone());
            }
        }

        self.penalty_box.wait(uri, kid)?;

        let jwks = self.get_jwks(uri).await?;
        match find_jwk_in_jwks(&jwks, kid) {
            Some(jwk) => {
                self.penalty_box.register_successful_attempt(uri, kid);
                Ok(jwk.clone())
            }
            None => {
                self.penalty_box.register_failed_attempt(uri, kid);
                Err(kid_not_found(uri, kid))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jsonwebtoken::jwk::{CommonParameters, KeyAlgorithm, RSAKeyParameters, RSAKeyType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rsa_jwk(kid: &str) -> Jwk {
        Jwk {
            common: CommonParameters {
                public_key_use: None,
                key_operations: None,
                key_algorithm: Some(KeyAlgorithm::RS256),
                key_id: Some(kid.to_string()),
                x509_url: None,
                x509_chain: None,
                x509_sha1_fingerprint: None,
                x509_sha256_fingerprint: None,
            },
            algorithm: crate::jwk::AlgorithmParameters::RSA(RSAKeyParameters {
                key_type: RSAKeyType::RSA,
                n: "n".into(),
                e: "AQAB".into(),
            }),
        }
    }

    struct CountingFetcher {
        calls: AtomicUsize,
        body: Vec<u8>,
    }

    #[async_trait]
    impl JwksFetcher for CountingFetcher {
        async fn fetch(&self, _uri: &str) -> Result<Vec<u8>, crate::error::FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn decomposed(kid: &str) -> DecomposedJwt {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let header = format!(r#"{{"alg":"RS256","kid":"{kid}"}}"#);
        let token = format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.as_bytes()),
            URL_SAFE_NO_PAD.encode(b"{}"),
            URL_SAFE_NO_PAD.encode(b"sig")
        );
        crate::jwt::decompose_unverified_jwt(&token).unwrap()
    }

    #[tokio::test]
    async fn fetches_on_miss_and_caches() {
        let jwks = JwkSet { keys: vec![rsa_jwk("a")] };
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0), body: serde_json::to_vec(&jwks).unwrap() });
        let cache = JwksCache::new(fetcher.clone(), Arc::new(PenaltyBox::new()));

        let found = cache.get_jwk("https://x", &decomposed("a")).await.unwrap();
        assert_eq!(found.common.key_id.as_deref(), Some("a"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(cache.cached_since("https://x").is_some());

        cache.get_jwk("https://x", &decomposed("a")).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1, "second call should be a cache hit");
    }

    #[tokio::test]
    async fn concurrent_misses_trigger_one_fetch() {
        let jwks = JwkSet { keys: vec![rsa_jwk("a")] };
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0), body: serde_json::to_vec(&jwks).unwrap() });
        let cache = Arc::new(JwksCache::new(fetcher.clone(), Arc::new(PenaltyBox::new())));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get_jwk("https://x", &decomposed("a")).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_kid_arms_the_penalty_box() {
        let jwks = JwkSet { keys: vec![] };
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0), body: serde_json::to_vec(&jwks).unwrap() });
        let penalty_box = Arc::new(PenaltyBox::with_duration(std::time::Duration::from_secs(30)));
        let cache = JwksCache::new(fetcher.clone(), penalty_box.clone());

        assert!(cache.get_jwk("https://x", &decomposed("missing")).await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        // Second attempt should be throttled without a second fetch.
        assert!(cache.get_jwk("https://x", &decomposed("missing")).await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sync_path_fails_closed_on_cold_cache() {
        let fetcher = Arc::new(CountingFetcher { calls: AtomicUsize::new(0), body: b"{}".to_vec() });
        let cache = JwksCache::new(fetcher, Arc::new(PenaltyBox::new()));
        let err = cache.get_cached_jwk("https://x", &decomposed("a")).unwrap_err();
        assert!(matches!(err, JwksCacheError::NotAvailableInCache { .. }));
    }
}

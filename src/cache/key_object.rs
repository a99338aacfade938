//! Bounded LRU cache of imported key handles, keyed by `(issuer, kid, alg)`.
//!
//! Importing a JWK into a backend-native key object is the one step in the
//! verification pipeline expensive enough to cache on its own, independent
//! of the JWKS body cache: the same JWKS fetch can serve many tokens, and
//! this avoids re-parsing the same RSA/EC/OKP key material on every one of
//! them.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::crypto::{CryptoAdapter, KeyHandle, SigningAlg};
use crate::error::CryptoError;
use crate::jwk::Jwk;

/// Default capacity, generous enough for a handful of issuers rotating a
/// handful of keys each without ever evicting a key still in active use.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    issuer: String,
    kid: String,
    alg: SigningAlg,
}

/// Caches [`KeyHandle`]s produced by a [`CryptoAdapter`].
pub struct KeyObjectCache {
    inner: Mutex<LruCache<Key, Arc<KeyHandle>>>,
    adapter: Arc<dyn CryptoAdapter>,
}

impl KeyObjectCache {
    /// Build a cache of `capacity` entries around `adapter`.
    pub fn new(adapter: Arc<dyn CryptoAdapter>, capacity: NonZeroUsize) -> Self {
        Self { inner: Mutex::new(LruCache::new(capacity)), adapter }
    }

    /// Build a cache using [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity(adapter: Arc<dyn CryptoAdapter>) -> Self {
        Self::new(adapter, NonZeroUsize::new(DEFAULT_CAPACITY).expect("DEFAULT_CAPACITY is nonzero"))
    }

    /// Import (or return the cached import of) `jwk` for use with `alg`,
    /// under `issuer`'s cache partition. A JWK with no `kid`, or a request
    /// made with no issuer context, bypasses the cache entirely.
    pub fn transform(&self, jwk: &Jwk, alg: SigningAlg, issuer: Option<&str>) -> Result<Arc<KeyHandle>, CryptoError> {
        let (Some(issuer), Some(kid)) = (issuer, jwk.common.key_id.as_deref()) else {
            return Ok(Arc::new(self.adapter.import_key(jwk, alg)?));
        };
        let key = Key { issuer: issuer.to_string(), kid: kid.to_string(), alg };

        if let Some(cached) = self.inner.lock().get(&key) {
            return Ok(cached.clone());
        }

        let handle = Arc::new(self.adapter.import_key(jwk, alg)?);
        self.inner.lock().put(key, handle.clone());
        Ok(handle)
    }

    /// Asynchronous variant of [`KeyObjectCache::transform`], running the
    /// (CPU-bound, not actually async) import on a blocking thread so a
    /// slow key-import backend can't stall the async runtime.
    pub async fn transform_async(self: &Arc<Self>, jwk: Jwk, alg: SigningAlg, issuer: Option<String>) -> Result<Arc<KeyHandle>, CryptoError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.transform(&jwk, alg, issuer.as_deref()))
            .await
            .map_err(|e| CryptoError::Backend(e.to_string()))?
    }

    /// Evict every cached key object for `issuer`, e.g. after the caller
    /// rotates that issuer's JWKS out of band.
    pub fn clear_issuer(&self, issuer: &str) {
        let mut guard = self.inner.lock();
        let stale: Vec<Key> = guard.iter().filter(|(k, _)| k.issuer == issuer).map(|(k, _)| k.clone()).collect();
        for key in stale {
            guard.pop(&key);
        }
    }
}

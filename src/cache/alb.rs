//! The AWS ALB key cache: one PEM-encoded EC public key per `kid`, fetched
//! from a per-key endpoint rather than a single JWKS document.
//!
//! This reuses [`JwksCache`]'s single-flight and penalty-box machinery by
//! wrapping the caller's [`JwksFetcher`] in [`AlbPemFetcher`], which fetches
//! the PEM body and repackages it as a one-key [`JwkSet`] — from there on,
//! it's an ordinary JWKS cache keyed by `{base_uri}/{kid}`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::{CommonParameters, EllipticCurve, EllipticCurveKeyParameters, EllipticCurveKeyType, KeyAlgorithm};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;

use crate::error::{FetchError, JwksCacheError};
use crate::fetch::JwksFetcher;
use crate::jwk::{AlgorithmParameters, Jwk, JwkSet, PublicKeyUse};
use crate::jwt::DecomposedJwt;
use crate::penalty_box::PenaltyBox;

use super::jwks::JwksCache;

struct AlbPemFetcher {
    inner: Arc<dyn JwksFetcher>,
}

#[async_trait]
impl JwksFetcher for AlbPemFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        let pem_bytes = self.inner.fetch(uri).await?;
        let pem = String::from_utf8(pem_bytes).map_err(|e| FetchError::Retryable(e.to_string()))?;
        let kid = uri.rsplit('/').next().unwrap_or_default();
        let jwk = pem_to_jwk(&pem, kid).map_err(FetchError::Retryable)?;
        serde_json::to_vec(&JwkSet { keys: vec![jwk] }).map_err(|e| FetchError::Retryable(e.to_string()))
    }
}

/// Convert an ALB-issued SEC1/PKIX EC public key PEM into a single JWK,
/// assigning it `kid`.
fn pem_to_jwk(pem: &str, kid: &str) -> Result<Jwk, String> {
    let public_key = p256::PublicKey::from_public_key_pem(pem).map_err(|e| e.to_string())?;
    let point = public_key.to_encoded_point(false);
    let x = point.x().ok_or("encoded point has no x coordinate")?;
    let y = point.y().ok_or("encoded point has no y coordinate")?;

    Ok(Jwk {
        common: CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_operations: None,
            key_algorithm: Some(KeyAlgorithm::ES256),
            key_id: Some(kid.to_string()),
            x509_url: None,
            x509_chain: None,
            x509_sha1_fingerprint: None,
            x509_sha256_fingerprint: None,
        },
        algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
            key_type: EllipticCurveKeyType::EC,
            curve: EllipticCurve::P256,
            x: URL_SAFE_NO_PAD.encode(x),
            y: URL_SAFE_NO_PAD.encode(y),
        }),
    })
}

/// JWKS cache variant for AWS ALB: keys are fetched one at a time from
/// `{base_uri}/{kid}` and there is no bulk listing endpoint.
pub struct AlbJwksCache {
    inner: JwksCache,
}

impl AlbJwksCache {
    /// Build a cache that fetches PEM keys through `fetcher`.
    pub fn new(fetcher: Arc<dyn JwksFetcher>, penalty_box: Arc<PenaltyBox>) -> Self {
        Self { inner: JwksCache::new(Arc::new(AlbPemFetcher { inner: fetcher }), penalty_box) }
    }

    /// Seed the cache for `kid` with an already-fetched single-key JWKS.
    /// Enforces the ALB invariant that exactly one key is ever associated
    /// with a given `kid`.
    pub fn add_jwks(&self, base_uri: &str, kid: &str, jwks: JwkSet) -> Result<(), JwksCacheError> {
        if jwks.keys.len() != 1 {
            return Err(JwksCacheError::Malformed(format!(
                "ALB JWKS for kid {kid:?} must contain exactly one key, found {}",
                jwks.keys.len()
            )));
        }
        self.inner.add_jwks(&alb_uri(base_uri, kid), jwks);
        Ok(())
    }

    /// Resolve the JWK for `decomposed`'s `kid`, fetching it from
    /// `{base_uri}/{kid}` if necessary.
    pub async fn get_jwk(&self, base_uri: &str, decomposed: &DecomposedJwt) -> Result<Jwk, JwksCacheError> {
        let kid = decomposed.header.kid.as_deref().ok_or(JwksCacheError::MissingKid)?;
        self.inner.get_jwk(&alb_uri(base_uri, kid), decomposed).await
    }

    /// Resolve the JWK for `decomposed`'s `kid` from cache only.
    pub fn get_cached_jwk(&self, base_uri: &str, decomposed: &DecomposedJwt) -> Result<Jwk, JwksCacheError> {
        let kid = decomposed.header.kid.as_deref().ok_or(JwksCacheError::MissingKid)?;
        self.inner.get_cached_jwk(&alb_uri(base_uri, kid), decomposed)
    }

    /// ALB has no bulk JWKS endpoint; always fails.
    pub fn get_jwks(&self, _base_uri: &str) -> Result<JwkSet, JwksCacheError> {
        Err(JwksCacheError::AlbBulkFetchNotSupported)
    }
}

fn alb_uri(base_uri: &str, kid: &str) -> String {
    format!("{}/{kid}", base_uri.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alb_uri_joins_base_and_kid() {
        assert_eq!(alb_uri("https://x.example/keys", "abc"), "https://x.example/keys/abc");
        assert_eq!(alb_uri("https://x.example/keys/", "abc"), "https://x.example/keys/abc");
    }

    #[test]
    fn add_jwks_rejects_multi_key_sets() {
        let fetcher: Arc<dyn JwksFetcher> = Arc::new(crate::fetch::ReqwestFetcher::new());
        let cache = AlbJwksCache::new(fetcher, Arc::new(PenaltyBox::new()));
        let err = cache.add_jwks("https://x", "kid", JwkSet { keys: vec![] }).unwrap_err();
        assert!(matches!(err, JwksCacheError::Malformed(_)));
    }

    #[test]
    fn pem_to_jwk_rejects_garbage_pem() {
        assert!(pem_to_jwk("not a pem", "kid").is_err());
    }
}

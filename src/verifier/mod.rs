//! Verifier builders and the two verifier shapes they produce.
//!
//! The source this crate is modeled on represented "one issuer" and "many
//! issuers" with a boolean flag on a single verifier type. Here they are
//! two distinct builder methods returning two distinct concrete types —
//! [`SingleIssuerVerifier`] and [`MultiIssuerVerifier`] — so a caller can
//! never construct a verifier that is ambiguous about which mode it's in,
//! and so `cache_jwks`'s signature (no issuer argument vs. a required one)
//! is enforced by the type system instead of by a runtime check.

pub(crate) mod core;
mod custom_check;

pub use custom_check::{AsyncCustomCheck, CustomCheck, CustomCheckContext, CustomCheckKind};

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::CryptoAdapter;
use crate::error::VerifyError;
use crate::fetch::{JwksFetcher, ReqwestFetcher};
use crate::jwk::JwkSet;
use crate::jwt::{decompose_unverified_jwt, ClaimOptions, Expectation};
use crate::penalty_box::PenaltyBox;

use self::core::{CoreContext, IssuerEntry};

/// Shared configuration for both verifier shapes. Build with
/// [`JwtVerifierBuilder::new`], then finish with either
/// [`JwtVerifierBuilder::build_single`] or [`JwtVerifierBuilder::build_multi`].
pub struct JwtVerifierBuilder {
    fetcher: Arc<dyn JwksFetcher>,
    crypto: Arc<dyn CryptoAdapter>,
    penalty_box: Arc<PenaltyBox>,
    key_cache_capacity: NonZeroUsize,
    audience: Expectation<Vec<String>>,
    scope: Expectation<Vec<String>>,
    grace: Duration,
    include_raw_jwt_in_errors: bool,
    custom_check: Option<CustomCheckKind>,
}

impl Default for JwtVerifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtVerifierBuilder {
    /// A builder with this crate's defaults: a `reqwest`-backed fetcher, the
    /// `jsonwebtoken`-backed crypto adapter, a 10-second penalty box, and a
    /// 64-entry key-object cache.
    pub fn new() -> Self {
        Self {
            fetcher: Arc::new(ReqwestFetcher::new()),
            crypto: core::default_crypto_adapter(),
            penalty_box: Arc::new(PenaltyBox::new()),
            key_cache_capacity: NonZeroUsize::new(crate::cache::DEFAULT_CAPACITY).expect("nonzero"),
            audience: Expectation::Skip,
            scope: Expectation::Skip,
            grace: Duration::ZERO,
            include_raw_jwt_in_errors: false,
            custom_check: None,
        }
    }

    /// Replace the JWKS/PEM fetcher.
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn JwksFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the signature-verification backend.
    #[must_use]
    pub fn crypto_adapter(mut self, crypto: Arc<dyn CryptoAdapter>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Set how long a kid-miss penalizes further fetches for that kid.
    #[must_use]
    pub fn penalty_box_duration(mut self, duration: Duration) -> Self {
        self.penalty_box = Arc::new(PenaltyBox::with_duration(duration));
        self
    }

    /// Set the key-object cache's capacity.
    #[must_use]
    pub fn key_cache_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.key_cache_capacity = capacity;
        self
    }

    /// Require `aud` to overlap `audience`.
    #[must_use]
    pub fn audience(mut self, audience: impl IntoIterator<Item = String>) -> Self {
        self.audience = Expectation::Required(audience.into_iter().collect());
        self
    }

    /// Require `scope` to overlap `scope`.
    #[must_use]
    pub fn scope(mut self, scope: impl IntoIterator<Item = String>) -> Self {
        self.scope = Expectation::Required(scope.into_iter().collect());
        self
    }

    /// Extra tolerance applied to `exp`/`nbf` comparisons.
    #[must_use]
    pub fn grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Attach the decoded header/payload to claim-validation errors (never
    /// to parse or signature errors, since those precede signature
    /// verification).
    #[must_use]
    pub fn include_raw_jwt_in_errors(mut self, include: bool) -> Self {
        self.include_raw_jwt_in_errors = include;
        self
    }

    /// Install a synchronous custom check, usable from both `verify()` and
    /// `verify_sync()`.
    #[must_use]
    pub fn with_custom_check(mut self, check: Arc<dyn CustomCheck>) -> Self {
        self.custom_check = Some(CustomCheckKind::Sync(check));
        self
    }

    /// Install an asynchronous custom check, usable only from `verify()`.
    #[must_use]
    pub fn with_async_custom_check(mut self, check: Arc<dyn AsyncCustomCheck>) -> Self {
        self.custom_check = Some(CustomCheckKind::Async(check));
        self
    }

    fn build_entry(&self, issuer: String, jwks_uri: String) -> IssuerEntry {
        let verify_options = ClaimOptions {
            issuer: Expectation::Required(vec![issuer.clone()]),
            audience: self.audience.clone(),
            scope: self.scope.clone(),
            grace: self.grace,
        };
        IssuerEntry::new(issuer, jwks_uri, verify_options, self.fetcher.clone(), self.penalty_box.clone(), self.crypto.clone(), self.key_cache_capacity)
    }

    /// Build a verifier for exactly one issuer/JWKS pair.
    pub fn build_single(self, issuer: impl Into<String>, jwks_uri: impl Into<String>) -> SingleIssuerVerifier {
        let entry = self.build_entry(issuer.into(), jwks_uri.into());
        SingleIssuerVerifier { entry, crypto: self.crypto, custom_check: self.custom_check, include_raw_jwt_in_errors: self.include_raw_jwt_in_errors }
    }

    /// Build a verifier over several issuer/JWKS pairs; the issuer is
    /// resolved per-token from its `iss` claim. Fails if any issuer is
    /// registered twice.
    pub fn build_multi(self, issuers: impl IntoIterator<Item = (String, String)>) -> Result<MultiIssuerVerifier, VerifyError> {
        let mut entries = HashMap::new();
        for (issuer, jwks_uri) in issuers {
            if entries.contains_key(&issuer) {
                return Err(VerifyError::ParameterValidation(format!("issuer {issuer:?} registered more than once")));
            }
            entries.insert(issuer.clone(), self.build_entry(issuer, jwks_uri));
        }
        if entries.is_empty() {
            return Err(VerifyError::ParameterValidation("at least one issuer is required".to_string()));
        }
        Ok(MultiIssuerVerifier { entries, crypto: self.crypto, custom_check: self.custom_check, include_raw_jwt_in_errors: self.include_raw_jwt_in_errors })
    }
}

/// Verifies JWTs issued by exactly one issuer, against exactly one JWKS.
pub struct SingleIssuerVerifier {
    entry: IssuerEntry,
    crypto: Arc<dyn CryptoAdapter>,
    custom_check: Option<CustomCheckKind>,
    include_raw_jwt_in_errors: bool,
}

impl SingleIssuerVerifier {
    /// The configured issuer.
    pub fn issuer(&self) -> &str {
        &self.entry.issuer
    }

    /// The configured JWKS URI.
    pub fn jwks_uri(&self) -> &str {
        &self.entry.jwks_uri
    }

    /// Seed the JWKS cache directly, e.g. with a bundled or pre-fetched key
    /// set, bypassing the HTTP fetcher.
    pub fn cache_jwks(&self, jwks: JwkSet) {
        self.entry.jwks_cache.add_jwks(&self.entry.jwks_uri, jwks);
    }

    /// Verify `token`, fetching the JWKS (and penalty-boxing kid-misses) as
    /// needed.
    pub async fn verify(&self, token: &str) -> Result<crate::jwt::JwtPayload, VerifyError> {
        let decomposed = decompose_unverified_jwt(token)?;
        let ctx = CoreContext::for_entry(&self.entry, self.crypto.as_ref(), self.include_raw_jwt_in_errors);
        core::finish_async(&ctx, decomposed, None, self.custom_check.as_ref()).await
    }

    /// Verify `token` using only whatever is already cached. Never makes a
    /// network call; fails with [`VerifyError::JwksCache`] on a cold cache
    /// rather than blocking.
    pub fn verify_sync(&self, token: &str) -> Result<crate::jwt::JwtPayload, VerifyError> {
        let decomposed = decompose_unverified_jwt(token)?;
        let ctx = CoreContext::for_entry(&self.entry, self.crypto.as_ref(), self.include_raw_jwt_in_errors);
        core::finish_sync(&ctx, decomposed, None, self.custom_check.as_ref())
    }
}

/// Verifies JWTs issued by any of several registered issuers, resolving
/// which issuer/JWKS pair applies from each token's `iss` claim.
pub struct MultiIssuerVerifier {
    entries: HashMap<String, IssuerEntry>,
    crypto: Arc<dyn CryptoAdapter>,
    custom_check: Option<CustomCheckKind>,
    include_raw_jwt_in_errors: bool,
}

impl MultiIssuerVerifier {
    /// The registered issuers.
    pub fn issuers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Seed the JWKS cache for `issuer` directly. Fails if `issuer` was not
    /// registered at build time.
    pub fn cache_jwks(&self, issuer: &str, jwks: JwkSet) -> Result<(), VerifyError> {
        let entry = self
            .entries
            .get(issuer)
            .ok_or_else(|| VerifyError::ParameterValidation(format!("issuer {issuer:?} is not registered")))?;
        entry.jwks_cache.add_jwks(&entry.jwks_uri, jwks);
        Ok(())
    }

    fn resolve(&self, payload: &crate::jwt::JwtPayload) -> Result<&IssuerEntry, VerifyError> {
        let iss = payload.iss.as_deref().ok_or_else(|| {
            VerifyError::Claim(crate::error::ClaimError::new(crate::error::ClaimErrorKind::InvalidIssuer {
                failed: crate::assert::FailedAssertion::new("iss", "<missing>", "one of the registered issuers"),
            }))
        })?;
        self.entries.get(iss).ok_or_else(|| {
            VerifyError::Claim(crate::error::ClaimError::new(crate::error::ClaimErrorKind::InvalidIssuer {
                failed: crate::assert::FailedAssertion::new("iss", iss, "one of the registered issuers"),
            }))
        })
    }

    /// Verify `token`, resolving its issuer from `iss` and fetching that
    /// issuer's JWKS as needed.
    pub async fn verify(&self, token: &str) -> Result<crate::jwt::JwtPayload, VerifyError> {
        let decomposed = decompose_unverified_jwt(token)?;
        let entry = self.resolve(&decomposed.payload)?;
        let ctx = CoreContext::for_entry(entry, self.crypto.as_ref(), self.include_raw_jwt_in_errors);
        core::finish_async(&ctx, decomposed, None, self.custom_check.as_ref()).await
    }

    /// Verify `token` using only whatever is already cached for its
    /// resolved issuer.
    pub fn verify_sync(&self, token: &str) -> Result<crate::jwt::JwtPayload, VerifyError> {
        let decomposed = decompose_unverified_jwt(token)?;
        let entry = self.resolve(&decomposed.payload)?;
        let ctx = CoreContext::for_entry(entry, self.crypto.as_ref(), self.include_raw_jwt_in_errors);
        core::finish_sync(&ctx, decomposed, None, self.custom_check.as_ref())
    }
}

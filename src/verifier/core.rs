//! The verification pipeline shared by every public verifier type:
//! resolve a key, check the header against it, check the signature, check
//! claims, run an optional provider-specific claim check, then an optional
//! caller-supplied custom check.
//!
//! This is deliberately one straight-line function per entry point rather
//! than a generic state-machine type — every step either returns early with
//! a typed error or advances, which is the whole "state machine" the
//! module-level docs describe.

use std::sync::Arc;
use std::time::SystemTime;

use crate::cache::{JwksCache, KeyObjectCache};
use crate::crypto::{signing_alg_from_key_algorithm, CryptoAdapter, SigningAlg};
use crate::error::{ClaimError, RawJwt, VerifyError};
use crate::jwk::{assert_is_signature_jwk, Jwk};
use crate::jwt::{validate_claims, ClaimOptions, DecomposedJwt, JwtHeader, JwtPayload};

use super::custom_check::{CustomCheckContext, CustomCheckKind};

/// One registered issuer: its expected issuer string, its JWKS (or ALB PEM
/// base) URI, its claim options, and its own JWKS/key-object caches.
/// Shared by the generic verifiers and the Cognito/ALB provider facades.
pub(crate) struct IssuerEntry {
    pub issuer: String,
    pub jwks_uri: String,
    pub verify_options: ClaimOptions,
    pub jwks_cache: JwksCache,
    pub key_cache: KeyObjectCache,
}

impl IssuerEntry {
    pub fn new(
        issuer: String,
        jwks_uri: String,
        verify_options: ClaimOptions,
        fetcher: Arc<dyn crate::fetch::JwksFetcher>,
        penalty_box: Arc<crate::penalty_box::PenaltyBox>,
        crypto: Arc<dyn CryptoAdapter>,
        key_cache_capacity: std::num::NonZeroUsize,
    ) -> Self {
        Self {
            issuer,
            jwks_uri,
            verify_options,
            jwks_cache: JwksCache::new(fetcher, penalty_box),
            key_cache: KeyObjectCache::new(crypto, key_cache_capacity),
        }
    }
}

/// Everything `finish_sync`/`finish_async` need to resolve a key and check
/// claims for one issuer entry.
pub(crate) struct CoreContext<'a> {
    pub jwks_cache: &'a JwksCache,
    pub key_cache: &'a KeyObjectCache,
    pub crypto: &'a dyn CryptoAdapter,
    pub jwks_uri: &'a str,
    pub issuer: &'a str,
    pub verify_options: &'a ClaimOptions,
    pub include_raw_jwt_in_errors: bool,
}

impl<'a> CoreContext<'a> {
    pub fn for_entry(entry: &'a IssuerEntry, crypto: &'a dyn CryptoAdapter, include_raw_jwt_in_errors: bool) -> Self {
        Self {
            jwks_cache: &entry.jwks_cache,
            key_cache: &entry.key_cache,
            crypto,
            jwks_uri: &entry.jwks_uri,
            issuer: &entry.issuer,
            verify_options: &entry.verify_options,
            include_raw_jwt_in_errors,
        }
    }
}

pub(crate) type ProviderCheck<'a> = dyn Fn(&JwtHeader, &JwtPayload) -> Result<(), ClaimError> + Sync + 'a;

pub(crate) fn attach_raw(mut err: ClaimError, decomposed: &DecomposedJwt, include_raw: bool) -> VerifyError {
    if include_raw {
        err = err.with_raw(RawJwt { header: decomposed.header.clone(), payload: decomposed.payload.clone() });
    }
    VerifyError::Claim(err)
}

pub(crate) fn check_header_against_jwk(header: &JwtHeader, jwk: &Jwk) -> Result<SigningAlg, VerifyError> {
    assert_is_signature_jwk(jwk)?;

    let header_alg = SigningAlg::from_header_alg(&header.alg).ok_or_else(|| VerifyError::InvalidSignatureAlgorithm {
        failed: crate::assert::FailedAssertion::new("alg", &header.alg, "a supported signature algorithm"),
    })?;

    if let Some(jwk_alg) = jwk.common.key_algorithm {
        if signing_alg_from_key_algorithm(jwk_alg) != Some(header_alg) {
            return Err(VerifyError::InvalidSignatureAlgorithm {
                failed: crate::assert::FailedAssertion::new("alg", &header.alg, format!("{jwk_alg:?} (the JWK's declared alg)")),
            });
        }
    }

    Ok(header_alg)
}

/// Run every check from signature verification onward against an
/// already-resolved JWK. Shared by the generic `JwksCache`-backed pipeline
/// below and by the ALB facade, which resolves its JWK through
/// [`crate::cache::AlbJwksCache`] instead.
pub(crate) fn run_pipeline_up_to_custom_check(
    key_cache: &KeyObjectCache,
    crypto: &dyn CryptoAdapter,
    issuer: &str,
    verify_options: &ClaimOptions,
    include_raw_jwt_in_errors: bool,
    decomposed: &DecomposedJwt,
    jwk: &Jwk,
    provider_check: Option<&ProviderCheck<'_>>,
    custom_check: Option<&CustomCheckKind>,
) -> Result<JwtPayload, VerifyError> {
    let alg = check_header_against_jwk(&decomposed.header, jwk)?;
    let key = key_cache.transform(jwk, alg, Some(issuer))?;

    let signing_input = decomposed.signing_input();
    let ok = crypto.verify(&signing_input, &decomposed.signature, alg, &key)?;
    if !ok {
        return Err(VerifyError::InvalidSignature);
    }

    validate_claims(&decomposed.payload, verify_options, SystemTime::now()).map_err(|e| attach_raw(e, decomposed, include_raw_jwt_in_errors))?;

    if let Some(check) = provider_check {
        check(&decomposed.header, &decomposed.payload).map_err(|e| attach_raw(e, decomposed, include_raw_jwt_in_errors))?;
    }

    if let Some(CustomCheckKind::Sync(cb)) = custom_check {
        let cc_ctx = CustomCheckContext { header: &decomposed.header, payload: &decomposed.payload, jwk };
        cb.check(&cc_ctx)?;
    }

    Ok(decomposed.payload.clone())
}

/// Resolve the key asynchronously (fetching the JWKS if needed), then run
/// the synchronous checks, then — if the configured custom check is async —
/// await it.
pub(crate) async fn finish_async(
    ctx: &CoreContext<'_>,
    decomposed: DecomposedJwt,
    provider_check: Option<&ProviderCheck<'_>>,
    custom_check: Option<&CustomCheckKind>,
) -> Result<JwtPayload, VerifyError> {
    let jwk = ctx.jwks_cache.get_jwk(ctx.jwks_uri, &decomposed).await?;
    let payload = run_pipeline_up_to_custom_check(
        ctx.key_cache,
        ctx.crypto,
        ctx.issuer,
        ctx.verify_options,
        ctx.include_raw_jwt_in_errors,
        &decomposed,
        &jwk,
        provider_check,
        custom_check,
    )?;

    if let Some(CustomCheckKind::Async(cb)) = custom_check {
        let cc_ctx = CustomCheckContext { header: &decomposed.header, payload: &decomposed.payload, jwk: &jwk };
        cb.check(&cc_ctx).await?;
    }

    Ok(payload)
}

/// Resolve the key from whatever is already cached and run every
/// synchronous check. Fails immediately — with
/// [`VerifyError::ParameterValidation`], not a hang — if the verifier was
/// configured with an async custom check, since there is nothing this
/// function can `.await`.
pub(crate) fn finish_sync(
    ctx: &CoreContext<'_>,
    decomposed: DecomposedJwt,
    provider_check: Option<&ProviderCheck<'_>>,
    custom_check: Option<&CustomCheckKind>,
) -> Result<JwtPayload, VerifyError> {
    if matches!(custom_check, Some(CustomCheckKind::Async(_))) {
        return Err(VerifyError::ParameterValidation(
            "this verifier has an async custom check configured; call verify() instead of verify_sync()".to_string(),
        ));
    }

    let jwk = ctx.jwks_cache.get_cached_jwk(ctx.jwks_uri, &decomposed)?;
    run_pipeline_up_to_custom_check(
        ctx.key_cache,
        ctx.crypto,
        ctx.issuer,
        ctx.verify_options,
        ctx.include_raw_jwt_in_errors,
        &decomposed,
        &jwk,
        provider_check,
        custom_check,
    )
}

/// Build a shared key-object cache + crypto adapter pair, the common
/// building blocks every verifier builder assembles.
pub(crate) fn default_crypto_adapter() -> Arc<dyn CryptoAdapter> {
    Arc::new(crate::crypto::JsonWebTokenCryptoAdapter)
}

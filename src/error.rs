//! Error types for the verifier.
//!
//! Every subsystem (JWT parsing, claim validation, JWK handling, JWKS
//! caching, fetch, the penalty box, the crypto adapter) defines its own
//! [`thiserror`]-derived error enum. [`VerifyError`] aggregates them behind
//! `#[from]` so callers can match on one type while each subsystem keeps its
//! own vocabulary.

use crate::assert::FailedAssertion;
use crate::jwt::{JwtHeader, JwtPayload};

/// Result type alias for fallible verifier operations.
pub type Result<T> = std::result::Result<T, VerifyError>;

/// A decomposed-but-unverified JWT, attached to claim errors when the caller
/// opted into `include_raw_jwt_in_errors`.
///
/// Only attached once the signature has already been verified — a raw JWT
/// is never surfaced on a signature or parse failure, since at that point
/// its contents are unauthenticated.
#[derive(Debug, Clone)]
pub struct RawJwt {
    /// The decoded header.
    pub header: JwtHeader,
    /// The decoded payload.
    pub payload: JwtPayload,
}

/// Failure decoding the three-part `header.payload.signature` structure of
/// a JWT, before any cryptographic or claim checks run.
#[derive(Debug, thiserror::Error)]
pub enum JwtParseError {
    /// The token was an empty string.
    #[error("JWT is empty")]
    Empty,
    /// The token is not three base64url segments joined by `.`.
    #[error("JWT is not a well-formed header.payload.signature string")]
    Malformed,
    /// A segment failed base64url decoding.
    #[error("JWT {part} segment is not valid base64url: {source}")]
    Base64 {
        /// Which segment failed (`"header"` or `"payload"`).
        part: &'static str,
        /// The underlying decode error.
        #[source]
        source: base64::DecodeError,
    },
    /// A segment decoded but was not valid JSON.
    #[error("JWT {part} segment is not valid JSON: {source}")]
    Json {
        /// Which segment failed (`"header"` or `"payload"`).
        part: &'static str,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// A segment decoded to JSON that was not an object.
    #[error("JWT {part} segment must decode to a JSON object")]
    NotObject {
        /// Which segment failed (`"header"` or `"payload"`).
        part: &'static str,
    },
}

/// A JWK failed shape or usage validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JwkError {
    /// The JWK did not have the fields its `kty` requires.
    #[error("JWK failed shape validation: {0}")]
    Validation(String),
    /// The JWK's `use` is present and is not `"sig"`.
    #[error("JWK `use` must be \"sig\", found {actual:?}")]
    InvalidUse {
        /// The `use` value actually found.
        actual: String,
    },
    /// The JWK's `kty`/`crv` is not a supported signature key shape.
    #[error("JWK kty/crv {actual} is not a supported signature key shape")]
    InvalidKty {
        /// A description of the unsupported shape.
        actual: String,
    },
    /// No key in the JWKS matched the token's `kid`.
    #[error(transparent)]
    KidNotFound(#[from] KidNotFoundInJwksError),
    /// The token has no `kid` and the JWKS cannot be searched unambiguously.
    #[error("JWT header has no kid and the JWKS holds more than one key")]
    WithoutValidKid,
}

/// No JWK in a JWKS matched the requested `kid`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no JWK with kid {kid:?} found in JWKS at {uri:?}")]
pub struct KidNotFoundInJwksError {
    /// The JWKS URI that was searched, if known.
    pub uri: Option<String>,
    /// The `kid` that was not found.
    pub kid: String,
}

/// A JWKS endpoint (or PEM endpoint) could not be fetched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// A transient failure (network error, timeout, 5xx); retrying later
    /// may succeed.
    #[error("JWKS fetch failed and may be retried: {0}")]
    Retryable(String),
    /// A 4xx response; retrying with the same inputs will not help.
    #[error("JWKS fetch rejected by server (status {status}): {body}")]
    NonRetryable {
        /// The HTTP status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },
}

/// The JWKS cache could not produce a key for a request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JwksCacheError {
    /// The sync (cache-only) path found nothing cached for this URI.
    #[error("no JWKS cached yet for {uri}")]
    NotAvailableInCache {
        /// The JWKS URI that has no cached entry.
        uri: String,
    },
    /// The JWT header has no `kid`.
    #[error("JWT header has no kid")]
    MissingKid,
    /// A fetched JWKS body did not parse into a valid key set, or an ALB
    /// cache was seeded with a JWKS that didn't contain exactly one key.
    #[error("JWKS body is invalid: {0}")]
    Malformed(String),
    /// The ALB cache does not support bulk JWKS fetch; keys are fetched
    /// one at a time, per kid.
    #[error("ALB key distribution has no bulk JWKS endpoint; keys are resolved per kid")]
    AlbBulkFetchNotSupported,
    /// No key in the cached (or freshly fetched) JWKS matched the kid.
    #[error(transparent)]
    KidNotFound(#[from] KidNotFoundInJwksError),
    /// The kid is in the penalty box from a recent miss.
    #[error(transparent)]
    PenaltyBox(#[from] PenaltyBoxError),
    /// The underlying fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// A `(uri, kid)` pair is still serving its penalty-box cooldown after a
/// recent kid-miss.
#[derive(Debug, Clone, thiserror::Error)]
#[error("kid {kid:?} at {uri} is in the penalty box for another {retry_after_ms}ms")]
pub struct PenaltyBoxError {
    /// The JWKS (or PEM) URI.
    pub uri: String,
    /// The kid under cooldown.
    pub kid: String,
    /// Milliseconds remaining before another fetch attempt is allowed.
    pub retry_after_ms: u64,
}

/// The signing-key backend could not import a key or run a verification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CryptoError {
    /// The `alg` is not one this backend implements.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// The JWK's key material could not be imported by the backend.
    #[error("failed to import key material: {0}")]
    KeyImport(String),
    /// The backend itself reported an error while verifying.
    #[error("signature backend error: {0}")]
    Backend(String),
}

/// One recognized claim check failed, attached to the raw JWT if the
/// caller opted in.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}")]
pub struct ClaimError {
    /// Which claim check failed and why.
    pub kind: ClaimErrorKind,
    /// The decomposed token, present only when the signature already
    /// verified and the caller asked for it.
    pub raw: Option<RawJwt>,
}

impl ClaimError {
    /// Build a claim error with no raw JWT attached.
    pub fn new(kind: ClaimErrorKind) -> Self {
        Self { kind, raw: None }
    }

    /// Attach a raw JWT to an existing claim error.
    #[must_use]
    pub fn with_raw(mut self, raw: RawJwt) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// The specific claim check that failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClaimErrorKind {
    /// `exp` (plus grace) is in the past.
    #[error("token has expired: {failed}")]
    Expired {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// `nbf` (minus grace) is in the future.
    #[error("token is not yet valid: {failed}")]
    NotYetValid {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// `iss` did not match any expected issuer.
    #[error("invalid issuer: {failed}")]
    InvalidIssuer {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// `aud` did not overlap the expected audience set.
    #[error("invalid audience: {failed}")]
    InvalidAudience {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// `scope` did not overlap the expected scope set, or was missing.
    #[error("invalid or missing scope: {failed}")]
    InvalidScope {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// An AWS Cognito-specific claim check failed.
    #[error(transparent)]
    Cognito(#[from] CognitoClaimErrorKind),
    /// An AWS ALB-specific claim check failed.
    #[error(transparent)]
    Alb(#[from] AlbClaimErrorKind),
}

/// An AWS Cognito-specific claim check failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CognitoClaimErrorKind {
    /// `token_use` was neither `"id"` nor `"access"`, or didn't match an
    /// explicitly required value.
    #[error("invalid token_use: {failed}")]
    InvalidTokenUse {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// The expected client id was not found in `aud` (id tokens) or
    /// `client_id` (access tokens).
    #[error("invalid client id: {failed}")]
    InvalidClientId {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// `cognito:groups` did not overlap the expected group set.
    #[error("invalid cognito group membership: {failed}")]
    InvalidGroup {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
}

/// An AWS ALB-specific claim check failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AlbClaimErrorKind {
    /// The header's `signer` ARN did not match a registered ALB.
    #[error("invalid ALB signer: {failed}")]
    InvalidSigner {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
    /// The header's `client` did not match an expected client id.
    #[error("invalid ALB client id: {failed}")]
    InvalidClientId {
        /// The assertion that failed.
        failed: FailedAssertion,
    },
}

/// The top-level error returned by every public verification entry point.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The token could not be decomposed into header/payload/signature.
    #[error(transparent)]
    Parse(#[from] JwtParseError),

    /// The header's `alg`, or the JWK's declared `alg`, is not one this
    /// verifier will accept for this key.
    #[error("invalid or mismatched signature algorithm: {failed}")]
    InvalidSignatureAlgorithm {
        /// The assertion that failed.
        failed: FailedAssertion,
    },

    /// The signature did not validate against the resolved key.
    #[error("signature verification failed")]
    InvalidSignature,

    /// A claim failed validation.
    #[error(transparent)]
    Claim(#[from] ClaimError),

    /// The resolved JWK failed shape or usage validation.
    #[error(transparent)]
    Jwk(#[from] JwkError),

    /// The JWKS cache could not produce a key.
    #[error(transparent)]
    JwksCache(#[from] JwksCacheError),

    /// The key is in its penalty-box cooldown.
    #[error(transparent)]
    PenaltyBox(#[from] PenaltyBoxError),

    /// The JWKS (or PEM) endpoint could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The signing-key backend failed to import or use a key.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A caller-supplied parameter (builder option, or a mismatch between
    /// a configured async custom check and the sync verification path) is
    /// invalid.
    #[error("parameter validation failed: {0}")]
    ParameterValidation(String),

    /// A caller-supplied custom check rejected the token.
    #[error("custom check failed: {0}")]
    CustomCheck(#[source] Box<dyn std::error::Error + Send + Sync>),
}

//! JWT verification against JWKS endpoints.
//!
//! This crate checks a JWT's signature against keys published at a JWKS (or,
//! for AWS ALB, a per-key PEM) endpoint, then validates its time, issuer,
//! audience and scope claims. It provides three ways in:
//!
//! - [`verifier::JwtVerifierBuilder`] for any OIDC-shaped issuer, whether
//!   single ([`verifier::SingleIssuerVerifier`]) or multi
//!   ([`verifier::MultiIssuerVerifier`], resolved from the token's `iss`).
//! - [`provider::cognito::CognitoVerifierBuilder`] for an AWS Cognito user
//!   pool, which resolves the region from the pool id and registers both
//!   its standard and multi-region issuer automatically.
//! - [`provider::alb::AlbVerifierBuilder`] for AWS Application Load
//!   Balancer, which resolves the signing ALB from the token header's
//!   `signer` ARN rather than from `iss`.
//!
//! # Caching and failure behavior
//!
//! Every verifier fetches its JWKS (or PEM key) lazily, coalesces concurrent
//! fetches for the same URI into one request, and penalty-boxes a `kid` that
//! doesn't resolve so a flood of tokens for an unknown key doesn't hammer
//! the endpoint. `verify()` may fetch over the network; `verify_sync()`
//! never does — it fails closed with [`error::VerifyError::JwksCache`] on a
//! cold cache rather than blocking.
//!
//! # Supported algorithms
//!
//! RS256/384/512, ES256/384/512 and EdDSA (Ed25519) — the default
//! [`crypto::CryptoAdapter`] verifies RS256/384/512, ES256/384 and EdDSA
//! through `jsonwebtoken`, and ES512 (P-521) by calling `aws-lc-rs`
//! directly, since `jsonwebtoken` has no P-521 algorithm of its own. A
//! custom [`crypto::CryptoAdapter`] can replace this entirely.
//!
//! # Errors
//!
//! Every fallible operation returns [`error::VerifyError`], which aggregates
//! the more specific error enums (claim, JWK, fetch, cache, crypto) behind
//! `#[from]` so callers can match narrowly or broadly as needed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod assert;
pub mod cache;
pub mod crypto;
pub mod error;
pub mod fetch;
pub mod jwk;
pub mod jwt;
pub mod penalty_box;
pub mod provider;
pub mod verifier;

pub use error::{Result, VerifyError};
pub use jwt::JwtPayload;
pub use verifier::{JwtVerifierBuilder, MultiIssuerVerifier, SingleIssuerVerifier};

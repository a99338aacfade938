//! The pluggable `customJwtCheck` hook, split into a sync and an async
//! trait so a sync/async mismatch is visible in the type a caller picks,
//! not discovered at runtime as a hang or a silently-skipped check.
//!
//! A verifier built with an [`AsyncCustomCheck`] can still be asked to run
//! [`crate::verifier::SingleIssuerVerifier::verify_sync`] — that is rejected
//! explicitly with [`crate::VerifyError::ParameterValidation`] rather than
//! ignored.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VerifyError;
use crate::jwk::Jwk;
use crate::jwt::{JwtHeader, JwtPayload};

/// The already-verified token data a custom check is allowed to inspect.
pub struct CustomCheckContext<'a> {
    /// The token's header.
    pub header: &'a JwtHeader,
    /// The token's payload.
    pub payload: &'a JwtPayload,
    /// The JWK the signature was verified against.
    pub jwk: &'a Jwk,
}

/// A synchronous custom check, usable from both `verify()` and
/// `verify_sync()`.
pub trait CustomCheck: Send + Sync {
    /// Inspect the verified token and reject it by returning `Err`.
    fn check(&self, ctx: &CustomCheckContext<'_>) -> Result<(), VerifyError>;
}

/// An asynchronous custom check, usable only from `verify()`.
#[async_trait]
pub trait AsyncCustomCheck: Send + Sync {
    /// Inspect the verified token and reject it by returning `Err`.
    async fn check(&self, ctx: &CustomCheckContext<'_>) -> Result<(), VerifyError>;
}

/// Which kind of custom check a verifier was configured with, if any.
#[derive(Clone)]
pub enum CustomCheckKind {
    /// A [`CustomCheck`], usable from either entry point.
    Sync(Arc<dyn CustomCheck>),
    /// An [`AsyncCustomCheck`], usable only from `verify()`.
    Async(Arc<dyn AsyncCustomCheck>),
}

impl<F> CustomCheck for F
where
    F: Fn(&CustomCheckContext<'_>) -> Result<(), VerifyError> + Send + Sync,
{
    fn check(&self, ctx: &CustomCheckContext<'_>) -> Result<(), VerifyError> {
        self(ctx)
    }
}

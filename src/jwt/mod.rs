//! JWT decomposition and claim validation.
//!
//! This module never verifies a signature — it only parses the
//! `header.payload.signature` structure ([`decompose_unverified_jwt`]) and
//! checks time/issuer/audience/scope claims ([`validate_claims`]) against
//! values the caller already trusts. Callers are responsible for verifying
//! the signature before trusting anything decoded here.

mod claims;
mod decompose;

pub use claims::{validate_claims, ClaimOptions, Expectation};
pub use decompose::{decompose_unverified_jwt, Audience, DecomposedJwt, JwtHeader, JwtPayload};

//! Ready-made verifiers for specific AWS JWT issuers.
//!
//! Both facades are built on the same signature/claim pipeline as
//! [`crate::verifier`] (see [`crate::verifier::core`]) — they differ only in
//! how they resolve which issuer config and which JWK apply to a given
//! token.

pub mod alb;
pub mod cognito;

pub use alb::{AlbVerifier, AlbVerifierBuilder};
pub use cognito::{CognitoVerifier, CognitoVerifierBuilder};

//! JWK/JWKS modeling and shape assertions.
//!
//! The key shapes themselves (RSA, EC, OKP) are modeled by
//! [`jsonwebtoken::jwk`] as a tagged enum, so a JWK with a missing `n`/`e`
//! or `x`/`y` simply fails to deserialize rather than needing a manual
//! per-`kty` shape check here. This module only adds the checks
//! `jsonwebtoken` doesn't: `use == "sig"` and "this is a signature-capable
//! key shape we support".

pub use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, PublicKeyUse};

use crate::error::{JwkError, KidNotFoundInJwksError};

/// Find the JWK in `jwks` whose `kid` matches, if any.
pub fn find_jwk_in_jwks<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys.iter().find(|k| k.common.key_id.as_deref() == Some(kid))
}

/// Find a JWK by `kid`, turning "not found" into [`KidNotFoundInJwksError`].
pub fn require_jwk_in_jwks<'a>(jwks: &'a JwkSet, kid: &str, uri: Option<&str>) -> Result<&'a Jwk, JwkError> {
    find_jwk_in_jwks(jwks, kid).ok_or_else(|| {
        JwkError::KidNotFound(KidNotFoundInJwksError {
            uri: uri.map(str::to_string),
            kid: kid.to_string(),
        })
    })
}

/// Assert that `jwk` is usable as a signature-verification key: `use` is
/// absent or `"sig"`, and `kty`/`crv` is one of RSA, EC (P-256/P-384/P-521),
/// or OKP (Ed25519).
pub fn assert_is_signature_jwk(jwk: &Jwk) -> Result<(), JwkError> {
    if let Some(use_) = &jwk.common.public_key_use {
        if !matches!(use_, PublicKeyUse::Signature) {
            return Err(JwkError::InvalidUse {
                actual: format!("{use_:?}"),
            });
        }
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) | AlgorithmParameters::EllipticCurve(_) => Ok(()),
        AlgorithmParameters::OctetKeyPair(params) => {
            if matches!(params.curve, EllipticCurve::Ed25519) {
                Ok(())
            } else {
                Err(JwkError::InvalidKty {
                    actual: format!("OKP/{:?}", params.curve),
                })
            }
        }
        AlgorithmParameters::OctetKey(_) => Err(JwkError::InvalidKty {
            actual: "oct".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::jwk::{CommonParameters, KeyAlgorithm, OctetKeyParameters, OctetKeyType, RSAKeyParameters, RSAKeyType};

    fn rsa_jwk(kid: &str, use_: Option<PublicKeyUse>) -> Jwk {
        Jwk {
            common: CommonParameters {
                public_key_use: use_,
                key_operations: None,
                key_algorithm: Some(KeyAlgorithm::RS256),
                key_id: Some(kid.to_string()),
                x509_url: None,
                x509_chain: None,
                x509_sha1_fingerprint: None,
                x509_sha256_fingerprint: None,
            },
            algorithm: AlgorithmParameters::RSA(RSAKeyParameters {
                key_type: RSAKeyType::RSA,
                n: "n".into(),
                e: "AQAB".into(),
            }),
        }
    }

    #[test]
    fn finds_jwk_by_kid() {
        let jwks = JwkSet { keys: vec![rsa_jwk("a", None), rsa_jwk("b", None)] };
        assert!(find_jwk_in_jwks(&jwks, "b").is_some());
        assert!(find_jwk_in_jwks(&jwks, "z").is_none());
    }

    #[test]
    fn require_jwk_reports_kid_and_uri() {
        let jwks = JwkSet { keys: vec![] };
        let err = require_jwk_in_jwks(&jwks, "missing", Some("https://x")).unwrap_err();
        match err {
            JwkError::KidNotFound(e) => {
                assert_eq!(e.kid, "missing");
                assert_eq!(e.uri.as_deref(), Some("https://x"));
            }
            _ => panic!("expected KidNotFound"),
        }
    }

    #[test]
    fn accepts_rsa_signature_key() {
        assert!(assert_is_signature_jwk(&rsa_jwk("a", Some(PublicKeyUse::Signature))).is_ok());
    }

    #[test]
    fn accepts_key_with_no_use_declared() {
        assert!(assert_is_signature_jwk(&rsa_jwk("a", None)).is_ok());
    }

    #[test]
    fn rejects_encryption_key() {
        let err = assert_is_signature_jwk(&rsa_jwk("a", Some(PublicKeyUse::Encryption))).unwrap_err();
        assert!(matches!(err, JwkError::InvalidUse { .. }));
    }

    #[test]
    fn rejects_octet_key() {
        let jwk = Jwk {
            common: CommonParameters {
                public_key_use: None,
                key_operations: None,
                key_algorithm: None,
                key_id: Some("a".into()),
                x509_url: None,
                x509_chain: None,
                x509_sha1_fingerprint: None,
                x509_sha256_fingerprint: None,
            },
            algorithm: AlgorithmParameters::OctetKey(OctetKeyParameters {
                key_type: OctetKeyType::Octet,
                value: "secret".into(),
            }),
        };
        assert!(matches!(assert_is_signature_jwk(&jwk), Err(JwkError::InvalidKty { .. })));
    }
}

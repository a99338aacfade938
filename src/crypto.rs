//! Signature verification backend.
//!
//! [`CryptoAdapter`] is the single seam between this crate's JWK model and
//! whatever cryptography library actually checks a signature. The default
//! adapter is backed by [`jsonwebtoken`] for RSA/P-256/P-384/EdDSA, which in
//! turn uses `aws-lc-rs` for those primitives. `jsonwebtoken` has no P-521
//! support of its own, so ES512 is verified by calling `aws-lc-rs` directly
//! (see [`SigningAlg::Es512`]). ECDSA signatures are expected in IEEE
//! P-1363 `r || s` form, matching what both Cognito and ALB emit — ASN.1
//! DER signatures are rejected as invalid, not re-decoded.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::CryptoError;
use crate::jwk::{AlgorithmParameters, Jwk};

/// Coordinate size, in bytes, of a P-521 field element (`ceil(521 / 8)`).
const P521_COORDINATE_LEN: usize = 66;

/// The signature algorithms this crate accepts. Deliberately narrower than
/// `jsonwebtoken::Algorithm` — no HMAC, no RSA-PSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlg {
    /// RSASSA-PKCS1-v1_5 using SHA-256.
    Rs256,
    /// RSASSA-PKCS1-v1_5 using SHA-384.
    Rs384,
    /// RSASSA-PKCS1-v1_5 using SHA-512.
    Rs512,
    /// ECDSA using P-256 and SHA-256.
    Es256,
    /// ECDSA using P-384 and SHA-384.
    Es384,
    /// ECDSA using P-521 and SHA-512. Verified directly against `aws-lc-rs`
    /// rather than through `jsonwebtoken` (see [`JsonWebTokenCryptoAdapter`]),
    /// since `jsonwebtoken` has no P-521 algorithm of its own.
    Es512,
    /// EdDSA using Ed25519.
    EdDsa,
}

impl SigningAlg {
    /// Parse a JWT header `alg` value.
    pub fn from_header_alg(alg: &str) -> Option<Self> {
        match alg {
            "RS256" => Some(Self::Rs256),
            "RS384" => Some(Self::Rs384),
            "RS512" => Some(Self::Rs512),
            "ES256" => Some(Self::Es256),
            "ES384" => Some(Self::Es384),
            "ES512" => Some(Self::Es512),
            "EdDSA" => Some(Self::EdDsa),
            _ => None,
        }
    }

    /// The canonical JWT header `alg` string.
    pub fn as_header_alg(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::EdDsa => "EdDSA",
        }
    }

    fn to_jsonwebtoken(self) -> Result<jsonwebtoken::Algorithm, CryptoError> {
        match self {
            Self::Rs256 => Ok(jsonwebtoken::Algorithm::RS256),
            Self::Rs384 => Ok(jsonwebtoken::Algorithm::RS384),
            Self::Rs512 => Ok(jsonwebtoken::Algorithm::RS512),
            Self::Es256 => Ok(jsonwebtoken::Algorithm::ES256),
            Self::Es384 => Ok(jsonwebtoken::Algorithm::ES384),
            Self::EdDsa => Ok(jsonwebtoken::Algorithm::EdDSA),
            Self::Es512 => Err(CryptoError::UnsupportedAlgorithm(self.as_header_alg().to_string())),
        }
    }
}

/// Left-pad `bytes` with zeros to `len`, as required to turn a JWK's
/// minimal-length base64url coordinate into a fixed-width field element.
fn pad_to(bytes: &[u8], len: usize) -> Result<Vec<u8>, CryptoError> {
    if bytes.len() > len {
        return Err(CryptoError::KeyImport(format!("coordinate is {} bytes, expected at most {len}", bytes.len())));
    }
    let mut padded = vec![0u8; len - bytes.len()];
    padded.extend_from_slice(bytes);
    Ok(padded)
}

/// Build an uncompressed SEC1 point (`0x04 || X || Y`) for a P-521 public
/// key from its base64url JWK coordinates.
fn p521_uncompressed_point(x: &str, y: &str) -> Result<Vec<u8>, CryptoError> {
    let x = URL_SAFE_NO_PAD.decode(x).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
    let y = URL_SAFE_NO_PAD.decode(y).map_err(|e| CryptoError::KeyImport(e.to_string()))?;
    let x = pad_to(&x, P521_COORDINATE_LEN)?;
    let y = pad_to(&y, P521_COORDINATE_LEN)?;

    let mut point = Vec::with_capacity(1 + 2 * P521_COORDINATE_LEN);
    point.push(0x04);
    point.extend_from_slice(&x);
    point.extend_from_slice(&y);
    Ok(point)
}

/// Map a JWK's declared `alg` (if any) to the [`SigningAlg`] it implies, so
/// the verifier can catch a JWK that claims one algorithm while the header
/// claims another.
pub fn signing_alg_from_key_algorithm(ka: jsonwebtoken::jwk::KeyAlgorithm) -> Option<SigningAlg> {
    use jsonwebtoken::jwk::KeyAlgorithm as KA;
    match ka {
        KA::RS256 => Some(SigningAlg::Rs256),
        KA::RS384 => Some(SigningAlg::Rs384),
        KA::RS512 => Some(SigningAlg::Rs512),
        KA::ES256 => Some(SigningAlg::Es256),
        KA::ES384 => Some(SigningAlg::Es384),
        KA::EdDSA => Some(SigningAlg::EdDsa),
        _ => None,
    }
}

/// An imported, ready-to-use signing key.
pub struct KeyHandle(pub(crate) KeyMaterial);

/// The imported form a key takes, depending on which backend verifies it.
pub(crate) enum KeyMaterial {
    /// Anything `jsonwebtoken` itself verifies: RSA, P-256, P-384, Ed25519.
    JsonWebToken(jsonwebtoken::DecodingKey),
    /// A P-521 public key, as an uncompressed SEC1 point
    /// (`0x04 || X || Y`), verified directly against `aws-lc-rs`.
    P521Point(Vec<u8>),
}

/// The seam between this crate's JWK model and a cryptography backend.
/// Implementations must be safe to share across threads: the key-object
/// cache holds one adapter and calls into it concurrently.
pub trait CryptoAdapter: Send + Sync {
    /// Import a JWK's key material for use with `alg`.
    fn import_key(&self, jwk: &Jwk, alg: SigningAlg) -> Result<KeyHandle, CryptoError>;

    /// Verify `signature` over `signing_input` under `alg` using `key`.
    /// Returns `Ok(false)` (not an error) for a structurally valid but
    /// non-matching signature.
    fn verify(&self, signing_input: &[u8], signature: &[u8], alg: SigningAlg, key: &KeyHandle) -> Result<bool, CryptoError>;
}

/// The default [`CryptoAdapter`], backed by `jsonwebtoken`/`aws-lc-rs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonWebTokenCryptoAdapter;

impl CryptoAdapter for JsonWebTokenCryptoAdapter {
    fn import_key(&self, jwk: &Jwk, alg: SigningAlg) -> Result<KeyHandle, CryptoError> {
        if matches!(alg, SigningAlg::Es512) {
            let AlgorithmParameters::EllipticCurve(params) = &jwk.algorithm else {
                return Err(CryptoError::KeyImport("ES512 requires an EC JWK".to_string()));
            };
            if params.curve != jsonwebtoken::jwk::EllipticCurve::P521 {
                return Err(CryptoError::KeyImport(format!("ES512 requires a P-521 curve, got {:?}", params.curve)));
            }
            let point = p521_uncompressed_point(&params.x, &params.y)?;
            return Ok(KeyHandle(KeyMaterial::P521Point(point)));
        }

        alg.to_jsonwebtoken()?;
        let key = match &jwk.algorithm {
            AlgorithmParameters::RSA(params) => jsonwebtoken::DecodingKey::from_rsa_components(&params.n, &params.e)
                .map_err(|e| CryptoError::KeyImport(e.to_string()))?,
            AlgorithmParameters::EllipticCurve(params) => {
                jsonwebtoken::DecodingKey::from_ec_components(&params.x, &params.y)
                    .map_err(|e| CryptoError::KeyImport(e.to_string()))?
            }
            AlgorithmParameters::OctetKeyPair(params) => jsonwebtoken::DecodingKey::from_ed_components(&params.x)
                .map_err(|e| CryptoError::KeyImport(e.to_string()))?,
            AlgorithmParameters::OctetKey(_) => {
                return Err(CryptoError::KeyImport("symmetric keys are not signature keys".to_string()))
            }
        };
        Ok(KeyHandle(KeyMaterial::JsonWebToken(key)))
    }

    fn verify(&self, signing_input: &[u8], signature: &[u8], alg: SigningAlg, key: &KeyHandle) -> Result<bool, CryptoError> {
        match (&key.0, alg) {
            (KeyMaterial::P521Point(point), SigningAlg::Es512) => {
                if signature.len() != 2 * P521_COORDINATE_LEN {
                    // Structurally wrong length for a raw r || s signature:
                    // not a match, not a backend failure.
                    return Ok(false);
                }
                let public_key = aws_lc_rs::signature::UnparsedPublicKey::new(
                    &aws_lc_rs::signature::ECDSA_P521_SHA512_FIXED,
                    point.as_slice(),
                );
                Ok(public_key.verify(signing_input, signature).is_ok())
            }
            (KeyMaterial::JsonWebToken(decoding_key), _) => {
                let jwt_alg = alg.to_jsonwebtoken()?;
                // Re-encode canonically: the JWT's own signature segment may
                // carry bogus padding, which `decompose_unverified_jwt`
                // already tolerated when it decoded to raw bytes; the
                // backend always gets a clean unpadded base64url string.
                let signature_b64 = URL_SAFE_NO_PAD.encode(signature);
                jsonwebtoken::crypto::verify(&signature_b64, signing_input, decoding_key, jwt_alg)
                    .map_err(|e| CryptoError::Backend(e.to_string()))
            }
            (KeyMaterial::P521Point(_), _) => {
                Err(CryptoError::UnsupportedAlgorithm(alg.as_header_alg().to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_alg_strings() {
        for alg in [
            SigningAlg::Rs256,
            SigningAlg::Rs384,
            SigningAlg::Rs512,
            SigningAlg::Es256,
            SigningAlg::Es384,
            SigningAlg::Es512,
            SigningAlg::EdDsa,
        ] {
            assert_eq!(SigningAlg::from_header_alg(alg.as_header_alg()), Some(alg));
        }
    }

    #[test]
    fn rejects_unknown_alg() {
        assert_eq!(SigningAlg::from_header_alg("none"), None);
    }

    fn es512_jwk() -> Jwk {
        use jsonwebtoken::jwk::{CommonParameters, EllipticCurve, EllipticCurveKeyParameters, EllipticCurveKeyType, KeyAlgorithm};

        Jwk {
            common: CommonParameters {
                public_key_use: None,
                key_operations: None,
                key_algorithm: Some(KeyAlgorithm::ES512),
                key_id: Some("test-p521-1".to_string()),
                x509_url: None,
                x509_chain: None,
                x509_sha1_fingerprint: None,
                x509_sha256_fingerprint: None,
            },
            algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                key_type: EllipticCurveKeyType::EC,
                curve: EllipticCurve::P521,
                x: "APQiYyuzZq8ZkTCHabHfKnrsUiqVY-H9FPyRnUz7yikN0R2gY6vhm8TBLZ4pNmWT97TREhSuE6e4GkZfc3yUduFb".to_string(),
                y: "ATmKIuWvXU-4DV2ocK63tmjqWtcRzXENlBxbd_Bfyk6FjpARIXyhGpoeVl4kurzIJcrEXCbV0it0uN4SVmX8uCKe".to_string(),
            }),
        }
    }

    // Genuinely signed with a freshly generated P-521 key, not a placeholder:
    // header/payload/signature below come from a real ECDSA-SHA512 signature
    // over this exact signing input.
    const ES512_SIGNING_INPUT: &str = "eyJhbGciOiJFUzUxMiIsImtpZCI6InRlc3QtcDUyMS0xIn0.eyJpc3MiOiJodHRwczovL2V4YW1wbGUuY29tL2VzNTEyLWlzc3VlciIsImF1ZCI6ImF1ZDEiLCJzdWIiOiJ1c2VyLTEiLCJleHAiOjQwMDAwMDAwMDB9";
    const ES512_SIGNATURE_B64: &str = "APVIgE4iOVkUx1tSqDR4fLyRSFBVkIbPixuf1-FLmRivUGX9V8nKnLEYr0SZyb_xPZ_kD583tkz0VRcO6klyeRnPAPatZzMr3jDRiONmHywkJQh_j9jSJNomMAYKmIR-PUpcCz8mDVmivy0dAr9lJxWX_Y4SA9ebzXweQ2gVn4tq6_30";

    #[test]
    fn verifies_a_genuine_es512_signature_via_aws_lc_rs() {
        let adapter = JsonWebTokenCryptoAdapter;
        let key = adapter.import_key(&es512_jwk(), SigningAlg::Es512).unwrap();
        let signature = URL_SAFE_NO_PAD.decode(ES512_SIGNATURE_B64).unwrap();

        assert!(adapter.verify(ES512_SIGNING_INPUT.as_bytes(), &signature, SigningAlg::Es512, &key).unwrap());
    }

    #[test]
    fn rejects_a_tampered_es512_signature() {
        let adapter = JsonWebTokenCryptoAdapter;
        let key = adapter.import_key(&es512_jwk(), SigningAlg::Es512).unwrap();
        let mut signature = URL_SAFE_NO_PAD.decode(ES512_SIGNATURE_B64).unwrap();
        signature[0] ^= 0xFF;

        assert!(!adapter.verify(ES512_SIGNING_INPUT.as_bytes(), &signature, SigningAlg::Es512, &key).unwrap());
    }

    #[test]
    fn es512_jwk_rejects_a_non_p521_curve() {
        use jsonwebtoken::jwk::{CommonParameters, EllipticCurve, EllipticCurveKeyParameters, EllipticCurveKeyType, KeyAlgorithm};

        let jwk = Jwk {
            common: CommonParameters {
                public_key_use: None,
                key_operations: None,
                key_algorithm: Some(KeyAlgorithm::ES256),
                key_id: None,
                x509_url: None,
                x509_chain: None,
                x509_sha1_fingerprint: None,
                x509_sha256_fingerprint: None,
            },
            algorithm: AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                key_type: EllipticCurveKeyType::EC,
                curve: EllipticCurve::P256,
                x: "x".to_string(),
                y: "y".to_string(),
            }),
        };

        let adapter = JsonWebTokenCryptoAdapter;
        assert!(matches!(adapter.import_key(&jwk, SigningAlg::Es512), Err(CryptoError::KeyImport(_))));
    }
}

//! Splits a JWT string into a header, a payload, and a signature, without
//! checking either of them.

use std::sync::LazyLock;

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::JwtParseError;

/// Decodes each base64url segment regardless of whether it carries (correct,
/// missing, or extra) `=` padding — padding is cosmetic, not structural.
static LENIENT_B64: LazyLock<GeneralPurpose> = LazyLock::new(|| {
    GeneralPurpose::new(
        &base64::alphabet::URL_SAFE,
        GeneralPurposeConfig::new()
            .with_decode_padding_mode(DecodePaddingMode::Indifferent)
            .with_encode_padding(false),
    )
});

/// Three base64url segments separated by `.`, each segment non-empty and
/// optionally padded with up to two `=`. This only validates the outer
/// shape; content is decoded separately so decode errors can name which
/// segment failed.
static JWT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+={0,2}\.[A-Za-z0-9_-]+={0,2}\.[A-Za-z0-9_-]+={0,2}$").expect("static regex is valid")
});

/// `aud` may be a single string or an array of strings per RFC 7519 §4.1.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience value.
    Single(String),
    /// Multiple audience values.
    Many(Vec<String>),
}

impl Audience {
    /// All audience values as a flat slice-like iterator.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(s) => vec![s.as_str()],
            Self::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

/// The decoded JWT header. `alg` and `kid` are the fields every caller
/// needs; `signer`/`client` are populated for AWS ALB tokens. Anything else
/// is preserved in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtHeader {
    /// The signature algorithm the token claims to use.
    pub alg: String,
    /// The key id used to look the signing key up in a JWKS.
    #[serde(default)]
    pub kid: Option<String>,
    /// AWS ALB: the ARN of the load balancer that signed the token.
    #[serde(default)]
    pub signer: Option<String>,
    /// AWS ALB: the client id the load balancer associated with the token.
    #[serde(default)]
    pub client: Option<String>,
    /// Any other header fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The decoded JWT payload. Recognized fields are typed; anything else is
/// preserved in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtPayload {
    /// Expiration time, seconds since the epoch.
    #[serde(default)]
    pub exp: Option<f64>,
    /// Not-before time, seconds since the epoch.
    #[serde(default)]
    pub nbf: Option<f64>,
    /// Issued-at time, seconds since the epoch.
    #[serde(default)]
    pub iat: Option<f64>,
    /// Token issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Token subject.
    #[serde(default)]
    pub sub: Option<String>,
    /// Token audience(s).
    #[serde(default)]
    pub aud: Option<Audience>,
    /// Space-delimited scope string.
    #[serde(default)]
    pub scope: Option<String>,
    /// JWT id.
    #[serde(default)]
    pub jti: Option<String>,
    /// AWS Cognito: `"id"` or `"access"`.
    #[serde(default)]
    pub token_use: Option<String>,
    /// AWS Cognito: the app client id (access tokens only).
    #[serde(default)]
    pub client_id: Option<String>,
    /// AWS Cognito: group memberships.
    #[serde(default, rename = "cognito:groups")]
    pub cognito_groups: Option<Vec<String>>,
    /// Any other payload claims.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JwtPayload {
    /// `scope` split on ASCII whitespace, or an empty vec if absent.
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// A JWT split into its three parts, with header and payload decoded to
/// JSON but not yet verified.
#[derive(Debug, Clone)]
pub struct DecomposedJwt {
    /// The decoded header.
    pub header: JwtHeader,
    /// The decoded payload.
    pub payload: JwtPayload,
    /// The raw signature bytes.
    pub signature: Vec<u8>,
    /// The original header segment, verbatim — part of the signing input.
    pub header_b64: String,
    /// The original payload segment, verbatim — part of the signing input.
    pub payload_b64: String,
}

impl DecomposedJwt {
    /// The exact bytes that were signed: `header_b64 || "." || payload_b64`.
    pub fn signing_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.header_b64.len() + 1 + self.payload_b64.len());
        buf.extend_from_slice(self.header_b64.as_bytes());
        buf.push(b'.');
        buf.extend_from_slice(self.payload_b64.as_bytes());
        buf
    }
}

/// Split `token` into header/payload/signature and decode the first two as
/// JSON. Does not check the signature or any claim.
pub fn decompose_unverified_jwt(token: &str) -> Result<DecomposedJwt, JwtParseError> {
    if token.is_empty() {
        return Err(JwtParseError::Empty);
    }
    if !JWT_SHAPE.is_match(token) {
        return Err(JwtParseError::Malformed);
    }

    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(JwtParseError::Malformed)?.to_string();
    let payload_b64 = parts.next().ok_or(JwtParseError::Malformed)?.to_string();
    let signature_b64 = parts.next().ok_or(JwtParseError::Malformed)?;
    if parts.next().is_some() {
        return Err(JwtParseError::Malformed);
    }

    let header = decode_segment::<JwtHeader>("header", &header_b64)?;
    let payload = decode_segment::<JwtPayload>("payload", &payload_b64)?;
    let signature = LENIENT_B64
        .decode(signature_b64)
        .map_err(|source| JwtParseError::Base64 { part: "signature", source })?;

    Ok(DecomposedJwt {
        header,
        payload,
        signature,
        header_b64,
        payload_b64,
    })
}

fn decode_segment<T: serde::de::DeserializeOwned>(part: &'static str, segment: &str) -> Result<T, JwtParseError> {
    let bytes = LENIENT_B64
        .decode(segment)
        .map_err(|source| JwtParseError::Base64 { part, source })?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|source| JwtParseError::Json { part, source })?;
    if !value.is_object() {
        return Err(JwtParseError::NotObject { part });
    }
    serde_json::from_value(value).map_err(|source| JwtParseError::Json { part, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn make_token(header_json: &str, payload_json: &str) -> String {
        format!(
            "{}.{}.{}",
            b64(header_json.as_bytes()),
            b64(payload_json.as_bytes()),
            b64(b"sig")
        )
    }

    #[test]
    fn rejects_empty_token() {
        assert!(matches!(decompose_unverified_jwt(""), Err(JwtParseError::Empty)));
    }

    #[test]
    fn rejects_malformed_shape() {
        assert!(matches!(
            decompose_unverified_jwt("not-a-jwt"),
            Err(JwtParseError::Malformed)
        ));
    }

    #[test]
    fn decodes_header_and_payload() {
        let token = make_token(r#"{"alg":"RS256","kid":"abc"}"#, r#"{"iss":"https://x","exp":1}"#);
        let decomposed = decompose_unverified_jwt(&token).unwrap();
        assert_eq!(decomposed.header.alg, "RS256");
        assert_eq!(decomposed.header.kid.as_deref(), Some("abc"));
        assert_eq!(decomposed.payload.iss.as_deref(), Some("https://x"));
        assert_eq!(decomposed.signature, b"sig");
    }

    #[test]
    fn tolerates_missing_and_extra_padding() {
        let no_pad = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#);
        let with_pad = format!("{no_pad}==");
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{}"#);
        let token = format!("{with_pad}.{payload}.{}", b64(b"sig"));
        assert!(decompose_unverified_jwt(&token).is_ok());
    }

    #[test]
    fn rejects_non_object_payload() {
        let token = make_token(r#"{"alg":"RS256"}"#, "[1,2,3]");
        assert!(matches!(decompose_unverified_jwt(&token), Err(JwtParseError::NotObject { .. })));
    }

    #[test]
    fn rejects_wrong_field_shape() {
        let token = make_token(r#"{"alg":"RS256"}"#, r#"{"exp":"not-a-number"}"#);
        assert!(matches!(decompose_unverified_jwt(&token), Err(JwtParseError::Json { .. })));
    }

    #[test]
    fn parses_array_audience() {
        let token = make_token(r#"{"alg":"RS256"}"#, r#"{"aud":["a","b"]}"#);
        let decomposed = decompose_unverified_jwt(&token).unwrap();
        assert_eq!(decomposed.payload.aud.unwrap().values(), vec!["a", "b"]);
    }

    #[test]
    fn signing_input_is_the_literal_original_segments() {
        let token = make_token(r#"{"alg":"RS256"}"#, r#"{"iss":"x"}"#);
        let decomposed = decompose_unverified_jwt(&token).unwrap();
        let expected = format!("{}.{}", decomposed.header_b64, decomposed.payload_b64);
        assert_eq!(decomposed.signing_input(), expected.into_bytes());
    }
}

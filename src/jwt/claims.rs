//! Time, issuer, audience and scope claim validation.
//!
//! Every claim check here assumes the signature has already been verified
//! — this module never looks at a key or a signature, only at the
//! already-decoded [`JwtPayload`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::assert::{assert_is_one_of, assert_overlaps, FailedAssertion};
use crate::error::{ClaimError, ClaimErrorKind};

use super::decompose::JwtPayload;

/// Whether a claim is checked against an expected set, or deliberately
/// skipped. There is no "unspecified" state — callers decide once, at
/// construction, which claims they care about.
#[derive(Debug, Clone, Default)]
pub enum Expectation<T> {
    /// Do not check this claim at all.
    #[default]
    Skip,
    /// The claim must match one of these values.
    Required(T),
}

impl<T> Expectation<T> {
    /// The expected values, if this expectation isn't [`Expectation::Skip`].
    pub fn values(&self) -> Option<&T> {
        match self {
            Self::Skip => None,
            Self::Required(v) => Some(v),
        }
    }
}

/// Which claims to check, and how much clock skew to tolerate.
#[derive(Debug, Clone, Default)]
pub struct ClaimOptions {
    /// Acceptable issuers for `iss`.
    pub issuer: Expectation<Vec<String>>,
    /// Acceptable audiences for `aud` (any overlap is accepted).
    pub audience: Expectation<Vec<String>>,
    /// Acceptable scopes for `scope` (any overlap is accepted).
    pub scope: Expectation<Vec<String>>,
    /// Extra tolerance applied to `exp` and `nbf` comparisons.
    pub grace: Duration,
}

fn now_secs(now: SystemTime) -> f64 {
    now.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs_f64()
}

/// Validate `payload` against `opts` as of `now`.
pub fn validate_claims(payload: &JwtPayload, opts: &ClaimOptions, now: SystemTime) -> Result<(), ClaimError> {
    let now = now_secs(now);
    let grace = opts.grace.as_secs_f64();

    if let Some(exp) = payload.exp {
        if now > exp + grace {
            let failed = FailedAssertion::new("exp", exp, format!("> {now} (now, -{}s grace)", opts.grace.as_secs()));
            return Err(ClaimError::new(ClaimErrorKind::Expired { failed }));
        }
    }

    if let Some(nbf) = payload.nbf {
        if now < nbf - grace {
            let failed = FailedAssertion::new("nbf", nbf, format!("<= {now} (now, +{}s grace)", opts.grace.as_secs()));
            return Err(ClaimError::new(ClaimErrorKind::NotYetValid { failed }));
        }
    }

    if let Expectation::Required(expected) = &opts.issuer {
        match &payload.iss {
            None => {
                let failed = FailedAssertion::new("iss", "<missing>", format!("one of {expected:?}"));
                return Err(ClaimError::new(ClaimErrorKind::InvalidIssuer { failed }));
            }
            Some(iss) => {
                assert_is_one_of("iss", iss, expected)
                    .map_err(|failed| ClaimError::new(ClaimErrorKind::InvalidIssuer { failed }))?;
            }
        }
    }

    if let Expectation::Required(expected) = &opts.audience {
        let actual: Vec<String> = payload
            .aud
            .as_ref()
            .map(|a| a.values().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        assert_overlaps("aud", &actual, expected)
            .map_err(|failed| ClaimError::new(ClaimErrorKind::InvalidAudience { failed }))?;
    }

    if let Expectation::Required(expected) = &opts.scope {
        let actual = payload.scopes();
        assert_overlaps("scope", &actual, expected)
            .map_err(|failed| ClaimError::new(ClaimErrorKind::InvalidScope { failed }))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::decompose::Audience;

    fn payload() -> JwtPayload {
        JwtPayload {
            exp: None,
            nbf: None,
            iat: None,
            iss: None,
            sub: None,
            aud: None,
            scope: None,
            jti: None,
            token_use: None,
            client_id: None,
            cognito_groups: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn accepts_token_with_no_constraints() {
        assert!(validate_claims(&payload(), &ClaimOptions::default(), SystemTime::now()).is_ok());
    }

    #[test]
    fn rejects_expired_token() {
        let mut p = payload();
        p.exp = Some(0.0);
        let err = validate_claims(&p, &ClaimOptions::default(), SystemTime::now()).unwrap_err();
        assert!(matches!(err.kind, ClaimErrorKind::Expired { .. }));
    }

    #[test]
    fn expired_failed_assertion_reports_the_exp_claim_as_actual() {
        let mut p = payload();
        p.exp = Some(1_000_000_000.0);
        let now = UNIX_EPOCH + Duration::from_secs(1_000_000_001);
        let err = validate_claims(&p, &ClaimOptions::default(), now).unwrap_err();
        let ClaimErrorKind::Expired { failed } = err.kind else { panic!("expected Expired") };
        assert_eq!(failed.actual, "1000000000");
    }

    #[test]
    fn not_yet_valid_failed_assertion_reports_the_nbf_claim_as_actual() {
        let mut p = payload();
        p.nbf = Some(1_000_000_000.0);
        let now = UNIX_EPOCH;
        let err = validate_claims(&p, &ClaimOptions::default(), now).unwrap_err();
        let ClaimErrorKind::NotYetValid { failed } = err.kind else { panic!("expected NotYetValid") };
        assert_eq!(failed.actual, "1000000000");
    }

    #[test]
    fn grace_period_extends_expiry() {
        let mut p = payload();
        let now = SystemTime::now();
        p.exp = Some(now_secs(now) - 5.0);
        let opts = ClaimOptions { grace: Duration::from_secs(30), ..Default::default() };
        assert!(validate_claims(&p, &opts, now).is_ok());
    }

    #[test]
    fn rejects_not_yet_valid_token() {
        let mut p = payload();
        p.nbf = Some(now_secs(SystemTime::now()) + 3600.0);
        let err = validate_claims(&p, &ClaimOptions::default(), SystemTime::now()).unwrap_err();
        assert!(matches!(err.kind, ClaimErrorKind::NotYetValid { .. }));
    }

    #[test]
    fn rejects_missing_issuer_when_required() {
        let opts = ClaimOptions { issuer: Expectation::Required(vec!["https://issuer".into()]), ..Default::default() };
        let err = validate_claims(&payload(), &opts, SystemTime::now()).unwrap_err();
        assert!(matches!(err.kind, ClaimErrorKind::InvalidIssuer { .. }));
    }

    #[test]
    fn accepts_matching_issuer() {
        let mut p = payload();
        p.iss = Some("https://issuer".into());
        let opts = ClaimOptions { issuer: Expectation::Required(vec!["https://issuer".into()]), ..Default::default() };
        assert!(validate_claims(&p, &opts, SystemTime::now()).is_ok());
    }

    #[test]
    fn audience_array_overlap_is_accepted() {
        let mut p = payload();
        p.aud = Some(Audience::Many(vec!["a".into(), "b".into()]));
        let opts = ClaimOptions { audience: Expectation::Required(vec!["b".into()]), ..Default::default() };
        assert!(validate_claims(&p, &opts, SystemTime::now()).is_ok());
    }

    #[test]
    fn scope_must_overlap_when_required() {
        let mut p = payload();
        p.scope = Some("read write".into());
        let opts = ClaimOptions { scope: Expectation::Required(vec!["admin".into()]), ..Default::default() };
        let err = validate_claims(&p, &opts, SystemTime::now()).unwrap_err();
        assert!(matches!(err.kind, ClaimErrorKind::InvalidScope { .. }));
    }
}

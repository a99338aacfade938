//! Typed equality/membership assertions shared by the claim validator and
//! the provider facades.
//!
//! Every assertion failure carries a [`FailedAssertion`] describing what was
//! expected vs what was actually found, so callers can build diagnostics
//! without re-deriving the comparison.

use std::fmt;

/// What was expected vs what was actually present when an assertion fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAssertion {
    /// Name of the claim or field being asserted (e.g. `"iss"`, `"aud"`).
    pub name: &'static str,
    /// The value that was actually present, rendered for display.
    pub actual: String,
    /// A human-readable description of what was expected.
    pub expected: String,
}

impl FailedAssertion {
    /// Build a failed assertion from a display-able actual value and an
    /// already-rendered expected description.
    pub fn new(name: &'static str, actual: impl fmt::Display, expected: impl Into<String>) -> Self {
        Self {
            name,
            actual: actual.to_string(),
            expected: expected.into(),
        }
    }
}

impl fmt::Display for FailedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` was {:?}, expected {}",
            self.name, self.actual, self.expected
        )
    }
}

/// Assert `actual == expected`, raising a [`FailedAssertion`] named `name`.
pub fn assert_equal(name: &'static str, actual: &str, expected: &str) -> Result<(), FailedAssertion> {
    if actual == expected {
        Ok(())
    } else {
        Err(FailedAssertion::new(name, actual, format!("{expected:?}")))
    }
}

/// Assert `actual` is present in `expected`, raising a [`FailedAssertion`]
/// named `name` otherwise.
pub fn assert_is_one_of(name: &'static str, actual: &str, expected: &[String]) -> Result<(), FailedAssertion> {
    if expected.iter().any(|e| e == actual) {
        Ok(())
    } else {
        Err(FailedAssertion::new(name, actual, format!("one of {expected:?}")))
    }
}

/// Assert that `actual` and `expected` share at least one element.
pub fn assert_overlaps(name: &'static str, actual: &[String], expected: &[String]) -> Result<(), FailedAssertion> {
    if actual.iter().any(|a| expected.iter().any(|e| e == a)) {
        Ok(())
    } else {
        Err(FailedAssertion::new(
            name,
            format!("{actual:?}"),
            format!("overlap with {expected:?}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_equal_accepts_match() {
        assert!(assert_equal("iss", "a", "a").is_ok());
    }

    #[test]
    fn assert_equal_rejects_mismatch() {
        let err = assert_equal("iss", "a", "b").unwrap_err();
        assert_eq!(err.name, "iss");
        assert_eq!(err.actual, "a");
    }

    #[test]
    fn assert_is_one_of_accepts_member() {
        let expected = vec!["a".to_string(), "b".to_string()];
        assert!(assert_is_one_of("aud", "b", &expected).is_ok());
    }

    #[test]
    fn assert_is_one_of_rejects_non_member() {
        let expected = vec!["a".to_string()];
        assert!(assert_is_one_of("aud", "z", &expected).is_err());
    }

    #[test]
    fn assert_overlaps_accepts_any_shared_element() {
        let actual = vec!["x".to_string(), "y".to_string()];
        let expected = vec!["y".to_string(), "z".to_string()];
        assert!(assert_overlaps("scope", &actual, &expected).is_ok());
    }

    #[test]
    fn assert_overlaps_rejects_empty_actual() {
        let expected = vec!["y".to_string()];
        assert!(assert_overlaps("scope", &[], &expected).is_err());
    }
}

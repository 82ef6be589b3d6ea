//! Friendly identifiers.
//!
//! A friendly identifier lets devices be referenced by a short hint while the
//! landscape links the hint to a full identifier (serial number, UPnP UDN,
//! fully qualified host name) once it is known.

use std::fmt;

use regex::Regex;

use crate::error::{LandscapeError, LandscapeResult};

/// Short-name reference to a device or service
#[derive(Debug, Clone)]
pub struct FriendlyIdentifier {
    full_identifier: String,
    hint: String,
    identity_match: Option<Regex>,
}

impl FriendlyIdentifier {
    /// Create an identifier from a full identifier and a hint
    pub fn new(full_identifier: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            full_identifier: full_identifier.into(),
            hint: hint.into(),
            identity_match: None,
        }
    }

    /// Create an identifier whose identity is extracted from the full identifier
    ///
    /// The expression must match the full identifier; its first capture group
    /// becomes the identity.
    pub fn with_identity_match(
        full_identifier: impl Into<String>,
        hint: impl Into<String>,
        identity_match: &str,
    ) -> LandscapeResult<Self> {
        let identity_match = Regex::new(identity_match).map_err(|e| LandscapeError::ConfigValidation {
            field: "identity_match".to_string(),
            reason: e.to_string(),
        })?;

        let full_identifier = full_identifier.into();
        if anchored_captures(&identity_match, &full_identifier).is_none() {
            return Err(LandscapeError::semantic(
                "The specified identifier is not compatible with the short match expression provided.",
            ));
        }

        Ok(Self {
            full_identifier,
            hint: hint.into(),
            identity_match: Some(identity_match),
        })
    }

    /// The full identifier used to reference something
    pub fn full_identifier(&self) -> &str {
        &self.full_identifier
    }

    /// A reduced name that represents an adequately unique portion of the full identifier
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// The identity used in logs and pool tables
    pub fn identity(&self) -> String {
        if let Some(expr) = &self.identity_match {
            if let Some(group) = anchored_captures(expr, &self.full_identifier)
                .and_then(|caps| caps.get(1))
            {
                return group.as_str().to_string();
            }
        }

        if self.hint.is_empty() {
            self.full_identifier.clone()
        } else {
            self.hint.clone()
        }
    }

    /// Indicates if the hint provided is a match for this identifier
    pub fn matches_hint(&self, hint: &str) -> bool {
        self.full_identifier.contains(hint) && hint.contains(&self.hint)
    }

    /// Describes the hint to full identifier relationship
    pub fn relationship(&self) -> String {
        format!("{} -> {}", self.hint, self.full_identifier)
    }

    /// Replace the full identifier once it has been resolved
    pub fn update_full_identifier(&mut self, full_identifier: impl Into<String>) {
        self.full_identifier = full_identifier.into();
    }
}

/// Match the expression at the start of the text, like a prefix match
fn anchored_captures<'t>(expr: &Regex, text: &'t str) -> Option<regex::Captures<'t>> {
    expr.captures(text)
        .filter(|caps| caps.get(0).map(|m| m.start() == 0).unwrap_or(false))
}

impl PartialEq for FriendlyIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.full_identifier == other.full_identifier
    }
}

impl Eq for FriendlyIdentifier {}

impl PartialEq<str> for FriendlyIdentifier {
    fn eq(&self, other: &str) -> bool {
        self.full_identifier.contains(other)
    }
}

impl PartialEq<&str> for FriendlyIdentifier {
    fn eq(&self, other: &&str) -> bool {
        self.full_identifier.contains(*other)
    }
}

impl fmt::Display for FriendlyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identity_defaults_to_hint() {
        let fid = FriendlyIdentifier::new("uuid:RINCON_000E58A0123401400", "RINCON_000E58A01234");
        assert_eq!(fid.identity(), "RINCON_000E58A01234");
        assert_eq!(fid.to_string(), "RINCON_000E58A01234");
    }

    #[test]
    fn test_identity_falls_back_to_full_identifier() {
        let fid = FriendlyIdentifier::new("node-green.lab", "");
        assert_eq!(fid.identity(), "node-green.lab");
    }

    #[test]
    fn test_identity_match_extracts_group() {
        let fid = FriendlyIdentifier::with_identity_match(
            "uuid:RINCON_000E58A0123401400",
            "A01234",
            r"uuid:RINCON_([0-9A-F]+)01400",
        )
        .unwrap();

        assert_eq!(fid.identity(), "000E58A01234");
    }

    #[test]
    fn test_identity_match_must_match() {
        let result = FriendlyIdentifier::with_identity_match("node-green", "green", r"host-(\w+)");
        assert!(matches!(result, Err(LandscapeError::Semantic { .. })));
    }

    #[test]
    fn test_matches_hint() {
        let fid = FriendlyIdentifier::new("node-green.lab.example.com", "green");
        assert!(fid.matches_hint("node-green"));
        assert!(!fid.matches_hint("node-red"));
        assert!(!fid.matches_hint("node"));
    }

    #[test]
    fn test_relationship_and_update() {
        let mut fid = FriendlyIdentifier::new("10.0.0.1", "alpha");
        assert_eq!(fid.relationship(), "alpha -> 10.0.0.1");

        fid.update_full_identifier("alpha.lab");
        assert_eq!(fid.full_identifier(), "alpha.lab");
    }

    #[test]
    fn test_equality() {
        let a = FriendlyIdentifier::new("node-green.lab", "green");
        let b = FriendlyIdentifier::new("node-green.lab", "node-green");
        let c = FriendlyIdentifier::new("node-red.lab", "red");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a == "green");
        assert!(a != "orange");
    }

    proptest! {
        #[test]
        fn prop_full_identifier_matches_itself(full in "[a-z]{1,12}", split in 0usize..12) {
            let split = split.min(full.len());
            let hint = full[..split].to_string();
            let fid = FriendlyIdentifier::new(full.clone(), hint);
            prop_assert!(fid.matches_hint(&full));
        }
    }
}

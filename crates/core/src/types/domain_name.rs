//! Storefront domain names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`DomainName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainNameError {
    #[error("domain name cannot be empty")]
    Empty,
    #[error("domain name must be at most {max} characters")]
    TooLong { max: usize },
    #[error("domain name must have at least two labels")]
    SingleLabel,
    #[error("invalid domain label: {0}")]
    InvalidLabel(String),
}

/// A validated, lower-cased DNS host name such as `shop.example.com`.
///
/// ## Constraints
///
/// - Total length 1-253 characters, no trailing dot
/// - At least two labels
/// - Each label 1-63 characters of `a-z`, `0-9` and `-`, not starting or
///   ending with `-`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Maximum length of a domain name.
    pub const MAX_LENGTH: usize = 253;
    /// Maximum length of a single label.
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Parse a domain name.
    ///
    /// # Errors
    ///
    /// Returns an error if the input violates any of the constraints above.
    pub fn parse(s: &str) -> Result<Self, DomainNameError> {
        let s = s.trim().trim_end_matches('.').to_ascii_lowercase();
        if s.is_empty() {
            return Err(DomainNameError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(DomainNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let labels: Vec<&str> = s.split('.').collect();
        if labels.len() < 2 {
            return Err(DomainNameError::SingleLabel);
        }
        for label in &labels {
            if !is_valid_label(label) {
                return Err(DomainNameError::InvalidLabel((*label).to_owned()));
            }
        }

        Ok(Self(s))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this name is a direct or nested subdomain of `parent`.
    #[must_use]
    pub fn is_subdomain_of(&self, parent: &str) -> bool {
        let parent = parent.trim_end_matches('.').to_ascii_lowercase();
        self.0
            .strip_suffix(parent.as_str())
            .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= DomainName::MAX_LABEL_LENGTH
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DomainName {
    type Error = DomainNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainName> for String {
    fn from(name: DomainName) -> Self {
        name.0
    }
}

impl std::str::FromStr for DomainName {
    type Err = DomainNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(
            DomainName::parse("Shop.Example.COM.").unwrap().as_str(),
            "shop.example.com"
        );
        assert!(DomainName::parse("my-store.univendor.app").is_ok());
        assert!(DomainName::parse("a1.io").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(DomainName::parse(""), Err(DomainNameError::Empty));
        assert_eq!(
            DomainName::parse("localhost"),
            Err(DomainNameError::SingleLabel)
        );
        assert!(matches!(
            DomainName::parse("-bad.example.com"),
            Err(DomainNameError::InvalidLabel(_))
        ));
        assert!(matches!(
            DomainName::parse("under_score.example.com"),
            Err(DomainNameError::InvalidLabel(_))
        ));
        assert!(matches!(
            DomainName::parse("double..dot.com"),
            Err(DomainNameError::InvalidLabel(_))
        ));
        let long_label = format!("{}.com", "a".repeat(64));
        assert!(matches!(
            DomainName::parse(&long_label),
            Err(DomainNameError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_is_subdomain_of() {
        let name = DomainName::parse("acme.univendor.app").unwrap();
        assert!(name.is_subdomain_of("univendor.app"));
        assert!(name.is_subdomain_of("UNIVENDOR.app."));
        assert!(!name.is_subdomain_of("vendor.app"));

        let apex = DomainName::parse("univendor.app").unwrap();
        assert!(!apex.is_subdomain_of("univendor.app"));

        let lookalike = DomainName::parse("evilunivendor.app").unwrap();
        assert!(!lookalike.is_subdomain_of("univendor.app"));
    }

    #[test]
    fn test_serde_validates() {
        let parsed: Result<DomainName, _> = serde_json::from_str("\"not a domain\"");
        assert!(parsed.is_err());
        let ok: DomainName = serde_json::from_str("\"shop.example.com\"").unwrap();
        assert_eq!(ok.as_str(), "shop.example.com");
    }
}

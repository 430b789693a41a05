//! One-time passcode type.

use core::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OtpCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpCodeError {
    /// The code is not exactly six characters long.
    #[error("code must be exactly {expected} digits")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
    },
    /// The code contains a non-digit character.
    #[error("code must contain only digits")]
    NotNumeric,
}

/// A six-digit one-time passcode sent by email.
///
/// Codes are generated uniformly in `100000..=999999`, so they never start
/// with a zero. Parsing accepts any six ASCII digits (surrounding whitespace
/// is ignored) to stay tolerant of what users paste.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtpCode(String);

impl OtpCode {
    /// Number of digits in a code.
    pub const LENGTH: usize = 6;

    /// Generate a fresh random code.
    #[must_use]
    pub fn generate() -> Self {
        let code: u32 = rand::rng().random_range(100_000..1_000_000);
        Self(code.to_string())
    }

    /// Parse a user-submitted code.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, OtpCodeError> {
        let s = s.trim();
        if s.len() != Self::LENGTH {
            return Err(OtpCodeError::WrongLength {
                expected: Self::LENGTH,
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpCodeError::NotNumeric);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Codes are credentials; keep them out of logs.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

impl std::str::FromStr for OtpCode {
    type Err = OtpCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_format() {
        for _ in 0..100 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), OtpCode::LENGTH);
            let n: u32 = code.as_str().parse().expect("numeric");
            assert!((100_000..1_000_000).contains(&n));
        }
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(OtpCode::parse(" 012345 ").map(|c| c.0), Ok("012345".to_string()));
    }

    #[test]
    fn test_parse_wrong_length() {
        assert_eq!(
            OtpCode::parse("12345"),
            Err(OtpCodeError::WrongLength { expected: 6 })
        );
        assert!(OtpCode::parse("1234567").is_err());
    }

    #[test]
    fn test_parse_non_numeric() {
        assert_eq!(OtpCode::parse("12a456"), Err(OtpCodeError::NotNumeric));
    }

    #[test]
    fn test_debug_redacts() {
        let code = OtpCode::parse("123456").expect("valid");
        assert!(!format!("{code:?}").contains("123456"));
    }
}

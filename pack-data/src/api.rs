use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize, Serializer};

/// An API version, used both for the Buildpack API and the Platform API.
///
/// This MUST be in form `<major>.<minor>` or `<major>`, where `<major>` is equivalent to `<major>.0`.
#[derive(Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
#[serde(try_from = "String")]
pub struct Api {
    pub major: u32,
    pub minor: u32,
}

impl Api {
    #[must_use]
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether an implementation of this API version can serve clients of `requested`.
    ///
    /// Majors must match. Before 1.0 every minor is treated as breaking, so for major
    /// `0` the minors must be equal; afterwards any smaller-or-equal minor is served.
    #[must_use]
    pub fn supports(&self, requested: Api) -> bool {
        if self.major != requested.major {
            false
        } else if self.major == 0 {
            self.minor == requested.minor
        } else {
            self.minor >= requested.minor
        }
    }
}

impl TryFrom<&str> for Api {
    type Error = ApiError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // We're not using the `semver` crate, since it only supports non-range versions of form `X.Y.Z`.
        // If no minor version is specified, it defaults to `0`.
        let (major, minor) = value.split_once('.').unwrap_or((value, "0"));
        Ok(Self {
            major: major
                .parse()
                .map_err(|_| Self::Error::InvalidApiVersion(String::from(value)))?,
            minor: minor
                .parse()
                .map_err(|_| Self::Error::InvalidApiVersion(String::from(value)))?,
        })
    }
}

impl TryFrom<String> for Api {
    type Error = ApiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl std::str::FromStr for Api {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(value)
    }
}

impl Display for Api {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}", self.major, self.minor)
    }
}

impl Serialize for Api {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ApiError {
    #[error("Invalid API version: `{0}`")]
    InvalidApiVersion(String),
}

#[cfg(test)]
mod tests {
    use serde_test::{Token, assert_de_tokens, assert_de_tokens_error};

    use super::*;

    #[test]
    fn deserialize_valid_api_versions() {
        assert_de_tokens(&Api::new(1, 3), &[Token::BorrowedStr("1.3")]);
        assert_de_tokens(&Api::new(0, 0), &[Token::BorrowedStr("0.0")]);
        assert_de_tokens(&Api::new(2020, 10), &[Token::BorrowedStr("2020.10")]);
        assert_de_tokens(&Api::new(2, 0), &[Token::BorrowedStr("2")]);
    }

    #[test]
    fn reject_invalid_api_versions() {
        assert_de_tokens_error::<Api>(
            &[Token::BorrowedStr("1.2.3")],
            "Invalid API version: `1.2.3`",
        );
        assert_de_tokens_error::<Api>(
            &[Token::BorrowedStr("1.2-dev")],
            "Invalid API version: `1.2-dev`",
        );
        assert_de_tokens_error::<Api>(&[Token::BorrowedStr("-1")], "Invalid API version: `-1`");
        assert_de_tokens_error::<Api>(&[Token::BorrowedStr(".1")], "Invalid API version: `.1`");
        assert_de_tokens_error::<Api>(&[Token::BorrowedStr("1.")], "Invalid API version: `1.`");
        assert_de_tokens_error::<Api>(&[Token::BorrowedStr("")], "Invalid API version: ``");
    }

    #[test]
    fn api_display() {
        assert_eq!(Api::new(1, 0).to_string(), "1.0");
        assert_eq!(Api::new(1, 2).to_string(), "1.2");
        assert_eq!(Api::new(0, 10).to_string(), "0.10");
    }

    #[test]
    fn supports_same_major() {
        assert!(Api::new(1, 2).supports(Api::new(1, 1)));
        assert!(Api::new(1, 2).supports(Api::new(1, 2)));
        assert!(!Api::new(1, 2).supports(Api::new(1, 3)));
        assert!(!Api::new(1, 2).supports(Api::new(2, 2)));
        assert!(!Api::new(2, 2).supports(Api::new(1, 2)));
    }

    #[test]
    fn supports_zero_major_requires_exact_minor() {
        assert!(Api::new(0, 2).supports(Api::new(0, 2)));
        assert!(!Api::new(0, 2).supports(Api::new(0, 1)));
        assert!(!Api::new(0, 2).supports(Api::new(0, 3)));
    }
}

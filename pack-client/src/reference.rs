//! Weakly-validated image tag references.

use std::fmt;
use std::fmt::{Display, Formatter};

const DEFAULT_REGISTRY: &str = "index.docker.io";
const DEFAULT_TAG: &str = "latest";

/// An image reference normalized to always carry a tag.
///
/// Validation is deliberately weak: the reference must be non-empty, free of
/// whitespace and use a lower-case repository, which is enough to catch typos
/// early while leaving exact reference semantics to the image store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TagReference {
    raw: String,
}

impl TagReference {
    pub fn parse(value: &str) -> Result<Self, ReferenceError> {
        if value.is_empty() {
            return Err(ReferenceError::Empty);
        }

        if value.chars().any(char::is_whitespace) {
            return Err(ReferenceError::InvalidCharacters(String::from(value)));
        }

        let (repository, tag) = split_tag(value);
        if repository.is_empty() || tag == Some("") {
            return Err(ReferenceError::InvalidCharacters(String::from(value)));
        }
        if repository_part(repository)
            .chars()
            .any(char::is_uppercase)
        {
            return Err(ReferenceError::UppercaseRepository(String::from(value)));
        }

        Ok(Self {
            raw: match tag {
                Some(_) => String::from(value),
                None => format!("{value}:{DEFAULT_TAG}"),
            },
        })
    }

    /// The full reference including the tag.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.raw
    }

    /// The registry this reference points at, using the docker convention:
    /// a first path component containing `.` or `:`, or equal to
    /// `localhost`, names a registry; anything else lives on Docker Hub.
    #[must_use]
    pub fn registry(&self) -> &str {
        match self.raw.split_once('/') {
            Some((first, _))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                first
            }
            _ => DEFAULT_REGISTRY,
        }
    }
}

impl Display for TagReference {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}

// Splits off a trailing `:tag`, leaving registry ports alone.
fn split_tag(value: &str) -> (&str, Option<&str>) {
    match value.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository, Some(tag)),
        _ => (value, None),
    }
}

// The repository without a leading registry component.
fn repository_part(value: &str) -> &str {
    match value.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            rest
        }
        _ => value,
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ReferenceError {
    #[error("image reference must not be empty")]
    Empty,

    #[error("invalid image reference: `{0}`")]
    InvalidCharacters(String),

    #[error("image repository must be lower-case: `{0}`")]
    UppercaseRepository(String),
}

use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::api::Api;
use crate::mixins::find_missing;
use crate::stack::Stack;

/// The identity of a buildpack.
///
/// An empty version means "unspecified", to be resolved against an index that
/// knows which versions exist.
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq, Hash)]
pub struct BuildpackInfo {
    pub id: String,
    #[serde(default)]
    pub version: String,
}

impl BuildpackInfo {
    #[must_use]
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl Display for BuildpackInfo {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            formatter.write_str(&self.id)
        } else {
            write!(formatter, "{}@{}", self.id, self.version)
        }
    }
}

/// Data structure for the buildpack descriptor (`buildpack.toml`).
///
/// A descriptor with a non-empty `order` describes a meta-buildpack: it has
/// no build logic of its own and delegates to the referenced buildpacks,
/// which is why it may legitimately declare zero stacks.
///
/// # Example:
/// ```
/// use pack_data::buildpack::BuildpackDescriptor;
///
/// let toml_str = r#"
/// api = "0.2"
///
/// [buildpack]
/// id = "example/ruby"
/// version = "1.0.0"
///
/// [[stacks]]
/// id = "io.buildpacks.stacks.bionic"
/// mixins = ["build:jq"]
/// "#;
///
/// let descriptor = toml::from_str::<BuildpackDescriptor>(toml_str).unwrap();
/// assert_eq!(descriptor.info.id, "example/ruby");
/// assert!(!descriptor.is_meta());
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct BuildpackDescriptor {
    pub api: Api,
    #[serde(rename = "buildpack")]
    pub info: BuildpackInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<Stack>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<OrderEntry>,
}

impl BuildpackDescriptor {
    /// Whether this descriptor describes a meta-buildpack.
    #[must_use]
    pub fn is_meta(&self) -> bool {
        !self.order.is_empty()
    }

    /// Checks that this buildpack can run on the given stack with the given mixins.
    ///
    /// Meta-buildpacks always pass: stack support is delegated to the buildpacks
    /// referenced by their order. For anything else the descriptor must carry a
    /// stack entry matching `stack_id`, and, when `require_mixins` is set, every
    /// mixin that entry requires must be present in `available_mixins`.
    pub fn ensure_stack_support(
        &self,
        stack_id: &str,
        available_mixins: &[String],
        require_mixins: bool,
    ) -> Result<(), StackSupportError> {
        if self.is_meta() {
            return Ok(());
        }

        let stack = self
            .stacks
            .iter()
            .find(|stack| stack.id == stack_id)
            .ok_or_else(|| StackSupportError::StackMismatch {
                buildpack: self.info.clone(),
                stack_id: String::from(stack_id),
            })?;

        if require_mixins {
            let missing = find_missing(available_mixins, &stack.mixins);
            if !missing.is_empty() {
                return Err(StackSupportError::MissingMixins {
                    buildpack: self.info.clone(),
                    missing,
                });
            }
        }

        Ok(())
    }
}

/// One detection/build candidate group within a meta-buildpack or builder order.
#[derive(Deserialize, Serialize, Debug, Clone, Default, Eq, PartialEq)]
pub struct OrderEntry {
    pub group: Vec<BuildpackRef>,
}

/// A reference to a buildpack within an order group.
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct BuildpackRef {
    #[serde(flatten)]
    pub info: BuildpackInfo,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl From<BuildpackInfo> for BuildpackRef {
    fn from(info: BuildpackInfo) -> Self {
        Self {
            info,
            optional: false,
        }
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum StackSupportError {
    #[error("buildpack `{buildpack}` does not support stack `{stack_id}`")]
    StackMismatch {
        buildpack: BuildpackInfo,
        stack_id: String,
    },

    #[error("buildpack `{buildpack}` requires missing mixin(s): {}", .missing.join(", "))]
    MissingMixins {
        buildpack: BuildpackInfo,
        missing: Vec<String>,
    },
}

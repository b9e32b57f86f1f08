use serde::{Deserialize, Serialize};

use crate::buildpack::BuildpackInfo;
use crate::stack::Stack;

/// Image label under which a buildpackage records its default buildpack and
/// the stacks the package declares support for.
pub const METADATA_LABEL: &str = "io.buildpacks.buildpackage.metadata";

/// The `io.buildpacks.buildpackage.metadata` label payload.
#[derive(Deserialize, Serialize, Debug, Clone, Eq, PartialEq)]
pub struct PackageMetadata {
    #[serde(flatten)]
    pub info: BuildpackInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stacks: Vec<Stack>,
}

//! Stack capability views over an image.
//!
//! A stack image carries its stack ID and mixin set as labels. Mixins are
//! partitioned by prefix: `build:` marks a build-time-only mixin, `run:` a
//! run-time-only mixin, anything else is common to both phases.

use crate::image::{Image, ImageError, read_json_label};
use crate::mixins::RunImage;

pub const STACK_ID_LABEL: &str = "io.buildpacks.stack.id";
pub const STACK_MIXINS_LABEL: &str = "io.buildpacks.stack.mixins";

const BUILD_PREFIX: &str = "build:";
const RUN_PREFIX: &str = "run:";

/// The stack identity and partitioned mixins of one image, read once from
/// its labels.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StackImage {
    name: String,
    stack_id: String,
    common_mixins: Vec<String>,
    build_only_mixins: Vec<String>,
    run_only_mixins: Vec<String>,
}

impl StackImage {
    pub fn from_image(image: &dyn Image) -> Result<Self, ImageError> {
        let name = image.name();

        let stack_id = image
            .label(STACK_ID_LABEL)?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ImageError::MissingLabel {
                image: name.clone(),
                label: String::from(STACK_ID_LABEL),
            })?;

        let mixins: Vec<String> = read_json_label(image, STACK_MIXINS_LABEL)?.unwrap_or_default();

        let mut common_mixins = Vec::new();
        let mut build_only_mixins = Vec::new();
        let mut run_only_mixins = Vec::new();
        for mixin in mixins {
            if mixin.starts_with(BUILD_PREFIX) {
                build_only_mixins.push(mixin);
            } else if mixin.starts_with(RUN_PREFIX) {
                run_only_mixins.push(mixin);
            } else {
                common_mixins.push(mixin);
            }
        }

        Ok(Self {
            name,
            stack_id,
            common_mixins,
            build_only_mixins,
            run_only_mixins,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    #[must_use]
    pub fn common_mixins(&self) -> &[String] {
        &self.common_mixins
    }

    #[must_use]
    pub fn build_only_mixins(&self) -> &[String] {
        &self.build_only_mixins
    }

    #[must_use]
    pub fn run_only_mixins(&self) -> &[String] {
        &self.run_only_mixins
    }
}

impl RunImage for StackImage {
    fn name(&self) -> &str {
        self.name()
    }

    fn common_mixins(&self) -> &[String] {
        self.common_mixins()
    }

    fn run_only_mixins(&self) -> &[String] {
        self.run_only_mixins()
    }
}

//! Stack and mixin compatibility validation across a builder/run image pair.

use pack_data::buildpack::{BuildpackDescriptor, BuildpackInfo, StackSupportError};
use pack_data::layers::BuildpackLayers;
use pack_data::mixins::find_missing;

use crate::buildpack::Buildpack;

/// The build-time capabilities a builder image exposes for validation.
pub trait BuildImage {
    fn stack_id(&self) -> &str;
    fn common_mixins(&self) -> &[String];
    fn build_only_mixins(&self) -> &[String];
    fn buildpack_layers(&self) -> &BuildpackLayers;
}

/// The run-time capabilities a run image exposes for validation.
pub trait RunImage {
    fn name(&self) -> &str;
    fn common_mixins(&self) -> &[String];
    fn run_only_mixins(&self) -> &[String];
}

/// The set of mixins a buildpack may legitimately require from this
/// builder/run pair: the mixins common to both images' common sets, plus the
/// builder's build-only mixins, plus the run image's run-only mixins.
///
/// This is deliberately NOT the union of the two common sets. A mixin only
/// present on one side would validate fine and then be missing at the other
/// phase:
///
/// ```text
/// Run image mixins:   [A, B]
/// Build image mixins: [A]
/// Union: [A, B]      -> buildpack requiring [A, B] passes, build phase breaks
/// Intersect: [A]     -> buildpack requiring [A, B] is rejected up front
/// ```
#[must_use]
pub fn assemble_available_mixins(build: &dyn BuildImage, run: &dyn RunImage) -> Vec<String> {
    let mut available: Vec<String> = run
        .common_mixins()
        .iter()
        .filter(|mixin| build.common_mixins().contains(mixin))
        .cloned()
        .collect();

    available.extend_from_slice(build.build_only_mixins());
    available.extend_from_slice(run.run_only_mixins());
    available
}

/// Validates the full buildpack set (builder-embedded plus newly fetched)
/// against the given builder/run pair.
///
/// The pair itself is checked first: every common mixin the builder declares
/// must also be common on the run image. Then every buildpack must support
/// the builder's stack with the assembled available mixins.
pub fn validate_mixins(
    additional_buildpacks: &[Buildpack],
    build: &dyn BuildImage,
    run: &dyn RunImage,
) -> Result<(), MixinValidationError> {
    let missing = find_missing(run.common_mixins(), build.common_mixins());
    if !missing.is_empty() {
        return Err(MixinValidationError::MissingCommonMixins {
            run_image: String::from(run.name()),
            missing,
        });
    }

    let available = assemble_available_mixins(build, run);
    for descriptor in all_buildpacks(build, additional_buildpacks) {
        descriptor.ensure_stack_support(build.stack_id(), &available, true)?;
    }

    Ok(())
}

/// Every buildpack known to the pair under validation: the builder's embedded
/// layer index plus the buildpacks fetched for this build.
fn all_buildpacks(
    build: &dyn BuildImage,
    additional_buildpacks: &[Buildpack],
) -> Vec<BuildpackDescriptor> {
    let mut all = Vec::new();

    for (id, versions) in build.buildpack_layers() {
        for (version, layer) in versions {
            all.push(BuildpackDescriptor {
                api: layer.api,
                info: BuildpackInfo::new(id.clone(), version.clone()),
                stacks: layer.stacks.clone(),
                order: layer.order.clone(),
            });
        }
    }

    for buildpack in additional_buildpacks {
        all.push(buildpack.descriptor().clone());
    }

    all
}

#[derive(thiserror::Error, Debug)]
pub enum MixinValidationError {
    #[error("`{run_image}` missing required mixin(s): {}", .missing.join(", "))]
    MissingCommonMixins {
        run_image: String,
        missing: Vec<String>,
    },

    #[error(transparent)]
    StackSupport(#[from] StackSupportError),
}

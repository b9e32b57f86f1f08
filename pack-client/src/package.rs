//! Assembles one or more buildpacks into a distributable buildpackage image.

use pack_data::buildpack::{BuildpackInfo, StackSupportError};
use pack_data::buildpackage::{METADATA_LABEL, PackageMetadata};
use pack_data::layers::{BUILDPACK_LAYERS_LABEL, BuildpackLayers, put_buildpack_layer};
use pack_data::stack::Stack;

use crate::buildpack::Buildpack;
use crate::image::{Image, ImageError, ImageFactory, set_json_label};
use crate::layer::{LayerError, buildpack_to_layer_tar, layer_diff_id};

/// Builds a buildpackage: an OCI image carrying a set of buildpacks as
/// content-addressed layers, one of which is designated the default.
///
/// All configuration is validated up front in [`save`](PackageBuilder::save);
/// no image is created, and nothing is written anywhere, for an invalid
/// configuration.
pub struct PackageBuilder<'a> {
    image_factory: &'a dyn ImageFactory,
    default_buildpack: Option<BuildpackInfo>,
    buildpacks: Vec<Buildpack>,
    stacks: Vec<Stack>,
}

impl<'a> PackageBuilder<'a> {
    #[must_use]
    pub fn new(image_factory: &'a dyn ImageFactory) -> Self {
        Self {
            image_factory,
            default_buildpack: None,
            buildpacks: Vec::new(),
            stacks: Vec::new(),
        }
    }

    /// Designates the buildpack the package resolves to by default. The
    /// identity must match one of the included buildpacks by `save` time.
    pub fn set_default_buildpack(&mut self, info: BuildpackInfo) {
        self.default_buildpack = Some(info);
    }

    pub fn add_buildpack(&mut self, buildpack: Buildpack) {
        self.buildpacks.push(buildpack);
    }

    /// Declares a stack the package supports. Declaring the same stack ID
    /// twice is a configuration error surfaced by `save`.
    pub fn add_stack(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    /// Validates the configuration, then assembles and persists the package
    /// image under `repo_name`, local-only unless `publish` is set.
    pub fn save(&self, repo_name: &str, publish: bool) -> Result<Box<dyn Image>, PackageError> {
        let default = self.validate()?;

        let mut image = self
            .image_factory
            .new_image(repo_name, !publish)?;

        set_json_label(
            &mut *image,
            METADATA_LABEL,
            &PackageMetadata {
                info: default.descriptor().info.clone(),
                stacks: self.stacks.clone(),
            },
        )?;

        let tmp_dir = tempfile::tempdir().map_err(PackageError::TempDir)?;

        let mut layers = BuildpackLayers::new();
        for buildpack in self.dependencies_then_default(default) {
            let layer_tar = buildpack_to_layer_tar(tmp_dir.path(), buildpack)?;
            image.add_layer(&layer_tar)?;
            let diff_id = layer_diff_id(&layer_tar)?;
            put_buildpack_layer(&mut layers, buildpack.descriptor(), diff_id);
        }

        set_json_label(&mut *image, BUILDPACK_LAYERS_LABEL, &layers)?;

        image.save()?;
        Ok(image)
    }

    // Steps 1-5: everything that can fail for configuration reasons, before
    // any image I/O happens.
    fn validate(&self) -> Result<&Buildpack, PackageError> {
        let default_info = self
            .default_buildpack
            .as_ref()
            .ok_or(PackageError::NoDefaultBuildpack)?;

        let default = self
            .buildpacks
            .iter()
            .find(|buildpack| buildpack.descriptor().info == *default_info)
            .ok_or_else(|| PackageError::DefaultNotIncluded(default_info.clone()))?;

        let mut seen = Vec::new();
        for stack in &self.stacks {
            if seen.contains(&&stack.id) {
                return Err(PackageError::DuplicateStack(stack.id.clone()));
            }
            seen.push(&stack.id);
        }

        if self.stacks.is_empty() && !default.descriptor().is_meta() {
            return Err(PackageError::NoStacksDeclared);
        }

        for stack in &self.stacks {
            for buildpack in &self.buildpacks {
                buildpack
                    .descriptor()
                    .ensure_stack_support(&stack.id, &stack.mixins, true)?;
            }
        }

        Ok(default)
    }

    // Layer sequencing only; the default buildpack always lands last.
    fn dependencies_then_default(
        &'a self,
        default: &'a Buildpack,
    ) -> impl Iterator<Item = &'a Buildpack> {
        self.buildpacks
            .iter()
            .filter(move |buildpack| !std::ptr::eq(*buildpack, default))
            .chain(std::iter::once(default))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PackageError {
    #[error("a default buildpack must be set")]
    NoDefaultBuildpack,

    #[error("default buildpack `{0}` is not among the included buildpacks")]
    DefaultNotIncluded(BuildpackInfo),

    #[error("stack `{0}` was declared more than once")]
    DuplicateStack(String),

    #[error("package must declare at least one stack")]
    NoStacksDeclared,

    #[error(transparent)]
    StackSupport(#[from] StackSupportError),

    #[error("creating temporary directory: {0}")]
    TempDir(std::io::Error),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Layer(#[from] LayerError),
}

//! A builder image view: metadata, embedded buildpack index and the
//! mutations used to compose an ephemeral builder from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pack_data::api::Api;
use pack_data::buildpack::OrderEntry;
use pack_data::layers::{BUILDPACK_LAYERS_LABEL, BuildpackLayers, put_buildpack_layer};

use crate::buildpack::Buildpack;
use crate::image::{Image, ImageError, read_json_label, read_required_json_label, set_json_label};
use crate::layer::{LayerError, buildpack_to_layer_tar, layer_diff_id};
use crate::mixins::BuildImage;
use crate::stack_image::StackImage;

pub const BUILDER_METADATA_LABEL: &str = "io.buildpacks.builder.metadata";
pub const ORDER_LABEL: &str = "io.buildpacks.buildpack.order";

/// The `io.buildpacks.builder.metadata` label payload.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BuilderMetadata {
    pub stack: StackMetadata,
    #[serde(default)]
    pub lifecycle: LifecycleMetadata,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct StackMetadata {
    #[serde(rename = "runImage", default)]
    pub run_image: RunImageMetadata,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RunImageMetadata {
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct LifecycleMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub api: LifecycleApis,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LifecycleApis {
    #[serde(default = "default_api")]
    pub buildpack: Api,
    #[serde(default = "default_api")]
    pub platform: Api,
}

impl Default for LifecycleApis {
    fn default() -> Self {
        Self {
            buildpack: default_api(),
            platform: default_api(),
        }
    }
}

// Builders predating API metadata implement the first cut of both APIs.
fn default_api() -> Api {
    Api { major: 0, minor: 1 }
}

/// A builder image together with its parsed metadata.
///
/// Mutations (`set_env`, `add_buildpack`, `set_order`) accumulate on this
/// view and hit the underlying image only on [`save`](Builder::save), which
/// persists exactly once.
#[derive(Debug)]
pub struct Builder {
    image: Box<dyn Image>,
    metadata: BuilderMetadata,
    stack: StackImage,
    layers: BuildpackLayers,
    order: Vec<OrderEntry>,
    env: BTreeMap<String, String>,
    additional_buildpacks: Vec<Buildpack>,
}

impl Builder {
    /// Wraps an image carrying builder metadata, stack and layer labels.
    pub fn from_image(image: Box<dyn Image>) -> Result<Self, BuilderError> {
        let stack = StackImage::from_image(&*image)?;
        let metadata: BuilderMetadata = read_required_json_label(&*image, BUILDER_METADATA_LABEL)?;
        let layers: BuildpackLayers =
            read_json_label(&*image, BUILDPACK_LAYERS_LABEL)?.unwrap_or_default();
        let order: Vec<OrderEntry> = read_json_label(&*image, ORDER_LABEL)?.unwrap_or_default();

        Ok(Self {
            image,
            metadata,
            stack,
            layers,
            order,
            env: BTreeMap::new(),
            additional_buildpacks: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.image.name()
    }

    /// Points the underlying image handle at a new reference. The image the
    /// handle was fetched from keeps existing under its original name.
    pub fn rename(&mut self, name: &str) {
        self.image.rename(name);
    }

    #[must_use]
    pub fn metadata(&self) -> &BuilderMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn order(&self) -> &[OrderEntry] {
        &self.order
    }

    #[must_use]
    pub fn platform_api(&self) -> Api {
        self.metadata.lifecycle.api.platform
    }

    /// Build-time environment applied to the image on save.
    pub fn set_env(&mut self, env: BTreeMap<String, String>) {
        self.env = env;
    }

    /// Grafts an additional buildpack onto the builder as a new layer.
    pub fn add_buildpack(&mut self, buildpack: Buildpack) {
        self.additional_buildpacks.push(buildpack);
    }

    /// Replaces the builder's detection order.
    pub fn set_order(&mut self, order: Vec<OrderEntry>) {
        self.order = order;
    }

    /// Writes accumulated mutations and persists the image.
    pub fn save(&mut self) -> Result<(), BuilderError> {
        let tmp_dir = tempfile::tempdir().map_err(BuilderError::TempDir)?;

        for buildpack in self.additional_buildpacks.drain(..) {
            log::debug!(
                "adding buildpack `{}` to builder `{}`",
                buildpack.descriptor().info,
                self.image.name()
            );

            let layer_tar = buildpack_to_layer_tar(tmp_dir.path(), &buildpack)?;
            self.image.add_layer(&layer_tar)?;
            let diff_id = layer_diff_id(&layer_tar)?;
            put_buildpack_layer(&mut self.layers, buildpack.descriptor(), diff_id);
        }

        set_json_label(&mut *self.image, BUILDPACK_LAYERS_LABEL, &self.layers)?;
        set_json_label(&mut *self.image, ORDER_LABEL, &self.order)?;

        for (key, value) in &self.env {
            self.image.set_env(key, value)?;
        }

        self.image.save()?;
        Ok(())
    }
}

impl BuildImage for Builder {
    fn stack_id(&self) -> &str {
        self.stack.stack_id()
    }

    fn common_mixins(&self) -> &[String] {
        self.stack.common_mixins()
    }

    fn build_only_mixins(&self) -> &[String] {
        self.stack.build_only_mixins()
    }

    fn buildpack_layers(&self) -> &BuildpackLayers {
        &self.layers
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BuilderError {
    #[error("creating temporary directory: {0}")]
    TempDir(std::io::Error),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Layer(#[from] LayerError),
}

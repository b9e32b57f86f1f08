//! The image store contract consumed by the client core.
//!
//! The backing implementation (daemon or registry) lives outside this crate;
//! everything here is expressed against these traits so the core can be
//! exercised with in-memory fakes.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A mutable handle to a single OCI image.
///
/// Mutations accumulate on the handle and are persisted by exactly one
/// [`save`](Image::save) call. A handle that is dropped without `save` leaves
/// no trace in the backing store.
pub trait Image: std::fmt::Debug {
    fn name(&self) -> String;

    /// Points the handle at a new reference without touching the store.
    fn rename(&mut self, name: &str);

    fn label(&self, key: &str) -> Result<Option<String>, ImageError>;

    fn set_label(&mut self, key: &str, value: &str) -> Result<(), ImageError>;

    fn set_env(&mut self, key: &str, value: &str) -> Result<(), ImageError>;

    /// Adds the uncompressed layer tar at the given path to the image.
    fn add_layer(&mut self, layer_tar: &Path) -> Result<(), ImageError>;

    fn save(&mut self) -> Result<(), ImageError>;
}

/// Fetches existing images, optionally pulling them into the local daemon.
pub trait ImageFetcher {
    fn fetch(&self, name: &str, daemon: bool, pull: bool) -> Result<Box<dyn Image>, ImageError>;
}

/// Creates new, empty images scoped local-only or push-capable.
pub trait ImageFactory {
    fn new_image(&self, repo_name: &str, local: bool) -> Result<Box<dyn Image>, ImageError>;
}

/// Removes an image from the local store, used for scratch image cleanup.
pub trait ImageRemover {
    fn remove_image(&self, name: &str) -> Result<(), ImageError>;
}

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("image operation `{operation}` failed: {source}")]
    Backend {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("image `{image}` is missing required label `{label}`")]
    MissingLabel { image: String, label: String },

    #[error("label `{label}` of image `{image}` could not be parsed: {source}")]
    InvalidLabel {
        image: String,
        label: String,
        source: serde_json::Error,
    },
}

impl ImageError {
    pub fn backend(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// Reads a JSON label into a typed value, or `None` when the label is absent.
pub fn read_json_label<T: DeserializeOwned>(
    image: &dyn Image,
    label: &str,
) -> Result<Option<T>, ImageError> {
    image
        .label(label)?
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|source| ImageError::InvalidLabel {
                image: image.name(),
                label: String::from(label),
                source,
            })
        })
        .transpose()
}

/// Like [`read_json_label`], but absence of the label is an error.
pub fn read_required_json_label<T: DeserializeOwned>(
    image: &dyn Image,
    label: &str,
) -> Result<T, ImageError> {
    read_json_label(image, label)?.ok_or_else(|| ImageError::MissingLabel {
        image: image.name(),
        label: String::from(label),
    })
}

/// Serializes the given value as JSON and writes it under the given label.
pub fn set_json_label<T: Serialize>(
    image: &mut dyn Image,
    label: &str,
    value: &T,
) -> Result<(), ImageError> {
    let raw = serde_json::to_string(value).map_err(|source| ImageError::InvalidLabel {
        image: image.name(),
        label: String::from(label),
        source,
    })?;

    image.set_label(label, &raw)
}

//! A buildpack fetched to the local filesystem: its parsed descriptor plus
//! the directory holding its raw content (`bin/detect`, `bin/build`, ...).

use std::path::{Path, PathBuf};

use pack_common::toml_file::{TomlFileError, read_toml_file};
use pack_data::buildpack::BuildpackDescriptor;

#[derive(Debug)]
pub struct Buildpack {
    descriptor: BuildpackDescriptor,
    dir: PathBuf,
}

impl Buildpack {
    /// Reads a buildpack from a directory containing a `buildpack.toml`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Result<Self, BuildpackError> {
        let dir = dir.into();
        let descriptor: BuildpackDescriptor = read_toml_file(dir.join("buildpack.toml"))
            .map_err(BuildpackError::ReadDescriptor)?;

        if descriptor.stacks.is_empty() && descriptor.order.is_empty() {
            return Err(BuildpackError::NoStacksOrOrder(
                descriptor.info.to_string(),
            ));
        }

        Ok(Self { descriptor, dir })
    }

    #[must_use]
    pub fn descriptor(&self) -> &BuildpackDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[derive(thiserror::Error, Debug)]
pub enum BuildpackError {
    #[error("reading buildpack descriptor: {0}")]
    ReadDescriptor(TomlFileError),

    #[error("buildpack `{0}` must support at least one stack or have an order")]
    NoStacksOrOrder(String),
}

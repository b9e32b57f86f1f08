//! The blob download contract for URI- or path-specified buildpacks.
//!
//! The HTTP/filesystem implementation lives outside this crate.

use std::path::PathBuf;

/// Fetches the blob at the given location and returns the directory its
/// content was unpacked into.
pub trait Downloader {
    fn download(&self, location: &str) -> Result<PathBuf, DownloadError>;
}

#[derive(thiserror::Error, Debug)]
#[error("failed to download blob from `{location}`: {source}")]
pub struct DownloadError {
    pub location: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

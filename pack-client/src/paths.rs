//! Buildpack locator classification helpers.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use uriparse::URIReference;

/// Whether the given locator is a URI (has a scheme) rather than a bare path
/// or buildpack ID.
#[must_use]
pub fn is_uri(locator: &str) -> bool {
    URIReference::try_from(locator)
        .map(|uri| uri.scheme().is_some())
        .unwrap_or(false)
}

/// Converts a `file://` URI into a filesystem path.
pub fn file_uri_to_path(uri: &str) -> Result<PathBuf, PathsError> {
    let parsed =
        URIReference::try_from(uri).map_err(|_| PathsError::InvalidFileUri(String::from(uri)))?;

    match parsed.scheme().map(uriparse::Scheme::as_str) {
        Some("file") => Ok(PathBuf::from(format!("/{}", parsed.path().to_string().trim_start_matches('/')))),
        _ => Err(PathsError::InvalidFileUri(String::from(uri))),
    }
}

/// Whether the file at the given path starts with a zip magic number.
pub fn is_zip(path: &Path) -> Result<bool, std::io::Error> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    let read = file.read(&mut magic)?;

    // Regular, empty and spanned zip archives.
    Ok(read == 4
        && [
            [0x50, 0x4b, 0x03, 0x04],
            [0x50, 0x4b, 0x05, 0x06],
            [0x50, 0x4b, 0x07, 0x08],
        ]
        .contains(&magic))
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum PathsError {
    #[error("invalid file URI: `{0}`")]
    InvalidFileUri(String),
}

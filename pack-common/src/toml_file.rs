use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::fs;

/// An error that occurred during reading or writing a TOML file.
#[derive(thiserror::Error, Debug)]
pub enum TomlFileError {
    #[error("I/O error while reading/writing TOML file {}: {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML deserialization error while reading {}: {source}", .path.display())]
    TomlDeserializationError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("TOML serialization error while writing {}: {source}", .path.display())]
    TomlSerializationError {
        path: PathBuf,
        source: toml::ser::Error,
    },
}

/// Serializes the given value as TOML and writes it to the given file path.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be written or the value couldn't be serialized as a TOML string.
pub fn write_toml_file(
    value: &impl Serialize,
    path: impl AsRef<Path>,
) -> Result<(), TomlFileError> {
    let path = path.as_ref();
    let contents = toml::to_string(value).map_err(|source| {
        TomlFileError::TomlSerializationError {
            path: path.to_path_buf(),
            source,
        }
    })?;

    fs::write(path, contents).map_err(|source| TomlFileError::IoError {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the file at the given path and parses it as `A`.
///
/// # Errors
///
/// Will return `Err` if the file couldn't be read or its contents couldn't be deserialized.
pub fn read_toml_file<A: DeserializeOwned>(path: impl AsRef<Path>) -> Result<A, TomlFileError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| TomlFileError::IoError {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&contents).map_err(|source| TomlFileError::TomlDeserializationError {
        path: path.to_path_buf(),
        source,
    })
}

//! Content-addressed layer construction.
//!
//! A buildpack becomes one uncompressed tar rooted at
//! `/cnb/buildpacks/<id>/<version>/`, with fixed ownership (0:0), a fixed
//! file mode and zeroed timestamps so the same content always produces the
//! same diff ID.

use std::fs;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::buildpack::Buildpack;

const LAYER_FILE_MODE: u32 = 0o755;

/// Serializes the given buildpack into a layer tar inside `dest_dir` and
/// returns the path of the written tar.
pub fn buildpack_to_layer_tar(
    dest_dir: &Path,
    buildpack: &Buildpack,
) -> Result<PathBuf, LayerError> {
    let info = &buildpack.descriptor().info;
    let layer_tar = dest_dir.join(format!(
        "{}.{}.tar",
        info.id.replace('/', "_"),
        info.version
    ));

    let file = File::create(&layer_tar)
        .map_err(|source| LayerError::io("create layer tar", source))?;
    let mut tar = tar::Builder::new(BufWriter::new(file));

    // Entry paths are relative; the layer is applied at the image root.
    let root = format!("cnb/buildpacks/{}/{}", info.id, info.version);
    for dir in ancestors_inside_out(&root) {
        append_dir(&mut tar, &dir)?;
    }
    append_tree(&mut tar, buildpack.dir(), &root)?;

    tar.into_inner()
        .and_then(|writer| writer.into_inner().map_err(std::io::IntoInnerError::into_error))
        .map_err(|source| LayerError::io("finish layer tar", source))?;

    Ok(layer_tar)
}

/// Computes the diff ID (`sha256:<hex>` over the uncompressed stream) of the
/// layer tar at the given path.
pub fn layer_diff_id(layer_tar: &Path) -> Result<String, LayerError> {
    let mut file =
        File::open(layer_tar).map_err(|source| LayerError::io("open layer tar", source))?;
    let mut buffer = [0x00; 10 * 1024];
    let mut sha256 = Sha256::default();

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|source| LayerError::io("read layer tar", source))?;
        if read == 0 {
            break;
        }
        Digest::update(&mut sha256, &buffer[..read]);
    }

    Ok(format!("sha256:{:x}", sha256.finalize()))
}

// "cnb/buildpacks/a/b" -> ["cnb", "cnb/buildpacks", ...]
fn ancestors_inside_out(path: &str) -> Vec<String> {
    let mut ancestors = Vec::new();
    let mut current = String::new();
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        ancestors.push(current.clone());
    }
    ancestors
}

fn append_dir<W: Write>(tar: &mut tar::Builder<W>, path: &str) -> Result<(), LayerError> {
    let mut header = deterministic_header();
    header.set_entry_type(tar::EntryType::Directory);
    header.set_size(0);

    tar.append_data(&mut header, format!("{path}/"), std::io::empty())
        .map_err(|source| LayerError::io("append directory entry", source))
}

// Entries are appended in sorted order so the tar bytes only depend on the
// buildpack content, never on readdir order.
fn append_tree<W: Write>(
    tar: &mut tar::Builder<W>,
    source_dir: &Path,
    dest_path: &str,
) -> Result<(), LayerError> {
    let mut entries: Vec<_> = fs::read_dir(source_dir)
        .map_err(|source| LayerError::io("read buildpack directory", source))?
        .collect::<Result<_, _>>()
        .map_err(|source| LayerError::io("read buildpack directory", source))?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let file_name = entry.file_name();
        let dest_path = format!("{}/{}", dest_path, file_name.to_string_lossy());
        let file_type = entry
            .file_type()
            .map_err(|source| LayerError::io("stat buildpack entry", source))?;

        if file_type.is_dir() {
            append_dir(tar, &dest_path)?;
            append_tree(tar, &entry.path(), &dest_path)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())
                .map_err(|source| LayerError::io("resolve symlink", source))?;
            let mut header = deterministic_header();
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            tar.append_link(&mut header, &dest_path, target)
                .map_err(|source| LayerError::io("append symlink entry", source))?;
        } else {
            let content = fs::read(entry.path())
                .map_err(|source| LayerError::io("read buildpack file", source))?;
            let mut header = deterministic_header();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(content.len() as u64);
            tar.append_data(&mut header, &dest_path, content.as_slice())
                .map_err(|source| LayerError::io("append file entry", source))?;
        }
    }

    Ok(())
}

fn deterministic_header() -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_mode(LAYER_FILE_MODE);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);
    header
}

#[derive(thiserror::Error, Debug)]
pub enum LayerError {
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        source: std::io::Error,
    },
}

impl LayerError {
    fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use super::*;

    fn fixture_buildpack(dir: &Path) -> Buildpack {
        fs::write(
            dir.join("buildpack.toml"),
            r#"
api = "0.2"

[buildpack]
id = "bp.1.id"
version = "bp.1.version"

[[stacks]]
id = "stack.id.1"
"#,
        )
        .unwrap();
        fs::create_dir(dir.join("bin")).unwrap();
        fs::write(dir.join("bin").join("build"), "build-contents").unwrap();
        fs::write(dir.join("bin").join("detect"), "detect-contents").unwrap();

        Buildpack::from_dir(dir).unwrap()
    }

    fn tar_entries(tar_bytes: &[u8]) -> BTreeMap<String, (tar::Header, Vec<u8>)> {
        let mut archive = tar::Archive::new(Cursor::new(tar_bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let header = entry.header().clone();
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                (path, (header, content))
            })
            .collect()
    }

    #[test]
    fn layer_tar_contains_buildpack_under_cnb_path() {
        let bp_dir = tempfile::tempdir().unwrap();
        let buildpack = fixture_buildpack(bp_dir.path());

        let dest_dir = tempfile::tempdir().unwrap();
        let layer_tar = buildpack_to_layer_tar(dest_dir.path(), &buildpack).unwrap();
        let entries = tar_entries(&fs::read(layer_tar).unwrap());

        let (header, content) = &entries["cnb/buildpacks/bp.1.id/bp.1.version/bin/build"];
        assert_eq!(content, b"build-contents");
        assert_eq!(header.uid().unwrap(), 0);
        assert_eq!(header.gid().unwrap(), 0);
        assert_eq!(header.mode().unwrap(), 0o755);
        assert_eq!(header.mtime().unwrap(), 0);

        let (_, content) = &entries["cnb/buildpacks/bp.1.id/bp.1.version/bin/detect"];
        assert_eq!(content, b"detect-contents");

        for dir in [
            "cnb/",
            "cnb/buildpacks/",
            "cnb/buildpacks/bp.1.id/",
            "cnb/buildpacks/bp.1.id/bp.1.version/",
        ] {
            assert!(entries.contains_key(dir), "missing directory entry {dir}");
        }
    }

    #[test]
    fn diff_id_is_stable_across_rebuilds() {
        let bp_dir = tempfile::tempdir().unwrap();
        let buildpack = fixture_buildpack(bp_dir.path());

        let dest_a = tempfile::tempdir().unwrap();
        let dest_b = tempfile::tempdir().unwrap();
        let tar_a = buildpack_to_layer_tar(dest_a.path(), &buildpack).unwrap();
        let tar_b = buildpack_to_layer_tar(dest_b.path(), &buildpack).unwrap();

        let diff_a = layer_diff_id(&tar_a).unwrap();
        let diff_b = layer_diff_id(&tar_b).unwrap();
        assert_eq!(diff_a, diff_b);
        assert!(diff_a.starts_with("sha256:"));
        assert_eq!(diff_a.len(), "sha256:".len() + 64);
    }

    #[test]
    fn diff_id_changes_with_content() {
        let bp_dir = tempfile::tempdir().unwrap();
        let buildpack = fixture_buildpack(bp_dir.path());
        let dest = tempfile::tempdir().unwrap();
        let tar_a = buildpack_to_layer_tar(dest.path(), &buildpack).unwrap();
        let diff_a = layer_diff_id(&tar_a).unwrap();

        fs::write(bp_dir.path().join("bin").join("build"), "other-contents").unwrap();
        let buildpack = Buildpack::from_dir(bp_dir.path()).unwrap();
        let tar_b = buildpack_to_layer_tar(dest.path(), &buildpack).unwrap();

        assert_ne!(diff_a, layer_diff_id(&tar_b).unwrap());
    }
}

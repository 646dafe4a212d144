//! Streaming blob-to-file output with a per-run directory cache.

use std::collections::HashSet;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gitsnap_types::TARGET_PERMISSIONS;
use tracing::{debug, info, warn};

/// What happened to one file handed to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The filesystem rejected the name (too long or invalid characters);
    /// logged and skipped, never fatal.
    Skipped,
}

/// Writes tree paths under an output root.
///
/// Parent directories are created once per run and remembered, so deep
/// trees do not pay a `mkdir` per file.
pub struct Writer {
    output_root: PathBuf,
    hash_markers: bool,
    created_dirs: HashSet<PathBuf>,
}

impl Writer {
    pub fn new(output_root: impl Into<PathBuf>, hash_markers: bool) -> Self {
        Self {
            output_root: output_root.into(),
            hash_markers,
            created_dirs: HashSet::new(),
        }
    }

    /// Write `contents` to `<root>/<rel_path>` with mode 0777, plus the
    /// optional `.hash` marker holding `id_hex`.
    pub fn write_file(
        &mut self,
        rel_path: &str,
        id_hex: &str,
        contents: &[u8],
    ) -> Result<WriteOutcome> {
        let target = self.output_root.join(rel_path);

        if let Some(parent) = target.parent() {
            if !self.ensure_dir(parent)? {
                return Ok(WriteOutcome::Skipped);
            }
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(TARGET_PERMISSIONS);
        }

        let mut file = match options.open(&target) {
            Ok(file) => file,
            Err(err) if is_name_error(&err) => {
                info!(
                    "--- skipping '{}' - path rejected by the filesystem ({err})",
                    target.display()
                );
                return Ok(WriteOutcome::Skipped);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to create target file '{}'", target.display())
                });
            }
        };

        file.write_all(contents).with_context(|| {
            format!(
                "failed to write file contents for '{rel_path}' to '{}'",
                target.display()
            )
        })?;

        debug!("+++ '{rel_path}' to '{}'", target.display());

        if self.hash_markers {
            let mut marker = target.clone().into_os_string();
            marker.push(".hash");
            let marker = PathBuf::from(marker);
            if let Err(err) = std::fs::write(&marker, id_hex) {
                warn!("failed to write hash file of '{rel_path}' to '{}': {err}", marker.display());
            }
        }

        Ok(WriteOutcome::Written)
    }

    /// `Ok(true)` when the directory exists afterwards, `Ok(false)` when the
    /// filesystem rejected the name.
    fn ensure_dir(&mut self, dir: &Path) -> Result<bool> {
        if self.created_dirs.contains(dir) {
            return Ok(true);
        }

        let mut builder = std::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(TARGET_PERMISSIONS);
        }

        match builder.create(dir) {
            Ok(()) => {
                self.created_dirs.insert(dir.to_path_buf());
                Ok(true)
            }
            Err(err) if is_name_error(&err) => {
                info!(
                    "--- skipping '{}' - path rejected by the filesystem ({err})",
                    dir.display()
                );
                Ok(false)
            }
            Err(err) => Err(err).with_context(|| {
                format!("failed to create target directory at '{}'", dir.display())
            }),
        }
    }
}

/// ENAMETOOLONG and EINVAL arrive as these kinds on Linux.
fn is_name_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidFilename | io::ErrorKind::InvalidInput
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_nested_paths_and_reuses_dirs() {
        let out = tempfile::tempdir().unwrap();
        let mut writer = Writer::new(out.path(), false);

        let first = writer.write_file("a/b/one.txt", "0000", b"one").unwrap();
        let second = writer.write_file("a/b/two.txt", "0000", b"two").unwrap();
        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::Written);

        assert_eq!(std::fs::read(out.path().join("a/b/one.txt")).unwrap(), b"one");
        assert_eq!(std::fs::read(out.path().join("a/b/two.txt")).unwrap(), b"two");
        assert_eq!(writer.created_dirs.len(), 1);
    }

    #[test]
    fn overwrites_truncate_previous_contents() {
        let out = tempfile::tempdir().unwrap();
        let mut writer = Writer::new(out.path(), false);
        writer.write_file("f.txt", "0000", b"longer contents").unwrap();
        writer.write_file("f.txt", "0000", b"short").unwrap();
        assert_eq!(std::fs::read(out.path().join("f.txt")).unwrap(), b"short");
    }

    #[test]
    fn hash_marker_lands_next_to_the_file() {
        let out = tempfile::tempdir().unwrap();
        let mut writer = Writer::new(out.path(), true);
        writer
            .write_file("src/app.js", "abc123", b"console.log(1);")
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(out.path().join("src/app.js.hash")).unwrap(),
            "abc123"
        );
    }

    #[test]
    fn over_long_names_are_skipped_not_fatal() {
        let out = tempfile::tempdir().unwrap();
        let mut writer = Writer::new(out.path(), false);
        let long = "x".repeat(300);
        let outcome = writer.write_file(&long, "0000", b"data").unwrap();
        assert_eq!(outcome, WriteOutcome::Skipped);
    }

    #[cfg(unix)]
    #[test]
    fn written_files_carry_open_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let out = tempfile::tempdir().unwrap();
        let mut writer = Writer::new(out.path(), false);
        writer.write_file("run.sh", "0000", b"#!/bin/sh\n").unwrap();
        let mode = std::fs::metadata(out.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        // The umask may clear bits, but owner rwx must survive.
        assert_eq!(mode & 0o700, 0o700);
    }
}

//! Argument surface and directory validation.

use std::path::{Path, PathBuf};

use clap::Parser;
use gitsnap_types::{SnapError, SnapshotConfig};

/// Create a git revision snapshot for an existing repository clone.
///
/// The clone's working tree and index are never touched; symbolic link
/// files are omitted from the output.
#[derive(Parser, Debug)]
#[command(name = "gitsnap", version, about, long_about = None)]
pub struct Cli {
    /// Path to an existing git clone used as the source directory; may
    /// contain no more than a .git directory, the current git state does
    /// not affect the command.
    #[arg(short = 's', long = "src", value_name = "DIR")]
    pub src: PathBuf,

    /// Commit-ish revision.
    #[arg(short = 'r', long = "rev", value_name = "REVISION")]
    pub rev: String,

    /// Output directory; will be created if it does not exist. In stats
    /// mode this names the JSON output file instead.
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    pub out: PathBuf,

    /// Patterns of file paths to include, comma delimited, may contain any
    /// glob pattern.
    #[arg(short = 'i', long = "include", value_name = "PATTERNS", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Patterns of file paths to exclude, comma delimited, may contain any
    /// glob pattern.
    #[arg(short = 'e', long = "exclude", value_name = "PATTERNS", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// CSV file whose first column lists the only tree paths to snapshot.
    #[arg(long = "paths-file", value_name = "FILE")]
    pub paths_file: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long = "verbose", visible_alias = "vv")]
    pub verbose: bool,

    /// Include only text files.
    #[arg(long = "text-only")]
    pub text_only: bool,

    /// Create also hint files mirroring the hash of original files at
    /// <path>.hash.
    #[arg(long = "hash-markers")]
    pub hash_markers: bool,

    /// Ignore case when checking paths against inclusion patterns.
    #[arg(long = "ignore-case")]
    pub ignore_case: bool,

    /// Maximal file size, in MB.
    #[arg(long = "max-size", value_name = "MB", default_value_t = 6)]
    pub max_size: i64,

    /// Disable the files discrepancy double check.
    #[arg(long = "no-double-check")]
    pub no_double_check: bool,

    /// Don't filter out noisy directory names in paths (bin, node_modules
    /// etc).
    #[arg(long = "include-noise-dirs")]
    pub include_noise_dirs: bool,

    /// Write a TSV manifest of every tree entry to this path.
    #[arg(long = "index-file", value_name = "FILE")]
    pub index_file: Option<PathBuf>,

    /// Enumerate (and write the manifest) without materializing file
    /// contents.
    #[arg(long = "index-only")]
    pub index_only: bool,

    /// Write a JSON language statistics document to --out instead of files.
    #[arg(long = "stats-only")]
    pub stats_only: bool,

    /// Disable the built-in stats-mode exclusions and size cap.
    #[arg(long = "stats-no-filter")]
    pub stats_no_filter: bool,
}

impl Cli {
    /// Validate the directories and produce the engine's configuration.
    pub fn into_config(self) -> Result<SnapshotConfig, SnapError> {
        require_directory(&self.src)
            .map_err(|reason| SnapError::BadClonePath(format!("{}: {reason}", self.src.display())))?;
        require_directory(&self.src.join(".git")).map_err(|reason| {
            SnapError::BadClonePath(format!(".git at '{}': {reason}", self.src.display()))
        })?;

        if self.stats_only {
            // Stats mode writes a file at --out; only its parent must exist.
            if let Some(parent) = self.out.parent().filter(|p| !p.as_os_str().is_empty()) {
                create_directory(parent)?;
            }
        } else {
            create_directory(&self.out)?;
        }

        Ok(SnapshotConfig {
            clone_path: self.src,
            revision: self.rev,
            output_path: self.out,
            include_patterns: self.include,
            exclude_patterns: self.exclude,
            paths_file: self.paths_file,
            text_only: self.text_only,
            ignore_case: self.ignore_case,
            max_file_size_bytes: self.max_size.saturating_mul(1024 * 1024),
            create_hash_markers: self.hash_markers,
            skip_double_check: self.no_double_check,
            include_noise_dirs: self.include_noise_dirs,
            index_file_path: self.index_file,
            index_only: self.index_only,
            stats_only: self.stats_only,
            stats_no_filter: self.stats_no_filter,
            verbose: self.verbose,
        })
    }
}

fn require_directory(path: &Path) -> Result<(), String> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err("directory is actually a file".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

fn create_directory(path: &Path) -> Result<(), SnapError> {
    if let Ok(meta) = std::fs::metadata(path) {
        return if meta.is_dir() {
            Ok(())
        } else {
            Err(SnapError::BadOutputPath(format!(
                "directory is actually a file at {}",
                path.display()
            )))
        };
    }
    std::fs::create_dir_all(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::InvalidFilename => SnapError::PathTooLong(path.display().to_string()),
        _ => SnapError::BadOutputPath(format!("{}: {err}", path.display())),
    })
}

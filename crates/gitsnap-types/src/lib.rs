//! # gitsnap-types
//!
//! **Tier 1 (Hard Contract)**
//!
//! This crate defines the contracts shared by every gitsnap crate: the
//! immutable per-run [`SnapshotConfig`] and the coded [`SnapError`] taxonomy
//! that the CLI maps to process exit codes.
//!
//! ## What belongs here
//! * The run configuration struct
//! * The error taxonomy and its exit-code mapping
//!
//! ## What does NOT belong here
//! * File I/O
//! * Git access
//! * CLI argument parsing

#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

/// Permissions applied to snapshot output files and directories.
pub const TARGET_PERMISSIONS: u32 = 0o777;

/// Immutable configuration for one snapshot run.
///
/// Constructed once by the CLI, handed to the engine, and discarded with the
/// run. All other per-run state (compiled globs, created-directory cache,
/// stats counters) lives inside the engine instance.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Absolute path to a directory containing a `.git` subdirectory.
    pub clone_path: PathBuf,
    /// Commit-ish: full SHA, short SHA, branch, tag, `HEAD`, `remotes/origin/X`.
    pub revision: String,
    /// Destination directory (a file path in stats mode).
    pub output_path: PathBuf,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    /// Optional CSV whose first column whitelists tree paths.
    pub paths_file: Option<PathBuf>,
    /// Skip files whose extension is in the binary-extension table.
    pub text_only: bool,
    /// Lowercase paths before all pattern tests (never before writing).
    pub ignore_case: bool,
    /// `0` disables the size filter.
    pub max_file_size_bytes: i64,
    /// Emit `<target>.hash` containing the blob's hex object id.
    pub create_hash_markers: bool,
    pub skip_double_check: bool,
    /// When false, the fixed noisy-directory exclusions are merged in.
    pub include_noise_dirs: bool,
    /// When set, write a TSV manifest of every tree entry to this path.
    pub index_file_path: Option<PathBuf>,
    /// Enumerate (and index) without materializing file contents.
    pub index_only: bool,
    /// Produce the per-language stats JSON instead of a file tree.
    pub stats_only: bool,
    /// Disable the built-in stats-mode exclusions and size cap.
    pub stats_no_filter: bool,
    pub verbose: bool,
}

impl SnapshotConfig {
    /// A config with the given required paths and all optional behavior off.
    ///
    /// `max_file_size_bytes` defaults to the CLI's 6 MB.
    pub fn new(
        clone_path: impl Into<PathBuf>,
        revision: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            clone_path: clone_path.into(),
            revision: revision.into(),
            output_path: output_path.into(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            paths_file: None,
            text_only: false,
            ignore_case: false,
            max_file_size_bytes: 6 * 1024 * 1024,
            create_hash_markers: false,
            skip_double_check: false,
            include_noise_dirs: false,
            index_file_path: None,
            index_only: false,
            stats_only: false,
            stats_no_filter: false,
            verbose: false,
        }
    }
}

/// Fatal errors with an attached exit code.
///
/// Recoverable conditions (missing blobs, over-long names, oversize files)
/// never surface here; they are logged and skipped inside the engine.
#[derive(Debug, Error)]
pub enum SnapError {
    /// The clone directory is missing, not a directory, or has no `.git`.
    #[error("clone at '{0}' is missing or invalid")]
    BadClonePath(String),

    /// The clone's object store could not be opened or is corrupt.
    #[error("not a usable git clone")]
    BadCloneGit(#[source] anyhow::Error),

    /// The output path could not be created or is not a directory.
    #[error("output path '{0}' is invalid")]
    BadOutputPath(String),

    /// Reserved: abbreviated revision hashes rejected by policy.
    ///
    /// The object-store adapter resolves short SHAs natively, so this
    /// variant is kept only so the exit-code contract stays complete.
    #[error("short revision '{0}' was rejected")]
    NoShortSha(String),

    /// The revision does not resolve to a commit in this clone.
    #[error("failed to resolve revision '{revision}'")]
    NoRevision {
        revision: String,
        #[source]
        source: anyhow::Error,
    },

    /// The dry-run and snapshot entry counts still disagreed after retries.
    #[error(
        "discrepancy persists after {attempts} attempts: dry run total count is {dry_run}, but snapshot total count is {actual}"
    )]
    FilesDiscrepancy {
        attempts: u32,
        dry_run: u64,
        actual: u64,
    },

    /// A path component exceeded what the filesystem accepts.
    #[error("path component too long: '{0}'")]
    PathTooLong(String),

    /// Anything else; exits 1.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SnapError {
    /// The process exit code the CLI reports for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PathTooLong(_) => 101,
            Self::BadClonePath(_) => 201,
            Self::BadCloneGit(_) => 202,
            Self::BadOutputPath(_) => 203,
            Self::NoShortSha(_) => 204,
            Self::NoRevision { .. } => 205,
            Self::FilesDiscrepancy { .. } => 206,
            Self::Other(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_contract() {
        assert_eq!(SnapError::PathTooLong("x".into()).exit_code(), 101);
        assert_eq!(SnapError::BadClonePath("x".into()).exit_code(), 201);
        assert_eq!(
            SnapError::BadCloneGit(anyhow::anyhow!("boom")).exit_code(),
            202
        );
        assert_eq!(SnapError::BadOutputPath("x".into()).exit_code(), 203);
        assert_eq!(SnapError::NoShortSha("ab12".into()).exit_code(), 204);
        assert_eq!(
            SnapError::NoRevision {
                revision: "wat".into(),
                source: anyhow::anyhow!("boom"),
            }
            .exit_code(),
            205
        );
        assert_eq!(
            SnapError::FilesDiscrepancy {
                attempts: 3,
                dry_run: 10,
                actual: 11,
            }
            .exit_code(),
            206
        );
        assert_eq!(
            SnapError::Other(anyhow::anyhow!("boom")).exit_code(),
            1
        );
    }

    #[test]
    fn discrepancy_message_names_both_counts() {
        let err = SnapError::FilesDiscrepancy {
            attempts: 3,
            dry_run: 209,
            actual: 210,
        };
        let msg = err.to_string();
        assert!(msg.contains("209"));
        assert!(msg.contains("210"));
        assert!(msg.contains("3 attempts"));
    }

    #[test]
    fn new_config_defaults_are_conservative() {
        let cfg = SnapshotConfig::new("/clone", "HEAD", "/out");
        assert_eq!(cfg.max_file_size_bytes, 6 * 1024 * 1024);
        assert!(!cfg.include_noise_dirs);
        assert!(!cfg.skip_double_check);
        assert!(cfg.include_patterns.is_empty());
        assert!(cfg.paths_file.is_none());
    }
}

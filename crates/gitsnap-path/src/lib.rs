//! # gitsnap-path
//!
//! Path classification for snapshot filtering.
//!
//! Decides, for a repo-relative tree path, whether it belongs in the
//! snapshot: whitelist membership, include/exclude globs (with the
//! prefix-expansion rule), and the text-extension test. Pattern matching is
//! pure string work; nothing here touches the filesystem or the object
//! store.

#![forbid(unsafe_code)]

use std::collections::HashSet;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Extensions that never denote text files. Sorted for binary search.
static BINARY_EXTENSIONS: &[&str] = &[
    "7z", "aac", "ai", "apk", "ar", "avi", "bin", "bmp", "bz2", "cab", "cbr",
    "cbz", "crx", "deb", "dmg", "doc", "docx", "dwg", "dxf", "ebook", "egg",
    "eot", "eps", "epub", "exe", "flac", "flv", "gif", "gpx", "gz", "iso",
    "jpeg", "jpg", "kml", "kmz", "m4a", "mkv", "mobi", "mov", "mp3", "mp4",
    "mpeg", "mpg", "msg", "msi", "odp", "ods", "ogg", "ogm", "otf", "pak",
    "pdf", "pickle", "pkl", "png", "ppt", "ps", "psd", "rar", "rpm", "rst",
    "rtf", "s7z", "shar", "sketch", "svg", "tar", "tbz2", "tgz", "tif",
    "tiff", "tlz", "ttf", "war", "wav", "webp", "whl", "wma", "wmv", "woff",
    "woff2", "xls", "xlsx", "xpi", "zip", "zipx",
];

/// Directories that conventionally hold generated, vendored, or cache
/// contents. Excluded by default as `**/<dir>/**`.
static NOISE_DIRECTORIES: &[&str] = &[
    ".git",
    ".idea",
    "node_modules",
    "bin",
    "debug",
    "release",
    "build",
    "obj",
    "target",
    "venv",
    "dist",
    "app_data",
    "lib",
    "lib64",
    "__pycache__",
    ".cache",
];

/// `true` when `ext` denotes a text file.
///
/// `ext` is the path extension with or without its leading dot. A path with
/// no extension is treated as text (shell scripts, Makefile and friends
/// carry none).
///
/// # Examples
///
/// ```
/// use gitsnap_path::is_text;
///
/// assert!(is_text(".java"));
/// assert!(is_text(""));
/// assert!(!is_text(".zip"));
/// ```
#[must_use]
pub fn is_text(ext: &str) -> bool {
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    if ext.is_empty() {
        return true;
    }
    BINARY_EXTENSIONS.binary_search(&ext).is_err()
}

/// The extension of the final path element, leading dot included, or `""`.
///
/// Mirrors the classifier's own view of extensions so callers test the same
/// string the classifier does.
#[must_use]
pub fn extension_of(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

/// The default `**/<dir>/**` exclusions for noisy directories.
#[must_use]
pub fn noise_exclusion_patterns() -> Vec<String> {
    NOISE_DIRECTORIES
        .iter()
        .map(|dir| format!("**/{dir}/**"))
        .collect()
}

/// Expand patterns starting with `*/` or `**/` to also match without the
/// prefix, so `**/*.java` matches a top-level `Foo.java` too.
///
/// Expansion is additive and applies one strip per original pattern;
/// expanded entries are not themselves re-expanded.
#[must_use]
pub fn expand_patterns(patterns: &[String]) -> Vec<String> {
    let mut expanded = patterns.to_vec();
    for pattern in patterns {
        if let Some(rest) = pattern.strip_prefix("*/") {
            expanded.push(rest.to_string());
        }
        if let Some(rest) = pattern.strip_prefix("**/") {
            expanded.push(rest.to_string());
        }
    }
    expanded
}

fn compile(patterns: &[String], title: &str) -> Result<(GlobSet, usize)> {
    let expanded = expand_patterns(patterns);
    let mut builder = GlobSetBuilder::new();
    for pattern in &expanded {
        let glob = Glob::new(pattern)
            .with_context(|| format!("failed to compile {title} pattern '{pattern}'"))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .with_context(|| format!("failed to build {title} pattern set"))?;
    Ok((set, expanded.len()))
}

/// Why a path was rejected. Logged by the engine under verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A paths-file whitelist is loaded and the path is not in it.
    NotListed,
    /// Include patterns are configured and none matched.
    NotIncluded,
    /// An exclude pattern matched (and no include patterns are configured).
    Excluded,
    /// `text_only` is set and the extension is in the binary table.
    Binary,
}

impl RejectReason {
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::NotListed => "not matching file list",
            Self::NotIncluded => "not matching include patterns",
            Self::Excluded => "matching exclude patterns",
            Self::Binary => "not a text file",
        }
    }
}

/// Compiled filter pipeline for one run.
///
/// The caller is responsible for case normalization: when `ignore_case` is
/// configured, pass an already-lowercased candidate. Patterns and whitelist
/// entries are used exactly as supplied.
#[derive(Debug)]
pub struct PathClassifier {
    includes: GlobSet,
    include_count: usize,
    excludes: GlobSet,
    exclude_count: usize,
    whitelist: HashSet<String>,
    text_only: bool,
}

impl PathClassifier {
    /// Compile both pattern lists (with expansion) once for the run.
    pub fn new(
        include_patterns: &[String],
        exclude_patterns: &[String],
        whitelist: HashSet<String>,
        text_only: bool,
    ) -> Result<Self> {
        let (includes, include_count) = compile(include_patterns, "include")?;
        let (excludes, exclude_count) = compile(exclude_patterns, "exclude")?;
        Ok(Self {
            includes,
            include_count,
            excludes,
            exclude_count,
            whitelist,
            text_only,
        })
    }

    /// Number of patterns after expansion, `(include, exclude)`.
    #[must_use]
    pub fn pattern_counts(&self) -> (usize, usize) {
        (self.include_count, self.exclude_count)
    }

    /// Apply the decision pipeline to a candidate path.
    ///
    /// Order: whitelist, include, exclude, text extension. An explicit
    /// include wins over an exclude: exclude patterns only reject when no
    /// include patterns are configured at all. Surprising, but pinned for
    /// compatibility with the behavior downstream consumers depend on.
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<RejectReason> {
        if !self.whitelist.is_empty() && !self.whitelist.contains(path) {
            return Some(RejectReason::NotListed);
        }

        let has_includes = self.include_count > 0;
        if has_includes && !self.includes.is_match(path) {
            return Some(RejectReason::NotIncluded);
        }

        if self.exclude_count > 0 && self.excludes.is_match(path) && !has_includes {
            return Some(RejectReason::Excluded);
        }

        if self.text_only && !is_text(extension_of(path)) {
            return Some(RejectReason::Binary);
        }

        None
    }
}

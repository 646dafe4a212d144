//! Orchestration of one snapshot run.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Context as _;
use tracing::{debug, info, warn};

use gitsnap_git::{GitError, GixStore, ObjectId, ObjectStore, TreeEntry};
use gitsnap_loc::{count_lines_of_code, Language};
use gitsnap_path::{extension_of, noise_exclusion_patterns, PathClassifier};
use gitsnap_stats::CodeStats;
use gitsnap_types::{Result, SnapError, SnapshotConfig};

use crate::index::IndexWriter;
use crate::writer::{WriteOutcome, Writer};

const DISCREPANCY_ATTEMPTS: u32 = 3;
const DISCREPANCY_DELAY: Duration = Duration::from_secs(3);

/// Stats mode caps counted files at the complexity tool's limit.
const STATS_MAX_FILE_SIZE_BYTES: u64 = 6 * 1024 * 1024;

const BLOB_RETRY_ATTEMPTS: u32 = 3;
const BLOB_RETRY_BASE_DELAY: Duration = Duration::from_millis(50);

/// Filesystems reject longer names; checked before any blob access.
const MAX_BASE_NAME_BYTES: usize = 255;
const MAX_PATH_BYTES: usize = 4095;

/// The stats-mode exclusion set matching the complexity tool's defaults.
const STATS_EXCLUDE_PATTERNS: &[&str] = &[
    "**/bin/**",
    "**/obj/**",
    "**/venv/**",
    "**/node_modules/**",
    "**/.idea/**",
    "**/.git/**",
    "**/site-packages/**",
    "**/vendor/**",
    "**/test_resources/**",
    "**/tests/**",
    "**/testing/**",
    "**/resources/**",
    "**/testdata/**",
    "**/simulation/**",
    "**/simulator/**",
    "**/automation/**",
    "**/*test_resources.*",
    "**/*tests.*",
    "**/*spec.*",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.bundle.js",
];

/// What one run produced.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    /// The commit the revision resolved to (for the accepted attempt).
    pub commit: ObjectId,
    /// Tree entries enumerated by the walker, files and directories alike.
    pub total_count: u64,
    /// Files actually materialized on disk.
    pub written_count: u64,
}

/// Open the clone named by `config` and run the snapshot.
pub fn snapshot(config: &SnapshotConfig) -> Result<Summary> {
    let store = GixStore::open(&config.clone_path).map_err(fatal)?;
    Engine::new(config, &store)?.run()
}

/// Terminal state of one file entry in the pipeline.
enum Outcome {
    Written,
    Counted,
    IndexOnly,
    Skipped,
}

/// One snapshot run over an [`ObjectStore`].
///
/// All mutable state (compiled globs, whitelist, created-directory cache,
/// stats counters) lives here and dies with the run.
pub struct Engine<'a, S> {
    config: &'a SnapshotConfig,
    store: &'a S,
    classifier: PathClassifier,
    writer: Writer,
    stats: Option<CodeStats>,
    retry_delay: Duration,
}

impl<'a, S: ObjectStore> Engine<'a, S> {
    /// Prepare per-run state: whitelist, merged exclusions, compiled globs.
    pub fn new(config: &'a SnapshotConfig, store: &'a S) -> Result<Self> {
        let whitelist = match &config.paths_file {
            Some(path) => load_paths_file(path)?,
            None => HashSet::new(),
        };

        let mut exclude_patterns: Vec<String> = Vec::new();
        if !config.include_noise_dirs {
            exclude_patterns.extend(noise_exclusion_patterns());
        }
        exclude_patterns.extend(config.exclude_patterns.iter().cloned());
        if config.stats_only && !config.stats_no_filter {
            exclude_patterns.extend(STATS_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()));
        }

        let classifier = PathClassifier::new(
            &config.include_patterns,
            &exclude_patterns,
            whitelist,
            config.text_only,
        )
        .map_err(SnapError::Other)?;

        let (include_count, exclude_count) = classifier.pattern_counts();
        debug!("{include_count} include patterns, {exclude_count} exclude patterns after expansion");

        Ok(Self {
            config,
            store,
            classifier,
            writer: Writer::new(&config.output_path, config.create_hash_markers),
            stats: config.stats_only.then(CodeStats::new),
            retry_delay: DISCREPANCY_DELAY,
        })
    }

    /// Override the pause between discrepancy attempts (tests).
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Execute the run and return its counters.
    pub fn run(mut self) -> Result<Summary> {
        let mut commit = self.resolve_commit()?;
        if self.config.stats_only {
            info!(
                "calculating stats for commit '{commit}' for revision '{}' at clone '{}'",
                self.config.revision,
                self.config.clone_path.display()
            );
        } else {
            info!(
                "snapshotting commit '{commit}' for revision '{}' at clone '{}'",
                self.config.revision,
                self.config.clone_path.display()
            );
        }

        let (total_count, written_count) =
            if self.config.skip_double_check || self.config.stats_only {
                self.pass(commit, false)?
            } else {
                self.run_double_checked(&mut commit)?
            };

        if self.config.stats_only {
            self.write_stats()?;
        } else {
            info!(
                "written {written_count} files (out of {total_count} total) to target path '{}'",
                self.config.output_path.display()
            );
        }

        Ok(Summary {
            commit,
            total_count,
            written_count,
        })
    }

    fn resolve_commit(&self) -> Result<ObjectId> {
        self.store.resolve(&self.config.revision).map_err(fatal)
    }

    /// Dry-run and real pass must agree on the entry total; otherwise the
    /// clone changed underneath us and the attempt is repeated.
    fn run_double_checked(&mut self, commit: &mut ObjectId) -> Result<(u64, u64)> {
        let mut last_counts = (0u64, 0u64);
        for attempt in 1..=DISCREPANCY_ATTEMPTS {
            if attempt > 1 {
                info!(
                    "waiting {:?} before retry attempt {attempt}",
                    self.retry_delay
                );
                std::thread::sleep(self.retry_delay);
                info!("re-acquiring commit for retry attempt {attempt}");
                *commit = self.resolve_commit()?;
            }

            let (dry_run_total, _) = self.pass(*commit, true)?;
            let (actual_total, written) = self.pass(*commit, false)?;

            if actual_total == dry_run_total {
                return Ok((actual_total, written));
            }

            warn!(
                "discrepancy detected on attempt {attempt}: dry run total count is {dry_run_total}, but snapshot total count is {actual_total}"
            );
            last_counts = (dry_run_total, actual_total);
        }

        Err(SnapError::FilesDiscrepancy {
            attempts: DISCREPANCY_ATTEMPTS,
            dry_run: last_counts.0,
            actual: last_counts.1,
        })
    }

    /// One enumeration of the commit tree.
    ///
    /// A dry run only counts entries. The real pass applies the pipeline and
    /// feeds the manifest. Returns `(total_count, written_count)`.
    fn pass(&mut self, commit: ObjectId, dry_run: bool) -> Result<(u64, u64)> {
        let store = self.store;
        let walk = store.walk(commit).map_err(fatal)?;

        let mut index = match (&self.config.index_file_path, dry_run) {
            (Some(path), false) => Some(IndexWriter::create(path).map_err(SnapError::Other)?),
            _ => None,
        };

        let mut total_count = 0u64;
        let mut written_count = 0u64;

        for item in walk {
            let entry = item.map_err(fatal)?;
            total_count += 1;
            if dry_run {
                continue;
            }

            if entry.kind.is_file() {
                if let Outcome::Written = self.process_file(&entry)? {
                    written_count += 1;
                }
            } else if !matches!(entry.kind, gitsnap_git::EntryKind::Directory) {
                debug!(
                    "--- skipping '{}' - not regular file - mode: {:?}",
                    entry.path, entry.kind
                );
            }

            if let Some(index) = index.as_mut() {
                index.add(&entry).map_err(SnapError::Other)?;
            }
        }

        if let Some(index) = index {
            index.finish().map_err(SnapError::Other)?;
        }

        Ok((total_count, written_count))
    }

    /// The per-entry pipeline: cheap filters, then blob load, size filter,
    /// and dispatch. Recoverable conditions return `Outcome::Skipped`.
    fn process_file(&mut self, entry: &TreeEntry) -> Result<Outcome> {
        let Ok(path) = std::str::from_utf8(entry.path.as_ref()) else {
            debug!("--- skipping '{}' - file path is not a valid UTF-8 string", entry.path);
            return Ok(Outcome::Skipped);
        };

        let candidate = if self.config.ignore_case {
            std::borrow::Cow::Owned(path.to_lowercase())
        } else {
            std::borrow::Cow::Borrowed(path)
        };

        if let Some(reason) = self.classifier.classify(&candidate) {
            debug!("--- skipping '{path}' - {}", reason.describe());
            return Ok(Outcome::Skipped);
        }

        let base_name = path.rsplit('/').next().unwrap_or(path);
        if base_name.len() > MAX_BASE_NAME_BYTES || path.len() > MAX_PATH_BYTES {
            info!("--- skipping '{path}' - file name is too long to snapshot");
            return Ok(Outcome::Skipped);
        }

        if self.config.index_only {
            return Ok(Outcome::IndexOnly);
        }

        let size = match self.store.blob_size(entry.id) {
            Ok(size) => size,
            Err(GitError::ObjectNotFound { id }) => {
                info!("Can't get blob {id} for '{path}' (ignoring - possible partial clone)");
                return Ok(Outcome::Skipped);
            }
            Err(err) => return Err(fatal(err)),
        };

        if self.config.max_file_size_bytes > 0
            && size as i64 >= self.config.max_file_size_bytes
        {
            info!("--- skipping '{path}' - file size is too large to snapshot - {size}");
            return Ok(Outcome::Skipped);
        }

        if self.config.stats_only {
            self.process_file_for_stats(path, entry, size)?;
            return Ok(Outcome::Counted);
        }

        let contents = match self.blob_bytes_with_retry(entry.id) {
            Ok(contents) => contents,
            Err(GitError::ObjectNotFound { id }) => {
                info!("Can't get blob {id} for '{path}' (ignoring - possible partial clone)");
                return Ok(Outcome::Skipped);
            }
            Err(err) => return Err(fatal(err)),
        };

        let outcome = self
            .writer
            .write_file(path, &entry.id.to_string(), &contents)
            .map_err(|err| SnapError::Other(err.context(format!("failed to write file {path}"))))?;
        Ok(match outcome {
            WriteOutcome::Written => Outcome::Written,
            WriteOutcome::Skipped => Outcome::Skipped,
        })
    }

    /// Stats-mode tail of the pipeline: language lookup, hard size cap,
    /// line counting. Counter failures record zero lines rather than
    /// aborting the run.
    fn process_file_for_stats(&mut self, path: &str, entry: &TreeEntry, size: u64) -> Result<()> {
        let ext = extension_of(path);
        let Some(language) = Language::from_extension(ext) else {
            debug!("--- skipping '{path}' for stats - unrecognized extension '{ext}'");
            return Ok(());
        };

        if !self.config.stats_no_filter && size > STATS_MAX_FILE_SIZE_BYTES {
            debug!(
                "--- skipping '{path}' for stats - file too large ({} MB)",
                size / (1024 * 1024)
            );
            return Ok(());
        }

        let contents = match self.blob_bytes_with_retry(entry.id) {
            Ok(contents) => contents,
            Err(GitError::ObjectNotFound { id }) => {
                info!("Can't get blob {id} for '{path}' (ignoring - possible partial clone)");
                return Ok(());
            }
            Err(err) => {
                warn!("failed to read '{path}' for stats: {err} (skipping)");
                return Ok(());
            }
        };

        let lines_of_code = match count_lines_of_code(&contents, language) {
            Ok(lines) => lines,
            Err(err) => {
                warn!("failed to count lines for '{path}': {err} (using 0)");
                0
            }
        };

        if let Some(stats) = self.stats.as_mut() {
            stats.add_file(language, lines_of_code, size);
        }
        debug!("processed '{path}': language={}, loc={lines_of_code}, size={size}", language.as_str());
        Ok(())
    }

    /// Content reads get a short exponential-backoff retry; only generic
    /// failures are considered transient.
    fn blob_bytes_with_retry(&self, id: ObjectId) -> std::result::Result<Vec<u8>, GitError> {
        let mut delay = BLOB_RETRY_BASE_DELAY;
        let mut attempt = 1;
        loop {
            match self.store.blob_bytes(id) {
                Ok(contents) => return Ok(contents),
                Err(
                    err @ (GitError::ObjectNotFound { .. }
                    | GitError::BadClone(_)
                    | GitError::NoRevision { .. }),
                ) => return Err(err),
                Err(err) if attempt < BLOB_RETRY_ATTEMPTS => {
                    warn!("transient failure reading blob {id} (attempt {attempt}): {err}; retrying");
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn write_stats(&mut self) -> Result<()> {
        let Some(stats) = self.stats.as_mut() else {
            return Ok(());
        };
        stats.finalize();
        let json = stats
            .to_json_pretty()
            .context("failed to serialize stats to JSON")?;
        std::fs::write(&self.config.output_path, json).with_context(|| {
            format!(
                "failed to write stats to '{}'",
                self.config.output_path.display()
            )
        })?;
        info!(
            "stats written to '{}': {} files, {} MB total",
            self.config.output_path.display(),
            stats.total_file_count,
            stats.snapshot_size_in_mb
        );
        Ok(())
    }
}

/// Parse the paths-file whitelist: column 0 of each CSV row; rows whose
/// path is not valid UTF-8 are dropped under verbose logging.
fn load_paths_file(path: &std::path::Path) -> Result<HashSet<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to read paths file from location: '{}'", path.display()))?;

    let mut whitelist = HashSet::new();
    for record in reader.byte_records() {
        let record = record.with_context(|| {
            format!("failed to read paths file from location: '{}'", path.display())
        })?;
        let Some(field) = record.get(0) else {
            continue;
        };
        match std::str::from_utf8(field) {
            Ok(tree_path) => {
                whitelist.insert(tree_path.to_string());
            }
            Err(_) => debug!("skipping invalid UTF-8 path found in the file paths file"),
        }
    }
    Ok(whitelist)
}

fn fatal(err: GitError) -> SnapError {
    match err {
        GitError::NoRevision { revision, source } => SnapError::NoRevision { revision, source },
        GitError::BadClone(source) => SnapError::BadCloneGit(source),
        GitError::ObjectNotFound { id } => {
            SnapError::Other(anyhow::anyhow!("object {id} unexpectedly missing"))
        }
        GitError::Other(source) => SnapError::Other(source),
    }
}

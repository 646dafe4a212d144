//! End-to-end engine runs against locally built fixture clones.

use std::collections::BTreeMap;
use std::path::Path;

use gitsnap_snapshot::snapshot;
use gitsnap_testing::FixtureRepo;
use gitsnap_types::SnapshotConfig;
use tempfile::TempDir;

/// A fixture mirroring the shape of a small real project.
///
/// Tree entries: README.md, docs, docs/guide.md, src, src/Main.java,
/// src/util, src/util/Helper.java, top.java = 8 total, 5 files.
fn sample_repo() -> FixtureRepo {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("initial")
        .file("README.md", b"# readme\n")
        .file("docs/guide.md", b"guide text\n")
        .file("src/Main.java", b"class Main {}\n")
        .file("src/util/Helper.java", b"class Helper {}\n")
        .file("top.java", b"class Top {}\n")
        .commit()
        .unwrap();
    fixture
}

fn out_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn config(fixture: &FixtureRepo, out: &Path) -> SnapshotConfig {
    SnapshotConfig::new(fixture.path(), "HEAD", out)
}

/// Relative paths of all regular files under `root`, with contents.
fn files_on_disk(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn visit(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            let file_type = entry.file_type().unwrap();
            assert!(
                !file_type.is_symlink(),
                "snapshot output must not contain symlinks: {}",
                path.display()
            );
            if file_type.is_dir() {
                visit(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_str().unwrap().to_string();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    visit(root, root, &mut out);
    out
}

fn dir_count(root: &Path) -> usize {
    fn visit(dir: &Path, count: &mut usize) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                *count += 1;
                visit(&entry.path(), count);
            }
        }
    }
    let mut count = 0;
    visit(root, &mut count);
    count
}

#[test]
fn materializes_exact_blob_contents() {
    let fixture = sample_repo();
    let out = out_dir();
    let summary = snapshot(&config(&fixture, out.path())).unwrap();

    assert_eq!(summary.total_count, 8);
    assert_eq!(summary.written_count, 5);

    let files = files_on_disk(out.path());
    assert_eq!(files.len(), 5);
    assert_eq!(files["README.md"], b"# readme\n");
    assert_eq!(files["src/util/Helper.java"], b"class Helper {}\n");
    assert_eq!(dir_count(out.path()), 3);
}

#[test]
fn consecutive_runs_are_idempotent() {
    let fixture = sample_repo();
    let first_out = out_dir();
    let second_out = out_dir();
    snapshot(&config(&fixture, first_out.path())).unwrap();
    snapshot(&config(&fixture, second_out.path())).unwrap();
    assert_eq!(files_on_disk(first_out.path()), files_on_disk(second_out.path()));
}

#[test]
fn include_patterns_restrict_output_and_match_top_level() {
    let fixture = sample_repo();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.include_patterns = vec!["**/*.java".to_string()];
    let summary = snapshot(&cfg).unwrap();

    let files = files_on_disk(out.path());
    let names: Vec<&String> = files.keys().collect();
    assert_eq!(names, ["src/Main.java", "src/util/Helper.java", "top.java"]);
    assert_eq!(summary.written_count, 3);
    // Filters never change the enumeration total.
    assert_eq!(summary.total_count, 8);
}

#[test]
fn include_wins_over_exclude() {
    let fixture = sample_repo();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.include_patterns = vec!["**/*.java".to_string()];
    cfg.exclude_patterns = vec!["**/util/**".to_string()];
    let summary = snapshot(&cfg).unwrap();

    // The exclude would drop Helper.java, but an explicit include takes
    // precedence when both lists are configured.
    assert!(files_on_disk(out.path()).contains_key("src/util/Helper.java"));
    assert_eq!(summary.written_count, 3);
}

#[test]
fn exclude_applies_when_no_includes_are_configured() {
    let fixture = sample_repo();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.exclude_patterns = vec!["**/*.md".to_string()];
    let summary = snapshot(&cfg).unwrap();

    let files = files_on_disk(out.path());
    assert!(!files.contains_key("README.md"));
    assert!(!files.contains_key("docs/guide.md"));
    assert_eq!(summary.written_count, 3);
}

#[test]
fn bare_star_excludes_cross_directories() {
    let fixture = sample_repo();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.exclude_patterns = vec!["*.java".to_string()];
    let summary = snapshot(&cfg).unwrap();

    // `*` spans `/` in this glob dialect: nested java files are gone too.
    assert_eq!(summary.written_count, 2);
    assert!(!files_on_disk(out.path()).contains_key("src/Main.java"));
}

#[test]
fn text_only_skips_binary_extensions() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("mixed")
        .file("logo.png", b"\x89PNG payload")
        .file("src/Main.java", b"class Main {}\n")
        .file("Makefile", b"all:\n")
        .commit()
        .unwrap();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.text_only = true;
    snapshot(&cfg).unwrap();

    let files = files_on_disk(out.path());
    assert!(!files.contains_key("logo.png"));
    assert!(files.contains_key("src/Main.java"));
    // No extension means text.
    assert!(files.contains_key("Makefile"));
}

#[test]
fn size_filter_skips_large_files_and_zero_disables_it() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("sizes")
        .file("small.txt", b"ok\n")
        .file("large.txt", &[b'x'; 128])
        .commit()
        .unwrap();

    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.max_file_size_bytes = 100;
    snapshot(&cfg).unwrap();
    let files = files_on_disk(out.path());
    assert!(files.contains_key("small.txt"));
    assert!(!files.contains_key("large.txt"));

    let out_all = out_dir();
    let mut cfg = config(&fixture, out_all.path());
    cfg.max_file_size_bytes = 0;
    snapshot(&cfg).unwrap();
    assert_eq!(files_on_disk(out_all.path()).len(), 2);
}

#[test]
fn hash_markers_mirror_blob_ids() {
    let fixture = sample_repo();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.create_hash_markers = true;
    snapshot(&cfg).unwrap();

    let files = files_on_disk(out.path());
    // Each written file plus its marker.
    assert_eq!(files.len(), 10);
    let expected = fixture.blob_id(b"# readme\n").unwrap().to_string();
    assert_eq!(files["README.md.hash"], expected.as_bytes());
}

#[test]
fn symlinks_are_never_materialized() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("links")
        .file("real.txt", b"real\n")
        .symlink("alias", "real.txt")
        .commit()
        .unwrap();
    let out = out_dir();
    let summary = snapshot(&config(&fixture, out.path())).unwrap();

    let files = files_on_disk(out.path());
    assert_eq!(files.len(), 1);
    assert!(files.contains_key("real.txt"));
    // The symlink still counts as an enumerated entry.
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.written_count, 1);
}

#[test]
fn noise_directories_are_excluded_by_default() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("noise")
        .file("node_modules/pkg/index.js", b"module.exports = 1;\n")
        .file("src/app.js", b"console.log(1);\n")
        .commit()
        .unwrap();

    let out = out_dir();
    snapshot(&config(&fixture, out.path())).unwrap();
    let files = files_on_disk(out.path());
    assert!(!files.contains_key("node_modules/pkg/index.js"));
    assert!(files.contains_key("src/app.js"));

    let out_all = out_dir();
    let mut cfg = config(&fixture, out_all.path());
    cfg.include_noise_dirs = true;
    snapshot(&cfg).unwrap();
    assert!(files_on_disk(out_all.path()).contains_key("node_modules/pkg/index.js"));
}

#[test]
fn paths_file_whitelists_tree_paths() {
    let fixture = sample_repo();
    let out = out_dir();
    let scratch = tempfile::tempdir().unwrap();
    let paths_csv = scratch.path().join("paths.csv");
    std::fs::write(&paths_csv, "src/Main.java,ignored second column\nREADME.md\n").unwrap();

    let mut cfg = config(&fixture, out.path());
    cfg.paths_file = Some(paths_csv);
    let summary = snapshot(&cfg).unwrap();

    let files = files_on_disk(out.path());
    let names: Vec<&String> = files.keys().collect();
    assert_eq!(names, ["README.md", "src/Main.java"]);
    assert_eq!(summary.written_count, 2);
}

#[test]
fn ignore_case_lowercases_the_candidate_only() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("case")
        .file("Sources/App.Java", b"class App {}\n")
        .commit()
        .unwrap();

    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.include_patterns = vec!["sources/*.java".to_string()];
    snapshot(&cfg).unwrap();
    assert!(files_on_disk(out.path()).is_empty());

    let out_ci = out_dir();
    let mut cfg = config(&fixture, out_ci.path());
    cfg.include_patterns = vec!["sources/*.java".to_string()];
    cfg.ignore_case = true;
    snapshot(&cfg).unwrap();
    // Written under its original casing.
    assert!(files_on_disk(out_ci.path()).contains_key("Sources/App.Java"));
}

#[test]
fn index_manifest_lists_every_entry_regardless_of_filters() {
    let fixture = sample_repo();
    let out = out_dir();
    let scratch = tempfile::tempdir().unwrap();
    let index_path = scratch.path().join("index.tsv");

    let mut cfg = config(&fixture, out.path());
    cfg.exclude_patterns = vec!["**/*.md".to_string()];
    cfg.index_file_path = Some(index_path.clone());
    let summary = snapshot(&cfg).unwrap();

    let text = std::fs::read_to_string(&index_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Path\tBlobId\tIsFile");
    assert_eq!(lines.len() as u64, summary.total_count + 1);

    // Filtered-out files still get manifest rows.
    assert!(lines.iter().any(|l| l.starts_with("README.md\t") && l.ends_with("\ttrue")));
    assert!(lines.iter().any(|l| l.starts_with("src\t") && l.ends_with("\tfalse")));

    let readme_id = fixture.blob_id(b"# readme\n").unwrap().to_string();
    assert!(text.contains(&format!("README.md\t{readme_id}\ttrue")));
}

#[test]
fn index_only_writes_the_manifest_but_no_files() {
    let fixture = sample_repo();
    let out = out_dir();
    let scratch = tempfile::tempdir().unwrap();
    let index_path = scratch.path().join("index.tsv");

    let mut cfg = config(&fixture, out.path());
    cfg.index_only = true;
    cfg.index_file_path = Some(index_path.clone());
    let summary = snapshot(&cfg).unwrap();

    assert!(files_on_disk(out.path()).is_empty());
    assert_eq!(summary.written_count, 0);
    assert_eq!(summary.total_count, 8);
    assert!(index_path.exists());
}

#[test]
fn partial_clone_blobs_are_logged_and_skipped() {
    let fixture = sample_repo();
    let missing = fixture.blob_id(b"guide text\n").unwrap();
    fixture.delete_blob(missing).unwrap();

    let out = out_dir();
    let summary = snapshot(&config(&fixture, out.path())).unwrap();

    let files = files_on_disk(out.path());
    assert!(!files.contains_key("docs/guide.md"));
    assert_eq!(summary.written_count, 4);
    assert_eq!(summary.total_count, 8);
}

#[test]
fn short_sha_revision_matches_the_full_revision() {
    let fixture = sample_repo();
    let full = snapshot(&config(&fixture, out_dir().path())).unwrap();

    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.revision = full.commit.to_string()[..7].to_string();
    let short = snapshot(&cfg).unwrap();

    assert_eq!(short.commit, full.commit);
    assert_eq!(short.written_count, full.written_count);
}

#[test]
fn unknown_revision_exits_the_run_with_no_revision() {
    let fixture = sample_repo();
    let out = out_dir();
    let mut cfg = config(&fixture, out.path());
    cfg.revision = "wat".to_string();
    let err = snapshot(&cfg).unwrap_err();
    assert_eq!(err.exit_code(), 205);
}

#[test]
fn concurrent_runs_share_the_clone_safely() {
    let fixture = sample_repo();
    let clone_path = fixture.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let clone_path = clone_path.clone();
            std::thread::spawn(move || {
                let out = tempfile::tempdir().unwrap();
                let cfg = SnapshotConfig::new(&clone_path, "HEAD", out.path());
                let summary = snapshot(&cfg).unwrap();
                let files = files_on_disk(out.path());
                (summary.total_count, summary.written_count, files.len())
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (8, 5, 5));
    }
}

#[test]
fn stats_mode_writes_the_language_document() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("stats")
        .file("src/Main.java", b"class Main {\n// comment\nint x;\n}\n")
        .file("src/app.py", b"x = 1\n\ny = 2\n")
        .file("notes.txt", b"not a language\n")
        .file("tests/Spec.java", b"class Spec {}\n")
        .commit()
        .unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let stats_path = scratch.path().join("stats.json");
    let mut cfg = SnapshotConfig::new(fixture.path(), "HEAD", &stats_path);
    cfg.stats_only = true;
    snapshot(&cfg).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();

    // Comment and blank lines are stripped; the tests/ directory is dropped
    // by the stats exclusion set; notes.txt has no language mapping.
    assert_eq!(value["countersByLanguage"]["java"]["numberOfFiles"], 1);
    assert_eq!(value["countersByLanguage"]["java"]["linesOfCode"], 3.0);
    assert_eq!(value["countersByLanguage"]["python"]["numberOfFiles"], 1);
    assert_eq!(value["countersByLanguage"]["python"]["linesOfCode"], 2.0);
    assert_eq!(value["totalFileCount"], 2);
    assert_eq!(value["snapshotSizeInMb"], 0);

    let bucket_sum: u64 = value["countersByLanguage"]
        .as_object()
        .unwrap()
        .values()
        .map(|counters| counters["numberOfFiles"].as_u64().unwrap())
        .sum();
    assert_eq!(value["totalFileCount"].as_u64().unwrap(), bucket_sum);
}

#[test]
fn stats_no_filter_keeps_the_excluded_directories() {
    let fixture = FixtureRepo::new().unwrap();
    fixture
        .commit("stats")
        .file("src/Main.java", b"class Main {}\n")
        .file("tests/Spec.java", b"class Spec {}\n")
        .commit()
        .unwrap();

    let scratch = tempfile::tempdir().unwrap();
    let stats_path = scratch.path().join("stats.json");
    let mut cfg = SnapshotConfig::new(fixture.path(), "HEAD", &stats_path);
    cfg.stats_only = true;
    cfg.stats_no_filter = true;
    snapshot(&cfg).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
    assert_eq!(value["countersByLanguage"]["java"]["numberOfFiles"], 2);
}

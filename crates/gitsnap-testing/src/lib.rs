//! Fixture repositories for gitsnap integration tests.
//!
//! Builds throwaway clones with `gix` write APIs, so the test suite never
//! shells out to git and never touches the network. Blobs are written loose,
//! which also lets tests fake a partial clone by deleting one object file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use gix::objs::tree::{Entry, EntryKind};
use gix::ObjectId;
use tempfile::TempDir;

/// A temporary git repository with helpers to author commits.
///
/// The backing directory is removed on drop.
pub struct FixtureRepo {
    dir: TempDir,
    repo: gix::Repository,
}

impl FixtureRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create fixture directory")?;
        let repo = gix::init(dir.path()).context("failed to init fixture repository")?;
        let config_path = dir.path().join(".git").join("config");
        let mut config = std::fs::read_to_string(&config_path)
            .context("failed to read fixture git config")?;
        config.push_str("[user]\n\tname = gitsnap tests\n\temail = tests@gitsnap.invalid\n");
        std::fs::write(&config_path, config).context("failed to write fixture git config")?;
        let repo = gix::open(dir.path()).context("failed to reopen fixture repository")?;
        Ok(Self { dir, repo })
    }

    /// The clone path, suitable as a snapshot `--src`.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Start a commit with the given message. `HEAD` moves to the result.
    pub fn commit(&self, message: &str) -> CommitBuilder<'_> {
        CommitBuilder {
            fixture: self,
            message: message.to_string(),
            parents: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Point `refs/heads/<name>` at `target`.
    pub fn branch(&self, name: &str, target: ObjectId) -> Result<()> {
        self.reference(&format!("refs/heads/{name}"), target)
    }

    /// Point `refs/tags/<name>` at `target` (lightweight tag).
    pub fn tag(&self, name: &str, target: ObjectId) -> Result<()> {
        self.reference(&format!("refs/tags/{name}"), target)
    }

    fn reference(&self, name: &str, target: ObjectId) -> Result<()> {
        self.repo
            .reference(
                name,
                target,
                gix::refs::transaction::PreviousValue::Any,
                "fixture",
            )
            .with_context(|| format!("failed to create reference {name}"))?;
        Ok(())
    }

    /// The object id a blob with `contents` has in this repository.
    ///
    /// Writing is idempotent, so this doubles as a lookup.
    pub fn blob_id(&self, contents: &[u8]) -> Result<ObjectId> {
        Ok(self
            .repo
            .write_blob(contents)
            .context("failed to write blob")?
            .detach())
    }

    /// Remove a blob's loose object file, faking a partial clone that is
    /// missing this object.
    pub fn delete_blob(&self, id: ObjectId) -> Result<()> {
        let hex = id.to_string();
        let object_path = self
            .dir
            .path()
            .join(".git")
            .join("objects")
            .join(&hex[..2])
            .join(&hex[2..]);
        std::fs::remove_file(&object_path)
            .with_context(|| format!("failed to delete loose object {hex}"))?;
        Ok(())
    }
}

/// Accumulates entries for one commit; everything is written on [`commit`].
///
/// [`commit`]: CommitBuilder::commit
pub struct CommitBuilder<'a> {
    fixture: &'a FixtureRepo,
    message: String,
    parents: Vec<ObjectId>,
    entries: Vec<(String, Vec<u8>, EntryKind)>,
}

impl CommitBuilder<'_> {
    /// Add a regular file. `path` uses `/` separators.
    #[must_use]
    pub fn file(mut self, path: &str, contents: &[u8]) -> Self {
        self.entries
            .push((path.to_string(), contents.to_vec(), EntryKind::Blob));
        self
    }

    /// Add an executable file.
    #[must_use]
    pub fn executable(mut self, path: &str, contents: &[u8]) -> Self {
        self.entries.push((
            path.to_string(),
            contents.to_vec(),
            EntryKind::BlobExecutable,
        ));
        self
    }

    /// Add a symbolic link whose blob holds `target`.
    #[must_use]
    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries
            .push((path.to_string(), target.as_bytes().to_vec(), EntryKind::Link));
        self
    }

    #[must_use]
    pub fn parent(mut self, id: ObjectId) -> Self {
        self.parents.push(id);
        self
    }

    /// Write all blobs and trees, then the commit, and move `HEAD`.
    pub fn commit(self) -> Result<ObjectId> {
        let mut root = DirNode::default();
        for (path, contents, kind) in self.entries {
            root.insert(&path, contents, kind);
        }
        let tree_id = write_node(&self.fixture.repo, &root)?;

        let signature = gix::actor::Signature {
            name: "gitsnap tests".into(),
            email: "tests@gitsnap.invalid".into(),
            time: gix::date::Time::new(1_700_000_000, 0),
        };
        let commit_id = self
            .fixture
            .repo
            .commit_as(
                signature.to_ref(),
                signature.to_ref(),
                "HEAD",
                &self.message,
                tree_id,
                self.parents,
            )
            .context("failed to write commit")?;
        Ok(commit_id.detach())
    }
}

#[derive(Default)]
struct DirNode {
    files: Vec<(String, Vec<u8>, EntryKind)>,
    dirs: BTreeMap<String, DirNode>,
}

impl DirNode {
    fn insert(&mut self, path: &str, contents: Vec<u8>, kind: EntryKind) {
        match path.split_once('/') {
            None => self.files.push((path.to_string(), contents, kind)),
            Some((dir, rest)) => self
                .dirs
                .entry(dir.to_string())
                .or_default()
                .insert(rest, contents, kind),
        }
    }
}

fn write_node(repo: &gix::Repository, node: &DirNode) -> Result<ObjectId> {
    let mut entries = Vec::new();
    for (name, contents, kind) in &node.files {
        let oid = repo
            .write_blob(contents.as_slice())
            .context("failed to write blob")?
            .detach();
        entries.push(Entry {
            mode: (*kind).into(),
            filename: name.clone().into(),
            oid,
        });
    }
    for (name, child) in &node.dirs {
        let oid = write_node(repo, child)?;
        entries.push(Entry {
            mode: EntryKind::Tree.into(),
            filename: name.clone().into(),
            oid,
        });
    }
    // Entry's Ord implements git tree ordering (directories sort with an
    // implied trailing slash), which the object writer requires.
    entries.sort();
    let id = repo
        .write_object(gix::objs::Tree { entries })
        .context("failed to write tree")?
        .detach();
    Ok(id)
}

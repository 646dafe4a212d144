//! # gitsnap-git
//!
//! **Tier 3 (Adapter)**
//!
//! Read-only access to a clone's object store through `gix`. This crate
//! isolates the git dependency to a single location and is the only
//! polymorphic seam in gitsnap: the engine consumes the [`ObjectStore`]
//! trait, production code uses [`GixStore`], tests script their own stores.
//!
//! ## What belongs here
//! * Revision resolution (short SHAs resolve natively, no prefix scan)
//! * The recursive tree walk in stored entry order
//! * Blob header (size) and content access with the error taxonomy the
//!   engine relies on
//!
//! ## What does NOT belong here
//! * Filtering decisions
//! * Anything that writes to disk

#![forbid(unsafe_code)]

use std::path::Path;

use gix::bstr::BString;
use thiserror::Error;

pub use gix::ObjectId;

mod walk;

pub use walk::TreeWalk;

/// Errors from object-store access.
///
/// `ObjectNotFound` is the only recoverable variant: the engine logs it and
/// skips the entry (partial clones legitimately lack blobs). Everything
/// else is fatal for the run.
#[derive(Debug, Error)]
pub enum GitError {
    /// The object is absent from the store (partial clone, or a sub-tree of
    /// a corrupt clone; the walker upgrades the latter to `BadClone`).
    #[error("object {id} not found in the clone's object store")]
    ObjectNotFound { id: ObjectId },

    /// The revision does not resolve to a commit in this clone.
    #[error("failed to get revision '{revision}'")]
    NoRevision {
        revision: String,
        #[source]
        source: anyhow::Error,
    },

    /// The clone cannot be opened or its object store is unusable.
    #[error("clone is not a usable git repository")]
    BadClone(#[source] anyhow::Error),

    /// Any other access failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The mode of a tree entry, reduced to what the snapshot cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Executable,
    Symlink,
    Directory,
    /// Submodule links and any non-canonical mode. Never written.
    Other,
}

impl EntryKind {
    /// `true` for the modes that may be materialized as regular files.
    #[must_use]
    pub fn is_file(self) -> bool {
        matches!(self, Self::File | Self::Executable)
    }
}

/// One entry yielded by the recursive tree walk.
///
/// `path` is the full repo-relative path in raw bytes with `/` separators;
/// it is not guaranteed to be valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: BString,
    pub kind: EntryKind,
    pub id: ObjectId,
}

/// The three capabilities the snapshot engine needs from a clone.
pub trait ObjectStore {
    /// Resolve a commit-ish (SHA, short SHA, branch, tag, `HEAD`, ...) to
    /// the id of the commit it names.
    fn resolve(&self, commitish: &str) -> Result<ObjectId, GitError>;

    /// A lazy preorder walk over the commit's recursive tree, in stored
    /// tree-entry order. Missing sub-trees surface as [`GitError::BadClone`].
    fn walk<'a>(
        &'a self,
        commit: ObjectId,
    ) -> Result<Box<dyn Iterator<Item = Result<TreeEntry, GitError>> + 'a>, GitError>;

    /// A blob's size from its object header, without loading the content.
    fn blob_size(&self, id: ObjectId) -> Result<u64, GitError>;

    /// A blob's full content.
    fn blob_bytes(&self, id: ObjectId) -> Result<Vec<u8>, GitError>;
}

/// The production [`ObjectStore`] backed by an on-disk clone.
#[derive(Debug)]
pub struct GixStore {
    repo: gix::Repository,
}

impl GixStore {
    /// Open the clone at `path`. The repository is never mutated.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open(path).map_err(|err| GitError::BadClone(err.into()))?;
        Ok(Self { repo })
    }

    fn find_data(&self, id: ObjectId) -> Result<Vec<u8>, GitError> {
        let mut object = self
            .repo
            .find_object(id)
            .map_err(|err| classify_find_error(id, err))?;
        Ok(std::mem::take(&mut object.data))
    }
}

impl ObjectStore for GixStore {
    fn resolve(&self, commitish: &str) -> Result<ObjectId, GitError> {
        let no_revision = |source: anyhow::Error| GitError::NoRevision {
            revision: commitish.to_string(),
            source,
        };

        let id = self
            .repo
            .rev_parse_single(commitish)
            .map_err(|err| no_revision(err.into()))?;
        let object = id.object().map_err(|err| no_revision(err.into()))?;
        let commit = object
            .peel_to_kind(gix::object::Kind::Commit)
            .map_err(|err| no_revision(err.into()))?;
        Ok(commit.id)
    }

    fn walk<'a>(
        &'a self,
        commit: ObjectId,
    ) -> Result<Box<dyn Iterator<Item = Result<TreeEntry, GitError>> + 'a>, GitError> {
        let data = self.find_data(commit).map_err(|err| match err {
            // A missing commit object means the clone is unusable, not a
            // partial-clone gap.
            GitError::ObjectNotFound { .. } => GitError::BadClone(anyhow::anyhow!(
                "commit object {commit} is missing from the clone"
            )),
            other => other,
        })?;
        let tree_id = gix::objs::CommitRef::from_bytes(&data)
            .map_err(|err| GitError::BadClone(err.into()))?
            .tree();
        Ok(Box::new(TreeWalk::new(&self.repo, tree_id)?))
    }

    fn blob_size(&self, id: ObjectId) -> Result<u64, GitError> {
        let header = self
            .repo
            .find_header(id)
            .map_err(|err| classify_find_error(id, err))?;
        Ok(header.size())
    }

    fn blob_bytes(&self, id: ObjectId) -> Result<Vec<u8>, GitError> {
        self.find_data(id)
    }
}

fn classify_find_error(id: ObjectId, err: gix::object::find::existing::Error) -> GitError {
    match err {
        gix::object::find::existing::Error::NotFound { .. } => GitError::ObjectNotFound { id },
        other => GitError::BadClone(other.into()),
    }
}

pub(crate) fn entry_kind(mode: gix::objs::tree::EntryMode) -> EntryKind {
    use gix::objs::tree::EntryKind as Raw;
    match mode.kind() {
        Raw::Tree => EntryKind::Directory,
        Raw::Blob => EntryKind::File,
        Raw::BlobExecutable => EntryKind::Executable,
        Raw::Link => EntryKind::Symlink,
        Raw::Commit => EntryKind::Other,
    }
}

//! Recursive tree enumeration in stored entry order.

use gix::bstr::{BStr, BString};

use crate::{entry_kind, EntryKind, GitError, ObjectId, TreeEntry};

struct RawEntry {
    filename: BString,
    kind: EntryKind,
    is_tree: bool,
    id: ObjectId,
}

struct Frame {
    prefix: BString,
    entries: std::vec::IntoIter<RawEntry>,
}

/// Preorder depth-first walk over a commit tree.
///
/// Each directory entry is yielded before its children; sibling order is
/// the order stored in the tree object, which makes the walk deterministic
/// for a given commit. The walk is lazy: sub-trees are loaded when their
/// directory entry is reached.
pub struct TreeWalk<'repo> {
    repo: &'repo gix::Repository,
    stack: Vec<Frame>,
}

impl<'repo> TreeWalk<'repo> {
    pub(crate) fn new(repo: &'repo gix::Repository, root: ObjectId) -> Result<Self, GitError> {
        let frame = load_frame(repo, BString::default(), root)?;
        Ok(Self {
            repo,
            stack: vec![frame],
        })
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = Result<TreeEntry, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(raw) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };

            let path = join(BStr::new(&frame.prefix), BStr::new(&raw.filename));
            if raw.is_tree {
                match load_frame(self.repo, path.clone(), raw.id) {
                    Ok(child) => self.stack.push(child),
                    Err(err) => return Some(Err(err)),
                }
            }
            return Some(Ok(TreeEntry {
                path,
                kind: raw.kind,
                id: raw.id,
            }));
        }
    }
}

fn join(prefix: &BStr, filename: &BStr) -> BString {
    if prefix.is_empty() {
        return filename.to_owned();
    }
    let mut path = prefix.to_owned();
    path.push(b'/');
    path.extend_from_slice(filename);
    path
}

fn load_frame(
    repo: &gix::Repository,
    prefix: BString,
    tree_id: ObjectId,
) -> Result<Frame, GitError> {
    let object = repo.find_object(tree_id).map_err(|err| {
        // A sub-tree the store cannot produce means the clone is broken;
        // partial clones only omit blobs.
        GitError::BadClone(anyhow::Error::new(err).context(format!(
            "failed to load tree {tree_id} under '{prefix}'"
        )))
    })?;

    let tree = gix::objs::TreeRef::from_bytes(&object.data)
        .map_err(|err| GitError::BadClone(err.into()))?;

    let entries: Vec<RawEntry> = tree
        .entries
        .iter()
        .map(|entry| RawEntry {
            filename: entry.filename.to_owned(),
            kind: entry_kind(entry.mode),
            is_tree: entry.mode.is_tree(),
            id: entry.oid.to_owned(),
        })
        .collect();

    Ok(Frame {
        prefix,
        entries: entries.into_iter(),
    })
}

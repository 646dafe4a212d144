//! The optional TSV manifest of every enumerated tree entry.

use std::path::Path;

use anyhow::{Context, Result};
use gitsnap_git::TreeEntry;

/// Writes `Path<TAB>BlobId<TAB>IsFile` rows in visitation order.
///
/// Rows whose path is not valid UTF-8 or contains CR/LF are omitted; either
/// would corrupt the document for downstream consumers.
pub(crate) struct IndexWriter {
    writer: csv::Writer<std::fs::File>,
    path: String,
}

impl IndexWriter {
    pub(crate) fn create(path: &Path) -> Result<Self> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create index file '{}'", path.display()))?;
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(file);
        writer
            .write_record(["Path", "BlobId", "IsFile"])
            .with_context(|| format!("failed to write index headers '{}'", path.display()))?;
        Ok(Self {
            writer,
            path: path.display().to_string(),
        })
    }

    pub(crate) fn add(&mut self, entry: &TreeEntry) -> Result<()> {
        let Ok(path) = std::str::from_utf8(entry.path.as_ref()) else {
            return Ok(());
        };
        if path.contains('\n') || path.contains('\r') {
            return Ok(());
        }
        let is_file = if entry.kind.is_file() { "true" } else { "false" };
        self.writer
            .write_record([path, entry.id.to_string().as_str(), is_file])
            .with_context(|| format!("failed to write to index file for '{path}'"))?;
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush index file '{}'", self.path))?;
        Ok(())
    }
}

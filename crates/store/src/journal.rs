use crate::error::Result;
use crate::ops::WriteOp;
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only log of committed write ops, one JSON object per line.
pub(crate) struct Journal {
    path: PathBuf,
    file: File,
    entries: usize,
    /// Length of the file up to the last entry that was synced.
    good_len: u64,
}

impl Journal {
    /// Open (or create) the journal and return the ops it already holds.
    ///
    /// A trailing line that does not parse is a write torn by a crash: it is
    /// dropped and the file truncated back to the last complete entry.
    pub(crate) fn open(path: &Path) -> Result<(Self, Vec<WriteOp>)> {
        let content = if path.exists() {
            fs::read(path)?
        } else {
            Vec::new()
        };

        let mut ops = Vec::new();
        let mut offset = 0usize;
        let mut valid_len = 0usize;
        let mut lines = content.split_inclusive(|b| *b == b'\n').peekable();
        while let Some(line) = lines.next() {
            offset += line.len();
            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                valid_len = offset;
                continue;
            }
            match (
                serde_json::from_slice::<WriteOp>(trimmed),
                line.ends_with(b"\n"),
            ) {
                (Ok(op), true) => {
                    ops.push(op);
                    valid_len = offset;
                }
                _ if lines.peek().is_none() => {
                    warn!(
                        "Dropping torn journal tail in {} ({} bytes)",
                        path.display(),
                        line.len()
                    );
                    break;
                }
                (Err(err), _) => return Err(err.into()),
                // Only the final line can lack its newline.
                (Ok(_), false) => break,
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        if valid_len < content.len() {
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        let entries = ops.len();
        Ok((
            Self {
                path: path.to_path_buf(),
                file,
                entries,
                good_len: valid_len as u64,
            },
            ops,
        ))
    }

    /// Append one op and make it durable before returning.
    ///
    /// A failed append rolls the file back to the last synced entry, so a
    /// partial line never merges with the next one.
    pub(crate) fn append(&mut self, op: &WriteOp) -> Result<()> {
        let mut line = serde_json::to_vec(op)?;
        line.push(b'\n');

        let on_disk = self.file.metadata()?.len();
        if on_disk != self.good_len {
            warn!(
                "Journal {} holds {} bytes past the last entry; truncating",
                self.path.display(),
                on_disk.saturating_sub(self.good_len)
            );
            self.rollback()?;
        }

        let written = self
            .file
            .write_all(&line)
            .and_then(|()| self.file.sync_data());
        if let Err(err) = written {
            if let Err(rollback) = self.rollback() {
                warn!(
                    "Failed to roll back journal {}: {rollback}",
                    self.path.display()
                );
            }
            return Err(err.into());
        }

        self.good_len += line.len() as u64;
        self.entries += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.file.set_len(self.good_len)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Drop every entry; called once a snapshot covers them.
    pub(crate) fn reset(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.entries = 0;
        self.good_len = 0;
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

//! JSON Lines file sink.
//!
//! Appends one line per entity:
//!
//! ```text
//! {"batch_id":"…","label":"scenario:x:2024-03","kind":"claim","record":{…}}
//! ```
//!
//! Claims precede the appeals and events that reference them. Retried
//! batches are recognised by fingerprint for the lifetime of the sink; a
//! fresh sink on an existing file does not re-read it.
//!
//! A batch is appended whole or not at all: when a write fails partway the
//! file is cut back to its length before the batch, so a retry never
//! duplicates the lines that did land.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, error, info};

use claimsim_contracts::{
    entity::{GeneratedAppeal, GeneratedBatch, GeneratedClaim, InsertReport, LearningEvent},
    error::{SimError, SimResult},
    ids::BatchId,
};
use claimsim_core::traits::ClaimSink;

use crate::fingerprint::batch_fingerprint;

#[derive(Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
enum Entity<'a> {
    Claim(&'a GeneratedClaim),
    Appeal(&'a GeneratedAppeal),
    Event(&'a LearningEvent),
}

#[derive(Serialize)]
struct Line<'a> {
    batch_id: BatchId,
    label: &'a str,
    #[serde(flatten)]
    entity: Entity<'a>,
}

struct Inner {
    file: File,
    fingerprints: HashSet<String>,
}

pub struct JsonlClaimSink {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl JsonlClaimSink {
    /// Open `path` for appending, creating it when missing.
    pub fn open(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SimError::ConfigError {
                reason: format!("cannot open output file '{}': {e}", path.display()),
            })?;
        info!(path = %path.display(), "writing generated entities as JSON Lines");
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                fingerprints: HashSet::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, e: impl std::fmt::Display) -> SimError {
    SimError::Persistence {
        reason: format!("write to '{}' failed: {e}", path.display()),
    }
}

/// Append-only output that can drop a tail it failed to finish.
trait AppendTarget: Write {
    fn end(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendTarget for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Write all of `buf` or leave `target` at its previous length.
fn append_whole(target: &mut impl AppendTarget, buf: &[u8]) -> io::Result<()> {
    let end = target.end()?;
    let written = target.write_all(buf).and_then(|_| target.flush());
    let Err(e) = written else {
        return Ok(());
    };
    if let Err(undo) = target.truncate(end) {
        error!(error = %undo, length = end, "could not cut back a partially written batch");
        return Err(io::Error::new(
            e.kind(),
            format!("{e}; partial batch left in place: {undo}"),
        ));
    }
    Err(e)
}

impl ClaimSink for JsonlClaimSink {
    fn insert_batch(&self, batch: &GeneratedBatch) -> SimResult<InsertReport> {
        let fingerprint = batch_fingerprint(batch)?;
        let mut inner = self.inner.lock().map_err(|e| SimError::Persistence {
            reason: format!("jsonl sink lock poisoned: {e}"),
        })?;
        let mut report = InsertReport::default();

        if inner.fingerprints.contains(&fingerprint) {
            info!(batch_id = %batch.id, label = %batch.label, "batch already written; skipping retry");
            report.duplicate_batch = true;
            return Ok(report);
        }

        let entities = batch
            .claims
            .iter()
            .map(Entity::Claim)
            .chain(batch.appeals.iter().map(Entity::Appeal))
            .chain(batch.events.iter().map(Entity::Event));

        // Nothing reaches the file until the whole batch has serialized.
        let mut buf = Vec::new();
        for entity in entities {
            let line = Line { batch_id: batch.id, label: &batch.label, entity };
            serde_json::to_writer(&mut buf, &line).map_err(|e| io_error(&self.path, e))?;
            buf.push(b'\n');
        }
        append_whole(&mut inner.file, &buf).map_err(|e| io_error(&self.path, e))?;

        report.inserted.claims = batch.claims.len() as u64;
        report.inserted.line_items = batch.line_count() as u64;
        report.inserted.appeals = batch.appeals.len() as u64;
        report.inserted.events = batch.events.len() as u64;
        inner.fingerprints.insert(fingerprint);

        debug!(
            batch_id = %batch.id,
            label = %batch.label,
            bytes = buf.len(),
            "batch written"
        );
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts `room` bytes, then fails every write.
    struct ShortDisk {
        data: Vec<u8>,
        room: usize,
        truncatable: bool,
    }

    impl ShortDisk {
        fn new(data: &[u8], room: usize) -> Self {
            Self { data: data.to_vec(), room, truncatable: true }
        }
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            // Short writes force `write_all` to loop.
            let n = buf.len().min(self.room).min(7);
            self.data.extend_from_slice(&buf[..n]);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl AppendTarget for ShortDisk {
        fn end(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if !self.truncatable {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
            }
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn complete_batch_is_appended() {
        let mut disk = ShortDisk::new(b"{\"a\":1}\n", 1024);
        append_whole(&mut disk, b"{\"b\":2}\n{\"c\":3}\n").unwrap();
        assert_eq!(disk.data, b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n");
    }

    #[test]
    fn failed_batch_leaves_no_partial_lines() {
        let before = b"{\"a\":1}\n".to_vec();
        let mut disk = ShortDisk::new(&before, 12);
        let err = append_whole(&mut disk, b"{\"b\":2}\n{\"c\":3}\n").unwrap_err();
        assert!(err.to_string().contains("no space"));
        assert_eq!(disk.data, before);

        // The retry lands once, right after the earlier content.
        disk.room = 1024;
        append_whole(&mut disk, b"{\"b\":2}\n{\"c\":3}\n").unwrap();
        assert_eq!(disk.data, b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n");
    }

    #[test]
    fn failed_cut_back_is_reported() {
        let mut disk = ShortDisk::new(b"", 4);
        disk.truncatable = false;
        let err = append_whole(&mut disk, b"{\"b\":2}\n").unwrap_err();
        assert!(err.to_string().contains("partial batch left in place"));
        assert_eq!(disk.data, b"{\"b\"");
    }
}

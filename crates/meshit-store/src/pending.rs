//! Store-and-forward queues for offline peers.
//!
//! One append-only JSONL file per destination under `pending/`. Payloads
//! are already encrypted when they arrive here; this layer only buffers
//! ciphertext. Queues are capped per peer and records expire after seven
//! days whether or not the file is ever rewritten — `flush` filters on
//! read, so expiry holds even for records written long ago.

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use meshit_proto::limits::{QUEUE_EXPIRY, STORE_FORWARD_PER_PEER};

use crate::Result;

/// One queued record, one JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingRecord {
    #[serde(rename = "messageId")]
    message_id: Uuid,
    timestamp: i64,
    destination: String,
    #[serde(rename = "payload")]
    payload_b64: String,
    expiry: i64,
}

/// Per-destination encrypted message queues.
pub struct PendingQueue {
    dir: PathBuf,
    per_peer_cap: usize,
}

impl PendingQueue {
    /// Open (creating if needed) the queue directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            per_peer_cap: STORE_FORWARD_PER_PEER,
        })
    }

    /// Override the per-peer cap (tests).
    pub fn with_per_peer_cap(mut self, cap: usize) -> Self {
        self.per_peer_cap = cap;
        self
    }

    fn path_for(&self, destination: &str) -> PathBuf {
        self.dir.join(format!("{destination}.jsonl"))
    }

    /// Append an encrypted payload for a destination.
    ///
    /// When the queue exceeds the per-peer cap, the oldest records are
    /// discarded so at most the cap remains.
    pub fn queue(&self, destination: &str, encrypted: &[u8]) -> Result<()> {
        let now = Utc::now().timestamp();
        let record = PendingRecord {
            message_id: Uuid::new_v4(),
            timestamp: now,
            destination: destination.to_string(),
            payload_b64: general_purpose::STANDARD.encode(encrypted),
            expiry: now + QUEUE_EXPIRY.as_secs() as i64,
        };

        let path = self.path_for(destination);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        drop(file);

        self.enforce_cap(&path)?;
        debug!(destination, "payload queued for offline delivery");
        Ok(())
    }

    fn enforce_cap(&self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let lines: Vec<&str> = contents.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() <= self.per_peer_cap {
            return Ok(());
        }
        let keep = &lines[lines.len() - self.per_peer_cap..];
        fs::write(path, format!("{}\n", keep.join("\n")))?;
        Ok(())
    }

    /// Drain the queue for a destination.
    ///
    /// Expired records are omitted; the rest come back in insertion order
    /// and the file is deleted.
    pub fn flush(&self, destination: &str) -> Result<Vec<Vec<u8>>> {
        let path = self.path_for(destination);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now().timestamp();
        let mut payloads = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let record: PendingRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    warn!(destination, error = %e, "skipping malformed pending record");
                    continue;
                }
            };
            if record.expiry < now {
                debug!(destination, id = %record.message_id, "pending record expired");
                continue;
            }
            match general_purpose::STANDARD.decode(&record.payload_b64) {
                Ok(payload) => payloads.push(payload),
                Err(e) => warn!(destination, error = %e, "skipping undecodable pending record"),
            }
        }

        fs::remove_file(&path)?;
        Ok(payloads)
    }

    /// Number of queued records for a destination.
    pub fn pending_count(&self, destination: &str) -> usize {
        fs::read_to_string(self.path_for(destination))
            .map(|contents| contents.lines().filter(|l| !l.trim().is_empty()).count())
            .unwrap_or(0)
    }

    /// Destinations that currently have queued records.
    pub fn destinations(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(fingerprint) = name.to_string_lossy().strip_suffix(".jsonl") {
                out.push(fingerprint.to_string());
            }
        }
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queue() -> (TempDir, PendingQueue) {
        let dir = TempDir::new().expect("tempdir");
        let queue = PendingQueue::new(dir.path().join("pending")).unwrap();
        (dir, queue)
    }

    #[test]
    fn test_queue_and_flush_in_order() {
        let (_dir, queue) = queue();
        let dest = "d".repeat(64);

        queue.queue(&dest, b"first").unwrap();
        queue.queue(&dest, b"second").unwrap();
        queue.queue(&dest, b"third").unwrap();

        let flushed = queue.flush(&dest).unwrap();
        assert_eq!(flushed, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);

        // The file is gone; a second flush is empty.
        assert!(queue.flush(&dest).unwrap().is_empty());
    }

    #[test]
    fn test_flush_unknown_destination_empty() {
        let (_dir, queue) = queue();
        assert!(queue.flush(&"x".repeat(64)).unwrap().is_empty());
    }

    #[test]
    fn test_cap_discards_oldest() {
        let (_dir, queue) = queue();
        let queue = queue.with_per_peer_cap(5);
        let dest = "d".repeat(64);

        for i in 0..8u8 {
            queue.queue(&dest, &[i]).unwrap();
        }
        assert_eq!(queue.pending_count(&dest), 5);

        let flushed = queue.flush(&dest).unwrap();
        assert_eq!(flushed, vec![vec![3], vec![4], vec![5], vec![6], vec![7]]);
    }

    #[test]
    fn test_expired_records_omitted_without_rewrite() {
        let (_dir, queue) = queue();
        let dest = "d".repeat(64);
        queue.queue(&dest, b"fresh").unwrap();

        // Hand-craft an expired record alongside the fresh one.
        let expired = PendingRecord {
            message_id: Uuid::new_v4(),
            timestamp: 0,
            destination: dest.clone(),
            payload_b64: general_purpose::STANDARD.encode(b"stale"),
            expiry: Utc::now().timestamp() - 1,
        };
        let path = queue.path_for(&dest);
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str(&serde_json::to_string(&expired).unwrap());
        contents.push('\n');
        fs::write(&path, contents).unwrap();

        let flushed = queue.flush(&dest).unwrap();
        assert_eq!(flushed, vec![b"fresh".to_vec()]);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let (_dir, queue) = queue();
        let dest = "d".repeat(64);
        queue.queue(&dest, b"good").unwrap();

        let path = queue.path_for(&dest);
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("this is not json\n");
        fs::write(&path, contents).unwrap();

        assert_eq!(queue.flush(&dest).unwrap(), vec![b"good".to_vec()]);
    }

    #[test]
    fn test_destinations_listing() {
        let (_dir, queue) = queue();
        queue.queue(&"a".repeat(64), b"x").unwrap();
        queue.queue(&"b".repeat(64), b"y").unwrap();

        assert_eq!(
            queue.destinations().unwrap(),
            vec!["a".repeat(64), "b".repeat(64)]
        );
    }

    #[test]
    fn test_queues_are_per_destination() {
        let (_dir, queue) = queue();
        queue.queue(&"a".repeat(64), b"for a").unwrap();
        queue.queue(&"b".repeat(64), b"for b").unwrap();

        assert_eq!(queue.flush(&"a".repeat(64)).unwrap(), vec![b"for a".to_vec()]);
        assert_eq!(queue.pending_count(&"b".repeat(64)), 1);
    }
}

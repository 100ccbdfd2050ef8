//! Event Log Sink: one append-only NDJSON file per call (spec §2, §4.6).
//!
//! Grounded on the teacher's `TranscriptWriter`, adapted from "open on
//! every append" to "open lazily once, hold the handle, close exactly
//! once": a call's socket lifetime is long-lived and chatty (audio
//! accounting, transcript lines, trace events), so an open-per-write
//! pattern would re-stat the directory on every media frame. The teacher's
//! shape — one file per logical stream under a base directory, JSON per
//! line — carries over unchanged.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use bridge_domain::{Error, Result};

/// Append-only NDJSON sink for one call's event log.
///
/// The underlying file is opened on the first `write_line` call, not at
/// construction, so a call that never logs anything (unlikely but
/// possible for a connection that drops before `start`) never creates an
/// empty file. Once `close` has run, every further `write_line` returns
/// `Error::Other` rather than silently reopening the file.
pub struct EventLogSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    closed: bool,
}

impl EventLogSink {
    pub fn new(directory: &Path, call_id: &str) -> Self {
        Self {
            path: directory.join(format!("{call_id}.jsonl")),
            file: None,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `value` to one JSON line and append it, opening the
    /// file on first use.
    pub async fn write_line<T: serde::Serialize>(&mut self, value: &T) -> Result<()> {
        if self.closed {
            return Err(Error::Other(format!(
                "event log for {} is already closed",
                self.path.display()
            )));
        }

        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(Error::Io)?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(Error::Io)?;
            self.file = Some(BufWriter::new(file));
        }

        let mut json = serde_json::to_string(value)?;
        json.push('\n');

        let writer = self.file.as_mut().expect("file opened above");
        writer.write_all(json.as_bytes()).await.map_err(Error::Io)?;
        Ok(())
    }

    /// Flush and drop the underlying file handle. Idempotent: closing an
    /// already-closed (or never-opened) sink is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(mut writer) = self.file.take() {
            writer.flush().await.map_err(Error::Io)?;
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_then_close_produces_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventLogSink::new(dir.path(), "call-1");

        sink.write_line(&json!({"event": "start"})).await.unwrap();
        sink.write_line(&json!({"event": "stop"})).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("call-1.jsonl")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"start\""));
        assert!(lines[1].contains("\"stop\""));
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventLogSink::new(dir.path(), "call-1");
        sink.write_line(&json!({"event": "start"})).await.unwrap();
        sink.close().await.unwrap();

        let result = sink.write_line(&json!({"event": "late"})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = EventLogSink::new(dir.path(), "call-1");
        sink.close().await.unwrap();
        sink.close().await.unwrap();
        assert!(sink.is_closed());
        assert!(!dir.path().join("call-1.jsonl").exists());
    }

    #[tokio::test]
    async fn never_written_sink_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventLogSink::new(dir.path(), "call-1");
        assert!(!dir.path().join("call-1.jsonl").exists());
        drop(sink);
    }
}

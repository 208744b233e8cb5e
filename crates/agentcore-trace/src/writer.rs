//! Single per-file serial write queue (§4.5, §9). One background task owns
//! the file handle; every writer — parent or subagent view — only ever
//! enqueues a line and awaits an ack. No subagent view opens its own file
//! handle, which is what gives the JSONL its deterministic settle-order
//! guarantee (§5) even when several workers write concurrently.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::error::TraceError;

struct WriteRequest {
    line: String,
    ack: oneshot::Sender<()>,
}

pub struct TraceWriter {
    sender: mpsc::UnboundedSender<WriteRequest>,
    path: PathBuf,
    // Held so the background task's handle stays alive and can be joined in
    // tests; not otherwise read.
    _worker: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl TraceWriter {
    pub async fn open(path: PathBuf) -> Result<Arc<Self>, TraceError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| TraceError::Open { path: path.display().to_string(), source: e })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();
        let handle = tokio::spawn(async move {
            let mut file = file;
            while let Some(req) = rx.recv().await {
                let _ = file.write_all(req.line.as_bytes()).await;
                let _ = file.write_all(b"\n").await;
                let _ = file.flush().await;
                let _ = req.ack.send(());
            }
        });

        Ok(Arc::new(Self { sender: tx, path, _worker: Arc::new(Mutex::new(Some(handle))) }))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Enqueue one line and wait for it to be durably appended. Waiting (not
    /// fire-and-forget) is what lets callers rely on "settled in byte-offset
    /// order" (§5, §8) without re-reading the file.
    pub async fn append_line(&self, line: String) -> Result<(), TraceError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender.send(WriteRequest { line, ack: ack_tx }).map_err(|_| TraceError::QueueClosed)?;
        ack_rx.await.map_err(|_| TraceError::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lines_are_appended_in_enqueue_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let writer = TraceWriter::open(path.clone()).await.unwrap();

        for i in 0..20 {
            writer.append_line(format!("line-{i}")).await.unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 20);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(*line, format!("line-{i}"));
        }
    }

    #[tokio::test]
    async fn concurrent_writers_sharing_one_writer_never_interleave_a_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trace.jsonl");
        let writer = TraceWriter::open(path.clone()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let w = writer.clone();
            handles.push(tokio::spawn(async move {
                w.append_line(format!("worker-{i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 8);
    }
}

use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entry::AuditEntry;
use crate::log::AuditLog;
use crate::writer::{AuditWriteError, AuditWriter};

/// Flush the writer at most every this many seconds when the channel is idle.
const FLUSH_INTERVAL_SECS: u64 = 1;

/// Create an [`AuditLog`] whose entries are also persisted as JSON Lines at
/// `path`, and spawn the background writer task.
///
/// The background task will:
///
/// * Write each entry, in sequence order, as a JSON line via [`AuditWriter`].
/// * Flush periodically (every ~1 second of channel inactivity).
/// * Flush once more when the last `AuditLog` clone is dropped and the
///   channel closes, then exit cleanly.
///
/// The in-memory log stays authoritative: I/O errors are logged via
/// `tracing::error` and the entry is skipped in the file only.
pub async fn start_file_mirror(
    path: impl AsRef<Path>,
) -> Result<(AuditLog, JoinHandle<()>), AuditWriteError> {
    let (tx, rx) = mpsc::unbounded_channel::<AuditEntry>();

    let mut writer = AuditWriter::new(path).await?;

    let handle = tokio::spawn(async move {
        run_writer_loop(&mut writer, rx).await;
    });

    Ok((AuditLog::with_mirror(tx), handle))
}

/// Core loop executed inside the background task.
///
/// Reads entries from the channel and writes them to the audit file. When the
/// channel has no entries ready for [`FLUSH_INTERVAL_SECS`] the writer is
/// flushed. On channel close a final flush is performed.
async fn run_writer_loop(writer: &mut AuditWriter, mut rx: mpsc::UnboundedReceiver<AuditEntry>) {
    let flush_interval = tokio::time::Duration::from_secs(FLUSH_INTERVAL_SECS);
    let mut dirty = false;

    loop {
        match tokio::time::timeout(flush_interval, rx.recv()).await {
            Ok(Some(entry)) => {
                if let Err(err) = writer.write(&entry).await {
                    tracing::error!(%err, seq = entry.seq, "failed to mirror audit entry");
                } else {
                    dirty = true;
                }
            }
            Ok(None) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "failed to flush audit file on shutdown");
                    }
                }
                tracing::debug!(written = writer.written(), "audit mirror task shutting down");
                return;
            }
            Err(_) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "periodic audit file flush failed");
                    } else {
                        dirty = false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditEventType;

    #[tokio::test]
    async fn mirror_persists_entries_after_last_handle_drops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let (log, handle) = start_file_mirror(&path).await.unwrap();
        let clone = log.clone();
        log.record(AuditEntry::new(AuditEventType::Login, "alice", true, "ok"));
        clone.record(AuditEntry::new(AuditEventType::Login, "bob", false, "failed"));
        drop(log);
        drop(clone);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let seqs: Vec<u64> = contents
            .lines()
            .map(|l| serde_json::from_str::<AuditEntry>(l).unwrap().seq)
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }
}

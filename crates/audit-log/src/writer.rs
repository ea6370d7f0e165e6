use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::entry::AuditEntry;

/// Errors that can occur during audit log I/O.
#[derive(Debug, thiserror::Error)]
pub enum AuditWriteError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open audit log file: {0}")]
    OpenFile(std::io::Error),

    #[error("failed to serialize audit entry #{seq}: {source}")]
    Serialize {
        seq: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("audit entry was never appended to a log (seq 0)")]
    Unsequenced,

    #[error("audit entry #{seq} is out of order; last written was #{last}")]
    OutOfOrder { seq: u64, last: u64 },

    #[error("failed to write to audit log: {0}")]
    Write(std::io::Error),

    #[error("failed to flush audit log: {0}")]
    Flush(std::io::Error),
}

/// JSON Lines mirror of an [`AuditLog`](crate::AuditLog).
///
/// Only entries that went through [`AuditLog::record`](crate::AuditLog::record)
/// are accepted, and their sequence numbers must strictly increase, so the
/// file always reads in the log's own order.
pub struct AuditWriter {
    file: tokio::io::BufWriter<tokio::fs::File>,
    last_seq: u64,
    written: u64,
}

impl AuditWriter {
    /// Open (or create) the audit log file at `path` in append mode.
    ///
    /// Parent directories are created automatically if they do not exist.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, AuditWriteError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(AuditWriteError::CreateDir)?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(AuditWriteError::OpenFile)?;

        Ok(Self {
            file: tokio::io::BufWriter::new(file),
            last_seq: 0,
            written: 0,
        })
    }

    /// Append `entry` as one JSON line. Unsequenced or out-of-order entries
    /// are rejected and nothing is written.
    pub async fn write(&mut self, entry: &AuditEntry) -> Result<(), AuditWriteError> {
        if entry.seq == 0 {
            return Err(AuditWriteError::Unsequenced);
        }
        if entry.seq <= self.last_seq {
            return Err(AuditWriteError::OutOfOrder {
                seq: entry.seq,
                last: self.last_seq,
            });
        }

        let mut line = serde_json::to_vec(entry).map_err(|source| AuditWriteError::Serialize {
            seq: entry.seq,
            source,
        })?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .await
            .map_err(AuditWriteError::Write)?;
        self.last_seq = entry.seq;
        self.written += 1;

        Ok(())
    }

    /// Flush buffered lines to the underlying file.
    pub async fn flush(&mut self) -> Result<(), AuditWriteError> {
        self.file.flush().await.map_err(AuditWriteError::Flush)
    }

    /// Sequence number of the last entry written, 0 before the first.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Number of entries written since the writer was opened.
    pub fn written(&self) -> u64 {
        self.written
    }
}

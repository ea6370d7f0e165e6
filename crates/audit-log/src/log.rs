use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::entry::{AuditEntry, AuditEventType};

/// In-memory, append-only audit trail.
///
/// `AuditLog` is a cheap, cloneable handle: every clone appends to the same
/// underlying log. Entries are ordered solely by the sequence number assigned
/// under the log's lock at append time, so concurrent writers always observe
/// a gap-free `1, 2, 3, ...` ordering regardless of timestamp resolution.
///
/// A log can optionally mirror every appended entry to a background writer
/// (see [`start_file_mirror`](crate::start_file_mirror)).
#[derive(Clone, Default)]
pub struct AuditLog {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Mutex<Vec<AuditEntry>>,
    mirror: Option<mpsc::UnboundedSender<AuditEntry>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("len", &self.len())
            .field("mirrored", &self.inner.mirror.is_some())
            .finish()
    }
}

impl AuditLog {
    /// Create an empty log with no mirror.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_mirror(mirror: mpsc::UnboundedSender<AuditEntry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                mirror: Some(mirror),
            }),
        }
    }

    /// Append `entry`, assigning it the next sequence number, and return that
    /// number. Never rejects an entry.
    pub fn record(&self, mut entry: AuditEntry) -> u64 {
        let mut entries = self.lock();
        let seq = entries.len() as u64 + 1;
        entry.seq = seq;

        // Sent while the lock is held so the mirror sees sequence order.
        if let Some(mirror) = &self.inner.mirror {
            if mirror.send(entry.clone()).is_err() {
                tracing::warn!(seq, "audit mirror closed; entry kept in memory only");
            }
        }

        entries.push(entry);
        seq
    }

    /// Copy of every entry, in sequence order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    /// Entries appended after sequence number `seq`.
    pub fn since(&self, seq: u64) -> Vec<AuditEntry> {
        let entries = self.lock();
        let start = usize::try_from(seq).unwrap_or(usize::MAX).min(entries.len());
        entries[start..].to_vec()
    }

    /// Entries of a given type, in sequence order.
    pub fn of_type(&self, event_type: AuditEventType) -> Vec<AuditEntry> {
        self.lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Sequence number of the most recent entry, or 0 for an empty log.
    pub fn last_seq(&self) -> u64 {
        self.lock().len() as u64
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditEntry>> {
        // Appends are a single push; a panic elsewhere cannot leave the
        // vector half-written.
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(actor: &str) -> AuditEntry {
        AuditEntry::new(AuditEventType::Login, actor, true, "login succeeded")
    }

    #[test]
    fn sequence_numbers_start_at_one_and_increase() {
        let log = AuditLog::new();
        assert_eq!(log.record(entry("a")), 1);
        assert_eq!(log.record(entry("b")), 2);
        assert_eq!(log.record(entry("c")), 3);

        let seqs: Vec<u64> = log.entries().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(log.last_seq(), 3);
    }

    #[test]
    fn clones_share_the_same_log() {
        let log = AuditLog::new();
        let other = log.clone();
        other.record(entry("a"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn since_returns_only_newer_entries() {
        let log = AuditLog::new();
        log.record(entry("a"));
        let mark = log.last_seq();
        log.record(entry("b"));
        log.record(entry("c"));

        let newer = log.since(mark);
        assert_eq!(newer.len(), 2);
        assert_eq!(newer[0].actor, "b");
        assert!(log.since(99).is_empty());
    }

    #[test]
    fn of_type_filters_entries() {
        let log = AuditLog::new();
        log.record(entry("a"));
        log.record(AuditEntry::new(
            AuditEventType::BaselineTaken,
            "integrity subsystem",
            true,
            "baseline taken",
        ));
        assert_eq!(log.of_type(AuditEventType::BaselineTaken).len(), 1);
        assert_eq!(log.of_type(AuditEventType::IntegrityAlert).len(), 0);
    }

    #[test]
    fn concurrent_writers_get_unique_gap_free_sequence_numbers() {
        let log = AuditLog::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.record(entry(&format!("t{t}-{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let seqs: Vec<u64> = log.entries().iter().map(|e| e.seq).collect();
        let expected: Vec<u64> = (1..=400).collect();
        assert_eq!(seqs, expected);
    }

    #[test]
    fn mirror_receives_entries_in_sequence_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let log = AuditLog::with_mirror(tx);
        log.record(entry("a"));
        log.record(entry("b"));

        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn closed_mirror_does_not_lose_in_memory_entries() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let log = AuditLog::with_mirror(tx);
        log.record(entry("a"));
        assert_eq!(log.len(), 1);
    }
}

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::permission::PermissionSet;

/// Composite `(subject, resource)` key of the access-control matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixKey {
    pub subject: String,
    pub resource: String,
}

impl MatrixKey {
    pub fn new(subject: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for MatrixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.subject, self.resource)
    }
}

/// The discretionary grant table.
///
/// A single map keyed by [`MatrixKey`]. A missing entry and an entry holding
/// the empty set are indistinguishable to every reader. The matrix does not
/// validate identities: any subject or resource name is accepted.
///
/// All access goes through one mutex, so a [`Snapshot`] never observes a
/// partially applied change.
#[derive(Default)]
pub struct AccessControlMatrix {
    entries: Mutex<HashMap<MatrixKey, PermissionSet>>,
}

impl fmt::Debug for AccessControlMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControlMatrix")
            .field("entries", &self.lock().len())
            .finish()
    }
}

impl AccessControlMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store exactly `permissions` for the pair, replacing any previous set.
    pub fn grant(&self, subject: &str, resource: &str, permissions: PermissionSet) {
        self.lock()
            .insert(MatrixKey::new(subject, resource), permissions);
    }

    /// The stored set for the pair, or the empty set.
    pub fn permissions_of(&self, subject: &str, resource: &str) -> PermissionSet {
        self.lock()
            .get(&MatrixKey::new(subject, resource))
            .copied()
            .unwrap_or_default()
    }

    /// Atomically replace the pair's set with `f(current)`.
    ///
    /// Returns `(before, after)`. The read and the write happen under the
    /// same lock acquisition.
    pub fn update(
        &self,
        subject: &str,
        resource: &str,
        f: impl FnOnce(PermissionSet) -> PermissionSet,
    ) -> (PermissionSet, PermissionSet) {
        let mut entries = self.lock();
        let key = MatrixKey::new(subject, resource);
        let before = entries.get(&key).copied().unwrap_or_default();
        let after = f(before);
        entries.insert(key, after);
        (before, after)
    }

    /// Deep, independent copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        let entries = self.lock();
        Snapshot {
            entries: entries
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        }
    }

    /// Number of stored pairs, including pairs holding the empty set.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MatrixKey, PermissionSet>> {
        // Every critical section is a single map operation.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time copy of the matrix, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<MatrixKey, PermissionSet>,
}

impl Snapshot {
    /// Stored set for the pair, or the empty set.
    pub fn permissions_of(&self, subject: &str, resource: &str) -> PermissionSet {
        self.get(&MatrixKey::new(subject, resource))
    }

    pub fn get(&self, key: &MatrixKey) -> PermissionSet {
        self.entries.get(key).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MatrixKey, PermissionSet)> {
        self.entries.iter().map(|(k, v)| (k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &MatrixKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Permission;

    #[test]
    fn missing_entry_reads_as_empty() {
        let m = AccessControlMatrix::new();
        assert_eq!(m.permissions_of("ghost", "nowhere"), PermissionSet::empty());
    }

    #[test]
    fn explicit_empty_entry_reads_the_same_as_missing() {
        let m = AccessControlMatrix::new();
        m.grant("bob", "report.pdf", PermissionSet::empty());
        assert_eq!(
            m.permissions_of("bob", "report.pdf"),
            m.permissions_of("bob", "other")
        );
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn grant_replaces_instead_of_merging() {
        let m = AccessControlMatrix::new();
        m.grant("bob", "report.pdf", PermissionSet::READ | PermissionSet::PRINT);
        m.grant("bob", "report.pdf", PermissionSet::WRITE);
        assert_eq!(m.permissions_of("bob", "report.pdf"), PermissionSet::WRITE);
    }

    #[test]
    fn grant_accepts_unknown_identities() {
        let m = AccessControlMatrix::new();
        m.grant("", "", PermissionSet::all());
        assert_eq!(m.permissions_of("", ""), PermissionSet::all());
    }

    #[test]
    fn update_returns_before_and_after() {
        let m = AccessControlMatrix::new();
        m.grant("bob", "r", PermissionSet::READ);
        let (before, after) = m.update("bob", "r", |s| s.with(Permission::Write));
        assert_eq!(before, PermissionSet::READ);
        assert_eq!(after, PermissionSet::READ | PermissionSet::WRITE);
        assert_eq!(m.permissions_of("bob", "r"), after);
    }

    #[test]
    fn snapshot_is_independent_of_later_grants() {
        let m = AccessControlMatrix::new();
        m.grant("alice", "report.pdf", PermissionSet::READ);
        let snap = m.snapshot();

        m.grant("alice", "report.pdf", PermissionSet::all());
        m.grant("mallory", "report.pdf", PermissionSet::all());

        assert_eq!(snap.permissions_of("alice", "report.pdf"), PermissionSet::READ);
        assert_eq!(snap.permissions_of("mallory", "report.pdf"), PermissionSet::empty());
        assert_eq!(snap.len(), 1);
    }

    #[test]
    fn snapshot_iterates_in_key_order() {
        let m = AccessControlMatrix::new();
        m.grant("bob", "b", PermissionSet::READ);
        m.grant("alice", "z", PermissionSet::READ);
        m.grant("alice", "a", PermissionSet::READ);

        let keys: Vec<String> = m.snapshot().keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["(alice, a)", "(alice, z)", "(bob, b)"]);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        use std::sync::Arc;

        let m = Arc::new(AccessControlMatrix::new());
        let handles: Vec<_> = Permission::ALL
            .into_iter()
            .map(|p| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.update("bob", "r", |s| s.with(p));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.permissions_of("bob", "r"), PermissionSet::all());
    }
}

//! Tamper detection for the access-control matrix.
//!
//! The monitor keeps one baseline [`Snapshot`] and reports every
//! `(subject, resource)` pair whose permission set differs from it. It has no
//! knowledge of *how* a change happened, which is what lets it catch writes
//! that bypassed the policy engine's audited path.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use audit_log::{AuditEntry, AuditEventType, AuditLog};
use serde_json::json;
use tracing::{info, warn};

use crate::matrix::{AccessControlMatrix, MatrixKey, Snapshot};
use crate::permission::PermissionSet;

/// Actor name used on every entry the monitor records.
pub const INTEGRITY_ACTOR: &str = "integrity subsystem";

/// One `(subject, resource)` pair whose permissions changed since the
/// baseline. A pair missing on either side counts as the empty set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub key: MatrixKey,
    pub before: PermissionSet,
    pub after: PermissionSet,
}

impl Divergence {
    /// Permissions present now but not in the baseline.
    pub fn gained(&self) -> PermissionSet {
        self.after - self.before
    }

    /// Permissions present in the baseline but gone now.
    pub fn lost(&self) -> PermissionSet {
        self.before - self.after
    }
}

/// Result of [`IntegrityMonitor::check_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityReport {
    /// No baseline has been taken yet; nothing was compared.
    NoBaseline,
    /// The matrix matches the baseline.
    Intact,
    /// At least one pair diverged.
    Diverged(Vec<Divergence>),
}

impl IntegrityReport {
    pub fn divergences(&self) -> &[Divergence] {
        match self {
            Self::Diverged(d) => d,
            Self::NoBaseline | Self::Intact => &[],
        }
    }

    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact)
    }
}

/// Holds the trusted baseline and diffs the live matrix against it.
pub struct IntegrityMonitor {
    matrix: Arc<AccessControlMatrix>,
    audit: AuditLog,
    baseline: Mutex<Option<Snapshot>>,
}

impl std::fmt::Debug for IntegrityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityMonitor")
            .field("has_baseline", &self.has_baseline())
            .finish()
    }
}

impl IntegrityMonitor {
    pub fn new(matrix: Arc<AccessControlMatrix>, audit: AuditLog) -> Self {
        Self {
            matrix,
            audit,
            baseline: Mutex::new(None),
        }
    }

    /// Replace the baseline with the current matrix state. Returns the number
    /// of pairs captured.
    pub fn take_baseline(&self) -> usize {
        // Lock order is always baseline, then matrix.
        let mut baseline = self.lock_baseline();
        let snapshot = self.matrix.snapshot();
        let pairs = snapshot.len();
        *baseline = Some(snapshot);

        info!(pairs, "integrity baseline taken");
        self.audit.record(
            AuditEntry::new(
                AuditEventType::BaselineTaken,
                INTEGRITY_ACTOR,
                true,
                "integrity baseline taken over the access-control matrix",
            )
            .with_context(json!({ "pairs": pairs })),
        );
        pairs
    }

    pub fn has_baseline(&self) -> bool {
        self.lock_baseline().is_some()
    }

    /// Copy of the current baseline, if any.
    pub fn baseline(&self) -> Option<Snapshot> {
        self.lock_baseline().clone()
    }

    /// Compare the live matrix with the baseline.
    ///
    /// Records one failed entry per divergent pair, a single success entry
    /// when nothing changed, or a single failed entry when no baseline exists.
    pub fn check_integrity(&self) -> IntegrityReport {
        let guard = self.lock_baseline();
        let Some(baseline) = guard.as_ref() else {
            warn!("integrity check requested without a baseline");
            self.audit.record(AuditEntry::new(
                AuditEventType::IntegrityCheck,
                INTEGRITY_ACTOR,
                false,
                "no integrity baseline; take a baseline first",
            ));
            return IntegrityReport::NoBaseline;
        };

        let current = self.matrix.snapshot();
        let divergences = diff(baseline, &current);

        if divergences.is_empty() {
            info!(pairs = current.len(), "integrity intact");
            self.audit.record(AuditEntry::new(
                AuditEventType::IntegrityCheck,
                INTEGRITY_ACTOR,
                true,
                "no changes detected in the matrix since the baseline",
            ));
            return IntegrityReport::Intact;
        }

        for d in &divergences {
            warn!(
                subject = %d.key.subject,
                resource = %d.key.resource,
                before = %d.before,
                after = %d.after,
                "integrity divergence detected"
            );
            self.audit.record(
                AuditEntry::new(
                    AuditEventType::IntegrityAlert,
                    INTEGRITY_ACTOR,
                    false,
                    format!(
                        "integrity change detected for subject={}, resource={}: before={}, after={}",
                        d.key.subject, d.key.resource, d.before, d.after
                    ),
                )
                .on_resource(d.key.resource.clone())
                .with_context(json!({
                    "subject": d.key.subject,
                    "before": d.before.to_string(),
                    "after": d.after.to_string(),
                    "gained": d.gained().to_string(),
                    "lost": d.lost().to_string(),
                })),
            );
        }

        IntegrityReport::Diverged(divergences)
    }

    fn lock_baseline(&self) -> MutexGuard<'_, Option<Snapshot>> {
        self.baseline.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Every pair, on either side, whose sets differ. Each key is visited once;
/// output is in key order.
pub fn diff(baseline: &Snapshot, current: &Snapshot) -> Vec<Divergence> {
    let keys: BTreeSet<&MatrixKey> = baseline.keys().chain(current.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let before = baseline.get(key);
            let after = current.get(key);
            (before != after).then(|| Divergence {
                key: key.clone(),
                before,
                after,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn setup() -> (Arc<AccessControlMatrix>, AuditLog, IntegrityMonitor) {
        let matrix = Arc::new(AccessControlMatrix::new());
        let audit = AuditLog::new();
        let monitor = IntegrityMonitor::new(Arc::clone(&matrix), audit.clone());
        (matrix, audit, monitor)
    }

    fn key(subject: &str, resource: &str) -> (String, String) {
        (subject.to_string(), resource.to_string())
    }

    #[test]
    fn check_without_baseline_reports_and_audits_failure() {
        let (_, audit, monitor) = setup();
        assert_eq!(monitor.check_integrity(), IntegrityReport::NoBaseline);

        let entries = audit.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, AuditEventType::IntegrityCheck);
        assert!(!entries[0].success);
    }

    #[test]
    fn two_baselines_in_a_row_are_intact() {
        let (matrix, audit, monitor) = setup();
        matrix.grant("alice", "report", PermissionSet::READ);
        monitor.take_baseline();
        monitor.take_baseline();

        assert_eq!(monitor.check_integrity(), IntegrityReport::Intact);
        let last = audit.entries().pop().unwrap();
        assert!(last.success);
        assert_eq!(last.event_type, AuditEventType::IntegrityCheck);
        assert_eq!(audit.of_type(AuditEventType::BaselineTaken).len(), 2);
    }

    #[test]
    fn baseline_is_not_affected_by_later_grants() {
        let (matrix, _, monitor) = setup();
        matrix.grant("alice", "report", PermissionSet::READ);
        monitor.take_baseline();
        matrix.grant("alice", "report", PermissionSet::all());

        let baseline = monitor.baseline().unwrap();
        assert_eq!(baseline.permissions_of("alice", "report"), PermissionSet::READ);
    }

    #[test]
    fn detects_added_changed_and_cleared_pairs() {
        let (matrix, audit, monitor) = setup();
        matrix.grant("alice", "report", PermissionSet::READ);
        matrix.grant("bob", "report", PermissionSet::READ);
        matrix.grant("carol", "report", PermissionSet::empty());
        monitor.take_baseline();

        matrix.grant("alice", "report", PermissionSet::READ | PermissionSet::WRITE); // changed
        matrix.grant("bob", "report", PermissionSet::empty()); // cleared
        matrix.grant("mallory", "config", PermissionSet::DELETE); // new pair
        matrix.grant("dave", "report", PermissionSet::empty()); // new but empty

        let mark = audit.last_seq();
        let report = monitor.check_integrity();
        let found: HashMap<(String, String), (PermissionSet, PermissionSet)> = report
            .divergences()
            .iter()
            .map(|d| {
                (
                    (d.key.subject.clone(), d.key.resource.clone()),
                    (d.before, d.after),
                )
            })
            .collect();

        assert_eq!(found.len(), 3);
        assert_eq!(
            found[&key("alice", "report")],
            (PermissionSet::READ, PermissionSet::READ | PermissionSet::WRITE)
        );
        assert_eq!(
            found[&key("bob", "report")],
            (PermissionSet::READ, PermissionSet::empty())
        );
        assert_eq!(
            found[&key("mallory", "config")],
            (PermissionSet::empty(), PermissionSet::DELETE)
        );

        let alerts = audit.since(mark);
        assert_eq!(alerts.len(), 3);
        for alert in &alerts {
            assert_eq!(alert.event_type, AuditEventType::IntegrityAlert);
            assert_eq!(alert.actor, "integrity subsystem");
            assert!(!alert.success);
            assert!(alert.detail.contains("before="), "{}", alert.detail);
        }
        let mallory = alerts
            .iter()
            .find(|a| a.resource.as_deref() == Some("config"))
            .unwrap();
        assert_eq!(mallory.context["gained"], "{DELETE}");
    }

    #[test]
    fn new_baseline_replaces_the_old_one() {
        let (matrix, _, monitor) = setup();
        monitor.take_baseline();
        matrix.grant("bob", "report", PermissionSet::READ);
        assert_eq!(monitor.check_integrity().divergences().len(), 1);

        monitor.take_baseline();
        assert!(monitor.check_integrity().is_intact());
    }

    #[test]
    fn diff_visits_each_key_once() {
        let matrix = AccessControlMatrix::new();
        matrix.grant("a", "x", PermissionSet::READ);
        let before = matrix.snapshot();
        matrix.grant("a", "x", PermissionSet::WRITE);
        let after = matrix.snapshot();

        let d = diff(&before, &after);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].gained(), PermissionSet::WRITE);
        assert_eq!(d[0].lost(), PermissionSet::READ);
        assert!(diff(&after, &after).is_empty());
    }
}

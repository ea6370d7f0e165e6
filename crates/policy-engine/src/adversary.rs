use std::sync::Arc;

use crate::matrix::AccessControlMatrix;
use crate::permission::PermissionSet;

/// Simulated attacker with direct write access to the matrix.
///
/// Nothing it does is audited or checked. The only way to notice it is an
/// integrity check against a baseline taken before the escalation.
#[derive(Debug)]
pub struct AdversarySimulator {
    matrix: Arc<AccessControlMatrix>,
}

impl AdversarySimulator {
    pub fn new(matrix: Arc<AccessControlMatrix>) -> Self {
        Self { matrix }
    }

    /// Grant every permission to the pair, bypassing the policy engine.
    /// Returns the set the pair held before.
    pub fn silently_escalate(&self, subject: &str, resource: &str) -> PermissionSet {
        let (before, _) = self
            .matrix
            .update(subject, resource, |_| PermissionSet::all());
        before
    }
}

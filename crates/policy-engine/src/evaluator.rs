use std::sync::Arc;

use audit_log::{AuditEntry, AuditEventType, AuditLog};
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::decision::AccessDecision;
use crate::entity::{Resource, Subject};
use crate::level::SecurityLevel;
use crate::matrix::AccessControlMatrix;
use crate::permission::{MacClass, Permission, PermissionSet};

/// Result of a privileged permission-modification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    /// WRITE was added to the target's matrix entry.
    Granted {
        before: PermissionSet,
        after: PermissionSet,
    },
    /// The actor was neither administrator nor owner; nothing changed.
    Refused,
}

/// The authorization decision point.
///
/// Combines the Bell-LaPadula gate with the discretionary effective set
/// (matrix grant plus the resource's owner/others defaults). Every decision
/// and every privileged modification is recorded in the audit log.
pub struct PolicyEngine {
    matrix: Arc<AccessControlMatrix>,
    audit: AuditLog,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("matrix", &self.matrix)
            .field("audit", &self.audit)
            .finish()
    }
}

impl PolicyEngine {
    pub fn new(matrix: Arc<AccessControlMatrix>, audit: AuditLog) -> Self {
        Self { matrix, audit }
    }

    pub fn matrix(&self) -> &Arc<AccessControlMatrix> {
        &self.matrix
    }

    // -- Decision entry points ----------------------------------------------

    /// Decide whether `subject` may perform `action` on `resource`.
    pub fn check_access(&self, subject: &Subject, resource: &Resource, action: Permission) -> bool {
        self.decide(subject, resource, action).allowed
    }

    /// Like [`check_access`](Self::check_access) but returns the full
    /// decision. Records exactly one audit entry.
    pub fn decide(
        &self,
        subject: &Subject,
        resource: &Resource,
        action: Permission,
    ) -> AccessDecision {
        debug!(
            subject = subject.name(),
            resource = resource.name(),
            %action,
            "evaluating access request"
        );

        let decision = if !mac_permits(subject.level(), resource.level(), action) {
            trace!(
                subject_level = %subject.level(),
                resource_level = %resource.level(),
                "MAC gate refused request"
            );
            AccessDecision::mac_denied()
        } else {
            let effective = self.effective_permissions(subject, resource);
            trace!(%effective, "computed DAC effective set");
            AccessDecision::dac(effective.has(action), effective)
        };

        let mut context = json!({
            "permission": action.as_str(),
            "subject_level": subject.level().as_str(),
            "resource_level": resource.level().as_str(),
        });
        if let Some(effective) = decision.effective {
            context["effective"] = json!(effective.to_string());
        }

        self.audit.record(
            AuditEntry::new(
                AuditEventType::AccessCheck,
                subject.name(),
                decision.allowed,
                decision.reason.description(),
            )
            .on_resource(resource.name())
            .with_context(context)
            .with_policy_decision(decision.record()),
        );

        decision
    }

    /// DAC effective set: matrix grant UNION the resource default that
    /// applies to `subject`. Pure; records nothing.
    pub fn effective_permissions(&self, subject: &Subject, resource: &Resource) -> PermissionSet {
        self.matrix.permissions_of(subject.name(), resource.name()) | resource.defaults_for(subject)
    }

    // -- Privileged modification ---------------------------------------------

    /// Add WRITE to `target`'s matrix entry on `resource`, provided `actor` is
    /// an administrator or the resource owner. A refused request only leaves
    /// an audit trace.
    pub fn try_modify_permissions(
        &self,
        actor: &Subject,
        resource: &Resource,
        target: &Subject,
    ) -> ModifyOutcome {
        if !(actor.is_admin() || resource.is_owned_by(actor)) {
            warn!(
                actor = actor.name(),
                resource = resource.name(),
                target = target.name(),
                "privilege escalation attempt refused"
            );
            self.audit.record(
                AuditEntry::new(
                    AuditEventType::PrivilegeEscalationAttempt,
                    actor.name(),
                    false,
                    format!(
                        "privilege escalation attempt: {} is neither administrator nor owner",
                        actor.name()
                    ),
                )
                .on_resource(resource.name())
                .with_context(json!({ "target": target.name() })),
            );
            return ModifyOutcome::Refused;
        }

        let (before, after) = self
            .matrix
            .update(target.name(), resource.name(), |current| {
                current.with(Permission::Write)
            });

        debug!(
            actor = actor.name(),
            resource = resource.name(),
            target = target.name(),
            %before,
            %after,
            "permissions modified"
        );
        self.audit.record(
            AuditEntry::new(
                AuditEventType::PermissionsModified,
                actor.name(),
                true,
                format!("permissions updated for subject {}", target.name()),
            )
            .on_resource(resource.name())
            .with_context(json!({
                "target": target.name(),
                "before": before.to_string(),
                "after": after.to_string(),
            })),
        );

        ModifyOutcome::Granted { before, after }
    }
}

/// The simplified Bell-LaPadula gate: no read up, no write down.
pub fn mac_permits(subject: SecurityLevel, resource: SecurityLevel, action: Permission) -> bool {
    match action.mac_class() {
        MacClass::ReadLike => subject >= resource,
        MacClass::WriteLike => subject <= resource,
        MacClass::Unrestricted => true,
    }
}

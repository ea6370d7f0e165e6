use std::fmt;

use serde::{Deserialize, Serialize};

/// A single audit log entry representing an event in the system.
///
/// `seq` is zero until the entry is appended to an [`AuditLog`]; the log
/// assigns a strictly increasing sequence number at append time.
///
/// [`AuditLog`]: crate::AuditLog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: uuid::Uuid,
    pub seq: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub event_type: AuditEventType,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub success: bool,
    pub detail: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub context: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<PolicyDecisionRecord>,
}

impl AuditEntry {
    /// Create a new `AuditEntry` with an auto-generated UUID v4 and the current
    /// UTC timestamp. The entry starts without a resource, context or policy
    /// decision.
    pub fn new(
        event_type: AuditEventType,
        actor: impl Into<String>,
        success: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            seq: 0,
            timestamp: chrono::Utc::now(),
            event_type,
            actor: actor.into(),
            resource: None,
            success,
            detail: detail.into(),
            context: serde_json::Value::Null,
            policy_decision: None,
        }
    }

    /// Attach the resource the event concerns.
    pub fn on_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach structured context (levels, permission sets, ...).
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Attach a policy decision record to this entry, consuming and returning
    /// `self` for builder-style usage.
    pub fn with_policy_decision(mut self, decision: PolicyDecisionRecord) -> Self {
        self.policy_decision = Some(decision);
        self
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} | actor={} | resource={} | op={} | success={} | {}",
            self.seq,
            self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.actor,
            self.resource.as_deref().unwrap_or("-"),
            self.event_type,
            self.success,
            self.detail,
        )
    }
}

/// The category of audit event being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    Login,
    AccessCheck,
    PermissionsModified,
    PrivilegeEscalationAttempt,
    BaselineTaken,
    IntegrityCheck,
    IntegrityAlert,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::AccessCheck => "access_check",
            Self::PermissionsModified => "permissions_modified",
            Self::PrivilegeEscalationAttempt => "privilege_escalation_attempt",
            Self::BaselineTaken => "baseline_taken",
            Self::IntegrityCheck => "integrity_check",
            Self::IntegrityAlert => "integrity_alert",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records the outcome of a policy evaluation attached to an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecisionRecord {
    /// Machine-readable outcome label, e.g. `mac_denied`.
    pub outcome: String,
    /// The policy layer that produced the outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    pub reason: String,
}

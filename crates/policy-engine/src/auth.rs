use audit_log::{AuditEntry, AuditEventType, AuditLog};
use tracing::debug;

use crate::directory::Directory;
use crate::entity::Subject;

/// Resolves `(name, credential)` pairs to registered subjects.
///
/// Independent of authorization: it only answers "who is this", and records
/// every attempt.
#[derive(Debug, Clone)]
pub struct Authenticator {
    audit: AuditLog,
}

impl Authenticator {
    pub fn new(audit: AuditLog) -> Self {
        Self { audit }
    }

    pub fn authenticate(&self, directory: &Directory, name: &str, credential: &str) -> Option<Subject> {
        let subject = directory
            .subject(name)
            .filter(|s| s.credential_matches(credential))
            .cloned();

        let success = subject.is_some();
        debug!(name, success, "authentication attempt");
        self.audit.record(AuditEntry::new(
            AuditEventType::Login,
            name,
            success,
            if success { "login succeeded" } else { "login failed" },
        ));

        subject
    }
}

use std::fmt;

use crate::level::SecurityLevel;
use crate::permission::PermissionSet;

/// An authenticated principal. Immutable once created; `name` is the identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Subject {
    name: String,
    credential: String,
    admin: bool,
    level: SecurityLevel,
}

impl Subject {
    pub fn new(
        name: impl Into<String>,
        credential: impl Into<String>,
        admin: bool,
        level: SecurityLevel,
    ) -> Self {
        Self {
            name: name.into(),
            credential: credential.into(),
            admin,
            level,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    /// Plain-text comparison; credential storage is not hardened.
    pub(crate) fn credential_matches(&self, credential: &str) -> bool {
        self.credential == credential
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("name", &self.name)
            .field("credential", &"<redacted>")
            .field("admin", &self.admin)
            .field("level", &self.level)
            .finish()
    }
}

/// A protected object with its own discretionary defaults.
///
/// `owner_permissions` apply to the owning subject, `others_permissions` to
/// everyone else. Both are independent of the access-control matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    name: String,
    owner: String,
    level: SecurityLevel,
    critical: bool,
    owner_permissions: PermissionSet,
    others_permissions: PermissionSet,
}

impl Resource {
    /// New resource with empty owner and others permission sets.
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        level: SecurityLevel,
        critical: bool,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            level,
            critical,
            owner_permissions: PermissionSet::empty(),
            others_permissions: PermissionSet::empty(),
        }
    }

    pub fn with_owner_permissions(mut self, permissions: PermissionSet) -> Self {
        self.owner_permissions = permissions;
        self
    }

    pub fn with_others_permissions(mut self, permissions: PermissionSet) -> Self {
        self.others_permissions = permissions;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn level(&self) -> SecurityLevel {
        self.level
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn owner_permissions(&self) -> PermissionSet {
        self.owner_permissions
    }

    pub fn others_permissions(&self) -> PermissionSet {
        self.others_permissions
    }

    /// Ownership is decided by identity only.
    pub fn is_owned_by(&self, subject: &Subject) -> bool {
        self.owner == subject.name()
    }

    /// The resource-level default set that applies to `subject`.
    pub fn defaults_for(&self, subject: &Subject) -> PermissionSet {
        if self.is_owned_by(subject) {
            self.owner_permissions
        } else {
            self.others_permissions
        }
    }
}

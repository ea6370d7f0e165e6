use serde::{Deserialize, Serialize};

use crate::entity::{Resource, Subject};
use crate::level::SecurityLevel;
use crate::permission::{Permission, PermissionSet};

/// Top-level scenario loaded from a YAML file: who exists, what they can
/// touch, and the initial matrix grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Schema version; currently must be "1.0".
    pub version: String,
    #[serde(default)]
    pub subjects: Vec<SubjectSpec>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    /// Initial matrix entries, applied in order.
    #[serde(default)]
    pub grants: Vec<GrantSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSpec {
    pub name: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default = "default_level")]
    pub level: SecurityLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub name: String,
    pub owner: String,
    #[serde(default = "default_level")]
    pub level: SecurityLevel,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub owner_permissions: Vec<Permission>,
    #[serde(default)]
    pub others_permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantSpec {
    pub subject: String,
    pub resource: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

fn default_level() -> SecurityLevel {
    SecurityLevel::Public
}

impl SubjectSpec {
    pub fn to_subject(&self) -> Subject {
        Subject::new(&self.name, &self.credential, self.admin, self.level)
    }
}

impl ResourceSpec {
    pub fn to_resource(&self) -> Resource {
        Resource::new(&self.name, &self.owner, self.level, self.critical)
            .with_owner_permissions(self.owner_permissions.iter().copied().collect())
            .with_others_permissions(self.others_permissions.iter().copied().collect())
    }
}

impl GrantSpec {
    pub fn permission_set(&self) -> PermissionSet {
        self.permissions.iter().copied().collect()
    }
}

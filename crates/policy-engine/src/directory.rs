use std::collections::BTreeMap;

use crate::entity::{Resource, Subject};
use crate::error::DirectoryError;

/// Registry of subjects and resources, keyed by name.
///
/// This is the attribute source the engine's callers resolve identities
/// against. Entries are immutable once added.
#[derive(Debug, Default)]
pub struct Directory {
    subjects: BTreeMap<String, Subject>,
    resources: BTreeMap<String, Resource>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subject(&mut self, subject: Subject) -> Result<(), DirectoryError> {
        if subject.name().is_empty() {
            return Err(DirectoryError::EmptyName { kind: "subject" });
        }
        if self.subjects.contains_key(subject.name()) {
            return Err(DirectoryError::DuplicateSubject(subject.name().to_string()));
        }
        self.subjects.insert(subject.name().to_string(), subject);
        Ok(())
    }

    /// The owner must already be registered.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), DirectoryError> {
        if resource.name().is_empty() {
            return Err(DirectoryError::EmptyName { kind: "resource" });
        }
        if self.resources.contains_key(resource.name()) {
            return Err(DirectoryError::DuplicateResource(resource.name().to_string()));
        }
        if !self.subjects.contains_key(resource.owner()) {
            return Err(DirectoryError::UnknownOwner {
                resource: resource.name().to_string(),
                owner: resource.owner().to_string(),
            });
        }
        self.resources.insert(resource.name().to_string(), resource);
        Ok(())
    }

    pub fn subject(&self, name: &str) -> Option<&Subject> {
        self.subjects.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Subjects in name order.
    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    /// Resources in name order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::SecurityLevel;

    fn alice() -> Subject {
        Subject::new("alice", "alice123", false, SecurityLevel::Confidential)
    }

    #[test]
    fn rejects_duplicate_subjects() {
        let mut d = Directory::new();
        d.add_subject(alice()).unwrap();
        assert_eq!(
            d.add_subject(alice()),
            Err(DirectoryError::DuplicateSubject("alice".into()))
        );
    }

    #[test]
    fn rejects_empty_names() {
        let mut d = Directory::new();
        let err = d
            .add_subject(Subject::new("", "", false, SecurityLevel::Public))
            .unwrap_err();
        assert_eq!(err.to_string(), "subject name must not be empty");
    }

    #[test]
    fn resource_owner_must_exist() {
        let mut d = Directory::new();
        let r = Resource::new("report.pdf", "alice", SecurityLevel::Confidential, false);
        assert!(matches!(
            d.add_resource(r.clone()),
            Err(DirectoryError::UnknownOwner { .. })
        ));

        d.add_subject(alice()).unwrap();
        d.add_resource(r.clone()).unwrap();
        assert_eq!(d.resource("report.pdf"), Some(&r));
        assert_eq!(
            d.add_resource(r),
            Err(DirectoryError::DuplicateResource("report.pdf".into()))
        );
    }

    #[test]
    fn iterates_in_name_order() {
        let mut d = Directory::new();
        for name in ["carol", "alice", "bob"] {
            d.add_subject(Subject::new(name, "", false, SecurityLevel::Public))
                .unwrap();
        }
        let names: Vec<&str> = d.subjects().map(Subject::name).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }
}

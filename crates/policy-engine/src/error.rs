/// Failure to parse a level or permission name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown security level '{0}'; expected PUBLIC, CONFIDENTIAL or SECRET")]
    Level(String),

    #[error("unknown permission '{0}'; expected READ, WRITE, EXECUTE, PRINT, CONFIGURE or DELETE")]
    Permission(String),
}

/// Registry rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("subject '{0}' already exists")]
    DuplicateSubject(String),

    #[error("resource '{0}' already exists")]
    DuplicateResource(String),

    #[error("owner '{owner}' of resource '{resource}' does not exist")]
    UnknownOwner { resource: String, owner: String },
}

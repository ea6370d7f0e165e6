use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ParseError;

/// An atomic action a subject can request on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    Write,
    Execute,
    Print,
    Configure,
    Delete,
}

/// How the mandatory access-control gate treats a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacClass {
    /// Subject to no-read-up.
    ReadLike,
    /// Subject to no-write-down.
    WriteLike,
    /// Not restricted by level.
    Unrestricted,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Self::Read,
        Self::Write,
        Self::Execute,
        Self::Print,
        Self::Configure,
        Self::Delete,
    ];

    /// MAC classification. Exhaustive on purpose: a new permission does not
    /// compile until it is placed in a class.
    pub fn mac_class(self) -> MacClass {
        match self {
            Self::Read | Self::Print | Self::Execute => MacClass::ReadLike,
            Self::Write | Self::Delete | Self::Configure => MacClass::WriteLike,
        }
    }

    /// The single-permission set for this action.
    pub fn flag(self) -> PermissionSet {
        match self {
            Self::Read => PermissionSet::READ,
            Self::Write => PermissionSet::WRITE,
            Self::Execute => PermissionSet::EXECUTE,
            Self::Print => PermissionSet::PRINT,
            Self::Configure => PermissionSet::CONFIGURE,
            Self::Delete => PermissionSet::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Execute => "EXECUTE",
            Self::Print => "PRINT",
            Self::Configure => "CONFIGURE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::Permission(s.to_string()))
    }
}

bitflags! {
    /// A set of permissions. Copyable value type; equality is set equality.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionSet: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;
        const PRINT = 1 << 3;
        const CONFIGURE = 1 << 4;
        const DELETE = 1 << 5;
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PermissionSet {
    pub fn has(self, permission: Permission) -> bool {
        self.contains(permission.flag())
    }

    /// Copy of this set with `permission` added.
    pub fn with(self, permission: Permission) -> Self {
        self | permission.flag()
    }

    /// Members in declaration order.
    pub fn permissions(self) -> impl Iterator<Item = Permission> {
        Permission::ALL.into_iter().filter(move |p| self.has(*p))
    }

    pub fn len(self) -> usize {
        self.bits().count_ones() as usize
    }

    /// Parse a comma-separated list such as `READ,write`. An empty string or
    /// `-` is the empty set.
    pub fn parse_list(list: &str) -> Result<Self, ParseError> {
        let list = list.trim();
        if list.is_empty() || list == "-" {
            return Ok(Self::empty());
        }
        list.split(',')
            .map(str::parse::<Permission>)
            .collect::<Result<Self, _>>()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::empty(), |set, p| set.with(p))
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, p) in self.permissions().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(p.as_str())?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_partition_every_permission() {
        let read_like: Vec<_> = Permission::ALL
            .into_iter()
            .filter(|p| p.mac_class() == MacClass::ReadLike)
            .collect();
        let write_like: Vec<_> = Permission::ALL
            .into_iter()
            .filter(|p| p.mac_class() == MacClass::WriteLike)
            .collect();

        assert_eq!(
            read_like,
            vec![Permission::Read, Permission::Execute, Permission::Print]
        );
        assert_eq!(
            write_like,
            vec![Permission::Write, Permission::Configure, Permission::Delete]
        );
    }

    #[test]
    fn flags_are_distinct_and_cover_all() {
        let all: PermissionSet = Permission::ALL.into_iter().collect();
        assert_eq!(all, PermissionSet::all());
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn with_is_idempotent() {
        let set = PermissionSet::READ.with(Permission::Write);
        assert_eq!(set.with(Permission::Write), set);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn union_does_not_double_count() {
        let matrix = PermissionSet::READ | PermissionSet::WRITE;
        let defaults = PermissionSet::READ | PermissionSet::PRINT;
        let effective = matrix | defaults;
        assert_eq!(effective.len(), 3);
        assert!(effective.has(Permission::Print));
    }

    #[test]
    fn parse_list_accepts_mixed_case_and_spaces() {
        let set = PermissionSet::parse_list("read, WRITE ,Delete").unwrap();
        assert_eq!(
            set,
            PermissionSet::READ | PermissionSet::WRITE | PermissionSet::DELETE
        );
        assert_eq!(PermissionSet::parse_list("-").unwrap(), PermissionSet::empty());
        assert_eq!(PermissionSet::parse_list("").unwrap(), PermissionSet::empty());
    }

    #[test]
    fn parse_list_rejects_unknown_names() {
        let err = PermissionSet::parse_list("READ,FLY").unwrap_err();
        assert!(err.to_string().contains("FLY"), "unexpected error: {err}");
    }

    #[test]
    fn display_lists_members_in_declaration_order() {
        let set = PermissionSet::DELETE | PermissionSet::READ;
        assert_eq!(set.to_string(), "{READ, DELETE}");
        assert_eq!(PermissionSet::empty().to_string(), "{}");
    }
}

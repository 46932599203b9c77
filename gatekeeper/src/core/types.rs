//! Shared request types for access-control mutations.

use std::fmt;

use crate::core::config_store::ConfigDocument;
use crate::core::group_registry::{self, GroupError};

/// One logical change to `gitosis.conf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    AddGroup { group: String },
    RemoveGroup { group: String },
    AddMember { group: String, member: String },
    RemoveMember { group: String, member: String },
}

impl Mutation {
    /// Audit-log commit message. The remove-group and add-member formats are
    /// read by downstream consumers and must not change.
    pub fn commit_message(&self) -> String {
        match self {
            Self::AddGroup { group } => format!("Adding group {group} to gitosis.conf"),
            Self::RemoveGroup { group } => format!("Removing group {group} from gitosis.conf"),
            Self::AddMember { group, member } => {
                format!("Adding member {member} for group {group}")
            }
            Self::RemoveMember { group, member } => {
                format!("Removing member {member} from group {group}")
            }
        }
    }

    pub fn group(&self) -> &str {
        match self {
            Self::AddGroup { group }
            | Self::RemoveGroup { group }
            | Self::AddMember { group, .. }
            | Self::RemoveMember { group, .. } => group,
        }
    }

    pub fn member(&self) -> Option<&str> {
        match self {
            Self::AddMember { member, .. } | Self::RemoveMember { member, .. } => Some(member),
            Self::AddGroup { .. } | Self::RemoveGroup { .. } => None,
        }
    }

    /// Apply to an in-memory document. On error the document is unchanged.
    pub fn apply(&self, doc: &mut ConfigDocument) -> Result<(), GroupError> {
        match self {
            Self::AddGroup { group } => group_registry::add_group(doc, group),
            Self::RemoveGroup { group } => group_registry::remove_group(doc, group),
            Self::AddMember { group, member } => group_registry::add_member(doc, group, member),
            Self::RemoveMember { group, member } => {
                group_registry::remove_member(doc, group, member)
            }
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::AddGroup { .. } => "add-group",
            Self::RemoveGroup { .. } => "remove-group",
            Self::AddMember { .. } => "add-member",
            Self::RemoveMember { .. } => "remove-member",
        };
        f.write_str(kind)
    }
}

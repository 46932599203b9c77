//! Group and member rules layered over [`ConfigDocument`].
//!
//! A group is the `[group <name>]` section; its members are the space-joined
//! `members` option. Members keep insertion order (consumers rely on "most
//! recently added last"), so the list is a `Vec` with a `HashSet` alongside it
//! for the duplicate check.

use std::collections::HashSet;

use thiserror::Error;

use crate::core::config_store::{ConfigDocument, ConfigError};
use crate::core::section::SectionKind;

pub const MEMBERS_KEY: &str = "members";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupError {
    #[error("group '{0}' already exists")]
    GroupAlreadyExists(String),

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    #[error("This user is already member of this group")]
    MemberAlreadyInGroup { group: String, member: String },

    #[error("member '{member}' is not in group '{group}'")]
    MemberNotInGroup { group: String, member: String },

    #[error("invalid {what} '{value}': {reason}")]
    InvalidName {
        what: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A lower-level document failure that has no group-level meaning.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Ordered, duplicate-free member list of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Members {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl Members {
    /// Parse a stored `members` value. Repeated names keep their first slot.
    pub fn parse(value: &str) -> Self {
        let mut members = Self::default();
        for name in value.split_whitespace() {
            members.push(name);
        }
        members
    }

    /// Append `member`; returns false if it was already present.
    pub fn push(&mut self, member: &str) -> bool {
        if !self.seen.insert(member.to_string()) {
            return false;
        }
        self.ordered.push(member.to_string());
        true
    }

    pub fn remove(&mut self, member: &str) -> bool {
        if !self.seen.remove(member) {
            return false;
        }
        self.ordered.retain(|m| m != member);
        true
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }

    /// On-disk form: single spaces, no trailing separator.
    pub fn to_value(&self) -> String {
        self.ordered.join(" ")
    }
}

pub fn add_group(doc: &mut ConfigDocument, name: &str) -> Result<(), GroupError> {
    validate_group_name(name)?;
    let section = SectionKind::group(name).raw_name();
    doc.add_section(&section).map_err(|err| match err {
        ConfigError::DuplicateSection(_) => GroupError::GroupAlreadyExists(name.to_string()),
        other => GroupError::Config(other),
    })
}

pub fn remove_group(doc: &mut ConfigDocument, name: &str) -> Result<(), GroupError> {
    let section = SectionKind::group(name).raw_name();
    doc.remove_section(&section).map_err(|err| match err {
        ConfigError::SectionNotFound(_) => GroupError::GroupNotFound(name.to_string()),
        other => GroupError::Config(other),
    })
}

pub fn add_member(doc: &mut ConfigDocument, group: &str, member: &str) -> Result<(), GroupError> {
    validate_member(member)?;
    let mut current = members(doc, group)?;
    if !current.push(member) {
        return Err(GroupError::MemberAlreadyInGroup {
            group: group.to_string(),
            member: member.to_string(),
        });
    }
    write_members(doc, group, &current)
}

pub fn remove_member(doc: &mut ConfigDocument, group: &str, member: &str) -> Result<(), GroupError> {
    let mut current = members(doc, group)?;
    if !current.remove(member) {
        return Err(GroupError::MemberNotInGroup {
            group: group.to_string(),
            member: member.to_string(),
        });
    }
    write_members(doc, group, &current)
}

/// Members of `group`; an absent `members` option is an empty list.
pub fn members(doc: &ConfigDocument, group: &str) -> Result<Members, GroupError> {
    let section = doc
        .get_section(&SectionKind::group(group).raw_name())
        .ok_or_else(|| GroupError::GroupNotFound(group.to_string()))?;
    Ok(section.get(MEMBERS_KEY).map(Members::parse).unwrap_or_default())
}

/// Group names in file order.
pub fn group_names(doc: &ConfigDocument) -> Vec<String> {
    doc.sections()
        .filter_map(|section| section.kind().group_name().map(str::to_string))
        .collect()
}

fn write_members(doc: &mut ConfigDocument, group: &str, members: &Members) -> Result<(), GroupError> {
    let section = SectionKind::group(group).raw_name();
    doc.set_option(&section, MEMBERS_KEY, &members.to_value())?;
    Ok(())
}

pub fn validate_group_name(name: &str) -> Result<(), GroupError> {
    validate_identifier("group name", name, &['[', ']'])
}

pub fn validate_member(member: &str) -> Result<(), GroupError> {
    validate_identifier("member", member, &[])
}

fn validate_identifier(what: &'static str, value: &str, reserved: &[char]) -> Result<(), GroupError> {
    let invalid = |reason| GroupError::InvalidName {
        what,
        value: value.to_string(),
        reason,
    };
    if value.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain whitespace"));
    }
    if value.contains(reserved) {
        return Err(invalid("contains a reserved character"));
    }
    Ok(())
}

//! Typed view over `gitosis.conf` section names.
//!
//! Section names are free-form strings on disk (`[group team]`, `[gitosis]`,
//! `[repo foo]`). Only the `group` kind carries meaning for access control, so
//! the prefix convention lives here and nowhere else.

use std::fmt;

const GROUP_PREFIX: &str = "group ";

/// A section name split into the kinds this crate cares about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// `[group <name>]`: push-access rights for one managed repository.
    Group(String),
    /// Any other section, kept verbatim.
    Other(String),
}

impl SectionKind {
    pub fn group(name: impl Into<String>) -> Self {
        Self::Group(name.into())
    }

    /// Classify a raw section name as it appears between brackets.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(GROUP_PREFIX) {
            Some(name) if !name.is_empty() => Self::Group(name.to_string()),
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Raw section name, suitable for a `[...]` header.
    pub fn raw_name(&self) -> String {
        match self {
            Self::Group(name) => format!("{GROUP_PREFIX}{name}"),
            Self::Other(raw) => raw.clone(),
        }
    }

    pub fn group_name(&self) -> Option<&str> {
        match self {
            Self::Group(name) => Some(name),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_prefix_round_trips() {
        let kind = SectionKind::parse("group pink-floyd");
        assert_eq!(kind, SectionKind::group("pink-floyd"));
        assert_eq!(kind.raw_name(), "group pink-floyd");
        assert_eq!(kind.group_name(), Some("pink-floyd"));
    }

    #[test]
    fn other_sections_are_kept_verbatim() {
        let kind = SectionKind::parse("gitosis");
        assert_eq!(kind, SectionKind::Other("gitosis".to_string()));
        assert_eq!(kind.group_name(), None);
        assert_eq!(SectionKind::parse("repo foo").raw_name(), "repo foo");
    }

    #[test]
    fn bare_group_prefix_is_not_a_group() {
        assert_eq!(
            SectionKind::parse("group "),
            SectionKind::Other("group ".to_string())
        );
        // Case-sensitive: only the lowercase prefix denotes a group.
        assert!(SectionKind::parse("Group x").group_name().is_none());
    }
}

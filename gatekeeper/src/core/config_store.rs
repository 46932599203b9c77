//! In-memory model of `gitosis.conf`, an INI-like file.
//!
//! A document is an ordered list of sections; each section is an ordered list
//! of `key = value` options, with comment lines kept where they were found.
//! Section names are unique: the ordered `Vec` carries the order and a
//! `HashSet` built alongside it carries the uniqueness check.
//!
//! Nothing here touches disk or version control.

use std::collections::HashSet;

use thiserror::Error;

use crate::core::section::SectionKind;

/// Failures raised by [`parse`] and the document mutators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("malformed config at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("section '{0}' already exists")]
    DuplicateSection(String),

    #[error("section '{0}' not found")]
    SectionNotFound(String),

    #[error("invalid section name '{name}': {reason}")]
    InvalidSectionName { name: String, reason: &'static str },

    #[error("invalid option '{key}': {reason}")]
    InvalidOption { key: String, reason: &'static str },
}

/// One line inside a section body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Option { key: String, value: String },
    /// Full comment line including its `#` or `;` marker.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<Entry>,
}

impl Section {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SectionKind {
        SectionKind::parse(&self.name)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Option { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Options in file order, comments skipped.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Option { key, value } => Some((key.as_str(), value.as_str())),
            Entry::Comment(_) => None,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Overwrite in place when `key` exists, append otherwise.
    fn set(&mut self, key: &str, value: &str) {
        for entry in &mut self.entries {
            if let Entry::Option { key: k, value: v } = entry
                && k == key
            {
                *v = value.to_string();
                return;
            }
        }
        self.entries.push(Entry::Option {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
}

/// Parsed `gitosis.conf`. Has no identity beyond its contents: every service
/// operation re-parses from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    /// Comment lines before the first section header.
    preamble: Vec<String>,
    sections: Vec<Section>,
    names: HashSet<String>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn get_section(&self, name: &str) -> Option<&Section> {
        if !self.has_section(name) {
            return None;
        }
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn get_option(&self, section: &str, key: &str) -> Option<&str> {
        self.get_section(section).and_then(|s| s.get(key))
    }

    /// Append a new, empty section. Existing names are never overwritten.
    pub fn add_section(&mut self, name: &str) -> Result<(), ConfigError> {
        validate_section_name(name)?;
        if !self.names.insert(name.to_string()) {
            return Err(ConfigError::DuplicateSection(name.to_string()));
        }
        self.sections.push(Section::new(name));
        Ok(())
    }

    pub fn remove_section(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.names.remove(name) {
            return Err(ConfigError::SectionNotFound(name.to_string()));
        }
        self.sections.retain(|section| section.name != name);
        Ok(())
    }

    /// Insert or overwrite an option. Overwrites keep the option's position.
    pub fn set_option(&mut self, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
        validate_option(key, value)?;
        let target = self
            .sections
            .iter_mut()
            .find(|s| s.name == section)
            .ok_or_else(|| ConfigError::SectionNotFound(section.to_string()))?;
        target.set(key, value);
        Ok(())
    }
}

/// Parse file bytes into a document.
///
/// Blank lines are ignored; `#` and `;` lines are kept as comments. An option
/// line before any header, an unterminated header, or a repeated section name
/// is rejected.
pub fn parse(input: &[u8]) -> Result<ConfigDocument, ConfigError> {
    let text = std::str::from_utf8(input).map_err(|err| ConfigError::Malformed {
        line: 0,
        reason: format!("not valid UTF-8: {err}"),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut doc = ConfigDocument::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = |reason: String| ConfigError::Malformed {
            line: line_no,
            reason,
        };

        if line.starts_with('#') || line.starts_with(';') {
            match doc.sections.last_mut() {
                Some(section) => section.entries.push(Entry::Comment(line.to_string())),
                None => doc.preamble.push(line.to_string()),
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| malformed("unterminated section header".to_string()))?
                .trim();
            doc.add_section(name).map_err(|err| malformed(err.to_string()))?;
            continue;
        }

        let split = line
            .find(['=', ':'])
            .ok_or_else(|| malformed(format!("expected `key = value`, got '{line}'")))?;
        let key = line[..split].trim();
        let value = line[split + 1..].trim();
        if key.is_empty() {
            return Err(malformed("option with empty key".to_string()));
        }
        let section = doc
            .sections
            .last_mut()
            .ok_or_else(|| malformed(format!("option '{key}' before any section header")))?;
        section.set(key, value);
    }
    Ok(doc)
}

/// Serialize a document back to file bytes.
///
/// Sections are separated by one blank line; options are written as
/// `key = value`.
pub fn serialize(doc: &ConfigDocument) -> Vec<u8> {
    let mut out = String::new();
    for comment in &doc.preamble {
        out.push_str(comment);
        out.push('\n');
    }
    for (idx, section) in doc.sections.iter().enumerate() {
        if idx > 0 || !doc.preamble.is_empty() {
            out.push('\n');
        }
        out.push('[');
        out.push_str(&section.name);
        out.push_str("]\n");
        for entry in &section.entries {
            match entry {
                Entry::Option { key, value } => {
                    out.push_str(key);
                    out.push_str(" =");
                    if !value.is_empty() {
                        out.push(' ');
                        out.push_str(value);
                    }
                    out.push('\n');
                }
                Entry::Comment(comment) => {
                    out.push_str(comment);
                    out.push('\n');
                }
            }
        }
    }
    out.into_bytes()
}

fn validate_section_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidSectionName {
        name: name.to_string(),
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("empty"));
    }
    if name != name.trim() {
        return Err(invalid("surrounding whitespace"));
    }
    if name.contains(['[', ']', '\n', '\r']) {
        return Err(invalid("contains brackets or line breaks"));
    }
    Ok(())
}

fn validate_option(key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidOption {
        key: key.to_string(),
        reason,
    };
    if key.trim().is_empty() || key != key.trim() {
        return Err(invalid("key must be non-empty without surrounding whitespace"));
    }
    if key.contains(['=', ':', '[', '#', ';', '\n', '\r']) {
        return Err(invalid("key contains a reserved character"));
    }
    if value.contains(['\n', '\r']) {
        return Err(invalid("values are single-line"));
    }
    if value != value.trim() {
        return Err(invalid("value has surrounding whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# managed by gatekeeper
[gitosis]
loglevel = INFO

[group pink-floyd]
; legacy comment
members = one-of-these-days comfortably-numb
writable = pink-floyd

[repo pink-floyd]
daemon: yes
";

    #[test]
    fn parses_sections_options_and_comments_in_order() {
        let doc = parse(SAMPLE.as_bytes()).expect("parse");
        let names: Vec<&str> = doc.sections().map(Section::name).collect();
        assert_eq!(names, vec!["gitosis", "group pink-floyd", "repo pink-floyd"]);

        let group = doc.get_section("group pink-floyd").expect("group");
        let keys: Vec<&str> = group.options().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["members", "writable"]);
        assert_eq!(group.entries()[0], Entry::Comment("; legacy comment".to_string()));
        assert_eq!(doc.get_option("repo pink-floyd", "daemon"), Some("yes"));
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let doc = parse(SAMPLE.as_bytes()).expect("parse");
        let reparsed = parse(&serialize(&doc)).expect("reparse");
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn serialize_uses_canonical_layout() {
        let mut doc = ConfigDocument::new();
        doc.add_section("group a").expect("add a");
        doc.set_option("group a", "members", "x y").expect("set");
        doc.add_section("group b").expect("add b");
        doc.set_option("group b", "members", "").expect("set");
        let text = String::from_utf8(serialize(&doc)).expect("utf8");
        assert_eq!(text, "[group a]\nmembers = x y\n\n[group b]\nmembers =\n");
        assert_eq!(parse(text.as_bytes()).expect("parse"), doc);
    }

    #[test]
    fn rejects_option_before_header() {
        let err = parse(b"\nmembers = x\n[group a]\n").expect_err("must fail");
        assert!(matches!(err, ConfigError::Malformed { line: 2, .. }));
    }

    #[test]
    fn rejects_unterminated_header() {
        let err = parse(b"[group a\nmembers = x\n").expect_err("must fail");
        assert!(matches!(err, ConfigError::Malformed { line: 1, .. }));
        assert!(err.to_string().contains("unterminated"));
    }

    #[test]
    fn rejects_line_without_delimiter() {
        let err = parse(b"[group a]\nmembers\n").expect_err("must fail");
        assert!(matches!(err, ConfigError::Malformed { line: 2, .. }));
    }

    #[test]
    fn rejects_repeated_section_in_file() {
        let err = parse(b"[group a]\n[group a]\n").expect_err("must fail");
        assert!(matches!(err, ConfigError::Malformed { line: 2, .. }));
    }

    #[test]
    fn empty_input_is_an_empty_document() {
        assert_eq!(parse(b"").expect("parse"), ConfigDocument::new());
        assert_eq!(parse(b"\n\n  \n").expect("parse"), ConfigDocument::new());
    }

    #[test]
    fn add_section_rejects_duplicates_without_mutating() {
        let mut doc = ConfigDocument::new();
        doc.add_section("group a").expect("first");
        doc.set_option("group a", "members", "x").expect("set");
        let before = doc.clone();

        let err = doc.add_section("group a").expect_err("duplicate");
        assert_eq!(err, ConfigError::DuplicateSection("group a".to_string()));
        assert_eq!(doc, before);
    }

    #[test]
    fn add_section_appends_at_end() {
        let mut doc = parse(SAMPLE.as_bytes()).expect("parse");
        doc.add_section("group new").expect("add");
        assert_eq!(doc.sections().last().map(Section::name), Some("group new"));
    }

    #[test]
    fn remove_section_requires_presence() {
        let mut doc = ConfigDocument::new();
        let err = doc.remove_section("group a").expect_err("missing");
        assert_eq!(err, ConfigError::SectionNotFound("group a".to_string()));

        doc.add_section("group a").expect("add");
        doc.remove_section("group a").expect("remove");
        assert!(!doc.has_section("group a"));
        assert_eq!(doc, ConfigDocument::new());
    }

    #[test]
    fn set_option_overwrite_keeps_position() {
        let mut doc = ConfigDocument::new();
        doc.add_section("s").expect("add");
        doc.set_option("s", "first", "1").expect("set");
        doc.set_option("s", "second", "2").expect("set");
        doc.set_option("s", "first", "one").expect("overwrite");

        let options: Vec<(&str, &str)> = doc.get_section("s").expect("s").options().collect();
        assert_eq!(options, vec![("first", "one"), ("second", "2")]);
    }

    #[test]
    fn set_option_on_missing_section_fails() {
        let mut doc = ConfigDocument::new();
        let err = doc.set_option("nope", "k", "v").expect_err("missing");
        assert_eq!(err, ConfigError::SectionNotFound("nope".to_string()));
    }

    #[test]
    fn mutators_reject_values_that_would_not_round_trip() {
        let mut doc = ConfigDocument::new();
        assert!(matches!(
            doc.add_section("bad]name"),
            Err(ConfigError::InvalidSectionName { .. })
        ));
        doc.add_section("s").expect("add");
        assert!(matches!(
            doc.set_option("s", "k", "two\nlines"),
            Err(ConfigError::InvalidOption { .. })
        ));
        assert!(matches!(
            doc.set_option("s", "a=b", "v"),
            Err(ConfigError::InvalidOption { .. })
        ));
    }
}

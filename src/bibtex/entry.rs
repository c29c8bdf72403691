//! Raw BibTeX records as produced by the parser.

use std::fmt;

/// One top-level item of a BibTeX database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A bibliography entry such as `@article{...}`.
    Entry(RawEntry),
    /// A recoverable problem found while scanning.
    Warning(ParseWarning),
    /// The body of an `@comment{...}` block.
    Comment(String),
    /// The body of an `@preamble{...}` block.
    Preamble(String),
}

/// A warning attached to a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based source line.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// A parsed `@type{key, field = value, ...}` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEntry {
    /// Lower-cased entry type, e.g. `article`.
    pub bibtype: String,
    /// Entry key with its original case.
    pub key: String,
    /// 1-based line of the entry key.
    pub line: usize,
    pub fields: Fields,
}

impl RawEntry {
    pub fn new(bibtype: impl Into<String>, key: impl Into<String>, line: usize) -> Self {
        Self {
            bibtype: bibtype.into().to_lowercase(),
            key: key.into(),
            line,
            fields: Fields::default(),
        }
    }

    /// Builder-style field insertion, mostly for tests.
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Get a field value, treating blank values as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).filter(|v| !v.trim().is_empty())
    }

    /// Check whether a non-blank field exists.
    pub fn has(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Return the first non-blank field among `names`.
    pub fn first_of(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }
}

/// Order-preserving map from lower-cased field names to raw values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert a field, replacing an existing value with the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        let idx = self.0.iter().position(|(k, _)| *k == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Fields {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut fields = Fields::default();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Serialize an entry back to BibTeX source.
///
/// Every value is written brace-delimited, so any value the parser produced
/// reads back unchanged.
pub fn write_entry(entry: &RawEntry) -> String {
    let mut out = format!("@{}{{{}", entry.bibtype, entry.key);
    for (name, value) in entry.fields.iter() {
        out.push_str(&format!(",\n  {} = {{{}}}", name, value));
    }
    out.push_str("\n}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_case_insensitive() {
        let mut fields = Fields::default();
        fields.insert("Title", "A");
        assert_eq!(fields.get("title"), Some("A"));
        assert_eq!(fields.get("TITLE"), Some("A"));

        fields.insert("TITLE", "B");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("title"), Some("B"));
    }

    #[test]
    fn test_fields_keep_insertion_order() {
        let fields: Fields = [("b", "1"), ("a", "2"), ("c", "3")].into_iter().collect();
        let names: Vec<_> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_blank_field_is_absent() {
        let entry = RawEntry::new("misc", "k", 1).with("note", "  ").with("year", "2001");
        assert!(!entry.has("note"));
        assert_eq!(entry.first_of(&["note", "year"]), Some("2001"));
    }
}

//! Conversion options.
//!
//! Options come from three places, later ones winning: the defaults, a
//! caller-supplied set (optionally loaded from TOML), and the `options`
//! field of an individual BibTeX entry.
//!
//! ```rust
//! use mda_bib::BibOptions;
//!
//! let global = BibOptions::from_toml_str("useprefix = true\nurl = false").unwrap();
//! let local = global.overlay("useprefix=false, juniorcomma");
//! assert!(!local.useprefix);
//! assert!(local.juniorcomma);
//! assert!(!local.url);
//! ```

use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref OPTION_PAIR: Regex =
        Regex::new(r"^\s*([A-Za-z][\w-]*)\s*(?:=\s*(?:\{([^{}]*)\}|([^{}\s]*)))?\s*$").unwrap();
}

/// What to do with a `crossref`/`xdata` key that names no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossRefMode {
    /// Skip the link without a diagnostic.
    #[default]
    Tolerant,
    /// Skip the link and report a warning.
    Strict,
}

/// Options recognized by the converters.
#[derive(Debug, Clone, PartialEq)]
pub struct BibOptions {
    /// Use plain BibTeX inheritance: no field renaming across crossrefs.
    pub bibtex: bool,
    /// Put a comma before name suffixes ("Smith, Jr.").
    pub juniorcomma: bool,
    /// Treat name particles as part of the family name for sorting.
    pub useprefix: bool,
    /// Stamp every item with this identifier prefix.
    pub preid: Option<String>,
    /// Emit `URL` fields.
    pub url: bool,
    /// Emit `DOI` fields.
    pub doi: bool,
    pub crossref_mode: CrossRefMode,
    /// Any other option, kept verbatim.
    pub extra: BTreeMap<String, String>,
}

impl Default for BibOptions {
    fn default() -> Self {
        Self {
            bibtex: false,
            juniorcomma: false,
            useprefix: false,
            preid: None,
            url: true,
            doi: true,
            crossref_mode: CrossRefMode::default(),
            extra: BTreeMap::new(),
        }
    }
}

impl BibOptions {
    /// Load options from a flat TOML table.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(input).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;

        let mut options = Self::default();
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            options.set(&key, &value);
        }
        Ok(options)
    }

    /// Set a single option by name.
    pub fn set(&mut self, key: &str, value: &str) {
        let key = key.to_lowercase();
        match key.as_str() {
            "bibtex" => self.bibtex = parse_flag(value),
            "juniorcomma" => self.juniorcomma = parse_flag(value),
            "useprefix" => self.useprefix = parse_flag(value),
            "url" => self.url = parse_flag(value),
            "doi" => self.doi = parse_flag(value),
            "preid" => {
                let value = value.trim();
                self.preid = (!value.is_empty()).then(|| value.to_string());
            }
            "crossref-mode" | "crossrefmode" | "crossref_mode" => {
                self.crossref_mode = if value.trim().eq_ignore_ascii_case("strict") {
                    CrossRefMode::Strict
                } else {
                    CrossRefMode::Tolerant
                };
            }
            _ => {
                self.extra.insert(key, value.to_string());
            }
        }
    }

    /// Return a copy with an entry's `options` field applied on top.
    pub fn overlay(&self, entry_options: &str) -> Self {
        let mut merged = self.clone();
        for (key, value) in parse_option_list(entry_options) {
            merged.set(&key, &value);
        }
        merged
    }
}

/// Parse `key=value, key={value}, flag` lists. Items that don't match the
/// grammar are ignored.
pub fn parse_option_list(input: &str) -> Vec<(String, String)> {
    split_top_level(input, ',')
        .into_iter()
        .filter_map(|item| {
            let caps = OPTION_PAIR.captures(item)?;
            let key = caps.get(1)?.as_str().to_string();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "true".to_string());
            Some((key, value))
        })
        .collect()
}

/// Split on `sep` outside of braces.
pub(crate) fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "false" | "no" | "off" | "0"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = BibOptions::default();
        assert!(options.url);
        assert!(options.doi);
        assert!(!options.useprefix);
        assert_eq!(options.crossref_mode, CrossRefMode::Tolerant);
    }

    #[test]
    fn test_parse_option_list() {
        assert_eq!(
            parse_option_list("useprefix=true, preid={a, b}, juniorcomma"),
            vec![
                ("useprefix".to_string(), "true".to_string()),
                ("preid".to_string(), "a, b".to_string()),
                ("juniorcomma".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_items_are_skipped() {
        assert_eq!(
            parse_option_list("=oops, url=false, 9lives=1"),
            vec![("url".to_string(), "false".to_string())]
        );
    }

    #[test]
    fn test_overlay_wins_over_global() {
        let global = BibOptions {
            doi: false,
            ..Default::default()
        };
        let local = global.overlay("doi=true, dataonly=yes");
        assert!(local.doi);
        assert_eq!(local.extra.get("dataonly").map(String::as_str), Some("yes"));
        assert!(!global.doi);
    }

    #[test]
    fn test_from_toml() {
        let options =
            BibOptions::from_toml_str("bibtex = true\npreid = \"x-\"\ncrossref-mode = \"strict\"")
                .unwrap();
        assert!(options.bibtex);
        assert_eq!(options.preid.as_deref(), Some("x-"));
        assert_eq!(options.crossref_mode, CrossRefMode::Strict);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = BibOptions::from_toml_str("bibtex = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

//! Bibliography assembly from several input files.
//!
//! Inputs are processed left to right. BibTeX files go through the parser,
//! the crossref resolver and the field converters; files that look like
//! JSON are read as ready-made CSL items. Later files overwrite items with
//! the same id.

use crate::bibtex::{self, RawEntry, Record};
use crate::convert::{convert_entry, TexConverter};
use crate::csl::{Bib, CslItem};
use crate::error::ResolutionError;
use crate::options::BibOptions;
use crate::resolve::{resolve_crossrefs, ResolveState};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

lazy_static! {
    static ref JSON_START: Regex = Regex::new(r"^\s*\{").unwrap();
}

/// One bibliography source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibInput {
    pub filename: String,
    pub contents: String,
}

impl BibInput {
    pub fn new(filename: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            contents: contents.into(),
        }
    }
}

/// The merged result of converting all inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BibliographyResult {
    /// Items keyed by lower-cased id.
    pub bib: Bib,
    /// Diagnostics like `refs.bib:12: warning: ...`.
    pub warnings: Vec<String>,
    pub preamble: String,
    pub comments: String,
}

impl BibliographyResult {
    /// Warnings joined by newlines.
    pub fn warnings_text(&self) -> String {
        self.warnings.join("\n")
    }

    fn merge(&mut self, other: BibliographyResult) {
        self.bib.extend(other.bib);
        self.warnings.extend(other.warnings);
        append_block(&mut self.preamble, &other.preamble);
        append_block(&mut self.comments, &other.comments);
    }
}

/// Convert every input and merge the results.
pub fn convert_to_csl(
    inputs: &[BibInput],
    tex: &dyn TexConverter,
    options: &BibOptions,
) -> BibliographyResult {
    let mut result = BibliographyResult::default();
    for input in inputs {
        let converted = if JSON_START.is_match(&input.contents) {
            convert_json(input)
        } else {
            convert_bibtex(input, tex, options)
        };
        debug!(
            file = %input.filename,
            items = converted.bib.len(),
            warnings = converted.warnings.len(),
            "converted bibliography input"
        );
        result.merge(converted);
    }
    result
}

fn convert_json(input: &BibInput) -> BibliographyResult {
    let mut result = BibliographyResult::default();

    match serde_json::from_str::<BTreeMap<String, CslItem>>(&input.contents) {
        Ok(items) => {
            for (key, mut item) in items {
                if item.id.is_empty() {
                    item.id = key.clone();
                }
                result.bib.insert(key.to_lowercase(), item);
            }
        }
        Err(err) => {
            warn!(file = %input.filename, "invalid CSL-JSON input: {}", err);
            result.warnings.push(format!(
                "{}:{}: warning: invalid JSON: {}",
                input.filename,
                err.line(),
                err
            ));
        }
    }
    result
}

fn convert_bibtex(
    input: &BibInput,
    tex: &dyn TexConverter,
    options: &BibOptions,
) -> BibliographyResult {
    let mut result = BibliographyResult::default();
    let mut entries: HashMap<String, RawEntry> = HashMap::new();
    let mut order = Vec::new();

    for record in bibtex::parse(&input.contents) {
        match record {
            Record::Entry(entry) => {
                let key = entry.key.to_lowercase();
                let line = entry.line;
                if entries.insert(key.clone(), entry).is_some() {
                    result.warnings.push(format!(
                        "{}:{}: warning: duplicate entry key '{}'",
                        input.filename, line, key
                    ));
                } else {
                    order.push(key);
                }
            }
            Record::Warning(warning) => result.warnings.push(format!(
                "{}:{}: warning: {}",
                input.filename, warning.line, warning.message
            )),
            Record::Comment(text) => append_block(&mut result.comments, &text),
            Record::Preamble(text) => append_block(&mut result.preamble, &text),
        }
    }

    let mut state = ResolveState::new();
    for key in order {
        let Some(entry) = entries.get(&key) else {
            continue;
        };
        // Shared data entries only exist to be inherited from.
        if entry.bibtype == "xdata" {
            continue;
        }

        let entry_options = match entry.field("options") {
            Some(local) => options.overlay(local),
            None => options.clone(),
        };

        if let Some(resolved) = resolve_crossrefs(&key, &entries, &entry_options, &mut state) {
            let item = convert_entry(&resolved, tex, &entry_options);
            result.bib.insert(key, item);
        }
    }

    for problem in state.take_warnings() {
        let line = problem_line(&problem, &entries);
        result.warnings.push(format!(
            "{}:{}: warning: {}",
            input.filename, line, problem
        ));
    }

    result
}

/// Line of the entry a resolution problem is about.
fn problem_line(problem: &ResolutionError, entries: &HashMap<String, RawEntry>) -> usize {
    let key = match problem {
        ResolutionError::MissingCrossRef { entry, .. } => Some(entry.as_str()),
        ResolutionError::CrossRefCycle(path) => path.first().map(String::as_str),
        ResolutionError::UnknownCitation(_) => None,
    };
    key.and_then(|k| entries.get(&k.to_lowercase()))
        .map_or(0, |e| e.line)
}

fn append_block(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::PlainTex;
    use crate::options::CrossRefMode;
    use pretty_assertions::assert_eq;

    fn convert(inputs: &[BibInput]) -> BibliographyResult {
        convert_to_csl(inputs, &PlainTex, &BibOptions::default())
    }

    #[test]
    fn test_single_bibtex_file() {
        let result = convert(&[BibInput::new(
            "refs.bib",
            r#"@article{K1, author="Smith, J.", title="A Title", journal="J", year="2020"}"#,
        )]);
        assert!(result.warnings.is_empty());
        let item = &result.bib["k1"];
        assert_eq!(item.id, "K1");
        assert_eq!(item.title.as_deref(), Some("A Title"));
        assert_eq!(item.csl_type, "article-journal");
    }

    #[test]
    fn test_warnings_carry_file_and_line() {
        let result = convert(&[BibInput::new(
            "refs.bib",
            "@book{ok, title = {Fine}}\n\n@book{broken title = {x}}\n@misc{after, note = {n}}",
        )]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("refs.bib:3: warning: "));
        assert!(result.bib.contains_key("ok"));
        assert!(result.bib.contains_key("after"));
    }

    #[test]
    fn test_later_files_overwrite() {
        let result = convert(&[
            BibInput::new("a.bib", "@book{k, title = {First}}\n@preamble{A}"),
            BibInput::new("b.bib", "@book{K, title = {Second}}\n@preamble{B}"),
        ]);
        assert_eq!(result.bib.len(), 1);
        assert_eq!(result.bib["k"].title.as_deref(), Some("Second"));
        assert_eq!(result.preamble, "A\nB");
    }

    #[test]
    fn test_json_input() {
        let result = convert(&[BibInput::new(
            "items.json",
            r#"{ "Doe2000": { "type": "book", "title": "Preconverted" } }"#,
        )]);
        let item = &result.bib["doe2000"];
        assert_eq!(item.id, "Doe2000");
        assert_eq!(item.title.as_deref(), Some("Preconverted"));
    }

    #[test]
    fn test_json_error_is_a_warning() {
        let result = convert(&[BibInput::new("items.json", "{ not json")]);
        assert!(result.bib.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("items.json:1: warning: invalid JSON"));
    }

    #[test]
    fn test_entry_options_override_global() {
        let result = convert(&[BibInput::new(
            "refs.bib",
            "@book{a, author = {Ludwig van Beethoven}, options = {useprefix=true}}\n\
             @book{b, author = {Ludwig van Beethoven}}",
        )]);
        let a = &result.bib["a"].author.as_ref().unwrap()[0];
        let b = &result.bib["b"].author.as_ref().unwrap()[0];
        assert_eq!(a.non_dropping_particle.as_deref(), Some("van"));
        assert_eq!(b.dropping_particle.as_deref(), Some("van"));
    }

    #[test]
    fn test_crossref_and_xdata() {
        let result = convert(&[BibInput::new(
            "refs.bib",
            "@incollection{ch, title = {Chapter}, crossref = {coll}, xdata = {pub}}\n\
             @collection{coll, title = {The Collection}, year = {1999}}\n\
             @xdata{pub, publisher = {ACM}}",
        )]);
        let ch = &result.bib["ch"];
        assert_eq!(ch.container_title.as_deref(), Some("The Collection"));
        assert_eq!(ch.publisher.as_deref(), Some("ACM"));
        assert!(!result.bib.contains_key("pub"));
        assert!(result.bib.contains_key("coll"));
    }

    #[test]
    fn test_strict_crossref_warning_has_line() {
        let options = BibOptions {
            crossref_mode: CrossRefMode::Strict,
            ..Default::default()
        };
        let result = convert_to_csl(
            &[BibInput::new("refs.bib", "\n@inbook{c, crossref = {gone}}")],
            &PlainTex,
            &options,
        );
        assert_eq!(
            result.warnings,
            vec!["refs.bib:2: warning: unresolved crossref 'gone' in entry 'c'".to_string()]
        );
    }

    #[test]
    fn test_duplicate_keys() {
        let result = convert(&[BibInput::new(
            "refs.bib",
            "@book{k, title = {One}}\n@book{k, title = {Two}}",
        )]);
        assert_eq!(result.bib["k"].title.as_deref(), Some("Two"));
        assert_eq!(
            result.warnings,
            vec!["refs.bib:2: warning: duplicate entry key 'k'".to_string()]
        );
    }
}

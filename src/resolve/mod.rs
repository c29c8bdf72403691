//! Cross-reference resolution.
//!
//! Entries can inherit fields from a parent through `crossref` and from
//! shared data entries through `xdata`. Inherited fields never overwrite
//! fields the child sets itself. In BibLaTeX mode some fields are renamed
//! on the way down (a book's `title` becomes a chapter's `booktitle`); in
//! plain BibTeX mode everything is copied under its own name.
//!
//! Resolution is memoized in a [`ResolveState`], which also tracks the
//! chain of entries being resolved so that cycles are reported instead of
//! recursing forever.

use crate::bibtex::RawEntry;
use crate::error::ResolutionError;
use crate::options::{BibOptions, CrossRefMode};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Fields that are never inherited.
const NON_INHERITABLE: &[&str] = &[
    "ids",
    "crossref",
    "xref",
    "xdata",
    "entryset",
    "entrysubtype",
    "execute",
    "label",
    "options",
    "presort",
    "related",
    "relatedoptions",
    "relatedstring",
    "relatedtype",
    "shorthand",
    "shorthandintro",
    "sortkey",
];

/// Title fields that only make sense on the entry that carries them.
const OWN_TITLES: &[&str] = &["shorttitle", "sorttitle", "indextitle", "indexsorttitle"];

const MULTIVOLUME: &[&str] = &["mvbook", "mvcollection", "mvproceedings", "mvreference"];

const WHOLE_WORKS: &[&str] = &["book", "collection", "proceedings", "reference", "periodical"];

const BOOK_PARTS: &[&str] = &["inbook", "bookinbook", "suppbook"];

/// Memo table and recursion stack shared across one database.
#[derive(Debug, Default)]
pub struct ResolveState {
    finished: HashMap<String, RawEntry>,
    resolving: Vec<String>,
    warnings: Vec<ResolutionError>,
}

impl ResolveState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has been fully resolved.
    pub fn is_finished(&self, key: &str) -> bool {
        self.finished.contains_key(&key.to_lowercase())
    }

    /// Drain the problems found so far.
    pub fn take_warnings(&mut self) -> Vec<ResolutionError> {
        std::mem::take(&mut self.warnings)
    }
}

/// Resolve `key` against `entries` (keyed by lower-cased key), returning
/// the entry with all inherited fields filled in.
///
/// Returns `None` only when `key` names no entry. Missing parents and
/// cycles are recorded in `state` and otherwise skipped.
pub fn resolve_crossrefs(
    key: &str,
    entries: &HashMap<String, RawEntry>,
    options: &BibOptions,
    state: &mut ResolveState,
) -> Option<RawEntry> {
    let id = key.to_lowercase();
    if let Some(done) = state.finished.get(&id) {
        return Some(done.clone());
    }
    let entry = entries.get(&id)?;

    if state.resolving.contains(&id) {
        report_cycle(state, &id);
        return Some(entry.clone());
    }

    state.resolving.push(id.clone());
    let mut resolved = entry.clone();

    for target in link_targets(entry, "xdata") {
        if let Some(parent) = resolve_link(entry, &target, entries, options, state) {
            inherit_verbatim(&mut resolved, &parent);
        }
    }

    for target in link_targets(entry, "crossref") {
        if let Some(parent) = resolve_link(entry, &target, entries, options, state) {
            if options.bibtex {
                inherit_verbatim(&mut resolved, &parent);
            } else {
                inherit_renamed(&mut resolved, &parent);
            }
        }
    }

    state.resolving.pop();
    state.finished.insert(id, resolved.clone());
    Some(resolved)
}

fn resolve_link(
    entry: &RawEntry,
    target: &str,
    entries: &HashMap<String, RawEntry>,
    options: &BibOptions,
    state: &mut ResolveState,
) -> Option<RawEntry> {
    if !entries.contains_key(target) {
        match options.crossref_mode {
            CrossRefMode::Tolerant => {
                debug!(entry = %entry.key, parent = target, "skipping unresolved crossref");
            }
            CrossRefMode::Strict => {
                state.warnings.push(ResolutionError::MissingCrossRef {
                    entry: entry.key.clone(),
                    target: target.to_string(),
                });
            }
        }
        return None;
    }

    if state.resolving.iter().any(|k| k == target) {
        report_cycle(state, target);
        return None;
    }

    resolve_crossrefs(target, entries, options, state)
}

fn report_cycle(state: &mut ResolveState, target: &str) {
    let start = state
        .resolving
        .iter()
        .position(|k| k == target)
        .unwrap_or(0);
    let mut path: Vec<String> = state.resolving[start..].to_vec();
    path.push(target.to_string());

    warn!(path = %path.join(" -> "), "crossref cycle");
    state.warnings.push(ResolutionError::CrossRefCycle(path));
}

/// Link targets of `field`, lower-cased. `xdata` may list several keys.
fn link_targets(entry: &RawEntry, field: &str) -> Vec<String> {
    entry
        .field(field)
        .map(|value| {
            value
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn inherit_verbatim(child: &mut RawEntry, parent: &RawEntry) {
    for (name, value) in parent.fields.iter() {
        if !NON_INHERITABLE.contains(&name) && !child.has(name) {
            child.fields.insert(name, value);
        }
    }
}

/// Copy the parent's fields under the names the child expects.
fn inherit_renamed(child: &mut RawEntry, parent: &RawEntry) {
    let title_prefix = if MULTIVOLUME.contains(&parent.bibtype.as_str()) {
        Some("main")
    } else if WHOLE_WORKS.contains(&parent.bibtype.as_str()) {
        Some("book")
    } else {
        None
    };

    let inherits_bookauthor = matches!(child.bibtype.as_str(), "book" | "mvbook")
        || (matches!(parent.bibtype.as_str(), "book" | "mvbook")
            && BOOK_PARTS.contains(&child.bibtype.as_str()));

    for (name, value) in parent.fields.iter() {
        if NON_INHERITABLE.contains(&name) {
            continue;
        }

        let target = match (title_prefix, name) {
            (Some(_), own) if OWN_TITLES.contains(&own) => continue,
            (Some(prefix), "title") => format!("{}title", prefix),
            (Some(prefix), "subtitle") => format!("{}subtitle", prefix),
            (Some(prefix), "titleaddon") => format!("{}titleaddon", prefix),
            _ => name.to_string(),
        };

        if inherits_bookauthor && name == "author" && !child.has("bookauthor") {
            child.fields.insert("bookauthor", value);
        }
        if !child.has(&target) {
            child.fields.insert(&target, value);
        }
    }
}

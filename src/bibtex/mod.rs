//! BibTeX database parsing.
//!
//! The parser never fails as a whole. Malformed directives turn into
//! [`Record::Warning`]s carrying the line number and a short excerpt of the
//! offending text, and scanning resumes at the next `@`.
//!
//! ```rust
//! use mda_bib::bibtex::{parse, Record};
//!
//! let records = parse("@book{knuth84, title = {The {\\TeX}book}, year = 1984}");
//! match &records[0] {
//!     Record::Entry(entry) => assert_eq!(entry.fields.get("year"), Some("1984")),
//!     other => panic!("unexpected record {:?}", other),
//! }
//! ```

mod entry;
mod parser;

pub use entry::{write_entry, Fields, ParseWarning, RawEntry, Record};

/// Parse BibTeX source text into records.
pub fn parse(text: &str) -> Vec<Record> {
    parser::parse_records(text)
}

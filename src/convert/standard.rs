//! One-to-one field copies.

use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::CslItem;
use crate::options::BibOptions;

/// CSL variables and their source fields; the first non-empty source wins.
const STANDARD_FIELDS: &[(&str, &[&str])] = &[
    (
        "publisher",
        &["school", "institution", "organization", "howpublished", "publisher"],
    ),
    ("publisher-place", &["location", "address"]),
    ("original-publisher", &["origpublisher"]),
    ("original-publisher-place", &["origlocation"]),
    ("event-place", &["venue"]),
    ("edition", &["edition"]),
    ("ISBN", &["isbn"]),
    ("ISSN", &["issn"]),
    ("note", &["note", "addendum"]),
    ("annote", &["annotation", "annote"]),
    ("abstract", &["abstract"]),
    ("keyword", &["keywords"]),
    ("number-of-pages", &["pagetotal"]),
    ("number-of-volumes", &["volumes"]),
    ("version", &["version"]),
    ("chapter-number", &["chapter"]),
    ("status", &["pubstate"]),
];

pub fn convert_standard(
    entry: &RawEntry,
    tex: &dyn TexConverter,
    _options: &BibOptions,
    item: &mut CslItem,
) {
    for &(variable, sources) in STANDARD_FIELDS {
        if let Some(value) = entry.first_of(sources) {
            item.set_text(variable, tex.convert(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::PlainTex;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_source_wins() {
        let entry = RawEntry::new("phdthesis", "k", 1)
            .with("publisher", "Ignored")
            .with("school", "MIT")
            .with("address", "Cambridge, MA")
            .with("isbn", "978-3-16")
            .with("keywords", "rust, parsing")
            .with("pagetotal", "320");
        let mut item = CslItem::new("k");
        convert_standard(&entry, &PlainTex, &BibOptions::default(), &mut item);

        assert_eq!(item.publisher.as_deref(), Some("MIT"));
        assert_eq!(item.publisher_place.as_deref(), Some("Cambridge, MA"));
        assert_eq!(item.isbn.as_deref(), Some("978-3-16"));
        assert_eq!(item.keyword.as_deref(), Some("rust, parsing"));
        assert_eq!(item.number_of_pages.as_deref(), Some("320"));
        assert_eq!(item.note, None);
    }

    #[test]
    fn test_values_are_converted() {
        let entry = RawEntry::new("book", "k", 1).with("publisher", "Springer {\\&} Co");
        let mut item = CslItem::new("k");
        convert_standard(&entry, &PlainTex, &BibOptions::default(), &mut item);
        assert_eq!(item.publisher.as_deref(), Some("Springer & Co"));
    }
}

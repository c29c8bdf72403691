//! Field converters: one resolved BibTeX entry in, one CSL item out.
//!
//! Each converter reads the raw entry and writes its share of the item.
//! They run in a fixed order because the title and misc converters depend
//! on the CSL type chosen first.

mod dates;
mod electronic;
pub mod locale;
mod misc;
mod names;
mod standard;
mod tex;
mod titles;
mod types;

pub use dates::{convert_dates, parse_date_range};
pub use electronic::convert_electronic;
pub use misc::convert_misc;
pub use names::{convert_names, parse_name, parse_name_list};
pub use standard::convert_standard;
pub use tex::PlainTex;
pub use titles::convert_titles;
pub use types::convert_type;

use crate::bibtex::RawEntry;
use crate::csl::CslItem;
use crate::options::BibOptions;

/// Converts TeX markup in field values to plain text.
///
/// Any `Fn(&str) -> String` can be used, so callers with their own TeX
/// pipeline can plug it in directly.
pub trait TexConverter {
    fn convert(&self, tex: &str) -> String;
}

impl<F> TexConverter for F
where
    F: Fn(&str) -> String,
{
    fn convert(&self, tex: &str) -> String {
        self(tex)
    }
}

/// Convert a resolved entry into a CSL item.
pub fn convert_entry(entry: &RawEntry, tex: &dyn TexConverter, options: &BibOptions) -> CslItem {
    let mut item = CslItem::new(entry.key.clone());

    convert_type(entry, tex, options, &mut item);
    convert_names(entry, tex, options, &mut item);
    convert_titles(entry, tex, options, &mut item);
    convert_dates(entry, tex, options, &mut item);
    convert_standard(entry, tex, options, &mut item);
    convert_electronic(entry, tex, options, &mut item);
    convert_misc(entry, tex, options, &mut item);

    item.preid = options.preid.clone();
    item.source_line = Some(entry.line);
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csl::{DatePart, Name};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_convert_article() {
        let entry = RawEntry::new("article", "Smith2020", 3)
            .with("author", "Smith, J.")
            .with("title", "A {Title}")
            .with("journal", "J")
            .with("year", "2020")
            .with("pages", "1--10");
        let item = convert_entry(&entry, &PlainTex, &BibOptions::default());

        assert_eq!(item.id, "Smith2020");
        assert_eq!(item.csl_type, "article-journal");
        assert_eq!(item.title.as_deref(), Some("A Title"));
        assert_eq!(item.container_title.as_deref(), Some("J"));
        assert_eq!(item.page.as_deref(), Some("1-10"));
        assert_eq!(
            item.author,
            Some(vec![Name {
                family: Some("Smith".into()),
                given: Some("J.".into()),
                ..Default::default()
            }])
        );
        assert_eq!(
            item.issued.unwrap().date_parts,
            vec![vec![DatePart::Number(2020)]]
        );
        assert_eq!(item.source_line, Some(3));
    }

    #[test]
    fn test_preid_is_stamped() {
        let options = BibOptions {
            preid: Some("bib-".into()),
            ..Default::default()
        };
        let item = convert_entry(&RawEntry::new("misc", "k", 1), &PlainTex, &options);
        assert_eq!(item.preid.as_deref(), Some("bib-"));
    }

    #[test]
    fn test_closure_as_tex_converter() {
        let shout = |s: &str| s.to_uppercase();
        let entry = RawEntry::new("book", "k", 1).with("title", "quiet");
        let item = convert_entry(&entry, &shout, &BibOptions::default());
        assert_eq!(item.title.as_deref(), Some("QUIET"));
    }
}

//! Pages, volumes, numbers, genre and language.

use super::locale::resolve_language;
use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::CslItem;
use crate::options::BibOptions;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DASHES: Regex = Regex::new(r"\s*[-\x{2013}\x{2014}]+\s*").unwrap();
    static ref FIRST_PAGE: Regex = Regex::new(r"^\s*(\d+)").unwrap();
}

/// Types whose `number` is a position inside a series.
const SERIES_TYPES: &[&str] = &["book", "chapter", "paper-conference", "entry-encyclopedia"];

pub fn convert_misc(
    entry: &RawEntry,
    tex: &dyn TexConverter,
    _options: &BibOptions,
    item: &mut CslItem,
) {
    let plain = |field: &str| entry.field(field).map(|v| tex.convert(v));

    if let Some(pages) = plain("pages") {
        let page = DASHES.replace_all(&pages, "-").into_owned();
        item.page_first = FIRST_PAGE.captures(&page).map(|caps| caps[1].to_string());
        item.set_text("page", page);
    }

    if let Some(volume) = plain("volume") {
        let volume = match plain("part") {
            Some(part) => format!("{}.{}", volume, part),
            None => volume,
        };
        item.set_text("volume", volume);
    }

    if let Some(issue) = plain("issue") {
        item.set_text("issue", issue);
    }

    if let Some(number) = plain("number") {
        let csl_type = item.csl_type.as_str();
        let target = if csl_type.starts_with("article") || csl_type == "periodical" {
            if item.issue.is_some() {
                "number"
            } else {
                "issue"
            }
        } else if SERIES_TYPES.contains(&csl_type) && entry.has("series") {
            "collection-number"
        } else {
            "number"
        };
        item.set_text(target, number);
    }

    if let Some(genre) = plain("type") {
        item.set_text("genre", genre);
    }

    if let Some(language) = entry.first_of(&["langid", "language"]) {
        let code = resolve_language(language, entry.field("langidopts"))
            .unwrap_or_else(|| tex.convert(language));
        item.set_text("language", code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::PlainTex;
    use pretty_assertions::assert_eq;

    fn misc(entry: &RawEntry, csl_type: &str) -> CslItem {
        let mut item = CslItem::new(entry.key.clone());
        item.csl_type = csl_type.to_string();
        convert_misc(entry, &PlainTex, &BibOptions::default(), &mut item);
        item
    }

    #[test]
    fn test_pages() {
        let item = misc(&RawEntry::new("article", "k", 1).with("pages", "97 -- 111"), "article");
        assert_eq!(item.page.as_deref(), Some("97-111"));
        assert_eq!(item.page_first.as_deref(), Some("97"));

        let item = misc(&RawEntry::new("article", "k", 1).with("pages", "xii--xv"), "article");
        assert_eq!(item.page.as_deref(), Some("xii-xv"));
        assert_eq!(item.page_first, None);
    }

    #[test]
    fn test_volume_and_part() {
        let entry = RawEntry::new("book", "k", 1).with("volume", "3").with("part", "2");
        assert_eq!(misc(&entry, "book").volume.as_deref(), Some("3.2"));
    }

    #[test]
    fn test_number_routing() {
        let entry = RawEntry::new("article", "k", 1).with("number", "4");
        assert_eq!(misc(&entry, "article-journal").issue.as_deref(), Some("4"));

        let entry = RawEntry::new("book", "k", 1)
            .with("number", "12")
            .with("series", "LNCS");
        assert_eq!(misc(&entry, "book").collection_number.as_deref(), Some("12"));

        let entry = RawEntry::new("techreport", "k", 1).with("number", "TR-7");
        assert_eq!(misc(&entry, "report").number.as_deref(), Some("TR-7"));

        let entry = RawEntry::new("article", "k", 1)
            .with("issue", "Spring")
            .with("number", "4");
        let item = misc(&entry, "article-journal");
        assert_eq!(item.issue.as_deref(), Some("Spring"));
        assert_eq!(item.number.as_deref(), Some("4"));
    }

    #[test]
    fn test_genre_and_language() {
        let entry = RawEntry::new("thesis", "k", 1)
            .with("type", "Habilitation")
            .with("langid", "english")
            .with("langidopts", "variant=british");
        let item = misc(&entry, "thesis");
        assert_eq!(item.genre.as_deref(), Some("Habilitation"));
        assert_eq!(item.language.as_deref(), Some("en-GB"));
    }
}

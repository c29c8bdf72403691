//! Title, container title and related variables.

use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::CslItem;
use crate::options::BibOptions;

/// CSL types whose title is a part of a larger work.
const CHAPTER_LIKE: &[&str] = &["chapter", "entry-encyclopedia", "paper-conference"];

const JOURNAL: &[&str] = &["journaltitle", "journal"];
const NONE: &[&str] = &[];

/// Fill title variables. Must run after the type has been chosen.
pub fn convert_titles(
    entry: &RawEntry,
    tex: &dyn TexConverter,
    _options: &BibOptions,
    item: &mut CslItem,
) {
    let chapter_like = CHAPTER_LIKE.contains(&item.csl_type.as_str());
    let has_main = entry.has("maintitle");

    let (title, volume, container): (&str, &[&str], &[&str]) = match (chapter_like, has_main) {
        (false, true) => ("maintitle", &["title"][..], JOURNAL),
        (true, true) => ("title", &["booktitle"][..], &["maintitle"][..]),
        (true, false) => ("title", NONE, &["booktitle"][..]),
        (false, false) => ("title", &["issuetitle"][..], JOURNAL),
    };

    item.title = compose(entry, &[title], tex);
    item.volume_title = compose(entry, volume, tex);
    item.container_title = compose(entry, container, tex);

    let plain = |field: &str| entry.field(field).map(|v| tex.convert(v));
    item.set_text("title-short", plain("shorttitle").unwrap_or_default());
    item.set_text(
        "container-title-short",
        entry
            .first_of(&["shortjournal", "journalabbr"])
            .map(|v| tex.convert(v))
            .unwrap_or_default(),
    );
    item.set_text("collection-title", plain("series").unwrap_or_default());
    item.set_text("event", plain("eventtitle").unwrap_or_default());
    item.set_text("original-title", plain("origtitle").unwrap_or_default());
}

/// Build a full title from the first present field in `keys`, appending its
/// subtitle and title addendum.
///
/// For a key like `booktitle` the companions are `booksubtitle` and
/// `booktitleaddon`; for `journal` they are `journalsubtitle` and
/// `journaltitleaddon`.
fn compose(entry: &RawEntry, keys: &[&str], tex: &dyn TexConverter) -> Option<String> {
    let (key, base) = keys
        .iter()
        .find_map(|key| entry.field(key).map(|value| (*key, value)))?;

    let prefix = key.strip_suffix("title").unwrap_or(key);
    let mut title = tex.convert(base);

    if let Some(sub) = entry.field(&format!("{}subtitle", prefix)) {
        title.push_str(": ");
        title.push_str(&tex.convert(sub));
    }
    if let Some(addon) = entry.field(&format!("{}titleaddon", prefix)) {
        title.push_str(". ");
        title.push_str(&tex.convert(addon));
    }

    (!title.is_empty()).then_some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::PlainTex;
    use pretty_assertions::assert_eq;

    fn titles(entry: &RawEntry, csl_type: &str) -> CslItem {
        let mut item = CslItem::new(entry.key.clone());
        item.csl_type = csl_type.to_string();
        convert_titles(entry, &PlainTex, &BibOptions::default(), &mut item);
        item
    }

    #[test]
    fn test_article_title_and_journal() {
        let entry = RawEntry::new("article", "k", 1)
            .with("title", "Main")
            .with("subtitle", "Sub")
            .with("titleaddon", "Addon")
            .with("journal", "Journal")
            .with("journalsubtitle", "Series A")
            .with("shortjournal", "J.");
        let item = titles(&entry, "article-journal");
        assert_eq!(item.title.as_deref(), Some("Main: Sub. Addon"));
        assert_eq!(item.container_title.as_deref(), Some("Journal: Series A"));
        assert_eq!(item.container_title_short.as_deref(), Some("J."));
    }

    #[test]
    fn test_chapter_with_booktitle() {
        let entry = RawEntry::new("incollection", "k", 1)
            .with("title", "Chapter")
            .with("booktitle", "Book")
            .with("booksubtitle", "More");
        let item = titles(&entry, "chapter");
        assert_eq!(item.title.as_deref(), Some("Chapter"));
        assert_eq!(item.container_title.as_deref(), Some("Book: More"));
        assert_eq!(item.volume_title, None);
    }

    #[test]
    fn test_chapter_in_multivolume_work() {
        let entry = RawEntry::new("incollection", "k", 1)
            .with("title", "Chapter")
            .with("booktitle", "Volume Two")
            .with("maintitle", "Collected Works");
        let item = titles(&entry, "chapter");
        assert_eq!(item.title.as_deref(), Some("Chapter"));
        assert_eq!(item.volume_title.as_deref(), Some("Volume Two"));
        assert_eq!(item.container_title.as_deref(), Some("Collected Works"));
    }

    #[test]
    fn test_volume_of_multivolume_book() {
        let entry = RawEntry::new("book", "k", 1)
            .with("title", "Volume Two")
            .with("maintitle", "Collected Works")
            .with("mainsubtitle", "Complete");
        let item = titles(&entry, "book");
        assert_eq!(item.title.as_deref(), Some("Collected Works: Complete"));
        assert_eq!(item.volume_title.as_deref(), Some("Volume Two"));
    }

    #[test]
    fn test_secondary_titles() {
        let entry = RawEntry::new("inproceedings", "k", 1)
            .with("title", "Talk")
            .with("shorttitle", "T")
            .with("series", "LNCS")
            .with("eventtitle", "Conf 2020")
            .with("origtitle", "Vortrag");
        let item = titles(&entry, "paper-conference");
        assert_eq!(item.title_short.as_deref(), Some("T"));
        assert_eq!(item.collection_title.as_deref(), Some("LNCS"));
        assert_eq!(item.event.as_deref(), Some("Conf 2020"));
        assert_eq!(item.original_title.as_deref(), Some("Vortrag"));
    }
}

//! Entry type mapping.

use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::CslItem;
use crate::options::BibOptions;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref TEMPLATE: Regex = Regex::new(r"\$\{([^}|]+)\|([^}]*)\}").unwrap();
}

/// Fields that mark an article as appearing in a journal.
const JOURNAL_FIELDS: &[&str] = &["journaltitle", "journal", "shortjournal"];

/// BibTeX/BibLaTeX entry types and their CSL types.
///
/// `${field|default}` appends `-<value of field>`, or `-<default>` when the
/// field is missing.
const TYPE_MAP: &[(&str, &str)] = &[
    ("article", "article${entrysubtype|journal}"),
    ("book", "book"),
    ("mvbook", "book"),
    ("inbook", "chapter"),
    ("bookinbook", "chapter"),
    ("suppbook", "chapter"),
    ("booklet", "pamphlet"),
    ("collection", "book"),
    ("mvcollection", "book"),
    ("incollection", "chapter"),
    ("suppcollection", "chapter"),
    ("manual", "book"),
    ("misc", "article"),
    ("online", "webpage"),
    ("www", "webpage"),
    ("electronic", "webpage"),
    ("patent", "patent"),
    ("periodical", "periodical"),
    ("suppperiodical", "article${entrysubtype|journal}"),
    ("proceedings", "book"),
    ("mvproceedings", "book"),
    ("inproceedings", "paper-conference"),
    ("conference", "paper-conference"),
    ("reference", "book"),
    ("mvreference", "book"),
    ("inreference", "entry${entrysubtype|encyclopedia}"),
    ("report", "report"),
    ("techreport", "report"),
    ("thesis", "thesis"),
    ("mastersthesis", "thesis"),
    ("phdthesis", "thesis"),
    ("unpublished", "manuscript"),
    ("artwork", "graphic"),
    ("image", "graphic"),
    ("audio", "song"),
    ("music", "song"),
    ("movie", "motion_picture"),
    ("video", "motion_picture"),
    ("jurisdiction", "legal_case"),
    ("legislation", "legislation"),
    ("legal", "treaty"),
    ("letter", "personal_communication"),
    ("performance", "speech"),
    ("review", "review"),
    ("software", "software"),
    ("standard", "standard"),
    ("dataset", "dataset"),
];

/// Pick the CSL `type` (and a thesis `genre`) for an entry.
pub fn convert_type(
    entry: &RawEntry,
    _tex: &dyn TexConverter,
    _options: &BibOptions,
    item: &mut CslItem,
) {
    let bibtype = entry.bibtype.as_str();

    item.csl_type = match bibtype {
        "unpublished" if entry.first_of(&["eventdate", "eventtitle", "venue"]).is_some() => {
            "speech".to_string()
        }
        "article" if !entry.has("entrysubtype") && entry.first_of(JOURNAL_FIELDS).is_none() => {
            "article".to_string()
        }
        _ => {
            let template = TYPE_MAP
                .iter()
                .find(|(name, _)| *name == bibtype)
                .map(|(_, csl)| *csl)
                .unwrap_or("article");
            expand_template(template, entry)
        }
    };

    match bibtype {
        "mastersthesis" => item.genre = Some("mathesis".to_string()),
        "phdthesis" => item.genre = Some("phdthesis".to_string()),
        _ => {}
    }
}

fn expand_template(template: &str, entry: &RawEntry) -> String {
    TEMPLATE
        .replace_all(template, |caps: &Captures| {
            let subtype = caps[1]
                .split('|')
                .find_map(|field| entry.field(field.trim()))
                .map(|v| v.trim().to_lowercase().replace(char::is_whitespace, "-"));
            match subtype.as_deref().unwrap_or(&caps[2]) {
                "" => String::new(),
                s => format!("-{}", s),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::PlainTex;
    use pretty_assertions::assert_eq;

    fn csl_type(entry: &RawEntry) -> (String, Option<String>) {
        let mut item = CslItem::new(entry.key.clone());
        convert_type(entry, &PlainTex, &BibOptions::default(), &mut item);
        (item.csl_type, item.genre)
    }

    #[test]
    fn test_article_subtypes() {
        let journal = RawEntry::new("article", "a", 1).with("journal", "Nature");
        assert_eq!(csl_type(&journal).0, "article-journal");

        let bare = RawEntry::new("article", "a", 1);
        assert_eq!(csl_type(&bare).0, "article");

        let magazine = RawEntry::new("article", "a", 1)
            .with("journaltitle", "Wired")
            .with("entrysubtype", "Magazine");
        assert_eq!(csl_type(&magazine).0, "article-magazine");
    }

    #[test]
    fn test_table_lookups() {
        assert_eq!(csl_type(&RawEntry::new("InProceedings", "a", 1)).0, "paper-conference");
        assert_eq!(csl_type(&RawEntry::new("incollection", "a", 1)).0, "chapter");
        assert_eq!(csl_type(&RawEntry::new("online", "a", 1)).0, "webpage");
        assert_eq!(csl_type(&RawEntry::new("inreference", "a", 1)).0, "entry-encyclopedia");
        assert_eq!(csl_type(&RawEntry::new("letter", "a", 1)).0, "personal_communication");
    }

    #[test]
    fn test_unknown_type_defaults_to_article() {
        assert_eq!(csl_type(&RawEntry::new("gizmo", "a", 1)).0, "article");
    }

    #[test]
    fn test_theses_get_genre() {
        assert_eq!(
            csl_type(&RawEntry::new("phdthesis", "a", 1)),
            ("thesis".to_string(), Some("phdthesis".to_string()))
        );
        assert_eq!(
            csl_type(&RawEntry::new("mastersthesis", "a", 1)),
            ("thesis".to_string(), Some("mathesis".to_string()))
        );
    }

    #[test]
    fn test_unpublished_talk_is_speech() {
        let talk = RawEntry::new("unpublished", "a", 1).with("eventtitle", "RustConf");
        assert_eq!(csl_type(&talk).0, "speech");
        assert_eq!(csl_type(&RawEntry::new("unpublished", "a", 1)).0, "manuscript");
    }
}

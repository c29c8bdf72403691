//! Locale terms.
//!
//! English defaults are built in; a CSL locale file or a style's inline
//! `<locale>` blocks override them term by term.

use super::xml::XmlNode;
use std::collections::HashMap;

const ENGLISH: &[(&str, &str, &str, &str)] = &[
    // (name, form, singular, plural)
    ("and", "long", "and", "and"),
    ("and", "symbol", "&", "&"),
    ("et-al", "long", "et al.", "et al."),
    ("and others", "long", "and others", "and others"),
    ("no date", "long", "no date", "no dates"),
    ("no date", "short", "n.d.", "n.d."),
    ("in", "long", "in", "in"),
    ("accessed", "long", "accessed", "accessed"),
    ("retrieved", "long", "retrieved", "retrieved"),
    ("from", "long", "from", "from"),
    ("available at", "long", "available at", "available at"),
    ("page", "long", "page", "pages"),
    ("page", "short", "p.", "pp."),
    ("volume", "long", "volume", "volumes"),
    ("volume", "short", "vol.", "vols."),
    ("issue", "long", "issue", "issues"),
    ("issue", "short", "no.", "nos."),
    ("chapter", "long", "chapter", "chapters"),
    ("chapter", "short", "chap.", "chaps."),
    ("edition", "long", "edition", "editions"),
    ("edition", "short", "ed.", "eds."),
    ("editor", "long", "editor", "editors"),
    ("editor", "short", "ed.", "eds."),
    ("editor", "verb", "edited by", "edited by"),
    ("translator", "long", "translator", "translators"),
    ("translator", "short", "trans.", "trans."),
    ("translator", "verb", "translated by", "translated by"),
    ("director", "long", "director", "directors"),
    ("director", "short", "dir.", "dirs."),
    ("container-author", "long", "author", "authors"),
    ("month-01", "long", "January", "January"),
    ("month-02", "long", "February", "February"),
    ("month-03", "long", "March", "March"),
    ("month-04", "long", "April", "April"),
    ("month-05", "long", "May", "May"),
    ("month-06", "long", "June", "June"),
    ("month-07", "long", "July", "July"),
    ("month-08", "long", "August", "August"),
    ("month-09", "long", "September", "September"),
    ("month-10", "long", "October", "October"),
    ("month-11", "long", "November", "November"),
    ("month-12", "long", "December", "December"),
    ("month-01", "short", "Jan.", "Jan."),
    ("month-02", "short", "Feb.", "Feb."),
    ("month-03", "short", "Mar.", "Mar."),
    ("month-04", "short", "Apr.", "Apr."),
    ("month-05", "short", "May", "May"),
    ("month-06", "short", "Jun.", "Jun."),
    ("month-07", "short", "Jul.", "Jul."),
    ("month-08", "short", "Aug.", "Aug."),
    ("month-09", "short", "Sep.", "Sep."),
    ("month-10", "short", "Oct.", "Oct."),
    ("month-11", "short", "Nov.", "Nov."),
    ("month-12", "short", "Dec.", "Dec."),
    ("season-01", "long", "Spring", "Spring"),
    ("season-02", "long", "Summer", "Summer"),
    ("season-03", "long", "Autumn", "Autumn"),
    ("season-04", "long", "Winter", "Winter"),
    ("open-quote", "long", "\u{201c}", "\u{201c}"),
    ("close-quote", "long", "\u{201d}", "\u{201d}"),
];

#[derive(Debug, Clone, PartialEq)]
struct Term {
    single: String,
    multiple: String,
}

/// Term lookup by name and form.
#[derive(Debug, Clone, PartialEq)]
pub struct Terms {
    lang: Option<String>,
    terms: HashMap<(String, String), Term>,
}

impl Default for Terms {
    fn default() -> Self {
        Self::english()
    }
}

impl Terms {
    pub fn english() -> Self {
        let terms = ENGLISH
            .iter()
            .map(|&(name, form, single, multiple)| {
                (
                    (name.to_string(), form.to_string()),
                    Term {
                        single: single.to_string(),
                        multiple: multiple.to_string(),
                    },
                )
            })
            .collect();
        Self {
            lang: Some("en-US".to_string()),
            terms,
        }
    }

    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    /// Look up a term, falling back from `verb-short` to `verb`, and from
    /// `short`, `verb` or `symbol` to `long`.
    pub fn get(&self, name: &str, form: &str, plural: bool) -> Option<&str> {
        let fallbacks: &[&str] = match form {
            "verb-short" => &["verb-short", "verb", "long"],
            "symbol" => &["symbol", "short", "long"],
            "long" => &["long"],
            other => {
                return self
                    .lookup(name, other, plural)
                    .or_else(|| self.lookup(name, "long", plural));
            }
        };
        fallbacks
            .iter()
            .find_map(|form| self.lookup(name, form, plural))
    }

    fn lookup(&self, name: &str, form: &str, plural: bool) -> Option<&str> {
        self.terms
            .get(&(name.to_string(), form.to_string()))
            .map(|t| if plural { t.multiple.as_str() } else { t.single.as_str() })
    }

    /// Merge the terms of a `<locale>` element.
    pub(crate) fn apply_locale(&mut self, locale: &XmlNode) {
        if let Some(lang) = locale.attr("xml:lang") {
            self.lang = Some(lang.to_string());
        }
        let Some(terms) = locale.child("terms") else {
            return;
        };
        for term in terms.elements().filter(|n| n.name == "term") {
            let Some(name) = term.attr("name") else {
                continue;
            };
            let form = term.attr("form").unwrap_or("long");
            let (single, multiple) = match (term.child("single"), term.child("multiple")) {
                (Some(s), Some(m)) => (s.text(), m.text()),
                (Some(s), None) => (s.text(), s.text()),
                _ => (term.text(), term.text()),
            };
            self.terms.insert(
                (name.to_string(), form.to_string()),
                Term { single, multiple },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::xml;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_english_defaults() {
        let terms = Terms::english();
        assert_eq!(terms.get("and", "long", false), Some("and"));
        assert_eq!(terms.get("page", "short", true), Some("pp."));
        assert_eq!(terms.get("month-03", "short", false), Some("Mar."));
        assert_eq!(terms.get("editor", "verb-short", false), Some("edited by"));
        assert_eq!(terms.get("in", "short", false), Some("in"));
        assert_eq!(terms.get("nonsense", "long", false), None);
    }

    #[test]
    fn test_locale_overrides() {
        let locale = xml::parse(
            r#"<locale xml:lang="de-DE"><terms>
                 <term name="and">und</term>
                 <term name="page" form="short"><single>S.</single><multiple>S.</multiple></term>
               </terms></locale>"#,
        )
        .unwrap();
        let mut terms = Terms::english();
        terms.apply_locale(&locale);
        assert_eq!(terms.lang(), Some("de-DE"));
        assert_eq!(terms.get("and", "long", false), Some("und"));
        assert_eq!(terms.get("page", "short", true), Some("S."));
        assert_eq!(terms.get("et-al", "long", false), Some("et al."));
    }
}

//! CSL-JSON citation items.
//!
//! [`CslItem`] is a typed record: every variable the converters produce has
//! a named field, and variables only seen in pre-converted CSL-JSON input
//! land in the bounded `extra` map. Empty values are never stored.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Citation items keyed by lower-cased id.
pub type Bib = BTreeMap<String, CslItem>;

/// A normalized bibliography item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CslItem {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,

    #[serde(rename = "type", default)]
    pub csl_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    // Names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Vec<Name>>,
    #[serde(rename = "container-author", skip_serializing_if = "Option::is_none")]
    pub container_author: Option<Vec<Name>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<Vec<Name>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translator: Option<Vec<Name>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<Vec<Name>>,

    // Titles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "title-short", skip_serializing_if = "Option::is_none")]
    pub title_short: Option<String>,
    #[serde(rename = "volume-title", skip_serializing_if = "Option::is_none")]
    pub volume_title: Option<String>,
    #[serde(rename = "container-title", skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,
    #[serde(
        rename = "container-title-short",
        alias = "journalAbbreviation",
        skip_serializing_if = "Option::is_none"
    )]
    pub container_title_short: Option<String>,
    #[serde(rename = "collection-title", skip_serializing_if = "Option::is_none")]
    pub collection_title: Option<String>,
    #[serde(rename = "original-title", skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    // Dates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateVariable>,
    #[serde(rename = "event-date", skip_serializing_if = "Option::is_none")]
    pub event_date: Option<DateVariable>,
    #[serde(rename = "original-date", skip_serializing_if = "Option::is_none")]
    pub original_date: Option<DateVariable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<DateVariable>,

    // Standard bibliographic fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(rename = "publisher-place", skip_serializing_if = "Option::is_none")]
    pub publisher_place: Option<String>,
    #[serde(rename = "original-publisher", skip_serializing_if = "Option::is_none")]
    pub original_publisher: Option<String>,
    #[serde(
        rename = "original-publisher-place",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_publisher_place: Option<String>,
    #[serde(rename = "event-place", skip_serializing_if = "Option::is_none")]
    pub event_place: Option<String>,
    #[serde(default, deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(rename = "ISBN", skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(rename = "ISSN", skip_serializing_if = "Option::is_none")]
    pub issn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annote: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(
        rename = "number-of-pages",
        default,
        deserialize_with = "de_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub number_of_pages: Option<String>,
    #[serde(
        rename = "number-of-volumes",
        default,
        deserialize_with = "de_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub number_of_volumes: Option<String>,
    #[serde(default, deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        rename = "chapter-number",
        default,
        deserialize_with = "de_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub chapter_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    // Misc numeric-ish fields
    #[serde(default, deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(
        rename = "page-first",
        default,
        deserialize_with = "de_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_first: Option<String>,
    #[serde(default, deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(default, deserialize_with = "de_text", skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(
        rename = "collection-number",
        default,
        deserialize_with = "de_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_number: Option<String>,

    // Electronic identifiers
    #[serde(rename = "URL", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "URLtext", skip_serializing_if = "Option::is_none")]
    pub url_text: Option<String>,
    #[serde(rename = "DOI", skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "DOItext", skip_serializing_if = "Option::is_none")]
    pub doi_text: Option<String>,
    #[serde(rename = "eprint-type", skip_serializing_if = "Option::is_none")]
    pub eprint_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eprint: Option<String>,

    #[serde(rename = "_preid", skip_serializing_if = "Option::is_none")]
    pub preid: Option<String>,

    /// CSL-JSON variables without a dedicated field.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,

    /// Source line of the BibTeX entry this item came from.
    #[serde(skip)]
    pub source_line: Option<usize>,
}

macro_rules! text_variables {
    ($($name:literal => $field:ident),* $(,)?) => {
        impl CslItem {
            fn text_slot(&mut self, variable: &str) -> Option<&mut Option<String>> {
                match variable {
                    $($name => Some(&mut self.$field),)*
                    _ => None,
                }
            }

            fn text_ref(&self, variable: &str) -> Option<&Option<String>> {
                match variable {
                    $($name => Some(&self.$field),)*
                    _ => None,
                }
            }
        }
    };
}

text_variables! {
    "genre" => genre,
    "title" => title,
    "title-short" => title_short,
    "volume-title" => volume_title,
    "container-title" => container_title,
    "container-title-short" => container_title_short,
    "collection-title" => collection_title,
    "original-title" => original_title,
    "event" => event,
    "publisher" => publisher,
    "publisher-place" => publisher_place,
    "original-publisher" => original_publisher,
    "original-publisher-place" => original_publisher_place,
    "event-place" => event_place,
    "edition" => edition,
    "ISBN" => isbn,
    "ISSN" => issn,
    "note" => note,
    "annote" => annote,
    "abstract" => abstract_,
    "keyword" => keyword,
    "number-of-pages" => number_of_pages,
    "number-of-volumes" => number_of_volumes,
    "version" => version,
    "chapter-number" => chapter_number,
    "status" => status,
    "medium" => medium,
    "language" => language,
    "page" => page,
    "page-first" => page_first,
    "volume" => volume,
    "issue" => issue,
    "number" => number,
    "collection-number" => collection_number,
    "URL" => url,
    "URLtext" => url_text,
    "DOI" => doi,
    "DOItext" => doi_text,
    "eprint-type" => eprint_type,
    "eprint" => eprint,
}

impl CslItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set a text variable by its CSL name. Blank values clear the variable.
    pub fn set_text(&mut self, variable: &str, value: impl Into<String>) {
        let value = non_empty(value.into());
        match self.text_slot(variable) {
            Some(slot) => *slot = value,
            None => match value {
                Some(v) => {
                    self.extra
                        .insert(variable.to_string(), serde_json::Value::String(v));
                }
                None => {
                    self.extra.remove(variable);
                }
            },
        }
    }

    /// Look up a text variable by its CSL name.
    pub fn text(&self, variable: &str) -> Option<&str> {
        let value = match variable {
            "id" => Some(self.id.as_str()),
            "type" => Some(self.csl_type.as_str()),
            _ => match self.text_ref(variable) {
                Some(slot) => slot.as_deref(),
                None => self.extra.get(variable).and_then(|v| v.as_str()),
            },
        };
        value.filter(|v| !v.is_empty())
    }

    pub fn names(&self, variable: &str) -> Option<&[Name]> {
        let names = match variable {
            "author" => self.author.as_deref(),
            "container-author" => self.container_author.as_deref(),
            "editor" => self.editor.as_deref(),
            "translator" => self.translator.as_deref(),
            "director" => self.director.as_deref(),
            _ => None,
        };
        names.filter(|names| !names.is_empty())
    }

    pub fn set_names(&mut self, variable: &str, names: Vec<Name>) {
        let names = (!names.is_empty()).then_some(names);
        match variable {
            "author" => self.author = names,
            "container-author" => self.container_author = names,
            "editor" => self.editor = names,
            "translator" => self.translator = names,
            "director" => self.director = names,
            _ => {}
        }
    }

    pub fn date(&self, variable: &str) -> Option<&DateVariable> {
        match variable {
            "issued" => self.issued.as_ref(),
            "event-date" => self.event_date.as_ref(),
            "original-date" => self.original_date.as_ref(),
            "accessed" => self.accessed.as_ref(),
            _ => None,
        }
    }

    pub fn set_date(&mut self, variable: &str, date: Option<DateVariable>) {
        let date = date.filter(|d| !d.is_empty());
        match variable {
            "issued" => self.issued = date,
            "event-date" => self.event_date = date,
            "original-date" => self.original_date = date,
            "accessed" => self.accessed = date,
            _ => {}
        }
    }
}

/// A personal or literal name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    #[serde(rename = "dropping-particle", skip_serializing_if = "Option::is_none")]
    pub dropping_particle: Option<String>,
    #[serde(rename = "non-dropping-particle", skip_serializing_if = "Option::is_none")]
    pub non_dropping_particle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(rename = "comma-suffix", skip_serializing_if = "Option::is_none")]
    pub comma_suffix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl Name {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            literal: Some(text.into()),
            ..Default::default()
        }
    }

    /// Family name with its non-dropping particle, e.g. "van Gogh".
    pub fn short_form(&self) -> String {
        if let Some(ref lit) = self.literal {
            return lit.clone();
        }
        join_words([self.non_dropping_particle.as_deref(), self.family.as_deref()])
    }

    /// Full name in display order, e.g. "Ludwig van Beethoven Jr.".
    pub fn long_form(&self) -> String {
        if let Some(ref lit) = self.literal {
            return lit.clone();
        }
        let name = join_words([
            self.given.as_deref(),
            self.dropping_particle.as_deref(),
            self.non_dropping_particle.as_deref(),
            self.family.as_deref(),
        ]);
        match self.suffix.as_deref() {
            Some(suffix) if self.comma_suffix == Some(true) => format!("{}, {}", name, suffix),
            Some(suffix) => format!("{} {}", name, suffix),
            None => name,
        }
    }
}

pub(crate) fn join_words<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts
        .into_iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A date or date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateVariable {
    /// Start and optional end date, each `[year, month?, day?]`.
    #[serde(rename = "date-parts", default, skip_serializing_if = "Vec::is_empty")]
    pub date_parts: Vec<Vec<DatePart>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<DatePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DateVariable {
    pub fn is_empty(&self) -> bool {
        self.date_parts.is_empty() && self.literal.is_none() && self.raw.is_none()
    }

    /// The first component of the start date.
    pub fn year(&self) -> Option<&DatePart> {
        self.date_parts.first().and_then(|parts| parts.first())
    }
}

/// One component of a date: numeric when it parses as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatePart {
    Number(i64),
    Text(String),
}

impl DatePart {
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(n) => DatePart::Number(n),
            Err(_) => DatePart::Text(text.trim().to_string()),
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            DatePart::Number(n) => Some(*n),
            DatePart::Text(s) => s.parse().ok(),
        }
    }
}

impl std::fmt::Display for DatePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatePart::Number(n) => write!(f, "{}", n),
            DatePart::Text(s) => f.write_str(s),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

/// CSL-JSON allows both strings and numbers for ids.
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(de_text(deserializer)?.unwrap_or_default())
}

/// Accept a string or a number for a text variable.
fn de_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(non_empty(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(D::Error::custom("expected a string or a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_empty_values_are_not_stored() {
        let mut item = CslItem::new("k");
        item.set_text("title", "A Title");
        item.set_text("publisher", "   ");
        item.set_text("custom-field", "");
        assert_eq!(item.text("title"), Some("A Title"));
        assert_eq!(item.publisher, None);
        assert!(item.extra.is_empty());

        item.set_text("title", "");
        assert_eq!(item.title, None);
    }

    #[test]
    fn test_serializes_csl_names() {
        let mut item = CslItem::new("k");
        item.csl_type = "article-journal".to_string();
        item.set_text("DOI", "10.1/x");
        item.set_text("container-title", "J");
        item.issued = Some(DateVariable {
            date_parts: vec![vec![DatePart::Number(2020), DatePart::Number(1)]],
            ..Default::default()
        });

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "k",
                "type": "article-journal",
                "container-title": "J",
                "DOI": "10.1/x",
                "issued": { "date-parts": [[2020, 1]] }
            })
        );
    }

    #[test]
    fn test_deserializes_numbers_and_unknown_fields() {
        let item: CslItem = serde_json::from_value(json!({
            "id": 42,
            "type": "book",
            "volume": 3,
            "journalAbbreviation": "JA",
            "custom": "kept"
        }))
        .unwrap();

        assert_eq!(item.id, "42");
        assert_eq!(item.volume.as_deref(), Some("3"));
        assert_eq!(item.container_title_short.as_deref(), Some("JA"));
        assert_eq!(item.text("custom"), Some("kept"));
    }

    #[test]
    fn test_name_forms() {
        let name = Name {
            family: Some("Beethoven".into()),
            given: Some("Ludwig".into()),
            dropping_particle: Some("van".into()),
            ..Default::default()
        };
        assert_eq!(name.short_form(), "Beethoven");
        assert_eq!(name.long_form(), "Ludwig van Beethoven");

        let junior = Name {
            family: Some("King".into()),
            given: Some("Martin Luther".into()),
            suffix: Some("Jr.".into()),
            comma_suffix: Some(true),
            ..Default::default()
        };
        assert_eq!(junior.long_form(), "Martin Luther King, Jr.");
        assert_eq!(Name::literal("others").short_form(), "others");
    }
}

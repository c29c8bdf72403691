//! Date fields.
//!
//! BibLaTeX dates are ISO-like (`2020-01-15`, ranges as `2020/2021`).
//! Older databases split them over `year`, `month` and `day`, and those
//! legacy fields are used when the combined field is absent.

use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::{CslItem, DatePart, DateVariable};
use crate::options::BibOptions;

/// CSL date variables and their BibLaTeX fields. The field name minus its
/// `date` suffix is the prefix of the legacy fields (`origyear`, ...).
const DATE_FIELDS: &[(&str, &str)] = &[
    ("issued", "date"),
    ("event-date", "eventdate"),
    ("original-date", "origdate"),
    ("accessed", "urldate"),
];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

const SEASONS: &[(&str, i64)] = &[
    ("spring", 1),
    ("summer", 2),
    ("autumn", 3),
    ("fall", 3),
    ("winter", 4),
];

pub fn convert_dates(
    entry: &RawEntry,
    _tex: &dyn TexConverter,
    _options: &BibOptions,
    item: &mut CslItem,
) {
    for &(variable, field) in DATE_FIELDS {
        let prefix = field.strip_suffix("date").unwrap_or("");

        let mut date_parts = match entry.field(field) {
            Some(raw) => parse_date_range(raw),
            None => legacy_date(entry, prefix),
        };
        date_parts.retain(|parts| !parts.is_empty());
        if date_parts.is_empty() {
            continue;
        }

        let season = entry.field(&format!("{}season", prefix)).map(parse_season);
        let circa = entry
            .field(&format!("{}circa", prefix))
            .filter(|v| !matches!(v.trim(), "false" | "0"))
            .map(|_| true);

        item.set_date(
            variable,
            Some(DateVariable {
                date_parts,
                season,
                circa,
                ..Default::default()
            }),
        );
    }
}

/// Parse `start[/end]` where each side is `year[-month[-day]]`.
pub fn parse_date_range(raw: &str) -> Vec<Vec<DatePart>> {
    raw.split('/')
        .take(2)
        .map(|side| {
            side.trim()
                .split('-')
                .enumerate()
                .filter_map(|(i, component)| date_component(component, i == 1))
                .collect::<Vec<_>>()
        })
        .filter(|parts| !parts.is_empty())
        .collect()
}

fn legacy_date(entry: &RawEntry, prefix: &str) -> Vec<Vec<DatePart>> {
    let side = |year: &str, month: &str, day: &str| -> Vec<DatePart> {
        let Some(year) = entry
            .field(&format!("{}{}", prefix, year))
            .and_then(|y| date_component(y, false))
        else {
            return Vec::new();
        };
        let mut parts = vec![year];
        if let Some(month) = entry
            .field(&format!("{}{}", prefix, month))
            .and_then(|m| date_component(m, true))
        {
            parts.push(month);
            if let Some(day) = entry
                .field(&format!("{}{}", prefix, day))
                .and_then(|d| date_component(d, false))
            {
                parts.push(day);
            }
        }
        parts
    };

    vec![side("year", "month", "day"), side("endyear", "endmonth", "endday")]
}

/// Normalize one date component: strip leading zeros and, for months,
/// translate names to numbers.
fn date_component(text: &str, is_month: bool) -> Option<DatePart> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if is_month {
        let lower = text.trim_end_matches('.').to_lowercase();
        if let Some(i) = MONTHS.iter().position(|m| lower.starts_with(m)) {
            return Some(DatePart::Number(i as i64 + 1));
        }
    }

    let stripped = text.trim_start_matches('0');
    let stripped = if stripped.is_empty() { "0" } else { stripped };
    Some(DatePart::parse(stripped))
}

fn parse_season(text: &str) -> DatePart {
    let lower = text.trim().to_lowercase();
    SEASONS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, n)| DatePart::Number(*n))
        .unwrap_or_else(|| DatePart::parse(text))
}

//! The built-in citation processor.
//!
//! [`BasicProcessor`] evaluates a compiled [`Style`] against CSL items. It
//! covers the rendering core of CSL: variables, macros, terms, names with
//! et-al and sort order, dates, numbers, labels, groups with empty-variable
//! suppression, conditionals and bibliography sorting. Disambiguation and
//! citation collapsing are not performed.

use super::output::{LinkKind, RichText};
use super::style::{
    Condition, DatePartSpec, Element, Formatting, Layout, Match, NameOptions, SortKey, Style,
    StyleSheet, TextSource,
};
use super::terms::Terms;
use super::xml;
use super::{CitationProcessor, ItemSource, ProcessorFactory};
use crate::csl::{join_words, CslItem, DatePart, DateVariable, Name};
use crate::error::{RenderError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

lazy_static! {
    static ref NUMERIC: Regex = Regex::new(r"^\s*\d+\s*(?:[-–,&]\s*\d+\s*)*$").unwrap();
}

const MAX_MACRO_DEPTH: usize = 64;

/// Creates [`BasicProcessor`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFactory;

impl ProcessorFactory for BasicFactory {
    fn create(
        &self,
        style: &StyleSheet,
        locale: Option<&str>,
    ) -> Result<Box<dyn CitationProcessor>> {
        Ok(Box::new(BasicProcessor::new(style, locale)?))
    }
}

#[derive(Debug, Clone)]
pub struct BasicProcessor {
    style: Style,
    terms: Terms,
    /// Lower-cased ids in citation order, for `citation-number`.
    order: Vec<String>,
}

/// Evaluation state for one item.
#[derive(Clone, Copy)]
struct Ctx<'a> {
    item: &'a CslItem,
    number: Option<usize>,
    names: &'a NameOptions,
    depth: usize,
}

/// Variables a group tried to render, and how many had a value.
#[derive(Debug, Default)]
struct Vars {
    called: usize,
    found: usize,
}

impl Vars {
    fn record(&mut self, found: bool) {
        self.called += 1;
        if found {
            self.found += 1;
        }
    }
}

impl BasicProcessor {
    /// Compile `sheet` and load its terms: English defaults, then the
    /// locale file, then the style's own locale blocks.
    pub fn new(sheet: &StyleSheet, locale: Option<&str>) -> Result<Self> {
        let style = sheet.compile()?;
        let mut terms = Terms::english();

        if let Some(locale) = locale.filter(|l| !l.trim().is_empty()) {
            let node = xml::parse(locale).map_err(|e| RenderError::Locale(e.to_string()))?;
            if node.name != "locale" {
                return Err(RenderError::Locale(format!(
                    "expected <locale> root element, found <{}>",
                    node.name
                ))
                .into());
            }
            terms.apply_locale(&node);
        }
        style.apply_locales(&mut terms);

        debug!(
            macros = style.macros.len(),
            lang = terms.lang().unwrap_or(""),
            "compiled citation style"
        );

        Ok(Self {
            style,
            terms,
            order: Vec::new(),
        })
    }

    fn number(&self, id: &str) -> Option<usize> {
        let id = id.to_lowercase();
        self.order.iter().position(|k| *k == id).map(|i| i + 1)
    }

    fn render_layout(
        &self,
        layout: &Layout,
        item: &CslItem,
        number: Option<usize>,
    ) -> Result<RichText> {
        let ctx = Ctx {
            item,
            number,
            names: &layout.name_options,
            depth: 0,
        };
        let mut vars = Vars::default();
        let out = self.render_list(ctx, &layout.elements, "", &mut vars)?;
        Ok(out.formatted(&layout.formatting))
    }

    fn render_list(
        &self,
        ctx: Ctx<'_>,
        elements: &[Element],
        delimiter: &str,
        vars: &mut Vars,
    ) -> Result<RichText> {
        let mut parts = Vec::with_capacity(elements.len());
        for element in elements {
            parts.push(self.render_element(ctx, element, vars)?);
        }
        Ok(RichText::join(parts, delimiter))
    }

    fn render_element(&self, ctx: Ctx<'_>, element: &Element, vars: &mut Vars) -> Result<RichText> {
        let out = match element {
            Element::Text { source, formatting } => {
                let text = match source {
                    TextSource::Variable { name, short } => {
                        let value = self.variable(ctx, name, *short);
                        vars.record(!value.is_null());
                        value
                    }
                    TextSource::Macro(name) => self.render_macro(ctx, name, vars)?,
                    TextSource::Term { name, form, plural } => {
                        RichText::text(self.terms.get(name, form, *plural).unwrap_or_default())
                    }
                    TextSource::Value(value) => RichText::text(value.as_str()),
                };
                text.formatted(formatting)
            }

            Element::Names {
                variables,
                options,
                label,
                substitute,
                delimiter,
                formatting,
            } => {
                let options = match options {
                    Some(own) => own.inherit(ctx.names),
                    None => ctx.names.clone(),
                };

                let mut lists = Vec::new();
                for variable in variables {
                    let names = ctx.item.names(variable);
                    vars.record(names.is_some());
                    let Some(names) = names else {
                        continue;
                    };
                    let mut rendered = self.name_list(names, &options);
                    if let Some(label) = label {
                        let term = self
                            .terms
                            .get(variable, &label.form, names.len() > 1)
                            .unwrap_or_default();
                        rendered = RichText::seq(vec![
                            rendered,
                            RichText::text(term).formatted(&label.formatting),
                        ]);
                    }
                    lists.push(rendered);
                }

                let out = if lists.is_empty() {
                    // Substituted names inherit the options of this element.
                    let sub = Ctx {
                        names: &options,
                        ..ctx
                    };
                    let mut found = RichText::Null;
                    for element in substitute {
                        let rendered = self.render_element(sub, element, vars)?;
                        if !rendered.is_null() {
                            found = rendered;
                            break;
                        }
                    }
                    found
                } else {
                    RichText::join(lists, delimiter.as_deref().unwrap_or(", "))
                };
                out.formatted(formatting)
            }

            Element::Date {
                variable,
                form,
                parts,
                date_parts,
                delimiter,
                formatting,
            } => {
                let date = ctx.item.date(variable);
                vars.record(date.is_some());
                let rendered = match date {
                    Some(date) => self.date(
                        date,
                        form.as_deref(),
                        parts,
                        date_parts.as_deref(),
                        delimiter.as_deref().unwrap_or(""),
                    ),
                    None => RichText::Null,
                };
                rendered.formatted(formatting)
            }

            Element::Number {
                variable,
                formatting,
            } => {
                let value = ctx.item.text(variable);
                vars.record(value.is_some());
                RichText::text(value.map(en_dash_ranges).unwrap_or_default()).formatted(formatting)
            }

            Element::Label(label) => {
                let plural = match label.variable.as_deref() {
                    Some(variable) => match (ctx.item.names(variable), ctx.item.text(variable)) {
                        (Some(names), _) => Some(names.len() > 1),
                        (None, Some(value)) => Some(value.contains(['-', '–', ',', '&'])),
                        (None, None) => None,
                    },
                    None => None,
                };
                match (label.variable.as_deref(), plural) {
                    (Some(variable), Some(plural)) => {
                        RichText::text(self.terms.get(variable, &label.form, plural).unwrap_or_default())
                            .formatted(&label.formatting)
                    }
                    _ => RichText::Null,
                }
            }

            Element::Group {
                elements,
                delimiter,
                formatting,
            } => {
                let mut inner = Vars::default();
                let out =
                    self.render_list(ctx, elements, delimiter.as_deref().unwrap_or(""), &mut inner)?;
                vars.called += inner.called;
                vars.found += inner.found;
                // A group whose variables are all empty is suppressed.
                if inner.called > 0 && inner.found == 0 {
                    RichText::Null
                } else {
                    out.formatted(formatting)
                }
            }

            Element::Choose {
                branches,
                otherwise,
            } => {
                let elements = branches
                    .iter()
                    .find(|(condition, _)| self.test(ctx, condition))
                    .map(|(_, elements)| elements)
                    .unwrap_or(otherwise);
                self.render_list(ctx, elements, "", vars)?
            }
        };
        Ok(out)
    }

    fn render_macro(&self, ctx: Ctx<'_>, name: &str, vars: &mut Vars) -> Result<RichText> {
        let elements = self
            .style
            .macros
            .get(name)
            .ok_or_else(|| RenderError::Style(format!("unknown macro '{}'", name)))?;
        if ctx.depth >= MAX_MACRO_DEPTH {
            return Err(RenderError::Style(format!("macro '{}' nests too deeply", name)).into());
        }
        let inner = Ctx {
            depth: ctx.depth + 1,
            ..ctx
        };
        self.render_list(inner, elements, "", vars)
    }

    fn variable(&self, ctx: Ctx<'_>, name: &str, short: bool) -> RichText {
        let item = ctx.item;
        match name {
            "citation-number" => ctx
                .number
                .map_or(RichText::Null, |n| RichText::text(n.to_string())),
            "URL" => match item.url.as_deref() {
                Some(url) => {
                    let shown = item.url_text.as_deref().unwrap_or(url);
                    RichText::link(LinkKind::Url, url, RichText::text(shown))
                }
                None => RichText::Null,
            },
            "DOI" => match item.doi.as_deref() {
                Some(doi) => RichText::link(LinkKind::Doi, doi, RichText::text(doi)),
                None => RichText::Null,
            },
            "page" => RichText::text(item.text("page").map(en_dash_ranges).unwrap_or_default()),
            _ => {
                let value = if short {
                    item.text(&format!("{}-short", name)).or_else(|| item.text(name))
                } else {
                    item.text(name)
                };
                RichText::text(value.unwrap_or_default())
            }
        }
    }

    fn name_list(&self, names: &[Name], options: &NameOptions) -> RichText {
        let delimiter = options.delimiter.as_deref().unwrap_or(", ");

        // A trailing "others" stands for omitted names.
        let (names, others) = match names.split_last() {
            Some((last, rest)) if last.literal.as_deref() == Some("others") => (rest, true),
            _ => (names, false),
        };

        let total = names.len();
        let et_al = others
            || matches!(options.et_al_min, Some(min) if min > 0 && total >= min);
        let shown = if et_al && !others {
            options.et_al_use_first.unwrap_or(1).clamp(1, total.max(1))
        } else {
            total
        };

        let rendered: Vec<String> = names
            .iter()
            .take(shown)
            .enumerate()
            .map(|(i, name)| format_name(name, options, i))
            .collect();

        let text = if et_al {
            let term = self.terms.get("et-al", "long", false).unwrap_or("et al.");
            let mut text = rendered.join(delimiter);
            if rendered.len() > 1 {
                text.push_str(delimiter);
            } else if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(term);
            text
        } else {
            match options.and.as_deref() {
                Some(and) => {
                    let word = if and == "symbol" {
                        self.terms.get("and", "symbol", false).unwrap_or("&")
                    } else {
                        self.terms.get("and", "long", false).unwrap_or("and")
                    };
                    join_with_and(&rendered, delimiter, word)
                }
                None => rendered.join(delimiter),
            }
        };
        RichText::text(text)
    }

    fn date(
        &self,
        date: &DateVariable,
        form: Option<&str>,
        parts: &[DatePartSpec],
        limit: Option<&str>,
        delimiter: &str,
    ) -> RichText {
        if let Some(literal) = date.literal.as_deref() {
            return RichText::text(literal);
        }
        if date.date_parts.is_empty() {
            return RichText::text(date.raw.clone().unwrap_or_default());
        }

        let allowed = match limit {
            Some("year") => 1,
            Some("year-month") => 2,
            _ => 3,
        };
        let specs: Vec<DatePartSpec> = if parts.is_empty() {
            default_date_parts(form)
        } else {
            parts.to_vec()
        };
        let specs: Vec<DatePartSpec> = specs
            .into_iter()
            .filter(|spec| part_rank(&spec.name) < allowed)
            .collect();

        let rendered: Vec<RichText> = date
            .date_parts
            .iter()
            .take(2)
            .map(|parts| self.date_parts(parts, date.season.as_ref(), &specs, delimiter))
            .collect();
        RichText::join(rendered, "–")
    }

    fn date_parts(
        &self,
        parts: &[DatePart],
        season: Option<&DatePart>,
        specs: &[DatePartSpec],
        delimiter: &str,
    ) -> RichText {
        let pieces = specs
            .iter()
            .map(|spec| {
                let form = spec.form.as_deref();
                let value = match spec.name.as_str() {
                    "year" => parts.first().map(year_text),
                    "month" => match parts.get(1) {
                        Some(month) => Some(self.month(month, form)),
                        None => season.map(|s| self.season(s)),
                    },
                    "day" => parts.get(2).map(|day| day_text(day, form)),
                    _ => None,
                };
                RichText::text(value.unwrap_or_default()).formatted(&spec.formatting)
            })
            .collect();
        RichText::join(pieces, delimiter)
    }

    fn month(&self, month: &DatePart, form: Option<&str>) -> String {
        let Some(n) = month.as_number().filter(|n| (1..=12).contains(n)) else {
            return month.to_string();
        };
        match form {
            Some("numeric") => n.to_string(),
            Some("numeric-leading-zeros") => format!("{:02}", n),
            Some("short") => self.month_term(n, "short"),
            _ => self.month_term(n, "long"),
        }
    }

    fn month_term(&self, n: i64, form: &str) -> String {
        self.terms
            .get(&format!("month-{:02}", n), form, false)
            .map_or_else(|| n.to_string(), str::to_string)
    }

    fn season(&self, season: &DatePart) -> String {
        match season.as_number().filter(|n| (1..=4).contains(n)) {
            Some(n) => self
                .terms
                .get(&format!("season-{:02}", n), "long", false)
                .map_or_else(|| season.to_string(), str::to_string),
            None => season.to_string(),
        }
    }

    fn test(&self, ctx: Ctx<'_>, condition: &Condition) -> bool {
        let mut results = condition
            .tests
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
            .map(|(name, value)| self.check(ctx, name, value));
        match condition.match_mode {
            Match::All => results.all(|r| r),
            Match::Any => results.any(|r| r),
            Match::None => !results.any(|r| r),
        }
    }

    fn check(&self, ctx: Ctx<'_>, test: &str, value: &str) -> bool {
        let item = ctx.item;
        match test {
            "variable" => match value {
                "citation-number" => ctx.number.is_some(),
                _ => {
                    item.text(value).is_some()
                        || item.names(value).is_some()
                        || item.date(value).is_some()
                }
            },
            "type" => item.csl_type == value,
            "is-numeric" => item.text(value).is_some_and(|v| NUMERIC.is_match(v)),
            "is-uncertain-date" => item
                .date(value)
                .is_some_and(|date| date.circa == Some(true)),
            "position" => value == "first",
            _ => false,
        }
    }

    fn sort_keys(&self, layout: &Layout, item: &CslItem, number: Option<usize>) -> Result<Vec<String>> {
        let mut keys = Vec::with_capacity(layout.sort.len());
        for key in &layout.sort {
            let value = if let Some(name) = key.macro_name.as_deref() {
                let ctx = Ctx {
                    item,
                    number,
                    names: &layout.name_options,
                    depth: 0,
                };
                self.render_macro(ctx, name, &mut Vars::default())?
                    .plain_text()
                    .to_lowercase()
            } else if let Some(variable) = key.variable.as_deref() {
                sort_value(item, variable, number)
            } else {
                String::new()
            };
            keys.push(value);
        }
        Ok(keys)
    }
}

impl CitationProcessor for BasicProcessor {
    fn update_items(&mut self, _sys: &dyn ItemSource, ids: &[String]) -> Result<()> {
        self.order = ids.iter().map(|id| id.to_lowercase()).collect();
        Ok(())
    }

    fn cite(&self, sys: &dyn ItemSource, id: &str) -> Result<RichText> {
        let layout = self
            .style
            .citation
            .as_ref()
            .ok_or_else(|| RenderError::Style("style has no <citation> layout".to_string()))?;
        let item = sys.retrieve_item(id)?;
        self.render_layout(layout, item, self.number(id))
    }

    fn bibliography(&self, sys: &dyn ItemSource, ids: &[String]) -> Result<Vec<(String, RichText)>> {
        let Some(layout) = self.style.bibliography.as_ref() else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            entries.push((id.clone(), sys.retrieve_item(id)?));
        }

        if !layout.sort.is_empty() {
            let mut keyed = Vec::with_capacity(entries.len());
            for (id, item) in entries {
                let keys = self.sort_keys(layout, item, self.number(&id))?;
                keyed.push((keys, id, item));
            }
            keyed.sort_by(|a, b| compare_keys(&a.0, &b.0, &layout.sort));
            entries = keyed.into_iter().map(|(_, id, item)| (id, item)).collect();
        }

        let mut out = Vec::with_capacity(entries.len());
        for (i, (id, item)) in entries.into_iter().enumerate() {
            let number = self.number(&id).or(Some(i + 1));
            let rendered = self.render_layout(layout, item, number)?;
            out.push((id, rendered));
        }
        Ok(out)
    }
}

fn format_name(name: &Name, options: &NameOptions, index: usize) -> String {
    if let Some(literal) = name.literal.as_deref() {
        return literal.to_string();
    }
    if options.form.as_deref() == Some("short") {
        let short = name.short_form();
        if !short.is_empty() {
            return short;
        }
    }

    let given = name.given.as_deref().map(|given| match options.initialize_with.as_deref() {
        Some(with) => initialize(given, with),
        None => given.to_string(),
    });
    let inverted = match options.name_as_sort_order.as_deref() {
        Some("all") => true,
        Some("first") => index == 0,
        _ => false,
    };

    if inverted {
        let separator = options.sort_separator.as_deref().unwrap_or(", ");
        let mut out = join_words([name.non_dropping_particle.as_deref(), name.family.as_deref()]);
        let rest = join_words([given.as_deref(), name.dropping_particle.as_deref()]);
        for part in [Some(rest.as_str()), name.suffix.as_deref()].into_iter().flatten() {
            if part.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str(separator);
            }
            out.push_str(part);
        }
        out
    } else {
        let out = join_words([
            given.as_deref(),
            name.dropping_particle.as_deref(),
            name.non_dropping_particle.as_deref(),
            name.family.as_deref(),
        ]);
        match name.suffix.as_deref() {
            Some(suffix) if name.comma_suffix == Some(true) => format!("{}, {}", out, suffix),
            Some(suffix) => format!("{} {}", out, suffix),
            None => out,
        }
    }
}

/// "Jean-Paul Maria" with ". " gives "J.-P. M.".
fn initialize(given: &str, with: &str) -> String {
    let mark = with.trim_end();
    let space = &with[mark.len()..];
    given
        .split_whitespace()
        .map(|word| {
            word.split('-')
                .filter_map(|part| part.chars().find(|c| c.is_alphabetic()))
                .map(|c| format!("{}{}", c, mark))
                .collect::<Vec<_>>()
                .join("-")
        })
        .filter(|initials| !initials.is_empty())
        .collect::<Vec<_>>()
        .join(space)
}

fn join_with_and(names: &[String], delimiter: &str, and: &str) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} {} {}", first, and, second),
        [rest @ .., last] => format!("{}{}{} {}", rest.join(delimiter), delimiter, and, last),
    }
}

fn default_date_parts(form: Option<&str>) -> Vec<DatePartSpec> {
    let part = |name: &str, form: Option<&str>, suffix: Option<&str>| DatePartSpec {
        name: name.to_string(),
        form: form.map(str::to_string),
        formatting: Formatting {
            suffix: suffix.map(str::to_string),
            ..Default::default()
        },
    };
    match form {
        Some("text") => vec![
            part("month", Some("long"), Some(" ")),
            part("day", None, Some(", ")),
            part("year", None, None),
        ],
        Some("numeric") => vec![
            part("month", Some("numeric"), Some("/")),
            part("day", None, Some("/")),
            part("year", None, None),
        ],
        _ => vec![part("year", None, None)],
    }
}

fn part_rank(name: &str) -> usize {
    match name {
        "year" => 0,
        "month" => 1,
        _ => 2,
    }
}

fn year_text(year: &DatePart) -> String {
    match year {
        DatePart::Number(n) if *n < 0 => format!("{}BC", -n),
        other => other.to_string(),
    }
}

fn day_text(day: &DatePart, form: Option<&str>) -> String {
    let Some(n) = day.as_number() else {
        return day.to_string();
    };
    match form {
        Some("numeric-leading-zeros") => format!("{:02}", n),
        Some("ordinal") => {
            let suffix = match (n % 10, n % 100) {
                (_, 11..=13) => "th",
                (1, _) => "st",
                (2, _) => "nd",
                (3, _) => "rd",
                _ => "th",
            };
            format!("{}{}", n, suffix)
        }
        _ => n.to_string(),
    }
}

fn en_dash_ranges(value: &str) -> String {
    value.replace('-', "–")
}

fn sort_value(item: &CslItem, variable: &str, number: Option<usize>) -> String {
    if variable == "citation-number" {
        return number.map(|n| format!("{:08}", n)).unwrap_or_default();
    }
    if let Some(names) = item.names(variable) {
        return names
            .iter()
            .map(|name| match name.literal.as_deref() {
                Some(literal) => literal.to_string(),
                None => join_words([
                    name.non_dropping_particle.as_deref(),
                    name.family.as_deref(),
                    name.given.as_deref(),
                    name.dropping_particle.as_deref(),
                ]),
            })
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
    }
    if let Some(date) = item.date(variable) {
        let parts = date.date_parts.first();
        let number = |i: usize| {
            parts
                .and_then(|p| p.get(i))
                .and_then(DatePart::as_number)
                .unwrap_or(0)
                .max(0)
        };
        if parts.is_none() {
            return String::new();
        }
        return format!("{:05}{:02}{:02}", number(0), number(1), number(2));
    }
    item.text(variable).unwrap_or_default().to_lowercase()
}

/// Empty keys sort last in either direction.
fn compare_keys(a: &[String], b: &[String], sort: &[SortKey]) -> Ordering {
    for ((x, y), key) in a.iter().zip(b).zip(sort) {
        let ord = match (x.is_empty(), y.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) if key.descending => y.cmp(x),
            (false, false) => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

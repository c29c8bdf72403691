//! CSL style sheets.
//!
//! [`StyleSheet`] holds the raw XML and offers the text-level adjustments
//! the bibliography driver needs. [`Style`] is the compiled form the
//! built-in processor evaluates: a tree of [`Element`]s covering the
//! rendering subset of CSL (text, names, dates, numbers, labels, groups
//! and conditionals).

use super::terms::Terms;
use super::xml::{self, XmlNode};
use crate::error::RenderError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, RenderError>;

lazy_static! {
    static ref COLLAPSE_ATTR: Regex = Regex::new(r#"\s+collapse\s*=\s*"[^"]*""#).unwrap();
    static ref XML_LANG: Regex = Regex::new(r#"<style\b[^>]*?\bxml:lang\s*=\s*"([^"]*)""#).unwrap();
}

/// Style used for the label pass: renders `authors|year|authors-long`.
pub const NORMALIZE_STYLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0">
  <macro name="authors">
    <names variable="author">
      <name form="short" and="text" delimiter=", " et-al-min="3" et-al-use-first="1"/>
      <substitute>
        <names variable="editor"/>
        <names variable="translator"/>
        <text variable="title" form="short"/>
      </substitute>
    </names>
  </macro>
  <macro name="authors-long">
    <names variable="author">
      <name and="text" delimiter=", "/>
      <substitute>
        <names variable="editor"/>
        <names variable="translator"/>
        <text variable="title"/>
      </substitute>
    </names>
  </macro>
  <macro name="year">
    <choose>
      <if variable="issued">
        <date variable="issued">
          <date-part name="year"/>
        </date>
      </if>
      <else>
        <text term="no date" form="short"/>
      </else>
    </choose>
  </macro>
  <citation>
    <layout>
      <text macro="authors"/>
      <text value="|"/>
      <text macro="year"/>
      <text value="|"/>
      <text macro="authors-long"/>
    </layout>
  </citation>
</style>
"#;

/// A CSL style as XML text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSheet {
    xml: String,
}

impl StyleSheet {
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    pub fn normalization() -> Self {
        Self::new(NORMALIZE_STYLE)
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// The same style with every `collapse="..."` attribute removed, so
    /// each citation renders its own label.
    pub fn without_collapse(&self) -> Self {
        Self::new(COLLAPSE_ATTR.replace_all(&self.xml, "").into_owned())
    }

    /// The `xml:lang` of the root `<style>` element.
    pub fn lang(&self) -> Option<String> {
        XML_LANG
            .captures(&self.xml)
            .map(|caps| caps[1].to_string())
            .filter(|lang| !lang.is_empty())
    }

    pub fn compile(&self) -> Result<Style> {
        Style::from_xml(&xml::parse(&self.xml)?)
    }
}

/// Visual formatting shared by most rendering elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Formatting {
    pub font_style: Option<String>,
    pub font_variant: Option<String>,
    pub font_weight: Option<String>,
    pub text_decoration: Option<String>,
    pub vertical_align: Option<String>,
    pub display: Option<String>,
    pub text_case: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub quotes: bool,
    pub strip_periods: bool,
}

impl Formatting {
    fn from_node(node: &XmlNode) -> Self {
        let attr = |name: &str| node.attr(name).map(str::to_string);
        Self {
            font_style: attr("font-style"),
            font_variant: attr("font-variant"),
            font_weight: attr("font-weight"),
            text_decoration: attr("text-decoration"),
            vertical_align: attr("vertical-align"),
            display: attr("display"),
            text_case: attr("text-case"),
            prefix: attr("prefix"),
            suffix: attr("suffix"),
            quotes: node.attr("quotes") == Some("true"),
            strip_periods: node.attr("strip-periods") == Some("true"),
        }
    }

    /// Font attributes in application order, innermost first.
    pub fn font_features(&self) -> Vec<(&'static str, &str)> {
        [
            ("vertical-align", &self.vertical_align),
            ("text-decoration", &self.text_decoration),
            ("font-weight", &self.font_weight),
            ("font-variant", &self.font_variant),
            ("font-style", &self.font_style),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

/// Name rendering options. Unset fields inherit from the enclosing
/// citation, bibliography or style element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameOptions {
    pub form: Option<String>,
    pub and: Option<String>,
    pub delimiter: Option<String>,
    pub et_al_min: Option<usize>,
    pub et_al_use_first: Option<usize>,
    pub initialize_with: Option<String>,
    pub name_as_sort_order: Option<String>,
    pub sort_separator: Option<String>,
}

impl NameOptions {
    fn from_node(node: &XmlNode) -> Self {
        let attr = |name: &str| node.attr(name).map(str::to_string);
        let number = |name: &str| node.attr(name).and_then(|v| v.trim().parse().ok());
        Self {
            form: attr("form").or_else(|| attr("name-form")),
            and: attr("and"),
            delimiter: attr("delimiter").or_else(|| attr("name-delimiter")),
            et_al_min: number("et-al-min"),
            et_al_use_first: number("et-al-use-first"),
            initialize_with: attr("initialize-with"),
            name_as_sort_order: attr("name-as-sort-order"),
            sort_separator: attr("sort-separator"),
        }
    }

    /// Fill unset options from `parent`.
    pub fn inherit(&self, parent: &NameOptions) -> NameOptions {
        NameOptions {
            form: self.form.clone().or_else(|| parent.form.clone()),
            and: self.and.clone().or_else(|| parent.and.clone()),
            delimiter: self.delimiter.clone().or_else(|| parent.delimiter.clone()),
            et_al_min: self.et_al_min.or(parent.et_al_min),
            et_al_use_first: self.et_al_use_first.or(parent.et_al_use_first),
            initialize_with: self
                .initialize_with
                .clone()
                .or_else(|| parent.initialize_with.clone()),
            name_as_sort_order: self
                .name_as_sort_order
                .clone()
                .or_else(|| parent.name_as_sort_order.clone()),
            sort_separator: self
                .sort_separator
                .clone()
                .or_else(|| parent.sort_separator.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Variable { name: String, short: bool },
    Macro(String),
    Term { name: String, form: String, plural: bool },
    Value(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePartSpec {
    pub name: String,
    pub form: Option<String>,
    pub formatting: Formatting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    All,
    Any,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub tests: Vec<(String, Vec<String>)>,
    pub match_mode: Match,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub variable: Option<String>,
    pub form: String,
    pub formatting: Formatting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Text {
        source: TextSource,
        formatting: Formatting,
    },
    Names {
        variables: Vec<String>,
        options: Option<NameOptions>,
        label: Option<LabelSpec>,
        substitute: Vec<Element>,
        delimiter: Option<String>,
        formatting: Formatting,
    },
    Date {
        variable: String,
        form: Option<String>,
        parts: Vec<DatePartSpec>,
        date_parts: Option<String>,
        delimiter: Option<String>,
        formatting: Formatting,
    },
    Number {
        variable: String,
        formatting: Formatting,
    },
    Label(LabelSpec),
    Group {
        elements: Vec<Element>,
        delimiter: Option<String>,
        formatting: Formatting,
    },
    Choose {
        branches: Vec<(Condition, Vec<Element>)>,
        otherwise: Vec<Element>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub variable: Option<String>,
    pub macro_name: Option<String>,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub elements: Vec<Element>,
    pub delimiter: Option<String>,
    pub formatting: Formatting,
    pub name_options: NameOptions,
    pub sort: Vec<SortKey>,
}

/// A compiled style.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub lang: Option<String>,
    pub macros: HashMap<String, Vec<Element>>,
    pub citation: Option<Layout>,
    pub bibliography: Option<Layout>,
    /// Inline `<locale>` blocks, applied over the locale file.
    pub(crate) locales: Vec<XmlNode>,
}

impl Style {
    fn from_xml(root: &XmlNode) -> Result<Self> {
        if root.name != "style" {
            return Err(RenderError::Style(format!(
                "expected <style> root element, found <{}>",
                root.name
            )));
        }

        let style_names = NameOptions::from_node(root);
        let mut macros = HashMap::new();
        let mut citation = None;
        let mut bibliography = None;
        let mut locales = Vec::new();

        for node in root.elements() {
            match node.name.as_str() {
                "macro" => {
                    let name = node
                        .attr("name")
                        .ok_or_else(|| RenderError::Style("macro without a name".to_string()))?;
                    macros.insert(name.to_string(), compile_children(node)?);
                }
                "citation" => citation = Some(compile_layout(node, &style_names)?),
                "bibliography" => bibliography = Some(compile_layout(node, &style_names)?),
                "locale" => locales.push(node.clone()),
                _ => {}
            }
        }

        Ok(Self {
            lang: root.attr("xml:lang").map(str::to_string),
            macros,
            citation,
            bibliography,
            locales,
        })
    }

    /// Apply the style's inline locale blocks to `terms`.
    pub fn apply_locales(&self, terms: &mut Terms) {
        for locale in &self.locales {
            terms.apply_locale(locale);
        }
    }
}

fn compile_layout(node: &XmlNode, style_names: &NameOptions) -> Result<Layout> {
    let layout = node.child("layout").ok_or_else(|| {
        RenderError::Style(format!("<{}> without a <layout>", node.name))
    })?;

    let sort = node
        .child("sort")
        .map(|sort| {
            sort.elements()
                .filter(|k| k.name == "key")
                .map(|k| SortKey {
                    variable: k.attr("variable").map(str::to_string),
                    macro_name: k.attr("macro").map(str::to_string),
                    descending: k.attr("sort") == Some("descending"),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Layout {
        elements: compile_children(layout)?,
        delimiter: layout.attr("delimiter").map(str::to_string),
        formatting: Formatting::from_node(layout),
        name_options: NameOptions::from_node(node).inherit(style_names),
        sort,
    })
}

fn compile_children(node: &XmlNode) -> Result<Vec<Element>> {
    let mut elements = Vec::new();
    for child in node.elements() {
        if let Some(element) = compile_element(child)? {
            elements.push(element);
        }
    }
    Ok(elements)
}

fn compile_element(node: &XmlNode) -> Result<Option<Element>> {
    let formatting = Formatting::from_node(node);
    let element = match node.name.as_str() {
        "text" => {
            let source = if let Some(name) = node.attr("variable") {
                TextSource::Variable {
                    name: name.to_string(),
                    short: node.attr("form") == Some("short"),
                }
            } else if let Some(name) = node.attr("macro") {
                TextSource::Macro(name.to_string())
            } else if let Some(name) = node.attr("term") {
                TextSource::Term {
                    name: name.to_string(),
                    form: node.attr("form").unwrap_or("long").to_string(),
                    plural: node.attr("plural") == Some("true"),
                }
            } else if let Some(value) = node.attr("value") {
                TextSource::Value(value.to_string())
            } else {
                return Err(RenderError::Style(
                    "<text> needs a variable, macro, term or value".to_string(),
                ));
            };
            Element::Text { source, formatting }
        }
        "names" => {
            let variables = node
                .attr("variable")
                .unwrap_or("")
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let substitute = match node.child("substitute") {
                Some(sub) => compile_children(sub)?,
                None => Vec::new(),
            };
            Element::Names {
                variables,
                options: node.child("name").map(NameOptions::from_node),
                label: node.child("label").map(label_spec),
                substitute,
                // Separates the lists of different variables.
                delimiter: node.attr("delimiter").map(str::to_string),
                formatting,
            }
        }
        "date" => Element::Date {
            variable: node.attr("variable").unwrap_or("issued").to_string(),
            form: node.attr("form").map(str::to_string),
            parts: node
                .elements()
                .filter(|n| n.name == "date-part")
                .map(|n| DatePartSpec {
                    name: n.attr("name").unwrap_or("year").to_string(),
                    form: n.attr("form").map(str::to_string),
                    formatting: Formatting::from_node(n),
                })
                .collect(),
            date_parts: node.attr("date-parts").map(str::to_string),
            delimiter: node.attr("delimiter").map(str::to_string),
            formatting,
        },
        "number" => Element::Number {
            variable: node.attr("variable").unwrap_or("").to_string(),
            formatting,
        },
        "label" => Element::Label(label_spec(node)),
        "group" => Element::Group {
            elements: compile_children(node)?,
            delimiter: node.attr("delimiter").map(str::to_string),
            formatting,
        },
        "choose" => {
            let mut branches = Vec::new();
            let mut otherwise = Vec::new();
            for branch in node.elements() {
                match branch.name.as_str() {
                    "if" | "else-if" => {
                        branches.push((condition(branch), compile_children(branch)?));
                    }
                    "else" => otherwise = compile_children(branch)?,
                    _ => {}
                }
            }
            Element::Choose {
                branches,
                otherwise,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(element))
}

fn label_spec(node: &XmlNode) -> LabelSpec {
    LabelSpec {
        variable: node.attr("variable").map(str::to_string),
        form: node.attr("form").unwrap_or("long").to_string(),
        formatting: Formatting::from_node(node),
    }
}

fn condition(node: &XmlNode) -> Condition {
    let tests = node
        .attrs
        .iter()
        .filter(|(name, _)| name != "match")
        .map(|(name, values)| {
            (
                name.clone(),
                values.split_whitespace().map(str::to_string).collect(),
            )
        })
        .collect();
    let match_mode = match node.attr("match") {
        Some("any") => Match::Any,
        Some("none") => Match::None,
        _ => Match::All,
    };
    Condition { tests, match_mode }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLE: &str = r#"<style xmlns="http://purl.org/net/xbiblio/csl" xml:lang="en-GB" et-al-min="4">
  <macro name="title"><text variable="title" font-style="italic"/></macro>
  <citation collapse="citation-number" et-al-use-first="1">
    <layout prefix="[" suffix="]" delimiter="; ">
      <text variable="citation-number"/>
    </layout>
  </citation>
  <bibliography>
    <sort><key variable="author"/><key macro="title" sort="descending"/></sort>
    <layout>
      <group delimiter=". ">
        <names variable="author editor"><name and="symbol"/><label form="short" prefix=" (" suffix=")"/></names>
        <choose>
          <if type="book thesis" match="any"><text macro="title"/></if>
          <else><text variable="title" quotes="true"/></else>
        </choose>
        <date variable="issued"><date-part name="year"/></date>
      </group>
    </layout>
  </bibliography>
</style>"#;

    #[test]
    fn test_without_collapse_and_lang() {
        let sheet = StyleSheet::new(STYLE).without_collapse();
        assert!(!sheet.xml().contains("collapse"));
        assert_eq!(sheet.lang().as_deref(), Some("en-GB"));
        assert_eq!(StyleSheet::normalization().lang(), None);
    }

    #[test]
    fn test_compile() {
        let style = StyleSheet::new(STYLE).compile().unwrap();
        assert_eq!(style.lang.as_deref(), Some("en-GB"));
        assert!(style.macros.contains_key("title"));

        let citation = style.citation.unwrap();
        assert_eq!(citation.formatting.prefix.as_deref(), Some("["));
        assert_eq!(citation.delimiter.as_deref(), Some("; "));
        assert_eq!(citation.name_options.et_al_min, Some(4));
        assert_eq!(citation.name_options.et_al_use_first, Some(1));

        let bibliography = style.bibliography.unwrap();
        assert_eq!(bibliography.sort.len(), 2);
        assert!(bibliography.sort[1].descending);
        match &bibliography.elements[0] {
            Element::Group { elements, delimiter, .. } => {
                assert_eq!(delimiter.as_deref(), Some(". "));
                assert_eq!(elements.len(), 3);
                match &elements[0] {
                    Element::Names {
                        variables,
                        options,
                        label,
                        ..
                    } => {
                        assert_eq!(variables, &vec!["author".to_string(), "editor".to_string()]);
                        assert_eq!(options.as_ref().unwrap().and.as_deref(), Some("symbol"));
                        assert_eq!(label.as_ref().unwrap().form, "short");
                    }
                    other => panic!("expected names, got {:?}", other),
                }
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_normalization_style_compiles() {
        let style = StyleSheet::normalization().compile().unwrap();
        assert_eq!(style.macros.len(), 3);
        assert!(style.citation.is_some());
        assert!(style.bibliography.is_none());
    }

    #[test]
    fn test_invalid_styles() {
        assert!(StyleSheet::new("<locale/>").compile().is_err());
        assert!(StyleSheet::new("<style><citation/></style>").compile().is_err());
        assert!(StyleSheet::new("<style><macro><text/></macro></style>").compile().is_err());
    }
}

//! Citation-style integration.
//!
//! [`make_bibliography`] converts the inputs, runs a citation processor
//! over the cited items twice and emits a Madoko bibliography block:
//!
//! 1. The normalization style renders `authors|year|authors-long` for each
//!    citation. The parts become the `cite-*` attributes of the entry.
//! 2. The primary style, with citation collapsing removed, renders each
//!    citation label and then the bibliography itself.
//!
//! Processors are pluggable through [`ProcessorFactory`]; [`BasicFactory`]
//! is the built-in CSL processor.

mod hooks;
mod output;
mod processor;
mod style;
mod terms;
mod xml;

pub use self::hooks::{escape_attribute, escape_markdown, Hook, HookTable};
pub use self::output::{Feature, LinkKind, RichText};
pub use self::processor::{BasicFactory, BasicProcessor};
pub use self::style::{Formatting, NameOptions, Style, StyleSheet, NORMALIZE_STYLE};
pub use self::terms::Terms;

use crate::bibliography::{convert_to_csl, BibInput};
use crate::convert::{PlainTex, TexConverter};
use crate::csl::{Bib, CslItem};
use crate::error::{ResolutionError, Result};
use crate::options::BibOptions;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Looks up citation items by id.
pub trait ItemSource {
    fn retrieve_item(&self, id: &str) -> Result<&CslItem>;
}

impl ItemSource for Bib {
    /// Ids are matched case-insensitively.
    fn retrieve_item(&self, id: &str) -> Result<&CslItem> {
        self.get(&id.to_lowercase())
            .ok_or_else(|| ResolutionError::UnknownCitation(id.to_string()).into())
    }
}

/// A citation processor bound to one style and locale.
pub trait CitationProcessor {
    /// Register the cited ids, in citation order.
    fn update_items(&mut self, _sys: &dyn ItemSource, _ids: &[String]) -> Result<()> {
        Ok(())
    }

    /// Render the in-text citation of one item.
    fn cite(&self, sys: &dyn ItemSource, id: &str) -> Result<RichText>;

    /// Render bibliography entries in bibliography order.
    fn bibliography(&self, sys: &dyn ItemSource, ids: &[String]) -> Result<Vec<(String, RichText)>>;
}

/// Creates citation processors.
pub trait ProcessorFactory {
    fn create(&self, style: &StyleSheet, locale: Option<&str>)
        -> Result<Box<dyn CitationProcessor>>;
}

/// Label data gathered for one citation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CiteInfo {
    pub authors: String,
    pub authors_long: String,
    pub year: String,
    /// Citation label rendered by the primary style.
    pub label: String,
    /// `authors-long, year` and the title on a second line.
    pub caption: String,
}

impl CiteInfo {
    /// Split a normalization-style rendering `authors|year|authors-long`.
    fn from_normalized(rendered: &str, title: &str) -> Self {
        let mut parts = rendered.splitn(3, '|').map(str::trim);
        let authors = parts.next().unwrap_or_default().to_string();
        let year = parts.next().unwrap_or_default().to_string();
        let authors_long = parts.next().unwrap_or_default().to_string();

        let head = [authors_long.as_str(), year.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let caption = if title.is_empty() {
            head
        } else {
            format!("{}\n{}", head, title)
        };

        Self {
            authors,
            authors_long,
            year,
            label: String::new(),
            caption,
        }
    }
}

/// Everything needed to build a bibliography.
#[derive(Debug, Clone, Default)]
pub struct BibliographyRequest {
    pub inputs: Vec<BibInput>,
    /// Cited ids; `None` cites every item.
    pub citations: Option<Vec<String>>,
    /// Primary CSL style XML.
    pub style: String,
    /// Replaces the built-in normalization style.
    pub normalize_style: Option<String>,
    /// CSL locale XML.
    pub locale: Option<String>,
    pub options: BibOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BibliographyOutput {
    /// The Madoko bibliography block.
    pub bibliography: String,
    pub bib: Bib,
    /// Newline-separated warnings.
    pub warnings: String,
    /// `error: ...` when the bibliography could not be rendered.
    pub errors: String,
}

/// Build a bibliography with plain TeX conversion and the Madoko hooks.
pub fn make_bibliography(
    request: &BibliographyRequest,
    factory: &dyn ProcessorFactory,
) -> BibliographyOutput {
    make_bibliography_with(request, factory, &PlainTex, &HookTable::madoko())
}

/// Build a bibliography. Never fails: a fatal error is reported in
/// `errors` while the converted items and warnings are still returned.
pub fn make_bibliography_with(
    request: &BibliographyRequest,
    factory: &dyn ProcessorFactory,
    tex: &dyn TexConverter,
    hooks: &HookTable,
) -> BibliographyOutput {
    let converted = convert_to_csl(&request.inputs, tex, &request.options);
    let mut output = BibliographyOutput {
        warnings: converted.warnings_text(),
        bib: converted.bib,
        ..Default::default()
    };

    match render_bibliography(request, factory, hooks, &output.bib) {
        Ok(text) => output.bibliography = text,
        Err(err) => {
            warn!("bibliography failed: {}", err);
            output.errors = format!("error: {}", err);
        }
    }
    output
}

fn render_bibliography(
    request: &BibliographyRequest,
    factory: &dyn ProcessorFactory,
    hooks: &HookTable,
    bib: &Bib,
) -> Result<String> {
    let citations: Vec<String> = match &request.citations {
        Some(ids) => {
            // Ids are case-insensitive; the first spelling wins.
            let mut seen = HashSet::new();
            ids.iter()
                .filter(|id| seen.insert(id.to_lowercase()))
                .cloned()
                .collect()
        }
        None => bib.keys().cloned().collect(),
    };
    let locale = request.locale.as_deref();

    let primary = StyleSheet::new(request.style.as_str()).without_collapse();
    let normalize = match &request.normalize_style {
        Some(xml) => StyleSheet::new(xml.as_str()),
        None => StyleSheet::normalization(),
    };

    // Label pass.
    let mut info: HashMap<String, CiteInfo> = HashMap::new();
    {
        let mut processor = factory.create(&normalize, locale)?;
        processor.update_items(bib, &citations)?;
        for id in &citations {
            let item = bib.retrieve_item(id)?;
            let rendered = processor.cite(bib, id)?.plain_text();
            let title = item.title.as_deref().unwrap_or_default();
            info.insert(id.to_lowercase(), CiteInfo::from_normalized(&rendered, title));
        }
    }
    debug!(citations = citations.len(), "rendered citation labels");

    let mut processor = factory.create(&primary, locale)?;
    processor.update_items(bib, &citations)?;
    for id in &citations {
        let label = processor.cite(bib, id)?.plain_text();
        if let Some(entry) = info.get_mut(&id.to_lowercase()) {
            entry.label = label;
        }
    }

    let entries = processor.bibliography(bib, &citations)?;
    debug!(entries = entries.len(), "rendered bibliography");

    let mut lines = vec![hooks.bibstart(primary.lang().as_deref())];
    for (id, text) in &entries {
        let item = bib.retrieve_item(id)?;
        let cite = info.get(&id.to_lowercase()).cloned().unwrap_or_default();
        lines.push(bibitem_start(item, &cite));
        lines.push(hooks.render(text));
        lines.push("~ end bibitem".to_string());
    }
    lines.push(hooks.bibend());

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn bibitem_start(item: &CslItem, cite: &CiteInfo) -> String {
    let id = format!("{}{}", item.preid.as_deref().unwrap_or_default(), item.id);
    let searchterm = [item.title.as_deref().unwrap_or_default(), cite.authors.as_str()]
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("+");

    let mut attrs = vec![
        ("id", id),
        ("cite-authors", cite.authors.clone()),
        ("cite-authors-long", cite.authors_long.clone()),
        ("cite-year", cite.year.clone()),
        ("cite-info", cite.label.clone()),
        ("caption", cite.caption.clone()),
    ];
    if let Some(line) = item.source_line {
        attrs.push(("line", line.to_string()));
    }
    attrs.push(("searchterm", searchterm));

    let attrs = attrs
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, escape_attribute(value)))
        .collect::<Vec<_>>()
        .join(" ");
    format!("~ begin bibitem {{ {} }}", attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0" xml:lang="en-US">
  <citation collapse="citation-number">
    <layout prefix="[" suffix="]"><text variable="citation-number"/></layout>
  </citation>
  <bibliography>
    <layout suffix=".">
      <group delimiter=", ">
        <names variable="author"><name name-as-sort-order="all" initialize-with="."/></names>
        <text variable="title" font-style="italic"/>
        <text variable="container-title"/>
        <date variable="issued"><date-part name="year"/></date>
      </group>
    </layout>
  </bibliography>
</style>"#;

    const BIB: &str = r#"@article{k1, author="Smith, J.", title="A Title", journal="J", year="2020"}"#;

    fn request(bib: &str) -> BibliographyRequest {
        BibliographyRequest {
            inputs: vec![BibInput::new("refs.bib", bib)],
            style: STYLE.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end() {
        let output = make_bibliography(&request(BIB), &BasicFactory);
        assert_eq!(output.errors, "");
        assert_eq!(output.warnings, "");
        assert_eq!(output.bib["k1"].title.as_deref(), Some("A Title"));

        let expected = "~ begin bibliography { data-lang=\"en-US\" }\n\
~ begin bibitem { id=\"k1\" cite-authors=\"Smith\" cite-authors-long=\"J. Smith\" cite-year=\"2020\" cite-info=\"[1]\" caption=\"J. Smith, 2020&nl;A Title\" line=\"1\" searchterm=\"A+Title+Smith\" }\n\
Smith, J., _A Title_, J, 2020.\n\
~ end bibitem\n\
~ end bibliography\n";
        assert_eq!(output.bibliography, expected);
    }

    #[test]
    fn test_unknown_citation_is_an_error() {
        let mut req = request(BIB);
        req.citations = Some(vec!["k1".to_string(), "nope".to_string()]);
        let output = make_bibliography(&req, &BasicFactory);
        assert!(output.errors.starts_with("error: "));
        assert!(output.errors.contains("nope"));
        assert_eq!(output.bibliography, "");
        assert!(output.bib.contains_key("k1"));
    }

    #[test]
    fn test_invalid_style_keeps_items_and_warnings() {
        let mut req = request("@book{ok, title={T}}\n@book{bad title}");
        req.style = "<style>".to_string();
        let output = make_bibliography(&req, &BasicFactory);
        assert!(output.errors.starts_with("error: "));
        assert!(output.bib.contains_key("ok"));
        assert!(output.warnings.starts_with("refs.bib:2: warning: "));
    }

    #[test]
    fn test_custom_hooks_and_preid() {
        let mut req = request(BIB);
        req.options.preid = Some("ref-".to_string());
        let mut hooks = HookTable::madoko();
        hooks.set("@font-style/italic", |s, _| format!("<i>{}</i>", s));
        let output = make_bibliography_with(&req, &BasicFactory, &PlainTex, &hooks);
        assert!(output.bibliography.contains("id=\"ref-k1\""));
        assert!(output.bibliography.contains("<i>A Title</i>"));
    }

    #[test]
    fn test_repeated_citations_render_once() {
        let mut req = request(BIB);
        req.citations = Some(vec!["k1".to_string(), "K1".to_string(), "k1".to_string()]);
        let output = make_bibliography(&req, &BasicFactory);
        assert_eq!(output.errors, "");
        assert_eq!(output.bibliography.matches("~ begin bibitem").count(), 1);
        assert!(output.bibliography.contains("id=\"k1\""));
        assert!(output.bibliography.contains("cite-info=\"[1]\""));
    }

    #[test]
    fn test_url_link_shows_url_text() {
        let mut req = request("@misc{k, title={T}, eprint={2101.00001}, eprinttype={arxiv}}");
        req.style = r#"<style><citation><layout><text variable="citation-number"/></layout></citation>
  <bibliography><layout><text variable="URL"/></layout></bibliography></style>"#
            .to_string();
        let output = make_bibliography(&req, &BasicFactory);
        assert_eq!(output.errors, "");
        assert_eq!(output.bib["k"].url_text.as_deref(), Some("arXiv:2101.00001"));
        assert!(output
            .bibliography
            .contains("[arXiv:2101.00001](https://arxiv.org/abs/2101.00001)"));
    }

    #[test]
    fn test_cite_info_from_normalized() {
        let info = CiteInfo::from_normalized("Doe|n.d.|Jane Doe", "Title");
        assert_eq!(info.authors, "Doe");
        assert_eq!(info.year, "n.d.");
        assert_eq!(info.caption, "Jane Doe, n.d.\nTitle");
    }

    #[test]
    fn test_unknown_id_lookup() {
        let bib = Bib::new();
        assert!(bib.retrieve_item("missing").is_err());
    }
}

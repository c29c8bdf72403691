//! # mda-bib
//!
//! A bibliography compiler for academic Markdown: BibTeX databases in,
//! CSL-JSON items and a rendered Madoko bibliography block out.
//!
//! ## Pipeline
//!
//! 1. **Parse**: [`bibtex::parse`] scans a database into entries, string
//!    macros, preambles and comments. Malformed directives become warning
//!    records; parsing never aborts.
//! 2. **Resolve**: [`resolve::resolve_crossrefs`] merges `xdata` and
//!    `crossref` parents into each entry, renaming inherited fields the way
//!    biblatex does.
//! 3. **Convert**: [`convert::convert_entry`] maps a resolved entry to a
//!    [`csl::CslItem`]: type, names, titles, dates, standard fields,
//!    identifiers and the rest.
//! 4. **Render**: [`make_bibliography`] runs a citation processor over the
//!    items and emits the bibliography through an output hook table.
//!
//! ## Quick Start
//!
//! ```rust
//! use mda_bib::{convert_to_csl, BibInput, BibOptions, PlainTex};
//!
//! let input = BibInput::new(
//!     "refs.bib",
//!     r#"@article{knuth84, author = {Donald E. Knuth}, title = {Literate Programming},
//!        journal = {The Computer Journal}, year = 1984, pages = {97--111}}"#,
//! );
//!
//! let result = convert_to_csl(&[input], &PlainTex, &BibOptions::default());
//! let item = &result.bib["knuth84"];
//! assert_eq!(item.csl_type, "article-journal");
//! assert_eq!(item.page.as_deref(), Some("97-111"));
//! assert!(result.warnings.is_empty());
//! ```
//!
//! ## Rendering
//!
//! ```rust
//! use mda_bib::{make_bibliography, BasicFactory, BibInput, BibliographyRequest};
//!
//! let style = r#"<style><citation><layout><text variable="citation-number"/></layout></citation>
//!   <bibliography><layout><text variable="title" font-style="italic"/></layout></bibliography>
//! </style>"#;
//!
//! let request = BibliographyRequest {
//!     inputs: vec![BibInput::new("refs.bib", "@book{k, title = {Title}}")],
//!     style: style.to_string(),
//!     ..Default::default()
//! };
//! let output = make_bibliography(&request, &BasicFactory);
//! assert_eq!(output.errors, "");
//! assert!(output.bibliography.contains("_Title_"));
//! ```
//!
//! ## Options
//!
//! [`BibOptions`] can be loaded from TOML and overridden per entry through
//! the BibTeX `options` field (`options = {useprefix=true}`).
//!
//! ## FFI
//!
//! The library provides a C-compatible FFI; see the `ffi` module.
//!
//! ## Features
//!
//! - `wasm`: Enable WebAssembly bindings (requires `wasm-bindgen`)

pub mod bibliography;
pub mod bibtex;
pub mod convert;
pub mod csl;
pub mod error;
pub mod options;
pub mod render;
pub mod resolve;

// FFI module (always compiled for cdylib)
pub mod ffi;

// WASM module (only with feature)
#[cfg(feature = "wasm")]
pub mod wasm;

// Convenience re-exports
pub use bibliography::{convert_to_csl, BibInput, BibliographyResult};
pub use convert::{PlainTex, TexConverter};
pub use csl::{Bib, CslItem};
pub use error::{Error, ParseError, RenderError, ResolutionError, Result};
pub use options::{BibOptions, CrossRefMode};
pub use render::{
    make_bibliography, make_bibliography_with, BasicFactory, BibliographyOutput,
    BibliographyRequest, HookTable, StyleSheet,
};

/// Convert BibTeX sources straight to a CSL-JSON string.
///
/// Warnings are dropped; use [`convert_to_csl`] to see them.
///
/// # Example
///
/// ```rust
/// let json = mda_bib::to_csl_json(&[mda_bib::BibInput::new("a.bib", "@misc{x, title={T}}")]).unwrap();
/// assert!(json.contains("\"title\": \"T\""));
/// ```
pub fn to_csl_json(inputs: &[BibInput]) -> Result<String> {
    let result = convert_to_csl(inputs, &PlainTex, &BibOptions::default());
    Ok(serde_json::to_string_pretty(&result.bib)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_pipeline() {
        let bib = r#"
@string{acm = "ACM Press"}

@proceedings{conf, title = {Proceedings of the Conference}, publisher = acm, year = 2010}

@inproceedings{paper,
  author = {M{\"u}ller, Hans and van der Berg, Anna},
  title = {On Things},
  crossref = {conf},
  pages = {1--10},
  doi = {10.1000/xyz},
}
"#;
        let style = r#"<style>
  <citation><layout><text variable="citation-number"/></layout></citation>
  <bibliography>
    <layout>
      <group delimiter=". ">
        <names variable="author"><name and="text"/></names>
        <text variable="title" quotes="true"/>
        <text variable="container-title" font-style="italic"/>
        <text variable="DOI"/>
      </group>
    </layout>
  </bibliography>
</style>"#;

        let request = BibliographyRequest {
            inputs: vec![BibInput::new("refs.bib", bib)],
            citations: Some(vec!["paper".to_string()]),
            style: style.to_string(),
            ..Default::default()
        };
        let output = make_bibliography(&request, &BasicFactory);

        assert_eq!(output.errors, "");
        let paper = &output.bib["paper"];
        assert_eq!(paper.csl_type, "paper-conference");
        assert_eq!(paper.publisher.as_deref(), Some("ACM Press"));
        assert_eq!(
            paper.container_title.as_deref(),
            Some("Proceedings of the Conference")
        );

        assert!(output.bibliography.contains("Hans Müller and Anna van der Berg"));
        assert!(output.bibliography.contains("&ldquo;On Things&rdquo;"));
        assert!(output.bibliography.contains("_Proceedings of the Conference_"));
        assert!(output
            .bibliography
            .contains("[10.1000/xyz](https://doi.org/10.1000/xyz)"));
        assert!(!output.bibliography.contains("id=\"conf\""));
    }
}

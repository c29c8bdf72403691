//! WebAssembly bindings for JavaScript/TypeScript.

#![cfg(feature = "wasm")]

use crate::bibliography::{convert_to_csl, BibInput};
use crate::convert::PlainTex;
use crate::options::BibOptions;
use crate::render::{make_bibliography, BasicFactory, BibliographyRequest};
use wasm_bindgen::prelude::*;

/// Convert a BibTeX or CSL-JSON source to CSL items.
///
/// # Arguments
///
/// * `filename` - Name used in warnings.
/// * `contents` - The database source text.
/// * `options` - Optional configuration object.
///
/// # Returns
///
/// JSON with `bib`, `warnings`, `preamble` and `comments`.
#[wasm_bindgen(js_name = convertToCsl)]
pub fn convert_to_csl_json(
    filename: &str,
    contents: &str,
    options: Option<BibliographyOptions>,
) -> Result<String, JsError> {
    let options = options.map(|o| o.to_bib_options()).transpose()?.unwrap_or_default();
    let result = convert_to_csl(&[BibInput::new(filename, contents)], &PlainTex, &options);
    serde_json::to_string(&result).map_err(|e| JsError::new(&e.to_string()))
}

/// Convert a source and render its bibliography with a CSL style.
///
/// # Returns
///
/// JSON with `bibliography`, `bib`, `warnings` and `errors`.
#[wasm_bindgen(js_name = makeBibliography)]
pub fn make_bibliography_json(
    filename: &str,
    contents: &str,
    style: &str,
    options: Option<BibliographyOptions>,
) -> Result<String, JsError> {
    let options = options.unwrap_or_default();
    let request = BibliographyRequest {
        inputs: vec![BibInput::new(filename, contents)],
        citations: options.citations.clone(),
        style: style.to_string(),
        normalize_style: options.normalize_style.clone(),
        locale: options.locale.clone(),
        options: options.to_bib_options()?,
    };
    let output = make_bibliography(&request, &BasicFactory);
    serde_json::to_string(&output).map_err(|e| JsError::new(&e.to_string()))
}

/// Configuration options for conversion and rendering.
#[wasm_bindgen]
#[derive(Default)]
pub struct BibliographyOptions {
    toml: Option<String>,
    citations: Option<Vec<String>>,
    locale: Option<String>,
    normalize_style: Option<String>,
}

#[wasm_bindgen]
impl BibliographyOptions {
    /// Create a new options object with defaults.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set converter options from a TOML table, e.g. `useprefix = true`.
    #[wasm_bindgen(js_name = setOptions)]
    pub fn set_options(&mut self, toml: &str) {
        self.toml = Some(toml.to_string());
    }

    /// Cite only these ids, separated by commas or whitespace.
    #[wasm_bindgen(js_name = setCitations)]
    pub fn set_citations(&mut self, ids: &str) {
        self.citations = Some(
            ids.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }

    /// Set the CSL locale XML.
    #[wasm_bindgen(js_name = setLocale)]
    pub fn set_locale(&mut self, locale: &str) {
        self.locale = Some(locale.to_string());
    }

    /// Replace the normalization style used for citation labels.
    #[wasm_bindgen(js_name = setNormalizeStyle)]
    pub fn set_normalize_style(&mut self, style: &str) {
        self.normalize_style = Some(style.to_string());
    }

    fn to_bib_options(&self) -> Result<BibOptions, JsError> {
        match self.toml.as_deref() {
            Some(toml) => BibOptions::from_toml_str(toml).map_err(|e| JsError::new(&e.to_string())),
            None => Ok(BibOptions::default()),
        }
    }
}

/// Get the library version.
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// TypeScript type definitions for documentation
/// ```typescript
/// // mda_bib.d.ts
///
/// /**
///  * Convert BibTeX (or CSL-JSON) to CSL items.
///  * @returns JSON string: { bib, warnings, preamble, comments }
///  */
/// export function convertToCsl(filename: string, contents: string, options?: BibliographyOptions): string;
///
/// /**
///  * Render a bibliography in Madoko format.
///  * @returns JSON string: { bibliography, bib, warnings, errors }
///  */
/// export function makeBibliography(filename: string, contents: string, style: string, options?: BibliographyOptions): string;
///
/// /**
///  * Get the library version.
///  */
/// export function getVersion(): string;
///
/// export class BibliographyOptions {
///     constructor();
///     setOptions(toml: string): void;
///     setCitations(ids: string): void;
///     setLocale(locale: string): void;
///     setNormalizeStyle(style: string): void;
/// }
/// ```
const _: () = ();

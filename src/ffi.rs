//! C FFI layer for cross-language interoperability.
//!
//! Results are returned as JSON strings owned by the library; free them
//! with `mdabib_free_result` or `mdabib_free_string`.

use crate::bibliography::{convert_to_csl, BibInput};
use crate::convert::PlainTex;
use crate::options::BibOptions;
use crate::render::{make_bibliography, BasicFactory, BibliographyRequest};
use libc::c_char;
use std::ffi::{CStr, CString};
use std::ptr;

/// Input for `mdabib_make_bibliography`. Every field except `contents`
/// and `style` may be null.
#[repr(C)]
pub struct MdaBibRequest {
    /// Name used in warnings (null for "input.bib")
    pub filename: *const c_char,
    /// BibTeX or CSL-JSON source text
    pub contents: *const c_char,
    /// Primary CSL style XML
    pub style: *const c_char,
    /// Replacement for the built-in normalization style
    pub normalize_style: *const c_char,
    /// CSL locale XML
    pub locale: *const c_char,
    /// Cited ids separated by commas or whitespace (null cites everything)
    pub citations: *const c_char,
    /// Options as a TOML table
    pub options: *const c_char,
}

/// Result type for FFI operations.
#[repr(C)]
pub struct MdaBibResult {
    /// Pointer to result JSON (caller must free with mdabib_free_string)
    pub data: *mut c_char,
    /// Error message if data is null (caller must free with mdabib_free_string)
    pub error: *mut c_char,
}

impl MdaBibResult {
    fn ok(data: String) -> Self {
        Self {
            data: into_c_string(data),
            error: ptr::null_mut(),
        }
    }

    fn err(error: String) -> Self {
        Self {
            data: ptr::null_mut(),
            error: into_c_string(error),
        }
    }
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s.replace('\0', ""))
        .unwrap_or_default()
        .into_raw()
}

/// Read an optional C string.
unsafe fn optional_str<'a>(s: *const c_char, what: &str) -> Result<Option<&'a str>, String> {
    if s.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(s)
        .to_str()
        .map(Some)
        .map_err(|_| format!("Invalid UTF-8 {}", what))
}

unsafe fn required_str<'a>(s: *const c_char, what: &str) -> Result<&'a str, String> {
    optional_str(s, what)?.ok_or_else(|| format!("Null {} pointer", what))
}

fn load_options(toml: Option<&str>) -> Result<BibOptions, String> {
    match toml {
        Some(toml) => BibOptions::from_toml_str(toml).map_err(|e| e.to_string()),
        None => Ok(BibOptions::default()),
    }
}

/// Convert one BibTeX database to CSL items.
///
/// On success `data` holds `{"bib": {...}, "warnings": [...], "preamble":
/// "...", "comments": "..."}`.
///
/// # Safety
///
/// - `filename` and `options` must be valid null-terminated UTF-8 strings or null.
/// - `contents` must be a valid null-terminated UTF-8 string.
/// - The result must be freed with `mdabib_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mdabib_convert_to_csl(
    filename: *const c_char,
    contents: *const c_char,
    options: *const c_char,
) -> MdaBibResult {
    let convert = || -> Result<String, String> {
        let filename = optional_str(filename, "filename")?.unwrap_or("input.bib");
        let contents = required_str(contents, "contents")?;
        let options = load_options(optional_str(options, "options")?)?;

        let input = BibInput::new(filename, contents);
        let result = convert_to_csl(&[input], &PlainTex, &options);
        serde_json::to_string(&result).map_err(|e| e.to_string())
    };

    match convert() {
        Ok(json) => MdaBibResult::ok(json),
        Err(e) => MdaBibResult::err(e),
    }
}

/// Convert a database and render its bibliography.
///
/// On success `data` holds `{"bibliography": "...", "bib": {...},
/// "warnings": "...", "errors": "..."}`. Rendering problems are reported
/// in `errors`; the `error` pointer is only set for unusable input.
///
/// # Safety
///
/// - `request` must be a valid pointer to an MdaBibRequest whose string
///   fields are null or valid null-terminated UTF-8 strings.
/// - The result must be freed with `mdabib_free_result`.
#[no_mangle]
pub unsafe extern "C" fn mdabib_make_bibliography(request: *const MdaBibRequest) -> MdaBibResult {
    if request.is_null() {
        return MdaBibResult::err("Null request pointer".to_string());
    }
    let req = &*request;

    let build = || -> Result<BibliographyRequest, String> {
        let filename = optional_str(req.filename, "filename")?.unwrap_or("input.bib");
        let contents = required_str(req.contents, "contents")?;
        Ok(BibliographyRequest {
            inputs: vec![BibInput::new(filename, contents)],
            citations: optional_str(req.citations, "citations")?.map(|ids| {
                ids.split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            style: required_str(req.style, "style")?.to_string(),
            normalize_style: optional_str(req.normalize_style, "normalize_style")?
                .map(str::to_string),
            locale: optional_str(req.locale, "locale")?.map(str::to_string),
            options: load_options(optional_str(req.options, "options")?)?,
        })
    };

    let request = match build() {
        Ok(r) => r,
        Err(e) => return MdaBibResult::err(e),
    };

    let output = make_bibliography(&request, &BasicFactory);
    match serde_json::to_string(&output) {
        Ok(json) => MdaBibResult::ok(json),
        Err(e) => MdaBibResult::err(e.to_string()),
    }
}

/// Free a string returned by mdabib functions.
///
/// # Safety
///
/// - `s` must be a pointer returned by a mdabib function, or null.
#[no_mangle]
pub unsafe extern "C" fn mdabib_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Free a result struct.
///
/// # Safety
///
/// - `result` must be a valid MdaBibResult.
#[no_mangle]
pub unsafe extern "C" fn mdabib_free_result(result: MdaBibResult) {
    mdabib_free_string(result.data);
    mdabib_free_string(result.error);
}

/// Get the library version.
///
/// # Safety
///
/// The returned string is static and must not be freed.
#[no_mangle]
pub extern "C" fn mdabib_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    unsafe fn take(result: MdaBibResult) -> (Option<String>, Option<String>) {
        let read = |p: *mut c_char| {
            (!p.is_null()).then(|| CStr::from_ptr(p).to_string_lossy().into_owned())
        };
        let out = (read(result.data), read(result.error));
        mdabib_free_result(result);
        out
    }

    #[test]
    fn test_convert_to_csl() {
        let contents = CString::new("@book{k, title = {T}}").unwrap();
        let options = CString::new("url = false").unwrap();
        let (data, error) =
            unsafe { take(mdabib_convert_to_csl(ptr::null(), contents.as_ptr(), options.as_ptr())) };
        assert_eq!(error, None);
        let json: serde_json::Value = serde_json::from_str(&data.unwrap()).unwrap();
        assert_eq!(json["bib"]["k"]["title"], "T");
    }

    #[test]
    fn test_null_contents() {
        let (data, error) =
            unsafe { take(mdabib_convert_to_csl(ptr::null(), ptr::null(), ptr::null())) };
        assert_eq!(data, None);
        assert_eq!(error.as_deref(), Some("Null contents pointer"));
    }

    #[test]
    fn test_bad_options() {
        let contents = CString::new("@book{k, title = {T}}").unwrap();
        let options = CString::new("url = [").unwrap();
        let (data, error) =
            unsafe { take(mdabib_convert_to_csl(ptr::null(), contents.as_ptr(), options.as_ptr())) };
        assert_eq!(data, None);
        assert!(error.is_some());
    }

    #[test]
    fn test_make_bibliography() {
        let contents = CString::new("@book{a, title = {A}}\n@book{b, title = {B}}").unwrap();
        let style = CString::new(
            r#"<style><citation><layout><text variable="title"/></layout></citation>
               <bibliography><layout><text variable="title"/></layout></bibliography></style>"#,
        )
        .unwrap();
        let citations = CString::new("b").unwrap();
        let request = MdaBibRequest {
            filename: ptr::null(),
            contents: contents.as_ptr(),
            style: style.as_ptr(),
            normalize_style: ptr::null(),
            locale: ptr::null(),
            citations: citations.as_ptr(),
            options: ptr::null(),
        };
        let (data, error) = unsafe { take(mdabib_make_bibliography(&request)) };
        assert_eq!(error, None);
        let json: serde_json::Value = serde_json::from_str(&data.unwrap()).unwrap();
        assert_eq!(json["errors"], "");
        let bibliography = json["bibliography"].as_str().unwrap();
        assert!(bibliography.contains("id=\"b\""));
        assert!(!bibliography.contains("id=\"a\""));
    }

    #[test]
    fn test_version() {
        let version = unsafe { CStr::from_ptr(mdabib_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}

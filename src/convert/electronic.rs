//! URLs, DOIs and e-print identifiers.

use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::CslItem;
use crate::options::BibOptions;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DOI_URL: Regex =
        Regex::new(r"(?i)^\s*(?:https?://)?(?:dx\.)?doi\.org/(\S+?)\s*$").unwrap();
    static ref DOI_PREFIX: Regex = Regex::new(r"(?i)^\s*doi:\s*").unwrap();
}

/// A known e-print archive.
struct Archive {
    /// Canonical `eprint-type`.
    name: &'static str,
    /// Field names and `eprinttype` spellings that select this archive.
    aliases: &'static [&'static str],
    url: &'static str,
    pretext: &'static str,
}

const ARCHIVES: &[Archive] = &[
    Archive {
        name: "arxiv",
        aliases: &["arxiv"],
        url: "https://arxiv.org/abs/{}",
        pretext: "arXiv:",
    },
    Archive {
        name: "pmcid",
        aliases: &["pmcid", "pmc"],
        url: "https://www.ncbi.nlm.nih.gov/pmc/articles/{}",
        pretext: "PMCID:",
    },
    Archive {
        name: "pubmed",
        aliases: &["pmid", "pubmed"],
        url: "https://www.ncbi.nlm.nih.gov/pubmed/{}",
        pretext: "PMID:",
    },
    Archive {
        name: "jstor",
        aliases: &["jstor"],
        url: "https://www.jstor.org/stable/{}",
        pretext: "JSTOR:",
    },
    Archive {
        name: "zbl",
        aliases: &["zbl", "zbmath"],
        url: "https://zbmath.org/?q=an:{}",
        pretext: "Zbl:",
    },
    Archive {
        name: "hdl",
        aliases: &["hdl", "handle"],
        url: "https://hdl.handle.net/{}",
        pretext: "HDL:",
    },
    Archive {
        name: "mr",
        aliases: &["mr", "mrnumber"],
        url: "https://mathscinet.ams.org/mathscinet-getitem?mr={}",
        pretext: "MR:",
    },
    Archive {
        name: "googlebooks",
        aliases: &["googlebooks"],
        url: "https://books.google.com/books?id={}",
        pretext: "Google Books:",
    },
];

/// Fields that name an identifier directly, without `eprinttype`.
const IDENTIFIER_FIELDS: &[&str] = &["arxiv", "pmcid", "pmc", "pmid", "jstor", "zbl", "hdl", "mr"];

pub fn convert_electronic(
    entry: &RawEntry,
    _tex: &dyn TexConverter,
    options: &BibOptions,
    item: &mut CslItem,
) {
    let explicit_url = entry.field("url").map(str::trim);

    // A doi.org link in the url field is a DOI in disguise.
    let url_doi = explicit_url
        .and_then(|url| DOI_URL.captures(url))
        .map(|caps| caps[1].to_string());
    let doi = entry
        .field("doi")
        .map(normalize_doi)
        .or_else(|| url_doi.clone());

    let mut url = match (explicit_url, &url_doi) {
        (Some(_), Some(_)) if !entry.has("doi") => None,
        (Some(url), _) => Some((url.to_string(), None)),
        (None, _) => None,
    };

    if let Some((kind, id)) = eprint(entry) {
        let archive = ARCHIVES.iter().find(|a| a.aliases.contains(&kind.as_str()));
        item.eprint_type = match archive {
            Some(archive) => Some(archive.name.to_string()),
            None => (!kind.is_empty()).then(|| kind.clone()),
        };
        item.eprint = Some(id.clone());

        if let (Some(archive), None) = (archive, &url) {
            let mut text = format!("{}{}", archive.pretext, id);
            if let Some(class) = entry.field("eprintclass").or_else(|| entry.field("primaryclass")) {
                text.push_str(&format!(" [{}]", class.trim()));
            }
            url = Some((archive.url.replace("{}", &id), Some(text)));
        }
    }

    if options.url {
        if let Some((url, text)) = url {
            item.url = Some(url);
            item.url_text = text;
        }
    }

    if options.doi {
        if let Some(doi) = doi.filter(|d| !d.is_empty()) {
            item.doi_text = Some(format!("doi:{}", doi));
            item.doi = Some(doi);
        }
    }
}

/// Find the e-print archive and identifier, explicit `eprinttype` first.
fn eprint(entry: &RawEntry) -> Option<(String, String)> {
    if let Some(id) = entry.field("eprint") {
        let kind = entry
            .first_of(&["eprinttype", "etype", "archiveprefix"])
            .unwrap_or("");
        return Some((kind.trim().to_lowercase(), id.trim().to_string()));
    }

    IDENTIFIER_FIELDS.iter().find_map(|field| {
        entry
            .field(field)
            .map(|id| (field.to_string(), id.trim().to_string()))
    })
}

fn normalize_doi(raw: &str) -> String {
    match DOI_URL.captures(raw) {
        Some(caps) => caps[1].to_string(),
        None => DOI_PREFIX.replace(raw, "").trim().to_string(),
    }
}

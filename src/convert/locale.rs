//! Language names to locale codes.
//!
//! Covers the babel/polyglossia language names that appear in `langid` and
//! `language` fields. Values that already look like locale codes pass
//! through unchanged.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref LOCALE_CODE: Regex = Regex::new(r"^[a-z]{2,3}(?:-[A-Za-z]{2,4})?$").unwrap();
}

/// Information about a recognized language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleInfo {
    /// BCP 47 code, e.g. `en-GB`.
    pub code: &'static str,
    /// Canonical language name.
    pub name: &'static str,
}

const LANGUAGES: &[(&str, &str, &str)] = &[
    ("english", "en-US", "english"),
    ("american", "en-US", "english"),
    ("usenglish", "en-US", "english"),
    ("british", "en-GB", "english"),
    ("ukenglish", "en-GB", "english"),
    ("canadian", "en-CA", "english"),
    ("australian", "en-AU", "english"),
    ("newzealand", "en-NZ", "english"),
    ("german", "de-DE", "german"),
    ("ngerman", "de-DE", "german"),
    ("austrian", "de-AT", "german"),
    ("naustrian", "de-AT", "german"),
    ("swissgerman", "de-CH", "german"),
    ("nswissgerman", "de-CH", "german"),
    ("french", "fr-FR", "french"),
    ("francais", "fr-FR", "french"),
    ("canadien", "fr-CA", "french"),
    ("acadian", "fr-CA", "french"),
    ("dutch", "nl-NL", "dutch"),
    ("spanish", "es-ES", "spanish"),
    ("italian", "it-IT", "italian"),
    ("portuguese", "pt-PT", "portuguese"),
    ("portuges", "pt-PT", "portuguese"),
    ("brazilian", "pt-BR", "portuguese"),
    ("brazil", "pt-BR", "portuguese"),
    ("danish", "da-DK", "danish"),
    ("norwegian", "nb-NO", "norwegian"),
    ("norsk", "nb-NO", "norwegian"),
    ("nynorsk", "nn-NO", "norwegian"),
    ("swedish", "sv-SE", "swedish"),
    ("finnish", "fi-FI", "finnish"),
    ("icelandic", "is-IS", "icelandic"),
    ("polish", "pl-PL", "polish"),
    ("czech", "cs-CZ", "czech"),
    ("slovak", "sk-SK", "slovak"),
    ("slovene", "sl-SI", "slovene"),
    ("slovenian", "sl-SI", "slovene"),
    ("croatian", "hr-HR", "croatian"),
    ("serbian", "sr-RS", "serbian"),
    ("bulgarian", "bg-BG", "bulgarian"),
    ("russian", "ru-RU", "russian"),
    ("ukrainian", "uk-UA", "ukrainian"),
    ("greek", "el-GR", "greek"),
    ("turkish", "tr-TR", "turkish"),
    ("hungarian", "hu-HU", "hungarian"),
    ("magyar", "hu-HU", "hungarian"),
    ("romanian", "ro-RO", "romanian"),
    ("catalan", "ca-AD", "catalan"),
    ("basque", "eu", "basque"),
    ("estonian", "et-EE", "estonian"),
    ("latvian", "lv-LV", "latvian"),
    ("lithuanian", "lt-LT", "lithuanian"),
    ("hebrew", "he-IL", "hebrew"),
    ("arabic", "ar", "arabic"),
    ("farsi", "fa-IR", "farsi"),
    ("japanese", "ja-JP", "japanese"),
    ("chinese", "zh-CN", "chinese"),
    ("korean", "ko-KR", "korean"),
    ("vietnamese", "vi-VN", "vietnamese"),
    ("thai", "th-TH", "thai"),
    ("mongolian", "mn-MN", "mongolian"),
    ("latin", "la", "latin"),
];

/// Look up a language name, e.g. `ngerman` or `British`.
pub fn get_locale_info(name: &str) -> Option<LocaleInfo> {
    let name = name.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(alias, _, _)| *alias == name)
        .map(|&(_, code, name)| LocaleInfo { code, name })
}

/// Resolve a `langid`/`language` value to a locale code.
///
/// `langidopts` may carry `variant=british` style options that pick a
/// regional variant of the base language. Unknown names yield `None`.
pub fn resolve_language(language: &str, langidopts: Option<&str>) -> Option<String> {
    let trimmed = language.trim();
    if LOCALE_CODE.is_match(trimmed) {
        return Some(trimmed.to_string());
    }

    let info = get_locale_info(trimmed)?;

    let variant = langidopts.and_then(|opts| {
        crate::options::parse_option_list(opts)
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("variant"))
            .map(|(_, value)| value)
    });

    let regional = variant
        .and_then(|v| get_locale_info(&v))
        .filter(|v| v.name == info.name);

    Some(regional.unwrap_or(info).code.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_language_names() {
        assert_eq!(resolve_language("ngerman", None).as_deref(), Some("de-DE"));
        assert_eq!(resolve_language(" British ", None).as_deref(), Some("en-GB"));
        assert_eq!(resolve_language("klingon", None), None);
    }

    #[test]
    fn test_codes_pass_through() {
        assert_eq!(resolve_language("en-US", None).as_deref(), Some("en-US"));
        assert_eq!(resolve_language("fr", None).as_deref(), Some("fr"));
    }

    #[test]
    fn test_variant_option() {
        assert_eq!(
            resolve_language("english", Some("variant=british")).as_deref(),
            Some("en-GB")
        );
        assert_eq!(
            resolve_language("portuguese", Some("variant=brazilian")).as_deref(),
            Some("pt-BR")
        );
        // A variant of another language is ignored.
        assert_eq!(
            resolve_language("english", Some("variant=austrian")).as_deref(),
            Some("en-US")
        );
    }

    #[test]
    fn test_locale_info() {
        let info = get_locale_info("Nynorsk").unwrap();
        assert_eq!(info.code, "nn-NO");
        assert_eq!(info.name, "norwegian");
    }
}

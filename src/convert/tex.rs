//! Default TeX to plain-text conversion.

use super::TexConverter;

/// Accent commands and the letters they combine with, as
/// `(base, composed)` pairs, followed by the combining mark used when no
/// precomposed letter exists.
const ACCENTS: &[(char, &str, char)] = &[
    ('\'', "aáeéiíoóuúyýcćnńsśzźlĺrŕAÁEÉIÍOÓUÚYÝCĆNŃSŚZŹLĹRŔ", '\u{301}'),
    ('`', "aàeèiìoòuùAÀEÈIÌOÒUÙ", '\u{300}'),
    ('^', "aâeêiîoôuûAÂEÊIÎOÔUÛ", '\u{302}'),
    ('"', "aäeëiïoöuüyÿAÄEËIÏOÖUÜYŸ", '\u{308}'),
    ('~', "aãnñoõAÃNÑOÕ", '\u{303}'),
    ('=', "aāeēiīoōuūAĀEĒIĪOŌUŪ", '\u{304}'),
    ('.', "zżeėZŻEĖI\u{130}", '\u{307}'),
    ('c', "cçsşCÇSŞ", '\u{327}'),
    ('v', "cčsšzžrřeěnňCČSŠZŽRŘEĚNŇ", '\u{30C}'),
    ('u', "aăgğAĂGĞ", '\u{306}'),
    ('H', "oőuűOŐUŰ", '\u{30B}'),
    ('r', "aåuůAÅUŮ", '\u{30A}'),
    ('k', "aąeęAĄEĘ", '\u{328}'),
];

const SYMBOLS: &[(&str, &str)] = &[
    ("ss", "ß"),
    ("ae", "æ"),
    ("AE", "Æ"),
    ("oe", "œ"),
    ("OE", "Œ"),
    ("o", "ø"),
    ("O", "Ø"),
    ("aa", "å"),
    ("AA", "Å"),
    ("l", "ł"),
    ("L", "Ł"),
    ("i", "ı"),
    ("j", "ȷ"),
    ("textendash", "–"),
    ("textemdash", "—"),
    ("ldots", "…"),
    ("dots", "…"),
    ("textquoteleft", "‘"),
    ("textquoteright", "’"),
    ("S", "§"),
    ("P", "¶"),
    ("copyright", "©"),
    ("TeX", "TeX"),
    ("LaTeX", "LaTeX"),
    ("BibTeX", "BibTeX"),
];

/// Strips TeX markup: accents become Unicode letters, text commands keep
/// their argument, and grouping braces disappear.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTex;

impl TexConverter for PlainTex {
    fn convert(&self, tex: &str) -> String {
        let chars: Vec<char> = tex.chars().collect();
        let mut out = String::with_capacity(tex.len());
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '\\' => i = command(&chars, i, &mut out),
                '{' | '}' => i += 1,
                '~' => {
                    out.push('\u{a0}');
                    i += 1;
                }
                '-' if chars.get(i + 1) == Some(&'-') => {
                    if chars.get(i + 2) == Some(&'-') {
                        out.push('—');
                        i += 3;
                    } else {
                        out.push('–');
                        i += 2;
                    }
                }
                c if c.is_whitespace() => {
                    if !out.ends_with(' ') {
                        out.push(' ');
                    }
                    i += 1;
                }
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        out.trim().to_string()
    }
}

/// Handle the control sequence starting at `chars[start]` (a backslash) and
/// return the index just past it.
fn command(chars: &[char], start: usize, out: &mut String) -> usize {
    let Some(&c) = chars.get(start + 1) else {
        return start + 1;
    };

    match c {
        '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
            out.push(c);
            start + 2
        }
        '\\' | ',' | ' ' | ';' => {
            if !out.ends_with(' ') {
                out.push(' ');
            }
            start + 2
        }
        '\'' | '`' | '^' | '"' | '~' | '=' | '.' => accent(chars, c, start + 2, out),
        'c' | 'v' | 'u' | 'H' | 'r' | 'k'
            if !chars.get(start + 2).map_or(false, |n| n.is_ascii_alphabetic()) =>
        {
            accent(chars, c, start + 2, out)
        }
        c if c.is_ascii_alphabetic() => {
            let mut end = start + 1;
            while end < chars.len() && chars[end].is_ascii_alphabetic() {
                end += 1;
            }
            let name: String = chars[start + 1..end].iter().collect();
            if let Some((_, symbol)) = SYMBOLS.iter().find(|(n, _)| *n == name) {
                out.push_str(symbol);
            }
            // Control words swallow the spaces after them.
            while end < chars.len() && chars[end] == ' ' {
                end += 1;
            }
            end
        }
        // Discretionary hyphens, italic corrections and the like.
        _ => start + 2,
    }
}

fn accent(chars: &[char], mark: char, mut pos: usize, out: &mut String) -> usize {
    while pos < chars.len() && chars[pos] == ' ' {
        pos += 1;
    }

    let braced = chars.get(pos) == Some(&'{');
    if braced {
        pos += 1;
    }

    let base = match chars.get(pos) {
        // Dotless i and j.
        Some('\\') if matches!(chars.get(pos + 1), Some('i') | Some('j')) => {
            pos += 2;
            chars[pos - 1]
        }
        Some(&c) => {
            pos += 1;
            c
        }
        None => return pos,
    };

    if braced && chars.get(pos) == Some(&'}') {
        pos += 1;
    }

    out.push_str(&compose(mark, base));
    pos
}

fn compose(mark: char, base: char) -> String {
    let Some((_, table, combining)) = ACCENTS.iter().find(|(m, _, _)| *m == mark) else {
        return base.to_string();
    };

    let letters: Vec<char> = table.chars().collect();
    letters
        .chunks(2)
        .find(|pair| pair[0] == base)
        .map(|pair| pair[1].to_string())
        .unwrap_or_else(|| format!("{}{}", base, combining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plain(s: &str) -> String {
        PlainTex.convert(s)
    }

    #[test]
    fn test_braces_are_removed() {
        assert_eq!(plain("The {\\TeX}book"), "The TeXbook");
        assert_eq!(plain("{NASA} and {Friends}"), "NASA and Friends");
    }

    #[test]
    fn test_accents() {
        assert_eq!(plain("Schr\\\"{o}dinger"), "Schrödinger");
        assert_eq!(plain("{\\'e}cole"), "école");
        assert_eq!(plain("Dvo\\v{r}\\'ak"), "Dvořák");
        assert_eq!(plain("Gar\\c{c}on"), "Garçon");
        assert_eq!(plain("na\\\"{\\i}ve"), "naïve");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(plain("Stra\\ss e"), "Straße");
        assert_eq!(plain("Smith \\& Sons"), "Smith & Sons");
        assert_eq!(plain("100\\%"), "100%");
    }

    #[test]
    fn test_text_commands_keep_argument() {
        assert_eq!(plain("An \\emph{important} result"), "An important result");
        assert_eq!(plain("\\textbf{Bold}"), "Bold");
    }

    #[test]
    fn test_dashes_and_spacing() {
        assert_eq!(plain("1990--1995"), "1990–1995");
        assert_eq!(plain("yes---no"), "yes—no");
        assert_eq!(plain("  many \n  spaces "), "many spaces");
        assert_eq!(plain("Dr.~Who"), "Dr.\u{a0}Who");
    }

    #[test]
    fn test_unknown_accent_combination_uses_combining_mark() {
        assert_eq!(plain("\\'x"), "x\u{301}");
    }
}

//! Name list parsing.
//!
//! Names follow the BibTeX conventions: a list is separated by `and` at
//! brace depth zero, and each name is one of
//!
//! - `First von Last`
//! - `von Last, First`
//! - `von Last, Jr, First`
//!
//! where the `von` particle is made of words starting with a lower-case
//! letter. Braced groups are never split and never count as particles.

use super::TexConverter;
use crate::bibtex::RawEntry;
use crate::csl::{CslItem, Name};
use crate::options::BibOptions;

/// CSL name variables and the BibTeX fields they come from.
const ROLES: &[(&str, &str)] = &[
    ("author", "author"),
    ("container-author", "bookauthor"),
    ("translator", "translator"),
    ("director", "director"),
    ("editor", "editor"),
];

/// Fill the name variables of `item`.
pub fn convert_names(
    entry: &RawEntry,
    tex: &dyn TexConverter,
    options: &BibOptions,
    item: &mut CslItem,
) {
    let editor_is_director = entry
        .field("editortype")
        .map_or(false, |t| t.trim().eq_ignore_ascii_case("director"));

    for &(role, field) in ROLES {
        let Some(raw) = entry.field(field) else {
            continue;
        };
        let role = if role == "editor" && editor_is_director && item.director.is_none() {
            "director"
        } else {
            role
        };
        item.set_names(role, parse_name_list(raw, tex, options));
    }
}

/// Parse an `and`-separated list of names.
pub fn parse_name_list(raw: &str, tex: &dyn TexConverter, options: &BibOptions) -> Vec<Name> {
    let mut names = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in split_words(raw) {
        if word.eq_ignore_ascii_case("and") {
            push_name(&mut names, &current, tex, options);
            current.clear();
        } else {
            current.push(word);
        }
    }
    push_name(&mut names, &current, tex, options);
    names
}

fn push_name(names: &mut Vec<Name>, words: &[&str], tex: &dyn TexConverter, options: &BibOptions) {
    if words.is_empty() {
        return;
    }
    let text = words.join(" ");
    if text.eq_ignore_ascii_case("others") {
        names.push(Name::literal("others"));
    } else {
        names.push(parse_name(&text, tex, options));
    }
}

/// Parse a single name into its parts.
pub fn parse_name(text: &str, tex: &dyn TexConverter, options: &BibOptions) -> Name {
    let parts = split_commas(text);

    let (first, von, last, jr): (Vec<&str>, Vec<&str>, Vec<&str>, Vec<&str>) = match parts.as_slice()
    {
        [single] => {
            let words = split_words(single);
            let n = words.len();
            match words[..n.saturating_sub(1)].iter().position(|w| is_particle(w)) {
                Some(start) => {
                    let end = (start..n - 1)
                        .rev()
                        .find(|&i| is_particle(words[i]))
                        .unwrap_or(start);
                    (
                        words[..start].to_vec(),
                        words[start..=end].to_vec(),
                        words[end + 1..].to_vec(),
                        Vec::new(),
                    )
                }
                None if n > 0 => (
                    words[..n - 1].to_vec(),
                    Vec::new(),
                    words[n - 1..].to_vec(),
                    Vec::new(),
                ),
                None => Default::default(),
            }
        }
        [von_last, first] => {
            let (von, last) = split_von_last(von_last);
            (split_words(first), von, last, Vec::new())
        }
        [von_last, jr, rest @ ..] => {
            let (von, last) = split_von_last(von_last);
            let first = rest.iter().flat_map(|p| split_words(*p)).collect();
            (first, von, last, split_words(jr))
        }
        [] => Default::default(),
    };

    let join = |words: Vec<&str>| -> Option<String> {
        let text = tex.convert(&words.join(" "));
        (!text.is_empty()).then_some(text)
    };

    let particle = join(von);
    let suffix = join(jr);
    let mut name = Name {
        family: Some(tex.convert(&last.join(" "))),
        given: join(first),
        comma_suffix: (options.juniorcomma && suffix.is_some()).then_some(true),
        suffix,
        ..Default::default()
    };
    if options.useprefix {
        name.non_dropping_particle = particle;
    } else {
        name.dropping_particle = particle;
    }
    name
}

/// Split `von Last`: leading particle words, never including the last word.
fn split_von_last(text: &str) -> (Vec<&str>, Vec<&str>) {
    let words = split_words(text);
    let n = words.len();
    let von_len = words[..n.saturating_sub(1)]
        .iter()
        .take_while(|w| is_particle(w))
        .count();
    (words[..von_len].to_vec(), words[von_len..].to_vec())
}

/// A particle word starts with a lower-case letter. Braces and TeX
/// commands in front of the first letter are skipped, but a word opening
/// with a protected group like `{Barnes and Noble}` never counts.
fn is_particle(word: &str) -> bool {
    if word.starts_with('{') && !word.starts_with("{\\") {
        return false;
    }

    let mut chars = word.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '\\' => match chars.peek() {
                Some(n) if n.is_ascii_alphabetic() => {
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !n.is_ascii_alphabetic() {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    // Single-letter accents like \c or \v precede the deciding letter.
                    if name.len() > 1 {
                        return name.starts_with(|c: char| c.is_lowercase());
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            c if c.is_alphabetic() => return c.is_lowercase(),
            _ => {}
        }
    }
    false
}

/// Split on whitespace and `~` outside of braces.
fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        let separator = depth == 0 && (c.is_whitespace() || c == '~');
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if separator {
            if let Some(s) = start.take() {
                words.push(&text[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        words.push(&text[s..]);
    }
    words
}

/// Split on commas outside of braces, keeping empty parts.
fn split_commas(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts
}

//! Recursive-descent BibTeX scanner.
//!
//! Each `@directive` is parsed on its own: a failure inside one directive
//! becomes a warning record and scanning resumes at the next `@`, so one
//! malformed entry never hides the rest of the database.

use super::entry::{ParseWarning, RawEntry, Record};
use crate::error::ParseError;
use nom::{bytes::complete::take_while1, character::complete::multispace0, IResult};
use std::collections::HashMap;
use tracing::debug;

type Parsed<T> = std::result::Result<T, ParseError>;

/// Month abbreviations every BibTeX database can use as bare words.
const MONTH_MACROS: [(&str, &str); 12] = [
    ("jan", "1"),
    ("feb", "2"),
    ("mar", "3"),
    ("apr", "4"),
    ("may", "5"),
    ("jun", "6"),
    ("jul", "7"),
    ("aug", "8"),
    ("sep", "9"),
    ("oct", "10"),
    ("nov", "11"),
    ("dec", "12"),
];

/// Length of the source excerpt attached to warnings.
const CONTEXT_LEN: usize = 20;

/// Parse a BibTeX database into records.
pub fn parse_records(text: &str) -> Vec<Record> {
    let mut parser = Parser::new(text);
    let mut records = Vec::new();

    while parser.seek_directive() {
        let start = parser.pos;
        let result = parser.directive();
        records.append(&mut parser.pending);

        match result {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(err) => {
                let warning = parser.warning_here(&err);
                debug!(line = warning.line, "recovering from malformed BibTeX: {}", err);
                records.push(Record::Warning(warning));
                if parser.pos == start {
                    parser.pos += 1;
                }
            }
        }
    }

    records
}

/// Incremental line counter: only the text between the previous query and
/// the current one is scanned.
#[derive(Debug)]
struct LineCounter {
    pos: usize,
    line: usize,
}

impl LineCounter {
    fn new() -> Self {
        Self { pos: 0, line: 1 }
    }

    fn line_at(&mut self, text: &str, pos: usize) -> usize {
        if pos >= self.pos {
            self.line += text[self.pos..pos].matches('\n').count();
        } else {
            self.line -= text[pos..self.pos].matches('\n').count();
        }
        self.pos = pos;
        self.line
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    lines: LineCounter,
    macros: HashMap<String, String>,
    /// Non-fatal warnings raised inside the current directive.
    pending: Vec<Record>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        let macros = MONTH_MACROS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Self {
            text,
            pos: 0,
            lines: LineCounter::new(),
            macros,
            pending: Vec::new(),
        }
    }

    /// Move to the next `@`. Everything in between is ignored.
    fn seek_directive(&mut self) -> bool {
        match self.text[self.pos..].find('@') {
            Some(offset) => {
                self.pos += offset;
                true
            }
            None => {
                self.pos = self.text.len();
                false
            }
        }
    }

    fn directive(&mut self) -> Parsed<Option<Record>> {
        self.pos += 1;
        self.skip_ws();
        let name = self.lex(identifier).unwrap_or("").to_lowercase();
        self.skip_ws();

        let closer = match self.peek() {
            Some('{') => '}',
            Some('(') => ')',
            // A bare `@comment` comments out the rest of its line.
            _ if name == "comment" => return Ok(None),
            _ => return Err(ParseError::ExpectedOpen(name)),
        };
        self.pos += 1;

        match name.as_str() {
            "string" => {
                self.string_definition(closer)?;
                Ok(None)
            }
            "preamble" => Ok(Some(Record::Preamble(self.free_text(closer)?))),
            "comment" => Ok(Some(Record::Comment(self.free_text(closer)?))),
            _ => Ok(Some(Record::Entry(self.entry(name, closer)?))),
        }
    }

    fn string_definition(&mut self, closer: char) -> Parsed<()> {
        self.skip_ws();
        let name = self.lex(field_name).ok_or(ParseError::RunawayKey)?.to_lowercase();
        self.skip_ws();
        if !self.eat('=') {
            return Err(ParseError::ExpectedEquals(name));
        }
        self.skip_ws();
        let value = self.value()?;
        self.skip_ws();
        if !self.eat(closer) {
            return Err(ParseError::ExpectedClose(closer));
        }

        self.macros.insert(name, value);
        Ok(())
    }

    /// Read balanced text up to the directive's closer.
    fn free_text(&mut self, closer: char) -> Parsed<String> {
        let start = self.pos;
        let mut depth = 0usize;

        for (offset, c) in self.text[start..].char_indices() {
            if c == closer && depth == 0 {
                self.pos = start + offset + 1;
                return Ok(self.text[start..start + offset].trim().to_string());
            }
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                _ => {}
            }
        }

        self.pos = self.text.len();
        Err(ParseError::ExpectedClose(closer))
    }

    fn entry(&mut self, bibtype: String, closer: char) -> Parsed<RawEntry> {
        self.skip_ws();
        let key_pos = self.pos;
        let key = self.lex(entry_key).ok_or(ParseError::MissingKey)?.to_string();
        let line = self.line_at(key_pos);
        let mut entry = RawEntry::new(bibtype, key.clone(), line);

        self.skip_ws();
        match self.peek() {
            Some(',') => self.pos += 1,
            Some(c) if c == closer => {
                self.pos += 1;
                return Ok(entry);
            }
            _ => return Err(ParseError::ExpectedComma(key)),
        }

        loop {
            self.skip_ws();
            match self.peek() {
                Some(c) if c == closer => {
                    self.pos += 1;
                    return Ok(entry);
                }
                None => return Err(ParseError::ExpectedClose(closer)),
                _ => {}
            }

            let name = self.lex(field_name).ok_or(ParseError::RunawayKey)?.to_lowercase();
            self.skip_ws();
            if !self.eat('=') {
                return Err(ParseError::ExpectedEquals(name));
            }
            self.skip_ws();
            let value = self.value()?;
            entry.fields.insert(&name, value);

            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == closer => {}
                _ => return Err(ParseError::ExpectedClose(closer)),
            }
        }
    }

    /// `single_value ('#' single_value)*`
    fn value(&mut self) -> Parsed<String> {
        let mut value = self.single_value()?;
        loop {
            self.skip_ws();
            if !self.eat('#') {
                return Ok(value);
            }
            self.skip_ws();
            value.push_str(&self.single_value()?);
        }
    }

    fn single_value(&mut self) -> Parsed<String> {
        match self.peek() {
            Some('{') => self.braced(),
            Some('"') => self.quoted(),
            Some(_) => {
                let word_pos = self.pos;
                let word = self.lex(bare_word).ok_or(ParseError::MissingValue)?;
                Ok(self.expand_word(word, word_pos))
            }
            None => Err(ParseError::UnterminatedValue),
        }
    }

    fn expand_word(&mut self, word: &str, word_pos: usize) -> String {
        if word.chars().all(|c| c.is_ascii_digit()) {
            return word.to_string();
        }
        if let Some(value) = self.macros.get(&word.to_lowercase()) {
            return value.clone();
        }

        let line = self.line_at(word_pos);
        self.pending.push(Record::Warning(ParseWarning {
            line,
            message: ParseError::UnknownMacro(word.to_string()).to_string(),
        }));
        word.to_string()
    }

    /// Brace-delimited value; inner braces are kept verbatim.
    fn braced(&mut self) -> Parsed<String> {
        let start = self.pos + 1;
        let mut depth = 0usize;

        for (offset, c) in self.text[self.pos..].char_indices() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.pos + offset;
                        self.pos = end + 1;
                        return Ok(self.text[start..end].to_string());
                    }
                }
                _ => {}
            }
        }

        Err(ParseError::UnterminatedValue)
    }

    /// Quote-delimited value. Quotes inside braces or after a backslash do
    /// not terminate it.
    fn quoted(&mut self) -> Parsed<String> {
        let start = self.pos + 1;
        let mut depth = 0usize;
        let mut escaped = false;

        for (offset, c) in self.text[start..].char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                '"' if depth == 0 => {
                    let end = start + offset;
                    self.pos = end + 1;
                    return Ok(self.text[start..end].to_string());
                }
                _ => {}
            }
        }

        Err(ParseError::UnterminatedValue)
    }

    fn warning_here(&mut self, err: &ParseError) -> ParseWarning {
        let pos = self.pos.min(self.text.len());
        let context: String = self.text[pos..]
            .chars()
            .take(CONTEXT_LEN)
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();

        ParseWarning {
            line: self.line_at(pos),
            message: format!("{} (at \"{}\")", err, context),
        }
    }

    fn line_at(&mut self, pos: usize) -> usize {
        self.lines.line_at(self.text, pos)
    }

    fn lex<O>(&mut self, mut token: impl FnMut(&'a str) -> IResult<&'a str, O>) -> Option<O> {
        let input = &self.text[self.pos..];
        match token(input) {
            Ok((rest, out)) => {
                self.pos += input.len() - rest.len();
                Some(out)
            }
            Err(_) => None,
        }
    }

    fn skip_ws(&mut self) {
        self.lex(whitespace);
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

fn entry_key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || "+_:?./[]-".contains(c))(input)
}

fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || "_-:.+/".contains(c))(input)
}

fn bare_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || "_-:./+'".contains(c))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibtex::entry::write_entry;
    use pretty_assertions::assert_eq;

    fn entries(records: &[Record]) -> Vec<&RawEntry> {
        records
            .iter()
            .filter_map(|r| match r {
                Record::Entry(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    fn warnings(records: &[Record]) -> Vec<&ParseWarning> {
        records
            .iter()
            .filter_map(|r| match r {
                Record::Warning(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_parse_simple_entry() {
        let input = r#"
@Article{Knuth1984,
    author = {Donald E. Knuth},
    Title = "Literate Programming",
    journal = {The Computer Journal},
    year = 1984,
    pages = {97--111}
}
"#;
        let records = parse_records(input);
        let entries = entries(&records);
        assert_eq!(entries.len(), 1);

        let entry = entries[0];
        assert_eq!(entry.bibtype, "article");
        assert_eq!(entry.key, "Knuth1984");
        assert_eq!(entry.line, 2);
        assert_eq!(entry.fields.get("title"), Some("Literate Programming"));
        assert_eq!(entry.fields.get("year"), Some("1984"));
        assert_eq!(entry.fields.get("pages"), Some("97--111"));
    }

    #[test]
    fn test_parenthesized_entry_and_trailing_comma() {
        let records = parse_records("@book(k, title = {T}, )");
        let entries = entries(&records);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].fields.get("title"), Some("T"));
        assert!(warnings(&records).is_empty());
    }

    #[test]
    fn test_nested_braces_are_verbatim() {
        let records = parse_records("@misc{k, title = {The {DNA} of {\\TeX{}}}}");
        assert_eq!(
            entries(&records)[0].fields.get("title"),
            Some("The {DNA} of {\\TeX{}}")
        );
    }

    #[test]
    fn test_quoted_value_with_escaped_quote() {
        let records = parse_records(r#"@misc{k, note = "say \"hi\" {"}"}"#);
        assert_eq!(
            entries(&records)[0].fields.get("note"),
            Some(r#"say \"hi\" {"}"#)
        );
    }

    #[test]
    fn test_string_macros_and_concatenation() {
        let input = r#"
@String{ acm = "ACM Press" }
@STRING(ny = {New York})
@book{k, publisher = acm # ", " # NY, month = aug, year = 2001}
"#;
        let records = parse_records(input);
        let entry = entries(&records)[0];
        assert_eq!(entry.fields.get("publisher"), Some("ACM Press, New York"));
        assert_eq!(entry.fields.get("month"), Some("8"));
        assert!(warnings(&records).is_empty());
    }

    #[test]
    fn test_unknown_macro_warns_and_falls_back() {
        let records = parse_records("@misc{k,\n  publisher = nowhere}");
        let entry = entries(&records)[0];
        assert_eq!(entry.fields.get("publisher"), Some("nowhere"));

        let warnings = warnings(&records);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 2);
        assert!(warnings[0].message.contains("nowhere"));
    }

    #[test]
    fn test_recovery_after_malformed_entry() {
        let input = "@article{bad,\n  title {Missing equals}\n}\n\n@book{good, title = {Fine}}\n";
        let records = parse_records(input);

        let entries = entries(&records);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "good");
        assert_eq!(entries[0].line, 5);

        let warnings = warnings(&records);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 2);
        assert!(warnings[0].message.contains("expected '='"));
        assert!(warnings[0].message.contains("{Missing equals}"));
    }

    #[test]
    fn test_unterminated_value_does_not_abort() {
        let input = "@misc{a, title = {open\n@misc{b, title = {ok}}";
        let records = parse_records(input);
        assert!(!warnings(&records).is_empty());
    }

    #[test]
    fn test_preamble_and_comment_records() {
        let input = "@preamble{ \"\\newcommand{\\x}{y}\" }\n@comment{ not { an } entry }\n@comment this line is ignored\n";
        let records = parse_records(input);
        assert_eq!(
            records,
            vec![
                Record::Preamble("\"\\newcommand{\\x}{y}\"".to_string()),
                Record::Comment("not { an } entry".to_string()),
            ]
        );
    }

    #[test]
    fn test_text_outside_entries_is_ignored() {
        let input = "This file was exported.\n% comment\n@misc{k, year = 2000}\ntrailing";
        let records = parse_records(input);
        assert_eq!(entries(&records).len(), 1);
        assert!(warnings(&records).is_empty());
    }

    #[test]
    fn test_key_only_entry() {
        let records = parse_records("@misc{lonely}");
        let entries = entries(&records);
        assert_eq!(entries[0].key, "lonely");
        assert!(entries[0].fields.is_empty());
    }

    #[test]
    fn test_line_counter_moves_both_ways() {
        let text = "a\nb\nc\nd";
        let mut lines = LineCounter::new();
        assert_eq!(lines.line_at(text, 6), 4);
        assert_eq!(lines.line_at(text, 2), 2);
        assert_eq!(lines.line_at(text, 0), 1);
    }

    #[test]
    fn test_reparse_of_written_entry_is_stable() {
        let input = r#"@inproceedings{p1, author = "A. B{\"o}hm and C. Dee", title = {On {Things}}, year = 1999 # "a"}"#;
        let first = parse_records(input);
        let entry = entries(&first)[0].clone();

        let second = parse_records(&write_entry(&entry));
        let reparsed = entries(&second)[0];
        assert_eq!(reparsed.fields, entry.fields);
        assert_eq!(reparsed.bibtype, entry.bibtype);
        assert_eq!(reparsed.key, entry.key);
    }
}

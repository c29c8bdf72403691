//! Output hooks.
//!
//! Rendered citations are turned into markup by a table of named
//! functions. Formatting features look up `@attribute/value` keys, links
//! use `@URL/true` and `@DOI/true`, and plain text goes through
//! `text_escape`. The default table emits Madoko markup.

use super::output::{LinkKind, RichText};
use std::collections::HashMap;
use std::fmt;

/// A hook receives the already rendered content and an optional argument
/// (the link target for `@URL`/`@DOI`, the language for `bibstart`).
pub type Hook = Box<dyn Fn(&str, Option<&str>) -> String + Send + Sync>;

pub struct HookTable {
    hooks: HashMap<String, Hook>,
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.hooks.keys().collect();
        keys.sort();
        f.debug_struct("HookTable").field("hooks", &keys).finish()
    }
}

impl Default for HookTable {
    fn default() -> Self {
        Self::madoko()
    }
}

fn span(attrs: &'static str) -> Hook {
    Box::new(move |s, _| format!("[{}]{{{}}}", s, attrs))
}

fn wrap(open: &'static str, close: &'static str) -> Hook {
    Box::new(move |s, _| format!("{}{}{}", open, s, close))
}

fn identity() -> Hook {
    Box::new(|s, _| s.to_string())
}

impl HookTable {
    /// A table without any hooks: every lookup returns its content.
    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// The Madoko markup hooks.
    pub fn madoko() -> Self {
        let mut table = Self::empty();

        table.set_hook("@font-style/italic", wrap("_", "_"));
        table.set_hook("@font-style/oblique", wrap("_", "_"));
        table.set_hook("@font-style/normal", span("font-style=normal"));

        table.set_hook("@font-variant/small-caps", span("font-variant=small-caps"));
        table.set_hook("@font-variant/normal", span("font-variant=normal"));

        table.set_hook("@font-weight/bold", wrap("**", "**"));
        table.set_hook("@font-weight/light", span("font-weight=light"));
        table.set_hook("@font-weight/normal", span("font-weight=normal"));

        table.set_hook("@text-decoration/underline", span("text-decoration=underline"));
        table.set_hook("@text-decoration/none", identity());

        table.set_hook("@vertical-align/sup", wrap("^", "^"));
        table.set_hook("@vertical-align/sub", wrap("~", "~"));
        table.set_hook("@vertical-align/baseline", identity());

        table.set_hook("@quotes/true", wrap("&ldquo;", "&rdquo;"));
        table.set_hook("@quotes/inner", wrap("&lsquo;", "&rsquo;"));

        table.set_hook("@display/block", span(".bib-block"));
        table.set_hook("@display/left-margin", span(".bib-left-margin"));
        table.set_hook("@display/right-inline", span(".bib-right-inline"));
        table.set_hook("@display/indent", span(".bib-indent"));

        table.set_hook(
            "@URL/true",
            Box::new(|s, url| format!("[{}]({})", s, url.unwrap_or(s))),
        );
        table.set_hook(
            "@DOI/true",
            Box::new(|s, doi| format!("[{}](https://doi.org/{})", s, doi.unwrap_or(s))),
        );

        table.set_hook("text_escape", Box::new(|s, _| escape_markdown(s)));
        table.set_hook(
            "bibstart",
            Box::new(|_, lang| match lang {
                Some(lang) if !lang.is_empty() => format!(
                    "~ begin bibliography {{ data-lang=\"{}\" }}",
                    escape_attribute(lang)
                ),
                _ => "~ begin bibliography".to_string(),
            }),
        );
        table.set_hook("bibend", Box::new(|_, _| "~ end bibliography".to_string()));

        table
    }

    /// Install or replace a hook.
    pub fn set_hook(&mut self, key: impl Into<String>, hook: Hook) {
        self.hooks.insert(key.into(), hook);
    }

    /// Install or replace a hook from a closure.
    pub fn set<F>(&mut self, key: impl Into<String>, hook: F)
    where
        F: Fn(&str, Option<&str>) -> String + Send + Sync + 'static,
    {
        self.set_hook(key, Box::new(hook));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.hooks.contains_key(key)
    }

    /// Run the hook for `key`, or return `content` unchanged if there is
    /// none.
    pub fn apply(&self, key: &str, content: &str, arg: Option<&str>) -> String {
        match self.hooks.get(key) {
            Some(hook) => hook(content, arg),
            None => content.to_string(),
        }
    }

    pub fn escape(&self, text: &str) -> String {
        self.apply("text_escape", text, None)
    }

    pub fn bibstart(&self, lang: Option<&str>) -> String {
        self.apply("bibstart", "", lang)
    }

    pub fn bibend(&self) -> String {
        self.apply("bibend", "", None)
    }

    /// Turn a rendered citation into markup.
    pub fn render(&self, text: &RichText) -> String {
        let mut out = String::new();
        self.render_into(text, 0, &mut out);
        out
    }

    fn render_into(&self, text: &RichText, quote_depth: usize, out: &mut String) {
        match text {
            RichText::Null => {}
            RichText::Text(s) => out.push_str(&self.escape(s)),
            RichText::Seq(children) => {
                for child in children {
                    self.render_into(child, quote_depth, out);
                }
            }
            RichText::Styled { feature, children } => {
                let quoted = feature.attribute == "quotes";
                let depth = if quoted { quote_depth + 1 } else { quote_depth };
                let mut inner = String::new();
                for child in children {
                    self.render_into(child, depth, &mut inner);
                }
                // Quotes nested inside quotes alternate to the inner style.
                let key = if quoted && quote_depth % 2 == 1 {
                    "@quotes/inner".to_string()
                } else {
                    feature.key()
                };
                out.push_str(&self.apply(&key, &inner, None));
            }
            RichText::Link {
                kind,
                target,
                children,
            } => {
                let mut inner = String::new();
                for child in children {
                    self.render_into(child, quote_depth, &mut inner);
                }
                let key = match kind {
                    LinkKind::Url => "@URL/true",
                    LinkKind::Doi => "@DOI/true",
                };
                out.push_str(&self.apply(key, &inner, Some(target)));
            }
        }
    }
}

/// Backslash-escape the characters Madoko treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '[' | ']' | '<' | '>' | '~' | '^' | '`' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a value for a Madoko attribute list: `\` and `"` are
/// backslash-escaped and newlines become `&nl;`.
pub fn escape_attribute(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("\r\n", "&nl;")
        .replace('\n', "&nl;")
}

//! Rich-text output of the citation processor.
//!
//! Processors produce [`RichText`] trees. Formatting is kept as
//! [`Feature`] nodes keyed the same way as the hook table, so the final
//! markup is decided entirely by the hooks.

use super::style::Formatting;

/// One formatting feature, e.g. `font-style` = `italic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub attribute: &'static str,
    pub value: String,
}

impl Feature {
    pub fn new(attribute: &'static str, value: impl Into<String>) -> Self {
        Self {
            attribute,
            value: value.into(),
        }
    }

    /// The hook table key, e.g. `@font-style/italic`.
    pub fn key(&self) -> String {
        format!("@{}/{}", self.attribute, self.value)
    }
}

/// What a link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Url,
    Doi,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RichText {
    #[default]
    Null,
    Text(String),
    Styled {
        feature: Feature,
        children: Vec<RichText>,
    },
    Link {
        kind: LinkKind,
        target: String,
        children: Vec<RichText>,
    },
    Seq(Vec<RichText>),
}

impl RichText {
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            RichText::Null
        } else {
            RichText::Text(s)
        }
    }

    /// A sequence with null children dropped.
    pub fn seq(children: Vec<RichText>) -> Self {
        let mut children: Vec<_> = children.into_iter().filter(|c| !c.is_null()).collect();
        match children.len() {
            0 => RichText::Null,
            1 => children.remove(0),
            _ => RichText::Seq(children),
        }
    }

    pub fn styled(feature: Feature, child: RichText) -> Self {
        if child.is_null() {
            RichText::Null
        } else {
            RichText::Styled {
                feature,
                children: vec![child],
            }
        }
    }

    pub fn link(kind: LinkKind, target: impl Into<String>, child: RichText) -> Self {
        if child.is_null() {
            RichText::Null
        } else {
            RichText::Link {
                kind,
                target: target.into(),
                children: vec![child],
            }
        }
    }

    /// Join non-null parts with `delimiter`.
    pub fn join(parts: Vec<RichText>, delimiter: &str) -> Self {
        let mut out = Vec::new();
        for part in parts.into_iter().filter(|p| !p.is_null()) {
            if !out.is_empty() && !delimiter.is_empty() {
                out.push(RichText::Text(delimiter.to_string()));
            }
            out.push(part);
        }
        RichText::seq(out)
    }

    pub fn is_null(&self) -> bool {
        match self {
            RichText::Null => true,
            RichText::Text(s) => s.is_empty(),
            RichText::Seq(children) => children.iter().all(RichText::is_null),
            RichText::Styled { children, .. } | RichText::Link { children, .. } => {
                children.iter().all(RichText::is_null)
            }
        }
    }

    /// The text content without any formatting.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            RichText::Null => {}
            RichText::Text(s) => out.push_str(s),
            RichText::Seq(children)
            | RichText::Styled { children, .. }
            | RichText::Link { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Apply `f` to every text leaf; `first` is true for the first
    /// non-empty leaf only.
    pub fn map_text(self, f: &mut dyn FnMut(&str, bool) -> String) -> Self {
        let mut first = true;
        self.map_text_inner(f, &mut first)
    }

    fn map_text_inner(self, f: &mut dyn FnMut(&str, bool) -> String, first: &mut bool) -> Self {
        match self {
            RichText::Text(s) => {
                let mapped = f(&s, *first);
                if !s.is_empty() {
                    *first = false;
                }
                RichText::Text(mapped)
            }
            RichText::Seq(children) => RichText::Seq(map_all(children, f, first)),
            RichText::Styled { feature, children } => RichText::Styled {
                feature,
                children: map_all(children, f, first),
            },
            RichText::Link {
                kind,
                target,
                children,
            } => RichText::Link {
                kind,
                target,
                children: map_all(children, f, first),
            },
            RichText::Null => RichText::Null,
        }
    }

    /// Wrap in the formatting of a CSL rendering element: text case and
    /// periods on the content, then quotes and font features, then the
    /// affixes, and the display mode outermost.
    pub fn formatted(self, formatting: &Formatting) -> Self {
        if self.is_null() {
            return RichText::Null;
        }

        let mut inner = self;
        if formatting.strip_periods {
            inner = inner.map_text(&mut |s, _| s.replace('.', ""));
        }
        if let Some(case) = formatting.text_case.as_deref() {
            inner = apply_text_case(inner, case);
        }
        if formatting.quotes {
            inner = RichText::styled(Feature::new("quotes", "true"), inner);
        }
        for (attribute, value) in formatting.font_features() {
            inner = RichText::styled(Feature::new(attribute, value), inner);
        }

        let affixed = RichText::seq(vec![
            RichText::text(formatting.prefix.clone().unwrap_or_default()),
            inner,
            RichText::text(formatting.suffix.clone().unwrap_or_default()),
        ]);

        match formatting.display.as_deref() {
            Some(display) => RichText::styled(Feature::new("display", display), affixed),
            None => affixed,
        }
    }
}

fn map_all(
    children: Vec<RichText>,
    f: &mut dyn FnMut(&str, bool) -> String,
    first: &mut bool,
) -> Vec<RichText> {
    children
        .into_iter()
        .map(|child| child.map_text_inner(f, first))
        .collect()
}

fn apply_text_case(text: RichText, case: &str) -> RichText {
    match case {
        "uppercase" => text.map_text(&mut |s, _| s.to_uppercase()),
        "lowercase" => text.map_text(&mut |s, _| s.to_lowercase()),
        "capitalize-first" | "sentence" => text.map_text(&mut |s, first| {
            if first {
                capitalize(s)
            } else {
                s.to_string()
            }
        }),
        "capitalize-all" | "title" => text.map_text(&mut |s, _| {
            s.split(' ').map(capitalize).collect::<Vec<_>>().join(" ")
        }),
        _ => text,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_skips_null() {
        let joined = RichText::join(
            vec![RichText::text("a"), RichText::Null, RichText::text("b")],
            ", ",
        );
        assert_eq!(joined.plain_text(), "a, b");
        assert!(RichText::join(vec![RichText::Null], ", ").is_null());
    }

    #[test]
    fn test_formatted_order() {
        let formatting = Formatting {
            font_style: Some("italic".into()),
            prefix: Some("(".into()),
            suffix: Some(")".into()),
            quotes: true,
            ..Default::default()
        };
        let out = RichText::text("x").formatted(&formatting);
        assert_eq!(
            out,
            RichText::Seq(vec![
                RichText::Text("(".into()),
                RichText::Styled {
                    feature: Feature::new("font-style", "italic"),
                    children: vec![RichText::Styled {
                        feature: Feature::new("quotes", "true"),
                        children: vec![RichText::Text("x".into())],
                    }],
                },
                RichText::Text(")".into()),
            ])
        );
    }

    #[test]
    fn test_null_stays_null_when_formatted() {
        let formatting = Formatting {
            prefix: Some("[".into()),
            ..Default::default()
        };
        assert!(RichText::Null.formatted(&formatting).is_null());
    }

    #[test]
    fn test_text_case() {
        let formatting = Formatting {
            text_case: Some("capitalize-first".into()),
            ..Default::default()
        };
        let out = RichText::seq(vec![RichText::text("edited"), RichText::text(" by")])
            .formatted(&formatting);
        assert_eq!(out.plain_text(), "Edited by");
    }
}

//! `{field}` placeholder templates for URLs and header values.
//!
//! Syntax:
//! - `{name}` is replaced with the value of `name`
//! - `{{` and `}}` produce literal braces
//!
//! Templates are parsed once and rendered many times.

use crate::types::{scalar_text, Item};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("field '{field}' referenced by template '{template}' is missing")]
    MissingField { field: String, template: String },

    #[error("unclosed '{{' at byte {position} in template '{template}'")]
    Unclosed { position: usize, template: String },

    #[error("unmatched '}}' at byte {position} in template '{template}'")]
    UnmatchedClose { position: usize, template: String },

    #[error("empty placeholder at byte {position} in template '{template}'")]
    EmptyPlaceholder { position: usize, template: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed placeholder template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, nc) in chars.by_ref() {
                        if nc == '}' {
                            closed = true;
                            break;
                        }
                        name.push(nc);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed {
                            position: pos,
                            template: source.clone(),
                        });
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder {
                            position: pos,
                            template: source.clone(),
                        });
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(TemplateError::UnmatchedClose {
                            position: pos,
                            template: source.clone(),
                        });
                    }
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// The template text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field names referenced by the template, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// True if the template has no placeholders.
    pub fn is_static(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Render using an arbitrary lookup.
    pub fn render_with<F>(&self, lookup: F) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        return Err(TemplateError::MissingField {
                            field: name.clone(),
                            template: self.source.clone(),
                        })
                    }
                },
            }
        }
        Ok(out)
    }

    /// Render with an item's field values.
    ///
    /// A null field (e.g. an empty CSV cell) counts as missing, so it can
    /// never collapse a path segment like `/users//fees/1`.
    pub fn render(&self, item: &Item) -> Result<String, TemplateError> {
        self.render_with(|field| {
            item.get(field)
                .filter(|value| !value.is_null())
                .map(scalar_text)
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Template::parse(s)
    }
}

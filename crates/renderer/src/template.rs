//! Placeholder template compilation

use std::borrow::Cow;

use contracts::TemplateError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Output escaping applied to substituted values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    None,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Compile `source`
    ///
    /// # Errors
    /// `TemplateError::Syntax` for an unclosed or empty placeholder, or a
    /// field name containing whitespace or braces.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let inner_start = start + OPEN.len();
            let Some(len) = rest[inner_start..].find(CLOSE) else {
                return Err(TemplateError::Syntax {
                    offset: offset + start,
                    reason: "unclosed placeholder".to_string(),
                });
            };

            let field = rest[inner_start..inner_start + len].trim();
            if field.is_empty() {
                return Err(TemplateError::Syntax {
                    offset: offset + start,
                    reason: "empty placeholder".to_string(),
                });
            }
            if field.contains(|c: char| c.is_whitespace() || c == '{' || c == '}') {
                return Err(TemplateError::Syntax {
                    offset: offset + start,
                    reason: format!("invalid field name '{field}'"),
                });
            }
            segments.push(Segment::Field(field.to_string()));

            let consumed = inner_start + len + CLOSE.len();
            offset += consumed;
            rest = &rest[consumed..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Field names referenced by the template, in order of appearance
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Substitute every field through `lookup`
    ///
    /// # Errors
    /// `TemplateError::MissingField` for the first field `lookup` cannot resolve.
    pub fn render<'a, F>(&self, lookup: F, escape: Escape) -> Result<String, TemplateError>
    where
        F: Fn(&str) -> Option<Cow<'a, str>>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => {
                    let value =
                        lookup(name).ok_or_else(|| TemplateError::MissingField(name.clone()))?;
                    match escape {
                        Escape::None => out.push_str(&value),
                        Escape::Html => out.push_str(&escape_html(&value)),
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Escape `& < > " '` for HTML text and attribute contexts
pub fn escape_html(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

//! Printf-style number templates with named fields
//!
//! Formats like `"%(year)d-%(number)04d"` are parsed once, at configuration
//! time, into a [`NumberTemplate`]. Rendering takes a name → value mapping
//! and fails on any field the mapping does not provide, so a bad template is
//! caught before a counter value is ever consumed.
//!
//! Supported syntax: `%(name)d`, `%(name)s`, an optional zero-pad width as
//! in `%(number)04d`, and `%%` for a literal percent sign.

use sequent_core::error::{Result, SequentError};
use std::collections::HashMap;
use std::fmt::Write as _;

/// A value substituted into a template field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Conversion {
    Decimal,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field {
        name: String,
        width: usize,
        zero_pad: bool,
        conversion: Conversion,
    },
}

/// A parsed number format template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl NumberTemplate {
    /// Parse a template string.
    ///
    /// Returns [`SequentError::Format`] on unterminated or malformed field
    /// specifiers.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            match chars.peek() {
                Some('%') => {
                    chars.next();
                    literal.push('%');
                }
                Some('(') => {
                    chars.next();
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Self::parse_field(raw, &mut chars)?);
                }
                _ => {
                    return Err(SequentError::Format(format!(
                        "expected '%%' or '%(name)' in template '{raw}'"
                    )));
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    fn parse_field(
        raw: &str,
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    ) -> Result<Segment> {
        let mut name = String::new();
        loop {
            match chars.next() {
                Some(')') => break,
                Some(c) => name.push(c),
                None => {
                    return Err(SequentError::Format(format!(
                        "unterminated field name in template '{raw}'"
                    )));
                }
            }
        }
        if name.is_empty() {
            return Err(SequentError::Format(format!(
                "empty field name in template '{raw}'"
            )));
        }

        let zero_pad = chars.peek() == Some(&'0');
        if zero_pad {
            chars.next();
        }

        let mut width = 0usize;
        while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
            width = width * 10 + d as usize;
            chars.next();
        }

        let conversion = match chars.next() {
            Some('d') => Conversion::Decimal,
            Some('s') => Conversion::Text,
            other => {
                return Err(SequentError::Format(format!(
                    "expected conversion 'd' or 's' after field '{name}' in template '{raw}', got {other:?}"
                )));
            }
        };

        Ok(Segment::Field {
            name,
            width,
            zero_pad,
            conversion,
        })
    }

    /// The field names this template references, in order of appearance
    pub fn fields(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Field { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// The original template string
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Render the template with the given field values.
    ///
    /// Fails with [`SequentError::Format`] if a referenced field is missing
    /// or a `d` conversion is given a non-integer value.
    pub fn render(&self, values: &HashMap<&str, TemplateValue>) -> Result<String> {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field {
                    name,
                    width,
                    zero_pad,
                    conversion,
                } => {
                    let width = *width;
                    let value = values.get(name.as_str()).ok_or_else(|| {
                        SequentError::Format(format!(
                            "template '{}' references unknown field '{name}'",
                            self.raw
                        ))
                    })?;

                    match (conversion, value) {
                        (Conversion::Decimal, TemplateValue::Int(v)) => {
                            if *zero_pad {
                                let _ = write!(out, "{v:0width$}");
                            } else {
                                let _ = write!(out, "{v:width$}");
                            }
                        }
                        (Conversion::Decimal, TemplateValue::Str(_)) => {
                            return Err(SequentError::Format(format!(
                                "field '{name}' in template '{}' expects an integer",
                                self.raw
                            )));
                        }
                        (Conversion::Text, TemplateValue::Str(v)) => {
                            let _ = write!(out, "{v:width$}");
                        }
                        (Conversion::Text, TemplateValue::Int(v)) => {
                            let _ = write!(out, "{v:width$}");
                        }
                    }
                }
            }
        }

        Ok(out)
    }
}

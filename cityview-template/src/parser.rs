use crate::{TemplateContext, format_value};
use serde_json::{Map, Value};
use std::borrow::Cow;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const DATA_PREFIX: &str = "data.";

/// What a `{{ }}` placeholder refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder<'a> {
    EntityId,
    EntityType,
    /// Dotted path below `data.`.
    Data(&'a str),
    /// Renders empty.
    Unknown(&'a str),
}

impl<'a> Placeholder<'a> {
    fn classify(inner: &'a str) -> Self {
        match inner.trim() {
            "entityId" => Self::EntityId,
            "entityType" => Self::EntityType,
            other => match other.strip_prefix(DATA_PREFIX) {
                Some(path) => Self::Data(path),
                None => Self::Unknown(other),
            },
        }
    }

    fn render<'c>(&self, ctx: &'c TemplateContext) -> Cow<'c, str> {
        match self {
            Self::EntityId => Cow::Borrowed(&ctx.entity_id),
            Self::EntityType => Cow::Borrowed(&ctx.entity_type),
            Self::Data(path) => get_nested_value(&ctx.data, path)
                .map_or(Cow::Borrowed(""), |value| Cow::Owned(format_value(value))),
            Self::Unknown(_) => Cow::Borrowed(""),
        }
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Placeholder(Placeholder<'a>),
}

/// A template split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'a> {
    segments: Vec<Segment<'a>>,
}

impl<'a> Template<'a> {
    /// Single pass over the source. A `{{` opens a placeholder only when it is
    /// followed by at least one character other than `}` and then `}}`;
    /// otherwise it is literal text.
    pub fn parse(source: &'a str) -> Self {
        let mut segments = Vec::new();
        let mut text_start = 0;
        let mut cursor = 0;

        while let Some(offset) = source[cursor..].find(OPEN) {
            let open = cursor + offset;
            let inner_start = open + OPEN.len();
            let inner_len = source[inner_start..].find('}').unwrap_or(0);
            let close = inner_start + inner_len;

            if inner_len > 0 && source[close..].starts_with(CLOSE) {
                if open > text_start {
                    segments.push(Segment::Text(&source[text_start..open]));
                }
                segments.push(Segment::Placeholder(Placeholder::classify(
                    &source[inner_start..close],
                )));
                cursor = close + CLOSE.len();
                text_start = cursor;
            } else {
                cursor = open + 1;
            }
        }
        if text_start < source.len() {
            segments.push(Segment::Text(&source[text_start..]));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder<'a>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(p) => Some(p),
            Segment::Text(_) => None,
        })
    }

    pub fn render(&self, ctx: &TemplateContext) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(p) => out.push_str(&p.render(ctx)),
            }
        }
        out
    }
}

/// Parses and renders in one step.
pub fn parse_template(template: &str, ctx: &TemplateContext) -> String {
    if template.is_empty() {
        return String::new();
    }
    Template::parse(template).render(ctx)
}

/// Walks `path` (dot separated) down from `data`. Arrays are indexed by
/// numeric segments. `None` on a missing key or a scalar in the middle.
pub fn get_nested_value<'v>(data: &'v Map<String, Value>, path: &str) -> Option<&'v Value> {
    let mut keys = path.split('.');
    let mut current = data.get(keys.next()?)?;
    for key in keys {
        current = match current {
            Value::Object(obj) => obj.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

//! Placeholder parsing and name mapping
//!
//! Template bodies and tool schema strings are compiled once into literal and
//! placeholder segments. A placeholder is `{{ name }}` (whitespace inside the
//! braces is allowed); a backslash right before the opening braces escapes the
//! marker, which then renders literally without the backslash.

use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\?)\{\{\s*([\w-]+)\s*\}\}").expect("placeholder pattern is valid"));

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("separator pattern is valid"));

static ACRONYM_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("acronym pattern is valid"));

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel pattern is valid"));

/// Prefix for mapped names that would otherwise start with a digit
pub const DIGIT_PREFIX: &str = "p_";

/// Whether a string contains at least one marker (escaped or not)
pub fn contains_marker(text: &str) -> bool {
    PLACEHOLDER_PATTERN.is_match(text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, raw: String },
}

/// A string compiled into literal and placeholder segments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledText {
    segments: Vec<Segment>,
}

impl CompiledText {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut last = 0;

        for caps in PLACEHOLDER_PATTERN.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            literal.push_str(&text[last..whole.start()]);
            last = whole.end();

            let escaped = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            if escaped {
                // drop the backslash, keep the marker text
                literal.push_str(&whole.as_str()[1..]);
                continue;
            }

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            segments.push(Segment::Placeholder {
                name: name.to_string(),
                raw: whole.as_str().to_string(),
            });
        }

        literal.push_str(&text[last..]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    /// Unique placeholder names in first-occurrence order
    pub fn placeholder_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder { name, .. } = segment
                && !names.iter().any(|n| n == name)
            {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn has_placeholders(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Placeholder { .. }))
    }

    /// Concatenate segments, substituting placeholders by source name
    ///
    /// Values are inserted literally and never re-scanned. A placeholder the
    /// lookup does not know keeps its original marker text.
    pub fn render<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, raw } => match lookup(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(raw),
                },
            }
        }
        out
    }
}

/// Convert a source-side name into identifier casing
///
/// `name-1` becomes `name_1`, `maxTokens` becomes `max_tokens`. A result that
/// would start with a digit gets the `p_` prefix; a name with no alphanumeric
/// characters maps to the empty string.
pub fn to_snake_case(name: &str) -> String {
    let spaced = NON_ALPHANUMERIC.replace_all(name, " ");
    let joined = spaced.trim().replace(' ', "_");
    let split = ACRONYM_BOUNDARY.replace_all(&joined, "${1}_${2}");
    let split = CAMEL_BOUNDARY.replace_all(&split, "${1}_${2}");
    let snake = split.trim_matches('_').to_lowercase();
    if snake.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", DIGIT_PREFIX, snake)
    } else {
        snake
    }
}

/// Why a name map could not be built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMapError {
    /// Two distinct source names map to the same mapped name
    Collision { first: String, second: String, mapped: String },
    /// A source name maps to nothing usable
    Empty { source: String },
}

/// Ordered bijection between source names and mapped names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameMap {
    entries: Vec<(String, String)>,
}

impl NameMap {
    /// Build a map in declaration order, rejecting collisions
    ///
    /// Repeated source names are kept once.
    pub fn build<I, S>(names: I, map: impl Fn(&str) -> String) -> Result<Self, NameMapError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for name in names {
            let source = name.as_ref();
            if entries.iter().any(|(s, _)| s == source) {
                continue;
            }
            let mapped = map(source);
            if mapped.is_empty() {
                return Err(NameMapError::Empty {
                    source: source.to_string(),
                });
            }
            if let Some((first, _)) = entries.iter().find(|(_, m)| *m == mapped) {
                return Err(NameMapError::Collision {
                    first: first.clone(),
                    second: source.to_string(),
                    mapped,
                });
            }
            entries.push((source.to_string(), mapped));
        }
        Ok(Self { entries })
    }

    /// Build with the standard snake case mapping
    pub fn snake<I, S>(names: I) -> Result<Self, NameMapError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::build(names, to_snake_case)
    }

    pub fn mapped_for(&self, source: &str) -> Option<&str> {
        self.entries.iter().find(|(s, _)| s == source).map(|(_, m)| m.as_str())
    }

    pub fn source_for(&self, mapped: &str) -> Option<&str> {
        self.entries.iter().find(|(_, m)| m == mapped).map(|(s, _)| s.as_str())
    }

    /// (source, mapped) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, m)| (s.as_str(), m.as_str()))
    }

    pub fn mapped_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, m)| m.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

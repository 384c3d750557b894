//! Context path segments.
//!
//! A segment is `name`, `name[index]` or `name[identifier]`: `content[2]`,
//! `element[section]`. Index and identifier are mutually exclusive: a bracket
//! holding digits that fit a `usize` is an index, any other non-empty bracket
//! is an identifier.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKey {
    None,
    Index(usize),
    Identifier(String),
}

/// Parsed form of a segment string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    pub key: SegmentKey,
}

impl Segment {
    pub fn parse(raw: &str) -> Self {
        Self {
            name: segment_name(raw).to_string(),
            key: match (segment_index(raw), segment_identifier(raw)) {
                (Some(i), _) => SegmentKey::Index(i),
                (None, Some(id)) => SegmentKey::Identifier(id.to_string()),
                (None, None) => SegmentKey::None,
            },
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            SegmentKey::None => write!(f, "{}", self.name),
            SegmentKey::Index(i) => write!(f, "{}[{}]", self.name, i),
            SegmentKey::Identifier(id) => write!(f, "{}[{}]", self.name, id),
        }
    }
}

/// Builds `name[key]`.
pub fn make_segment(name: &str, key: impl fmt::Display) -> String {
    format!("{}[{}]", name, key)
}

fn bracket(raw: &str) -> Option<&str> {
    let open = raw.find('[')?;
    let inner = raw[open + 1..].strip_suffix(']')?;
    Some(inner)
}

/// Segment name with any bracket stripped.
///
/// # Examples
///
/// ```rust
/// use docweave::runtime::path::segment_name;
/// assert_eq!(segment_name("element[section]"), "element");
/// assert_eq!(segment_name("document"), "document");
/// ```
pub fn segment_name(raw: &str) -> &str {
    match raw.find('[') {
        Some(open) => &raw[..open],
        None => raw,
    }
}

/// Numeric bracket content.
pub fn segment_index(raw: &str) -> Option<usize> {
    let inner = bracket(raw)?;
    if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) {
        inner.parse().ok()
    } else {
        None
    }
}

/// Bracket content that is not an index, including digit runs too large
/// for a `usize`.
pub fn segment_identifier(raw: &str) -> Option<&str> {
    let inner = bracket(raw)?;
    if inner.is_empty() || segment_index(raw).is_some() {
        None
    } else {
        Some(inner)
    }
}

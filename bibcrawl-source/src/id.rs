use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use url::Url;

/// Normalized OpenAlex identifier (`W123`, `A456`, `I789`).
///
/// OpenAlex hands out identifiers in URL form (`https://openalex.org/W123`) in most
/// payloads and in short form in filters. Every ID that enters the frontier, the visited
/// sets or the database goes through [`NodeId::parse`], so equality is plain string
/// equality on the short, upper-cased form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

/// Entity family encoded in the first letter of an OpenAlex ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Work,
    Author,
    Institution,
    Other,
}

impl NodeId {
    /// Normalize a raw identifier: final path segment, trimmed, upper-cased.
    /// Returns `None` when nothing usable is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let segment = match Url::parse(raw) {
            Ok(url) if url.has_host() => url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .map(str::to_string)?,
            _ => raw
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }
        Some(NodeId(segment.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> EntityKind {
        match self.0.as_bytes().first() {
            Some(b'W') => EntityKind::Work,
            Some(b'A') => EntityKind::Author,
            Some(b'I') => EntityKind::Institution,
            _ => EntityKind::Other,
        }
    }
}

/// Normalize a list of raw identifiers, dropping unusable entries and duplicates while
/// keeping first-seen order.
pub fn normalize_all<'a, I>(raw: I) -> Vec<NodeId>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .filter_map(NodeId::parse)
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

//! Keyword set normalisation and case-insensitive matching.

use std::fmt;
use std::sync::Arc;

/// A configured keyword, stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(Arc<str>);

impl Keyword {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Keyword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Immutable set of keywords for one matching session.
///
/// Entries are trimmed and lowercased; empty entries and duplicates are
/// dropped, first occurrence wins the position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: Vec<Keyword> = Vec::new();
        for raw in keywords {
            let normalized = raw.as_ref().trim().to_lowercase();
            if normalized.is_empty() || set.iter().any(|kw| kw.as_str() == normalized) {
                continue;
            }
            set.push(Keyword(normalized.into()));
        }
        Self { keywords: set }
    }

    #[must_use]
    pub fn from_comma_separated(csv: &str) -> Self {
        Self::new(csv.split(','))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }

    /// Comma-joined form used as the upstream filter parameter.
    #[must_use]
    pub fn track_param(&self) -> String {
        self.keywords
            .iter()
            .map(Keyword::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Keywords contained in `text`, at most once each.
    #[must_use]
    pub fn matches(&self, text: &str) -> Vec<&Keyword> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|kw| haystack.contains(kw.as_str()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a KeywordSet {
    type Item = &'a Keyword;
    type IntoIter = std::slice::Iter<'a, Keyword>;

    fn into_iter(self) -> Self::IntoIter {
        self.keywords.iter()
    }
}

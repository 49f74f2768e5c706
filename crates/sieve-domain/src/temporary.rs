//! Temporary contexts - candidate spans produced by Mention Spaces
//!
//! A [`TemporaryContext`] lives only in memory until a matcher accepts it and
//! the store persists it as a Mention. Identity is the [`CanonicalKey`]: two
//! temporary contexts with the same key denote the same span, whichever
//! space produced them, so dedup never needs a database round trip.

use crate::context::Context;
use crate::ids::ContextId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Canonical identity of a span: constituent stable ids plus offsets
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Wrap an already-canonical key (storage layer deserialization)
    pub fn from_string(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A contiguous character span within one sentence
#[derive(Debug, Clone)]
pub struct TemporarySpan {
    /// Sentence containing the span
    pub sentence: ContextId,

    /// Stable id of the sentence
    pub sentence_stable_id: String,

    /// Position of the sentence within its document
    pub position: u32,

    /// Byte offset of the first character (inclusive)
    pub char_start: usize,

    /// Byte offset past the last character (exclusive)
    pub char_end: usize,

    /// First word index (inclusive)
    pub word_start: usize,

    /// Last word index (exclusive)
    pub word_end: usize,

    /// Covered text
    pub text: String,

    /// Covered tokens
    pub words: Vec<String>,
}

impl TemporarySpan {
    /// Span covering the words `[word_start, word_end)` of `sentence`
    pub fn from_words(sentence: &Context, word_start: usize, word_end: usize) -> Option<Self> {
        let (char_start, char_end) = sentence.word_range(word_start, word_end)?;
        let text = sentence.text.get(char_start..char_end)?.to_string();
        Some(Self {
            sentence: sentence.id,
            sentence_stable_id: sentence.stable_id.clone(),
            position: sentence.position,
            char_start,
            char_end,
            word_start,
            word_end,
            text,
            words: sentence.words[word_start..word_end].to_vec(),
        })
    }

    /// Span covering the bytes `[char_start, char_end)` inside word `word`
    ///
    /// Used for sub-token splits such as `"65/150"` → `"65"`, `"150"`.
    pub fn within_word(
        sentence: &Context,
        word: usize,
        char_start: usize,
        char_end: usize,
    ) -> Option<Self> {
        let text = sentence.text.get(char_start..char_end)?.to_string();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            sentence: sentence.id,
            sentence_stable_id: sentence.stable_id.clone(),
            position: sentence.position,
            char_start,
            char_end,
            word_start: word,
            word_end: word + 1,
            words: vec![text.clone()],
            text,
        })
    }

    /// Whether this span covers `other` entirely
    pub fn contains(&self, other: &TemporarySpan) -> bool {
        self.sentence == other.sentence
            && self.char_start <= other.char_start
            && other.char_end <= self.char_end
    }
}

/// A whole figure
#[derive(Debug, Clone)]
pub struct TemporaryFigure {
    /// Figure context
    pub figure: ContextId,

    /// Stable id of the figure
    pub stable_id: String,

    /// Position of the figure within its document
    pub position: u32,

    /// Image url
    pub url: String,
}

impl TemporaryFigure {
    /// Wrap a figure context
    pub fn from_context(figure: &Context) -> Self {
        Self {
            figure: figure.id,
            stable_id: figure.stable_id.clone(),
            position: figure.position,
            url: figure.url.clone().unwrap_or_default(),
        }
    }
}

/// A span made of several whole contexts (e.g. a group of table cells)
#[derive(Debug, Clone)]
pub struct TemporaryRegion {
    /// Constituent contexts, in position order
    pub contexts: Vec<ContextId>,

    /// Stable ids of the constituents
    pub stable_ids: Vec<String>,

    /// Position of the first constituent
    pub position: u32,

    /// Concatenated text of the constituents
    pub text: String,
}

impl TemporaryRegion {
    /// Build a region from contexts; returns `None` for an empty slice
    pub fn from_contexts(contexts: &[&Context]) -> Option<Self> {
        let mut sorted: Vec<&Context> = contexts.to_vec();
        sorted.sort_by_key(|c| (c.position, c.id));
        let first = sorted.first()?;
        Some(Self {
            contexts: sorted.iter().map(|c| c.id).collect(),
            stable_ids: sorted.iter().map(|c| c.stable_id.clone()).collect(),
            position: first.position,
            text: sorted
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        })
    }
}

/// An in-memory candidate span produced by a Mention Space
#[derive(Debug, Clone)]
pub enum TemporaryContext {
    /// Character span within a sentence
    Span(TemporarySpan),
    /// Whole figure
    Figure(TemporaryFigure),
    /// Several whole contexts
    Region(TemporaryRegion),
}

impl TemporaryContext {
    /// Canonical identity used for dedup and uniqueness
    ///
    /// # Examples
    ///
    /// ```
    /// use sieve_domain::{Context, ContextDraft, ContextId, ContextKind, DocumentId};
    /// use sieve_domain::{TemporaryContext, TemporarySpan};
    ///
    /// let draft = ContextDraft::sentence(&["Tstg", "-65", "to", "150"]);
    /// let sentence = Context {
    ///     id: ContextId::from_value(9),
    ///     document_id: DocumentId::from_value(1),
    ///     parent: None,
    ///     kind: ContextKind::Sentence,
    ///     position: 3,
    ///     stable_id: "doc::sentence:3".to_string(),
    ///     text: draft.text,
    ///     words: draft.words,
    ///     char_offsets: draft.char_offsets,
    ///     url: None,
    /// };
    /// let span = TemporarySpan::from_words(&sentence, 1, 2).unwrap();
    /// let key = TemporaryContext::Span(span).canonical_key();
    /// assert_eq!(key.as_str(), "span:doc::sentence:3:5:8");
    /// ```
    pub fn canonical_key(&self) -> CanonicalKey {
        match self {
            TemporaryContext::Span(s) => CanonicalKey(format!(
                "span:{}:{}:{}",
                s.sentence_stable_id, s.char_start, s.char_end
            )),
            TemporaryContext::Figure(f) => CanonicalKey(format!("figure:{}", f.stable_id)),
            TemporaryContext::Region(r) => {
                CanonicalKey(format!("region:{}", r.stable_ids.join("|")))
            }
        }
    }

    /// The context a persisted mention is anchored to
    pub fn anchor(&self) -> Option<ContextId> {
        match self {
            TemporaryContext::Span(s) => Some(s.sentence),
            TemporaryContext::Figure(f) => Some(f.figure),
            TemporaryContext::Region(r) => r.contexts.first().copied(),
        }
    }

    /// Document-local position of the anchor
    pub fn position(&self) -> u32 {
        match self {
            TemporaryContext::Span(s) => s.position,
            TemporaryContext::Figure(f) => f.position,
            TemporaryContext::Region(r) => r.position,
        }
    }

    /// Covered text (the url for figures)
    pub fn text(&self) -> &str {
        match self {
            TemporaryContext::Span(s) => &s.text,
            TemporaryContext::Figure(f) => &f.url,
            TemporaryContext::Region(r) => &r.text,
        }
    }

    /// The span, if this is one
    pub fn as_span(&self) -> Option<&TemporarySpan> {
        match self {
            TemporaryContext::Span(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this context covers `other` entirely
    ///
    /// Every context contains itself.
    pub fn contains(&self, other: &TemporaryContext) -> bool {
        match (self, other) {
            (TemporaryContext::Span(a), TemporaryContext::Span(b)) => a.contains(b),
            (TemporaryContext::Region(r), TemporaryContext::Span(s)) => {
                r.contexts.contains(&s.sentence)
            }
            (TemporaryContext::Region(a), TemporaryContext::Region(b)) => {
                b.contexts.iter().all(|c| a.contexts.contains(c))
            }
            _ => self.canonical_key() == other.canonical_key(),
        }
    }
}

impl PartialEq for TemporaryContext {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for TemporaryContext {}

impl Hash for TemporaryContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::context::{ContextDraft, ContextKind};
    use crate::ids::DocumentId;
    use proptest::prelude::*;

    fn sentence(len: usize) -> Context {
        let words: Vec<String> = (0..len).map(|i| format!("w{}", i)).collect();
        let refs: Vec<&str> = words.iter().map(|w| w.as_str()).collect();
        let draft = ContextDraft::sentence(&refs);
        Context {
            id: ContextId::from_value(1),
            document_id: DocumentId::from_value(1),
            parent: None,
            kind: ContextKind::Sentence,
            position: 0,
            stable_id: "doc::sentence:0".to_string(),
            text: draft.text,
            words: draft.words,
            char_offsets: draft.char_offsets,
            url: None,
        }
    }

    proptest! {
        /// Property: distinct word ranges never share a canonical key
        #[test]
        fn test_distinct_ranges_have_distinct_keys(
            a in 0usize..8, la in 1usize..4, b in 0usize..8, lb in 1usize..4
        ) {
            let s = sentence(12);
            let x = TemporaryContext::Span(TemporarySpan::from_words(&s, a, a + la).unwrap());
            let y = TemporaryContext::Span(TemporarySpan::from_words(&s, b, b + lb).unwrap());
            prop_assert_eq!(x == y, a == b && la == lb);
        }

        /// Property: a span contains another iff its word range does
        #[test]
        fn test_containment_matches_word_ranges(
            a in 0usize..8, la in 1usize..4, b in 0usize..8, lb in 1usize..4
        ) {
            let s = sentence(12);
            let x = TemporaryContext::Span(TemporarySpan::from_words(&s, a, a + la).unwrap());
            let y = TemporaryContext::Span(TemporarySpan::from_words(&s, b, b + lb).unwrap());
            prop_assert_eq!(x.contains(&y), a <= b && b + lb <= a + la);
        }
    }
}

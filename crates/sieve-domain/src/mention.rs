//! Mention module - persisted typed spans

use crate::ids::{ContextId, DocumentId, MentionId};
use crate::temporary::CanonicalKey;

/// A persisted Mention as read back from the store
///
/// The record carries enough of the original span to let throttlers and
/// relation checks reason about offsets without loading the context tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionRecord {
    /// Identifier shared by the base and subclass rows
    pub id: MentionId,

    /// Name of the declared mention type
    pub mention_type: String,

    /// Owning document
    pub document_id: DocumentId,

    /// Anchor context (the sentence for spans)
    pub context_id: ContextId,

    /// Canonical key of the span
    pub canonical_key: CanonicalKey,

    /// Position of the anchor context within the document
    pub position: u32,

    /// Byte range within the anchor, for spans
    pub char_range: Option<(usize, usize)>,

    /// Word range within the anchor, for spans
    pub word_range: Option<(usize, usize)>,

    /// Covered text
    pub text: String,
}

impl MentionRecord {
    /// Whether this mention's span covers `other`'s span
    ///
    /// Mentions without a character range only contain mentions with the
    /// same canonical key.
    pub fn contains(&self, other: &MentionRecord) -> bool {
        match (self.char_range, other.char_range) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => {
                self.context_id == other.context_id && a_start <= b_start && b_end <= a_end
            }
            _ => self.canonical_key == other.canonical_key,
        }
    }

    /// Deterministic enumeration order within a document
    pub fn sort_key(&self) -> (DocumentId, u32, usize, MentionId) {
        let char_start = self.char_range.map(|(s, _)| s).unwrap_or(0);
        (self.document_id, self.position, char_start, self.id)
    }
}

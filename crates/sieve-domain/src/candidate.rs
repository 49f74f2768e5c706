//! Candidate module - persisted typed tuples of Mentions

use crate::ids::{CandidateId, DocumentId, MentionId};

/// A persisted Candidate as read back from the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Identifier shared by the base and subclass rows
    pub id: CandidateId,

    /// Name of the declared relation type
    pub candidate_type: String,

    /// Owning document
    pub document_id: DocumentId,

    /// Partition tag (train/dev/test fold)
    pub split: i64,

    /// Referenced mentions, in the relation's argument order
    pub mention_ids: Vec<MentionId>,
}

impl CandidateRecord {
    /// Number of arguments
    pub fn arity(&self) -> usize {
        self.mention_ids.len()
    }

    /// Whether the candidate references `mention`
    pub fn references(&self, mention: MentionId) -> bool {
        self.mention_ids.contains(&mention)
    }
}

//! Row identifiers for the persisted entities
//!
//! Every entity is keyed by the store's integer row id. Ids are assigned in
//! insertion order, so comparing two ids of the same kind compares their
//! creation order.

use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw row id
            ///
            /// This is primarily for storage layer deserialization.
            pub fn from_value(value: i64) -> Self {
                Self(value)
            }

            /// Get the raw row id
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

row_id!(
    /// Identifier of a Document row
    DocumentId,
    "document"
);

row_id!(
    /// Identifier of a Context row
    ContextId,
    "context"
);

row_id!(
    /// Identifier of a Mention (shared by the base row and its subclass row)
    MentionId,
    "mention"
);

row_id!(
    /// Identifier of a Candidate (shared by the base row and its subclass row)
    CandidateId,
    "candidate"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering() {
        let a = MentionId::from_value(3);
        let b = MentionId::from_value(7);

        assert!(a < b);
        assert_eq!(a.value(), 3);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(DocumentId::from_value(12).to_string(), "document#12");
        assert_eq!(CandidateId::from_value(1).to_string(), "candidate#1");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: id ordering matches raw row id ordering
        #[test]
        fn test_id_ordering_property(a: i64, b: i64) {
            let id_a = ContextId::from_value(a);
            let id_b = ContextId::from_value(b);

            prop_assert_eq!(id_a < id_b, a < b);
            prop_assert_eq!(id_a == id_b, a == b);
        }
    }
}

//! Cross products of per-type mention lists
//!
//! The product is enumerated lazily, row-major over argument positions, so
//! only one document's tuples are ever live and repeated runs over the same
//! mentions see the same order.

use crate::config::CandidateExtractorConfig;
use sieve_domain::{CandidateType, MentionId, MentionRecord};
use std::collections::HashSet;

/// Index tuples of the cartesian product of lists with the given sizes
///
/// The last position varies fastest. Any empty list yields no tuples.
#[derive(Debug, Clone)]
pub struct CrossProduct {
    sizes: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl CrossProduct {
    /// Enumerate the product of lists of length `sizes`
    pub fn new(sizes: Vec<usize>) -> Self {
        let next = if sizes.is_empty() || sizes.contains(&0) {
            None
        } else {
            Some(vec![0; sizes.len()])
        };
        Self { sizes, next }
    }

    /// Number of tuples the product yields in total
    pub fn len(&self) -> usize {
        if self.sizes.is_empty() {
            return 0;
        }
        self.sizes.iter().product()
    }

    /// Whether the product yields nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Iterator for CrossProduct {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;

        let mut advanced = current.clone();
        let mut position = advanced.len();
        while position > 0 {
            position -= 1;
            advanced[position] += 1;
            if advanced[position] < self.sizes[position] {
                self.next = Some(advanced);
                break;
            }
            advanced[position] = 0;
        }

        Some(current)
    }
}

/// Admission rules for tuples of mentions that share a type
///
/// Positions with distinct mention types are never compared.
#[derive(Debug, Clone)]
pub(crate) struct RelationPolicy {
    self_relations: bool,
    nested_relations: bool,
    symmetric_relations: bool,
    /// Pairs of argument positions declared with the same mention type
    shared: Vec<(usize, usize)>,
    emitted: HashSet<Vec<MentionId>>,
}

impl RelationPolicy {
    pub(crate) fn new(relation: &CandidateType, config: &CandidateExtractorConfig) -> Self {
        let types = relation.mention_types();
        let mut shared = Vec::new();
        for i in 0..types.len() {
            for j in (i + 1)..types.len() {
                if types[i].name() == types[j].name() {
                    shared.push((i, j));
                }
            }
        }
        Self {
            self_relations: config.self_relations,
            nested_relations: config.nested_relations,
            symmetric_relations: config.symmetric_relations,
            shared,
            emitted: HashSet::new(),
        }
    }

    /// Whether the relation repeats a mention type
    pub(crate) fn has_shared_positions(&self) -> bool {
        !self.shared.is_empty()
    }

    /// Check the self and nesting rules for one tuple
    pub(crate) fn admits(&self, tuple: &[&MentionRecord]) -> bool {
        for &(i, j) in &self.shared {
            let (a, b) = (tuple[i], tuple[j]);
            if a.id == b.id {
                if !self.self_relations {
                    return false;
                }
                continue;
            }
            if !self.nested_relations && (a.contains(b) || b.contains(a)) {
                return false;
            }
        }
        if !self.symmetric_relations && self.has_shared_positions() {
            return !self.emitted.contains(&self.symmetric_key(tuple));
        }
        true
    }

    /// Remember a tuple that became a candidate
    pub(crate) fn record(&mut self, tuple: &[&MentionRecord]) {
        if !self.symmetric_relations && self.has_shared_positions() {
            let key = self.symmetric_key(tuple);
            self.emitted.insert(key);
        }
    }

    /// Tuple ids with every group of same-typed positions sorted, so that
    /// permutations within a group share a key
    fn symmetric_key(&self, tuple: &[&MentionRecord]) -> Vec<MentionId> {
        let mut ids: Vec<MentionId> = tuple.iter().map(|m| m.id).collect();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for &(i, j) in &self.shared {
            match groups.iter_mut().find(|g| g.contains(&i)) {
                Some(group) => {
                    if !group.contains(&j) {
                        group.push(j);
                    }
                }
                None => groups.push(vec![i, j]),
            }
        }
        for group in groups {
            let mut values: Vec<MentionId> = group.iter().map(|&p| ids[p]).collect();
            values.sort();
            let mut positions = group;
            positions.sort_unstable();
            for (p, v) in positions.into_iter().zip(values) {
                ids[p] = v;
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sieve_domain::{CanonicalKey, ContextId, DocumentId, TypeRegistry};

    fn mention(id: i64, range: (usize, usize)) -> MentionRecord {
        MentionRecord {
            id: MentionId::from_value(id),
            mention_type: "Part".to_string(),
            document_id: DocumentId::from_value(1),
            context_id: ContextId::from_value(1),
            canonical_key: CanonicalKey::from_string(format!("span:s:{}:{}", range.0, range.1)),
            position: 1,
            char_range: Some(range),
            word_range: None,
            text: String::new(),
        }
    }

    fn part_part(config: &CandidateExtractorConfig) -> RelationPolicy {
        let registry = TypeRegistry::new();
        let part = registry.declare_mention("Part").unwrap();
        let relation = registry
            .declare_candidate("PartPart", &[part.clone(), part])
            .unwrap();
        RelationPolicy::new(&relation, config)
    }

    #[test]
    fn test_row_major_order() {
        let tuples: Vec<Vec<usize>> = CrossProduct::new(vec![2, 3]).collect();
        assert_eq!(
            tuples,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2],
            ]
        );
    }

    #[test]
    fn test_empty_list_yields_nothing() {
        assert_eq!(CrossProduct::new(vec![4, 0, 2]).count(), 0);
        assert_eq!(CrossProduct::new(vec![]).count(), 0);
        assert!(CrossProduct::new(vec![3, 0]).is_empty());
    }

    #[test]
    fn test_distinct_types_are_never_filtered() {
        let registry = TypeRegistry::new();
        let part = registry.declare_mention("Part").unwrap();
        let temp = registry.declare_mention("Temp").unwrap();
        let relation = registry.declare_candidate("PartTemp", &[part, temp]).unwrap();
        let policy = RelationPolicy::new(&relation, &CandidateExtractorConfig::default());

        let a = mention(1, (0, 5));
        assert!(!policy.has_shared_positions());
        assert!(policy.admits(&[&a, &a]));
    }

    #[test]
    fn test_self_pairs_excluded_by_default() {
        let policy = part_part(&CandidateExtractorConfig::default());
        let a = mention(1, (0, 5));
        assert!(!policy.admits(&[&a, &a]));

        let allowed = part_part(&CandidateExtractorConfig {
            self_relations: true,
            ..CandidateExtractorConfig::default()
        });
        assert!(allowed.admits(&[&a, &a]));

        let b = mention(2, (6, 9));
        assert!(policy.admits(&[&a, &b]));
        assert!(policy.admits(&[&b, &a]));
    }

    #[test]
    fn test_nested_pairs_kept_by_default() {
        let outer = mention(1, (0, 10));
        let inner = mention(2, (2, 4));
        let policy = part_part(&CandidateExtractorConfig::default());
        assert!(policy.admits(&[&outer, &inner]));

        let narrow = part_part(&CandidateExtractorConfig {
            nested_relations: false,
            ..CandidateExtractorConfig::default()
        });
        assert!(!narrow.admits(&[&outer, &inner]));
        assert!(!narrow.admits(&[&inner, &outer]));
    }

    #[test]
    fn test_symmetric_pairs_kept_by_default() {
        let a = mention(1, (0, 2));
        let b = mention(2, (3, 5));

        let mut policy = part_part(&CandidateExtractorConfig::default());
        policy.record(&[&a, &b]);
        assert!(policy.admits(&[&b, &a]));

        let mut narrow = part_part(&CandidateExtractorConfig {
            symmetric_relations: false,
            ..CandidateExtractorConfig::default()
        });
        assert!(narrow.admits(&[&a, &b]));
        narrow.record(&[&a, &b]);
        assert!(!narrow.admits(&[&b, &a]));
    }

    proptest! {
        #[test]
        fn prop_product_size_is_product_of_sizes(sizes in prop::collection::vec(0usize..5, 1..4)) {
            let product = CrossProduct::new(sizes.clone());
            let expected: usize = sizes.iter().product();
            prop_assert_eq!(product.len(), expected);
            prop_assert_eq!(product.count(), expected);
        }

        #[test]
        fn prop_tuples_are_unique_and_in_range(sizes in prop::collection::vec(1usize..4, 1..4)) {
            let tuples: Vec<Vec<usize>> = CrossProduct::new(sizes.clone()).collect();
            let unique: HashSet<Vec<usize>> = tuples.iter().cloned().collect();
            prop_assert_eq!(unique.len(), tuples.len());
            for tuple in &tuples {
                for (index, size) in tuple.iter().zip(&sizes) {
                    prop_assert!(index < size);
                }
            }
        }
    }
}

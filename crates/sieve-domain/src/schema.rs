//! Declarative type registration for Mention and Candidate subclasses
//!
//! A declared type is a schema descriptor: a name, the table its subclass
//! rows live in, a label domain and, for candidates, the ordered mention
//! types forming the relation. The store materialises descriptors into
//! tables; nothing here touches persistence, so types may be declared before
//! any store is opened.
//!
//! Redeclaring a type with an identical specification returns the existing
//! handle. Redeclaring it with a different specification is an error.

use crate::error::DomainError;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Longest accepted table name, leaving room for the subclass prefix
const MAX_TABLE_NAME_LEN: usize = 48;

/// Convert a CamelCase type name to a snake_case table name
///
/// # Examples
///
/// ```
/// use sieve_domain::schema::camel_to_snake;
///
/// assert_eq!(camel_to_snake("PartTemp"), "part_temp");
/// assert_eq!(camel_to_snake("HTTPServer"), "http_server");
/// ```
pub fn camel_to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

fn validate_type_name(name: &str) -> Result<(), DomainError> {
    let mut chars = name.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    if !valid_start || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DomainError::InvalidDeclaration(format!(
            "type name '{}' must start with a letter and contain only letters, digits and '_'",
            name
        )));
    }
    Ok(())
}

fn validate_table_name(table: &str) -> Result<(), DomainError> {
    let valid_start = table.chars().next().is_some_and(|c| c.is_ascii_lowercase());
    let valid_body = table
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid_start || !valid_body || table.len() > MAX_TABLE_NAME_LEN {
        return Err(DomainError::InvalidDeclaration(format!(
            "table name '{}' must match [a-z][a-z0-9_]* and be at most {} characters",
            table, MAX_TABLE_NAME_LEN
        )));
    }
    Ok(())
}

/// The values a label for a type may take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDomain {
    /// Number of distinct values
    pub cardinality: usize,

    /// The values themselves
    pub values: Vec<String>,
}

impl LabelDomain {
    /// Resolve a label domain from an optional cardinality and value list
    ///
    /// - neither given: binary `["true", "false"]`
    /// - values given: cardinality (if also given) must match their count
    /// - only cardinality given: values `"0"..cardinality`
    pub fn resolve(
        cardinality: Option<usize>,
        values: Option<Vec<String>>,
    ) -> Result<Self, DomainError> {
        match (cardinality, values) {
            (None, None) => Ok(Self {
                cardinality: 2,
                values: vec!["true".to_string(), "false".to_string()],
            }),
            (cardinality, Some(values)) => {
                if cardinality.is_some_and(|c| c != values.len()) {
                    return Err(DomainError::InvalidDeclaration(
                        "number of values must match cardinality".to_string(),
                    ));
                }
                if values.is_empty() {
                    return Err(DomainError::InvalidDeclaration(
                        "label values cannot be empty".to_string(),
                    ));
                }
                if values.iter().any(|v| v.eq_ignore_ascii_case("none")) {
                    return Err(DomainError::InvalidDeclaration(
                        "'none' is a protected label value".to_string(),
                    ));
                }
                if values.iter().any(|v| v.parse::<i64>().is_ok()) {
                    return Err(DomainError::InvalidDeclaration(
                        "integer labels are the default; set only the cardinality instead"
                            .to_string(),
                    ));
                }
                Ok(Self {
                    cardinality: values.len(),
                    values,
                })
            }
            (Some(0), None) => Err(DomainError::InvalidDeclaration(
                "cardinality must be at least 1".to_string(),
            )),
            (Some(cardinality), None) => Ok(Self {
                cardinality,
                values: (0..cardinality).map(|v| v.to_string()).collect(),
            }),
        }
    }
}

/// Declaration of a Mention subclass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionTypeSpec {
    /// CamelCase type name
    pub name: String,

    /// Table name, defaults to the snake_case of `name`
    pub table_name: Option<String>,

    /// Label cardinality
    pub cardinality: Option<usize>,

    /// Label values
    pub values: Option<Vec<String>>,
}

impl MentionTypeSpec {
    /// Spec with default table name and binary labels
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            cardinality: None,
            values: None,
        }
    }

    /// Override the table name
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Set the label cardinality
    pub fn with_cardinality(mut self, cardinality: usize) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Set the label values
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// A resolved Mention subclass; obtain one from [`TypeRegistry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionType {
    name: String,
    table_name: String,
    labels: LabelDomain,
}

impl MentionType {
    /// Resolve and validate a spec
    pub fn resolve(spec: MentionTypeSpec) -> Result<Self, DomainError> {
        validate_type_name(&spec.name)?;
        let table_name = spec
            .table_name
            .unwrap_or_else(|| camel_to_snake(&spec.name));
        validate_table_name(&table_name)?;
        let labels = LabelDomain::resolve(spec.cardinality, spec.values)?;
        Ok(Self {
            name: spec.name,
            table_name,
            labels,
        })
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name without prefix
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Label domain
    pub fn labels(&self) -> &LabelDomain {
        &self.labels
    }

    /// Name of the subclass table holding this type's rows
    pub fn subclass_table(&self) -> String {
        format!("mention__{}", self.table_name)
    }

    /// One-line description used in conflict messages
    pub fn describe(&self) -> String {
        format!(
            "mention {} (table {}, values {:?})",
            self.name, self.table_name, self.labels.values
        )
    }
}

/// Declaration of a Candidate (relation) subclass
#[derive(Debug, Clone)]
pub struct CandidateTypeSpec {
    /// CamelCase type name
    pub name: String,

    /// Ordered argument types
    pub mention_types: Vec<Arc<MentionType>>,

    /// Table name, defaults to the snake_case of `name`
    pub table_name: Option<String>,

    /// Label cardinality
    pub cardinality: Option<usize>,

    /// Label values
    pub values: Option<Vec<String>>,
}

impl CandidateTypeSpec {
    /// Spec with default table name and binary labels
    pub fn new(name: impl Into<String>, mention_types: &[Arc<MentionType>]) -> Self {
        Self {
            name: name.into(),
            mention_types: mention_types.to_vec(),
            table_name: None,
            cardinality: None,
            values: None,
        }
    }

    /// Override the table name
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Set the label cardinality
    pub fn with_cardinality(mut self, cardinality: usize) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Set the label values
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// A resolved Candidate subclass; obtain one from [`TypeRegistry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateType {
    name: String,
    table_name: String,
    mention_types: Vec<Arc<MentionType>>,
    arg_names: Vec<String>,
    labels: LabelDomain,
}

impl CandidateType {
    /// Resolve and validate a spec
    pub fn resolve(spec: CandidateTypeSpec) -> Result<Self, DomainError> {
        validate_type_name(&spec.name)?;
        if spec.mention_types.is_empty() {
            return Err(DomainError::InvalidDeclaration(format!(
                "relation '{}' needs at least one mention type",
                spec.name
            )));
        }
        let table_name = spec
            .table_name
            .unwrap_or_else(|| camel_to_snake(&spec.name));
        validate_table_name(&table_name)?;
        let labels = LabelDomain::resolve(spec.cardinality, spec.values)?;
        let arg_names = Self::arg_names_for(&spec.mention_types);
        Ok(Self {
            name: spec.name,
            table_name,
            mention_types: spec.mention_types,
            arg_names,
            labels,
        })
    }

    /// Argument names: each mention type's table name, suffixed with the
    /// position when the same type appears more than once
    fn arg_names_for(mention_types: &[Arc<MentionType>]) -> Vec<String> {
        mention_types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let repeats = mention_types
                    .iter()
                    .filter(|o| o.table_name == t.table_name)
                    .count();
                if repeats > 1 {
                    format!("{}_{}", t.table_name, i)
                } else {
                    t.table_name.clone()
                }
            })
            .collect()
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name without prefix
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Label domain
    pub fn labels(&self) -> &LabelDomain {
        &self.labels
    }

    /// Ordered argument types
    pub fn mention_types(&self) -> &[Arc<MentionType>] {
        &self.mention_types
    }

    /// Ordered argument names
    pub fn arg_names(&self) -> &[String] {
        &self.arg_names
    }

    /// Subclass table column holding each argument's mention id
    pub fn arg_columns(&self) -> Vec<String> {
        self.arg_names.iter().map(|a| format!("{}_id", a)).collect()
    }

    /// Number of arguments
    pub fn arity(&self) -> usize {
        self.mention_types.len()
    }

    /// Name of the subclass table holding this type's rows
    pub fn subclass_table(&self) -> String {
        format!("candidate__{}", self.table_name)
    }

    /// One-line description used in conflict messages
    pub fn describe(&self) -> String {
        let args: Vec<&str> = self.mention_types.iter().map(|t| t.name()).collect();
        format!(
            "candidate {}({}) (table {}, values {:?})",
            self.name,
            args.join(", "),
            self.table_name,
            self.labels.values
        )
    }
}

/// Registry of declared types, keyed by name
///
/// Cheap to share behind an `Arc`; declarations take a short write lock.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    mentions: RwLock<HashMap<String, Arc<MentionType>>>,
    candidates: RwLock<HashMap<String, Arc<CandidateType>>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a mention type with default settings
    ///
    /// # Examples
    ///
    /// ```
    /// use sieve_domain::TypeRegistry;
    ///
    /// let registry = TypeRegistry::new();
    /// let part = registry.declare_mention("Part").unwrap();
    /// let again = registry.declare_mention("Part").unwrap();
    /// assert!(std::sync::Arc::ptr_eq(&part, &again));
    /// assert_eq!(part.subclass_table(), "mention__part");
    /// ```
    pub fn declare_mention(&self, name: &str) -> Result<Arc<MentionType>, DomainError> {
        self.declare_mention_spec(MentionTypeSpec::new(name))
    }

    /// Declare a mention type from a full spec
    pub fn declare_mention_spec(
        &self,
        spec: MentionTypeSpec,
    ) -> Result<Arc<MentionType>, DomainError> {
        let resolved = MentionType::resolve(spec)?;
        let mut mentions = self
            .mentions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Self::insert_mention(&mut mentions, resolved)
    }

    fn insert_mention(
        mentions: &mut HashMap<String, Arc<MentionType>>,
        resolved: MentionType,
    ) -> Result<Arc<MentionType>, DomainError> {
        if let Some(existing) = mentions.get(resolved.name()) {
            if **existing == resolved {
                return Ok(Arc::clone(existing));
            }
            return Err(DomainError::ConflictingDeclaration {
                name: resolved.name().to_string(),
                existing: existing.describe(),
            });
        }
        if let Some(clash) = mentions
            .values()
            .find(|t| t.table_name() == resolved.table_name())
        {
            return Err(DomainError::ConflictingDeclaration {
                name: resolved.name().to_string(),
                existing: clash.describe(),
            });
        }
        let handle = Arc::new(resolved);
        mentions.insert(handle.name().to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Declare a relation over the given mention types with default settings
    pub fn declare_candidate(
        &self,
        name: &str,
        mention_types: &[Arc<MentionType>],
    ) -> Result<Arc<CandidateType>, DomainError> {
        self.declare_candidate_spec(CandidateTypeSpec::new(name, mention_types))
    }

    /// Declare a relation from a full spec
    ///
    /// Argument types not yet known to this registry are registered with it.
    pub fn declare_candidate_spec(
        &self,
        spec: CandidateTypeSpec,
    ) -> Result<Arc<CandidateType>, DomainError> {
        {
            let mut mentions = self
                .mentions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for mention_type in &spec.mention_types {
                Self::insert_mention(&mut mentions, (**mention_type).clone())?;
            }
        }

        let resolved = CandidateType::resolve(spec)?;
        let mut candidates = self
            .candidates
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = candidates.get(resolved.name()) {
            if **existing == resolved {
                return Ok(Arc::clone(existing));
            }
            return Err(DomainError::ConflictingDeclaration {
                name: resolved.name().to_string(),
                existing: existing.describe(),
            });
        }
        if let Some(clash) = candidates
            .values()
            .find(|t| t.table_name() == resolved.table_name())
        {
            return Err(DomainError::ConflictingDeclaration {
                name: resolved.name().to_string(),
                existing: clash.describe(),
            });
        }
        let handle = Arc::new(resolved);
        candidates.insert(handle.name().to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Look up a declared mention type
    pub fn mention_type(&self, name: &str) -> Option<Arc<MentionType>> {
        self.mentions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Look up a declared candidate type
    pub fn candidate_type(&self, name: &str) -> Option<Arc<CandidateType>> {
        self.candidates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// All declared mention types, sorted by name
    pub fn mention_types(&self) -> Vec<Arc<MentionType>> {
        let mut types: Vec<_> = self
            .mentions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name().cmp(b.name()));
        types
    }

    /// All declared candidate types, sorted by name
    pub fn candidate_types(&self) -> Vec<Arc<CandidateType>> {
        let mut types: Vec<_> = self
            .candidates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        types.sort_by(|a, b| a.name().cmp(b.name()));
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_to_snake() {
        assert_eq!(camel_to_snake("Part"), "part");
        assert_eq!(camel_to_snake("PartTemp"), "part_temp");
        assert_eq!(camel_to_snake("Part2Volt"), "part2_volt");
        assert_eq!(camel_to_snake("already_snake"), "already_snake");
    }

    #[test]
    fn test_default_labels_are_binary() {
        let labels = LabelDomain::resolve(None, None).unwrap();
        assert_eq!(labels.cardinality, 2);
        assert_eq!(labels.values, vec!["true", "false"]);
    }

    #[test]
    fn test_label_validation() {
        assert!(LabelDomain::resolve(Some(3), Some(vec!["a".into(), "b".into()])).is_err());
        assert!(LabelDomain::resolve(None, Some(vec!["a".into(), "None".into()])).is_err());
        assert!(LabelDomain::resolve(None, Some(vec!["1".into(), "2".into()])).is_err());
        assert!(LabelDomain::resolve(Some(0), None).is_err());

        let labels = LabelDomain::resolve(Some(3), None).unwrap();
        assert_eq!(labels.values, vec!["0", "1", "2"]);
    }

    #[test]
    fn test_redeclaration_returns_same_handle() {
        let registry = TypeRegistry::new();
        let part = registry.declare_mention("Part").unwrap();
        let temp = registry.declare_mention("Temp").unwrap();
        let rel = registry.declare_candidate("PartTemp", &[part.clone(), temp.clone()]).unwrap();
        let again = registry.declare_candidate("PartTemp", &[part, temp]).unwrap();

        assert!(Arc::ptr_eq(&rel, &again));
        assert_eq!(rel.arg_columns(), vec!["part_id", "temp_id"]);
        assert_eq!(rel.subclass_table(), "candidate__part_temp");
        assert_eq!(registry.candidate_types().len(), 1);
    }

    #[test]
    fn test_conflicting_redeclaration_fails() {
        let registry = TypeRegistry::new();
        registry.declare_mention("Part").unwrap();

        let conflict = registry
            .declare_mention_spec(MentionTypeSpec::new("Part").with_values(["yes", "no"]));
        assert!(matches!(
            conflict,
            Err(DomainError::ConflictingDeclaration { .. })
        ));

        let table_clash = registry
            .declare_mention_spec(MentionTypeSpec::new("Component").with_table_name("part"));
        assert!(table_clash.is_err());
    }

    #[test]
    fn test_relation_with_different_arguments_conflicts() {
        let registry = TypeRegistry::new();
        let part = registry.declare_mention("Part").unwrap();
        let temp = registry.declare_mention("Temp").unwrap();
        let volt = registry.declare_mention("Volt").unwrap();

        registry.declare_candidate("PartAttr", &[part.clone(), temp]).unwrap();
        assert!(registry.declare_candidate("PartAttr", &[part, volt]).is_err());
    }

    #[test]
    fn test_self_relation_arg_names() {
        let registry = TypeRegistry::new();
        let part = registry.declare_mention("Part").unwrap();
        let rel = registry
            .declare_candidate("PartPart", &[part.clone(), part])
            .unwrap();
        assert_eq!(rel.arg_names(), &["part_0".to_string(), "part_1".to_string()]);
        assert_eq!(rel.arity(), 2);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registry = TypeRegistry::new();
        assert!(registry.declare_mention("").is_err());
        assert!(registry.declare_mention("9Lives").is_err());
        assert!(registry.declare_mention("Drop Table").is_err());
        assert!(registry
            .declare_mention_spec(MentionTypeSpec::new("Part").with_table_name("Bad-Name"))
            .is_err());
        assert!(registry.declare_candidate("Empty", &[]).is_err());
    }
}

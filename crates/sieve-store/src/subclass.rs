//! Per-type subclass tables and the type catalog
//!
//! Each declared Mention type gets `mention__<table>` and each Candidate
//! type `candidate__<table>`. A subclass row shares its id with a base row:
//!
//! - base → subclass: `id REFERENCES <base>(id) ON DELETE CASCADE`
//! - subclass → base: an `AFTER DELETE` trigger deleting the base row
//!
//! Candidate argument columns reference the argument type's mention
//! subclass table, so deleting a mention removes every candidate built on it.

use crate::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sieve_domain::{CandidateType, CandidateTypeSpec, MentionType, MentionTypeSpec, TypeRegistry};
use tracing::{debug, info};

const KIND_MENTION: &str = "mention";
const KIND_CANDIDATE: &str = "candidate";

/// Persisted definition of a declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TypeRecord {
    name: String,
    table_name: String,
    values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mention_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    arg_names: Vec<String>,
}

impl TypeRecord {
    fn from_mention(mention_type: &MentionType) -> Self {
        Self {
            name: mention_type.name().to_string(),
            table_name: mention_type.table_name().to_string(),
            values: mention_type.labels().values.clone(),
            mention_types: Vec::new(),
            arg_names: Vec::new(),
        }
    }

    fn from_candidate(candidate_type: &CandidateType) -> Self {
        Self {
            name: candidate_type.name().to_string(),
            table_name: candidate_type.table_name().to_string(),
            values: candidate_type.labels().values.clone(),
            mention_types: candidate_type
                .mention_types()
                .iter()
                .map(|t| t.name().to_string())
                .collect(),
            arg_names: candidate_type.arg_names().to_vec(),
        }
    }
}

/// One row of the type catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// `mention` or `candidate`
    pub kind: String,

    /// Declared type name
    pub name: String,

    /// Subclass table
    pub table: String,

    /// Argument type names (candidates only)
    pub arguments: Vec<String>,

    /// Label values
    pub values: Vec<String>,
}

fn mention_ddl(mention_type: &MentionType) -> String {
    let table = mention_type.subclass_table();
    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    id            INTEGER PRIMARY KEY REFERENCES mention(id) ON DELETE CASCADE,
    document_id   INTEGER NOT NULL REFERENCES document(id) ON DELETE CASCADE,
    context_id    INTEGER NOT NULL REFERENCES context(id) ON DELETE CASCADE,
    canonical_key TEXT NOT NULL UNIQUE
);
CREATE INDEX IF NOT EXISTS "idx_{table}_document" ON "{table}"(document_id);
CREATE INDEX IF NOT EXISTS "idx_{table}_context" ON "{table}"(context_id);
CREATE TRIGGER IF NOT EXISTS "trg_{table}_delete" AFTER DELETE ON "{table}"
BEGIN
    DELETE FROM mention WHERE id = OLD.id;
END;
"#
    )
}

fn candidate_ddl(candidate_type: &CandidateType) -> String {
    let table = candidate_type.subclass_table();
    let columns = candidate_type.arg_columns();

    let mut arg_defs = String::new();
    let mut arg_indexes = String::new();
    for (column, mention_type) in columns.iter().zip(candidate_type.mention_types()) {
        arg_defs.push_str(&format!(
            "    \"{column}\" INTEGER NOT NULL REFERENCES \"{}\"(id) ON DELETE CASCADE,\n",
            mention_type.subclass_table()
        ));
        arg_indexes.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS \"idx_{table}_{column}\" ON \"{table}\"(\"{column}\");\n"
        ));
    }
    let unique = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
CREATE TABLE IF NOT EXISTS "{table}" (
    id           INTEGER PRIMARY KEY REFERENCES candidate(id) ON DELETE CASCADE,
    document_id  INTEGER NOT NULL REFERENCES document(id) ON DELETE CASCADE,
    split        INTEGER NOT NULL DEFAULT 0,
{arg_defs}    UNIQUE ({unique})
);
CREATE INDEX IF NOT EXISTS "idx_{table}_document" ON "{table}"(document_id);
CREATE INDEX IF NOT EXISTS "idx_{table}_split" ON "{table}"(split);
{arg_indexes}CREATE TRIGGER IF NOT EXISTS "trg_{table}_delete" AFTER DELETE ON "{table}"
BEGIN
    DELETE FROM candidate WHERE id = OLD.id;
END;
"#
    )
}

/// Record `record` in the catalog, or check it matches the recorded one
fn register(conn: &Connection, kind: &str, record: &TypeRecord) -> Result<(), StoreError> {
    let definition =
        serde_json::to_string(record).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    conn.execute(
        "INSERT INTO entity_type (kind, name, table_name, definition)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT DO NOTHING",
        params![kind, &record.name, &record.table_name, &definition],
    )?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT definition FROM entity_type WHERE kind = ?1 AND name = ?2",
            params![kind, &record.name],
            |row| row.get(0),
        )
        .optional()?;

    let Some(existing) = existing else {
        return Err(StoreError::Config(format!(
            "{} table '{}' is already used by another type",
            kind, record.table_name
        )));
    };
    let existing: TypeRecord =
        serde_json::from_str(&existing).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    if existing != *record {
        return Err(StoreError::Config(format!(
            "{} type '{}' is already declared in this store with a different schema \
             (table {}, values {:?}, arguments {:?})",
            kind, record.name, existing.table_name, existing.values, existing.mention_types
        )));
    }
    Ok(())
}

pub(crate) fn ensure_mention(
    conn: &mut Connection,
    mention_type: &MentionType,
) -> Result<(), StoreError> {
    let sp = conn.savepoint()?;
    register(&sp, KIND_MENTION, &TypeRecord::from_mention(mention_type))?;
    sp.execute_batch(&mention_ddl(mention_type))?;
    sp.commit()?;
    debug!(
        mention_type = mention_type.name(),
        table = %mention_type.subclass_table(),
        "Mention subclass table ready"
    );
    Ok(())
}

pub(crate) fn ensure_candidate(
    conn: &mut Connection,
    candidate_type: &CandidateType,
) -> Result<(), StoreError> {
    let sp = conn.savepoint()?;
    register(&sp, KIND_CANDIDATE, &TypeRecord::from_candidate(candidate_type))?;
    sp.execute_batch(&candidate_ddl(candidate_type))?;
    sp.commit()?;
    debug!(
        candidate_type = candidate_type.name(),
        table = %candidate_type.subclass_table(),
        arity = candidate_type.arity(),
        "Candidate subclass table ready"
    );
    Ok(())
}

fn records(conn: &Connection, kind: &str) -> Result<Vec<TypeRecord>, StoreError> {
    let mut stmt = conn.prepare("SELECT definition FROM entity_type WHERE kind = ?1 ORDER BY name")?;
    let raw = stmt
        .query_map(params![kind], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    raw.iter()
        .map(|json| serde_json::from_str(json).map_err(|e| StoreError::InvalidData(e.to_string())))
        .collect()
}

/// Cardinality of a label domain made of the default integer labels
fn integer_cardinality(values: &[String]) -> Option<usize> {
    let default = values
        .iter()
        .enumerate()
        .all(|(i, v)| *v == i.to_string());
    default.then_some(values.len())
}

/// Rebuild declared types from the catalog
pub(crate) fn load_registry(conn: &Connection) -> Result<TypeRegistry, StoreError> {
    let registry = TypeRegistry::new();

    for record in records(conn, KIND_MENTION)? {
        let spec = MentionTypeSpec::new(record.name).with_table_name(record.table_name);
        let spec = match integer_cardinality(&record.values) {
            Some(cardinality) => spec.with_cardinality(cardinality),
            None => spec.with_values(record.values),
        };
        registry.declare_mention_spec(spec)?;
    }

    for record in records(conn, KIND_CANDIDATE)? {
        let mention_types = record
            .mention_types
            .iter()
            .map(|name| {
                registry.mention_type(name).ok_or_else(|| {
                    StoreError::InvalidData(format!(
                        "candidate type '{}' references unknown mention type '{}'",
                        record.name, name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let spec =
            CandidateTypeSpec::new(record.name, &mention_types).with_table_name(record.table_name);
        let spec = match integer_cardinality(&record.values) {
            Some(cardinality) => spec.with_cardinality(cardinality),
            None => spec.with_values(record.values),
        };
        registry.declare_candidate_spec(spec)?;
    }

    info!(
        mention_types = registry.mention_types().len(),
        candidate_types = registry.candidate_types().len(),
        "Loaded type catalog"
    );
    Ok(registry)
}

/// List the catalog
pub(crate) fn catalog(conn: &Connection) -> Result<Vec<CatalogEntry>, StoreError> {
    let mut entries = Vec::new();
    for (kind, prefix) in [(KIND_MENTION, "mention__"), (KIND_CANDIDATE, "candidate__")] {
        for record in records(conn, kind)? {
            entries.push(CatalogEntry {
                kind: kind.to_string(),
                name: record.name,
                table: format!("{}{}", prefix, record.table_name),
                arguments: record.mention_types,
                values: record.values,
            });
        }
    }
    Ok(entries)
}

/// Subclass tables recorded in the catalog, with their base table and
/// type name
pub(crate) fn subclass_tables(
    conn: &Connection,
) -> Result<Vec<(&'static str, String, String)>, StoreError> {
    let mut tables = Vec::new();
    for record in records(conn, KIND_MENTION)? {
        tables.push(("mention", record.name, format!("mention__{}", record.table_name)));
    }
    for record in records(conn, KIND_CANDIDATE)? {
        tables.push(("candidate", record.name, format!("candidate__{}", record.table_name)));
    }
    Ok(tables)
}

//! Candidate rows: base identity in `candidate`, typed row in
//! `candidate__<t>` holding one mention id per argument

use crate::documents::count_rows;
use crate::mentions::table_exists;
use crate::StoreError;
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use sieve_domain::traits::InsertOutcome;
use sieve_domain::{CandidateId, CandidateRecord, CandidateType, DocumentId, MentionId};
use std::sync::Arc;

fn find_existing(
    conn: &Connection,
    candidate_type: &CandidateType,
    mentions: &[MentionId],
) -> Result<Option<CandidateId>, StoreError> {
    let predicate = candidate_type
        .arg_columns()
        .iter()
        .enumerate()
        .map(|(i, column)| format!("\"{}\" = ?{}", column, i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!(
        "SELECT id FROM \"{}\" WHERE {}",
        candidate_type.subclass_table(),
        predicate
    );
    let values: Vec<i64> = mentions.iter().map(|m| m.value()).collect();
    let id: Option<i64> = conn
        .query_row(&sql, rusqlite::params_from_iter(values.iter()), |row| {
            row.get(0)
        })
        .optional()?;
    Ok(id.map(CandidateId::from_value))
}

/// Insert the ordered tuple `mentions` as a candidate of `candidate_type`
/// unless it already exists
///
/// An existing tuple keeps its original split.
pub(crate) fn insert(
    conn: &Connection,
    candidate_type: &CandidateType,
    document: DocumentId,
    split: i64,
    mentions: &[MentionId],
) -> Result<InsertOutcome<CandidateId>, StoreError> {
    if mentions.len() != candidate_type.arity() {
        return Err(StoreError::InvalidData(format!(
            "candidate type '{}' has arity {} but {} mentions were given",
            candidate_type.name(),
            candidate_type.arity(),
            mentions.len()
        )));
    }

    if let Some(existing) = find_existing(conn, candidate_type, mentions)? {
        return Ok(InsertOutcome::Skipped(existing));
    }

    conn.execute(
        "INSERT INTO candidate (type_name, document_id, split) VALUES (?1, ?2, ?3)",
        params![candidate_type.name(), document.value(), split],
    )?;
    let id = conn.last_insert_rowid();

    let columns = candidate_type.arg_columns();
    let column_list = columns
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (0..columns.len())
        .map(|i| format!("?{}", i + 4))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO \"{}\" (id, document_id, split, {}) VALUES (?1, ?2, ?3, {})
         ON CONFLICT DO NOTHING",
        candidate_type.subclass_table(),
        column_list,
        placeholders
    );

    let mut values: Vec<Box<dyn ToSql>> = vec![
        Box::new(id),
        Box::new(document.value()),
        Box::new(split),
    ];
    values.extend(mentions.iter().map(|m| Box::new(m.value()) as Box<dyn ToSql>));
    let param_refs: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();

    if conn.execute(&sql, &param_refs[..])? == 0 {
        // Another writer stored the tuple after the lookup
        conn.execute("DELETE FROM candidate WHERE id = ?1", params![id])?;
        let existing = find_existing(conn, candidate_type, mentions)?.ok_or_else(|| {
            StoreError::Invariant(format!(
                "candidate of '{}' conflicted but no existing row was found",
                candidate_type.name()
            ))
        })?;
        return Ok(InsertOutcome::Skipped(existing));
    }

    Ok(InsertOutcome::Inserted(CandidateId::from_value(id)))
}

/// Candidates of `candidate_type` filtered by document and split, in
/// (document, id) order
pub(crate) fn list(
    conn: &Connection,
    candidate_type: &CandidateType,
    document: Option<DocumentId>,
    split: Option<i64>,
) -> Result<Vec<CandidateRecord>, StoreError> {
    let columns = candidate_type.arg_columns();
    let arg_select = columns
        .iter()
        .map(|c| format!("s.\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT s.id, s.document_id, s.split, {}
         FROM \"{}\" s JOIN candidate c ON c.id = s.id
         WHERE (?1 IS NULL OR s.document_id = ?1) AND (?2 IS NULL OR s.split = ?2)
         ORDER BY s.document_id, s.id",
        arg_select,
        candidate_type.subclass_table()
    );

    let mut stmt = conn.prepare(&sql)?;
    let arity = columns.len();
    let candidates = stmt
        .query_map(params![document.map(|d| d.value()), split], |row| {
            let mention_ids = (0..arity)
                .map(|i| row.get::<_, i64>(3 + i).map(MentionId::from_value))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(CandidateRecord {
                id: CandidateId::from_value(row.get(0)?),
                candidate_type: candidate_type.name().to_string(),
                document_id: DocumentId::from_value(row.get(1)?),
                split: row.get(2)?,
                mention_ids,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(candidates)
}

/// Delete the candidates of `types`, optionally within one split; returns
/// base rows removed
pub(crate) fn delete_by_types(
    conn: &Connection,
    types: &[Arc<CandidateType>],
    split: Option<i64>,
) -> Result<usize, StoreError> {
    let mut deleted = 0;
    for candidate_type in types {
        deleted += conn.execute(
            "DELETE FROM candidate WHERE type_name = ?1 AND (?2 IS NULL OR split = ?2)",
            params![candidate_type.name(), split],
        )?;
    }
    Ok(deleted)
}

pub(crate) fn delete_one(conn: &Connection, id: CandidateId) -> Result<bool, StoreError> {
    let changed = conn.execute("DELETE FROM candidate WHERE id = ?1", params![id.value()])?;
    Ok(changed > 0)
}

pub(crate) fn delete_subclass_row(
    conn: &Connection,
    candidate_type: &CandidateType,
    id: CandidateId,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        &format!(
            "DELETE FROM \"{}\" WHERE id = ?1",
            candidate_type.subclass_table()
        ),
        params![id.value()],
    )?;
    Ok(changed > 0)
}

pub(crate) fn count(
    conn: &Connection,
    candidate_type: Option<&CandidateType>,
) -> Result<usize, StoreError> {
    match candidate_type {
        Some(t) => {
            if !table_exists(conn, &t.subclass_table())? {
                return Ok(0);
            }
            count_rows(conn, &t.subclass_table())
        }
        None => count_rows(conn, "candidate"),
    }
}

//! Mention rows: base identity in `mention`, typed row in `mention__<t>`

use crate::documents::count_rows;
use crate::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sieve_domain::traits::{InsertOutcome, MentionScope};
use sieve_domain::{
    CanonicalKey, ContextId, DocumentId, MentionId, MentionRecord, MentionType, TemporaryContext,
};
use std::sync::Arc;

/// Insert `span` as a mention of `mention_type` unless its canonical key is
/// already taken for that type
pub(crate) fn insert(
    conn: &Connection,
    mention_type: &MentionType,
    document: DocumentId,
    span: &TemporaryContext,
) -> Result<InsertOutcome<MentionId>, StoreError> {
    let key = span.canonical_key();
    let anchor = span.anchor().ok_or_else(|| {
        StoreError::InvalidData(format!("temporary context {} has no anchor context", key))
    })?;
    let offsets = span.as_span().map(|s| {
        (
            s.char_start as i64,
            s.char_end as i64,
            s.word_start as i64,
            s.word_end as i64,
        )
    });

    let changed = conn.execute(
        "INSERT INTO mention
         (type_name, document_id, context_id, canonical_key, position,
          char_start, char_end, word_start, word_end, text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(type_name, canonical_key) DO NOTHING",
        params![
            mention_type.name(),
            document.value(),
            anchor.value(),
            key.as_str(),
            i64::from(span.position()),
            offsets.map(|o| o.0),
            offsets.map(|o| o.1),
            offsets.map(|o| o.2),
            offsets.map(|o| o.3),
            span.text(),
        ],
    )?;

    if changed == 0 {
        let existing: i64 = conn.query_row(
            "SELECT id FROM mention WHERE type_name = ?1 AND canonical_key = ?2",
            params![mention_type.name(), key.as_str()],
            |row| row.get(0),
        )?;
        return Ok(InsertOutcome::Skipped(MentionId::from_value(existing)));
    }

    let id = conn.last_insert_rowid();
    conn.execute(
        &format!(
            "INSERT INTO \"{}\" (id, document_id, context_id, canonical_key) VALUES (?1, ?2, ?3, ?4)",
            mention_type.subclass_table()
        ),
        params![id, document.value(), anchor.value(), key.as_str()],
    )?;

    Ok(InsertOutcome::Inserted(MentionId::from_value(id)))
}

/// Mentions of `mention_type`, optionally in one document, in
/// (document, position, char_start, id) order
pub(crate) fn list(
    conn: &Connection,
    mention_type: &MentionType,
    document: Option<DocumentId>,
) -> Result<Vec<MentionRecord>, StoreError> {
    let sql = format!(
        "SELECT m.id, m.type_name, m.document_id, m.context_id, m.canonical_key, m.position,
                m.char_start, m.char_end, m.word_start, m.word_end, m.text
         FROM mention m JOIN \"{}\" s ON s.id = m.id
         WHERE ?1 IS NULL OR m.document_id = ?1
         ORDER BY m.document_id, m.position, COALESCE(m.char_start, 0), m.id",
        mention_type.subclass_table()
    );
    let mut stmt = conn.prepare(&sql)?;
    let mentions = stmt
        .query_map(params![document.map(|d| d.value())], map_mention)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(mentions)
}

/// Delete the mentions of `types` within `scope`; returns base rows removed
pub(crate) fn delete_by_types(
    conn: &Connection,
    types: &[Arc<MentionType>],
    scope: MentionScope,
) -> Result<usize, StoreError> {
    let document = match scope {
        MentionScope::All => None,
        MentionScope::Document(id) => Some(id.value()),
    };
    let mut deleted = 0;
    for mention_type in types {
        deleted += conn.execute(
            "DELETE FROM mention WHERE type_name = ?1 AND (?2 IS NULL OR document_id = ?2)",
            params![mention_type.name(), document],
        )?;
    }
    Ok(deleted)
}

pub(crate) fn delete_one(conn: &Connection, id: MentionId) -> Result<bool, StoreError> {
    let changed = conn.execute("DELETE FROM mention WHERE id = ?1", params![id.value()])?;
    Ok(changed > 0)
}

pub(crate) fn delete_subclass_row(
    conn: &Connection,
    mention_type: &MentionType,
    id: MentionId,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        &format!("DELETE FROM \"{}\" WHERE id = ?1", mention_type.subclass_table()),
        params![id.value()],
    )?;
    Ok(changed > 0)
}

pub(crate) fn count(
    conn: &Connection,
    mention_type: Option<&MentionType>,
) -> Result<usize, StoreError> {
    match mention_type {
        Some(t) => {
            if !table_exists(conn, &t.subclass_table())? {
                return Ok(0);
            }
            count_rows(conn, &t.subclass_table())
        }
        None => count_rows(conn, "mention"),
    }
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn to_usize(value: Option<i64>) -> Option<usize> {
    value.map(|v| v as usize)
}

fn map_mention(row: &Row<'_>) -> rusqlite::Result<MentionRecord> {
    let char_start = to_usize(row.get(6)?);
    let char_end = to_usize(row.get(7)?);
    let word_start = to_usize(row.get(8)?);
    let word_end = to_usize(row.get(9)?);
    Ok(MentionRecord {
        id: MentionId::from_value(row.get(0)?),
        mention_type: row.get(1)?,
        document_id: DocumentId::from_value(row.get(2)?),
        context_id: ContextId::from_value(row.get(3)?),
        canonical_key: CanonicalKey::from_string(row.get::<_, String>(4)?),
        position: row.get(5)?,
        char_range: char_start.zip(char_end),
        word_range: word_start.zip(word_end),
        text: row.get(10)?,
    })
}

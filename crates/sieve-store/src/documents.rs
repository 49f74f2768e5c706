//! Documents and their context trees
//!
//! Parsing is done elsewhere; these operations only load a parsed document
//! and read it back.

use crate::{SqliteStore, StoreError};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sieve_domain::{
    Context, ContextDraft, ContextId, ContextKind, ContextTree, DocumentId, DocumentRef,
};

impl SqliteStore {
    /// Persist a parsed document and its contexts
    ///
    /// Contexts are numbered in slice order; a draft's `parent` must point
    /// at an earlier draft.
    pub fn insert_document(
        &mut self,
        name: &str,
        contexts: &[ContextDraft],
    ) -> Result<DocumentRef, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidData(
                "document name cannot be empty".to_string(),
            ));
        }
        if self.document_by_name(name)?.is_some() {
            return Err(StoreError::InvalidData(format!(
                "document '{}' already exists",
                name
            )));
        }

        let sp = self.conn.savepoint()?;
        sp.execute("INSERT INTO document (name) VALUES (?1)", params![name])?;
        let document = DocumentRef {
            id: DocumentId::from_value(sp.last_insert_rowid()),
            name: name.to_string(),
        };

        let mut ids: Vec<i64> = Vec::with_capacity(contexts.len());
        {
            let mut stmt = sp.prepare(
                "INSERT INTO context
                 (document_id, parent_id, kind, position, stable_id, text, words, char_offsets, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (position, draft) in contexts.iter().enumerate() {
                let parent = match draft.parent {
                    Some(index) if index < ids.len() => Some(ids[index]),
                    Some(index) => {
                        return Err(StoreError::InvalidData(format!(
                            "context {} of '{}' has parent {} which is not an earlier context",
                            position, name, index
                        )))
                    }
                    None => None,
                };
                if draft.words.len() != draft.char_offsets.len() {
                    return Err(StoreError::InvalidData(format!(
                        "context {} of '{}' has {} words but {} offsets",
                        position,
                        name,
                        draft.words.len(),
                        draft.char_offsets.len()
                    )));
                }
                let position = u32::try_from(position).map_err(|_| {
                    StoreError::InvalidData(format!("document '{}' has too many contexts", name))
                })?;
                let words = serde_json::to_string(&draft.words)
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;
                let offsets = serde_json::to_string(&draft.char_offsets)
                    .map_err(|e| StoreError::InvalidData(e.to_string()))?;

                stmt.execute(params![
                    document.id.value(),
                    parent,
                    draft.kind.as_str(),
                    i64::from(position),
                    Context::make_stable_id(name, draft.kind, position),
                    &draft.text,
                    words,
                    offsets,
                    &draft.url,
                ])?;
                ids.push(sp.last_insert_rowid());
            }
        }
        sp.commit()?;

        Ok(document)
    }

    /// Look up a document by its unique name
    pub fn document_by_name(&self, name: &str) -> Result<Option<DocumentRef>, StoreError> {
        let document = self
            .conn
            .query_row(
                "SELECT id, name FROM document WHERE name = ?1",
                params![name],
                map_document,
            )
            .optional()?;
        Ok(document)
    }

    /// All documents in insertion order
    pub fn documents(&self) -> Result<Vec<DocumentRef>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM document ORDER BY id")?;
        let documents = stmt
            .query_map([], map_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    /// Delete a document, cascading to its contexts, mentions and candidates
    pub fn delete_document(&mut self, id: DocumentId) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM document WHERE id = ?1", params![id.value()])?;
        Ok(changed > 0)
    }

    /// Number of documents
    pub fn count_documents(&self) -> Result<usize, StoreError> {
        count_rows(&self.conn, "document")
    }

    /// Number of contexts across all documents
    pub fn count_contexts(&self) -> Result<usize, StoreError> {
        count_rows(&self.conn, "context")
    }
}

/// Load `document` and its contexts
pub(crate) fn context_tree(
    conn: &Connection,
    document: DocumentId,
) -> Result<ContextTree, StoreError> {
    let doc = conn
        .query_row(
            "SELECT id, name FROM document WHERE id = ?1",
            params![document.value()],
            map_document,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(document.to_string()))?;

    let mut stmt = conn.prepare(
        "SELECT id, document_id, parent_id, kind, position, stable_id, text, words, char_offsets, url
         FROM context WHERE document_id = ?1 ORDER BY position, id",
    )?;
    let contexts = stmt
        .query_map(params![document.value()], map_context)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ContextTree::new(doc, contexts))
}

pub(crate) fn count_rows(conn: &Connection, table: &str) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })?;
    Ok(count as usize)
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<DocumentRef> {
    Ok(DocumentRef {
        id: DocumentId::from_value(row.get(0)?),
        name: row.get(1)?,
    })
}

fn map_context(row: &Row<'_>) -> rusqlite::Result<Context> {
    let kind_str: String = row.get(3)?;
    let kind = ContextKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(StoreError::InvalidData(format!(
                "Unknown context kind: {}",
                kind_str
            ))),
        )
    })?;

    let words_json: String = row.get(7)?;
    let words: Vec<String> = serde_json::from_str(&words_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let offsets_json: String = row.get(8)?;
    let char_offsets: Vec<usize> = serde_json::from_str(&offsets_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let parent: Option<i64> = row.get(2)?;
    Ok(Context {
        id: ContextId::from_value(row.get(0)?),
        document_id: DocumentId::from_value(row.get(1)?),
        parent: parent.map(ContextId::from_value),
        kind,
        position: row.get(4)?,
        stable_id: row.get(5)?,
        text: row.get(6)?,
        words,
        char_offsets,
        url: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_domain::LifecycleStore;

    fn drafts() -> Vec<ContextDraft> {
        vec![
            ContextDraft::new(ContextKind::Document, ""),
            ContextDraft::sentence(&["Storage", "temperature", "-65", "to", "150"]).with_parent(0),
            ContextDraft::figure("fig1.png").with_parent(0),
        ]
    }

    #[test]
    fn test_insert_and_load_tree() {
        let mut store = SqliteStore::in_memory().unwrap();
        let doc = store.insert_document("112823", &drafts()).unwrap();

        let tree = store.context_tree(doc.id).unwrap();
        assert_eq!(tree.document(), &doc);
        assert_eq!(tree.len(), 3);

        let sentence = tree.sentences().next().unwrap();
        assert_eq!(sentence.stable_id, "112823::sentence:1");
        assert_eq!(sentence.words.len(), 5);
        assert_eq!(sentence.word_range(2, 3), Some((20, 23)));

        let root = tree.contexts()[0].id;
        assert_eq!(tree.children(root).count(), 2);
        assert_eq!(tree.figures().next().unwrap().url.as_deref(), Some("fig1.png"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.insert_document("doc", &drafts()).unwrap();
        assert!(matches!(
            store.insert_document("doc", &drafts()),
            Err(StoreError::InvalidData(_))
        ));
        assert_eq!(store.count_documents().unwrap(), 1);
    }

    #[test]
    fn test_forward_parent_rejected_without_partial_rows() {
        let mut store = SqliteStore::in_memory().unwrap();
        let bad = vec![ContextDraft::sentence(&["x"]).with_parent(1)];
        assert!(store.insert_document("doc", &bad).is_err());
        assert!(store.document_by_name("doc").unwrap().is_none());
        assert_eq!(store.count_contexts().unwrap(), 0);
    }

    #[test]
    fn test_delete_document_cascades_contexts() {
        let mut store = SqliteStore::in_memory().unwrap();
        let doc = store.insert_document("doc", &drafts()).unwrap();
        assert_eq!(store.count_contexts().unwrap(), 3);

        assert!(store.delete_document(doc.id).unwrap());
        assert_eq!(store.count_contexts().unwrap(), 0);
        assert!(matches!(
            store.context_tree(doc.id),
            Err(StoreError::NotFound(_))
        ));
    }
}

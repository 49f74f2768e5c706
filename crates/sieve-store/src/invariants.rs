//! Lifecycle invariant checks
//!
//! The schema enforces the cascade rules; this module verifies the result,
//! for tests and for the `sieve check` command.

use crate::mentions::table_exists;
use crate::subclass::subclass_tables;
use crate::StoreError;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt;

/// One failed invariant check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Short name of the check
    pub check: &'static str,

    /// Table the offending rows live in
    pub table: String,

    /// Number of offending rows
    pub count: usize,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} row(s) in {}", self.check, self.count, self.table)
    }
}

fn scalar(conn: &Connection, sql: &str, type_name: &str) -> Result<usize, StoreError> {
    let count: i64 = conn.query_row(sql, params![type_name], |row| row.get(0))?;
    Ok(count as usize)
}

pub(crate) fn check(conn: &Connection) -> Result<Vec<Violation>, StoreError> {
    let mut violations = Vec::new();

    // Dangling references left by writes made with foreign keys disabled
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let dangling = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut tables: Vec<String> = dangling.clone();
    tables.sort();
    tables.dedup();
    for table in tables {
        let count = dangling.iter().filter(|t| **t == table).count();
        violations.push(Violation {
            check: "dangling_reference",
            table,
            count,
        });
    }

    for (base, type_name, table) in subclass_tables(conn)? {
        if !table_exists(conn, &table)? {
            continue;
        }

        let missing_subclass = scalar(
            conn,
            &format!(
                "SELECT COUNT(*) FROM {base} b WHERE b.type_name = ?1
                 AND NOT EXISTS (SELECT 1 FROM \"{table}\" s WHERE s.id = b.id)"
            ),
            &type_name,
        )?;
        if missing_subclass > 0 {
            violations.push(Violation {
                check: "base_without_subclass",
                table: base.to_string(),
                count: missing_subclass,
            });
        }

        let missing_base = scalar(
            conn,
            &format!(
                "SELECT COUNT(*) FROM \"{table}\" s WHERE NOT EXISTS
                 (SELECT 1 FROM {base} b WHERE b.id = s.id AND b.type_name = ?1)"
            ),
            &type_name,
        )?;
        if missing_base > 0 {
            violations.push(Violation {
                check: "subclass_without_base",
                table: table.clone(),
                count: missing_base,
            });
        }

        if base == "candidate" {
            let diverged = scalar(
                conn,
                &format!(
                    "SELECT COUNT(*) FROM \"{table}\" s JOIN candidate b ON b.id = s.id
                     WHERE b.type_name = ?1
                     AND (b.split != s.split OR b.document_id != s.document_id)"
                ),
                &type_name,
            )?;
            if diverged > 0 {
                violations.push(Violation {
                    check: "split_or_document_mismatch",
                    table: table.clone(),
                    count: diverged,
                });
            }
        }
    }

    for base in ["mention", "candidate"] {
        let undeclared = scalar(
            conn,
            &format!(
                "SELECT COUNT(*) FROM {base}
                 WHERE type_name NOT IN (SELECT name FROM entity_type WHERE kind = ?1)"
            ),
            base,
        )?;
        if undeclared > 0 {
            violations.push(Violation {
                check: "undeclared_type",
                table: base.to_string(),
                count: undeclared,
            });
        }
    }

    Ok(violations)
}

//! Connection strings
//!
//! Accepted forms:
//!
//! - `sqlite://<path>` for a database file
//! - `sqlite::memory:` (or `sqlite://:memory:`) for a private in-memory
//!   database shared by every connection opened from the same `StoreUrl`

use crate::StoreError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

const SCHEME: &str = "sqlite";
const MEMORY: &str = "sqlite::memory:";

/// Parsed location of a lifecycle store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUrl {
    /// Database file
    File(PathBuf),

    /// Named in-memory database (shared cache)
    Memory {
        /// Unique database name
        name: String,
    },
}

impl StoreUrl {
    /// Parse a connection string
    ///
    /// # Examples
    ///
    /// ```
    /// use sieve_store::StoreUrl;
    ///
    /// let url = StoreUrl::parse("sqlite://data/corpus.db").unwrap();
    /// assert_eq!(url.db_name(), "corpus");
    ///
    /// assert!(StoreUrl::parse("sqlite:corpus.db").is_err());
    /// assert!(StoreUrl::parse("postgresql://localhost:5432/corpus").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        let s = s.trim();
        if s == MEMORY {
            return Ok(Self::memory());
        }

        let (scheme, rest) = s.split_once("://").ok_or_else(|| {
            StoreError::Config(format!(
                "malformed connection string '{}': expected {}://<path>",
                s, SCHEME
            ))
        })?;

        if scheme != SCHEME {
            return Err(StoreError::Config(format!(
                "unsupported scheme '{}' in '{}': only {} is supported",
                scheme, s, SCHEME
            )));
        }

        match rest {
            "" => Err(StoreError::Config(format!(
                "connection string '{}' has an empty database path",
                s
            ))),
            ":memory:" => Ok(Self::memory()),
            path if path.ends_with('/') => Err(StoreError::Config(format!(
                "connection string '{}' names a directory, not a database file",
                s
            ))),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }

    /// Location of a database file
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }

    /// A fresh in-memory database
    pub fn memory() -> Self {
        Self::Memory {
            name: format!("sieve-{}", Uuid::now_v7().simple()),
        }
    }

    /// Whether the database lives in memory
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory { .. })
    }

    /// Short database name: the file stem, or the in-memory name
    pub fn db_name(&self) -> String {
        match self {
            Self::File(path) => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Self::Memory { name } => name.clone(),
        }
    }

    /// URI handed to SQLite when opening a connection
    pub(crate) fn sqlite_uri(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::Memory { name } => format!("file:{}?mode=memory&cache=shared", name),
        }
    }
}

impl Default for StoreUrl {
    fn default() -> Self {
        Self::file("sieve.db")
    }
}

impl fmt::Display for StoreUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}://{}", SCHEME, path.display()),
            Self::Memory { .. } => f.write_str(MEMORY),
        }
    }
}

impl FromStr for StoreUrl {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file() {
        let url = StoreUrl::parse("sqlite:///tmp/meta_test.db").unwrap();
        assert_eq!(url, StoreUrl::file("/tmp/meta_test.db"));
        assert_eq!(url.db_name(), "meta_test");
        assert_eq!(url.to_string(), "sqlite:///tmp/meta_test.db");
    }

    #[test]
    fn test_parse_memory() {
        let a = StoreUrl::parse("sqlite::memory:").unwrap();
        let b = StoreUrl::parse("sqlite://:memory:").unwrap();
        assert!(a.is_memory());
        assert!(b.is_memory());
        assert_ne!(a, b, "each parse yields a private database");
        assert!(a.sqlite_uri().contains("mode=memory"));
    }

    #[test]
    fn test_reject_malformed() {
        for bad in [
            "sqlitemeta_test",
            "sqlite:somethingsilly",
            "postgresql://localhost:5432/meta_test",
            "sqlite://",
            "sqlite://data/",
        ] {
            let result = StoreUrl::parse(bad);
            assert!(
                matches!(result, Err(StoreError::Config(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}

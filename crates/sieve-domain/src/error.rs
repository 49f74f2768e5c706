//! Domain error types

use thiserror::Error;

/// Errors raised while declaring or validating entity types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A type declaration is malformed (bad name, bad label domain, arity 0)
    #[error("Invalid declaration: {0}")]
    InvalidDeclaration(String),

    /// A type was redeclared under the same name with a different schema
    #[error("Type '{name}' already exists with incompatible specification: {existing}")]
    ConflictingDeclaration {
        /// Name of the type
        name: String,
        /// Human-readable description of the existing schema
        existing: String,
    },

    /// A space, matcher or throttler failed while being evaluated
    #[error(transparent)]
    Predicate(#[from] PredicateError),
}

/// Failure reported by a user-supplied space, matcher or throttler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Predicate failed: {message}")]
pub struct PredicateError {
    message: String,
}

impl PredicateError {
    /// Create a new predicate error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message
    pub fn message(&self) -> &str {
        &self.message
    }
}

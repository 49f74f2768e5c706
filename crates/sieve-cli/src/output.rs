//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use serde::Serialize;
use sieve_store::{CatalogEntry, Violation};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Row counts of one store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Documents
    pub documents: usize,
    /// Contexts of every kind
    pub contexts: usize,
    /// Base mention rows
    pub mentions: usize,
    /// Base candidate rows
    pub candidates: usize,
    /// Per declared type
    pub types: Vec<TypeCount>,
}

/// Row count of one declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    /// `mention` or `candidate`
    pub kind: String,
    /// Declared type name
    pub name: String,
    /// Subclass rows
    pub rows: usize,
}

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format store statistics.
    pub fn format_stats(&self, stats: &StoreStats) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(stats)?);
        }

        let mut builder = Builder::default();
        builder.push_record(["Table", "Kind", "Rows"]);
        builder.push_record(["document", "base", &stats.documents.to_string()]);
        builder.push_record(["context", "base", &stats.contexts.to_string()]);
        builder.push_record(["mention", "base", &stats.mentions.to_string()]);
        builder.push_record(["candidate", "base", &stats.candidates.to_string()]);
        for count in &stats.types {
            builder.push_record([count.name.as_str(), &count.kind, &count.rows.to_string()]);
        }
        Ok(self.render(builder))
    }

    /// Format the type catalog.
    pub fn format_catalog(&self, entries: &[CatalogEntry]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(entries)?);
        }
        if entries.is_empty() {
            return Ok(self.colorize("No types declared.", "yellow"));
        }

        let mut builder = Builder::default();
        builder.push_record(["Kind", "Name", "Table", "Arguments", "Values"]);
        for entry in entries {
            builder.push_record([
                entry.kind.as_str(),
                &entry.name,
                &entry.table,
                &entry.arguments.join(", "),
                &entry.values.join(", "),
            ]);
        }
        Ok(self.render(builder))
    }

    /// Format invariant violations.
    pub fn format_violations(&self, violations: &[Violation]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(violations)?);
        }
        if violations.is_empty() {
            return Ok(self.success("All invariants hold"));
        }

        let mut builder = Builder::default();
        builder.push_record(["Check", "Table", "Rows"]);
        for violation in violations {
            builder.push_record([violation.check, &violation.table, &violation.count.to_string()]);
        }
        Ok(self.render(builder))
    }

    /// Format the number of deleted rows.
    pub fn deleted(&self, what: &str, count: usize) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::json!({ "deleted": count, "kind": what }).to_string());
        }
        Ok(self.success(&format!("Deleted {} {}(s)", count, what)))
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

//! Metrics collection for extraction runs

use std::collections::BTreeMap;

/// Counts collected during an extraction run
///
/// Keyed by mention or candidate type name. Workers fill one instance per
/// document and the coordinator merges them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionMetrics {
    /// Rows written per type
    pub inserted: BTreeMap<String, usize>,

    /// Rows that already existed per type
    pub skipped: BTreeMap<String, usize>,

    /// Candidate tuples rejected by a throttler per type
    pub throttled: BTreeMap<String, usize>,

    /// Documents processed to completion
    pub documents: usize,

    /// Documents that failed
    pub failures: usize,

    /// Total runtime in milliseconds
    pub total_runtime_ms: u64,
}

impl ExtractionMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly written row
    pub fn record_inserted(&mut self, type_name: &str) {
        *self.inserted.entry(type_name.to_string()).or_insert(0) += 1;
    }

    /// Record a row that already existed
    pub fn record_skipped(&mut self, type_name: &str) {
        *self.skipped.entry(type_name.to_string()).or_insert(0) += 1;
    }

    /// Record a tuple a throttler rejected
    pub fn record_throttled(&mut self, type_name: &str) {
        *self.throttled.entry(type_name.to_string()).or_insert(0) += 1;
    }

    /// Record a completed document
    pub fn record_document(&mut self) {
        self.documents += 1;
    }

    /// Record a failed document
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Fold another set of counts into this one
    pub fn merge(&mut self, other: &ExtractionMetrics) {
        for (name, count) in &other.inserted {
            *self.inserted.entry(name.clone()).or_insert(0) += count;
        }
        for (name, count) in &other.skipped {
            *self.skipped.entry(name.clone()).or_insert(0) += count;
        }
        for (name, count) in &other.throttled {
            *self.throttled.entry(name.clone()).or_insert(0) += count;
        }
        self.documents += other.documents;
        self.failures += other.failures;
        self.total_runtime_ms += other.total_runtime_ms;
    }

    /// Rows written for one type
    pub fn inserted_for(&self, type_name: &str) -> usize {
        self.inserted.get(type_name).copied().unwrap_or(0)
    }

    /// Rows skipped for one type
    pub fn skipped_for(&self, type_name: &str) -> usize {
        self.skipped.get(type_name).copied().unwrap_or(0)
    }

    /// Get total rows written across all types
    pub fn total_inserted(&self) -> usize {
        self.inserted.values().sum()
    }

    /// Get total rows skipped across all types
    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }

    /// Get total throttled tuples across all types
    pub fn total_throttled(&self) -> usize {
        self.throttled.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        self.inserted.clear();
        self.skipped.clear();
        self.throttled.clear();
        self.documents = 0;
        self.failures = 0;
        self.total_runtime_ms = 0;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Extraction Metrics Summary".to_string(),
            "==========================".to_string(),
            format!("Documents: {}", self.documents),
            format!("Failures: {}", self.failures),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            String::new(),
        ];

        for (title, counts, total) in [
            ("Inserted by type:", &self.inserted, self.total_inserted()),
            ("Skipped by type:", &self.skipped, self.total_skipped()),
            ("Throttled by type:", &self.throttled, self.total_throttled()),
        ] {
            if counts.is_empty() {
                continue;
            }
            lines.push(title.to_string());
            for (name, count) in counts {
                lines.push(format!("  {}: {}", name, count));
            }
            lines.push(format!("  Total: {}", total));
            lines.push(String::new());
        }

        lines.join("\n").trim_end().to_string()
    }
}

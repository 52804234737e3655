//! dqcheck - XBRL US Data Quality Committee rule validation
//!
//! Validates a materialized fact population against the DQC cross-fact
//! consistency rules: equal and ordered concept pairs, context dates
//! around the reporting period end, DEI and text-block duration bounds,
//! and negative-value checks with member exclusions. Violations come back
//! as structured diagnostics with the rule code in the headline and the
//! offending fact as the location.
//!
//! Parsing the source filing and resolving its taxonomy are upstream
//! concerns; the engine receives a read-only [`model::Document`] and never
//! mutates it.
//!
//! Licensed under AGPL-3.0

pub mod dates;
pub mod diag;
pub mod exclusions;
pub mod loader;
pub mod matcher;
pub mod message;
pub mod model;
pub mod namespaces;
pub mod numeric;
pub mod rules;
pub mod tables;

// Re-export main types
pub use diag::{Diagnostic, DiagnosticSink, Severity};
pub use message::SuppressionSet;
pub use model::{Document, Dts, Fact, QName};
pub use tables::RuleTables;

/// Validation entry point wrapping the rule catalogue.
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Run every rule family over the document. Fails only on
    /// configuration or template defects; violations are data, not errors.
    pub fn validate(&self, doc: &Document) -> Result<ValidationReport> {
        let start = std::time::Instant::now();
        let suppress = SuppressionSet::parse(&self.config.suppress)?;
        let tables = self
            .config
            .tables
            .as_ref()
            .unwrap_or_else(|| RuleTables::bundled());
        let diagnostics = rules::validate(doc, tables, &suppress)?;

        Ok(ValidationReport {
            stats: ValidationStats {
                facts_scanned: doc.len(),
                duration_ms: start.elapsed().as_millis() as u64,
            },
            diagnostics,
        })
    }

    /// Same run, delivering diagnostics straight into an external sink.
    pub fn validate_into(
        &self,
        doc: &Document,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<ValidationStats> {
        let report = self.validate(doc)?;
        for diagnostic in report.diagnostics {
            sink.report(diagnostic);
        }
        Ok(report.stats)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validation options recognized by the engine.
pub struct ValidationConfig {
    /// `|`-delimited list of rule codes to suppress.
    pub suppress: String,
    /// Replacement rule tables; the bundled set is used when absent.
    pub tables: Option<RuleTables>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            suppress: String::new(),
            tables: None,
        }
    }
}

pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub stats: ValidationStats,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub struct ValidationStats {
    pub facts_scanned: usize,
    pub duration_ms: u64,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(String),
}

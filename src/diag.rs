// Diagnostic tree delivered to the host's reporting sink.
use crate::model::FactId;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// A rule violation.
    Error,
    /// A remediation hint attached to a violation.
    Info,
    /// Informational property lines attached to a violation.
    Other,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("ERROR"),
            Severity::Info => f.write_str("INFO"),
            Severity::Other => f.write_str("OTHER"),
        }
    }
}

/// A resolved message placeholder, kept alongside the rendered text so
/// downstream tooling can map values back to source facts.
#[derive(Debug, Clone, Serialize)]
pub struct Param {
    /// Placeholder path as written in the template, e.g. `fact1.value`.
    pub name: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<FactId>,
}

/// A validation finding. The headline carries the rule code; informational
/// children carry the property dump and any hint.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<FactId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Diagnostic>,
}

/// Where finished diagnostics go. The engine only appends.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::report
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Violation taxonomy and the validation report consumed by
    CI: human-readable rendering, JSON persistence, and the
    pass/fail exit signal.

  Security / Safety Notes:
    Reports are written to operator-controlled paths only.

  Dependencies:
    serde for JSON serialization, chrono for timestamps.

  Operational Scope:
    Built by the validator; printed or written by main.

  Revision History:
    2026-10-17 RMS  Authored report document.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible reports
    - Inconclusive results reported, never silently dropped
============================================================*/

use std::fmt::{self, Write as _};
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{RegcheckError, Result};

/// Exit code when blocking violations were found.
pub const EXIT_VIOLATIONS: u8 = 1;
/// Exit code when only inconclusive probes remain and policy treats them as failures.
pub const EXIT_INCONCLUSIVE: u8 = 2;

/// Check family a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ViolationKind {
    SchemaError,
    IndexMismatch,
    #[serde(rename = "UnreachableURL")]
    UnreachableUrl,
    TransientNetworkError,
}

impl ViolationKind {
    /// Inconclusive violations are reported but do not fail the run.
    pub fn is_blocking(self) -> bool {
        !matches!(self, ViolationKind::TransientNetworkError)
    }

    fn tag(self) -> &'static str {
        match self {
            ViolationKind::SchemaError => "SCHEMA",
            ViolationKind::IndexMismatch => "INDEX",
            ViolationKind::UnreachableUrl => "UNREACHABLE",
            ViolationKind::TransientNetworkError => "INCONCLUSIVE",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One reported inconsistency. Field order is the report sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Violation {
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub kind: ViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, package: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            file: None,
            kind,
            version: None,
            message: message.into(),
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn for_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.package)?;
        if let Some(version) = &self.version {
            write!(f, "@{version}")?;
        }
        if let Some(file) = &self.file {
            write!(f, " ({file})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Counters and context for a validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub generated_by: String,
    pub descriptors_checked: usize,
    pub index_entries: usize,
    pub urls_probed: usize,
    pub schema_errors: usize,
    pub index_mismatches: usize,
    pub unreachable_urls: usize,
    pub transient_network_errors: usize,
}

/// Result of `validate_all`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub passed: bool,
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn new(
        descriptors_checked: usize,
        index_entries: usize,
        urls_probed: usize,
        mut violations: Vec<Violation>,
    ) -> Self {
        violations.sort();
        violations.dedup();
        let count = |kind: ViolationKind| violations.iter().filter(|v| v.kind == kind).count();
        let metadata = ReportMetadata {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            generated_by: env!("CARGO_PKG_NAME").to_string(),
            descriptors_checked,
            index_entries,
            urls_probed,
            schema_errors: count(ViolationKind::SchemaError),
            index_mismatches: count(ViolationKind::IndexMismatch),
            unreachable_urls: count(ViolationKind::UnreachableUrl),
            transient_network_errors: count(ViolationKind::TransientNetworkError),
        };
        let passed = !violations.iter().any(|v| v.kind.is_blocking());
        Self {
            metadata,
            passed,
            violations,
        }
    }

    /// Passed, but with probes that could not be settled.
    pub fn is_inconclusive(&self) -> bool {
        self.passed && self.metadata.transient_network_errors > 0
    }

    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }

    /// Exit code for the CI runner.
    pub fn exit_code(&self, fail_on_inconclusive: bool) -> ExitCode {
        ExitCode::from(self.exit_status(fail_on_inconclusive))
    }

    fn exit_status(&self, fail_on_inconclusive: bool) -> u8 {
        if !self.passed {
            EXIT_VIOLATIONS
        } else if fail_on_inconclusive && self.is_inconclusive() {
            EXIT_INCONCLUSIVE
        } else {
            0
        }
    }

    /// Plain-text rendering: one line per violation followed by a summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for violation in &self.violations {
            let _ = writeln!(out, "{violation}");
        }
        if !self.violations.is_empty() {
            out.push('\n');
        }
        let meta = &self.metadata;
        let _ = writeln!(out, "VALIDATION SUMMARY");
        let _ = writeln!(
            out,
            "Descriptors={} IndexEntries={} URLsProbed={}",
            meta.descriptors_checked, meta.index_entries, meta.urls_probed
        );
        let _ = writeln!(
            out,
            "SchemaErrors={} IndexMismatches={} Unreachable={} Inconclusive={}",
            meta.schema_errors,
            meta.index_mismatches,
            meta.unreachable_urls,
            meta.transient_network_errors
        );
        let verdict = if !self.passed {
            "FAILED"
        } else if self.is_inconclusive() {
            "PASSED (inconclusive probes)"
        } else {
            "PASSED"
        };
        let _ = writeln!(out, "→ Registry validation {verdict}");
        out
    }
}

/// Persist the report as pretty JSON.
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            RegcheckError::Filesystem(format!(
                "Failed to create report directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        RegcheckError::Filesystem(format!(
            "Failed to create report file {}: {err}",
            path.display()
        ))
    })?;
    serde_json::to_writer_pretty(file, report).map_err(|err| {
        RegcheckError::Serialization(format!("Failed to write report {}: {err}", path.display()))
    })?;
    Ok(())
}

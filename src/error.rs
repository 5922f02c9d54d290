/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise process-level error types and exit semantics.
    Registry violations are report data, not errors; this
    taxonomy covers only failures that make a run impossible.

  Security / Safety Notes:
    Messages expose file paths and URLs only.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Propagated by configuration, loading, probing, and logging
    code up to the binary entry point.

  Revision History:
    2026-10-17 RMS  Established regcheck error taxonomy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for CI tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for regcheck operations.
pub type Result<T> = std::result::Result<T, RegcheckError>;

/// Error domains that abort a validation run.
#[derive(Debug, Error)]
pub enum RegcheckError {
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RegcheckError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            RegcheckError::Config(_) => 20,
            RegcheckError::Network(_) => 30,
            RegcheckError::Serialization(_) => 31,
            RegcheckError::Filesystem(_) => 40,
            RegcheckError::Io(_) => 41,
            RegcheckError::Runtime(_) => 50,
        }
    }
}

/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Library surface of the registry validator: typed registry
    model, loader, URL probing, validation engine, and report.

  Security / Safety Notes:
    See individual modules; nothing here performs I/O.

  Dependencies:
    None beyond the modules it re-exports.

  Operational Scope:
    Linked by the `rainmeas-regcheck` binary and by embedders
    that supply their own URL checker.

  Revision History:
    2026-10-17 RMS  Split library surface from the binary.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Narrow public surface
============================================================*/

pub mod config;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod logger;
pub mod probe;
pub mod report;
pub mod validator;

pub use probe::{ProbeOutcome, UrlChecker};
pub use report::{Report, Violation, ViolationKind};
pub use validator::{check_index_consistency, ProbePolicy, Validator};

/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for the registry validator. Loads the index
    and package descriptors, runs every consistency check,
    and reports violations with a CI-friendly exit code.

  Security / Safety Notes:
    Read-only access to the registry checkout; outbound
    HEAD/GET requests to declared download URLs only.

  Dependencies:
    clap for CLI parsing, chrono for session stamps, tokio
    runtime for the probe pool.

  Operational Scope:
    Invoked by the registry CI workflow once per change, or
    locally by maintainers before opening a pull request.

  Revision History:
    2026-10-17 RMS  Authored regcheck runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{ArgAction, Parser, ValueEnum};

use rainmeas_regcheck::config::RegcheckConfig;
use rainmeas_regcheck::error::{RegcheckError, Result};
use rainmeas_regcheck::loader::load_registry;
use rainmeas_regcheck::logger::Logger;
use rainmeas_regcheck::probe::HttpUrlChecker;
use rainmeas_regcheck::report::{write_report, Report};
use rainmeas_regcheck::Validator;

/// Output rendering for the report on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Command-line arguments for Rainmeas-Regcheck.
#[derive(Debug, Parser)]
#[command(
    name = "Rainmeas-Regcheck",
    version,
    about = "Consistency validator for the rainmeas package registry"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Registry checkout root.
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,
    /// Index file, relative to the root.
    #[arg(long, value_name = "PATH")]
    index: Option<PathBuf>,
    /// Descriptor directory, relative to the root.
    #[arg(long, value_name = "DIR")]
    packages_dir: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH", conflicts_with = "no_log")]
    log: Option<PathBuf>,
    /// Do not write a session log file.
    #[arg(long, action = ArgAction::SetTrue)]
    no_log: bool,
    /// Skip download URL reachability probes.
    #[arg(long, action = ArgAction::SetTrue)]
    no_network: bool,
    /// Per-probe timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
    /// Deadline for the whole probe phase in seconds.
    #[arg(long, value_name = "SECS")]
    deadline: Option<u64>,
    /// Maximum concurrent probes.
    #[arg(long, value_name = "N")]
    max_parallel: Option<usize>,
    /// Extra attempts for inconclusive probes.
    #[arg(long, value_name = "N")]
    retries: Option<usize>,
    /// Allow descriptors whose declared name differs from the file name.
    #[arg(long, action = ArgAction::SetTrue)]
    allow_name_mismatch: bool,
    /// Exit non-zero when probes remain inconclusive.
    #[arg(long, action = ArgAction::SetTrue)]
    fail_on_inconclusive: bool,
    /// Report format on stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Also write the JSON report to this path.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut RegcheckConfig) {
        if let Some(root) = &self.root {
            config.registry.root = root.clone();
        }
        if let Some(index) = &self.index {
            config.registry.index = index.clone();
        }
        if let Some(packages_dir) = &self.packages_dir {
            config.registry.packages_dir = packages_dir.clone();
        }
        if self.allow_name_mismatch {
            config.registry.require_file_name_match = false;
        }
        if self.no_network {
            config.probe.enabled = false;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout = timeout.max(1);
        }
        if let Some(deadline) = self.deadline {
            config.probe.deadline = deadline.max(config.probe.timeout);
        }
        if let Some(max_parallel) = self.max_parallel {
            config.probe.max_parallel_probes = max_parallel.max(1);
        }
        if let Some(retries) = self.retries {
            config.probe.retries = retries;
        }
        if self.fail_on_inconclusive {
            config.report.fail_on_inconclusive = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Rainmeas-Regcheck] {err}");
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = RegcheckConfig::load_from_optional_path(cli.config.as_deref())?;
    cli.apply(&mut config);

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = if cli.no_log {
        None
    } else {
        cli.log
            .clone()
            .or_else(|| Some(config.log_dir().join(format!("regcheck_{session_stamp}.log"))))
    };
    let logger = Logger::new(log_path, cli.verbose)?;
    logger.info(
        "INIT",
        format!("Validating registry at {}", config.registry.root.display()),
    );

    let snapshot = load_registry(&config.index_path(), &config.packages_path()).await?;
    logger.info(
        "REGISTRY",
        format!("Found {} package files", snapshot.descriptors.len()),
    );

    let checker = Arc::new(HttpUrlChecker::new(&config.probe)?);
    let validator = Validator::from_config(checker, &config);
    let report = validator
        .validate_all(&snapshot.index, &snapshot.descriptors, &logger)
        .await;

    emit(&report, cli.format)?;
    if let Some(path) = &cli.report {
        write_report(&report, path)?;
        logger.info("REPORT", format!("Report written to {}", path.display()));
    }

    let meta = &report.metadata;
    logger.info(
        "SUMMARY",
        format!(
            "passed={} schema={} index={} unreachable={} inconclusive={}",
            report.passed,
            meta.schema_errors,
            meta.index_mismatches,
            meta.unreachable_urls,
            meta.transient_network_errors
        ),
    );
    logger.finalize()?;

    Ok(report.exit_code(config.report.fail_on_inconclusive))
}

fn emit(report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(report).map_err(|err| {
                RegcheckError::Serialization(format!("Failed to render report: {err}"))
            })?;
            println!("{rendered}");
        }
    }
    Ok(())
}

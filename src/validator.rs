/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::validator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Check the registry index and package descriptors for
    schema validity, mutual consistency, and download
    reachability, aggregating every violation into a report.

  Security / Safety Notes:
    Inputs are read-only; network access goes exclusively
    through the injected URL checker.

  Dependencies:
    tokio (JoinSet, Semaphore, timeout_at) for the bounded
    probe pool.

  Operational Scope:
    Invoked once per CI run by main, and directly by tests
    with a fake URL checker.

  Revision History:
    2026-10-17 RMS  Authored validation engine.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Batch linting; no fail-fast paths
    - One result slot per probe, merged after join
    - Deadline-bounded network phase
============================================================*/

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::config::{ProbeConfig, RegcheckConfig};
use crate::descriptor::{declared_name, PackageDescriptor, RegistryIndex};
use crate::loader::{DescriptorFile, IndexFile};
use crate::logger::Logger;
use crate::probe::{probe_with_retries, ProbeOutcome, UrlChecker};
use crate::report::{Report, Violation, ViolationKind};

/// Limits applied to the reachability phase.
#[derive(Debug, Clone)]
pub struct ProbePolicy {
    pub enabled: bool,
    pub timeout: Duration,
    pub deadline: Duration,
    pub max_parallel: usize,
    pub retries: usize,
}

impl From<&ProbeConfig> for ProbePolicy {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            enabled: config.enabled,
            timeout: config.timeout(),
            deadline: config.deadline(),
            max_parallel: config.max_parallel_probes.max(1),
            retries: config.retries,
        }
    }
}

/// A descriptor as seen by the index check: its identity and advertised latest.
#[derive(Debug, Clone, Copy)]
pub struct IndexedPackage<'a> {
    pub name: &'a str,
    pub file: &'a str,
    pub latest: Option<&'a str>,
}

struct Inspection<'a> {
    file: &'a DescriptorFile,
    /// Declared name when usable, file stem otherwise.
    identity: &'a str,
    descriptor: Option<PackageDescriptor>,
    violations: Vec<Violation>,
}

impl Inspection<'_> {
    fn as_indexed(&self) -> IndexedPackage<'_> {
        IndexedPackage {
            name: self.identity,
            file: &self.file.file_name,
            latest: self.descriptor.as_ref().map(|d| d.latest.as_str()),
        }
    }
}

struct ProbeTarget<'a> {
    package: &'a str,
    file: &'a str,
    version: &'a str,
    url: &'a str,
}

/// Registry validation engine.
pub struct Validator {
    checker: Arc<dyn UrlChecker>,
    policy: ProbePolicy,
    require_file_name_match: bool,
}

impl Validator {
    pub fn new(checker: Arc<dyn UrlChecker>, policy: ProbePolicy) -> Self {
        Self {
            checker,
            policy,
            require_file_name_match: true,
        }
    }

    pub fn from_config(checker: Arc<dyn UrlChecker>, config: &RegcheckConfig) -> Self {
        Self::new(checker, ProbePolicy::from(&config.probe))
            .require_file_name_match(config.registry.require_file_name_match)
    }

    pub fn require_file_name_match(mut self, enabled: bool) -> Self {
        self.require_file_name_match = enabled;
        self
    }

    /// Schema violations of a single descriptor file.
    pub fn check_schema(&self, file: &DescriptorFile) -> Vec<Violation> {
        self.inspect(file).violations
    }

    fn inspect<'a>(&self, file: &'a DescriptorFile) -> Inspection<'a> {
        let schema_error = |package: &str, message: String| {
            Violation::new(ViolationKind::SchemaError, package, message).in_file(&file.file_name)
        };

        let document = match &file.document {
            Ok(document) => document,
            Err(reason) => {
                return Inspection {
                    file,
                    identity: &file.stem,
                    descriptor: None,
                    violations: vec![schema_error(file.stem.as_str(), reason.clone())],
                };
            }
        };

        let identity = declared_name(document).unwrap_or(file.stem.as_str());
        let (mut descriptor, mut violations) = match PackageDescriptor::from_document(document) {
            Ok(descriptor) => (Some(descriptor), Vec::new()),
            Err(problems) => (
                None,
                problems
                    .into_iter()
                    .map(|problem| schema_error(identity, problem))
                    .collect(),
            ),
        };

        if self.require_file_name_match && identity != file.stem {
            violations.push(schema_error(
                identity,
                format!(
                    "Package name '{identity}' doesn't match filename '{}'",
                    file.stem
                ),
            ));
            descriptor = None;
        }

        Inspection {
            file,
            identity,
            descriptor,
            violations,
        }
    }

    /// Probe every download URL of one descriptor.
    pub async fn check_reachability(
        &self,
        descriptor: &PackageDescriptor,
        file: &str,
    ) -> Vec<Violation> {
        let targets = reachability_targets(descriptor, file);
        self.probe_targets(&targets).await.0
    }

    async fn probe_targets(&self, targets: &[ProbeTarget<'_>]) -> (Vec<Violation>, usize) {
        if !self.policy.enabled || targets.is_empty() {
            return (Vec::new(), 0);
        }

        let mut slot_of: BTreeMap<&str, usize> = BTreeMap::new();
        let mut urls: Vec<&str> = Vec::new();
        for target in targets {
            slot_of.entry(target.url).or_insert_with(|| {
                urls.push(target.url);
                urls.len() - 1
            });
        }

        let mut slots: Vec<Option<ProbeOutcome>> = vec![None; urls.len()];
        let semaphore = Arc::new(Semaphore::new(self.policy.max_parallel));
        let mut tasks = JoinSet::new();
        for (slot, url) in urls.iter().enumerate() {
            let checker = Arc::clone(&self.checker);
            let semaphore = Arc::clone(&semaphore);
            let url = (*url).to_string();
            let timeout = self.policy.timeout;
            let retries = self.policy.retries;
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => probe_with_retries(checker.as_ref(), &url, timeout, retries).await,
                    Err(_) => ProbeOutcome::Inconclusive("Probe pool closed".into()),
                };
                (slot, outcome)
            });
        }

        let deadline = Instant::now() + self.policy.deadline;
        loop {
            let next = timeout_at(deadline, tasks.join_next()).await;
            match next {
                Ok(Some(Ok((slot, outcome)))) => slots[slot] = Some(outcome),
                // A failed task leaves its slot empty; it is reported below.
                Ok(Some(Err(_))) => {}
                Ok(None) => break,
                Err(_) => {
                    tasks.abort_all();
                    break;
                }
            }
        }

        let violations = targets
            .iter()
            .filter_map(|target| {
                let outcome = &slots[slot_of[target.url]];
                let (kind, message) = match outcome {
                    Some(ProbeOutcome::Reachable) => return None,
                    Some(ProbeOutcome::Unreachable(detail)) => (
                        ViolationKind::UnreachableUrl,
                        format!("Download URL {} unreachable: {detail}", target.url),
                    ),
                    Some(ProbeOutcome::Inconclusive(detail)) => (
                        ViolationKind::TransientNetworkError,
                        format!("Download URL {} inconclusive: {detail}", target.url),
                    ),
                    None => (
                        ViolationKind::TransientNetworkError,
                        format!(
                            "Download URL {} inconclusive: probe did not finish before the deadline",
                            target.url
                        ),
                    ),
                };
                Some(
                    Violation::new(kind, target.package, message)
                        .in_file(target.file)
                        .for_version(target.version),
                )
            })
            .collect();
        (violations, urls.len())
    }

    /// Run every check over the full input set.
    pub async fn validate_all(
        &self,
        index: &IndexFile,
        descriptors: &[DescriptorFile],
        logger: &Logger,
    ) -> Report {
        let inspections: Vec<Inspection<'_>> =
            descriptors.iter().map(|file| self.inspect(file)).collect();
        let mut violations: Vec<Violation> = inspections
            .iter()
            .flat_map(|inspection| inspection.violations.iter().cloned())
            .collect();
        let valid = inspections
            .iter()
            .filter(|inspection| inspection.descriptor.is_some())
            .count();
        logger.info(
            "SCHEMA",
            format!(
                "{valid}/{} descriptors schema-valid",
                inspections.len()
            ),
        );

        let index_entries = match &index.index {
            Ok(registry_index) => {
                let packages: Vec<IndexedPackage<'_>> =
                    inspections.iter().map(Inspection::as_indexed).collect();
                let mismatches = check_index_consistency(registry_index, &packages);
                logger.info(
                    "INDEX",
                    format!(
                        "{} index entries, {} mismatches",
                        registry_index.len(),
                        mismatches.len()
                    ),
                );
                if registry_index.is_empty() {
                    logger.warn("INDEX", format!("{} lists no packages", index.file_name));
                }
                violations.extend(mismatches);
                registry_index.len()
            }
            Err(reason) => {
                logger.error("INDEX", format!("{}: {reason}", index.file_name));
                violations.push(
                    Violation::new(ViolationKind::SchemaError, &index.file_name, reason.clone())
                        .in_file(&index.file_name),
                );
                0
            }
        };

        let targets: Vec<ProbeTarget<'_>> = inspections
            .iter()
            .filter_map(|inspection| {
                inspection
                    .descriptor
                    .as_ref()
                    .map(|descriptor| reachability_targets(descriptor, &inspection.file.file_name))
            })
            .flatten()
            .collect();
        let (probe_violations, urls_probed) = self.probe_targets(&targets).await;
        if self.policy.enabled {
            logger.info(
                "PROBE",
                format!(
                    "{urls_probed} URLs probed, {} problems",
                    probe_violations.len()
                ),
            );
        } else {
            logger.warn("PROBE", "Reachability probes disabled");
        }
        for violation in &probe_violations {
            logger.debug("PROBE", violation.to_string());
        }
        violations.extend(probe_violations);

        Report::new(descriptors.len(), index_entries, urls_probed, violations)
    }
}

fn reachability_targets<'a>(descriptor: &'a PackageDescriptor, file: &'a str) -> Vec<ProbeTarget<'a>> {
    descriptor
        .downloads()
        .map(|(version, url)| ProbeTarget {
            package: &descriptor.name,
            file,
            version,
            url,
        })
        .collect()
}

/// Symmetric index/descriptor comparison by exact name.
pub fn check_index_consistency(
    index: &RegistryIndex,
    packages: &[IndexedPackage<'_>],
) -> Vec<Violation> {
    fn mismatch(name: &str, message: String) -> Violation {
        Violation::new(ViolationKind::IndexMismatch, name, message)
    }
    let mut violations = Vec::new();

    let mut listed: BTreeMap<&str, usize> = BTreeMap::new();
    for name in index.names() {
        *listed.entry(name).or_default() += 1;
    }
    for (name, count) in &listed {
        if *count > 1 {
            violations.push(mismatch(name, format!("Package '{name}' listed {count} times in index")));
        }
    }

    let mut owners: BTreeMap<&str, Vec<&IndexedPackage<'_>>> = BTreeMap::new();
    for package in packages {
        owners.entry(package.name).or_default().push(package);
    }

    for (name, files) in &owners {
        if files.len() > 1 {
            let mut list: Vec<&str> = files.iter().map(|package| package.file).collect();
            list.sort_unstable();
            violations.push(mismatch(
                name,
                format!(
                    "Package name '{name}' declared by multiple files: {}",
                    list.join(", ")
                ),
            ));
        }
        if !listed.contains_key(name) {
            for package in files {
                violations.push(
                    mismatch(
                        name,
                        format!("Package file '{}' not referenced in index", package.file),
                    )
                    .in_file(package.file),
                );
            }
        }
    }

    for entry in &index.entries {
        let Some(files) = owners.get(entry.name.as_str()) else {
            if listed.get(entry.name.as_str()).is_some() {
                violations.push(mismatch(
                    &entry.name,
                    format!(
                        "Package '{}' in index but no corresponding descriptor file",
                        entry.name
                    ),
                ));
                listed.remove(entry.name.as_str());
            }
            continue;
        };
        if let ([package], Some(pointer)) = (files.as_slice(), entry.pointer.as_deref()) {
            if let Some(latest) = package.latest.filter(|latest| *latest != pointer) {
                violations.push(
                    mismatch(
                        &entry.name,
                        format!("Index points '{}' at {pointer} but latest is {latest}", entry.name),
                    )
                    .in_file(package.file),
                );
            }
        }
    }

    violations
}

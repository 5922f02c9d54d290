/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::loader
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Read the registry index and every package descriptor file
    from disk into parsed documents for a single validation pass.

  Security / Safety Notes:
    Read-only filesystem access; nothing is written back.

  Dependencies:
    tokio::fs for async reads, serde_json for parsing.

  Operational Scope:
    Supplies the validator with its immutable input set.

  Revision History:
    2026-10-17 RMS  Crafted registry loader.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering by file name
    - Parse failures retained as data, never fatal
============================================================*/

use std::path::Path;

use serde_json::Value;

use crate::descriptor::RegistryIndex;
use crate::error::{RegcheckError, Result};

const DESCRIPTOR_EXTENSION: &str = "json";

/// A descriptor file as found on disk.
#[derive(Debug, Clone)]
pub struct DescriptorFile {
    pub file_name: String,
    /// File name without the `.json` suffix.
    pub stem: String,
    pub document: std::result::Result<Value, String>,
}

impl DescriptorFile {
    pub fn parse(file_name: impl Into<String>, raw: &str) -> Self {
        let file_name = file_name.into();
        let stem = file_name
            .strip_suffix(".json")
            .unwrap_or(&file_name)
            .to_string();
        let document = serde_json::from_str(raw).map_err(|err| format!("Invalid JSON: {err}"));
        Self {
            file_name,
            stem,
            document,
        }
    }

    /// A descriptor whose bytes could not be read at all.
    pub fn unreadable(file_name: impl Into<String>, err: &std::io::Error) -> Self {
        let file_name = file_name.into();
        Self {
            stem: file_name.trim_end_matches(".json").to_string(),
            file_name,
            document: Err(format!("Failed to read: {err}")),
        }
    }
}

/// The index file and its parse outcome.
#[derive(Debug, Clone)]
pub struct IndexFile {
    pub file_name: String,
    pub index: std::result::Result<RegistryIndex, String>,
}

impl IndexFile {
    pub fn parse(file_name: impl Into<String>, raw: &str) -> Self {
        let index = serde_json::from_str::<Value>(raw)
            .map_err(|err| format!("Invalid JSON: {err}"))
            .and_then(|document| RegistryIndex::from_document(&document));
        Self {
            file_name: file_name.into(),
            index,
        }
    }

    pub fn unreadable(file_name: impl Into<String>, reason: String) -> Self {
        Self {
            file_name: file_name.into(),
            index: Err(reason),
        }
    }
}

/// Everything one validation pass looks at.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub index: IndexFile,
    pub descriptors: Vec<DescriptorFile>,
}

/// Load the index at `index_path` and all `*.json` files in `packages_dir`.
pub async fn load_registry(index_path: &Path, packages_dir: &Path) -> Result<RegistrySnapshot> {
    let index_name = display_name(index_path);
    let index = match tokio::fs::read_to_string(index_path).await {
        Ok(raw) => IndexFile::parse(index_name, &raw),
        Err(err) => IndexFile::unreadable(index_name, format!("Failed to read index: {err}")),
    };
    let descriptors = load_descriptors(packages_dir).await?;
    Ok(RegistrySnapshot { index, descriptors })
}

async fn load_descriptors(packages_dir: &Path) -> Result<Vec<DescriptorFile>> {
    let mut entries = tokio::fs::read_dir(packages_dir).await.map_err(|err| {
        RegcheckError::Filesystem(format!(
            "Packages directory {} not readable: {err}",
            packages_dir.display()
        ))
    })?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|err| {
        RegcheckError::Filesystem(format!(
            "Failed to list {}: {err}",
            packages_dir.display()
        ))
    })? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(DESCRIPTOR_EXTENSION) {
            continue;
        }
        let file_name = display_name(&path);
        // Follows symlinks; directories named `*.json` are not descriptors.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => continue,
            Ok(_) => {}
            Err(err) => {
                files.push(DescriptorFile::unreadable(file_name, &err));
                continue;
            }
        }
        let file = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => DescriptorFile::parse(file_name, &raw),
            Err(err) => DescriptorFile::unreadable(file_name, &err),
        };
        files.push(file);
    }

    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_stem_strips_extension() {
        let file = DescriptorFile::parse("foo.json", r#"{"name":"foo"}"#);
        assert_eq!(file.stem, "foo");
        assert!(file.document.is_ok());
    }

    #[test]
    fn malformed_descriptor_is_kept_as_error() {
        let file = DescriptorFile::parse("broken.json", "{ not json");
        assert_eq!(file.stem, "broken");
        assert!(file.document.unwrap_err().starts_with("Invalid JSON"));
    }

    #[test]
    fn index_shape_errors_are_reported() {
        let file = IndexFile::parse("index.json", "42");
        assert_eq!(file.index.unwrap_err(), "index must be a JSON object or array");
    }

    #[tokio::test]
    async fn loads_sorted_json_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let packages = dir.path().join("packages");
        std::fs::create_dir(&packages).unwrap();
        std::fs::write(dir.path().join("index.json"), r#"{"b":"1","a":"1"}"#).unwrap();
        std::fs::write(packages.join("b.json"), "{}").unwrap();
        std::fs::write(packages.join("a.json"), "{").unwrap();
        std::fs::write(packages.join("README.md"), "# packages").unwrap();
        std::fs::create_dir(packages.join("nested.json")).unwrap();

        let snapshot = load_registry(&dir.path().join("index.json"), &packages)
            .await
            .unwrap();
        assert_eq!(snapshot.index.index.unwrap().len(), 2);
        let names: Vec<_> = snapshot
            .descriptors
            .iter()
            .map(|file| file.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(snapshot.descriptors[0].document.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_descriptors_are_followed() {
        let dir = tempfile::tempdir().unwrap();
        let packages = dir.path().join("packages");
        std::fs::create_dir(&packages).unwrap();
        let target = dir.path().join("shared-foo.json");
        std::fs::write(&target, r#"{"name":"foo"}"#).unwrap();
        std::os::unix::fs::symlink(&target, packages.join("foo.json")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.json"), packages.join("ghost.json"))
            .unwrap();

        let snapshot = load_registry(&dir.path().join("index.json"), &packages)
            .await
            .unwrap();
        assert_eq!(snapshot.descriptors.len(), 2);
        let foo = &snapshot.descriptors[0];
        assert_eq!(foo.file_name, "foo.json");
        assert!(foo.document.is_ok());
        let ghost = &snapshot.descriptors[1];
        assert_eq!(ghost.stem, "ghost");
        assert!(ghost.document.as_ref().unwrap_err().starts_with("Failed to read"));
    }

    #[tokio::test]
    async fn missing_index_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = load_registry(&dir.path().join("index.json"), dir.path())
            .await
            .unwrap();
        assert!(snapshot.index.index.is_err());
        assert!(snapshot.descriptors.is_empty());
    }

    #[tokio::test]
    async fn missing_packages_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_registry(&dir.path().join("index.json"), &dir.path().join("packages"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegcheckError::Filesystem(_)));
    }
}

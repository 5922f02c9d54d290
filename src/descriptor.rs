/*============================================================
  Rainmeas Project: Registry Check
  Module: rainmeas_regcheck::descriptor
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Typed records for the registry index and package
    descriptors, plus the conversion from parsed JSON that
    surfaces every schema problem instead of the first one.

  Security / Safety Notes:
    Pure data conversion; no I/O performed in this module.

  Dependencies:
    serde_json for document access, reqwest::Url for URL
    syntax checks.

  Operational Scope:
    Consumed by the validator's schema and index checks.

  Revision History:
    2026-10-17 RMS  Introduced typed descriptor model.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Schema problems as values, never panics
============================================================*/

use std::collections::BTreeMap;

use reqwest::Url;
use serde_json::{Map, Value};

/// Key inside `versions` that points at the newest label.
pub const LATEST_KEY: &str = "latest";

/// One name listed in the registry index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    /// Version the index advertises for this package, when it carries one.
    pub pointer: Option<String>,
}

/// The registry-wide index, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryIndex {
    pub entries: Vec<IndexEntry>,
}

impl RegistryIndex {
    /// Accepts `{ "name": pointer, ... }` or `["name", ...]`.
    pub fn from_document(document: &Value) -> Result<Self, String> {
        match document {
            Value::Object(map) => Ok(Self {
                entries: map
                    .iter()
                    .map(|(name, value)| IndexEntry {
                        name: name.clone(),
                        pointer: pointer_of(value),
                    })
                    .collect(),
            }),
            Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for (position, item) in items.iter().enumerate() {
                    let entry = match item {
                        Value::String(name) => IndexEntry {
                            name: name.clone(),
                            pointer: None,
                        },
                        Value::Object(fields) => match fields.get("name").and_then(Value::as_str) {
                            Some(name) => IndexEntry {
                                name: name.to_string(),
                                pointer: pointer_of(item),
                            },
                            None => {
                                return Err(format!("index entry #{position} has no `name`"));
                            }
                        },
                        _ => return Err(format!("index entry #{position} is not a package name")),
                    };
                    entries.push(entry);
                }
                Ok(Self { entries })
            }
            _ => Err("index must be a JSON object or array".into()),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn pointer_of(value: &Value) -> Option<String> {
    match value {
        Value::String(version) => Some(version.clone()),
        Value::Object(fields) => fields
            .get(LATEST_KEY)
            .or_else(|| fields.get("version"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// A single published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub download: String,
}

/// Schema-valid package descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: String,
    pub author: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub license: Option<String>,
    pub versions: BTreeMap<String, VersionEntry>,
    pub latest: String,
}

impl PackageDescriptor {
    /// Convert a parsed document, collecting every schema problem.
    pub fn from_document(document: &Value) -> Result<Self, Vec<String>> {
        let Some(fields) = document.as_object() else {
            return Err(vec!["Descriptor must be a JSON object".into()]);
        };
        let mut problems = Vec::new();

        let name = required_string(fields, "name", &mut problems);
        if matches!(&name, Some(value) if value.trim().is_empty()) {
            problems.push("Field `name` must be a non-empty string".into());
        }
        let author = required_string(fields, "author", &mut problems);
        let description = optional_string(fields, "description", &mut problems);
        let license = optional_string(fields, "license", &mut problems);
        let homepage = optional_string(fields, "homepage", &mut problems);
        if let Some(url) = &homepage {
            if let Err(err) = parse_http_url(url) {
                problems.push(format!("Field `homepage` is not a valid URL `{url}`: {err}"));
            }
        }
        let top_latest = optional_string(fields, LATEST_KEY, &mut problems);

        let versions = match fields.get("versions") {
            None => {
                problems.push("Missing required field: versions".into());
                None
            }
            Some(Value::Object(map)) => Some(parse_versions(map, top_latest, &mut problems)),
            Some(_) => {
                problems.push("Field `versions` must be an object".into());
                None
            }
        };

        match (name, author, versions, problems.is_empty()) {
            (Some(name), Some(author), Some((versions, Some(latest))), true) => Ok(Self {
                name,
                author,
                description,
                homepage,
                license,
                versions,
                latest,
            }),
            _ => Err(problems),
        }
    }

    /// Version labels with their download URLs, in label order.
    pub fn downloads(&self) -> impl Iterator<Item = (&str, &str)> {
        self.versions
            .iter()
            .map(|(label, entry)| (label.as_str(), entry.download.as_str()))
    }
}

/// Usable declared name of a document, if any.
pub fn declared_name(document: &Value) -> Option<&str> {
    document
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
}

/// Parse `raw` as an absolute http(s) URL.
pub fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|err| err.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme `{other}`")),
    }
}

type ParsedVersions = (BTreeMap<String, VersionEntry>, Option<String>);

fn parse_versions(
    map: &Map<String, Value>,
    top_latest: Option<String>,
    problems: &mut Vec<String>,
) -> ParsedVersions {
    let mut versions = BTreeMap::new();
    let mut inner_latest = None;

    for (label, value) in map {
        if label == LATEST_KEY {
            match value {
                Value::String(target) => inner_latest = Some(target.clone()),
                _ => problems.push("Field `versions.latest` must be a string".into()),
            }
            continue;
        }
        let Some(entry) = value.as_object() else {
            problems.push(format!("Version {label} is not an object"));
            continue;
        };
        match entry.get("download") {
            None => problems.push(format!("Version {label} missing download URL")),
            Some(Value::String(url)) => match parse_http_url(url) {
                Ok(_) => {
                    versions.insert(
                        label.clone(),
                        VersionEntry {
                            download: url.clone(),
                        },
                    );
                }
                Err(err) => problems.push(format!(
                    "Version {label} has an invalid download URL `{url}`: {err}"
                )),
            },
            Some(_) => problems.push(format!("Version {label} download URL must be a string")),
        }
    }

    let declared_labels = map.keys().filter(|label| *label != LATEST_KEY).count();
    if map.is_empty() {
        problems.push("Field `versions` must not be empty".into());
        return (versions, None);
    }
    if declared_labels == 0 {
        problems.push("Field `versions` lists no versions besides `latest`".into());
        return (versions, None);
    }

    let latest = match (inner_latest, top_latest) {
        (Some(inner), Some(top)) if inner != top => {
            problems.push(format!(
                "Field `latest` ({top}) disagrees with `versions.latest` ({inner})"
            ));
            return (versions, None);
        }
        (Some(latest), _) | (None, Some(latest)) => latest,
        (None, None) => {
            problems.push("Missing 'latest' field in versions".into());
            return (versions, None);
        }
    };

    if map.get(&latest).is_none() || latest == LATEST_KEY {
        problems.push(format!("Latest version '{latest}' not found in versions"));
        return (versions, None);
    }
    (versions, Some(latest))
}

fn required_string(
    fields: &Map<String, Value>,
    key: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None => {
            problems.push(format!("Missing required field: {key}"));
            None
        }
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            problems.push(format!("Field `{key}` must be a string"));
            None
        }
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(_) => {
            problems.push(format!("Field `{key}` must be a string"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "name": "foo",
            "author": "someone",
            "description": "A skin",
            "license": "MIT",
            "homepage": "https://example.com/foo",
            "versions": {
                "1.0.0": { "download": "https://example.com/foo-1.0.0.rmskin" },
                "latest": "1.0.0"
            }
        })
    }

    #[test]
    fn valid_descriptor_converts() {
        let descriptor = PackageDescriptor::from_document(&valid()).unwrap();
        assert_eq!(descriptor.name, "foo");
        assert_eq!(descriptor.latest, "1.0.0");
        assert_eq!(descriptor.versions.len(), 1);
        assert_eq!(
            descriptor.downloads().collect::<Vec<_>>(),
            vec![("1.0.0", "https://example.com/foo-1.0.0.rmskin")]
        );
    }

    #[test]
    fn top_level_latest_is_accepted() {
        let mut doc = valid();
        doc["versions"].as_object_mut().unwrap().remove("latest");
        doc["latest"] = json!("1.0.0");
        assert_eq!(PackageDescriptor::from_document(&doc).unwrap().latest, "1.0.0");
    }

    #[test]
    fn conflicting_latest_pointers_are_reported() {
        let mut doc = valid();
        doc["latest"] = json!("0.9.0");
        let problems = PackageDescriptor::from_document(&doc).unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("disagrees"));
    }

    #[test]
    fn missing_name_is_single_problem() {
        let mut doc = valid();
        doc.as_object_mut().unwrap().remove("name");
        assert_eq!(
            PackageDescriptor::from_document(&doc).unwrap_err(),
            vec!["Missing required field: name".to_string()]
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut doc = valid();
        doc["name"] = json!("  ");
        let problems = PackageDescriptor::from_document(&doc).unwrap_err();
        assert_eq!(problems, vec!["Field `name` must be a non-empty string".to_string()]);
        assert_eq!(declared_name(&doc), None);
    }

    #[test]
    fn dangling_latest_is_reported() {
        let doc = json!({
            "name": "bar",
            "author": "someone",
            "versions": {
                "1.0.0": { "download": "https://example.com/bar.zip" },
                "latest": "2.0.0"
            }
        });
        let problems = PackageDescriptor::from_document(&doc).unwrap_err();
        assert_eq!(problems, vec!["Latest version '2.0.0' not found in versions".to_string()]);
    }

    #[test]
    fn versions_with_only_latest_is_rejected() {
        let doc = json!({
            "name": "bar",
            "author": "someone",
            "versions": { "latest": "1.0.0" }
        });
        let problems = PackageDescriptor::from_document(&doc).unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("no versions besides"));
    }

    #[test]
    fn empty_versions_is_rejected() {
        let doc = json!({ "name": "bar", "author": "a", "versions": {} });
        let problems = PackageDescriptor::from_document(&doc).unwrap_err();
        assert_eq!(problems, vec!["Field `versions` must not be empty".to_string()]);
    }

    #[test]
    fn every_problem_is_collected() {
        let doc = json!({
            "author": 7,
            "versions": {
                "1.0.0": "https://legacy.example.com/a.zip",
                "1.1.0": { "download": "ftp://example.com/a.zip" },
                "1.2.0": {},
                "latest": "1.2.0"
            }
        });
        let problems = PackageDescriptor::from_document(&doc).unwrap_err();
        assert!(problems.contains(&"Missing required field: name".to_string()));
        assert!(problems.contains(&"Field `author` must be a string".to_string()));
        assert!(problems.contains(&"Version 1.0.0 is not an object".to_string()));
        assert!(problems.iter().any(|p| p.contains("unsupported scheme `ftp`")));
        assert!(problems.contains(&"Version 1.2.0 missing download URL".to_string()));
    }

    #[test]
    fn non_object_descriptor_is_rejected() {
        assert!(PackageDescriptor::from_document(&json!(["foo"])).is_err());
    }

    #[test]
    fn index_accepts_object_and_array_forms() {
        let object = RegistryIndex::from_document(&json!({
            "foo": "1.0.0",
            "bar": { "latest": "2.0.0" },
            "baz": true
        }))
        .unwrap();
        assert_eq!(object.len(), 3);
        let foo = object.entries.iter().find(|e| e.name == "foo").unwrap();
        assert_eq!(foo.pointer.as_deref(), Some("1.0.0"));
        let bar = object.entries.iter().find(|e| e.name == "bar").unwrap();
        assert_eq!(bar.pointer.as_deref(), Some("2.0.0"));
        let baz = object.entries.iter().find(|e| e.name == "baz").unwrap();
        assert_eq!(baz.pointer, None);

        let array = RegistryIndex::from_document(&json!(["foo", { "name": "bar" }])).unwrap();
        assert_eq!(array.names().collect::<Vec<_>>(), vec!["foo", "bar"]);
    }

    #[test]
    fn object_index_keeps_document_order() {
        let document: Value = serde_json::from_str(r#"{"zeta":"1","alpha":"1"}"#).unwrap();
        let index = RegistryIndex::from_document(&document).unwrap();
        assert_eq!(index.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn index_rejects_scalars_and_bad_entries() {
        assert!(RegistryIndex::from_document(&json!("foo")).is_err());
        assert!(RegistryIndex::from_document(&json!([1])).is_err());
        assert!(RegistryIndex::from_document(&json!([{ "version": "1" }])).is_err());
    }
}

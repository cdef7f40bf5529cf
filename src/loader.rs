//! Tolerant JSON artifact loading.

use serde_json::{Map, Value};

use std::path::{Path, PathBuf};

use crate::{PerfsiftError, PerfsiftResult};

/// Outcome of reading one capture artifact. Loading never fails outright.
#[derive(Debug)]
pub enum Artifact {
    Loaded(Map<String, Value>),
    Missing,
    Malformed { path: PathBuf, error: PerfsiftError },
}

impl Artifact {
    /// The document, if it was loaded and carries at least one key.
    pub fn into_document(self) -> Option<Map<String, Value>> {
        match self {
            Self::Loaded(map) if !map.is_empty() => Some(map),
            _ => None,
        }
    }

    /// Report line for a malformed artifact.
    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Malformed { path, error } => Some(format!(
                "⚠️ failed to read {}: {error}",
                path.display()
            )),
            _ => None,
        }
    }
}

pub fn load_artifact(path: &Path) -> Artifact {
    if !path.exists() {
        tracing::debug!("artifact {} not found", path.display());
        return Artifact::Missing;
    }
    match read_json_object(path) {
        Ok(map) => Artifact::Loaded(map),
        Err(error) => {
            tracing::warn!("failed to read {}: {error}", path.display());
            Artifact::Malformed {
                path: path.to_path_buf(),
                error,
            }
        }
    }
}

fn read_json_object(path: &Path) -> PerfsiftResult<Map<String, Value>> {
    let bytes = std::fs::read(path)?;
    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(map) => Ok(map),
        other => Err(PerfsiftError::Artifact(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("perfsift-loader-{name}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn missing_file_is_missing() {
        let dir = temp_dir("missing");
        let artifact = load_artifact(&dir.join("final.json"));
        assert!(matches!(artifact, Artifact::Missing));
        assert!(artifact.warning().is_none());
    }

    #[test]
    fn malformed_file_carries_parse_error() {
        let dir = temp_dir("malformed");
        let path = dir.join("final.json");
        std::fs::write(&path, b"{\"target_process_stats\": ").expect("write");
        let artifact = load_artifact(&path);
        assert!(matches!(
            artifact,
            Artifact::Malformed {
                error: PerfsiftError::Json(_),
                ..
            }
        ));
        let warning = artifact.warning().expect("warning line");
        assert!(warning.starts_with("⚠️ failed to read "));
        assert!(warning.contains("final.json"));
        assert!(artifact.into_document().is_none());
    }

    #[test]
    fn non_object_document_is_malformed() {
        let dir = temp_dir("array");
        let path = dir.join("thread_cpu_analysis.json");
        std::fs::write(&path, b"[1, 2, 3]").expect("write");
        let artifact = load_artifact(&path);
        let warning = artifact.warning().expect("warning line");
        assert!(warning.contains("expected a JSON object, found an array"));
    }

    #[test]
    fn empty_object_counts_as_no_data() {
        let dir = temp_dir("empty");
        let path = dir.join("final.json");
        std::fs::write(&path, b"{}").expect("write");
        let artifact = load_artifact(&path);
        assert!(matches!(artifact, Artifact::Loaded(_)));
        assert!(artifact.into_document().is_none());
    }

    #[test]
    fn object_document_is_loaded() {
        let dir = temp_dir("ok");
        let path = dir.join("final.json");
        std::fs::write(&path, br#"{"target_process_stats": {"cpu": {"avg_pct": 12}}}"#)
            .expect("write");
        let doc = load_artifact(&path).into_document().expect("document");
        assert!(doc.contains_key("target_process_stats"));
    }
}

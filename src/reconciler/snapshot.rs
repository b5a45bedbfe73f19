//! Bridge configuration snapshot
//!
//! The snapshot is the canonical JSON form of the typed custom data last
//! applied to the bridge. Canonical means object keys are sorted at every
//! depth, so two deliveries that differ only in field order compare equal.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SnapshotError;
use crate::framework::traits::{ParamType, TypedParam};

/// Fields the bridge cannot run without
pub const REQUIRED_FIELDS: [&str; 5] = ["isy-host", "isy-user", "isy-password", "port", "pin"];

/// Parameter schema published to the framework's configuration screen
pub fn bridge_typed_params() -> Vec<TypedParam> {
    vec![
        TypedParam::required("isy-host", "ISY Host"),
        TypedParam::required("isy-user", "ISY User"),
        TypedParam::required("isy-password", "ISY Password"),
        TypedParam::required("port", "Port").with_type(ParamType::Number),
        TypedParam::required("pin", "Pin"),
    ]
}

/// Required fields that are absent or null in `data`
///
/// Anything that is not a JSON object is missing every field.
pub fn missing_required_fields(data: Option<&Value>) -> Vec<&'static str> {
    let object = data.and_then(Value::as_object);
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| {
            object
                .and_then(|o| o.get(*field))
                .map_or(true, Value::is_null)
        })
        .collect()
}

/// Sort object keys recursively
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Canonical serialized configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    bytes: Vec<u8>,
}

impl ConfigSnapshot {
    pub fn from_value(value: &Value) -> Result<Self, SnapshotError> {
        let bytes = serde_json::to_vec(&canonicalize(value))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Load the persisted snapshot; `Ok(None)` if there is none yet
    ///
    /// A file that is not valid JSON is kept as raw bytes so the next valid
    /// delivery is seen as a change and rewrites it.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No persisted bridge configuration at {:?}", path);
                return Ok(None);
            }
            Err(source) => {
                return Err(SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Self::from_value(&value).map(Some),
            Err(e) => {
                warn!(
                    "Persisted bridge configuration {:?} is not valid JSON ({}), it will be replaced",
                    path, e
                );
                Ok(Some(Self { bytes }))
            }
        }
    }

    /// Write the snapshot to `path` atomically
    pub async fn persist(&self, path: &Path) -> Result<(), SnapshotError> {
        let io_err = |source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, &self.bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
        debug!("Persisted bridge configuration to {:?}", path);
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

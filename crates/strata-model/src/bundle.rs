//! Model bundles: named-resource sources for schema models.
//!
//! A bundle maps a model name to the JSON text describing it. The
//! directory kind resolves `<name>.model.json` on disk; the in-memory
//! kind serves registered strings and exists for test isolation.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ModelError;
use crate::model::{Entity, Model};

/// A source of named model resources.
#[derive(Debug, Clone)]
pub enum ModelBundle {
    /// Resolve `<name>.model.json` inside a directory.
    Directory(PathBuf),
    /// Serve registered resources by name.
    InMemory(BTreeMap<String, String>),
}

impl ModelBundle {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::Directory(path.into())
    }

    pub fn in_memory() -> Self {
        Self::InMemory(BTreeMap::new())
    }

    /// Register a resource on an in-memory bundle. No-op on directory bundles.
    pub fn register(&mut self, name: impl Into<String>, json: impl Into<String>) {
        if let Self::InMemory(resources) = self {
            resources.insert(name.into(), json.into());
        }
    }

    fn resource(&self, name: &str) -> Result<String, ModelError> {
        match self {
            Self::Directory(dir) => {
                let path = dir.join(format!("{name}.model.json"));
                if !path.exists() {
                    return Err(ModelError::MissingResource {
                        name: name.to_string(),
                        source_hint: path.display().to_string(),
                    });
                }
                std::fs::read_to_string(&path).map_err(|e| ModelError::Io {
                    name: name.to_string(),
                    message: format!("{}: {e}", path.display()),
                })
            }
            Self::InMemory(resources) => {
                resources
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ModelError::MissingResource {
                        name: name.to_string(),
                        source_hint: "in-memory bundle".to_string(),
                    })
            }
        }
    }
}

/// On-disk model document shape.
#[derive(Debug, Deserialize)]
struct ModelDocument {
    #[serde(default)]
    entities: Vec<Entity>,
}

/// Load and validate the named model from a bundle.
pub fn load_model(name: &str, bundle: &ModelBundle) -> Result<Model, ModelError> {
    let raw = bundle.resource(name)?;
    let document: ModelDocument =
        serde_json::from_str(&raw).map_err(|e| ModelError::Parse {
            name: name.to_string(),
            message: e.to_string(),
        })?;
    Model::from_entities(name, document.entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK_MODEL: &str = r#"{
        "entities": [
            {
                "name": "Task",
                "attributes": [
                    { "name": "title", "kind": "text" },
                    { "name": "done", "kind": "boolean", "optional": true }
                ]
            }
        ]
    }"#;

    #[test]
    fn in_memory_bundle_loads_registered_model() {
        let mut bundle = ModelBundle::in_memory();
        bundle.register("Demo", TASK_MODEL);

        let model = load_model("Demo", &bundle).expect("model should load");
        assert_eq!(model.name, "Demo");
        assert!(model.has_entity("Task"));
    }

    #[test]
    fn missing_resource_is_reported() {
        let bundle = ModelBundle::in_memory();
        let err = load_model("Nope", &bundle).expect_err("missing resource must fail");
        assert!(matches!(err, ModelError::MissingResource { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let mut bundle = ModelBundle::in_memory();
        bundle.register("Broken", "{ not json");
        let err = load_model("Broken", &bundle).expect_err("bad json must fail");
        assert!(matches!(err, ModelError::Parse { .. }));
    }

    #[test]
    fn directory_bundle_resolves_model_file() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        std::fs::write(dir.path().join("Demo.model.json"), TASK_MODEL)
            .expect("fixture should write");

        let bundle = ModelBundle::directory(dir.path());
        let model = load_model("Demo", &bundle).expect("model should load");
        assert!(model.has_entity("Task"));

        let err = load_model("Other", &bundle).expect_err("unknown name must fail");
        assert!(matches!(err, ModelError::MissingResource { .. }));
    }

    #[test]
    fn structural_validation_applies_to_bundle_loads() {
        let mut bundle = ModelBundle::in_memory();
        bundle.register(
            "Dup",
            r#"{ "entities": [ { "name": "A" }, { "name": "A" } ] }"#,
        );
        let err = load_model("Dup", &bundle).expect_err("duplicate entity must fail");
        assert!(matches!(err, ModelError::Invalid { .. }));
    }
}

//! Adjustment options applied onto an existing service spec.
//!
//! Options can be built in Rust or decoded from an untyped JSON object
//! (`AdjustOptions::from_value`). Known keys are shape-checked, unknown keys
//! are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// ValidationError は options の形が不正な場合のエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("adjust options must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("invalid adjust options: {0}")]
    InvalidField(String),
}

/// A partial change to a service.
///
/// `None` means "leave untouched". `env` / `envRemove` and `labels` /
/// `labelRemove` are applied as overlay-then-remove.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_remove: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_remove: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u64>,

    #[serde(default)]
    pub force: bool,
}

impl AdjustOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode untyped options, rejecting known keys of the wrong shape.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let kind = match value {
            serde_json::Value::Object(_) => None,
            serde_json::Value::Null => Some("null"),
            serde_json::Value::Bool(_) => Some("a boolean"),
            serde_json::Value::Number(_) => Some("a number"),
            serde_json::Value::String(_) => Some("a string"),
            serde_json::Value::Array(_) => Some("an array"),
        };
        if let Some(kind) = kind {
            return Err(ValidationError::NotAnObject(kind));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ValidationError::InvalidField(e.to_string()))
    }

    /// Options that only change the replica count (used by `scale`).
    pub fn replicas(replicas: u64) -> Self {
        Self {
            replicas: Some(replicas),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn remove_env(mut self, key: impl Into<String>) -> Self {
        self.env_remove.get_or_insert_with(Vec::new).push(key.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn remove_label(mut self, key: impl Into<String>) -> Self {
        self.label_remove
            .get_or_insert_with(Vec::new)
            .push(key.into());
        self
    }

    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }
}

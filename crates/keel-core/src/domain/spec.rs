//! Service specification documents.
//!
//! The shape follows the orchestrator's own service document, so field names
//! are serialized in PascalCase (`Name`, `TaskTemplate`, `ContainerSpec`, ...).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::ServiceId;

/// Desired state of a replicated service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSpec {
    pub name: String,

    /// Always serialized (an empty map is `{}`), which keeps inspected specs
    /// comparable.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    pub task_template: TaskTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ServiceMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_config: Option<UpdateConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskTemplate {
    pub container_spec: ContainerSpec,

    /// Bumped to force a redeploy of an otherwise unchanged spec.
    #[serde(default)]
    pub force_update: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSpec {
    pub image: String,

    /// `KEY=VALUE` entries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceMode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicated: Option<Replicated>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Replicated {
    pub replicas: u64,
}

/// Rollout mechanics handed through to the orchestrator untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateConfig {
    pub parallelism: u64,

    /// Delay between batches, in nanoseconds.
    #[serde(default)]
    pub delay: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl ServiceSpec {
    /// Convenience constructor for a service without a replica count.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_template: TaskTemplate {
                container_spec: ContainerSpec {
                    image: image.into(),
                    env: Vec::new(),
                },
                force_update: 0,
            },
            ..Self::default()
        }
    }

    pub fn with_replicas(mut self, replicas: u64) -> Self {
        self.set_replicas(replicas);
        self
    }

    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.task_template.container_spec.env.push(entry.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn image(&self) -> &str {
        &self.task_template.container_spec.image
    }

    pub fn env(&self) -> &[String] {
        &self.task_template.container_spec.env
    }

    /// Replica count, if the spec is in replicated mode.
    pub fn replicas(&self) -> Option<u64> {
        self.mode
            .as_ref()
            .and_then(|mode| mode.replicated)
            .map(|replicated| replicated.replicas)
    }

    /// Creates the replicated-mode substructure when missing.
    pub fn set_replicas(&mut self, replicas: u64) {
        let mode = self.mode.get_or_insert(ServiceMode { replicated: None });
        mode.replicated = Some(Replicated { replicas });
    }
}

/// A service as currently stored by the orchestrator.
///
/// `version` is the optimistic-concurrency token that every update must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub id: ServiceId,
    pub version: u64,
    pub spec: ServiceSpec,
}

//! Domain model (IDs, specs, tasks, options, events, errors).

pub mod auth;
pub mod errors;
pub mod events;
pub mod ids;
pub mod options;
pub mod spec;
pub mod state;
pub mod task;

pub use self::auth::RegistryAuth;
pub use self::errors::{ErrorKind, LifecycleError, OrchestratorError};
pub use self::events::{EventCategory, MonitorEvent};
pub use self::ids::{ServiceId, TaskId};
pub use self::options::{AdjustOptions, ValidationError};
pub use self::spec::{
    ContainerSpec, Replicated, ServiceMode, ServiceSnapshot, ServiceSpec, TaskTemplate,
    UpdateConfig,
};
pub use self::state::{MonitorPhase, TaskPhase, TaskState};
pub use self::task::Task;

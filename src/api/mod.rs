//! Purpose: Define the public Rust API boundary for roxstage.
//! Exports: Lifecycle runner, Rox gate/cleanup, collaborators, options, errors.
//! Role: Public, additive-only surface used by the CLI, tests, and embedding build tools.
//! Invariants: This module is the only public path to the core modules.

pub use crate::core::cleanup::CleanupDispatcher;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind, Phase};
pub use crate::core::filter::{Encoding, FilterRequest, PropertyFilter, ResourceFilter};
pub use crate::core::gate::{
    ActivationGate, ActivationState, ConfigIssue, InactiveReason, validate_config_path,
};
pub use crate::core::lifecycle::{Lifecycle, execute, execute_lifecycle};
pub use crate::core::log::{LogEntry, LogLevel, Logger, RecordingLogger, TracingLogger};
pub use crate::core::options::{
    ARTIFACT_NAME, CONFIG_EXTENSION, DEFAULT_ENCODING, PluginOptions, ProjectContext,
    default_config_path,
};
pub use crate::core::remove::{DEFAULT_EXCLUDES, FileRemover, FileSet, GlobRemover};
pub use crate::core::staging::{Feature, FeatureContext, RoxStaging};

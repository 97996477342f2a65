//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod codespace;
pub mod config;
pub mod error;
pub mod machine;
pub mod retention;
pub mod ssh;

pub use codespace::{
    Codespace, CodespaceState, ConnectionInfo, CreateParams, DevContainerEntry, PostCreateState,
    PostCreateStatus, Repository, User,
};
pub use config::{CliConfig, validate_config_key, validate_config_value};
pub use error::{ApiError, CodespaceError, ConfigError};
pub use machine::{Machine, MachinePolicy, build_display_name};
pub use retention::{NullableDuration, RetentionSpec};

//! Configuration loading, validation, and env substitution.
//!
//! Config files: `wxrelay.toml`, `wxrelay.yaml`, or `wxrelay.json`
//! Searched in `./` then `~/.config/wxrelay/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AlertsConfig, DeliveryConfig, PlatformsConfig, RelayConfig, StorageConfig,
        SupervisorConfig, XmppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};

//! Configuration loading, validation and env substitution.
//!
//! Config files: `relay.toml`, `relay.yaml`, `relay.yml` or `relay.json`,
//! searched in `./` then the user config directory (`~/.config/relay/` on
//! Linux).
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw
//! file before parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{ConfigFormat, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AgentConfig, AttachmentsConfig, ChatConfig, RelayConfig, SlackConfig, TelegramConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_config, validate_str},
};

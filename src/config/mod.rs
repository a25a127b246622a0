//! Configuration module for proctools
//!
//! Provides XDG-compliant layered configuration loading for runner
//! defaults and logging.

pub mod loader;
pub mod model;

pub use loader::{active_layers, config_layers, load_config, ConfigLayer, LayerScope, ENV_PREFIX};
pub use model::*;

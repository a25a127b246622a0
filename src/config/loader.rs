//! Layered configuration loading
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. `/etc/proctools/config.toml`
//! 3. `$XDG_CONFIG_HOME/proctools/config.toml`
//! 4. `~/.proctools.toml`
//! 5. `./.proctools.toml`
//! 6. The file named by `--config`
//! 7. `PROCTOOLS_*` environment variables (`__` separates nested keys)

use std::fmt;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use super::model::Config;
use crate::error::ProcError;

const APP_NAME: &str = "proctools";

/// Environment variable prefix, e.g. `PROCTOOLS_DEFAULTS__STDOUT=inherit`
pub const ENV_PREFIX: &str = "PROCTOOLS_";

/// Where a configuration file layer comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerScope {
    System,
    User,
    Home,
    Project,
    Explicit,
}

impl fmt::Display for LayerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerScope::System => "system",
            LayerScope::User => "user",
            LayerScope::Home => "home",
            LayerScope::Project => "project",
            LayerScope::Explicit => "--config",
        };
        f.write_str(name)
    }
}

/// One configuration file in the layering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub scope: LayerScope,
    pub path: PathBuf,
}

/// Candidate file layers in priority order (lowest first), existing or not
pub fn config_layers(explicit: Option<&Path>) -> Vec<ConfigLayer> {
    let mut layers = vec![ConfigLayer {
        scope: LayerScope::System,
        path: Path::new("/etc").join(APP_NAME).join("config.toml"),
    }];

    if let Some(dir) = dirs::config_dir() {
        layers.push(ConfigLayer {
            scope: LayerScope::User,
            path: dir.join(APP_NAME).join("config.toml"),
        });
    }
    if let Some(home) = dirs::home_dir() {
        layers.push(ConfigLayer {
            scope: LayerScope::Home,
            path: home.join(format!(".{}.toml", APP_NAME)),
        });
    }
    layers.push(ConfigLayer {
        scope: LayerScope::Project,
        path: PathBuf::from(format!(".{}.toml", APP_NAME)),
    });

    if let Some(path) = explicit {
        layers.push(ConfigLayer {
            scope: LayerScope::Explicit,
            path: path.to_path_buf(),
        });
    }

    layers
}

/// File layers that exist on disk
pub fn active_layers(explicit: Option<&Path>) -> Vec<ConfigLayer> {
    config_layers(explicit)
        .into_iter()
        .filter(|layer| layer.path.is_file())
        .collect()
}

/// Load and validate the layered configuration
///
/// # Errors
/// * `ProcError::Config` - If the `--config` file is missing, a layer does not
///   parse, or `defaults.working_dir` cannot be expanded
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ProcError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(ProcError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
    }

    let mut figment = Figment::from(Serialized::defaults(Config::default()));
    for layer in active_layers(explicit) {
        tracing::debug!(scope = %layer.scope, path = %layer.path.display(), "config layer");
        figment = figment.merge(Toml::file(&layer.path));
    }

    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ProcError::Config(e.to_string()))?;

    validate(&config)?;
    Ok(config)
}

/// Reject settings that would only fail later, at launch time
fn validate(config: &Config) -> Result<(), ProcError> {
    if let Some(dir) = config.defaults.resolved_working_dir()? {
        if !dir.is_dir() {
            // May be created before anything is launched
            tracing::warn!(dir = %dir.display(), "configured working_dir does not exist");
        }
    }
    Ok(())
}

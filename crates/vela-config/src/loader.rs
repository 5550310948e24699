//! TOML config loading: read from an explicit path or a default location.

use std::path::Path;

use tracing::{info, warn};
use vela_common::ConfigError;

use crate::schema::VelaConfig;
use crate::validation;

const DEFAULT_LOCATIONS: &[&str] = &["vela.toml", "config/vela.toml"];

/// Load config from a specific TOML file path.
///
/// Missing fields are filled from serde defaults. After parsing, the
/// config is validated; validation failures are hard errors since a bad
/// trigger table or zero timeout would wedge the pipeline.
pub fn load_from_path(path: &Path) -> Result<VelaConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound(path.to_path_buf()))?;

    let config: VelaConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    validation::validate(&config)?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the first default location that exists, or fall back
/// to defaults with a warning.
pub fn load_config() -> Result<VelaConfig, ConfigError> {
    for candidate in DEFAULT_LOCATIONS {
        let path = Path::new(candidate);
        if path.exists() {
            return load_from_path(path);
        }
    }
    warn!("no config file found, using defaults");
    Ok(VelaConfig::default())
}

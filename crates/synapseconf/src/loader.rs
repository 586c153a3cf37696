//! Config file discovery, layered merging, and environment variable overlay.

use crate::{ConfigError, SynapseConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with an explicit override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/synapse/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("synapse/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("synapse.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read one config layer as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_table(&contents, path)
}

fn parse_table(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge `overlay` into `base`. Nested tables merge key by key; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Deserialize a merged table; missing sections and keys take defaults.
pub fn from_table(table: toml::Table) -> Result<SynapseConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Invalid(e.to_string()))
}

/// Apply overrides from an explicit set of variables.
pub fn apply_env_overrides_from<I>(config: &mut SynapseConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut openai_key = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "SYNAPSE_MODEL_BASE_URL" => {
                config.model.base_url = value;
                true
            }
            "SYNAPSE_MODEL" => {
                config.model.model = value;
                true
            }
            "SYNAPSE_API_KEY" => {
                config.model.api_key = Some(value);
                true
            }
            "OPENAI_API_KEY" => {
                openai_key = Some(value);
                false
            }
            "SYNAPSE_REQUEST_TIMEOUT_SECS" => match value.parse() {
                Ok(secs) => {
                    config.model.request_timeout_secs = secs;
                    true
                }
                Err(_) => false,
            },
            "SYNAPSE_DATASET" => {
                config.dataset.path = Some(PathBuf::from(value));
                true
            }
            "SYNAPSE_HOST" => {
                config.bind.host = value;
                true
            }
            "SYNAPSE_HTTP_PORT" => match value.parse() {
                Ok(port) => {
                    config.bind.http_port = port;
                    true
                }
                Err(_) => false,
            },
            "SYNAPSE_LOG_LEVEL" | "RUST_LOG" => {
                config.telemetry.log_level = value;
                true
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }

    // Only fills the gap; an explicitly configured key wins
    if config.model.api_key.is_none() {
        if let Some(key) = openai_key {
            config.model.api_key = Some(key);
            sources.env_overrides.push("OPENAI_API_KEY".to_string());
        }
    }
}

/// Expand `~/` and `$VAR/` prefixes in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        match directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else if let Some(var_path) = path.strip_prefix('$') {
        let (var_name, rest) = match var_path.find('/') {
            Some(pos) => (&var_path[..pos], Some(&var_path[pos + 1..])),
            None => (var_path, None),
        };
        match (env::var(var_name), rest) {
            (Ok(value), Some(rest)) => PathBuf::from(value).join(rest),
            (Ok(value), None) => PathBuf::from(value),
            (Err(_), _) => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    }
}

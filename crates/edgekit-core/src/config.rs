use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::root::StoreRoot;

pub const CONFIG_FILE_NAME: &str = "edgekit.toml";

pub const ENV_FUNCTIONS_DIR: &str = "EDGEKIT_FUNCTIONS_DIR";
pub const ENV_BACKEND_URL: &str = "EDGEKIT_BACKEND_URL";
pub const ENV_SERVICE_ROLE_KEY: &str = "EDGEKIT_SERVICE_ROLE_KEY";

#[derive(Debug, Default, Deserialize)]
pub struct EdgekitConfig {
    #[serde(default)]
    pub functions: FunctionsConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Deserialize)]
pub struct FunctionsConfig {
    /// Root of the function store. Holds one directory per function and the
    /// shared `.env` secret file.
    pub dir: Option<PathBuf>,
    /// Extension of the entrypoint file written on deploy (`index.<ext>`).
    #[serde(default = "default_source_ext")]
    pub source_ext: String,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            source_ext: default_source_ext(),
        }
    }
}

fn default_source_ext() -> String {
    "ts".into()
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_restart_enabled")]
    pub restart_enabled: bool,
    /// Program and arguments used to restart the edge runtime.
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,
    #[serde(default = "default_restart_timeout_secs")]
    pub restart_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            restart_enabled: default_restart_enabled(),
            restart_command: default_restart_command(),
            restart_timeout_secs: default_restart_timeout_secs(),
        }
    }
}

fn default_restart_enabled() -> bool {
    true
}
fn default_restart_command() -> Vec<String> {
    vec![
        "docker".into(),
        "restart".into(),
        "supabase-edge-functions".into(),
    ]
}
fn default_restart_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    pub service_role_key: Option<String>,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            service_role_key: None,
            timeout_secs: default_backend_timeout_secs(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".into()
}
fn default_backend_timeout_secs() -> u64 {
    60
}

impl EdgekitConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Default user-level config location: `~/.config/edgekit/edgekit.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("edgekit").join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `explicit`, or the first of `./edgekit.toml`
    /// and [`default_path`](Self::default_path) that exists. Falls back to
    /// built-in defaults when no file is found. Environment overrides are
    /// applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let candidates = [Some(PathBuf::from(CONFIG_FILE_NAME)), Self::default_path()];
                match candidates.into_iter().flatten().find(|p| p.is_file()) {
                    Some(path) => {
                        tracing::debug!(path = %path.display(), "Loading config");
                        Self::from_file(&path)?
                    }
                    None => {
                        tracing::debug!("No config file found, using defaults");
                        Self::default()
                    }
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `EDGEKIT_*` overrides. `lookup` abstracts the environment so
    /// tests don't have to mutate process state.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_FUNCTIONS_DIR) {
            self.functions.dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = non_empty(ENV_BACKEND_URL) {
            self.backend.url = url;
        }
        if let Some(key) = non_empty(ENV_SERVICE_ROLE_KEY) {
            self.backend.service_role_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.restart_enabled && self.runtime.restart_command.is_empty() {
            return Err(ConfigError::Invalid(
                "runtime.restart_command must not be empty when restarts are enabled".into(),
            ));
        }
        if self.runtime.restart_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "runtime.restart_timeout_secs must be greater than zero".into(),
            ));
        }
        let ext = &self.functions.source_ext;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Invalid(format!(
                "functions.source_ext must be a plain file extension, got '{ext}'"
            )));
        }
        Ok(())
    }

    pub fn store_root(&self) -> StoreRoot {
        StoreRoot::from_option(self.functions.dir.clone())
    }
}

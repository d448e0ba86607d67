//! promptkit configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::local::DirectorySource;
use crate::manager::ManagerOptions;

/// Main promptkit configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prompt registry connection
    pub registry: RegistryConfig,

    /// Defaults for prompt managers
    pub manager: ManagerConfig,

    /// Code generation settings
    pub generate: GenerateConfig,

    /// Log level used when none is given on the command line
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

/// Project config file, looked up from the working directory upwards
pub const PROJECT_CONFIG_FILE: &str = ".promptkit.yml";

impl Config {
    /// Load and validate configuration
    ///
    /// An explicit path must exist. Without one, the nearest project config in
    /// the working directory or its ancestors wins over the user config; with
    /// neither, defaults are used. A file that is found but does not parse or
    /// validate is an error.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(path) => Some(path.clone()),
            None => {
                let cwd = std::env::current_dir().context("Failed to read working directory")?;
                Self::discover(&cwd)
            }
        };
        let Some(path) = path else {
            tracing::info!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let config =
            Self::load_from_file(&path).with_context(|| format!("Failed to load config from {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Nearest `.promptkit.yml` from `start` upwards, else `~/.config/promptkit/promptkit.yml`
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_FILE))
            .find(|path| path.is_file())
            .or_else(|| {
                dirs::config_dir()
                    .map(|dir| dir.join("promptkit").join("promptkit.yml"))
                    .filter(|path| path.is_file())
            })
    }

    /// Reject settings no registry client or manager could run with
    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.registry.base_url)
            .with_context(|| format!("Invalid registry base-url '{}'", self.registry.base_url))?;
        if self.registry.api_key_env.trim().is_empty() {
            eyre::bail!("registry api-key-env must name an environment variable");
        }
        self.manager
            .to_options()
            .validate()
            .context("Invalid manager settings")?;
        Ok(())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.display());
        Ok(config)
    }
}

/// Prompt registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_key_env: "PROMPTKIT_API_KEY".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl RegistryConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            eyre::eyre!(
                "Registry API key not found. Set the {} environment variable.",
                self.api_key_env
            )
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Prompt manager defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Background refresh period in milliseconds (minimum 1000)
    #[serde(rename = "refresh-interval-ms")]
    pub refresh_interval_ms: u64,

    /// Whether latest/undeployed managers refresh in the background
    #[serde(rename = "refresh-enabled")]
    pub refresh_enabled: bool,

    /// Timeout for the first fetch in milliseconds
    #[serde(rename = "init-timeout-ms")]
    pub init_timeout_ms: u64,

    /// Timeout for each background fetch in milliseconds
    #[serde(rename = "refresh-timeout-ms")]
    pub refresh_timeout_ms: u64,

    /// Directory of local prompt overrides
    #[serde(rename = "local-override-dir")]
    pub local_override_dir: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 10_000,
            refresh_enabled: true,
            init_timeout_ms: 30_000,
            refresh_timeout_ms: 30_000,
            local_override_dir: None,
        }
    }
}

impl ManagerConfig {
    /// Build manager options; the local override directory is expanded from `~/`
    pub fn to_options(&self) -> ManagerOptions {
        let mut options = ManagerOptions::default()
            .with_refresh_interval(Duration::from_millis(self.refresh_interval_ms))
            .with_refresh_enabled(self.refresh_enabled)
            .with_init_timeout(Duration::from_millis(self.init_timeout_ms))
            .with_refresh_timeout(Duration::from_millis(self.refresh_timeout_ms));
        if let Some(dir) = &self.local_override_dir {
            options = options.with_local_override(Arc::new(DirectorySource::new(expand_home(dir))));
        }
        options
    }
}

/// Code generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Directory generated modules are written to
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// Prompt ids to generate; empty means all
    pub prompts: Vec<String>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("src/prompts"),
            prompts: Vec::new(),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

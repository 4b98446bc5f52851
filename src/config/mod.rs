//! Application configuration.
//!
//! Walk limits and kernel parameters that cannot be read out of the image.
//! Loaded from YAML files and environment variables.

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "COREWALK_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "COREWALK";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "COREWALK_LOG";

/// Default upper bound on nodes visited by one list walk.
pub const DEFAULT_MAX_LIST_NODES: usize = 1 << 20;

/// Default tick rate, the most common `CONFIG_HZ` on distribution kernels.
pub const DEFAULT_HZ: u32 = 250;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Limits applied to every walk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum nodes visited by a list walk before it is reported as a cycle.
    pub max_list_nodes: usize,
    /// Track visited list nodes so a cycle is reported where it closes.
    ///
    /// Off trades the exact report for constant memory; cycles are then
    /// only caught by `max_list_nodes`.
    pub exact_cycles: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_list_nodes: DEFAULT_MAX_LIST_NODES,
            exact_cycles: true,
        }
    }
}

/// Per-CPU resolution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PerCpuConfig {
    /// Number of usable CPUs. Unset means every entry of the offset table.
    pub nr_cpus: Option<usize>,
}

/// Kernel build parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KernelSettings {
    /// `CONFIG_HZ` of the captured kernel.
    pub hz: u32,
    /// Remove the `INITIAL_JIFFIES` offset from the tick counter.
    pub adjust_initial_jiffies: bool,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            hz: DEFAULT_HZ,
            adjust_initial_jiffies: true,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Walk limits.
    pub limits: LimitsConfig,
    /// Per-CPU settings.
    pub percpu: PerCpuConfig,
    /// Kernel parameters.
    pub kernel: KernelSettings,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, e.g.
    ///    `COREWALK__KERNEL__HZ=1000`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from YAML text, ignoring files and environment.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no walk can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_list_nodes == 0 {
            return Err(ConfigError::Invalid("limits.max_list_nodes must be positive".into()));
        }
        if self.kernel.hz == 0 {
            return Err(ConfigError::Invalid("kernel.hz must be positive".into()));
        }
        if self.percpu.nr_cpus == Some(0) {
            return Err(ConfigError::Invalid("percpu.nr_cpus must be positive".into()));
        }
        Ok(())
    }

    /// Create a config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

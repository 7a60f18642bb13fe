use crate::domain::{
    config::{Address, DeviceProfile, GlobalConfig, Options, RawComConfig, SplitterConfig},
    error::{RawComError, RawComResult},
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR: &str = ".rawcom";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> RawComResult<Self> {
        let global_config_path = Self::default_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager over explicit files instead of the home and working directories
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    /// Load configuration from files
    pub fn load_config(&self) -> RawComResult<RawComConfig> {
        // Start with default configuration
        let mut config = RawComConfig::default();

        if self.global_config_path.exists() {
            config = self.load_config_from_path(&self.global_config_path)?;
            debug!("Loaded global config from {}", self.global_config_path.display());
        }

        // Project devices extend the global ones
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let project_config = self.load_config_from_path(project_path)?;
                config.devices.extend(project_config.devices);
                debug!("Loaded project config from {}", project_path.display());
            }
        }

        Ok(config)
    }

    /// Load configuration from one file, ignoring the standard locations
    pub fn load_config_from_path(&self, path: &Path) -> RawComResult<RawComConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            RawComError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            RawComError::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &RawComConfig) -> RawComResult<()> {
        let content = toml::to_string_pretty(config)
            .map_err(|e| RawComError::config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RawComError::config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content).map_err(|e| {
            RawComError::config(format!("Failed to write config file {}: {}", path.display(), e))
        })
    }

    /// Create an example project configuration under `path`
    pub fn init_project_config(&self, path: &Path) -> RawComResult<PathBuf> {
        let config_file = path.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_file.exists() {
            return Err(RawComError::config("Project configuration already exists"));
        }

        let example = RawComConfig {
            global: GlobalConfig::default(),
            devices: vec![
                DeviceProfile {
                    description: "Example projector on a telnet port".to_string(),
                    address: Address::tcp("192.168.1.100", 23).with_name("projector"),
                    options: Options {
                        splitter: SplitterConfig::delimiter("\r"),
                        dictionary: [("power on", "PWR ON\r"), ("power off", "PWR OFF\r")]
                            .into_iter()
                            .collect(),
                        ..Options::default()
                    },
                },
                DeviceProfile {
                    description: "Example serial switcher".to_string(),
                    address: Address::serial("/dev/ttyUSB0").with_name("switcher"),
                    options: Options::default(),
                },
            ],
        };

        self.save_config_to_path(&config_file, &example)?;
        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path(&self) -> &PathBuf {
        &self.global_config_path
    }

    fn default_global_config_path() -> RawComResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RawComError::config("Could not determine home directory"))?;

        Ok(home.join(".config").join("rawcom").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }
}

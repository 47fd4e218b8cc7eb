//! Configuration file support for blankwatch
//!
//! Supports TOML configuration files with the following search order:
//! 1. `--config <path>` - explicitly specified path
//! 2. `./blankwatch.toml` - current directory
//! 3. `~/.config/blankwatch/config.toml` - user config
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [monitor]
//! root = "/srv/conversions"
//! recursive = true
//! scan_interval_secs = 30
//!
//! [detection]
//! size_threshold_kb = 10
//! density_threshold_pct = 10.0
//!
//! [notification]
//! enabled = true
//! program = "/opt/sms/sendsms"
//! username = "TC"
//! recipients = "13800000000,13900000000"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::detector::DetectorOptions;
use crate::notifier::NotifierOptions;

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Monitored directory options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Root directory to watch
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Descend into subdirectories
    #[serde(default)]
    pub recursive: Option<bool>,

    /// Only consider files modified within this many hours (0 = unlimited)
    #[serde(default)]
    pub age_window_hours: Option<u64>,

    /// Delay between periodic rescans, in seconds
    #[serde(default)]
    pub scan_interval_secs: Option<u64>,
}

/// Detection thresholds
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    /// Size threshold in KB
    #[serde(default)]
    pub size_threshold_kb: Option<u64>,

    /// Enable the file-size signal
    #[serde(default)]
    pub size_detection: Option<bool>,

    /// Enable the pixel-density signal
    #[serde(default)]
    pub image_detection: Option<bool>,

    /// Region-of-interest width percentage
    #[serde(default)]
    pub area_width_pct: Option<f64>,

    /// Region-of-interest height percentage
    #[serde(default)]
    pub area_height_pct: Option<f64>,

    /// Horizontal offset percentage (-100..100)
    #[serde(default)]
    pub horizontal_offset_pct: Option<f64>,

    /// Content pixel density threshold percentage
    #[serde(default)]
    pub density_threshold_pct: Option<f64>,

    /// Concurrent detection workers (0 = number of CPUs)
    #[serde(default)]
    pub threads: Option<usize>,
}

/// SMS notification settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    /// Enable batch notifications
    #[serde(default)]
    pub enabled: Option<bool>,

    /// External sender program path
    #[serde(default)]
    pub program: Option<PathBuf>,

    /// Sender identity
    #[serde(default)]
    pub username: Option<String>,

    /// Recipient identifiers, comma separated
    #[serde(default)]
    pub recipients: Option<String>,
}

/// Reconversion settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReconversionConfig {
    /// Enable automatic reconversion of suspicious files
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Script template containing the {TASKID} placeholder
    #[serde(default)]
    pub template: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Detection settings
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Notification settings
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Reconversion settings
    #[serde(default)]
    pub reconversion: ReconversionConfig,
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default search path
    ///
    /// Search order:
    /// 1. `./blankwatch.toml`
    /// 2. `~/.config/blankwatch/config.toml`
    /// 3. Default values (if no file found)
    pub fn load() -> Result<Self, ConfigError> {
        let current_dir_config = PathBuf::from("blankwatch.toml");
        if current_dir_config.exists() {
            return Self::load_from_path(&current_dir_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("blankwatch").join("config.toml");
            if user_config.exists() {
                return Self::load_from_path(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Resolve to concrete settings, filling defaults
    pub fn to_settings(&self) -> Settings {
        let detector = DetectorOptions {
            size_threshold_kb: self.detection.size_threshold_kb.unwrap_or(10),
            density_threshold_pct: self.detection.density_threshold_pct.unwrap_or(10.0),
            area_width_pct: self.detection.area_width_pct.unwrap_or(22.2),
            area_height_pct: self.detection.area_height_pct.unwrap_or(33.3),
            horizontal_offset_pct: self.detection.horizontal_offset_pct.unwrap_or(0.0),
            size_detection: self.detection.size_detection.unwrap_or(true),
            image_detection: self.detection.image_detection.unwrap_or(true),
        };

        let notifier = NotifierOptions {
            program: self.notification.program.clone(),
            username: self.notification.username.clone().unwrap_or_default(),
            recipients: self.notification.recipients.clone().unwrap_or_default(),
        };

        Settings {
            root: self.monitor.root.clone(),
            recursive: self.monitor.recursive.unwrap_or(true),
            age_window_hours: self.monitor.age_window_hours.unwrap_or(0),
            scan_interval_secs: self.monitor.scan_interval_secs.unwrap_or(30),
            detector,
            detection_threads: self.detection.threads.unwrap_or(4),
            notification_enabled: self.notification.enabled.unwrap_or(false),
            notifier,
            reconversion_enabled: self.reconversion.enabled.unwrap_or(false),
            reconversion_template: self.reconversion.template.clone(),
        }
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> Settings {
        let mut settings = self.to_settings();

        if let Some(root) = &cli.root {
            settings.root = Some(root.clone());
        }
        if let Some(recursive) = cli.recursive {
            settings.recursive = recursive;
        }
        if let Some(hours) = cli.age_window_hours {
            settings.age_window_hours = hours;
        }
        if let Some(interval) = cli.scan_interval_secs {
            settings.scan_interval_secs = interval;
        }
        if let Some(threads) = cli.threads {
            settings.detection_threads = threads;
        }
        if let Some(threshold) = cli.size_threshold_kb {
            settings.detector.size_threshold_kb = threshold;
        }
        if let Some(threshold) = cli.density_threshold_pct {
            settings.detector.density_threshold_pct = threshold;
        }

        settings
    }

    /// Get config file search paths
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("blankwatch.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("blankwatch").join("config.toml"));
        }

        paths
    }
}

/// Concrete settings resolved from the config file and CLI
#[derive(Debug, Clone)]
pub struct Settings {
    pub root: Option<PathBuf>,
    pub recursive: bool,
    pub age_window_hours: u64,
    pub scan_interval_secs: u64,
    pub detector: DetectorOptions,
    pub detection_threads: usize,
    pub notification_enabled: bool,
    pub notifier: NotifierOptions,
    pub reconversion_enabled: bool,
    pub reconversion_template: Option<PathBuf>,
}

/// CLI override values for merging with the config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub age_window_hours: Option<u64>,
    pub scan_interval_secs: Option<u64>,
    pub threads: Option<usize>,
    pub size_threshold_kb: Option<u64>,
    pub density_threshold_pct: Option<f64>,
}

impl CliOverrides {
    /// Create new empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the monitor root override
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Set the recursion override
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    /// Set the age window override
    pub fn with_age_window_hours(mut self, hours: u64) -> Self {
        self.age_window_hours = Some(hours);
        self
    }

    /// Set the scan interval override
    pub fn with_scan_interval_secs(mut self, secs: u64) -> Self {
        self.scan_interval_secs = Some(secs);
        self
    }

    /// Set the worker thread override
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Deployment environment label attached to log output
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Worker identity, defaults to `worker-<pid>`
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitoring: MonitoringConfig::default(),
            simulation: SimulationConfig::default(),
            exporter: ExporterConfig::default(),
            logging: LoggingConfig::default(),
            environment: default_environment(),
            worker_id: default_worker_id(),
        }
    }
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_worker_id() -> String {
    format!("worker-{}", std::process::id())
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Base interval between telemetry cycles in seconds (jittered ±10%)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

/// Per-provider enable flags and variance tuning, read once at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_true")]
    pub enable_kubernetes: bool,
    #[serde(default = "default_true")]
    pub enable_database: bool,
    #[serde(default = "default_true")]
    pub enable_storage: bool,
    #[serde(default = "default_true")]
    pub enable_network: bool,
    #[serde(default = "default_true")]
    pub enable_system: bool,
    /// Baseline probability of error/outlier escalation (0..=1).
    /// Providers scale their category-specific failure odds from this.
    #[serde(default = "default_error_rate_variance")]
    pub error_rate_variance: f64,
    /// Width multiplier for slow/spike outlier ranges (0..=1)
    #[serde(default = "default_performance_variance")]
    pub performance_variance: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enable_kubernetes: true,
            enable_database: true,
            enable_storage: true,
            enable_network: true,
            enable_system: true,
            error_rate_variance: default_error_rate_variance(),
            performance_variance: default_performance_variance(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_error_rate_variance() -> f64 {
    0.05
}

fn default_performance_variance() -> f64 {
    0.2
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// When false the worker runs with a no-op export sink
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Service name attached to exported events and cycle records
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: default_app_name(),
        }
    }
}

fn default_app_name() -> String {
    "telesim-worker".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("monitoring.interval_secs", default_interval_secs())?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TELESIM_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TELESIM_MONITORING__INTERVAL_SECS, etc.)
            .add_source(
                Environment::with_prefix("TELESIM")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.monitoring.interval_secs < 1 {
            errors.push("monitoring.interval_secs must be at least 1 second".to_string());
        }

        if !(0.0..=1.0).contains(&self.simulation.error_rate_variance) {
            errors.push("simulation.error_rate_variance must be between 0 and 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.simulation.performance_variance) {
            errors.push("simulation.performance_variance must be between 0 and 1".to_string());
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!(
                "logging.level must be one of: {}",
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validation as a fatal startup error, every problem in one message.
    pub fn ensure_valid(&self) -> Result<(), crate::error::TelesimError> {
        self.validate()
            .map_err(|errors| crate::error::TelesimError::Validation(errors.join("; ")))
    }

    /// Base cycle interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitoring.interval_secs)
    }
}

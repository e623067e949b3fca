//! Pipeline configuration from environment variables

use super::types::AggregationMode;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the pipeline runtime
///
/// Every field is public so embedders and tests can build one directly;
/// `from_env` fills it from the process environment (after `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Broker the raw readings arrive on
    pub edge_broker_address: String,

    /// Broker the aggregates are published to
    pub cloud_broker_address: String,

    pub edge_topic: String,
    pub cloud_topic: String,

    /// Seconds between flushes
    pub sampling_interval_secs: f64,

    /// Total run budget in seconds (None = run until stopped)
    pub plot_interval_secs: Option<f64>,

    pub use_moving_average: bool,

    /// Moving-average window size (ignored for simple mean)
    pub window_size: usize,

    pub simulator_seed: u64,
    pub simulator_mean: f64,
    pub simulator_std_dev: f64,

    /// Poisson arrival rate of simulated readings (events per second)
    pub arrival_rate: f64,

    /// Number of readings the simulator publishes before stopping
    pub max_messages: u64,

    /// Per-subscription queue depth
    pub channel_buffer: usize,

    /// Width of the live chart in seconds
    pub trailing_window_secs: f64,

    pub enable_ui: bool,

    /// Where to write the final series snapshot (None = skip)
    pub series_export_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl PipelineConfig {
    /// Explicit construction with the required transport parameters;
    /// everything else takes the same defaults as `from_env`
    pub fn new(
        edge_broker_address: &str,
        cloud_broker_address: &str,
        edge_topic: &str,
        cloud_topic: &str,
    ) -> Self {
        Self {
            edge_broker_address: edge_broker_address.to_string(),
            cloud_broker_address: cloud_broker_address.to_string(),
            edge_topic: edge_topic.to_string(),
            cloud_topic: cloud_topic.to_string(),
            sampling_interval_secs: 5.0,
            plot_interval_secs: Some(10.0),
            use_moving_average: false,
            window_size: 5,
            simulator_seed: 12345,
            simulator_mean: 20.0,
            simulator_std_dev: 5.0,
            arrival_rate: 10.0,
            max_messages: 10_000,
            channel_buffer: 1_000,
            trailing_window_secs: 30.0,
            enable_ui: false,
            series_export_path: None,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Required:
    /// - `EDGE_BROKER_ADDRESS`, `CLOUD_BROKER_ADDRESS`
    ///
    /// Optional (default):
    /// - `EDGE_TOPIC` (sensor/data), `CLOUD_TOPIC` (sensor/average)
    /// - `SAMPLING_INTERVAL_SECS` (5), `PLOT_INTERVAL_SECS` (10, "none" = unbounded)
    /// - `USE_MOVING_AVERAGE` (false), `WINDOW_SIZE` (5)
    /// - `SIMULATOR_SEED` (12345), `SIMULATOR_MEAN` (20), `SIMULATOR_STD_DEV` (5)
    /// - `ARRIVAL_RATE` (10), `MAX_MESSAGES` (10000)
    /// - `CHANNEL_BUFFER` (1000), `TRAILING_WINDOW_SECS` (30)
    /// - `ENABLE_UI` (false), `SERIES_EXPORT_PATH` (unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        let edge_broker_address = required("EDGE_BROKER_ADDRESS")?;
        let cloud_broker_address = required("CLOUD_BROKER_ADDRESS")?;

        let mut config = Self::new(
            &edge_broker_address,
            &cloud_broker_address,
            &env::var("EDGE_TOPIC").unwrap_or_else(|_| "sensor/data".to_string()),
            &env::var("CLOUD_TOPIC").unwrap_or_else(|_| "sensor/average".to_string()),
        );

        config.sampling_interval_secs = parsed("SAMPLING_INTERVAL_SECS", config.sampling_interval_secs)?;
        config.plot_interval_secs = match env::var("PLOT_INTERVAL_SECS") {
            Ok(raw) if raw.trim().is_empty() || raw.trim().eq_ignore_ascii_case("none") => None,
            Ok(raw) => Some(raw.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("PLOT_INTERVAL_SECS={:?}", raw))
            })?),
            Err(_) => config.plot_interval_secs,
        };
        config.use_moving_average = env::var("USE_MOVING_AVERAGE")
            .ok()
            .and_then(|s| s.trim().to_lowercase().parse().ok())
            .unwrap_or(config.use_moving_average);
        config.window_size = parsed("WINDOW_SIZE", config.window_size)?;

        config.simulator_seed = parsed("SIMULATOR_SEED", config.simulator_seed)?;
        config.simulator_mean = parsed("SIMULATOR_MEAN", config.simulator_mean)?;
        config.simulator_std_dev = parsed("SIMULATOR_STD_DEV", config.simulator_std_dev)?;
        config.arrival_rate = parsed("ARRIVAL_RATE", config.arrival_rate)?;
        config.max_messages = parsed("MAX_MESSAGES", config.max_messages)?;

        config.channel_buffer = parsed("CHANNEL_BUFFER", config.channel_buffer)?;
        config.trailing_window_secs = parsed("TRAILING_WINDOW_SECS", config.trailing_window_secs)?;
        config.enable_ui = env::var("ENABLE_UI")
            .ok()
            .and_then(|s| s.trim().to_lowercase().parse().ok())
            .unwrap_or(false);
        config.series_export_path = env::var("SERIES_EXPORT_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampling_interval()?;
        self.run_budget()?;

        if self.use_moving_average && self.window_size == 0 {
            return Err(ConfigError::InvalidValue(
                "window size must be positive when moving average is enabled".to_string(),
            ));
        }

        if self.edge_topic.is_empty() || self.cloud_topic.is_empty() {
            return Err(ConfigError::InvalidValue("topics cannot be empty".to_string()));
        }

        if self.edge_broker_address == self.cloud_broker_address && self.edge_topic == self.cloud_topic {
            return Err(ConfigError::InvalidValue(format!(
                "edge and cloud share broker {} and topic {}; aggregates would feed back into ingestion",
                self.edge_broker_address, self.edge_topic
            )));
        }

        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "arrival rate must be positive, got {}",
                self.arrival_rate
            )));
        }

        Ok(())
    }

    pub fn aggregation_mode(&self) -> AggregationMode {
        AggregationMode::from_flags(self.use_moving_average, self.window_size)
    }

    /// Flush period; must be representable and at least one nanosecond
    pub fn sampling_interval(&self) -> Result<Duration, ConfigError> {
        let interval = to_duration("sampling interval", self.sampling_interval_secs)?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue(format!(
                "sampling interval must be positive, got {}",
                self.sampling_interval_secs
            )));
        }
        Ok(interval)
    }

    /// Run budget; zero is allowed and stops after the first flush
    pub fn run_budget(&self) -> Result<Option<Duration>, ConfigError> {
        self.plot_interval_secs
            .map(|secs| to_duration("plot interval", secs))
            .transpose()
    }
}

fn to_duration(what: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        ConfigError::InvalidValue(format!("{} must be a non-negative number of seconds, got {}", what, secs))
    })
}

fn required(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}={:?}", name, raw))),
        Err(_) => Ok(default),
    }
}

use crate::topology::TopologyConfig;
use hall_client::ClientConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Desk configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | HALL_API_URL | http://localhost:3001 | backend base URL |
/// | HALL_REQUEST_TIMEOUT_SECS | 30 | per-request timeout |
/// | HALL_POLL_INTERVAL_MS | 5000 | active-session poll period |
/// | HALL_TICK_INTERVAL_MS | 1000 | elapsed clock refresh |
/// | HALL_TOAST_TTL_MS | 5000 | notification auto-dismiss |
/// | HALL_STATION_COUNT | 8 | number of consoles |
/// | HALL_BOOTH_CONSOLES | 3,6,8 | consoles placed in booths |
/// | HALL_LEGACY_CONSOLES | 2 | consoles with PS3 hardware |
/// | LOG_LEVEL | info | log filter |
/// | LOG_DIR | unset | directory for daily log files |
///
/// # Example
///
/// ```ignore
/// HALL_API_URL=http://10.0.0.5:3001 HALL_POLL_INTERVAL_MS=2000 cargo run -p hall-desk
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskConfig {
    pub client: ClientConfig,
    pub poll_interval: Duration,
    pub tick_interval: Duration,
    pub toast_ttl: Duration,
    pub topology: TopologyConfig,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// How long shutdown waits for background tasks
    pub shutdown_grace: Duration,
}

impl DeskConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source; unset or blank means default
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let base_url = get(hall_client::config::API_URL_ENV)
            .unwrap_or_else(|| hall_client::config::DEFAULT_BASE_URL.to_string());
        let timeout = parse_or(
            "HALL_REQUEST_TIMEOUT_SECS",
            get("HALL_REQUEST_TIMEOUT_SECS"),
            defaults.client.timeout,
        )?;

        let topology = TopologyConfig {
            station_count: parse_or(
                "HALL_STATION_COUNT",
                get("HALL_STATION_COUNT"),
                defaults.topology.station_count,
            )?,
            booth_consoles: parse_list_or(
                "HALL_BOOTH_CONSOLES",
                get("HALL_BOOTH_CONSOLES"),
                defaults.topology.booth_consoles,
            )?,
            legacy_consoles: parse_list_or(
                "HALL_LEGACY_CONSOLES",
                get("HALL_LEGACY_CONSOLES"),
                defaults.topology.legacy_consoles,
            )?,
        };

        let timeout = nonzero("HALL_REQUEST_TIMEOUT_SECS", timeout)?;
        let interval = |var: &'static str, default: Duration| millis(var, get(var), default);

        Ok(Self {
            client: ClientConfig::new(base_url).with_timeout(timeout),
            poll_interval: interval("HALL_POLL_INTERVAL_MS", defaults.poll_interval)?,
            tick_interval: interval("HALL_TICK_INTERVAL_MS", defaults.tick_interval)?,
            toast_ttl: interval("HALL_TOAST_TTL_MS", defaults.toast_ttl)?,
            topology,
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: get("LOG_DIR"),
            shutdown_grace: defaults.shutdown_grace,
        })
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            poll_interval: Duration::from_millis(5000),
            tick_interval: Duration::from_millis(1000),
            toast_ttl: Duration::from_millis(5000),
            topology: TopologyConfig::default(),
            log_level: "info".into(),
            log_dir: None,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

fn parse_list_or(
    var: &'static str,
    raw: Option<String>,
    default: Vec<u32>,
) -> Result<Vec<u32>, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse())
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|_| ConfigError::Invalid { var, value })
}

fn millis(
    var: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let ms = parse_or(var, raw, u64::try_from(default.as_millis()).unwrap_or(u64::MAX))?;
    Ok(Duration::from_millis(nonzero(var, ms)?))
}

fn nonzero(var: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero(var));
    }
    Ok(value)
}

//! Process-wide configuration and the engine handle.
//!
//! All input/output of timestamps and intervals is driven by a [`Config`],
//! and a few operations (skiplist aggregation, crossover discovery) need
//! process-wide state: the timezone table and the level RNG. Both live in
//! an [`Engine`]. Most callers use the opt-in global engine through
//! [`initialize`] / [`finalize`]; library code that wants full isolation
//! can pass its own `Engine` instead.

use crate::error::{Result, TemporalError};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Output style for timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateStyle {
    /// `Sat Jan 01 2000` ordering with textual month.
    Postgres,
    /// `2000-01-01 00:00:00+00` (default).
    #[default]
    Iso,
    /// `01/02/2000` with slashes.
    Sql,
    /// `01.02.2000` with dots.
    German,
    /// ISO 8601 with a `T` separator.
    Xsd,
}

/// Field order for ambiguous date literals such as `01/02/2000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// Year, month, day (default).
    #[default]
    Ymd,
    /// Day, month, year.
    Dmy,
    /// Month, day, year.
    Mdy,
}

/// Output style for intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntervalStyle {
    /// `1 day 02:30:00` (default).
    #[default]
    Postgres,
    /// `@ 1 day 2 hours 30 mins`.
    PostgresVerbose,
    /// `1 2:30:00`.
    SqlStandard,
    /// `P1DT2H30M`.
    Iso8601,
}

/// Engine configuration.
///
/// Designed to be easily serializable and loadable from JSON while keeping
/// complexity minimal.
///
/// # Example
///
/// ```rust
/// use tempora::Config;
///
/// let json = r#"{
///     "date_style": "iso",
///     "timezone": "Europe/Brussels",
///     "instant_budget": 100000
/// }"#;
/// let config: Config = Config::from_json(json).unwrap();
/// assert_eq!(config.timezone, "Europe/Brussels");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Timestamp output style.
    #[serde(default)]
    pub date_style: DateStyle,

    /// Field order for ambiguous date input.
    #[serde(default)]
    pub date_order: DateOrder,

    /// Interval output style.
    #[serde(default)]
    pub interval_style: IntervalStyle,

    /// IANA timezone name used for timestamp input/output.
    #[serde(default = "Config::default_timezone")]
    pub timezone: String,

    /// Upper bound on the number of instants a single operation may create
    /// through crossover insertion before it fails with `TooComplex`.
    #[serde(default = "Config::default_instant_budget")]
    pub instant_budget: usize,
}

impl Config {
    fn default_timezone() -> String {
        "UTC".to_string()
    }

    const fn default_instant_budget() -> usize {
        1_000_000
    }

    pub fn with_date_style(mut self, style: DateStyle) -> Self {
        self.date_style = style;
        self
    }

    pub fn with_date_order(mut self, order: DateOrder) -> Self {
        self.date_order = order;
        self
    }

    pub fn with_interval_style(mut self, style: IntervalStyle) -> Self {
        self.interval_style = style;
        self
    }

    /// Set the IANA timezone name.
    pub fn with_timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = tz.into();
        self
    }

    /// Adjust the instant budget guarding against crossover explosion.
    pub fn with_instant_budget(mut self, budget: usize) -> Self {
        assert!(budget > 0, "Instant budget must be greater than zero");
        self.instant_budget = budget;
        self
    }

    /// Resolve the configured timezone.
    pub fn tz(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone).map_err(|_| {
            TemporalError::InvalidInput(format!("Unknown timezone: {}", self.timezone))
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if Tz::from_str(&self.timezone).is_err() {
            return Err(format!("Unknown timezone: {}", self.timezone));
        }

        if self.instant_budget == 0 {
            return Err("Instant budget must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as a JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            date_style: DateStyle::default(),
            date_order: DateOrder::default(),
            interval_style: IntervalStyle::default(),
            timezone: Self::default_timezone(),
            instant_budget: Self::default_instant_budget(),
        }
    }
}

/// Fixed seed for the skiplist level RNG so identical runs produce
/// identical structures.
const LEVEL_RNG_SEED: u64 = 0x7E4A_0917_5EED_0001;

/// Process-wide engine: configuration, resolved timezone, and the RNG used
/// for skiplist level draws.
pub struct Engine {
    config: Config,
    tz: Tz,
    rng: Mutex<SmallRng>,
}

impl Engine {
    /// Create an engine from a configuration.
    pub fn new(config: Config) -> Result<Self> {
        let tz = config.tz()?;
        Ok(Self {
            config,
            tz,
            rng: Mutex::new(SmallRng::seed_from_u64(LEVEL_RNG_SEED)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Instant budget for crossover insertion.
    pub fn instant_budget(&self) -> usize {
        self.config.instant_budget
    }

    /// Draw a skiplist node height: geometric with p = 1/2, capped by `max`.
    pub fn random_level(&self, max: usize) -> usize {
        let mut rng = self.rng.lock();
        let mut level = 1;
        while level < max && rng.random_bool(0.5) {
            level += 1;
        }
        level
    }
}

impl Default for Engine {
    fn default() -> Self {
        // The default config always resolves: "UTC" is a valid zone name.
        Self {
            config: Config::default(),
            tz: Tz::UTC,
            rng: Mutex::new(SmallRng::seed_from_u64(LEVEL_RNG_SEED)),
        }
    }
}

static GLOBAL: Lazy<RwLock<Engine>> = Lazy::new(|| RwLock::new(Engine::default()));

/// Install a configuration into the global engine.
///
/// Must be called before any operation that formats, parses, or aggregates
/// if non-default configuration is wanted. Calling it again replaces the
/// previous configuration.
pub fn initialize(config: Config) -> Result<()> {
    let engine = Engine::new(config)?;
    log::debug!(
        "engine initialized: timezone {}, instant budget {}",
        engine.config.timezone,
        engine.config.instant_budget
    );
    *GLOBAL.write() = engine;
    Ok(())
}

/// Reset the global engine to its default state.
///
/// Callers must not use core operations concurrently with teardown.
pub fn finalize() {
    *GLOBAL.write() = Engine::default();
}

/// Read access to the global engine.
pub fn global() -> RwLockReadGuard<'static, Engine> {
    GLOBAL.read()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.date_style, DateStyle::Iso);
        assert_eq!(config.date_order, DateOrder::Ymd);
        assert_eq!(config.interval_style, IntervalStyle::Postgres);
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.instant_budget, 1_000_000);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_date_style(DateStyle::Postgres)
            .with_timezone("Europe/Brussels")
            .with_instant_budget(1000);

        let json = config.to_json().unwrap();
        let deserialized = Config::from_json(&json).unwrap();

        assert_eq!(deserialized.date_style, DateStyle::Postgres);
        assert_eq!(deserialized.timezone, "Europe/Brussels");
        assert_eq!(deserialized.instant_budget, 1000);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default().with_timezone("Mars/Olympus");
        assert!(config.validate().is_err());
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_random_level_bounds() {
        let engine = Engine::default();
        for _ in 0..1000 {
            let level = engine.random_level(32);
            assert!((1..=32).contains(&level));
        }
    }

    #[test]
    fn test_initialize_and_finalize() {
        // Vary only the budget: tests run in parallel and the formatting
        // tests read the global timezone.
        initialize(Config::default().with_instant_budget(999_999)).unwrap();
        assert_eq!(global().instant_budget(), 999_999);
        finalize();
        assert_eq!(global().instant_budget(), 1_000_000);
    }
}

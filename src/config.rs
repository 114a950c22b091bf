//! Plant configuration parameters
//!
//! Loaded once from a JSON document at startup and never mutated afterwards.
//! Every threshold is a percentage of full (0–100); the sensor adapters are
//! responsible for normalising raw readings into that range.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use log::info;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Root configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    pub pins: PinConfig,
    pub well: WellConfig,
    pub large_tank: LargeTankConfig,
    pub small_tank: TankThresholds,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub pumps: PumpConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

// --- Pins ---

/// A level sensor wired as two float switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatSwitchPins {
    /// Closed when the water is above the low mark.
    pub low_pin: u8,
    /// Closed when the water is above the high mark.
    pub high_pin: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinConfig {
    pub well: FloatSwitchPins,
    pub large_tank: FloatSwitchPins,
    pub small_tank: FloatSwitchPins,
    /// Relay driving the well → large tank pump.
    pub well_pump: u8,
    /// Relay driving the large tank → small tank pump.
    pub transfer_pump: u8,
}

// --- Thresholds ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WellConfig {
    /// The well pump never runs at or below this level (%).
    pub min_safe_level: f32,
}

/// Hysteresis pair for one tank (%).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TankThresholds {
    pub low: f32,
    pub high: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LargeTankConfig {
    pub low: f32,
    pub high: f32,
    /// Minimum level at which `Idle` may start drawing toward the small tank.
    pub usable_min: f32,
}

impl LargeTankConfig {
    pub fn thresholds(&self) -> TankThresholds {
        TankThresholds {
            low: self.low,
            high: self.high,
        }
    }
}

// --- Timing ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Decantation delay after the large tank fills (seconds)
    pub settle_secs: u64,
    /// Control loop period (seconds)
    pub cycle_secs: u64,
    /// Age of the last heartbeat after which the loop counts as stalled (seconds)
    pub heartbeat_stale_secs: u64,
    /// Upper bound on a single level read (milliseconds)
    pub sensor_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_secs: 12 * 3600,
            cycle_secs: 30,
            heartbeat_stale_secs: 180,
            sensor_timeout_ms: 500,
        }
    }
}

/// Longest duration any timing field may hold: one year.
pub const MAX_DURATION_SECS: u64 = 366 * 24 * 3600;

/// Whole seconds as a [`TimeDelta`], saturating instead of panicking on
/// values chrono cannot represent.
pub fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl TimingConfig {
    pub fn settle_duration(&self) -> TimeDelta {
        seconds(self.settle_secs)
    }

    pub fn cycle_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cycle_secs)
    }

    pub fn heartbeat_stale_after(&self) -> TimeDelta {
        seconds(self.heartbeat_stale_secs)
    }

    pub fn sensor_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sensor_timeout_ms)
    }
}

// --- Pumps ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Never run both pumps at once (shared pipe / power budget).
    pub mutually_exclusive: bool,
    /// Stop a well pump run that lasts longer than this (seconds).
    pub well_pump_max_run_secs: Option<u64>,
    /// Stop a transfer pump run that lasts longer than this (seconds).
    pub transfer_pump_max_run_secs: Option<u64>,
    /// Minimum rest in `Idle` before the well pump starts again (seconds).
    pub cooldown_secs: u64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            mutually_exclusive: true,
            well_pump_max_run_secs: None,
            transfer_pump_max_run_secs: None,
            cooldown_secs: 0,
        }
    }
}

// --- Sensors ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Consecutive failed reads tolerated per sensor before the fault is fatal.
    pub max_consecutive_failures: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
        }
    }
}

// --- History ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_samples: usize,
    /// Drop samples older than this (seconds).
    pub retention_secs: Option<u64>,
    /// Replace the last sample instead of appending when nothing changed.
    pub collapse_unchanged: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_samples: 2880, // 24 h at the default 30 s cycle
            retention_secs: Some(24 * 3600),
            collapse_unchanged: false,
        }
    }
}

// --- Files ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub state_file: PathBuf,
    pub history_file: PathBuf,
    pub heartbeat_file: PathBuf,
    pub status_file: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = Path::new("/var/lib/potable");
        Self {
            state_file: base.join("state.json"),
            history_file: base.join("history.json"),
            heartbeat_file: base.join("heartbeat.json"),
            status_file: base.join("status.json"),
        }
    }
}

// --- Hardware ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareDriver {
    /// In-process plant model, for commissioning and bench runs.
    Simulated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub driver: HardwareDriver,
    /// Time for the well to recharge from empty to full (seconds).
    pub well_fill_secs: u64,
    /// Time for the well pump to empty a full well (seconds).
    pub well_empty_secs: u64,
    /// Time for the well pump to fill the empty large tank (seconds).
    pub large_fill_secs: u64,
    /// Time for the transfer pump to fill the empty small tank (seconds).
    pub small_fill_secs: u64,
    /// Time for household draw to empty a full small tank (seconds).
    pub small_drain_secs: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            driver: HardwareDriver::Simulated,
            well_fill_secs: 3600,
            well_empty_secs: 3600,
            large_fill_secs: 2400,
            small_fill_secs: 1200,
            small_drain_secs: 6 * 3600,
        }
    }
}

// --- Loading and validation ---

impl PlantConfig {
    /// Read, parse and validate the config document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound
            } else {
                ConfigError::IoError
            }
        })?;
        let config = Self::from_json(&text)?;
        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a config document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values rather than clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_percent(self.well.min_safe_level, "well.min_safe_level must be 0–100")?;
        if self.well.min_safe_level >= 100.0 {
            return Err(ConfigError::ValidationFailed(
                "well.min_safe_level must be below 100",
            ));
        }

        check_pair(
            self.large_tank.thresholds(),
            "large_tank thresholds must be 0–100",
            "large_tank.low must be < large_tank.high",
        )?;
        check_percent(self.large_tank.usable_min, "large_tank.usable_min must be 0–100")?;
        if self.large_tank.usable_min < self.large_tank.low
            || self.large_tank.usable_min > self.large_tank.high
        {
            return Err(ConfigError::ValidationFailed(
                "large_tank.usable_min must lie between low and high",
            ));
        }
        check_pair(
            self.small_tank,
            "small_tank thresholds must be 0–100",
            "small_tank.low must be < small_tank.high",
        )?;

        let t = &self.timing;
        if t.settle_secs == 0 {
            return Err(ConfigError::ValidationFailed("timing.settle_secs must be positive"));
        }
        // Bound settle so the chrono arithmetic cannot overflow.
        if t.settle_secs > 30 * 24 * 3600 {
            return Err(ConfigError::ValidationFailed(
                "timing.settle_secs must be at most 30 days",
            ));
        }
        if !(1..=3600).contains(&t.cycle_secs) {
            return Err(ConfigError::ValidationFailed("timing.cycle_secs must be 1–3600"));
        }
        if t.heartbeat_stale_secs <= t.cycle_secs {
            return Err(ConfigError::ValidationFailed(
                "timing.heartbeat_stale_secs must exceed timing.cycle_secs",
            ));
        }
        check_duration(
            t.heartbeat_stale_secs,
            "timing.heartbeat_stale_secs must be at most a year",
        )?;
        if t.sensor_timeout_ms == 0 || t.sensor_timeout_ms >= t.cycle_secs * 1000 {
            return Err(ConfigError::ValidationFailed(
                "timing.sensor_timeout_ms must be positive and shorter than a cycle",
            ));
        }

        if self.pumps.well_pump_max_run_secs == Some(0)
            || self.pumps.transfer_pump_max_run_secs == Some(0)
        {
            return Err(ConfigError::ValidationFailed("pump max run times must be positive"));
        }
        for max_run in [self.pumps.well_pump_max_run_secs, self.pumps.transfer_pump_max_run_secs]
            .into_iter()
            .flatten()
        {
            check_duration(max_run, "pump max run times must be at most a year")?;
        }
        check_duration(self.pumps.cooldown_secs, "pumps.cooldown_secs must be at most a year")?;
        if self.sensors.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationFailed(
                "sensors.max_consecutive_failures must be at least 1",
            ));
        }
        if self.history.max_samples == 0 {
            return Err(ConfigError::ValidationFailed("history.max_samples must be at least 1"));
        }
        if self.history.retention_secs == Some(0) {
            return Err(ConfigError::ValidationFailed("history.retention_secs must be positive"));
        }
        if let Some(retention) = self.history.retention_secs {
            check_duration(retention, "history.retention_secs must be at most a year")?;
        }

        let h = &self.hardware;
        if [
            h.well_fill_secs,
            h.well_empty_secs,
            h.large_fill_secs,
            h.small_fill_secs,
            h.small_drain_secs,
        ]
        .iter()
        .any(|&r| r == 0 || r > MAX_DURATION_SECS)
        {
            return Err(ConfigError::ValidationFailed(
                "hardware rates must be positive and at most a year",
            ));
        }

        self.validate_pins()
    }

    fn validate_pins(&self) -> Result<(), ConfigError> {
        let p = &self.pins;
        let all = [
            p.well.low_pin,
            p.well.high_pin,
            p.large_tank.low_pin,
            p.large_tank.high_pin,
            p.small_tank.low_pin,
            p.small_tank.high_pin,
            p.well_pump,
            p.transfer_pump,
        ];
        for (i, pin) in all.iter().enumerate() {
            if all[i + 1..].contains(pin) {
                return Err(ConfigError::ValidationFailed("pins must be distinct"));
            }
        }
        Ok(())
    }
}

fn check_percent(value: f32, msg: &'static str) -> Result<(), ConfigError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed(msg))
    }
}

fn check_duration(secs: u64, msg: &'static str) -> Result<(), ConfigError> {
    if secs <= MAX_DURATION_SECS {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed(msg))
    }
}

fn check_pair(
    pair: TankThresholds,
    range_msg: &'static str,
    order_msg: &'static str,
) -> Result<(), ConfigError> {
    check_percent(pair.low, range_msg)?;
    check_percent(pair.high, range_msg)?;
    if pair.low >= pair.high {
        return Err(ConfigError::ValidationFailed(order_msg));
    }
    Ok(())
}

use anyhow::{Context, Result};
use restwise_ai::AdvisorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CoreError;

const MAX_INTERVAL_MINS: u64 = 24 * 60;
const MAX_RETENTION_DAYS: u32 = 36_500;

/// Get the local data directory for restwise.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("restwise");
    Ok(path)
}

/// Default location of the configuration file
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn default_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.toml"))
}

/// `[tracker]`: input capture and activity windowing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Trailing window used for the activity level
    pub window_secs: u64,
    /// Counted events within the window that map to 100% activity
    pub saturation_events: u32,
    /// Idle time below this reports as zero
    pub idle_resolution_ms: u64,
    pub queue_capacity: usize,
    pub batch_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            saturation_events: 200,
            idle_resolution_ms: 1000,
            queue_capacity: 1024,
            batch_size: 256,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    #[must_use]
    pub const fn idle_resolution(&self) -> Duration {
        Duration::from_millis(self.idle_resolution_ms)
    }
}

/// `[fatigue]`: scoring heuristics, trend and alerting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueConfig {
    pub evaluation_interval_secs: u64,
    pub history_capacity: usize,
    /// Samples per half of the trend comparison
    pub trend_window: usize,
    pub trend_epsilon: f64,
    pub idle_mild_secs: f64,
    pub idle_moderate_secs: f64,
    pub idle_severe_secs: f64,
    pub score_mild: f64,
    pub score_moderate: f64,
    pub score_severe: f64,
    /// Activity level (percent) under which the user counts as barely active
    pub low_activity_threshold: f64,
    pub low_activity_score: f64,
    pub alert_threshold: f64,
    pub alert_cooldown_secs: u64,
    /// Half-width of the uniform blink-rate jitter
    pub blink_jitter: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_secs: 10,
            history_capacity: 30,
            trend_window: 5,
            trend_epsilon: 0.05,
            idle_mild_secs: 30.0,
            idle_moderate_secs: 60.0,
            idle_severe_secs: 300.0,
            score_mild: 0.4,
            score_moderate: 0.6,
            score_severe: 0.8,
            low_activity_threshold: 5.0,
            low_activity_score: 0.5,
            alert_threshold: 0.6,
            alert_cooldown_secs: 300,
            blink_jitter: 1.0,
            seed: None,
        }
    }
}

impl FatigueConfig {
    #[must_use]
    pub const fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    #[must_use]
    pub const fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }
}

/// `[breaks]`: enforcement timing and automatic breaks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakConfig {
    /// Countdown between scheduling a break and enforcing it
    pub lead_time_secs: u64,
    pub cooldown_secs: u64,
    pub tick_ms: u64,
    pub micro_secs: u64,
    pub regular_secs: u64,
    pub long_secs: u64,
    /// Schedule a break automatically when the engine raises a fatigue alert
    pub auto_break: bool,
    /// Request a regular break every this many minutes regardless of fatigue; 0 disables
    pub interval_mins: u64,
    /// Allow the guard to run OS lock/mute commands
    pub os_actions: bool,
    pub lock_screen: bool,
    /// Disable keyboard and mouse during a break. Linux/X11 only (`xinput`).
    pub mute_input: bool,
    /// Longest wait for a single lock, mute or restore command
    pub guard_timeout_secs: u64,
    /// Minutes offered to the recommender when the caller gives none
    pub default_available_minutes: u32,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            lead_time_secs: 5,
            cooldown_secs: 60,
            tick_ms: 1000,
            micro_secs: 180,
            regular_secs: 300,
            long_secs: 600,
            auto_break: true,
            interval_mins: 0,
            os_actions: true,
            lock_screen: false,
            mute_input: false,
            guard_timeout_secs: 10,
            default_available_minutes: 5,
        }
    }
}

impl BreakConfig {
    #[must_use]
    pub const fn lead_time(&self) -> Duration {
        Duration::from_secs(self.lead_time_secs)
    }

    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    #[must_use]
    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    #[must_use]
    pub const fn guard_timeout(&self) -> Duration {
        Duration::from_secs(self.guard_timeout_secs)
    }

    /// Period of the fixed-interval schedule, `None` when it is off
    #[must_use]
    pub const fn interval(&self) -> Option<Duration> {
        if self.interval_mins == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_mins.saturating_mul(60)))
        }
    }
}

/// `[storage]`: history retention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Days of activity and fatigue history to keep; 0 keeps everything.
    /// Break records are never pruned.
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { retention_days: 30 }
    }
}

/// `[notifications]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Use the desktop notification daemon instead of the log only
    pub desktop: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            desktop: true,
        }
    }
}

/// Complete runtime configuration, loaded from `config.toml`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub fatigue: FatigueConfig,
    pub advisor: AdvisorConfig,
    pub breaks: BreakConfig,
    pub notifications: NotificationConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Reject configurations that would leave a loop with undefined behavior.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` describing the first invalid field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let t = &self.tracker;
        ensure(t.window_secs > 0, "tracker.window_secs must be positive")?;
        ensure(t.saturation_events > 0, "tracker.saturation_events must be positive")?;
        ensure(t.queue_capacity > 0, "tracker.queue_capacity must be positive")?;
        ensure(t.batch_size > 0, "tracker.batch_size must be positive")?;

        let f = &self.fatigue;
        ensure(
            f.evaluation_interval_secs > 0,
            "fatigue.evaluation_interval_secs must be positive",
        )?;
        ensure(f.trend_window > 0, "fatigue.trend_window must be positive")?;
        ensure(
            f.history_capacity >= 2 * f.trend_window,
            "fatigue.history_capacity must hold at least two trend windows",
        )?;
        ensure(
            f.trend_epsilon >= 0.0 && f.trend_epsilon.is_finite(),
            "fatigue.trend_epsilon must be a non-negative number",
        )?;
        ensure(
            f.idle_mild_secs > 0.0
                && f.idle_mild_secs < f.idle_moderate_secs
                && f.idle_moderate_secs < f.idle_severe_secs,
            "fatigue idle thresholds must be positive and strictly increasing",
        )?;
        for (name, value) in [
            ("score_mild", f.score_mild),
            ("score_moderate", f.score_moderate),
            ("score_severe", f.score_severe),
            ("low_activity_score", f.low_activity_score),
            ("alert_threshold", f.alert_threshold),
        ] {
            ensure_fmt((0.0..=1.0).contains(&value), || {
                format!("fatigue.{name} must be within [0, 1], got {value}")
            })?;
        }
        ensure(
            (0.0..=100.0).contains(&f.low_activity_threshold),
            "fatigue.low_activity_threshold must be within [0, 100]",
        )?;
        ensure(
            f.blink_jitter >= 0.0 && f.blink_jitter.is_finite(),
            "fatigue.blink_jitter must be a non-negative number",
        )?;

        let a = &self.advisor;
        ensure(a.timeout_secs > 0, "advisor.timeout_secs must be positive")?;
        ensure(a.cooldown_secs > 0, "advisor.cooldown_secs must be positive")?;

        let b = &self.breaks;
        ensure(b.tick_ms > 0, "breaks.tick_ms must be positive")?;
        ensure(b.cooldown_secs > 0, "breaks.cooldown_secs must be positive")?;
        ensure(
            b.guard_timeout_secs > 0,
            "breaks.guard_timeout_secs must be positive",
        )?;
        ensure(
            b.micro_secs > 0 && b.regular_secs > 0 && b.long_secs > 0,
            "break durations must be positive",
        )?;
        ensure(
            b.micro_secs <= b.regular_secs && b.regular_secs <= b.long_secs,
            "break durations must satisfy micro <= regular <= long",
        )?;
        ensure(
            b.interval_mins <= MAX_INTERVAL_MINS,
            "breaks.interval_mins must be at most 1440 (one day)",
        )?;

        ensure(
            self.storage.retention_days <= MAX_RETENTION_DAYS,
            "storage.retention_days must be at most 36500",
        )?;
        Ok(())
    }
}

fn ensure(condition: bool, message: &str) -> Result<(), CoreError> {
    ensure_fmt(condition, || message.to_string())
}

fn ensure_fmt(condition: bool, message: impl FnOnce() -> String) -> Result<(), CoreError> {
    if condition {
        Ok(())
    } else {
        Err(CoreError::Configuration(message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: &Config, fragment: &str) {
        match config.validate() {
            Err(CoreError::Configuration(msg)) => {
                assert!(msg.contains(fragment), "unexpected message: {msg}");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.fatigue.evaluation_interval_secs = 0;
        assert_invalid(&config, "evaluation_interval_secs");
    }

    #[test]
    fn test_idle_thresholds_must_increase() {
        let mut config = Config::default();
        config.fatigue.idle_moderate_secs = 400.0;
        assert_invalid(&config, "strictly increasing");
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = Config::default();
        config.fatigue.alert_threshold = 1.5;
        assert_invalid(&config, "alert_threshold");
    }

    #[test]
    fn test_history_must_hold_two_windows() {
        let mut config = Config::default();
        config.fatigue.history_capacity = 9;
        assert_invalid(&config, "history_capacity");
    }

    #[test]
    fn test_queue_capacity_zero_rejected() {
        let mut config = Config::default();
        config.tracker.queue_capacity = 0;
        assert_invalid(&config, "queue_capacity");
    }

    #[test]
    fn test_negative_jitter_rejected() {
        let mut config = Config::default();
        config.fatigue.blink_jitter = -0.5;
        assert_invalid(&config, "blink_jitter");
    }

    #[test]
    fn test_interval_and_retention_bounds() {
        let mut config = Config::default();
        assert_eq!(config.breaks.interval(), None);
        config.breaks.interval_mins = 50;
        assert_eq!(config.breaks.interval(), Some(Duration::from_secs(3000)));
        config.breaks.interval_mins = 1441;
        assert_invalid(&config, "interval_mins");

        let mut config = Config::default();
        assert_eq!(config.storage.retention_days, 30);
        config.storage.retention_days = 40_000;
        assert_invalid(&config, "retention_days");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [fatigue]
            alert_threshold = 0.7
            seed = 42

            [advisor]
            provider = "ollama"

            [storage]
            retention_days = 0
            "#,
        )
        .unwrap();

        assert!((config.fatigue.alert_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.fatigue.seed, Some(42));
        assert_eq!(config.fatigue.history_capacity, 30);
        assert_eq!(config.advisor.provider, restwise_ai::ProviderKind::Ollama);
        assert_eq!(config.breaks, BreakConfig::default());
        assert_eq!(config.storage.retention_days, 0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.breaks.lead_time_secs = 12;
        config.notifications.desktop = false;
        config.save(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded, Config::default());
    }
}

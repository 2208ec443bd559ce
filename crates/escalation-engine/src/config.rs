//! Configuration for the escalation engine.

use chrono::Duration;
use tracing::warn;

/// Tunables for the escalation policy and scheduler.
#[derive(Debug, Clone)]
pub struct EscalationConfig {
    /// Staleness window in minutes. The default of 7 keeps tests and
    /// demos fast; a production SLA is typically measured in days
    /// (7 days = 10080 minutes). The unit is configuration, not code.
    pub threshold_minutes: i64,

    /// How often the scheduler sweeps, in seconds.
    pub check_interval_secs: u64,

    /// When true, de-escalation resets the status-change clock so the
    /// complaint gets a fresh threshold window before it can be flagged
    /// again. When false (the default), a still-stale complaint stays
    /// under pressure and may re-escalate on the next sweep.
    pub reset_status_clock_on_deescalate: bool,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            threshold_minutes: 7,
            check_interval_secs: 60,
            reset_status_clock_on_deescalate: false,
        }
    }
}

impl EscalationConfig {
    /// Load configuration from the environment, falling back to
    /// defaults for missing or malformed values.
    ///
    /// Recognized variables: `ESCALATION_THRESHOLD_MINUTES`,
    /// `ESCALATION_CHECK_INTERVAL_SECS`,
    /// `ESCALATION_RESET_CLOCK_ON_DEESCALATE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            threshold_minutes: env_parse(
                "ESCALATION_THRESHOLD_MINUTES",
                defaults.threshold_minutes,
            ),
            check_interval_secs: env_parse(
                "ESCALATION_CHECK_INTERVAL_SECS",
                defaults.check_interval_secs,
            ),
            reset_status_clock_on_deescalate: env_parse(
                "ESCALATION_RESET_CLOCK_ON_DEESCALATE",
                defaults.reset_status_clock_on_deescalate,
            ),
        }
    }

    /// The staleness window as a [`chrono::Duration`].
    pub fn threshold(&self) -> Duration {
        Duration::minutes(self.threshold_minutes)
    }

    /// The scheduler period as a [`std::time::Duration`].
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs)
    }
}

fn env_parse<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring malformed {}={}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

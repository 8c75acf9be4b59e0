//! Driver configuration.

use fugit::{MillisDurationU32, MillisDurationU64};

/// Flag bit enabling exchange timing in the flags word given at configuration time.
pub const FLAG_DO_TIMING: u32 = 0x1;

/// Highest safe ramp rate in amps per second, used to size the pause when ramping down.
// @TODO: Verify against the supply datasheet
pub const MAX_RAMP_RATIO: f64 = 20.0;

/// Tunables for one driver instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfig {
    /// Measure the latency of every exchange.
    pub timing: bool,
    /// How long to wait for each reply attempt.
    pub reply_timeout: MillisDurationU32,
    /// Attempts beyond the first before giving up on a command.
    pub max_retries: u32,
    /// Amps per second, see [`MAX_RAMP_RATIO`]. Always finite and positive.
    max_ramp_ratio: f64,
    /// Pause between the steps of a gain update.
    pub settle_delay: MillisDurationU64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            timing: false,
            reply_timeout: MillisDurationU32::millis(100),
            max_retries: 10,
            max_ramp_ratio: MAX_RAMP_RATIO,
            settle_delay: MillisDurationU64::millis(200),
        }
    }
}

impl DriverConfig {
    /// Build a configuration from a flags word, see [`FLAG_DO_TIMING`].
    pub fn from_flags(flags: u32) -> Self {
        Self {
            timing: flags & FLAG_DO_TIMING != 0,
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Set the ramp rate used to size the ramp-down pause.
    ///
    /// Returns `None` unless `ratio` is finite and positive, since anything else would make the
    /// pause vanish or never end.
    pub fn with_max_ramp_ratio(mut self, ratio: f64) -> Option<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return None;
        }
        self.max_ramp_ratio = ratio;
        Some(self)
    }

    pub fn max_ramp_ratio(&self) -> f64 {
        self.max_ramp_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DriverConfig::default();
        assert!(!config.timing);
        assert_eq!(config.reply_timeout.to_millis(), 100);
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.max_ramp_ratio(), 20.0);
        assert_eq!(config.settle_delay.to_millis(), 200);
    }

    #[test]
    fn from_flags() {
        assert!(DriverConfig::from_flags(0x1).timing);
        assert!(DriverConfig::from_flags(0x3).timing);
        assert!(!DriverConfig::from_flags(0x2).timing);
        assert!(!DriverConfig::from_flags(0).timing);
    }

    #[test]
    fn max_ramp_ratio_must_be_finite_and_positive() {
        let config = DriverConfig::default();
        assert_eq!(config.with_max_ramp_ratio(5.0).map(|c| c.max_ramp_ratio()), Some(5.0));
        assert!(config.with_max_ramp_ratio(0.0).is_none());
        assert!(config.with_max_ramp_ratio(-20.0).is_none());
        assert!(config.with_max_ramp_ratio(f64::NAN).is_none());
        assert!(config.with_max_ramp_ratio(f64::INFINITY).is_none());
    }
}

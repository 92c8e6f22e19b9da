//! Composite failure-risk scoring over a device's telemetry history.
//!
//! Pure evaluation -- no I/O, no clock access. A score is fully determined
//! by the history snapshot, the thresholds, and the sampling interval, so
//! identical inputs always reproduce the identical score.

use std::time::Duration;

use crate::history::DeviceHistory;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Weight of the absolute temperature factor in the composite score.
pub const WEIGHT_TEMPERATURE: f64 = 0.25;

/// Weight of the memory-utilization factor.
pub const WEIGHT_MEMORY: f64 = 0.15;

/// Weight of the error-count factor.
pub const WEIGHT_ERRORS: f64 = 0.25;

/// Weight of the cycle-over-cycle power fluctuation factor.
pub const WEIGHT_POWER_FLUCTUATION: f64 = 0.10;

/// Weight of the utilization-drop factor.
pub const WEIGHT_UTILIZATION_DROP: f64 = 0.15;

/// Weight of the temperature rise-rate factor.
pub const WEIGHT_TEMPERATURE_RISE: f64 = 0.10;

/// Score at or above which the recovery trigger is armed.
pub const TRIGGER_THRESHOLD: f64 = 0.10;

/// Score above which the per-factor breakdown is logged as a warning.
pub const BREAKDOWN_WARN_THRESHOLD: f64 = 0.15;

/// Temperature at which the temperature factor starts rising from zero.
const TEMPERATURE_FLOOR_C: f64 = 70.0;

/// Memory utilization at which the memory factor starts rising from zero.
const MEMORY_FLOOR_PCT: f64 = 85.0;

/// The utilization-drop factor only applies when the baseline shows the
/// device was actually busy.
const UTILIZATION_BASELINE_MIN_PCT: f64 = 50.0;

/// Samples required before power fluctuation can be computed.
const POWER_MIN_SAMPLES: usize = 2;

/// Samples required before a utilization baseline is meaningful.
const UTILIZATION_MIN_SAMPLES: usize = 10;

/// Most-recent samples excluded from the utilization baseline.
const UTILIZATION_RECENT_EXCLUDED: usize = 5;

/// Window (in samples, inclusive of the latest) for the rise-rate factor.
const RISE_WINDOW_SAMPLES: usize = 6;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Alert thresholds that normalize each risk factor.
#[derive(Debug, Clone)]
pub struct AlertThresholds {
    /// Temperature (°C) at which the temperature factor saturates at 1.0.
    pub temperature_c: f64,
    /// Memory utilization (%) at which the memory factor saturates.
    pub memory_utilization_pct: f64,
    /// Cycle-over-cycle power change (%) at which the power factor saturates.
    pub power_fluctuation_pct: f64,
    /// Utilization drop (percentage points) at which the drop factor saturates.
    pub gpu_utilization_drop_pct: f64,
    /// Temperature rise rate (°C per minute) at which the rise factor saturates.
    pub temperature_rise_rate: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            temperature_c: 85.0,
            memory_utilization_pct: 95.0,
            power_fluctuation_pct: 15.0,
            gpu_utilization_drop_pct: 30.0,
            temperature_rise_rate: 5.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Breakdown
// ---------------------------------------------------------------------------

/// Per-factor sub-scores, each already clamped to `[0, 1]`.
///
/// Factors whose history preconditions are unmet contribute 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBreakdown {
    pub temperature: f64,
    pub memory: f64,
    pub errors: f64,
    pub power_fluctuation: f64,
    pub utilization_drop: f64,
    pub temperature_rise: f64,
}

impl RiskBreakdown {
    /// The composite score: fixed weighted sum, weights summing to 1.0.
    pub fn total(&self) -> f64 {
        WEIGHT_TEMPERATURE * self.temperature
            + WEIGHT_MEMORY * self.memory
            + WEIGHT_ERRORS * self.errors
            + WEIGHT_POWER_FLUCTUATION * self.power_fluctuation
            + WEIGHT_UTILIZATION_DROP * self.utilization_drop
            + WEIGHT_TEMPERATURE_RISE * self.temperature_rise
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score a device's failure risk from its post-append history snapshot.
///
/// `sample_interval` is the monitor's sampling cadence; the rise-rate
/// factor uses it to convert a sample window into minutes. An empty
/// history scores zero on every factor.
pub fn failure_risk(
    history: &DeviceHistory,
    thresholds: &AlertThresholds,
    sample_interval: Duration,
) -> RiskBreakdown {
    let mut breakdown = RiskBreakdown {
        temperature: 0.0,
        memory: 0.0,
        errors: 0.0,
        power_fluctuation: 0.0,
        utilization_drop: 0.0,
        temperature_rise: 0.0,
    };

    let Some(current) = history.latest() else {
        return breakdown;
    };

    breakdown.temperature = clamp_unit(
        (current.temperature_c - TEMPERATURE_FLOOR_C)
            / (thresholds.temperature_c - TEMPERATURE_FLOOR_C),
    );

    breakdown.memory = clamp_unit(
        (current.memory_utilization_pct - MEMORY_FLOOR_PCT)
            / (thresholds.memory_utilization_pct - MEMORY_FLOOR_PCT),
    );

    breakdown.errors = if current.error_count > 0 { 1.0 } else { 0.0 };

    // Power fluctuation: magnitude of the cycle-over-cycle change, as a
    // percentage of the previous draw.
    if history.len() >= POWER_MIN_SAMPLES {
        let prev = history
            .nth_from_latest(1)
            .map(|s| s.power_draw_w)
            .unwrap_or(0.0);
        if prev > 0.0 {
            let change_pct = ((current.power_draw_w - prev) / prev * 100.0).abs();
            breakdown.power_fluctuation = clamp_unit(change_pct / thresholds.power_fluctuation_pct);
        }
    }

    // Utilization drop: current utilization against the mean of everything
    // but the most recent samples. A near-idle baseline carries no signal.
    if history.len() >= UTILIZATION_MIN_SAMPLES {
        let baseline_len = history.len() - UTILIZATION_RECENT_EXCLUDED;
        let baseline: f64 = history
            .iter()
            .take(baseline_len)
            .map(|s| s.gpu_utilization_pct)
            .sum::<f64>()
            / baseline_len as f64;
        if baseline > UTILIZATION_BASELINE_MIN_PCT {
            let drop = (baseline - current.gpu_utilization_pct).max(0.0);
            breakdown.utilization_drop = clamp_unit(drop / thresholds.gpu_utilization_drop_pct);
        }
    }

    // Temperature rise rate across the trailing sample window, in °C/min.
    if history.len() >= RISE_WINDOW_SAMPLES {
        let window_start = history
            .nth_from_latest(RISE_WINDOW_SAMPLES - 1)
            .map(|s| s.temperature_c)
            .unwrap_or(current.temperature_c);
        let window_minutes =
            sample_interval.as_secs_f64() * RISE_WINDOW_SAMPLES as f64 / 60.0;
        if window_minutes > 0.0 {
            let rise_rate = (current.temperature_c - window_start) / window_minutes;
            if rise_rate > 0.0 {
                breakdown.temperature_rise =
                    clamp_unit(rise_rate / thresholds.temperature_rise_rate);
            }
        }
    }

    breakdown
}

fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::DeviceSample;
    use chrono::Utc;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn sample() -> DeviceSample {
        DeviceSample {
            device_id: 0,
            name: "A100".to_string(),
            driver_version: "535".to_string(),
            temperature_c: 60.0,
            power_draw_w: 250.0,
            gpu_utilization_pct: 90.0,
            memory_utilization_pct: 60.0,
            memory_used_mb: 20000.0,
            memory_total_mb: 40960.0,
            error_count: 0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = WEIGHT_TEMPERATURE
            + WEIGHT_MEMORY
            + WEIGHT_ERRORS
            + WEIGHT_POWER_FLUCTUATION
            + WEIGHT_UTILIZATION_DROP
            + WEIGHT_TEMPERATURE_RISE;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_history_scores_zero() {
        let history = DeviceHistory::new(60);
        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.total(), 0.0);
    }

    #[test]
    fn hot_and_memory_saturated_sample_scores_forty_percent() {
        // Single sample at 90 °C and 96% memory utilization: temperature and
        // memory both saturate, every windowed factor lacks its precondition.
        let mut history = DeviceHistory::new(60);
        let mut s = sample();
        s.temperature_c = 90.0;
        s.memory_utilization_pct = 96.0;
        history.push(s);

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.temperature, 1.0);
        assert_eq!(breakdown.memory, 1.0);
        assert_eq!(breakdown.errors, 0.0);
        assert_eq!(breakdown.power_fluctuation, 0.0);
        assert_eq!(breakdown.utilization_drop, 0.0);
        assert_eq!(breakdown.temperature_rise, 0.0);
        assert!((breakdown.total() - 0.40).abs() < 1e-12);
        assert!(breakdown.total() >= TRIGGER_THRESHOLD);
    }

    #[test]
    fn cool_idle_sample_scores_zero() {
        let mut history = DeviceHistory::new(60);
        history.push(sample());
        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.total(), 0.0);
    }

    #[test]
    fn error_count_saturates_error_factor() {
        let mut history = DeviceHistory::new(60);
        let mut s = sample();
        s.error_count = 3;
        history.push(s);

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.errors, 1.0);
        assert!((breakdown.total() - WEIGHT_ERRORS).abs() < 1e-12);
    }

    #[test]
    fn temperature_factor_is_proportional_between_floor_and_threshold() {
        let mut history = DeviceHistory::new(60);
        let mut s = sample();
        s.temperature_c = 77.5; // halfway between 70 and 85
        history.push(s);

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert!((breakdown.temperature - 0.5).abs() < 1e-12);
    }

    #[test]
    fn power_fluctuation_needs_two_samples() {
        let mut history = DeviceHistory::new(60);
        let mut s = sample();
        s.power_draw_w = 200.0;
        history.push(s.clone());

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.power_fluctuation, 0.0);

        // 200 W -> 230 W is a 15% swing: saturates at the default threshold.
        s.power_draw_w = 230.0;
        history.push(s);
        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert!((breakdown.power_fluctuation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn power_fluctuation_ignores_zero_previous_draw() {
        let mut history = DeviceHistory::new(60);
        let mut s = sample();
        s.power_draw_w = 0.0;
        history.push(s.clone());
        s.power_draw_w = 300.0;
        history.push(s);

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.power_fluctuation, 0.0);
    }

    #[test]
    fn utilization_drop_flags_a_busy_device_going_quiet() {
        let mut history = DeviceHistory::new(60);
        for _ in 0..9 {
            let mut s = sample();
            s.gpu_utilization_pct = 95.0;
            history.push(s);
        }
        // Tenth sample: utilization collapsed. Baseline is the first five
        // samples (all 95), drop is 65 points against a threshold of 30.
        let mut s = sample();
        s.gpu_utilization_pct = 30.0;
        history.push(s);

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.utilization_drop, 1.0);
    }

    #[test]
    fn utilization_drop_skips_idle_baselines() {
        let mut history = DeviceHistory::new(60);
        for _ in 0..10 {
            let mut s = sample();
            s.gpu_utilization_pct = 20.0;
            history.push(s);
        }

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.utilization_drop, 0.0);
    }

    #[test]
    fn temperature_rise_scores_a_steady_climb() {
        // 60 -> 70 °C across a 6-sample window at 10 s cadence: 10 °C over
        // one minute, twice the default 5 °C/min threshold.
        let mut history = DeviceHistory::new(60);
        for t in [60.0, 62.0, 64.0, 66.0, 68.0, 70.0] {
            let mut s = sample();
            s.temperature_c = t;
            history.push(s);
        }

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.temperature_rise, 1.0);
    }

    #[test]
    fn temperature_rise_ignores_cooling() {
        let mut history = DeviceHistory::new(60);
        for t in [80.0, 78.0, 76.0, 74.0, 72.0, 70.0] {
            let mut s = sample();
            s.temperature_c = t;
            history.push(s);
        }

        let breakdown = failure_risk(&history, &AlertThresholds::default(), INTERVAL);
        assert_eq!(breakdown.temperature_rise, 0.0);
    }

    #[test]
    fn scoring_is_deterministic_over_an_unchanged_snapshot() {
        let mut history = DeviceHistory::new(60);
        for t in [60.0, 66.0, 72.0, 78.0, 84.0, 88.0] {
            let mut s = sample();
            s.temperature_c = t;
            s.power_draw_w = 200.0 + t;
            history.push(s);
        }

        let thresholds = AlertThresholds::default();
        let first = failure_risk(&history, &thresholds, INTERVAL);
        let second = failure_risk(&history, &thresholds, INTERVAL);
        assert_eq!(first, second);
        assert_eq!(first.total().to_bits(), second.total().to_bits());
    }
}

//! Theft detection and predictive-maintenance risk.
//!
//! Both models are pure functions of the current `SystemState`:
//! - Theft: pole power minus house power beyond a tolerance band, only
//!   meaningful while both producers are connected.
//! - Maintenance: `Px = a1 * Idev + a2 * Tdev`, where each deviation is the
//!   normalized excess of house current / temperature over a safe limit.
//!
//! The composite alert message follows a fixed precedence:
//! theft message > maintenance message > `HEALTHY_MESSAGE`.

use serde::{Deserialize, Serialize};

use crate::state::{AlertState, HouseState, SystemState};

/// Alert message when neither model fires.
pub const HEALTHY_MESSAGE: &str = "System Healthy";

/// Round half away from zero to 2 decimal places.
///
/// Exact halves go away from zero (0.125 -> 0.13), not to even as
/// banker's rounding would (0.125 -> 0.12).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Pole/house power gap (W) tolerated as line loss and metering error.
    #[serde(default = "default_theft_tolerance_watts")]
    pub theft_tolerance_watts: f64,
    /// House current (A) above which risk starts to accrue.
    #[serde(default = "default_current_safe_limit")]
    pub current_safe_limit: f64,
    /// Divisor normalizing the current excess.
    #[serde(default = "default_current_normalizer")]
    pub current_normalizer: f64,
    /// House temperature (°C) above which risk starts to accrue.
    #[serde(default = "default_temperature_safe_limit")]
    pub temperature_safe_limit: f64,
    /// Divisor normalizing the temperature excess.
    #[serde(default = "default_temperature_normalizer")]
    pub temperature_normalizer: f64,
    /// Weight of the current deviation (a1).
    #[serde(default = "default_current_weight")]
    pub current_weight: f64,
    /// Weight of the temperature deviation (a2).
    #[serde(default = "default_temperature_weight")]
    pub temperature_weight: f64,
    /// Score strictly above which maintenance risk is raised.
    #[serde(default = "default_critical_score")]
    pub critical_score: f64,
}

fn default_theft_tolerance_watts() -> f64 {
    20.0
}

fn default_current_safe_limit() -> f64 {
    10.0
}

fn default_current_normalizer() -> f64 {
    10.0
}

fn default_temperature_safe_limit() -> f64 {
    40.0
}

fn default_temperature_normalizer() -> f64 {
    40.0
}

fn default_current_weight() -> f64 {
    0.6
}

fn default_temperature_weight() -> f64 {
    0.4
}

fn default_critical_score() -> f64 {
    0.7
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            theft_tolerance_watts: default_theft_tolerance_watts(),
            current_safe_limit: default_current_safe_limit(),
            current_normalizer: default_current_normalizer(),
            temperature_safe_limit: default_temperature_safe_limit(),
            temperature_normalizer: default_temperature_normalizer(),
            current_weight: default_current_weight(),
            temperature_weight: default_temperature_weight(),
            critical_score: default_critical_score(),
        }
    }
}

impl AnalyticsConfig {
    /// Validate configuration values.
    ///
    /// Normalizers must be positive, weights and tolerance non-negative.
    pub fn validate(&self) -> Result<(), String> {
        if self.current_normalizer <= 0.0 || self.temperature_normalizer <= 0.0 {
            return Err(format!(
                "normalizers must be positive (current={}, temperature={})",
                self.current_normalizer, self.temperature_normalizer
            ));
        }
        if self.current_weight < 0.0 || self.temperature_weight < 0.0 {
            return Err(format!(
                "weights must be non-negative (current={}, temperature={})",
                self.current_weight, self.temperature_weight
            ));
        }
        if self.theft_tolerance_watts < 0.0 {
            return Err(format!(
                "theft_tolerance_watts ({}) must be non-negative",
                self.theft_tolerance_watts
            ));
        }
        Ok(())
    }
}

/// Result of the theft model.
#[derive(Debug, Clone, PartialEq)]
pub struct TheftAssessment {
    pub detected: bool,
    /// Pole minus house power; `None` when either side is disconnected.
    pub loss_watts: Option<f64>,
    pub message: Option<String>,
}

/// Result of the maintenance model.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceAssessment {
    pub current_deviation: f64,
    pub temperature_deviation: f64,
    /// Unrounded Px.
    pub score: f64,
    pub at_risk: bool,
    pub message: Option<String>,
}

impl MaintenanceAssessment {
    /// Px as stored in the alert state.
    pub fn rounded_score(&self) -> f64 {
        round2(self.score)
    }
}

/// Evaluates both models and folds them into one alert state.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
}

impl AnalyticsEngine {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Energy-theft detection.
    ///
    /// Only fires with both producers connected; a stale power gap from a
    /// disconnected node never raises it.
    pub fn detect_theft(&self, state: &SystemState) -> TheftAssessment {
        if !(state.pole.connected && state.house.connected) {
            return TheftAssessment {
                detected: false,
                loss_watts: None,
                message: None,
            };
        }

        let loss = state.pole.power - state.house.power;
        if loss > self.config.theft_tolerance_watts {
            TheftAssessment {
                detected: true,
                loss_watts: Some(loss),
                message: Some(format!("THEFT DETECTED! {loss:.1}W unaccounted for.")),
            }
        } else {
            TheftAssessment {
                detected: false,
                loss_watts: Some(loss),
                message: None,
            }
        }
    }

    /// Predictive-maintenance risk from house current and temperature.
    ///
    /// Runs regardless of connectivity.
    pub fn assess_maintenance(&self, house: &HouseState) -> MaintenanceAssessment {
        let c = &self.config;
        let current_deviation =
            ((house.current - c.current_safe_limit) / c.current_normalizer).max(0.0);
        let temperature_deviation =
            ((house.temperature - c.temperature_safe_limit) / c.temperature_normalizer).max(0.0);
        let score = c.current_weight * current_deviation + c.temperature_weight * temperature_deviation;

        let at_risk = score > c.critical_score;
        let message =
            at_risk.then(|| format!("CRITICAL: High Failure Risk (Score: {score:.2})"));

        MaintenanceAssessment {
            current_deviation,
            temperature_deviation,
            score,
            at_risk,
            message,
        }
    }

    /// Run both models, keeping the individual assessments.
    pub fn assess(&self, state: &SystemState) -> Evaluation {
        let theft = self.detect_theft(state);
        let maintenance = self.assess_maintenance(&state.house);

        let message = theft
            .message
            .clone()
            .or_else(|| maintenance.message.clone())
            .unwrap_or_else(|| HEALTHY_MESSAGE.to_string());

        let alerts = AlertState {
            theft_detected: theft.detected,
            maintenance_risk: maintenance.at_risk,
            risk_score: maintenance.rounded_score(),
            message,
        };

        Evaluation {
            theft,
            maintenance,
            alerts,
        }
    }

    /// Run both models and build the complete alert state.
    pub fn evaluate(&self, state: &SystemState) -> AlertState {
        self.assess(state).alerts
    }
}

/// Both model results plus the alert state they fold into.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub theft: TheftAssessment,
    pub maintenance: MaintenanceAssessment,
    pub alerts: AlertState,
}

//! Engine configuration with documented constants
//!
//! Every tunable the combat core and AI planner read lives here, with an
//! explanation of what changing it does.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};

/// Configuration for the combat core and AI planner.
///
/// Loaded from TOML alongside the rest of the game content; `Default`
/// matches the shipped tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    // === COMBAT ===
    /// Whether critical hits exist at all
    ///
    /// When false `compute_crit` returns zero and no strike ever crits.
    pub crits_enabled: bool,

    /// Fraction of successful hit rolls converted into glancing hits
    ///
    /// A glancing hit connects but deals no damage. At 0.0 the glancing
    /// tier does not exist and every successful roll is a full hit.
    pub glancing_band: f32,

    /// Attack-speed margin required to strike twice
    ///
    /// A combatant doubles when its attack speed exceeds the opponent's
    /// defense speed by at least this much.
    pub speed_to_double: i32,

    /// Critical hits multiply post-mitigation damage by this factor
    pub crit_multiplier: i32,

    // === AI ===
    /// Wall-clock budget for one AI `think()` slice, in milliseconds
    ///
    /// The planner does as many candidate evaluations as fit in this
    /// window and then yields; half a 60fps frame by default.
    pub ai_think_budget_ms: u64,

    /// Utility margin a new AI candidate must beat the incumbent by
    ///
    /// Prevents churn between near-equal plans.
    pub ai_score_epsilon: f32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            crits_enabled: true,
            glancing_band: 0.0,
            speed_to_double: 4,
            crit_multiplier: 2,
            ai_think_budget_ms: 8,
            ai_score_epsilon: 0.001,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: CoreConfig =
            toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.glancing_band) {
            return Err(EngineError::Config(format!(
                "glancing_band must be in [0, 1], got {}",
                self.glancing_band
            )));
        }
        if self.crit_multiplier < 1 {
            return Err(EngineError::Config(format!(
                "crit_multiplier must be at least 1, got {}",
                self.crit_multiplier
            )));
        }
        Ok(())
    }
}

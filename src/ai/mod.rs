//! Utility-based AI planner
//!
//! Resumable, time-sliced decision making for non-player units. The
//! controller cycles a unit's behaviour list, delegating to the primary
//! (attack/support) or secondary (movement) search; both produce the same
//! engage/move requests the player path uses, so AI turns and player turns
//! resolve through identical code.

pub mod behaviour;
pub mod controller;
pub mod primary;
pub mod secondary;

pub use behaviour::{AiAction, AiBehaviour, TargetSpec, ViewRange};
pub use controller::{AiController, AiDecision};

/// Mix weighted utility terms into a single 0..=1 score
pub(crate) fn process_terms(terms: &[(f32, f32)]) -> f32 {
    let total_weight: f32 = terms.iter().map(|(_, weight)| weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    terms
        .iter()
        .map(|(value, weight)| value * weight)
        .sum::<f32>()
        / total_weight
}

#[cfg(test)]
mod tests {
    use super::process_terms;

    #[test]
    fn test_process_terms_normalizes_by_weight() {
        let score = process_terms(&[(1.0, 60.0), (0.0, 40.0)]);
        assert!((score - 0.6).abs() < 1e-6);
        assert_eq!(process_terms(&[]), 0.0);
    }
}

//! Combat resolution
//!
//! An attack is committed as an [`engagement::Engagement`], expanded into
//! phases by the [`solver::CombatPhaseSolver`], and resolved one phase per
//! step into `(Vec<Action>, Vec<PlaybackEvent>)`. Formulas live in
//! [`calc`]; nothing here renders or waits.

pub mod action;
pub mod calc;
pub mod engagement;
pub mod playback;
pub mod solver;

pub use engagement::{Engagement, PhaseKind};
pub use solver::CombatPhaseSolver;

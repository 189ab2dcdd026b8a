//! AI behaviour definitions
//!
//! A unit carries an ordered list of behaviours; the controller tries each
//! in turn until one produces a usable action. Behaviours are plain data,
//! deserializable straight from level content.

use serde::{Deserialize, Serialize};

use crate::components::dispatch;
use crate::core::types::{Nid, Pos, StatId};
use crate::item::ItemArena;
use crate::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiAction {
    Attack,
    Support,
    MoveTo,
    MoveAwayFrom,
    DoNothing,
}

/// What the behaviour aims at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSpec {
    Enemies,
    Allies,
    Unit(Nid),
    Position(Pos),
    StartingPosition,
}

/// How far afield the behaviour is willing to look
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRange {
    /// Strike range only; the unit stands its ground
    MaxRange,
    MovementPlusRange,
    DoubleMovement,
    EntireMap,
    Custom(i32),
}

impl ViewRange {
    /// Maximum candidate distance from the unit; None means unlimited
    pub fn limit(&self, unit: &Unit, items: &ItemArena) -> Option<i32> {
        let max_range = unit
            .items
            .iter()
            .filter_map(|id| items.get(*id))
            .filter(|item| dispatch::available(unit, item))
            .map(|item| dispatch::maximum_range(unit, item) as i32)
            .max()
            .unwrap_or(0);
        match self {
            ViewRange::MaxRange => Some(max_range),
            ViewRange::MovementPlusRange => Some(unit.stat(StatId::Mov) + max_range),
            ViewRange::DoubleMovement => Some(unit.stat(StatId::Mov) * 2),
            ViewRange::EntireMap => None,
            ViewRange::Custom(n) => Some(*n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiBehaviour {
    pub action: AiAction,
    pub target: TargetSpec,
    pub view_range: ViewRange,
}

impl AiBehaviour {
    pub fn attack() -> Self {
        Self {
            action: AiAction::Attack,
            target: TargetSpec::Enemies,
            view_range: ViewRange::MovementPlusRange,
        }
    }

    pub fn support() -> Self {
        Self {
            action: AiAction::Support,
            target: TargetSpec::Allies,
            view_range: ViewRange::MovementPlusRange,
        }
    }

    /// Close distance toward the nearest enemy, however far
    pub fn pursue() -> Self {
        Self {
            action: AiAction::MoveTo,
            target: TargetSpec::Enemies,
            view_range: ViewRange::EntireMap,
        }
    }

    pub fn retreat() -> Self {
        Self {
            action: AiAction::MoveAwayFrom,
            target: TargetSpec::Enemies,
            view_range: ViewRange::DoubleMovement,
        }
    }

    pub fn hold() -> Self {
        Self {
            action: AiAction::DoNothing,
            target: TargetSpec::StartingPosition,
            view_range: ViewRange::MaxRange,
        }
    }
}

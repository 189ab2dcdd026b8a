//! Committable actions
//!
//! The single-writer rule of the core: hooks, formulas, and the AI never
//! touch unit state directly; every mutation is expressed as an `Action`
//! and committed through `apply`. The solver applies each phase's list
//! exactly once.

use serde::{Deserialize, Serialize};

use crate::context::BattleContext;
use crate::core::types::{Nid, Pos};
use crate::item::ItemId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Positive heals, negative damages; clamped to `0..=max_hp`
    ChangeHp { unit: Nid, amount: i32 },
    UseItemCharge { unit: Nid, item: ItemId },
    SetItemData { item: ItemId, key: String, value: i64 },
    SetSkillData { unit: Nid, skill: Nid, key: String, value: i64 },
    ApplyStatus { unit: Nid, status: Nid },
    GainWexp { unit: Nid, amount: i32 },
    GainExp { unit: Nid, amount: i32 },
    Die { unit: Nid },
    Move { unit: Nid, to: Pos, cost: i32 },
    Wait { unit: Nid },
    EquipItem { unit: Nid, item: ItemId },
}

impl Action {
    /// Commit this mutation. Unknown nids are ignored rather than fatal:
    /// a phase's action list may legitimately reference a unit that an
    /// earlier action in the same list already removed.
    pub fn apply(&self, ctx: &mut BattleContext) {
        match self {
            Action::ChangeHp { unit, amount } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    u.hp = (u.hp + amount).clamp(0, u.max_hp());
                }
            }
            Action::UseItemCharge { unit: _, item } => {
                if let Some(i) = ctx.items.get_mut(*item) {
                    if let Some(uses) = i.data.get_mut("uses") {
                        *uses = (*uses - 1).max(0);
                    }
                }
            }
            Action::SetItemData { item, key, value } => {
                if let Some(i) = ctx.items.get_mut(*item) {
                    i.data.insert(key.clone(), *value);
                }
            }
            Action::SetSkillData {
                unit,
                skill,
                key,
                value,
            } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    if let Some(s) = u.skills.iter_mut().find(|s| &s.nid == skill) {
                        s.data.insert(key.clone(), *value);
                    }
                }
            }
            Action::ApplyStatus { unit, status } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    if !u.has_status(status) {
                        u.statuses.push(status.clone());
                    }
                }
            }
            Action::GainWexp { unit, amount } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    u.wexp += amount;
                }
            }
            Action::GainExp { unit, amount } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    u.exp += amount;
                }
            }
            Action::Die { unit } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    if let Some(pos) = u.position.take() {
                        ctx.board.clear_unit(pos);
                    }
                    u.finished = true;
                    tracing::debug!(unit = %u.nid, "unit died");
                }
            }
            Action::Move { unit, to, cost } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    if let Some(from) = u.position {
                        ctx.board.clear_unit(from);
                    }
                    ctx.board.place_unit(*to, unit.clone(), u.team);
                    u.position = Some(*to);
                    u.movement_left = (u.movement_left - cost).max(0);
                }
            }
            Action::Wait { unit } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    u.finished = true;
                }
            }
            Action::EquipItem { unit, item } => {
                if let Some(u) = ctx.units.get_mut(unit) {
                    u.equip(*item);
                }
            }
        }
    }
}

/// Apply a whole phase's action list in order
pub fn apply_all(actions: &[Action], ctx: &mut BattleContext) {
    for action in actions {
        action.apply(ctx);
    }
}

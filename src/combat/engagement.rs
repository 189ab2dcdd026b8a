//! Engagements
//!
//! The ephemeral value object describing one full combat interaction.
//! Built when a player or the AI commits to attack, consumed entirely by
//! the phase solver, never persisted.

use crate::components::dispatch;
use crate::context::BattleContext;
use crate::core::error::Result;
use crate::core::types::{Nid, Pos};
use crate::item::ItemId;

/// Which side a phase belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Attacker,
    Defender,
    AttackerPartner,
    DefenderPartner,
}

#[derive(Debug, Clone)]
pub struct Engagement {
    pub attacker: Nid,
    /// The item the attacker committed with
    pub item: ItemId,
    /// Items actually swung, one per target; sequence items expand into
    /// their subitems here
    pub items: Vec<ItemId>,
    pub target_positions: Vec<Pos>,
    pub total_rounds: u32,
    pub attacker_partner: Option<Nid>,
    pub defender_partner: Option<Nid>,
    /// Scripted phase order override, for cutscene fights
    pub script: Option<Vec<PhaseKind>>,
}

impl Engagement {
    /// Build an engagement: expand sequence subitems, and drop any target
    /// position that `target_restrict` rejects
    pub fn engage(
        ctx: &BattleContext,
        attacker: &Nid,
        item: ItemId,
        target_positions: Vec<Pos>,
    ) -> Result<Engagement> {
        let unit = ctx.unit(attacker)?;
        let main_item = ctx.item(item)?;

        let mut positions = target_positions;
        positions.retain(|pos| dispatch::target_restrict(ctx, unit, main_item, *pos));
        positions.truncate(dispatch::num_targets(unit, main_item).max(1) as usize);

        let items = if main_item.subitems.is_empty() {
            vec![item; positions.len().max(1)]
        } else {
            main_item.subitems.clone()
        };

        Ok(Engagement {
            attacker: attacker.clone(),
            item,
            items,
            target_positions: positions,
            total_rounds: 1,
            attacker_partner: None,
            defender_partner: None,
            script: None,
        })
    }

    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.total_rounds = rounds.max(1);
        self
    }

    pub fn with_attacker_partner(mut self, partner: Nid) -> Self {
        self.attacker_partner = Some(partner);
        self
    }

    pub fn with_defender_partner(mut self, partner: Nid) -> Self {
        self.defender_partner = Some(partner);
        self
    }

    pub fn with_script(mut self, script: Vec<PhaseKind>) -> Self {
        self.script = Some(script);
        self
    }

    /// Item swung at the i-th target
    pub fn item_for(&self, target_index: usize) -> ItemId {
        self.items
            .get(target_index)
            .or_else(|| self.items.last())
            .copied()
            .unwrap_or(self.item)
    }
}

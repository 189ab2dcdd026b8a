//! Primary AI: offensive and support candidate search
//!
//! A resumable cursor over items x targets x reachable strike tiles. All
//! search state is plain data, so a think slice can stop after any
//! candidate and resume next frame with no re-derivation. Candidate
//! evaluation quick-moves the unit on the board, scores the triple, and
//! moves it back; nothing is committed until the controller's decision is
//! executed through Actions.

use std::time::Instant;

use crate::board;
use crate::combat::calc::{self, AttackInfo, CombatMode};
use crate::components::dispatch;
use crate::context::BattleContext;
use crate::core::error::{EngineError, Result};
use crate::core::types::{Nid, Pos};
use crate::item::ItemId;

use super::behaviour::{AiAction, AiBehaviour};
use super::process_terms;

/// A scored (item, target, move-to) triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub item: ItemId,
    pub target_pos: Pos,
    pub move_to: Pos,
    pub score: f32,
}

pub struct PrimaryAi {
    unit: Nid,
    behaviour: AiBehaviour,
    items: Vec<ItemId>,
    item_index: usize,
    targets: Vec<Pos>,
    target_index: usize,
    tiles: Vec<Pos>,
    tile_index: usize,
    started: bool,
    best: Option<Candidate>,
}

impl PrimaryAi {
    pub fn new(ctx: &BattleContext, unit: &Nid, behaviour: AiBehaviour) -> Result<Self> {
        let u = ctx.unit(unit)?;
        let items: Vec<ItemId> = u
            .items
            .iter()
            .copied()
            .filter(|id| match ctx.items.get(*id) {
                Some(item) => {
                    if !dispatch::available(u, item) {
                        return false;
                    }
                    match behaviour.action {
                        AiAction::Support => dispatch::damage(u, item).is_none(),
                        _ => dispatch::damage(u, item).is_some(),
                    }
                }
                None => false,
            })
            .collect();
        Ok(Self {
            unit: unit.clone(),
            behaviour,
            items,
            item_index: 0,
            targets: Vec::new(),
            target_index: 0,
            tiles: Vec::new(),
            tile_index: 0,
            started: false,
            best: None,
        })
    }

    pub fn best(&self) -> Option<Candidate> {
        self.best
    }

    /// Advance the search until the deadline or exhaustion; true on
    /// exhaustion. At least one candidate is evaluated per call so the
    /// search always makes progress under a zero budget.
    pub fn think(&mut self, ctx: &mut BattleContext, deadline: Instant) -> Result<bool> {
        if !self.started {
            self.started = true;
            self.reload_targets(ctx)?;
        }
        loop {
            // Advance the cursor to the next live triple
            while self.tile_index >= self.tiles.len() {
                if self.target_index + 1 < self.targets.len() {
                    self.target_index += 1;
                    self.reload_tiles(ctx)?;
                } else if self.item_index + 1 < self.items.len() {
                    self.item_index += 1;
                    self.reload_targets(ctx)?;
                } else {
                    return Ok(true);
                }
            }
            let item = self.items[self.item_index];
            let target_pos = self.targets[self.target_index];
            let move_to = self.tiles[self.tile_index];
            self.tile_index += 1;

            let score = match self.evaluate(ctx, item, target_pos, move_to) {
                Ok(score) => score,
                Err(err) => {
                    tracing::warn!(unit = %self.unit, item = item.0, %err, "candidate evaluation failed");
                    0.0
                }
            };
            let lead = self
                .best
                .map(|b| b.score + ctx.config.ai_score_epsilon)
                .unwrap_or(0.0);
            if score > lead {
                self.best = Some(Candidate {
                    item,
                    target_pos,
                    move_to,
                    score,
                });
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    fn reload_targets(&mut self, ctx: &BattleContext) -> Result<()> {
        self.targets.clear();
        self.target_index = 0;
        self.tiles.clear();
        self.tile_index = 0;
        let Some(&item_id) = self.items.get(self.item_index) else {
            return Ok(());
        };
        let unit = ctx.unit(&self.unit)?;
        let item = ctx.item(item_id)?;
        let limit = self.behaviour.view_range.limit(unit, &ctx.items);
        let mut targets: Vec<Pos> = dispatch::ai_targets(ctx, unit, item)
            .into_iter()
            .filter(|pos| match (limit, unit.position) {
                (Some(limit), Some(me)) => (me.distance(*pos) as i32) <= limit,
                _ => true,
            })
            .collect();
        targets.sort_by_key(|p| (p.x, p.y));
        self.targets = targets;
        self.reload_tiles(ctx)
    }

    fn reload_tiles(&mut self, ctx: &BattleContext) -> Result<()> {
        self.tiles.clear();
        self.tile_index = 0;
        let (Some(&item_id), Some(&target)) = (
            self.items.get(self.item_index),
            self.targets.get(self.target_index),
        ) else {
            return Ok(());
        };
        let unit = ctx.unit(&self.unit)?;
        let item = ctx.item(item_id)?;
        let Some(start) = unit.position else {
            return Ok(());
        };
        let min = dispatch::minimum_range(unit, item);
        let max = dispatch::maximum_range(unit, item);
        let mut tiles: Vec<Pos> =
            board::valid_moves(&*ctx.board, start, unit.team, unit.movement_left)
                .into_iter()
                .filter(|tile| {
                    let d = tile.distance(target);
                    d >= min && d <= max
                })
                .collect();
        tiles.sort_by_key(|p| (p.x, p.y));
        self.tiles = tiles;
        Ok(())
    }

    /// Quick-move to the candidate tile, score, move back
    fn evaluate(
        &self,
        ctx: &mut BattleContext,
        item: ItemId,
        target_pos: Pos,
        move_to: Pos,
    ) -> Result<f32> {
        let original = ctx.unit(&self.unit)?.position;
        quick_move(ctx, &self.unit, move_to)?;
        let score = compute_priority(ctx, &self.unit, item, target_pos, self.behaviour.action);
        if let Some(pos) = original {
            quick_move(ctx, &self.unit, pos)?;
        }
        score
    }
}

/// Non-committing board move: occupancy and position change, movement
/// budget does not
fn quick_move(ctx: &mut BattleContext, nid: &Nid, to: Pos) -> Result<()> {
    let unit = ctx
        .units
        .get_mut(nid)
        .ok_or_else(|| EngineError::UnitNotFound(nid.clone()))?;
    if let Some(from) = unit.position {
        ctx.board.clear_unit(from);
    }
    ctx.board.place_unit(to, nid.clone(), unit.team);
    unit.position = Some(to);
    Ok(())
}

/// Utility of striking `target_pos` with `item` from the unit's current
/// position. An explicit `ai_priority` component hook overrides the
/// default scoring entirely.
pub fn compute_priority(
    ctx: &BattleContext,
    nid: &Nid,
    item_id: ItemId,
    target_pos: Pos,
    action: AiAction,
) -> Result<f32> {
    let unit = ctx.unit(nid)?;
    let item = ctx.item(item_id)?;
    if !dispatch::target_restrict(ctx, unit, item, target_pos) {
        return Ok(0.0);
    }
    if let Some(priority) = dispatch::ai_priority(unit, item) {
        return Ok(priority);
    }
    match action {
        AiAction::Support => support_priority(ctx, nid, item_id, target_pos),
        _ => attack_priority(ctx, nid, item_id, target_pos),
    }
}

fn attack_priority(
    ctx: &BattleContext,
    nid: &Nid,
    item_id: ItemId,
    target_pos: Pos,
) -> Result<f32> {
    let unit = ctx.unit(nid)?;
    let item = ctx.item(item_id)?;
    let (main, splash) = dispatch::splash(ctx, unit, item, target_pos);
    let mut positions: Vec<Pos> = main.into_iter().chain(splash).collect();
    positions.dedup();

    let info = AttackInfo::default();
    let mut total = 0.0;
    for pos in positions {
        let Some(target) = ctx.unit_at(pos) else {
            continue;
        };
        let def_item = dispatch::get_weapon(target, &ctx.items).and_then(|id| ctx.items.get(id));
        let accuracy = (calc::compute_hit(ctx, unit, item, target, def_item, CombatMode::Attack, info)?
            as f32
            / 100.0)
            .clamp(0.0, 1.0);
        let damage =
            calc::compute_damage(ctx, unit, item, target, def_item, CombatMode::Attack, info, false)?
                as f32;
        let strikes =
            calc::compute_multiattacks(unit, item, Some(target), CombatMode::Attack, info) as f32;
        let lethality = (damage * strikes / target.hp.max(1) as f32).min(1.0);
        let crit_chance = calc::compute_crit(ctx, unit, item, target, def_item)? as f32 / 100.0;

        let counter_risk = if calc::can_counterattack(unit, item, target, def_item) {
            match def_item {
                Some(di) => {
                    let their_hit = (calc::compute_hit(
                        ctx,
                        target,
                        di,
                        unit,
                        Some(item),
                        CombatMode::Defense,
                        info,
                    )? as f32
                        / 100.0)
                        .clamp(0.0, 1.0);
                    let their_damage = calc::compute_damage(
                        ctx,
                        target,
                        di,
                        unit,
                        Some(item),
                        CombatMode::Defense,
                        info,
                        false,
                    )? as f32;
                    (their_damage / unit.hp.max(1) as f32).min(1.0) * their_hit
                }
                None => 0.0,
            }
        } else {
            0.0
        };

        let status = if applies_status(unit, item) { 1.0 } else { 0.0 };
        let closeness = match unit.position {
            Some(me) => 1.0 / (1.0 + me.distance(target_pos) as f32),
            None => 0.0,
        };

        let score = process_terms(&[
            (lethality * accuracy, 60.0),
            (crit_chance * accuracy, 10.0),
            (1.0 - counter_risk, 15.0),
            (status * accuracy, 10.0),
            (closeness, 5.0),
        ]);
        // Splashing an ally counts against the candidate
        if unit.team.is_enemy(target.team) {
            total += score;
        } else {
            total -= score;
        }
    }
    Ok(total.max(0.0))
}

fn support_priority(
    ctx: &BattleContext,
    nid: &Nid,
    item_id: ItemId,
    target_pos: Pos,
) -> Result<f32> {
    let unit = ctx.unit(nid)?;
    let item = ctx.item(item_id)?;
    let Some(target) = ctx.unit_at(target_pos) else {
        return Ok(0.0);
    };
    if unit.team.is_enemy(target.team) {
        return Ok(0.0);
    }
    let missing = (target.max_hp() - target.hp) as f32 / target.max_hp().max(1) as f32;
    let status = if applies_status(unit, item) { 1.0 } else { 0.0 };
    let closeness = match unit.position {
        Some(me) => 1.0 / (1.0 + me.distance(target_pos) as f32),
        None => 0.0,
    };
    Ok(process_terms(&[
        (missing, 70.0),
        (status, 20.0),
        (closeness, 10.0),
    ]))
}

fn applies_status(unit: &crate::unit::Unit, item: &crate::item::Item) -> bool {
    use crate::components::component::Component;
    dispatch::component_stack(unit, item)
        .iter()
        .any(|a| matches!(a.component, Component::StatusOnHit { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::GridBoard;
    use crate::components::component::Component;
    use crate::core::types::{StatId, Team};
    use crate::item::ItemDef;
    use crate::unit::Unit;

    fn far_deadline() -> Instant {
        Instant::now() + std::time::Duration::from_secs(60)
    }

    fn sword(damage: i32) -> ItemDef {
        ItemDef::new(
            "sword",
            vec![
                Component::Weapon,
                Component::TargetsEnemies,
                Component::MinRange { value: 1 },
                Component::MaxRange { value: 1 },
                Component::Damage { value: damage },
                Component::Hit { value: 100 },
            ],
        )
    }

    #[test]
    fn test_prefers_kill_over_chip() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(10, 10)), 7);
        let blade = ctx.items.load(&sword(8));
        ctx.place(
            Unit::new("wolf", Team::Enemy)
                .with_stat(StatId::Hp, 20)
                .with_stat(StatId::Mov, 4)
                .at(Pos::new(4, 4))
                .with_item(blade),
        );
        ctx.place(
            Unit::new("wounded", Team::Player)
                .with_stat(StatId::Hp, 8)
                .at(Pos::new(4, 6)),
        );
        ctx.place(
            Unit::new("healthy", Team::Player)
                .with_stat(StatId::Hp, 30)
                .at(Pos::new(6, 4)),
        );
        let mut ai = PrimaryAi::new(&ctx, &Nid::from("wolf"), AiBehaviour::attack()).unwrap();
        assert!(ai.think(&mut ctx, far_deadline()).unwrap());
        let best = ai.best().unwrap();
        // Lethal target scores above the chip target
        assert_eq!(best.target_pos, Pos::new(4, 6));
        assert_eq!(best.item, blade);
    }

    #[test]
    fn test_evaluation_restores_position() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(10, 10)), 7);
        let blade = ctx.items.load(&sword(5));
        ctx.place(
            Unit::new("wolf", Team::Enemy)
                .with_stat(StatId::Hp, 20)
                .with_stat(StatId::Mov, 3)
                .at(Pos::new(0, 0))
                .with_item(blade),
        );
        ctx.place(
            Unit::new("mark", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(0, 3)),
        );
        let mut ai = PrimaryAi::new(&ctx, &Nid::from("wolf"), AiBehaviour::attack()).unwrap();
        assert!(ai.think(&mut ctx, far_deadline()).unwrap());
        assert_eq!(ctx.unit(&Nid::from("wolf")).unwrap().position, Some(Pos::new(0, 0)));
        assert_eq!(ctx.board.unit_at(Pos::new(0, 0)), Some(&Nid::from("wolf")));
    }

    #[test]
    fn test_ai_priority_hook_overrides_default_scoring() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(10, 10)), 7);
        let blade = ctx.items.load(&sword(1));
        let mut favored_def = sword(1);
        favored_def.nid = Nid::from("favored");
        favored_def
            .components
            .push(Component::AiPriorityBoost { value: 5.0 });
        let favored = ctx.items.load(&favored_def);
        ctx.place(
            Unit::new("wolf", Team::Enemy)
                .with_stat(StatId::Hp, 20)
                .with_stat(StatId::Mov, 2)
                .at(Pos::new(0, 0))
                .with_item(blade)
                .with_item(favored),
        );
        ctx.place(
            Unit::new("mark", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(0, 1)),
        );
        let mut ai = PrimaryAi::new(&ctx, &Nid::from("wolf"), AiBehaviour::attack()).unwrap();
        assert!(ai.think(&mut ctx, far_deadline()).unwrap());
        assert_eq!(ai.best().unwrap().item, favored);
    }

    #[test]
    fn test_no_candidates_reports_done_without_best() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(10, 10)), 7);
        let blade = ctx.items.load(&sword(5));
        ctx.place(
            Unit::new("wolf", Team::Enemy)
                .with_stat(StatId::Hp, 20)
                .with_stat(StatId::Mov, 2)
                .at(Pos::new(0, 0))
                .with_item(blade),
        );
        // Only target is far outside movement plus range
        ctx.place(
            Unit::new("mark", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(9, 9)),
        );
        let mut ai = PrimaryAi::new(&ctx, &Nid::from("wolf"), AiBehaviour::attack()).unwrap();
        assert!(ai.think(&mut ctx, far_deadline()).unwrap());
        assert!(ai.best().is_none());
    }

    #[test]
    fn test_sliced_search_matches_uninterrupted_search() {
        let build = || {
            let mut ctx = BattleContext::new(Box::new(GridBoard::new(10, 10)), 7);
            let blade = ctx.items.load(&sword(6));
            ctx.place(
                Unit::new("wolf", Team::Enemy)
                    .with_stat(StatId::Hp, 20)
                    .with_stat(StatId::Mov, 4)
                    .at(Pos::new(4, 4))
                    .with_item(blade),
            );
            ctx.place(
                Unit::new("a", Team::Player)
                    .with_stat(StatId::Hp, 9)
                    .at(Pos::new(4, 7)),
            );
            ctx.place(
                Unit::new("b", Team::Player)
                    .with_stat(StatId::Hp, 25)
                    .at(Pos::new(1, 4)),
            );
            ctx
        };

        let mut ctx_one = build();
        let mut whole = PrimaryAi::new(&ctx_one, &Nid::from("wolf"), AiBehaviour::attack()).unwrap();
        assert!(whole.think(&mut ctx_one, far_deadline()).unwrap());

        let mut ctx_two = build();
        let mut sliced =
            PrimaryAi::new(&ctx_two, &Nid::from("wolf"), AiBehaviour::attack()).unwrap();
        let mut slices = 0;
        // An already-expired deadline forces one candidate per call
        while !sliced.think(&mut ctx_two, Instant::now()).unwrap() {
            slices += 1;
            assert!(slices < 10_000, "search failed to terminate");
        }
        assert!(slices > 1, "expected the search to be split across slices");
        assert_eq!(whole.best(), sliced.best());
    }
}

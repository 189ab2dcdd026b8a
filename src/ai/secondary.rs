//! Secondary AI: movement and retreat
//!
//! Scores candidate destinations by pathed distance and target value, one
//! A* query per candidate, then projects the unit along the best path as
//! far as its movement budget allows. When the view range yields nothing
//! the search widens to the whole map once before giving up.

use std::time::Instant;

use crate::board::{self, PathConstraints};
use crate::combat::calc::{self, AttackInfo, CombatMode};
use crate::components::dispatch;
use crate::context::BattleContext;
use crate::core::error::Result;
use crate::core::types::{Nid, Pos};

use super::behaviour::{AiAction, AiBehaviour, TargetSpec};
use super::process_terms;

pub struct SecondaryAi {
    unit: Nid,
    behaviour: AiBehaviour,
    candidates: Vec<Pos>,
    index: usize,
    widened: bool,
    /// Goal, full path to it, score
    best: Option<(Pos, Vec<Pos>, f32)>,
}

impl SecondaryAi {
    pub fn new(ctx: &BattleContext, unit: &Nid, behaviour: AiBehaviour) -> Result<Self> {
        let mut ai = Self {
            unit: unit.clone(),
            behaviour,
            candidates: Vec::new(),
            index: 0,
            widened: false,
            best: None,
        };
        ai.candidates = ai.enumerate(ctx, false)?;
        Ok(ai)
    }

    /// Advance until the deadline or exhaustion; true on exhaustion
    pub fn think(&mut self, ctx: &BattleContext, deadline: Instant) -> Result<bool> {
        loop {
            if self.index >= self.candidates.len() {
                if self.best.is_none() && !self.widened {
                    self.widened = true;
                    self.index = 0;
                    self.candidates = self.enumerate(ctx, true)?;
                    if self.candidates.is_empty() {
                        return Ok(true);
                    }
                    continue;
                }
                return Ok(true);
            }
            let goal = self.candidates[self.index];
            self.index += 1;

            match self.evaluate(ctx, goal) {
                Ok(Some((path, score))) => {
                    let lead = self
                        .best
                        .as_ref()
                        .map(|(_, _, s)| s + ctx.config.ai_score_epsilon)
                        .unwrap_or(0.0);
                    if score > lead {
                        self.best = Some((goal, path, score));
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(unit = %self.unit, %err, "destination evaluation failed");
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Where to actually stop this turn: the best path truncated by the
    /// movement budget, never ending on an occupied tile
    pub fn decision(&self, ctx: &BattleContext) -> Option<(Pos, Vec<Pos>)> {
        let (_, path, _) = self.best.as_ref()?;
        let unit = ctx.units.get(&self.unit)?;
        let stop = board::travel_along(&*ctx.board, path, unit.movement_left)?;
        if Some(stop) == unit.position {
            return None;
        }
        let cut = path.iter().position(|p| *p == stop)?;
        Some((stop, path[..=cut].to_vec()))
    }

    fn enumerate(&self, ctx: &BattleContext, widened: bool) -> Result<Vec<Pos>> {
        let unit = ctx.unit(&self.unit)?;
        let mut positions: Vec<Pos> = match &self.behaviour.target {
            TargetSpec::Enemies => ctx
                .units
                .iter()
                .filter(|u| u.is_alive() && unit.team.is_enemy(u.team))
                .filter_map(|u| u.position)
                .collect(),
            TargetSpec::Allies => ctx
                .units
                .iter()
                .filter(|u| u.is_alive() && u.nid != unit.nid && unit.team.is_ally(u.team))
                .filter_map(|u| u.position)
                .collect(),
            TargetSpec::Unit(nid) => ctx
                .units
                .get(nid)
                .and_then(|u| u.position)
                .into_iter()
                .collect(),
            TargetSpec::Position(pos) => vec![*pos],
            TargetSpec::StartingPosition => unit.starting_position.into_iter().collect(),
        };
        if !widened {
            if let (Some(limit), Some(me)) = (
                self.behaviour.view_range.limit(unit, &ctx.items),
                unit.position,
            ) {
                positions.retain(|pos| (me.distance(*pos) as i32) <= limit);
            }
        }
        positions.sort_by_key(|p| (p.x, p.y));

        // Flight picks among reachable tiles, scored against the threats
        if self.behaviour.action == AiAction::MoveAwayFrom {
            let Some(start) = unit.position else {
                return Ok(Vec::new());
            };
            let mut tiles: Vec<Pos> =
                board::valid_moves(&*ctx.board, start, unit.team, unit.movement_left)
                    .into_iter()
                    .collect();
            tiles.sort_by_key(|p| (p.x, p.y));
            return Ok(tiles);
        }
        Ok(positions)
    }

    fn evaluate(&self, ctx: &BattleContext, goal: Pos) -> Result<Option<(Vec<Pos>, f32)>> {
        let unit = ctx.unit(&self.unit)?;
        let Some(start) = unit.position else {
            return Ok(None);
        };

        if self.behaviour.action == AiAction::MoveAwayFrom {
            let threats: Vec<Pos> = ctx
                .units
                .iter()
                .filter(|u| u.is_alive() && unit.team.is_enemy(u.team))
                .filter_map(|u| u.position)
                .collect();
            let Some(path) = ctx.board.shortest_path(start, goal, PathConstraints {
                adj_good_enough: false,
                mover_team: Some(unit.team),
            }) else {
                return Ok(None);
            };
            let clearance = threats
                .iter()
                .map(|t| goal.distance(*t))
                .min()
                .unwrap_or(0) as f32;
            return Ok(Some((path, clearance)));
        }

        let Some(path) = ctx.board.shortest_path(start, goal, PathConstraints {
            adj_good_enough: true,
            mover_team: Some(unit.team),
        }) else {
            return Ok(None);
        };

        // Log falloff: near destinations dominate, far ones still rank
        let distance_term = 1.0 / (path.len() as f32).ln().max(1.0);
        let (weakness, damage) = match ctx.unit_at(goal) {
            Some(target) => {
                let weakness = 1.0 - target.hp as f32 / target.max_hp().max(1) as f32;
                (weakness, self.best_true_damage(ctx, target)?)
            }
            None => (0.0, 0.0),
        };
        let score = process_terms(&[(distance_term, 60.0), (weakness, 20.0), (damage, 20.0)]);
        Ok(Some((path, score)))
    }

    /// Best damage fraction any carried item could deal to `target`
    fn best_true_damage(&self, ctx: &BattleContext, target: &crate::unit::Unit) -> Result<f32> {
        let unit = ctx.unit(&self.unit)?;
        let def_item = dispatch::get_weapon(target, &ctx.items).and_then(|id| ctx.items.get(id));
        let mut best = 0.0f32;
        for item in unit.items.iter().filter_map(|id| ctx.items.get(*id)) {
            if !dispatch::available(unit, item) || dispatch::damage(unit, item).is_none() {
                continue;
            }
            let dealt = calc::compute_damage(
                ctx,
                unit,
                item,
                target,
                def_item,
                CombatMode::Attack,
                AttackInfo::default(),
                false,
            )? as f32;
            best = best.max((dealt / target.hp.max(1) as f32).min(1.0));
        }
        Ok(best)
    }
}

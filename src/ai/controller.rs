//! AI controller
//!
//! One controller per AI-driven unit. `think()` runs under the configured
//! wall-clock budget and may be called across many frames; every state
//! transition is plain data so an interrupted search resumes exactly where
//! it stopped. A unit that dies or vanishes between slices resets the
//! controller instead of resuming it.

use std::time::{Duration, Instant};

use crate::board;
use crate::components::dispatch;
use crate::context::BattleContext;
use crate::core::error::Result;
use crate::core::types::{Nid, Pos};
use crate::item::ItemId;

use super::behaviour::{AiAction, AiBehaviour};
use super::primary::PrimaryAi;
use super::secondary::SecondaryAi;

/// What the unit will do this turn
#[derive(Debug, Clone, PartialEq)]
pub enum AiDecision {
    Attack {
        item: ItemId,
        target_pos: Pos,
        move_to: Pos,
    },
    MoveTo {
        pos: Pos,
        path: Vec<Pos>,
    },
    Pass,
}

enum AiState {
    Init,
    Primary(PrimaryAi),
    Secondary(SecondaryAi),
    Done,
}

pub struct AiController {
    unit: Nid,
    behaviours: Vec<AiBehaviour>,
    behaviour_index: usize,
    state: AiState,
    decision: Option<AiDecision>,
}

impl AiController {
    pub fn new(unit: Nid, behaviours: Vec<AiBehaviour>) -> Self {
        Self {
            unit,
            behaviours,
            behaviour_index: 0,
            state: AiState::Init,
            decision: None,
        }
    }

    pub fn unit(&self) -> &Nid {
        &self.unit
    }

    pub fn reset(&mut self) {
        self.behaviour_index = 0;
        self.state = AiState::Init;
        self.decision = None;
    }

    pub fn decision(&self) -> Option<&AiDecision> {
        self.decision.as_ref()
    }

    pub fn take_decision(&mut self) -> Option<AiDecision> {
        self.decision.take()
    }

    /// Run one think slice; true when a decision is ready
    pub fn think(&mut self, ctx: &mut BattleContext) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(ctx.config.ai_think_budget_ms);

        let valid = ctx
            .units
            .get(&self.unit)
            .map(|u| u.is_alive() && u.position.is_some())
            .unwrap_or(false);
        if !valid {
            tracing::debug!(unit = %self.unit, "unit invalid, controller reset");
            self.reset();
            self.decision = Some(AiDecision::Pass);
            self.state = AiState::Done;
            return Ok(true);
        }

        loop {
            match std::mem::replace(&mut self.state, AiState::Done) {
                AiState::Init => {
                    let Some(behaviour) = self.behaviours.get(self.behaviour_index).cloned()
                    else {
                        self.decision = Some(AiDecision::Pass);
                        return Ok(true);
                    };
                    self.state = match behaviour.action {
                        AiAction::Attack | AiAction::Support => {
                            AiState::Primary(PrimaryAi::new(ctx, &self.unit, behaviour)?)
                        }
                        AiAction::MoveTo | AiAction::MoveAwayFrom => {
                            AiState::Secondary(SecondaryAi::new(ctx, &self.unit, behaviour)?)
                        }
                        AiAction::DoNothing => {
                            self.behaviour_index += 1;
                            AiState::Init
                        }
                    };
                }
                AiState::Primary(mut search) => {
                    if !search.think(ctx, deadline)? {
                        self.state = AiState::Primary(search);
                        return Ok(false);
                    }
                    if let Some(best) = search.best() {
                        tracing::debug!(unit = %self.unit, score = best.score, "attack chosen");
                        self.decision = Some(AiDecision::Attack {
                            item: best.item,
                            target_pos: best.target_pos,
                            move_to: best.move_to,
                        });
                        return Ok(true);
                    }
                    self.behaviour_index += 1;
                    self.state = AiState::Init;
                }
                AiState::Secondary(mut search) => {
                    if !search.think(ctx, deadline)? {
                        self.state = AiState::Secondary(search);
                        return Ok(false);
                    }
                    if let Some((pos, path)) = search.decision(ctx) {
                        tracing::debug!(unit = %self.unit, ?pos, "move chosen");
                        self.decision = Some(AiDecision::MoveTo { pos, path });
                        return Ok(true);
                    }
                    self.behaviour_index += 1;
                    self.state = AiState::Init;
                }
                AiState::Done => return Ok(true),
            }
        }
    }

    /// Post-action repositioning when the unit has canto and movement
    /// left: the reachable tile with the most clearance from any enemy
    pub fn canto_retreat(&self, ctx: &BattleContext) -> Option<Pos> {
        let unit = ctx.units.get(&self.unit)?;
        if !dispatch::has_canto(unit) || unit.movement_left <= 0 {
            return None;
        }
        let start = unit.position?;
        let threats: Vec<Pos> = ctx
            .units
            .iter()
            .filter(|u| u.is_alive() && u.team.is_enemy(unit.team))
            .filter_map(|u| u.position)
            .collect();
        if threats.is_empty() {
            return None;
        }
        let mut tiles: Vec<Pos> =
            board::valid_moves(&*ctx.board, start, unit.team, unit.movement_left)
                .into_iter()
                .collect();
        tiles.sort_by_key(|p| (p.x, p.y));
        tiles
            .into_iter()
            .max_by_key(|tile| threats.iter().map(|t| tile.distance(*t)).min().unwrap_or(0))
            .filter(|tile| *tile != start)
    }
}

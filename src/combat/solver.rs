//! Combat phase solver
//!
//! Expands one engagement into an ordered list of phases (attacker
//! strike, counters, partners, doubles, rounds) and resolves exactly one
//! phase per `step()`. Resolution draws from the combat random stream,
//! produces a `(actions, playback)` pair, applies the actions, and caches
//! the pair: re-polling before `advance()` returns the cached result
//! without re-dispatching any hook. Callers control pacing; the solver
//! has no timers.

use crate::combat::action::{self, Action};
use crate::combat::calc::{self, AttackInfo, CombatMode};
use crate::combat::engagement::{Engagement, PhaseKind};
use crate::combat::playback::PlaybackEvent;
use crate::components::dispatch;
use crate::context::BattleContext;
use crate::core::error::Result;
use crate::core::types::{Nid, Pos};
use crate::item::ItemId;

/// One atomic strike opportunity
#[derive(Debug, Clone)]
pub struct Phase {
    pub kind: PhaseKind,
    pub actor: Nid,
    pub item: ItemId,
    pub target_pos: Pos,
    pub round: u32,
    pub info: AttackInfo,
}

impl Phase {
    fn mode(&self) -> CombatMode {
        match self.kind {
            PhaseKind::Attacker | PhaseKind::AttackerPartner => CombatMode::Attack,
            PhaseKind::Defender | PhaseKind::DefenderPartner => CombatMode::Defense,
        }
    }

    fn mark(&self) -> PlaybackEvent {
        match self.kind {
            PhaseKind::Attacker => PlaybackEvent::AttackerPhase,
            PhaseKind::Defender => PlaybackEvent::DefenderPhase,
            PhaseKind::AttackerPartner => PlaybackEvent::AttackerPartnerPhase,
            PhaseKind::DefenderPartner => PlaybackEvent::DefenderPartnerPhase,
        }
    }
}

/// Pre-drawn randomness for one potential strike outcome
#[derive(Debug, Clone, Copy)]
struct StrikeRoll {
    hit: i32,
    glance: f32,
    crit: i32,
    variant: u8,
}

/// Read-only resolution plan for one phase
struct PhasePlan {
    skip: bool,
    targets: Vec<Pos>,
    strikes: u32,
}

pub struct CombatPhaseSolver {
    engagement: Engagement,
    phases: Vec<Phase>,
    index: usize,
    resolved: Option<(Vec<Action>, Vec<PlaybackEvent>)>,
}

impl CombatPhaseSolver {
    /// Determine the full phase order up front; strike order within a
    /// round is attacker, attacker's partner, counter, defender's
    /// partner, then doubles
    pub fn new(ctx: &BattleContext, engagement: Engagement) -> Result<Self> {
        let attacker = ctx.unit(&engagement.attacker)?;
        let att_item = ctx.item(engagement.item)?;
        let main_pos = engagement.target_positions.first().copied();

        let defender = main_pos
            .and_then(|p| ctx.unit_at(p))
            .filter(|d| d.nid != attacker.nid);
        let def_item_id = defender.and_then(|d| dispatch::get_weapon(d, &ctx.items));
        let def_item = def_item_id.and_then(|id| ctx.items.get(id));

        let counter = match defender {
            Some(d) => {
                d.team.is_enemy(attacker.team)
                    && calc::can_counterattack(attacker, att_item, d, def_item)
            }
            None => false,
        };

        // Partners are dropped when their principal's item forbids dual
        // strikes or the partner has no usable weapon
        let att_partner = engagement
            .attacker_partner
            .as_ref()
            .filter(|_| !dispatch::cannot_dual_strike(attacker, att_item))
            .and_then(|nid| ctx.units.get(nid))
            .filter(|p| p.is_alive())
            .and_then(|p| dispatch::get_weapon(p, &ctx.items).map(|i| (p.nid.clone(), i)));
        let def_partner = match (defender, def_item) {
            (Some(d), Some(di)) if counter => engagement
                .defender_partner
                .as_ref()
                .filter(|_| !dispatch::cannot_dual_strike(d, di))
                .and_then(|nid| ctx.units.get(nid))
                .filter(|p| p.is_alive())
                .and_then(|p| dispatch::get_weapon(p, &ctx.items).map(|i| (p.nid.clone(), i))),
            _ => None,
        };

        let mut phases = Vec::new();

        if let Some(script) = &engagement.script {
            for kind in script {
                match kind {
                    PhaseKind::Attacker => {
                        if let Some(pos) = main_pos {
                            phases.push(Phase {
                                kind: PhaseKind::Attacker,
                                actor: attacker.nid.clone(),
                                item: engagement.item_for(0),
                                target_pos: pos,
                                round: 0,
                                info: AttackInfo::default(),
                            });
                        }
                    }
                    PhaseKind::Defender => {
                        if let (Some(d), Some(item), Some(pos)) =
                            (defender, def_item_id, attacker.position)
                        {
                            phases.push(Phase {
                                kind: PhaseKind::Defender,
                                actor: d.nid.clone(),
                                item,
                                target_pos: pos,
                                round: 0,
                                info: AttackInfo::default(),
                            });
                        }
                    }
                    PhaseKind::AttackerPartner | PhaseKind::DefenderPartner => {
                        // Scripts drive principals only
                    }
                }
            }
            renumber(&mut phases);
            return Ok(Self {
                engagement,
                phases,
                index: 0,
                resolved: None,
            });
        }

        let attacker_doubles = match defender {
            Some(d) => calc::outspeed(ctx, attacker, att_item, d, def_item)?,
            None => false,
        };
        let defender_doubles = match (defender, def_item) {
            (Some(d), Some(di)) if counter => {
                calc::outspeed(ctx, d, di, attacker, Some(att_item))?
            }
            _ => false,
        };

        for round in 0..engagement.total_rounds {
            for (i, pos) in engagement.target_positions.iter().enumerate() {
                phases.push(Phase {
                    kind: PhaseKind::Attacker,
                    actor: attacker.nid.clone(),
                    item: engagement.item_for(i),
                    target_pos: *pos,
                    round,
                    info: AttackInfo::default(),
                });
            }
            if let (Some((pnid, pitem)), Some(pos)) = (&att_partner, main_pos) {
                phases.push(Phase {
                    kind: PhaseKind::AttackerPartner,
                    actor: pnid.clone(),
                    item: *pitem,
                    target_pos: pos,
                    round,
                    info: AttackInfo::default(),
                });
            }
            if counter {
                if let (Some(d), Some(item), Some(pos)) =
                    (defender, def_item_id, attacker.position)
                {
                    phases.push(Phase {
                        kind: PhaseKind::Defender,
                        actor: d.nid.clone(),
                        item,
                        target_pos: pos,
                        round,
                        info: AttackInfo::default(),
                    });
                    if let Some((pnid, pitem)) = &def_partner {
                        phases.push(Phase {
                            kind: PhaseKind::DefenderPartner,
                            actor: pnid.clone(),
                            item: *pitem,
                            target_pos: pos,
                            round,
                            info: AttackInfo::default(),
                        });
                    }
                }
            }
            if attacker_doubles {
                if let Some(pos) = main_pos {
                    phases.push(Phase {
                        kind: PhaseKind::Attacker,
                        actor: attacker.nid.clone(),
                        item: engagement.item_for(0),
                        target_pos: pos,
                        round,
                        info: AttackInfo::default(),
                    });
                }
            } else if defender_doubles {
                if let (Some(d), Some(item), Some(pos)) =
                    (defender, def_item_id, attacker.position)
                {
                    phases.push(Phase {
                        kind: PhaseKind::Defender,
                        actor: d.nid.clone(),
                        item,
                        target_pos: pos,
                        round,
                        info: AttackInfo::default(),
                    });
                }
            }
        }
        renumber(&mut phases);

        tracing::debug!(
            attacker = %engagement.attacker,
            phases = phases.len(),
            counter,
            "engagement expanded"
        );

        Ok(Self {
            engagement,
            phases,
            index: 0,
            resolved: None,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.phases.len()
    }

    /// The phase `step()` will resolve (or already resolved); re-poll safe
    pub fn current_phase(&self) -> Option<&Phase> {
        self.phases.get(self.index)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Resolve the current phase exactly once and apply its actions.
    /// Calling again before `advance()` returns the cached result without
    /// touching any state.
    pub fn step(&mut self, ctx: &mut BattleContext) -> Result<(Vec<Action>, Vec<PlaybackEvent>)> {
        if let Some(resolved) = &self.resolved {
            return Ok(resolved.clone());
        }
        let Some(phase) = self.phases.get(self.index).cloned() else {
            return Ok((Vec::new(), Vec::new()));
        };

        let plan = self.plan_phase(ctx, &phase)?;
        if plan.skip {
            tracing::debug!(actor = %phase.actor, "phase skipped, target gone");
            let empty = (Vec::new(), Vec::new());
            self.resolved = Some(empty.clone());
            return Ok(empty);
        }

        // Draw all randomness for this phase up front so resolution stays
        // a pure read of the context
        let roll_count = plan.targets.len() * plan.strikes as usize;
        let rolls: Vec<StrikeRoll> = (0..roll_count)
            .map(|_| StrikeRoll {
                hit: ctx.rng.roll_percent(),
                glance: ctx.rng.roll_fraction(),
                crit: ctx.rng.roll_percent(),
                variant: ctx.rng.roll_variant(2),
            })
            .collect();

        let (actions, playback) = self.resolve_phase(ctx, &phase, &plan, &rolls)?;
        action::apply_all(&actions, ctx);
        self.resolved = Some((actions.clone(), playback.clone()));
        Ok((actions, playback))
    }

    /// Move on to the next phase
    pub fn advance(&mut self) {
        if self.index < self.phases.len() {
            self.index += 1;
        }
        self.resolved = None;
    }

    fn plan_phase(&self, ctx: &BattleContext, phase: &Phase) -> Result<PhasePlan> {
        let skip = PhasePlan {
            skip: true,
            targets: Vec::new(),
            strikes: 0,
        };
        let Some(actor) = ctx.units.get(&phase.actor) else {
            return Ok(skip);
        };
        if !actor.is_alive() || actor.position.is_none() {
            return Ok(skip);
        }
        let item = ctx.item(phase.item)?;

        let (main, splash_hits) = dispatch::splash(ctx, actor, item, phase.target_pos);
        let mut targets = Vec::new();
        if let Some(pos) = main {
            if ctx.unit_at(pos).map(|u| u.is_alive()).unwrap_or(false) {
                targets.push(pos);
            }
        }
        targets.extend(splash_hits);
        if targets.is_empty() {
            // Main target vanished and nothing is splashed: skip, never retry
            return Ok(skip);
        }

        let main_unit = main.and_then(|p| ctx.unit_at(p));
        let strikes =
            calc::compute_multiattacks(actor, item, main_unit, phase.mode(), phase.info);
        Ok(PhasePlan {
            skip: false,
            targets,
            strikes,
        })
    }

    fn resolve_phase(
        &self,
        ctx: &BattleContext,
        phase: &Phase,
        plan: &PhasePlan,
        rolls: &[StrikeRoll],
    ) -> Result<(Vec<Action>, Vec<PlaybackEvent>)> {
        let mut actions = Vec::new();
        let mut playback = Vec::new();
        playback.push(phase.mark());

        let actor = ctx.unit(&phase.actor)?;
        let item = ctx.item(phase.item)?;

        if self.index == 0 {
            let args = dispatch::StrikeArgs {
                unit: actor,
                item,
                target: ctx.unit_at(phase.target_pos),
                target_pos: Some(phase.target_pos),
                mode: phase.mode(),
                info: phase.info,
                first_item: true,
            };
            dispatch::start_combat(ctx, &args, &mut actions, &mut playback);
        }

        let mut struck_unit = false;
        for strike in 0..plan.strikes {
            for (t_idx, pos) in plan.targets.iter().enumerate() {
                let roll = rolls[strike as usize * plan.targets.len() + t_idx];
                let Some(target) = ctx.unit_at(*pos) else {
                    continue;
                };
                // Killed by an earlier strike this phase
                if dispatch::find_hp(&actions, target) <= 0 {
                    continue;
                }
                struck_unit = true;
                let info = AttackInfo {
                    attack_num: phase.info.attack_num,
                    strike_num: strike,
                };
                let def_item =
                    dispatch::get_weapon(target, &ctx.items).and_then(|id| ctx.items.get(id));
                let args = dispatch::StrikeArgs {
                    unit: actor,
                    item,
                    target: Some(target),
                    target_pos: Some(*pos),
                    mode: phase.mode(),
                    info,
                    first_item: true,
                };

                // Items with no hit value cannot miss (staves, self-items)
                if dispatch::hit(actor, item).is_some() {
                    let to_hit =
                        calc::compute_hit(ctx, actor, item, target, def_item, phase.mode(), info)?;
                    if roll.hit >= to_hit {
                        dispatch::on_miss(ctx, &args, &mut actions, &mut playback);
                        continue;
                    }
                }
                if dispatch::damage(actor, item).is_none() {
                    // Non-damaging connect: effects come from the hit events
                    dispatch::on_hit(ctx, &args, &mut actions, &mut playback, roll.variant);
                    continue;
                }
                if roll.glance < ctx.config.glancing_band {
                    // Connected but glanced off: no damage
                    dispatch::on_glancing_hit(ctx, &args, &mut actions, &mut playback);
                    continue;
                }
                let crit_chance = calc::compute_crit(ctx, actor, item, target, def_item)?;
                let crit = roll.crit < crit_chance;
                let dealt = calc::compute_damage(
                    ctx,
                    actor,
                    item,
                    target,
                    def_item,
                    phase.mode(),
                    info,
                    crit,
                )?;
                actions.push(Action::ChangeHp {
                    unit: target.nid.clone(),
                    amount: -dealt,
                });
                playback.push(if crit {
                    PlaybackEvent::DamageCrit {
                        attacker: actor.nid.clone(),
                        defender: target.nid.clone(),
                        damage: dealt,
                    }
                } else {
                    PlaybackEvent::DamageHit {
                        attacker: actor.nid.clone(),
                        defender: target.nid.clone(),
                        damage: dealt,
                    }
                });
                if crit {
                    dispatch::on_crit(ctx, &args, &mut actions, &mut playback, roll.variant);
                } else {
                    dispatch::on_hit(ctx, &args, &mut actions, &mut playback, roll.variant);
                }
                if dispatch::find_hp(&actions, target) <= 0 {
                    actions.push(Action::Die {
                        unit: target.nid.clone(),
                    });
                }
            }

            // Per-strike wrap-up against the main target (charge spend etc.)
            let main_target = ctx.unit_at(phase.target_pos);
            let args = dispatch::StrikeArgs {
                unit: actor,
                item,
                target: main_target,
                target_pos: Some(phase.target_pos),
                mode: phase.mode(),
                info: AttackInfo {
                    attack_num: phase.info.attack_num,
                    strike_num: strike,
                },
                first_item: true,
            };
            dispatch::after_hit(ctx, &args, &mut actions, &mut playback);
        }

        if struck_unit {
            let gained = dispatch::wexp(actor, item);
            if gained > 0 {
                actions.push(Action::GainWexp {
                    unit: actor.nid.clone(),
                    amount: gained,
                });
            }
            let gained = dispatch::exp(actor, item);
            if gained > 0 {
                actions.push(Action::GainExp {
                    unit: actor.nid.clone(),
                    amount: gained,
                });
            }
        }

        // Breakage is visible before the actions are applied: count the
        // charges this phase will spend
        if let Some(uses) = item.value("uses") {
            let spent = actions
                .iter()
                .filter(|a| matches!(a, Action::UseItemCharge { item: i, .. } if *i == item.id))
                .count() as i64;
            if uses - spent <= 0 {
                let args = dispatch::StrikeArgs {
                    unit: actor,
                    item,
                    target: None,
                    target_pos: None,
                    mode: phase.mode(),
                    info: phase.info,
                    first_item: true,
                };
                dispatch::on_broken(ctx, &args, &mut actions, &mut playback);
            }
        }

        if self.index + 1 == self.phases.len() {
            let main_item = ctx.item(self.engagement.item)?;
            let attacker = ctx.unit(&self.engagement.attacker)?;
            let args = dispatch::StrikeArgs {
                unit: attacker,
                item: main_item,
                target: None,
                target_pos: None,
                mode: CombatMode::Attack,
                info: AttackInfo::default(),
                first_item: true,
            };
            dispatch::end_combat(ctx, &args, &mut actions, &mut playback);
        }

        Ok((actions, playback))
    }
}

/// Assign per-actor attack numbers in list order
fn renumber(phases: &mut [Phase]) {
    let mut counts: ahash::AHashMap<Nid, u32> = ahash::AHashMap::new();
    for phase in phases.iter_mut() {
        let n = counts.entry(phase.actor.clone()).or_insert(0);
        phase.info.attack_num = *n;
        *n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::GridBoard;
    use crate::combat::playback::{already_supplied, PlaybackKind};
    use crate::components::component::Component;
    use crate::core::types::{StatId, Team};
    use crate::item::ItemDef;
    use crate::unit::Unit;

    fn sure_sword(damage: i32) -> ItemDef {
        ItemDef::new(
            "sword",
            vec![
                Component::Weapon,
                Component::TargetsEnemies,
                Component::MinRange { value: 1 },
                Component::MaxRange { value: 1 },
                Component::Damage { value: damage },
                Component::Hit { value: 200 },
            ],
        )
    }

    fn duel(att_damage: i32, def_hp: i32) -> (BattleContext, Engagement) {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(6, 6)), 3);
        let sword = ctx.items.load(&sure_sword(att_damage));
        let foe_sword = ctx.items.load(&sure_sword(3));
        ctx.place(
            Unit::new("hero", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(0, 0))
                .with_item(sword),
        );
        ctx.place(
            Unit::new("brigand", Team::Enemy)
                .with_stat(StatId::Hp, def_hp)
                .at(Pos::new(0, 1))
                .with_item(foe_sword),
        );
        let engagement =
            Engagement::engage(&ctx, &Nid::from("hero"), sword, vec![Pos::new(0, 1)]).unwrap();
        (ctx, engagement)
    }

    fn run_to_exhaustion(
        solver: &mut CombatPhaseSolver,
        ctx: &mut BattleContext,
    ) -> Vec<(Vec<Action>, Vec<PlaybackEvent>)> {
        let mut out = Vec::new();
        let mut steps = 0;
        while !solver.is_exhausted() {
            out.push(solver.step(ctx).unwrap());
            solver.advance();
            steps += 1;
            assert!(steps < 64, "solver failed to terminate");
        }
        out
    }

    #[test]
    fn test_attacker_and_counter_phases() {
        let (mut ctx, engagement) = duel(5, 20);
        let solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        // One attacker strike, one counter; equal speed means no doubles
        assert_eq!(solver.phase_count(), 2);
        assert_eq!(solver.current_phase().unwrap().kind, PhaseKind::Attacker);
        let mut solver = solver;
        run_to_exhaustion(&mut solver, &mut ctx);
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().hp, 15);
        assert_eq!(ctx.unit(&Nid::from("hero")).unwrap().hp, 17);
    }

    #[test]
    fn test_repoll_does_not_double_subtract_hp() {
        let (mut ctx, engagement) = duel(5, 20);
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        let first = solver.step(&mut ctx).unwrap();
        let again = solver.step(&mut ctx).unwrap();
        assert_eq!(first, again);
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().hp, 15);
        // Same phase still current
        assert_eq!(solver.current_phase().unwrap().kind, PhaseKind::Attacker);
    }

    #[test]
    fn test_doubling_appends_after_counter() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(6, 6)), 3);
        let sword = ctx.items.load(&sure_sword(4));
        let foe_sword = ctx.items.load(&sure_sword(3));
        ctx.place(
            Unit::new("swift", Team::Player)
                .with_stat(StatId::Hp, 20)
                .with_stat(StatId::Spd, 12)
                .at(Pos::new(0, 0))
                .with_item(sword),
        );
        ctx.place(
            Unit::new("slow", Team::Enemy)
                .with_stat(StatId::Hp, 30)
                .with_stat(StatId::Spd, 2)
                .at(Pos::new(0, 1))
                .with_item(foe_sword),
        );
        let engagement =
            Engagement::engage(&ctx, &Nid::from("swift"), sword, vec![Pos::new(0, 1)]).unwrap();
        let solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        let kinds: Vec<PhaseKind> = solver.phases.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PhaseKind::Attacker, PhaseKind::Defender, PhaseKind::Attacker]
        );
    }

    #[test]
    fn test_lethal_hit_emits_final_hit_and_lethal_shake() {
        let (mut ctx, engagement) = duel(10, 5);
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        let (actions, playback) = solver.step(&mut ctx).unwrap();
        assert!(actions.contains(&Action::Die {
            unit: Nid::from("brigand")
        }));
        assert!(playback.contains(&PlaybackEvent::HitSound {
            sound: "Final Hit".to_string()
        }));
        assert!(playback.contains(&PlaybackEvent::Shake { magnitude: 2 }));
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().hp, 0);
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().position, None);
    }

    #[test]
    fn test_glancing_hit_leaves_hp_unchanged() {
        let (mut ctx, engagement) = duel(10, 5);
        ctx.config.glancing_band = 1.0;
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        let (actions, playback) = solver.step(&mut ctx).unwrap();
        assert!(!actions
            .iter()
            .any(|a| matches!(a, Action::ChangeHp { amount, .. } if *amount < 0)));
        assert!(playback.contains(&PlaybackEvent::HitSound {
            sound: "No Damage".to_string()
        }));
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().hp, 5);
    }

    #[test]
    fn test_counter_phase_skipped_when_defender_died() {
        let (mut ctx, engagement) = duel(25, 5);
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        assert_eq!(solver.phase_count(), 2);
        solver.step(&mut ctx).unwrap();
        solver.advance();
        // Defender is dead; their counter phase resolves to nothing
        let (actions, playback) = solver.step(&mut ctx).unwrap();
        assert!(actions.is_empty());
        assert!(playback.is_empty());
        solver.advance();
        assert!(solver.is_exhausted());
        assert_eq!(ctx.unit(&Nid::from("hero")).unwrap().hp, 20);
    }

    #[test]
    fn test_brave_strikes_twice_per_phase() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(6, 6)), 3);
        let mut def = sure_sword(4);
        def.components.push(Component::Brave);
        let brave = ctx.items.load(&def);
        ctx.place(
            Unit::new("hero", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(0, 0))
                .with_item(brave),
        );
        ctx.place(
            Unit::new("brigand", Team::Enemy)
                .with_stat(StatId::Hp, 30)
                .at(Pos::new(0, 1)),
        );
        let engagement =
            Engagement::engage(&ctx, &Nid::from("hero"), brave, vec![Pos::new(0, 1)]).unwrap();
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        solver.step(&mut ctx).unwrap();
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().hp, 22);
    }

    #[test]
    fn test_rounds_multiply_phases_within_bound() {
        let (ctx, engagement) = duel(1, 20);
        let engagement = engagement.with_rounds(3);
        let solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        // rounds * (1 attacker + 1 counter), no partners, no doubles
        assert_eq!(solver.phase_count(), 6);
    }

    #[test]
    fn test_scripted_sequence_overrides_order() {
        let (mut ctx, engagement) = duel(2, 20);
        let engagement = engagement.with_script(vec![
            PhaseKind::Defender,
            PhaseKind::Attacker,
            PhaseKind::Attacker,
        ]);
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        assert_eq!(solver.phase_count(), 3);
        assert_eq!(solver.current_phase().unwrap().kind, PhaseKind::Defender);
        run_to_exhaustion(&mut solver, &mut ctx);
        assert_eq!(ctx.unit(&Nid::from("brigand")).unwrap().hp, 16);
        assert_eq!(ctx.unit(&Nid::from("hero")).unwrap().hp, 17);
    }

    #[test]
    fn test_uses_consumed_and_breakage_reported() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(6, 6)), 3);
        let mut def = sure_sword(2);
        def.components.push(Component::Uses { starting: 1 });
        let fragile = ctx.items.load(&def);
        ctx.place(
            Unit::new("hero", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(0, 0))
                .with_item(fragile),
        );
        ctx.place(
            Unit::new("brigand", Team::Enemy)
                .with_stat(StatId::Hp, 30)
                .at(Pos::new(0, 1)),
        );
        let engagement =
            Engagement::engage(&ctx, &Nid::from("hero"), fragile, vec![Pos::new(0, 1)]).unwrap();
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        let (actions, _) = solver.step(&mut ctx).unwrap();
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::UseItemCharge { .. })));
        assert!(actions.contains(&Action::SetItemData {
            item: fragile,
            key: "broken".to_string(),
            value: 1,
        }));
        assert_eq!(ctx.item(fragile).unwrap().value("uses"), Some(0));
        assert!(dispatch::is_broken(ctx.item(fragile).unwrap()));
    }

    #[test]
    fn test_blast_splashes_adjacent_units() {
        let mut ctx = BattleContext::new(Box::new(GridBoard::new(8, 8)), 3);
        let mut def = sure_sword(6);
        def.nid = Nid::from("bomb");
        def.components.push(Component::Blast { radius: 1 });
        def.components.push(Component::MaxRange { value: 3 });
        let bomb = ctx.items.load(&def);
        ctx.place(
            Unit::new("hero", Team::Player)
                .with_stat(StatId::Hp, 20)
                .at(Pos::new(0, 0))
                .with_item(bomb),
        );
        ctx.place(
            Unit::new("b1", Team::Enemy)
                .with_stat(StatId::Hp, 30)
                .at(Pos::new(0, 3)),
        );
        ctx.place(
            Unit::new("b2", Team::Enemy)
                .with_stat(StatId::Hp, 30)
                .at(Pos::new(1, 3)),
        );
        let engagement =
            Engagement::engage(&ctx, &Nid::from("hero"), bomb, vec![Pos::new(0, 3)]).unwrap();
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        solver.step(&mut ctx).unwrap();
        assert_eq!(ctx.unit(&Nid::from("b1")).unwrap().hp, 24);
        assert_eq!(ctx.unit(&Nid::from("b2")).unwrap().hp, 24);
    }

    #[test]
    fn test_phase_marks_emitted() {
        let (mut ctx, engagement) = duel(2, 20);
        let mut solver = CombatPhaseSolver::new(&ctx, engagement).unwrap();
        let (_, playback) = solver.step(&mut ctx).unwrap();
        assert!(already_supplied(&playback, PlaybackKind::AttackerPhase));
        solver.advance();
        let (_, playback) = solver.step(&mut ctx).unwrap();
        assert!(already_supplied(&playback, PlaybackKind::DefenderPhase));
    }
}

//! Combat formulas
//!
//! Pure computations over the dispatcher's output: a formula-selector
//! hook names the base equation, additive `modify_*` hooks shift it,
//! dynamic hooks adjust per target, and the weapon triangle multiplies
//! the result. Integer math, floored, clamped at zero.

use serde::{Deserialize, Serialize};

use crate::components::dispatch;
use crate::components::hooks::Hook;
use crate::context::BattleContext;
use crate::core::error::Result;
use crate::item::Item;
use crate::unit::Unit;

const TRIANGLE_ADVANTAGE: f32 = 1.15;
const TRIANGLE_DISADVANTAGE: f32 = 0.85;

/// Which side of the exchange the computation is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatMode {
    Attack,
    Defense,
}

/// Position of a strike within the whole engagement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackInfo {
    /// Index of the phase among the actor's phases this engagement
    pub attack_num: u32,
    /// Index of the strike within the phase (brave follow-ups)
    pub strike_num: u32,
}

/// Rock-paper-scissors multiplier between two weapon types.
///
/// The type table itself is tiny and fixed; content reshapes outcomes
/// through `weapon_type`, `triangle_multiplier`, and
/// `ignore_weapon_advantage` components.
pub fn weapon_triangle(
    attacker: &Unit,
    item: &Item,
    defender: Option<&Unit>,
    def_item: Option<&Item>,
) -> f32 {
    if dispatch::ignore_weapon_advantage(attacker, item) {
        return 1.0;
    }
    if let (Some(d), Some(di)) = (defender, def_item) {
        if dispatch::ignore_weapon_advantage(d, di) {
            return 1.0;
        }
    }
    let factor = dispatch::modify_weapon_triangle(attacker, item);
    let atk_type = dispatch::weapon_type(attacker, item);
    let def_type = match (defender, def_item) {
        (Some(d), Some(di)) => dispatch::weapon_type(d, di),
        _ => None,
    };
    let base = match (atk_type.as_deref(), def_type.as_deref()) {
        (Some("sword"), Some("axe"))
        | (Some("axe"), Some("lance"))
        | (Some("lance"), Some("sword")) => TRIANGLE_ADVANTAGE,
        (Some("axe"), Some("sword"))
        | (Some("lance"), Some("axe"))
        | (Some("sword"), Some("lance")) => TRIANGLE_DISADVANTAGE,
        _ => 1.0,
    };
    base * factor
}

/// Sum an additive hook on the defending side, with or without an item
fn defender_modify(defender: &Unit, def_item: Option<&Item>, hook: Hook) -> i32 {
    match def_item {
        Some(item) => dispatch::modify(defender, item, hook),
        None => defender
            .active_skills()
            .flat_map(|s| s.components.iter())
            .filter_map(|c| c.modify(hook))
            .sum(),
    }
}

pub fn compute_attack_speed(ctx: &BattleContext, unit: &Unit, item: &Item) -> Result<i32> {
    let base = ctx
        .equations
        .evaluate(dispatch::formula(unit, item, Hook::AttackSpeedFormula), unit)?;
    Ok(base + dispatch::modify(unit, item, Hook::ModifyAttackSpeed))
}

pub fn compute_defense_speed(
    ctx: &BattleContext,
    unit: &Unit,
    item: Option<&Item>,
) -> Result<i32> {
    let formula = match item {
        Some(i) => dispatch::formula(unit, i, Hook::DefenseSpeedFormula),
        None => "DEFENSE_SPEED",
    };
    let base = ctx.equations.evaluate(formula, unit)?;
    Ok(base + defender_modify(unit, item, Hook::ModifyDefenseSpeed))
}

/// Chance in 0..=100 for this strike to connect
pub fn compute_hit(
    ctx: &BattleContext,
    attacker: &Unit,
    item: &Item,
    defender: &Unit,
    def_item: Option<&Item>,
    mode: CombatMode,
    info: AttackInfo,
) -> Result<i32> {
    let mut accuracy = ctx
        .equations
        .evaluate(dispatch::formula(attacker, item, Hook::AccuracyFormula), attacker)?;
    accuracy += dispatch::hit(attacker, item).unwrap_or(0);
    accuracy += dispatch::modify(attacker, item, Hook::ModifyAccuracy);
    accuracy += dispatch::dynamic_accuracy(attacker, item, Some(defender), mode, info, accuracy);
    let triangle = weapon_triangle(attacker, item, Some(defender), def_item);
    accuracy = (accuracy as f32 * triangle).floor() as i32;

    let avoid_formula = match def_item {
        Some(di) => dispatch::formula(defender, di, Hook::AvoidFormula),
        None => "AVOID",
    };
    let avoid = ctx.equations.evaluate(avoid_formula, defender)?
        + defender_modify(defender, def_item, Hook::ModifyAvoid);

    Ok((accuracy - avoid).clamp(0, 100))
}

/// Chance in 0..=100 for a connected strike to crit; zero when the item
/// has no crit value or crits are disabled
pub fn compute_crit(
    ctx: &BattleContext,
    attacker: &Unit,
    item: &Item,
    defender: &Unit,
    def_item: Option<&Item>,
) -> Result<i32> {
    if !ctx.config.crits_enabled {
        return Ok(0);
    }
    let Some(item_crit) = dispatch::crit(attacker, item) else {
        return Ok(0);
    };
    let mut crit = ctx.equations.evaluate(
        dispatch::formula(attacker, item, Hook::CritAccuracyFormula),
        attacker,
    )?;
    crit += item_crit;
    crit += dispatch::modify(attacker, item, Hook::ModifyCritAccuracy);

    let avoid_formula = match def_item {
        Some(di) => dispatch::formula(defender, di, Hook::CritAvoidFormula),
        None => "CRIT_AVOID",
    };
    let crit_avoid = ctx.equations.evaluate(avoid_formula, defender)?;

    Ok((crit - crit_avoid).clamp(0, 100))
}

/// Damage a connecting strike deals after mitigation
pub fn compute_damage(
    ctx: &BattleContext,
    attacker: &Unit,
    item: &Item,
    defender: &Unit,
    def_item: Option<&Item>,
    mode: CombatMode,
    info: AttackInfo,
    crit: bool,
) -> Result<i32> {
    let mut base = ctx
        .equations
        .evaluate(dispatch::formula(attacker, item, Hook::DamageFormula), attacker)?;
    base += dispatch::damage(attacker, item).unwrap_or(0);
    base += dispatch::modify(attacker, item, Hook::ModifyDamage);
    base += dispatch::dynamic_damage(attacker, item, Some(defender), mode, info, base);
    let triangle = weapon_triangle(attacker, item, Some(defender), def_item);
    base = (base as f32 * triangle).floor() as i32;

    // The attacker's item picks the mitigating stat (magic pierces DEF)
    let mitigation = ctx
        .equations
        .evaluate(dispatch::formula(attacker, item, Hook::ResistFormula), defender)?
        + defender_modify(defender, def_item, Hook::ModifyResist);

    let mut total = (base - mitigation).max(0);
    if crit {
        total *= ctx.config.crit_multiplier;
    }
    Ok(total)
}

/// Total strikes the actor makes in one phase (brave effects)
pub fn compute_multiattacks(
    unit: &Unit,
    item: &Item,
    target: Option<&Unit>,
    mode: CombatMode,
    info: AttackInfo,
) -> u32 {
    let extra = dispatch::dynamic_multiattacks(unit, item, target, mode, info).max(0);
    1 + extra as u32
}

/// Whether `unit` is fast enough to strike a second phase
pub fn outspeed(
    ctx: &BattleContext,
    unit: &Unit,
    item: &Item,
    other: &Unit,
    other_item: Option<&Item>,
) -> Result<bool> {
    if !dispatch::can_double(unit, item) {
        return Ok(false);
    }
    let attack_speed = compute_attack_speed(ctx, unit, item)?;
    let defense_speed = compute_defense_speed(ctx, other, other_item)?;
    Ok(attack_speed - defense_speed >= ctx.config.speed_to_double)
}

/// Whether the defender may counter: both sides' hooks must allow it and
/// the defender's weapon must reach the attacker
pub fn can_counterattack(
    attacker: &Unit,
    item: &Item,
    defender: &Unit,
    def_item: Option<&Item>,
) -> bool {
    let Some(def_item) = def_item else {
        return false;
    };
    if !dispatch::can_be_countered(attacker, item) {
        return false;
    }
    if !dispatch::can_counter(defender, def_item) || !dispatch::available(defender, def_item) {
        return false;
    }
    let (Some(apos), Some(dpos)) = (attacker.position, defender.position) else {
        return false;
    };
    let distance = apos.distance(dpos);
    distance >= dispatch::minimum_range(defender, def_item)
        && distance <= dispatch::maximum_range(defender, def_item)
}

//! Component dispatch
//!
//! Free functions mirroring the hook catalog, one per operation the rest
//! of the engine calls. Each resolves the ordered component stack for a
//! (unit, item) pair and combines results per the hook's policy.
//!
//! Stack order: skill-granted override components first (these suppress
//! same-nid components on the item), then the item's own components, then
//! the remaining active-skill components. Exclusive hooks therefore see
//! overrides before item natures before skills.

use ahash::AHashSet;

use crate::combat::action::Action;
use crate::combat::calc::{AttackInfo, CombatMode};
use crate::combat::playback::{already_supplied, PlaybackEvent, PlaybackKind};
use crate::components::component::{Component, EventCtx, HookSource, SplashSpec, TargetKind};
use crate::components::hooks::{Hook, Policy};
use crate::context::BattleContext;
use crate::core::types::{manhattan_sphere, Nid, Pos};
use crate::item::{Item, ItemArena, ItemId};
use crate::unit::Unit;

/// A component plus where it came from
pub struct Attached<'a> {
    pub component: &'a Component,
    pub source: HookSource,
}

/// Resolve the ordered component stack for a unit acting with an item
pub fn component_stack<'a>(unit: &'a Unit, item: &'a Item) -> Vec<Attached<'a>> {
    let mut stack = Vec::new();
    let mut suppressed: AHashSet<&str> = AHashSet::new();

    for skill in unit.active_skills() {
        for comp in &skill.components {
            if let Component::ItemOverride { components } = comp {
                for inner in components {
                    suppressed.insert(inner.nid());
                    stack.push(Attached {
                        component: inner,
                        source: HookSource::Skill(skill.nid.clone()),
                    });
                }
            }
        }
    }
    for comp in &item.components {
        if !suppressed.contains(comp.nid()) {
            stack.push(Attached {
                component: comp,
                source: HookSource::Item(item.id),
            });
        }
    }
    for skill in unit.active_skills() {
        for comp in &skill.components {
            if !matches!(comp, Component::ItemOverride { .. }) {
                stack.push(Attached {
                    component: comp,
                    source: HookSource::Skill(skill.nid.clone()),
                });
            }
        }
    }
    stack
}

// === Boolean hooks ===

fn bool_hook(unit: &Unit, item: &Item, hook: Hook) -> bool {
    let mut any_definer = false;
    for attached in component_stack(unit, item) {
        if let Some(value) = attached.component.flag(hook, item) {
            any_definer = true;
            if !value {
                return false;
            }
        }
    }
    match hook.policy() {
        Policy::AllTrue => true,
        _ => any_definer,
    }
}

pub fn available(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::Available)
}

pub fn is_weapon(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::IsWeapon)
}

pub fn is_spell(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::IsSpell)
}

pub fn equippable(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::Equippable)
}

pub fn can_counter(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::CanCounter)
}

pub fn can_be_countered(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::CanBeCountered)
}

pub fn can_double(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::CanDouble)
}

pub fn cannot_dual_strike(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::CannotDualStrike)
}

pub fn ignore_weapon_advantage(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::IgnoreWeaponAdvantage)
}

pub fn unsplashable(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::Unsplashable)
}

pub fn allow_same_target(unit: &Unit, item: &Item) -> bool {
    bool_hook(unit, item, Hook::AllowSameTarget)
}

// === Exclusive hooks, with engine defaults ===

fn exclusive_range(unit: &Unit, item: &Item, hook: Hook, default: u32) -> u32 {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.range(hook))
        .unwrap_or(default)
}

pub fn minimum_range(unit: &Unit, item: &Item) -> u32 {
    exclusive_range(unit, item, Hook::MinimumRange, 0)
}

pub fn maximum_range(unit: &Unit, item: &Item) -> u32 {
    exclusive_range(unit, item, Hook::MaximumRange, 0)
}

pub fn num_targets(unit: &Unit, item: &Item) -> u32 {
    exclusive_range(unit, item, Hook::NumTargets, 1)
}

/// Base damage value of the item; None when the item deals no damage
pub fn damage(unit: &Unit, item: &Item) -> Option<i32> {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.value(Hook::Damage))
}

pub fn hit(unit: &Unit, item: &Item) -> Option<i32> {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.value(Hook::Hit))
}

pub fn crit(unit: &Unit, item: &Item) -> Option<i32> {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.value(Hook::Crit))
}

pub fn weapon_type<'a>(unit: &'a Unit, item: &'a Item) -> Option<String> {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.weapon_type().map(str::to_string))
}

pub fn modify_weapon_triangle(unit: &Unit, item: &Item) -> f32 {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.triangle_multiplier())
        .unwrap_or(1.0)
}

fn default_formula(hook: Hook) -> &'static str {
    match hook {
        Hook::DamageFormula => "DAMAGE",
        Hook::ResistFormula => "DEFENSE",
        Hook::AccuracyFormula => "HIT",
        Hook::AvoidFormula => "AVOID",
        Hook::CritAccuracyFormula => "CRIT_HIT",
        Hook::CritAvoidFormula => "CRIT_AVOID",
        Hook::AttackSpeedFormula => "ATTACK_SPEED",
        Hook::DefenseSpeedFormula => "DEFENSE_SPEED",
        _ => "DAMAGE",
    }
}

/// Which named equation a combat computation should use
pub fn formula(unit: &Unit, item: &Item, hook: Hook) -> &'static str {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.formula(hook))
        .unwrap_or_else(|| default_formula(hook))
}

// === Additive hooks ===

pub fn modify(unit: &Unit, item: &Item, hook: Hook) -> i32 {
    component_stack(unit, item)
        .iter()
        .filter_map(|a| a.component.modify(hook))
        .sum()
}

pub fn wexp(unit: &Unit, item: &Item) -> i32 {
    modify(unit, item, Hook::Wexp)
}

pub fn exp(unit: &Unit, item: &Item) -> i32 {
    modify(unit, item, Hook::Exp)
}

/// Explicit AI priority; None when no component weighs in, letting the
/// planner fall back to its default utility scoring
pub fn ai_priority(unit: &Unit, item: &Item) -> Option<f32> {
    let mut total = None;
    for attached in component_stack(unit, item) {
        if let Some(value) = attached.component.ai_priority() {
            *total.get_or_insert(0.0) += value;
        }
    }
    total
}

// === Dynamic hooks ===

fn dynamic(
    unit: &Unit,
    item: &Item,
    target: Option<&Unit>,
    mode: CombatMode,
    info: AttackInfo,
    base: i32,
    hook: Hook,
) -> i32 {
    component_stack(unit, item)
        .iter()
        .filter_map(|a| a.component.dynamic(hook, unit, target, mode, info, base))
        .sum()
}

pub fn dynamic_damage(
    unit: &Unit,
    item: &Item,
    target: Option<&Unit>,
    mode: CombatMode,
    info: AttackInfo,
    base: i32,
) -> i32 {
    dynamic(unit, item, target, mode, info, base, Hook::DynamicDamage)
}

pub fn dynamic_accuracy(
    unit: &Unit,
    item: &Item,
    target: Option<&Unit>,
    mode: CombatMode,
    info: AttackInfo,
    base: i32,
) -> i32 {
    dynamic(unit, item, target, mode, info, base, Hook::DynamicAccuracy)
}

/// Extra strikes per phase (brave effects)
pub fn dynamic_multiattacks(
    unit: &Unit,
    item: &Item,
    target: Option<&Unit>,
    mode: CombatMode,
    info: AttackInfo,
) -> i32 {
    dynamic(unit, item, target, mode, info, 0, Hook::DynamicMultiattacks)
}

// === Target sets ===

fn kind_matches(kind: TargetKind, unit: &Unit, other: &Unit) -> bool {
    match kind {
        TargetKind::Enemies => unit.team.is_enemy(other.team),
        TargetKind::Allies => unit.team.is_ally(other.team),
        TargetKind::AllUnits => true,
    }
}

fn targets_for_kind(ctx: &BattleContext, unit: &Unit, item: &Item, kind: TargetKind) -> AHashSet<Pos> {
    let Some(origin) = unit.position else {
        return AHashSet::new();
    };
    let min = minimum_range(unit, item);
    let max = maximum_range(unit, item);
    ctx.units
        .iter()
        .filter(|other| other.is_alive())
        .filter(|other| kind_matches(kind, unit, other))
        .filter_map(|other| other.position)
        .filter(|pos| {
            let d = origin.distance(*pos);
            d >= min && d <= max
        })
        .collect()
}

/// Union of every targeting component's candidate positions
pub fn valid_targets(ctx: &BattleContext, unit: &Unit, item: &Item) -> AHashSet<Pos> {
    let mut result = AHashSet::new();
    for attached in component_stack(unit, item) {
        if let Some(kind) = attached.component.target_kind() {
            result.extend(targets_for_kind(ctx, unit, item, kind));
        }
    }
    result
}

/// Valid targets narrowed by every targeting component (intersection),
/// the conservative set the AI plans against
pub fn ai_targets(ctx: &BattleContext, unit: &Unit, item: &Item) -> AHashSet<Pos> {
    let mut result = valid_targets(ctx, unit, item);
    for attached in component_stack(unit, item) {
        if let Some(kind) = attached.component.target_kind() {
            let narrowed = targets_for_kind(ctx, unit, item, kind);
            result.retain(|pos| narrowed.contains(pos));
        }
    }
    result
}

/// All-true gate on a concrete (unit, target) pairing
pub fn target_restrict(ctx: &BattleContext, unit: &Unit, item: &Item, target_pos: Pos) -> bool {
    let target = ctx.unit_at(target_pos);
    for attached in component_stack(unit, item) {
        if let Some(ok) = attached.component.target_restrict(unit, target) {
            if !ok {
                return false;
            }
        }
    }
    true
}

// === Splash ===

fn item_splash_spec(unit: &Unit, item: &Item) -> Option<SplashSpec> {
    component_stack(unit, item)
        .iter()
        .find_map(|a| a.component.splash_spec())
}

fn alternate_splash_spec(unit: &Unit) -> Option<SplashSpec> {
    unit.active_skills()
        .flat_map(|s| s.components.iter())
        .find_map(|c| c.alternate_splash_spec())
}

/// Main target and splash set for a strike at `pos`.
///
/// Falls back to the alternate-splash skill hook, then to just the target
/// position. Idempotent for a fixed (unit, item, pos) and board state.
pub fn splash(
    ctx: &BattleContext,
    unit: &Unit,
    item: &Item,
    pos: Pos,
) -> (Option<Pos>, Vec<Pos>) {
    let spec = if unsplashable(unit, item) {
        None
    } else {
        item_splash_spec(unit, item).or_else(|| alternate_splash_spec(unit))
    };
    let Some(spec) = spec else {
        return (Some(pos), Vec::new());
    };

    let mut splash_hits: Vec<Pos> = manhattan_sphere(pos, 1, spec.radius)
        .into_iter()
        .filter(|p| match ctx.unit_at(*p) {
            Some(other) => !spec.enemies_only || unit.team.is_enemy(other.team),
            None => false,
        })
        .collect();
    splash_hits.sort_by_key(|p| (p.x, p.y));
    (Some(pos), splash_hits)
}

/// Raw tiles an AoE would cover, for previews and AI forecasting
pub fn splash_positions(unit: &Unit, item: &Item, pos: Pos) -> AHashSet<Pos> {
    match item_splash_spec(unit, item).or_else(|| alternate_splash_spec(unit)) {
        Some(spec) if !unsplashable(unit, item) => {
            manhattan_sphere(pos, 0, spec.radius).into_iter().collect()
        }
        _ => std::iter::once(pos).collect(),
    }
}

// === Item state ===

pub fn is_broken(item: &Item) -> bool {
    item.components
        .iter()
        .any(|c| c.is_broken(item).unwrap_or(false))
}

/// First available weapon in the unit's inventory
pub fn get_weapon(unit: &Unit, items: &ItemArena) -> Option<ItemId> {
    unit.items
        .iter()
        .copied()
        .find(|id| match items.get(*id) {
            Some(item) => is_weapon(unit, item) && available(unit, item),
            None => false,
        })
}

pub fn has_canto(unit: &Unit) -> bool {
    unit.active_skills()
        .flat_map(|s| s.components.iter())
        .any(|c| matches!(c, Component::Canto))
}

// === Event hooks ===

/// Everything a strike-scoped event dispatch needs to know
pub struct StrikeArgs<'a> {
    pub unit: &'a Unit,
    pub item: &'a Item,
    pub target: Option<&'a Unit>,
    pub target_pos: Option<Pos>,
    pub mode: CombatMode,
    pub info: AttackInfo,
    /// Forward item-scoped events to the parent item's components
    pub first_item: bool,
}

fn run_events(
    ctx: &BattleContext,
    hook: Hook,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    let stack = component_stack(args.unit, args.item);
    let mut ev = EventCtx {
        unit: args.unit,
        item: args.item,
        target: args.target,
        target_pos: args.target_pos,
        mode: args.mode,
        info: args.info,
        actions,
        playback,
    };
    for attached in &stack {
        if attached.component.defines(hook) {
            attached.component.run_event(hook, &attached.source, &mut ev);
        }
    }
    if args.first_item {
        if let Some(parent_id) = args.item.parent {
            if let Some(parent) = ctx.items.get(parent_id) {
                let source = HookSource::Item(parent_id);
                for comp in &parent.components {
                    if comp.defines(hook) {
                        comp.run_event(hook, &source, &mut ev);
                    }
                }
            }
        }
    }
}

/// Prospective HP of `target` after the actions queued so far
pub fn find_hp(actions: &[Action], target: &Unit) -> i32 {
    let delta: i32 = actions
        .iter()
        .map(|a| match a {
            Action::ChangeHp { unit, amount } if unit == &target.nid => *amount,
            _ => 0,
        })
        .sum();
    (target.hp + delta).clamp(0, target.max_hp())
}

fn any_defines(unit: &Unit, item: &Item, hook: Hook) -> bool {
    component_stack(unit, item)
        .iter()
        .any(|a| a.component.defines(hook))
}

/// Normal hit: events, then default playback unless already supplied
pub fn on_hit(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
    sound_variant: u8,
) {
    run_events(ctx, Hook::OnHit, args, actions, playback);
    default_hit_playback(args, actions, playback, sound_variant);
}

fn default_hit_playback(
    args: &StrikeArgs,
    actions: &[Action],
    playback: &mut Vec<PlaybackEvent>,
    sound_variant: u8,
) {
    let lethal = args
        .target
        .map(|t| find_hp(actions, t) <= 0)
        .unwrap_or(false);
    if !already_supplied(playback, PlaybackKind::Shake) {
        playback.push(PlaybackEvent::Shake {
            magnitude: if lethal { 2 } else { 1 },
        });
    }
    if !already_supplied(playback, PlaybackKind::HitSound) {
        let sound = if lethal {
            "Final Hit".to_string()
        } else {
            format!("Attack Hit {}", sound_variant + 1)
        };
        playback.push(PlaybackEvent::HitSound { sound });
    }
    if !already_supplied(playback, PlaybackKind::UnitTintAdd) {
        if let Some(target) = args.target {
            playback.push(PlaybackEvent::UnitTintAdd {
                unit: target.nid.clone(),
            });
        }
    }
}

/// Critical hit: falls back to on_hit events when no component defines
/// a crit-specific response
pub fn on_crit(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
    sound_variant: u8,
) {
    if any_defines(args.unit, args.item, Hook::OnCrit) {
        run_events(ctx, Hook::OnCrit, args, actions, playback);
    } else {
        run_events(ctx, Hook::OnHit, args, actions, playback);
    }
    if let Some(target) = args.target {
        if !already_supplied(playback, PlaybackKind::CritTint) {
            playback.push(PlaybackEvent::CritTint {
                unit: target.nid.clone(),
            });
            playback.push(PlaybackEvent::CritVibrate {
                unit: target.nid.clone(),
            });
        }
    }
    if !already_supplied(playback, PlaybackKind::Shake) {
        playback.push(PlaybackEvent::Shake { magnitude: 3 });
    }
    if !already_supplied(playback, PlaybackKind::HitSound) {
        let lethal = args
            .target
            .map(|t| find_hp(actions, t) <= 0)
            .unwrap_or(false);
        let sound = if lethal {
            "Final Hit".to_string()
        } else {
            format!("Critical Hit {}", sound_variant + 1)
        };
        playback.push(PlaybackEvent::HitSound { sound });
    }
}

/// Glancing hit: connected but dealt nothing
pub fn on_glancing_hit(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    if any_defines(args.unit, args.item, Hook::OnGlancingHit) {
        run_events(ctx, Hook::OnGlancingHit, args, actions, playback);
    } else {
        run_events(ctx, Hook::OnHit, args, actions, playback);
    }
    if !already_supplied(playback, PlaybackKind::HitSound) {
        playback.push(PlaybackEvent::HitSound {
            sound: "No Damage".to_string(),
        });
    }
}

pub fn on_miss(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    run_events(ctx, Hook::OnMiss, args, actions, playback);
    if !already_supplied(playback, PlaybackKind::HitSound) {
        playback.push(PlaybackEvent::HitSound {
            sound: "Attack Miss 2".to_string(),
        });
    }
    if let Some(pos) = args.target_pos {
        if !already_supplied(playback, PlaybackKind::HitAnim) {
            playback.push(PlaybackEvent::HitAnim {
                anim: "MapMiss".to_string(),
                pos,
            });
        }
    }
}

pub fn after_hit(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    run_events(ctx, Hook::AfterHit, args, actions, playback);
}

pub fn start_combat(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    run_events(ctx, Hook::StartCombat, args, actions, playback);
}

pub fn end_combat(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    run_events(ctx, Hook::EndCombat, args, actions, playback);
}

pub fn on_use(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    run_events(ctx, Hook::OnUse, args, actions, playback);
}

pub fn on_broken(
    ctx: &BattleContext,
    args: &StrikeArgs,
    actions: &mut Vec<Action>,
    playback: &mut Vec<PlaybackEvent>,
) {
    run_events(ctx, Hook::OnBroken, args, actions, playback);
    tracing::debug!(item = %args.item.nid, "item broke");
}

/// Out-of-combat item use (vulneraries, keys): fires the use events
/// against the holder and reports breakage when the spent charge was the
/// last one. The caller commits the returned actions.
pub fn use_item(
    ctx: &BattleContext,
    unit: &Unit,
    item: &Item,
) -> (Vec<Action>, Vec<PlaybackEvent>) {
    let mut actions = Vec::new();
    let mut playback = Vec::new();
    let args = StrikeArgs {
        unit,
        item,
        target: Some(unit),
        target_pos: unit.position,
        mode: CombatMode::Attack,
        info: AttackInfo::default(),
        first_item: true,
    };
    on_use(ctx, &args, &mut actions, &mut playback);
    if let Some(uses) = item.value("uses") {
        let spent = actions
            .iter()
            .filter(|a| matches!(a, Action::UseItemCharge { item: i, .. } if *i == item.id))
            .count() as i64;
        if uses - spent <= 0 {
            on_broken(ctx, &args, &mut actions, &mut playback);
        }
    }
    (actions, playback)
}

/// The nid of a status queued against `target`, if any; AI scoring input
pub fn status_applied(actions: &[Action], target: &Nid) -> Option<Nid> {
    actions.iter().find_map(|a| match a {
        Action::ApplyStatus { unit, status } if unit == target => Some(status.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Team;
    use crate::item::ItemDef;
    use crate::skill::Skill;

    fn arena_with(components: Vec<Component>) -> (ItemArena, ItemId) {
        let mut arena = ItemArena::new();
        let id = arena.load(&ItemDef::new("test_item", components));
        (arena, id)
    }

    #[test]
    fn test_all_true_false_iff_any_definer_false() {
        let unit = Unit::new("u", Team::Player);
        // Weapon alone: can_counter true
        let (arena, id) = arena_with(vec![Component::Weapon]);
        assert!(can_counter(&unit, arena.get(id).unwrap()));
        // Weapon + CannotCounter: one definer false forces false
        let (arena, id) = arena_with(vec![Component::Weapon, Component::CannotCounter]);
        assert!(!can_counter(&unit, arena.get(id).unwrap()));
        // No definer at all: false-priority default is false
        let (arena, id) = arena_with(vec![]);
        assert!(!can_counter(&unit, arena.get(id).unwrap()));
        // ...but availability defaults to true
        assert!(available(&unit, arena.get(id).unwrap()));
    }

    #[test]
    fn test_exclusive_default_first_definer_wins() {
        let unit = Unit::new("u", Team::Player);
        let (arena, id) = arena_with(vec![
            Component::MinRange { value: 1 },
            Component::MinRange { value: 3 },
        ]);
        assert_eq!(minimum_range(&unit, arena.get(id).unwrap()), 1);
        // No definer falls back to the engine default
        let (arena, id) = arena_with(vec![]);
        assert_eq!(num_targets(&unit, arena.get(id).unwrap()), 1);
        assert_eq!(maximum_range(&unit, arena.get(id).unwrap()), 0);
    }

    #[test]
    fn test_additive_hooks_sum() {
        let unit = Unit::new("u", Team::Player);
        let (arena, id) = arena_with(vec![
            Component::Weapon,
            Component::CritBoost { value: 10 },
            Component::CritBoost { value: 5 },
        ]);
        let item = arena.get(id).unwrap();
        assert_eq!(modify(&unit, item, Hook::ModifyCritAccuracy), 15);
        assert_eq!(wexp(&unit, item), 1);
    }

    #[test]
    fn test_skill_override_suppresses_same_nid_item_component() {
        let (arena, id) = arena_with(vec![Component::Weapon, Component::Damage { value: 5 }]);
        let item = arena.get(id).unwrap();
        let unit = Unit::new("u", Team::Player).with_skill(Skill::new(
            "empower",
            vec![Component::ItemOverride {
                components: vec![Component::Damage { value: 12 }],
            }],
        ));
        assert_eq!(damage(&unit, item), Some(12));
        // Without the skill the item's own value stands
        let plain = Unit::new("p", Team::Player);
        assert_eq!(damage(&plain, item), Some(5));
    }

    #[test]
    fn test_skill_components_join_the_stack_after_item() {
        let (arena, id) = arena_with(vec![Component::Weapon]);
        let item = arena.get(id).unwrap();
        let unit = Unit::new("u", Team::Player).with_skill(Skill::new(
            "critical_eye",
            vec![Component::CritBoost { value: 20 }],
        ));
        assert_eq!(modify(&unit, item, Hook::ModifyCritAccuracy), 20);
        // Inactive skills do not participate
        let mut inactive = unit.clone();
        inactive.skills[0].active = false;
        assert_eq!(modify(&inactive, item, Hook::ModifyCritAccuracy), 0);
    }

    #[test]
    fn test_ai_priority_absent_means_none() {
        let unit = Unit::new("u", Team::Player);
        let (arena, id) = arena_with(vec![Component::Weapon]);
        assert_eq!(ai_priority(&unit, arena.get(id).unwrap()), None);
        let (arena, id) = arena_with(vec![
            Component::Weapon,
            Component::AiPriorityBoost { value: 0.5 },
        ]);
        assert_eq!(ai_priority(&unit, arena.get(id).unwrap()), Some(0.5));
    }

    #[test]
    fn test_formula_selector_with_magic_override() {
        let unit = Unit::new("u", Team::Player);
        let (arena, id) = arena_with(vec![Component::Weapon]);
        let item = arena.get(id).unwrap();
        assert_eq!(formula(&unit, item, Hook::DamageFormula), "DAMAGE");
        let (arena, id) = arena_with(vec![Component::Weapon, Component::Magic]);
        let item = arena.get(id).unwrap();
        assert_eq!(formula(&unit, item, Hook::DamageFormula), "MAGIC_DAMAGE");
        assert_eq!(formula(&unit, item, Hook::ResistFormula), "RESIST");
    }

    #[test]
    fn test_default_hit_playback_unless_already_supplied() {
        let (arena, id) = arena_with(vec![
            Component::Weapon,
            Component::HitSoundOverride {
                sound: "Anvil Clang".to_string(),
            },
        ]);
        let item = arena.get(id).unwrap();
        let unit = Unit::new("u", Team::Player);
        let ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(4, 4)), 1);
        let args = StrikeArgs {
            unit: &unit,
            item,
            target: None,
            target_pos: None,
            mode: CombatMode::Attack,
            info: AttackInfo::default(),
            first_item: true,
        };
        let mut actions = Vec::new();
        let mut playback = Vec::new();
        on_hit(&ctx, &args, &mut actions, &mut playback, 0);
        let sounds: Vec<_> = playback
            .iter()
            .filter(|p| p.kind() == PlaybackKind::HitSound)
            .collect();
        assert_eq!(sounds.len(), 1);
        assert_eq!(
            sounds[0],
            &PlaybackEvent::HitSound {
                sound: "Anvil Clang".to_string()
            }
        );
    }

    #[test]
    fn test_splash_is_idempotent() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(8, 8)), 1);
        let id = ctx.items.load(&ItemDef::new(
            "bomb",
            vec![Component::Weapon, Component::Blast { radius: 1 }],
        ));
        ctx.place(Unit::new("a", Team::Player).at(Pos::new(0, 0)));
        ctx.place(Unit::new("e1", Team::Enemy).at(Pos::new(3, 3)));
        ctx.place(Unit::new("e2", Team::Enemy).at(Pos::new(3, 4)));
        let unit = ctx.unit(&Nid::from("a")).unwrap();
        let item = ctx.item(id).unwrap();
        let first = splash(&ctx, unit, item, Pos::new(3, 3));
        let second = splash(&ctx, unit, item, Pos::new(3, 3));
        assert_eq!(first, second);
        assert_eq!(first.0, Some(Pos::new(3, 3)));
        assert_eq!(first.1, vec![Pos::new(3, 4)]);
    }

    #[test]
    fn test_splash_without_component_is_just_the_target() {
        let ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(8, 8)), 1);
        let (arena, id) = arena_with(vec![Component::Weapon]);
        let unit = Unit::new("a", Team::Player).at(Pos::new(0, 0));
        let result = splash(&ctx, &unit, arena.get(id).unwrap(), Pos::new(2, 2));
        assert_eq!(result, (Some(Pos::new(2, 2)), Vec::new()));
    }

    #[test]
    fn test_alternate_splash_skill_fallback() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(8, 8)), 1);
        let id = ctx.items.load(&ItemDef::new("staff", vec![Component::Spell]));
        ctx.place(
            Unit::new("caster", Team::Player)
                .at(Pos::new(0, 0))
                .with_skill(Skill::new("echo", vec![Component::AlternateSplash { radius: 1 }])),
        );
        ctx.place(Unit::new("e", Team::Enemy).at(Pos::new(2, 3)));
        let unit = ctx.unit(&Nid::from("caster")).unwrap();
        let item = ctx.item(id).unwrap();
        let (main, hits) = splash(&ctx, unit, item, Pos::new(2, 2));
        assert_eq!(main, Some(Pos::new(2, 2)));
        assert_eq!(hits, vec![Pos::new(2, 3)]);
    }

    #[test]
    fn test_valid_targets_range_scenario() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(8, 8)), 1);
        let id = ctx.items.load(&ItemDef::new(
            "javelin",
            vec![
                Component::Weapon,
                Component::TargetsEnemies,
                Component::MinRange { value: 1 },
                Component::MaxRange { value: 2 },
            ],
        ));
        ctx.place(
            Unit::new("a", Team::Player)
                .with_stat(crate::core::types::StatId::Hp, 20)
                .at(Pos::new(0, 0)),
        );
        ctx.place(
            Unit::new("near", Team::Enemy)
                .with_stat(crate::core::types::StatId::Hp, 20)
                .at(Pos::new(0, 2)),
        );
        ctx.place(
            Unit::new("far", Team::Enemy)
                .with_stat(crate::core::types::StatId::Hp, 20)
                .at(Pos::new(0, 3)),
        );
        let unit = ctx.unit(&Nid::from("a")).unwrap();
        let item = ctx.item(id).unwrap();
        let targets = valid_targets(&ctx, unit, item);
        assert!(targets.contains(&Pos::new(0, 2)));
        assert!(!targets.contains(&Pos::new(0, 0)));
        assert!(!targets.contains(&Pos::new(0, 3)));
    }

    #[test]
    fn test_target_restrict_rejects_full_hp_heal() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(8, 8)), 1);
        let id = ctx.items.load(&ItemDef::new(
            "mend",
            vec![Component::Spell, Component::TargetsAllies, Component::Heal { amount: 10 }],
        ));
        ctx.place(Unit::new("healer", Team::Player).at(Pos::new(0, 0)));
        let mut hurt = Unit::new("hurt", Team::Player)
            .with_stat(crate::core::types::StatId::Hp, 20)
            .at(Pos::new(0, 1));
        hurt.hp = 12;
        ctx.place(hurt);
        ctx.place(
            Unit::new("whole", Team::Player)
                .with_stat(crate::core::types::StatId::Hp, 20)
                .at(Pos::new(1, 0)),
        );
        let unit = ctx.unit(&Nid::from("healer")).unwrap();
        let item = ctx.item(id).unwrap();
        assert!(target_restrict(&ctx, unit, item, Pos::new(0, 1)));
        assert!(!target_restrict(&ctx, unit, item, Pos::new(1, 0)));
    }

    #[test]
    fn test_event_forwarding_to_parent_item() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(4, 4)), 1);
        let mut def = ItemDef::new(
            "volley",
            vec![Component::HitSoundOverride {
                sound: "Volley Twang".to_string(),
            }],
        );
        def.subitems.push(ItemDef::new("volley_shot", vec![Component::Weapon]));
        let parent_id = ctx.items.load(&def);
        let sub_id = ctx.items.get(parent_id).unwrap().subitems[0];
        let unit = Unit::new("u", Team::Player);
        let item = ctx.item(sub_id).unwrap();
        let args = StrikeArgs {
            unit: &unit,
            item,
            target: None,
            target_pos: None,
            mode: CombatMode::Attack,
            info: AttackInfo::default(),
            first_item: true,
        };
        let mut actions = Vec::new();
        let mut playback = Vec::new();
        on_hit(&ctx, &args, &mut actions, &mut playback, 0);
        // The parent's sound override arrives through forwarding, so the
        // engine default is not appended
        assert!(playback.contains(&PlaybackEvent::HitSound {
            sound: "Volley Twang".to_string()
        }));
    }

    #[test]
    fn test_get_weapon_skips_unavailable() {
        let mut arena = ItemArena::new();
        let spent = arena.load(&ItemDef::new(
            "spent_blade",
            vec![Component::Weapon, Component::Uses { starting: 0 }],
        ));
        let fresh = arena.load(&ItemDef::new("fresh_blade", vec![Component::Weapon]));
        let unit = Unit::new("u", Team::Player).with_item(spent).with_item(fresh);
        assert_eq!(get_weapon(&unit, &arena), Some(fresh));
    }

    #[test]
    fn test_use_item_heals_the_holder_and_spends_a_charge() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(4, 4)), 1);
        let id = ctx.items.load(&ItemDef::new(
            "vulnerary",
            vec![Component::Heal { amount: 10 }, Component::Uses { starting: 3 }],
        ));
        let mut holder = Unit::new("holder", Team::Player)
            .with_stat(crate::core::types::StatId::Hp, 20)
            .at(Pos::new(0, 0))
            .with_item(id);
        holder.hp = 5;
        ctx.place(holder);
        let (actions, _) = {
            let unit = ctx.unit(&Nid::from("holder")).unwrap();
            use_item(&ctx, unit, ctx.item(id).unwrap())
        };
        assert!(actions.contains(&Action::ChangeHp {
            unit: Nid::from("holder"),
            amount: 10,
        }));
        crate::combat::action::apply_all(&actions, &mut ctx);
        assert_eq!(ctx.unit(&Nid::from("holder")).unwrap().hp, 15);
        assert_eq!(ctx.item(id).unwrap().value("uses"), Some(2));
    }

    #[test]
    fn test_use_item_last_charge_reports_breakage() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(4, 4)), 1);
        let id = ctx.items.load(&ItemDef::new(
            "last_sip",
            vec![Component::Heal { amount: 10 }, Component::Uses { starting: 1 }],
        ));
        ctx.place(
            Unit::new("holder", Team::Player)
                .with_stat(crate::core::types::StatId::Hp, 20)
                .at(Pos::new(0, 0))
                .with_item(id),
        );
        let (actions, _) = {
            let unit = ctx.unit(&Nid::from("holder")).unwrap();
            use_item(&ctx, unit, ctx.item(id).unwrap())
        };
        assert!(actions.contains(&Action::SetItemData {
            item: id,
            key: "broken".to_string(),
            value: 1,
        }));
        crate::combat::action::apply_all(&actions, &mut ctx);
        assert!(is_broken(ctx.item(id).unwrap()));
    }

    #[test]
    fn test_allow_same_target_requires_the_component() {
        let unit = Unit::new("u", Team::Player);
        let (arena, id) = arena_with(vec![Component::Weapon]);
        assert!(!allow_same_target(&unit, arena.get(id).unwrap()));
        let (arena, id) = arena_with(vec![Component::Weapon, Component::AllowSameTarget]);
        assert!(allow_same_target(&unit, arena.get(id).unwrap()));
    }

    #[test]
    fn test_splash_positions_cover_resolved_splash() {
        let mut ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(8, 8)), 1);
        let id = ctx.items.load(&ItemDef::new(
            "bomb",
            vec![Component::Weapon, Component::Blast { radius: 1 }],
        ));
        ctx.place(Unit::new("a", Team::Player).at(Pos::new(0, 0)));
        ctx.place(Unit::new("e1", Team::Enemy).at(Pos::new(3, 3)));
        ctx.place(Unit::new("e2", Team::Enemy).at(Pos::new(3, 4)));
        let unit = ctx.unit(&Nid::from("a")).unwrap();
        let item = ctx.item(id).unwrap();
        // The preview is pure geometry: center plus the four neighbours
        let preview = splash_positions(unit, item, Pos::new(3, 3));
        assert_eq!(preview.len(), 5);
        assert!(preview.contains(&Pos::new(3, 3)));
        // Every position the strike resolves to was in the preview
        let (main, hits) = splash(&ctx, unit, item, Pos::new(3, 3));
        assert!(preview.contains(&main.unwrap()));
        assert!(hits.iter().all(|p| preview.contains(p)));
        // Without an AoE component the preview is just the target tile
        let (arena, plain) = arena_with(vec![Component::Weapon]);
        let preview = splash_positions(unit, arena.get(plain).unwrap(), Pos::new(2, 2));
        assert_eq!(preview.len(), 1);
        assert!(preview.contains(&Pos::new(2, 2)));
    }

    #[test]
    fn test_spell_cast_anim_at_combat_start() {
        let (arena, id) = arena_with(vec![Component::Spell, Component::Heal { amount: 10 }]);
        let item = arena.get(id).unwrap();
        let unit = Unit::new("sage", Team::Player);
        let ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(4, 4)), 1);
        let args = StrikeArgs {
            unit: &unit,
            item,
            target: None,
            target_pos: None,
            mode: CombatMode::Attack,
            info: AttackInfo::default(),
            first_item: true,
        };
        let mut actions = Vec::new();
        let mut playback = Vec::new();
        start_combat(&ctx, &args, &mut actions, &mut playback);
        assert!(playback.contains(&PlaybackEvent::CastAnim {
            anim: "test_item".to_string(),
        }));
    }

    #[test]
    fn test_charge_skill_proc_follows_combat_mode() {
        let (arena, id) = arena_with(vec![Component::Weapon]);
        let item = arena.get(id).unwrap();
        let unit = Unit::new("u", Team::Player)
            .with_skill(Skill::new("luna", vec![Component::ChargeCost { cost: 1 }]));
        let ctx = BattleContext::new(Box::new(crate::board::GridBoard::new(4, 4)), 1);
        for (mode, expected) in [
            (
                CombatMode::Attack,
                PlaybackEvent::AttackProc {
                    unit: Nid::from("u"),
                    skill: Nid::from("luna"),
                },
            ),
            (
                CombatMode::Defense,
                PlaybackEvent::DefenseProc {
                    unit: Nid::from("u"),
                    skill: Nid::from("luna"),
                },
            ),
        ] {
            let args = StrikeArgs {
                unit: &unit,
                item,
                target: None,
                target_pos: None,
                mode,
                info: AttackInfo::default(),
                first_item: true,
            };
            let mut actions = Vec::new();
            let mut playback = Vec::new();
            start_combat(&ctx, &args, &mut actions, &mut playback);
            assert!(playback.contains(&expected));
        }
    }
}

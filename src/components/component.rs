//! Concrete component variants
//!
//! A component is a tagged data record that optionally defines hooks from
//! the catalog. `defines()` is the capability table: dispatch combinators
//! consult it instead of probing per call, and every arm of the per-policy
//! accessor methods below must agree with it.
//!
//! The `nid` serde tag is the stable wire format between authoring tools
//! and the engine; variant tags never change meaning across versions.

use serde::{Deserialize, Serialize};

use crate::combat::action::Action;
use crate::combat::calc::{AttackInfo, CombatMode};
use crate::combat::playback::PlaybackEvent;
use crate::components::hooks::Hook;
use crate::core::types::{Nid, Pos};
use crate::item::{Item, ItemId};
use crate::unit::Unit;

/// Where a dispatched component came from, for hooks that write back to
/// their owner (skill charges)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookSource {
    Item(ItemId),
    Skill(Nid),
}

/// Which kind of unit an item may target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Enemies,
    Allies,
    AllUnits,
}

/// Splash shape contributed by an AoE component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplashSpec {
    pub radius: u32,
    pub enemies_only: bool,
}

/// Everything an event hook may read and write while resolving one strike
pub struct EventCtx<'a> {
    pub unit: &'a Unit,
    pub item: &'a Item,
    pub target: Option<&'a Unit>,
    pub target_pos: Option<Pos>,
    pub mode: CombatMode,
    pub info: AttackInfo,
    pub actions: &'a mut Vec<Action>,
    pub playback: &'a mut Vec<PlaybackEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "nid", rename_all = "snake_case")]
pub enum Component {
    // Item natures
    Weapon,
    Spell,
    SiegeWeapon,
    Uses { starting: i64 },

    // Targeting
    TargetsEnemies,
    TargetsAllies,
    TargetsUnits,
    MinRange { value: u32 },
    MaxRange { value: u32 },
    MultiTarget { value: u32 },
    AllowSameTarget,

    // Base combat values
    Damage { value: i32 },
    Hit { value: i32 },
    Crit { value: i32 },
    Magic,
    WeaponType { value: String },
    TriangleMultiplier { value: f32 },
    IgnoreWeaponAdvantage,

    // Strike shape
    Brave,
    NoDouble,
    CannotCounter,
    CannotDualStrike,
    Blast { radius: u32 },
    EnemyBlast { radius: u32 },
    Unsplashable,

    // Additive modifiers
    DamageBoost { value: i32 },
    HitBoost { value: i32 },
    AvoidBoost { value: i32 },
    ResistBoost { value: i32 },
    CritBoost { value: i32 },
    SpeedBoost { value: i32 },
    WexpGain { value: i32 },
    ExpGain { value: i32 },
    AiPriorityBoost { value: f32 },

    // Dynamic modifiers
    Effective { tag: String, bonus: i32 },
    DamageBoostOnHit { value: i32 },

    // Events
    Heal { amount: i32 },
    StatusOnHit { status: String },
    LifeLink,
    HitSoundOverride { sound: String },
    MapHitAddBlend,

    // Skill-side
    Canto,
    ChargeCost { cost: i64 },
    AlternateSplash { radius: u32 },
    ItemOverride { components: Vec<Component> },
}

impl Component {
    /// Stable authoring tag, matching the serde wire format
    pub fn nid(&self) -> &'static str {
        match self {
            Component::Weapon => "weapon",
            Component::Spell => "spell",
            Component::SiegeWeapon => "siege_weapon",
            Component::Uses { .. } => "uses",
            Component::TargetsEnemies => "targets_enemies",
            Component::TargetsAllies => "targets_allies",
            Component::TargetsUnits => "targets_units",
            Component::MinRange { .. } => "min_range",
            Component::MaxRange { .. } => "max_range",
            Component::MultiTarget { .. } => "multi_target",
            Component::AllowSameTarget => "allow_same_target",
            Component::Damage { .. } => "damage",
            Component::Hit { .. } => "hit",
            Component::Crit { .. } => "crit",
            Component::Magic => "magic",
            Component::WeaponType { .. } => "weapon_type",
            Component::TriangleMultiplier { .. } => "triangle_multiplier",
            Component::IgnoreWeaponAdvantage => "ignore_weapon_advantage",
            Component::Brave => "brave",
            Component::NoDouble => "no_double",
            Component::CannotCounter => "cannot_counter",
            Component::CannotDualStrike => "cannot_dual_strike",
            Component::Blast { .. } => "blast",
            Component::EnemyBlast { .. } => "enemy_blast",
            Component::Unsplashable => "unsplashable",
            Component::DamageBoost { .. } => "damage_boost",
            Component::HitBoost { .. } => "hit_boost",
            Component::AvoidBoost { .. } => "avoid_boost",
            Component::ResistBoost { .. } => "resist_boost",
            Component::CritBoost { .. } => "crit_boost",
            Component::SpeedBoost { .. } => "speed_boost",
            Component::WexpGain { .. } => "wexp_gain",
            Component::ExpGain { .. } => "exp_gain",
            Component::AiPriorityBoost { .. } => "ai_priority_boost",
            Component::Effective { .. } => "effective",
            Component::DamageBoostOnHit { .. } => "damage_boost_on_hit",
            Component::Heal { .. } => "heal",
            Component::StatusOnHit { .. } => "status_on_hit",
            Component::LifeLink => "life_link",
            Component::HitSoundOverride { .. } => "hit_sound_override",
            Component::MapHitAddBlend => "map_hit_add_blend",
            Component::Canto => "canto",
            Component::ChargeCost { .. } => "charge_cost",
            Component::AlternateSplash { .. } => "alternate_splash",
            Component::ItemOverride { .. } => "item_override",
        }
    }

    /// Capability table: which hooks this variant implements
    pub fn defines(&self, hook: Hook) -> bool {
        use Hook::*;
        match self {
            Component::Weapon => matches!(
                hook,
                IsWeapon | Equippable | CanCounter | CanBeCountered | CanDouble | Wexp
            ),
            Component::Spell => matches!(hook, IsSpell | StartCombat),
            Component::SiegeWeapon => matches!(hook, IsWeapon | Equippable),
            Component::Uses { .. } => {
                matches!(hook, Available | AfterHit | OnUse | OnBroken)
            }
            Component::TargetsEnemies | Component::TargetsAllies | Component::TargetsUnits => {
                matches!(hook, ValidTargets | AiTargets)
            }
            Component::MinRange { .. } => matches!(hook, MinimumRange),
            Component::MaxRange { .. } => matches!(hook, MaximumRange),
            Component::MultiTarget { .. } => matches!(hook, NumTargets),
            Component::AllowSameTarget => matches!(hook, AllowSameTarget),
            Component::Damage { .. } => matches!(hook, Damage),
            Component::Hit { .. } => matches!(hook, Hit),
            Component::Crit { .. } => matches!(hook, Crit),
            Component::Magic => matches!(hook, DamageFormula | ResistFormula),
            Component::WeaponType { .. } => matches!(hook, WeaponType),
            Component::TriangleMultiplier { .. } => matches!(hook, ModifyWeaponTriangle),
            Component::IgnoreWeaponAdvantage => matches!(hook, IgnoreWeaponAdvantage),
            Component::Brave => matches!(hook, DynamicMultiattacks),
            Component::NoDouble => matches!(hook, CanDouble),
            Component::CannotCounter => matches!(hook, CanCounter),
            Component::CannotDualStrike => matches!(hook, CannotDualStrike),
            Component::Blast { .. } | Component::EnemyBlast { .. } => {
                matches!(hook, Splash | SplashPositions)
            }
            Component::Unsplashable => matches!(hook, Unsplashable),
            Component::DamageBoost { .. } => matches!(hook, ModifyDamage),
            Component::HitBoost { .. } => matches!(hook, ModifyAccuracy),
            Component::AvoidBoost { .. } => matches!(hook, ModifyAvoid),
            Component::ResistBoost { .. } => matches!(hook, ModifyResist),
            Component::CritBoost { .. } => matches!(hook, ModifyCritAccuracy),
            Component::SpeedBoost { .. } => {
                matches!(hook, ModifyAttackSpeed | ModifyDefenseSpeed)
            }
            Component::WexpGain { .. } => matches!(hook, Wexp),
            Component::ExpGain { .. } => matches!(hook, Exp),
            Component::AiPriorityBoost { .. } => matches!(hook, AiPriority),
            Component::Effective { .. } => matches!(hook, DynamicDamage),
            Component::DamageBoostOnHit { .. } => matches!(hook, DynamicDamage),
            Component::Heal { .. } => matches!(hook, OnHit | OnUse | TargetRestrict),
            Component::StatusOnHit { .. } => matches!(hook, OnHit),
            Component::LifeLink => matches!(hook, AfterHit),
            Component::HitSoundOverride { .. } => matches!(hook, OnHit),
            Component::MapHitAddBlend => matches!(hook, OnHit),
            Component::Canto => false,
            Component::ChargeCost { .. } => matches!(hook, StartCombat | EndCombat),
            Component::AlternateSplash { .. } => false,
            Component::ItemOverride { .. } => false,
        }
    }

    /// Boolean hook value, for the false-priority/all-true families
    pub fn flag(&self, hook: Hook, item: &Item) -> Option<bool> {
        use Hook::*;
        match (self, hook) {
            (Component::Weapon, IsWeapon)
            | (Component::Weapon, Equippable)
            | (Component::Weapon, CanCounter)
            | (Component::Weapon, CanBeCountered)
            | (Component::Weapon, CanDouble) => Some(true),
            (Component::Spell, IsSpell) => Some(true),
            (Component::SiegeWeapon, IsWeapon) | (Component::SiegeWeapon, Equippable) => {
                Some(true)
            }
            (Component::Uses { .. }, Available) => Some(item.value("uses").unwrap_or(0) > 0),
            (Component::AllowSameTarget, AllowSameTarget) => Some(true),
            (Component::IgnoreWeaponAdvantage, IgnoreWeaponAdvantage) => Some(true),
            (Component::NoDouble, CanDouble) => Some(false),
            (Component::CannotCounter, CanCounter) => Some(false),
            (Component::CannotDualStrike, CannotDualStrike) => Some(true),
            (Component::Unsplashable, Unsplashable) => Some(true),
            _ => None,
        }
    }

    /// Exclusive numeric hook value (damage/hit/crit bases)
    pub fn value(&self, hook: Hook) -> Option<i32> {
        match (self, hook) {
            (Component::Damage { value }, Hook::Damage) => Some(*value),
            (Component::Hit { value }, Hook::Hit) => Some(*value),
            (Component::Crit { value }, Hook::Crit) => Some(*value),
            _ => None,
        }
    }

    /// Exclusive range hook value (min/max range, target count)
    pub fn range(&self, hook: Hook) -> Option<u32> {
        match (self, hook) {
            (Component::MinRange { value }, Hook::MinimumRange) => Some(*value),
            (Component::MaxRange { value }, Hook::MaximumRange) => Some(*value),
            (Component::MultiTarget { value }, Hook::NumTargets) => Some(*value),
            _ => None,
        }
    }

    /// Formula selector: names an equation in the registry
    pub fn formula(&self, hook: Hook) -> Option<&'static str> {
        match (self, hook) {
            (Component::Magic, Hook::DamageFormula) => Some("MAGIC_DAMAGE"),
            (Component::Magic, Hook::ResistFormula) => Some("RESIST"),
            _ => None,
        }
    }

    pub fn weapon_type(&self) -> Option<&str> {
        match self {
            Component::WeaponType { value } => Some(value),
            _ => None,
        }
    }

    pub fn triangle_multiplier(&self) -> Option<f32> {
        match self {
            Component::TriangleMultiplier { value } => Some(*value),
            _ => None,
        }
    }

    /// Additive hook contribution
    pub fn modify(&self, hook: Hook) -> Option<i32> {
        use Hook::*;
        match (self, hook) {
            (Component::DamageBoost { value }, ModifyDamage) => Some(*value),
            (Component::HitBoost { value }, ModifyAccuracy) => Some(*value),
            (Component::AvoidBoost { value }, ModifyAvoid) => Some(*value),
            (Component::ResistBoost { value }, ModifyResist) => Some(*value),
            (Component::CritBoost { value }, ModifyCritAccuracy) => Some(*value),
            (Component::SpeedBoost { value }, ModifyAttackSpeed)
            | (Component::SpeedBoost { value }, ModifyDefenseSpeed) => Some(*value),
            (Component::Weapon, Wexp) => Some(1),
            (Component::WexpGain { value }, Wexp) => Some(*value),
            (Component::ExpGain { value }, Exp) => Some(*value),
            _ => None,
        }
    }

    pub fn ai_priority(&self) -> Option<f32> {
        match self {
            Component::AiPriorityBoost { value } => Some(*value),
            _ => None,
        }
    }

    /// Dynamic hook contribution; sees the target, mode, and running base
    pub fn dynamic(
        &self,
        hook: Hook,
        _unit: &Unit,
        target: Option<&Unit>,
        _mode: CombatMode,
        info: AttackInfo,
        _base: i32,
    ) -> Option<i32> {
        match (self, hook) {
            (Component::Effective { tag, bonus }, Hook::DynamicDamage) => {
                Some(match target {
                    Some(t) if t.tags.contains(tag.as_str()) => *bonus,
                    _ => 0,
                })
            }
            (Component::DamageBoostOnHit { value }, Hook::DynamicDamage) => {
                Some(*value * info.strike_num as i32)
            }
            (Component::Brave, Hook::DynamicMultiattacks) => Some(1),
            _ => None,
        }
    }

    pub fn target_kind(&self) -> Option<TargetKind> {
        match self {
            Component::TargetsEnemies => Some(TargetKind::Enemies),
            Component::TargetsAllies => Some(TargetKind::Allies),
            Component::TargetsUnits => Some(TargetKind::AllUnits),
            _ => None,
        }
    }

    /// True to keep the pairing, false to reject it
    pub fn target_restrict(&self, _unit: &Unit, target: Option<&Unit>) -> Option<bool> {
        match self {
            // Healing a full-health target is never a valid pairing
            Component::Heal { .. } => Some(target.map_or(true, |t| t.hp < t.max_hp())),
            _ => None,
        }
    }

    pub fn splash_spec(&self) -> Option<SplashSpec> {
        match self {
            Component::Blast { radius } => Some(SplashSpec {
                radius: *radius,
                enemies_only: false,
            }),
            Component::EnemyBlast { radius } => Some(SplashSpec {
                radius: *radius,
                enemies_only: true,
            }),
            _ => None,
        }
    }

    /// Skill-side fallback splash used when the item defines none
    pub fn alternate_splash_spec(&self) -> Option<SplashSpec> {
        match self {
            Component::AlternateSplash { radius } => Some(SplashSpec {
                radius: *radius,
                enemies_only: false,
            }),
            _ => None,
        }
    }

    /// Seed for the owner's data bag at load time
    pub fn init(&self) -> Option<(&'static str, i64)> {
        match self {
            Component::Uses { starting } => Some(("uses", *starting)),
            Component::ChargeCost { cost } => Some(("charges", *cost)),
            _ => None,
        }
    }

    /// Whether the item this component sits on is spent
    pub fn is_broken(&self, item: &Item) -> Option<bool> {
        match self {
            Component::Uses { .. } => Some(item.value("uses").unwrap_or(0) <= 0),
            _ => None,
        }
    }

    /// Event hook body; must cover exactly the event hooks `defines` claims
    pub fn run_event(&self, hook: Hook, source: &HookSource, ev: &mut EventCtx) {
        match (self, hook) {
            (Component::Heal { amount }, Hook::OnHit) => {
                if let Some(target) = ev.target {
                    ev.actions.push(Action::ChangeHp {
                        unit: target.nid.clone(),
                        amount: *amount,
                    });
                    ev.playback.push(PlaybackEvent::HealHit {
                        unit: ev.unit.nid.clone(),
                        target: target.nid.clone(),
                        amount: *amount,
                    });
                }
            }
            (Component::Heal { amount }, Hook::OnUse) => {
                ev.actions.push(Action::ChangeHp {
                    unit: ev.unit.nid.clone(),
                    amount: *amount,
                });
            }
            (Component::StatusOnHit { status }, Hook::OnHit) => {
                if let Some(target) = ev.target {
                    ev.actions.push(Action::ApplyStatus {
                        unit: target.nid.clone(),
                        status: Nid::new(status.clone()),
                    });
                }
            }
            (Component::HitSoundOverride { sound }, Hook::OnHit) => {
                ev.playback.push(PlaybackEvent::HitSound {
                    sound: sound.clone(),
                });
            }
            (Component::MapHitAddBlend, Hook::OnHit) => {
                if let Some(target) = ev.target {
                    ev.playback.push(PlaybackEvent::UnitTintAdd {
                        unit: target.nid.clone(),
                    });
                }
            }
            (Component::LifeLink, Hook::AfterHit) => {
                if let Some(target) = ev.target {
                    let dealt = damage_dealt(ev.actions, &target.nid);
                    if dealt > 0 {
                        ev.actions.push(Action::ChangeHp {
                            unit: ev.unit.nid.clone(),
                            amount: dealt,
                        });
                    }
                }
            }
            (Component::Uses { .. }, Hook::AfterHit) | (Component::Uses { .. }, Hook::OnUse) => {
                ev.actions.push(Action::UseItemCharge {
                    unit: ev.unit.nid.clone(),
                    item: ev.item.id,
                });
            }
            (Component::Uses { .. }, Hook::OnBroken) => {
                ev.actions.push(Action::SetItemData {
                    item: ev.item.id,
                    key: "broken".to_string(),
                    value: 1,
                });
            }
            (Component::Spell, Hook::StartCombat) => {
                ev.playback.push(PlaybackEvent::CastAnim {
                    anim: ev.item.nid.to_string(),
                });
            }
            (Component::ChargeCost { .. }, Hook::StartCombat) => {
                if let HookSource::Skill(skill) = source {
                    ev.playback.push(if ev.mode == CombatMode::Defense {
                        PlaybackEvent::DefenseProc {
                            unit: ev.unit.nid.clone(),
                            skill: skill.clone(),
                        }
                    } else {
                        PlaybackEvent::AttackProc {
                            unit: ev.unit.nid.clone(),
                            skill: skill.clone(),
                        }
                    });
                }
            }
            (Component::ChargeCost { cost }, Hook::EndCombat) => {
                if let HookSource::Skill(skill) = source {
                    let current = ev
                        .unit
                        .skills
                        .iter()
                        .find(|s| &s.nid == skill)
                        .and_then(|s| s.value("charges"))
                        .unwrap_or(0);
                    ev.actions.push(Action::SetSkillData {
                        unit: ev.unit.nid.clone(),
                        skill: skill.clone(),
                        key: "charges".to_string(),
                        value: (current - cost).max(0),
                    });
                }
            }
            _ => {}
        }
    }
}

/// Net HP loss already queued against `target` this phase
fn damage_dealt(actions: &[Action], target: &Nid) -> i32 {
    actions
        .iter()
        .map(|a| match a {
            Action::ChangeHp { unit, amount } if unit == target && *amount < 0 => -amount,
            _ => 0,
        })
        .sum()
}

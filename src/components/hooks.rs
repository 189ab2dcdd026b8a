//! Hook catalog
//!
//! Every extension point the dispatcher knows about, with its combination
//! policy. `Hook::policy()` is the single source of truth: dispatch
//! combinators consult it, and the policy tests pin it so a hook can't be
//! moved between families silently.

use serde::{Deserialize, Serialize};

/// How results from multiple defining components combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Policy {
    /// Every definer must return true; no definer means false
    FalsePriority,
    /// Every definer must return true; no definer means true
    AllTrue,
    /// First definer in attachment order wins, else the engine default
    ExclusiveDefault,
    /// Sum of every definer's contribution
    Additive,
    /// Additive, but definers also see target, mode, and running base value
    Dynamic,
    /// Every definer is invoked; no return aggregation
    Event,
    /// Union of returned position sets
    MergeUnion,
    /// Intersection of returned position sets
    MergeIntersect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hook {
    // Boolean capabilities
    IsWeapon,
    IsSpell,
    Equippable,
    Available,
    CanCounter,
    CanBeCountered,
    CanDouble,
    CannotDualStrike,
    IgnoreWeaponAdvantage,
    Unsplashable,
    AllowSameTarget,
    TargetRestrict,

    // Exclusive values
    NumTargets,
    MinimumRange,
    MaximumRange,
    WeaponType,
    ModifyWeaponTriangle,
    Damage,
    Hit,
    Crit,

    // Formula selectors (exclusive, name an equation)
    DamageFormula,
    ResistFormula,
    AccuracyFormula,
    AvoidFormula,
    CritAccuracyFormula,
    CritAvoidFormula,
    AttackSpeedFormula,
    DefenseSpeedFormula,

    // Additive modifiers
    ModifyDamage,
    ModifyResist,
    ModifyAccuracy,
    ModifyAvoid,
    ModifyCritAccuracy,
    ModifyAttackSpeed,
    ModifyDefenseSpeed,
    Wexp,
    Exp,
    AiPriority,

    // Dynamic modifiers
    DynamicDamage,
    DynamicAccuracy,
    DynamicMultiattacks,

    // Events
    OnHit,
    OnCrit,
    OnGlancingHit,
    OnMiss,
    AfterHit,
    StartCombat,
    EndCombat,
    OnUse,
    OnBroken,

    // Target and splash sets
    ValidTargets,
    AiTargets,
    Splash,
    SplashPositions,
}

impl Hook {
    pub fn policy(&self) -> Policy {
        use Hook::*;
        match self {
            IsWeapon | IsSpell | Equippable | CanCounter | CanBeCountered | CanDouble
            | CannotDualStrike | IgnoreWeaponAdvantage | Unsplashable | AllowSameTarget => {
                Policy::FalsePriority
            }

            Available | TargetRestrict => Policy::AllTrue,

            NumTargets | MinimumRange | MaximumRange | WeaponType | ModifyWeaponTriangle
            | Damage | Hit | Crit | DamageFormula | ResistFormula | AccuracyFormula
            | AvoidFormula | CritAccuracyFormula | CritAvoidFormula | AttackSpeedFormula
            | DefenseSpeedFormula => Policy::ExclusiveDefault,

            ModifyDamage | ModifyResist | ModifyAccuracy | ModifyAvoid | ModifyCritAccuracy
            | ModifyAttackSpeed | ModifyDefenseSpeed | Wexp | Exp | AiPriority => {
                Policy::Additive
            }

            DynamicDamage | DynamicAccuracy | DynamicMultiattacks => Policy::Dynamic,

            OnHit | OnCrit | OnGlancingHit | OnMiss | AfterHit | StartCombat | EndCombat
            | OnUse | OnBroken => Policy::Event,

            ValidTargets | Splash | SplashPositions => Policy::MergeUnion,

            AiTargets => Policy::MergeIntersect,
        }
    }
}

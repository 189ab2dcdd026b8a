//! Playback events
//!
//! Presentation-only records emitted alongside actions. The core never
//! waits on these; a headless consumer may drop them entirely. `kind()`
//! feeds the dispatcher's "unless already supplied" rule: engine default
//! brushes are appended only when no component emitted one of the same
//! kind.

use serde::{Deserialize, Serialize};

use crate::core::types::{Nid, Pos};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    Shake { magnitude: u8 },
    HitSound { sound: String },
    HitAnim { anim: String, pos: Pos },
    CastAnim { anim: String },
    DamageHit { attacker: Nid, defender: Nid, damage: i32 },
    DamageCrit { attacker: Nid, defender: Nid, damage: i32 },
    HealHit { unit: Nid, target: Nid, amount: i32 },
    UnitTintAdd { unit: Nid },
    CritTint { unit: Nid },
    CritVibrate { unit: Nid },
    AttackerPhase,
    DefenderPhase,
    AttackerPartnerPhase,
    DefenderPartnerPhase,
    AttackProc { unit: Nid, skill: Nid },
    DefenseProc { unit: Nid, skill: Nid },
}

/// Brush discriminant, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackKind {
    Shake,
    HitSound,
    HitAnim,
    CastAnim,
    DamageHit,
    DamageCrit,
    HealHit,
    UnitTintAdd,
    CritTint,
    CritVibrate,
    AttackerPhase,
    DefenderPhase,
    AttackerPartnerPhase,
    DefenderPartnerPhase,
    AttackProc,
    DefenseProc,
}

impl PlaybackEvent {
    pub fn kind(&self) -> PlaybackKind {
        match self {
            PlaybackEvent::Shake { .. } => PlaybackKind::Shake,
            PlaybackEvent::HitSound { .. } => PlaybackKind::HitSound,
            PlaybackEvent::HitAnim { .. } => PlaybackKind::HitAnim,
            PlaybackEvent::CastAnim { .. } => PlaybackKind::CastAnim,
            PlaybackEvent::DamageHit { .. } => PlaybackKind::DamageHit,
            PlaybackEvent::DamageCrit { .. } => PlaybackKind::DamageCrit,
            PlaybackEvent::HealHit { .. } => PlaybackKind::HealHit,
            PlaybackEvent::UnitTintAdd { .. } => PlaybackKind::UnitTintAdd,
            PlaybackEvent::CritTint { .. } => PlaybackKind::CritTint,
            PlaybackEvent::CritVibrate { .. } => PlaybackKind::CritVibrate,
            PlaybackEvent::AttackerPhase => PlaybackKind::AttackerPhase,
            PlaybackEvent::DefenderPhase => PlaybackKind::DefenderPhase,
            PlaybackEvent::AttackerPartnerPhase => PlaybackKind::AttackerPartnerPhase,
            PlaybackEvent::DefenderPartnerPhase => PlaybackKind::DefenderPartnerPhase,
            PlaybackEvent::AttackProc { .. } => PlaybackKind::AttackProc,
            PlaybackEvent::DefenseProc { .. } => PlaybackKind::DefenseProc,
        }
    }
}

/// True when some brush of `kind` is already queued
pub fn already_supplied(playback: &[PlaybackEvent], kind: PlaybackKind) -> bool {
    playback.iter().any(|p| p.kind() == kind)
}

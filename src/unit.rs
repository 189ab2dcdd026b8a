//! Units and the unit registry
//!
//! Units are owned by the session and mutated only through committed
//! `Action`s. Inventory slot 0 is the equipped slot; equipping reorders
//! the inventory rather than tracking a separate index, so "equipped"
//! survives item loss without a dangling slot.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::types::{Nid, Pos, StatId, Team};
use crate::item::ItemId;
use crate::skill::Skill;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub nid: Nid,
    pub team: Team,
    /// None while off-board (dead, rescued, not yet deployed)
    pub position: Option<Pos>,
    stats: AHashMap<StatId, i32>,
    pub hp: i32,
    /// Ordered inventory; slot 0 is equipped
    pub items: Vec<ItemId>,
    pub skills: Vec<Skill>,
    /// Tags consulted by effectiveness components (e.g. "armored", "horse")
    pub tags: AHashSet<String>,
    pub statuses: Vec<Nid>,
    pub wexp: i32,
    pub exp: i32,
    pub has_attacked: bool,
    pub finished: bool,
    /// Movement budget left this turn, spent by committed moves
    pub movement_left: i32,
    pub starting_position: Option<Pos>,
}

impl Unit {
    pub fn new(nid: impl Into<String>, team: Team) -> Self {
        Self {
            nid: Nid::new(nid),
            team,
            position: None,
            stats: AHashMap::new(),
            hp: 0,
            items: Vec::new(),
            skills: Vec::new(),
            tags: AHashSet::new(),
            statuses: Vec::new(),
            wexp: 0,
            exp: 0,
            has_attacked: false,
            finished: false,
            movement_left: 0,
            starting_position: None,
        }
    }

    pub fn with_stat(mut self, id: StatId, value: i32) -> Self {
        self.stats.insert(id, value);
        if id == StatId::Hp {
            self.hp = value;
        }
        if id == StatId::Mov {
            self.movement_left = value;
        }
        self
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.position = Some(pos);
        self.starting_position = Some(pos);
        self
    }

    pub fn with_item(mut self, item: ItemId) -> Self {
        self.items.push(item);
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.push(skill);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn stat(&self, id: StatId) -> i32 {
        self.stats.get(&id).copied().unwrap_or(0)
    }

    pub fn set_stat(&mut self, id: StatId, value: i32) {
        self.stats.insert(id, value);
    }

    pub fn max_hp(&self) -> i32 {
        self.stat(StatId::Hp)
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// The equipped item, if the unit carries anything
    pub fn equipped(&self) -> Option<ItemId> {
        self.items.first().copied()
    }

    /// Move `item` to the equipped slot; no-op if the unit doesn't carry it
    pub fn equip(&mut self, item: ItemId) {
        if let Some(idx) = self.items.iter().position(|i| *i == item) {
            let id = self.items.remove(idx);
            self.items.insert(0, id);
        }
    }

    /// Skills currently participating in dispatch
    pub fn active_skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.iter().filter(|s| s.active)
    }

    pub fn has_status(&self, status: &Nid) -> bool {
        self.statuses.contains(status)
    }
}

/// Owns every unit in the session, nid-indexed
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UnitArena {
    units: Vec<Unit>,
    #[serde(skip)]
    by_nid: AHashMap<Nid, usize>,
}

impl UnitArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, unit: Unit) {
        self.by_nid.insert(unit.nid.clone(), self.units.len());
        self.units.push(unit);
    }

    pub fn get(&self, nid: &Nid) -> Option<&Unit> {
        self.by_nid.get(nid).and_then(|&idx| self.units.get(idx))
    }

    pub fn get_mut(&mut self, nid: &Nid) -> Option<&mut Unit> {
        let idx = *self.by_nid.get(nid)?;
        self.units.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.iter_mut()
    }

    /// Rebuild the nid index, needed after deserialization
    pub fn reindex(&mut self) {
        self.by_nid = self
            .units
            .iter()
            .enumerate()
            .map(|(idx, u)| (u.nid.clone(), idx))
            .collect();
    }
}

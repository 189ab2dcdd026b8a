//! Items and the arena that owns them
//!
//! Items are identified by `ItemId` handles into the `ItemArena`. Subitems
//! (the parts of a sequence item) are arena entries of their own; the
//! `parent` field is a non-owning back-reference used when a subitem's
//! hooks must also consult the parent's components.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::components::component::Component;
use crate::core::types::Nid;

/// Handle to an item in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Authoring definition of an item; subitem definitions nest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub nid: Nid,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub subitems: Vec<ItemDef>,
}

impl ItemDef {
    pub fn new(nid: impl Into<String>, components: Vec<Component>) -> Self {
        Self {
            nid: Nid::new(nid),
            components,
            subitems: Vec::new(),
        }
    }
}

/// A live item instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub nid: Nid,
    pub components: Vec<Component>,
    /// Mutable per-instance values: remaining uses, counters
    pub data: AHashMap<String, i64>,
    pub subitems: Vec<ItemId>,
    pub parent: Option<ItemId>,
}

impl Item {
    pub fn value(&self, key: &str) -> Option<i64> {
        self.data.get(key).copied()
    }
}

/// Owns every item instance in the session
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ItemArena {
    items: Vec<Item>,
}

impl ItemArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate a definition, recursively instantiating subitems and
    /// seeding each data bag from the components' init hooks
    pub fn load(&mut self, def: &ItemDef) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        let mut data = AHashMap::new();
        for component in &def.components {
            if let Some((key, value)) = component.init() {
                data.insert(key.to_string(), value);
            }
        }
        self.items.push(Item {
            id,
            nid: def.nid.clone(),
            components: def.components.clone(),
            data,
            subitems: Vec::new(),
            parent: None,
        });
        for sub_def in &def.subitems {
            let sub_id = self.load(sub_def);
            self.items[sub_id.0 as usize].parent = Some(id);
            self.items[id.0 as usize].subitems.push(sub_id);
        }
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

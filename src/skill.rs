//! Skills carried by units
//!
//! Skills reuse the component system: a skill's components participate in
//! hook dispatch alongside the acting item's components. The `active` flag
//! gates combat arts that only apply while toggled on.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::components::component::Component;
use crate::core::types::Nid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub nid: Nid,
    pub components: Vec<Component>,
    /// Mutable per-instance values: charge counters
    pub data: AHashMap<String, i64>,
    /// Dispatch only sees active skills. `new` builds skills active;
    /// combat arts built with `inactive()` wait for activation.
    pub active: bool,
}

impl Skill {
    pub fn new(nid: impl Into<String>, components: Vec<Component>) -> Self {
        let mut data = AHashMap::new();
        for component in &components {
            if let Some((key, value)) = component.init() {
                data.insert(key.to_string(), value);
            }
        }
        Self {
            nid: Nid::new(nid),
            components,
            data,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn value(&self, key: &str) -> Option<i64> {
        self.data.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_seeds_charges() {
        let skill = Skill::new("luna", vec![Component::ChargeCost { cost: 3 }]);
        assert_eq!(skill.value("charges"), Some(3));
        assert!(skill.active);
    }
}

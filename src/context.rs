//! Battle context
//!
//! The explicit state bundle passed into the dispatcher, solver, and AI.
//! Owns the unit/item registries, equations, config, board, and the
//! combat random stream; there is no ambient global state anywhere in
//! the core, so a test can build exactly the world it needs.

use crate::board::Board;
use crate::core::config::CoreConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::{Nid, Pos};
use crate::equations::EquationRegistry;
use crate::item::{Item, ItemArena, ItemId};
use crate::rng::CombatRng;
use crate::unit::{Unit, UnitArena};

pub struct BattleContext {
    pub units: UnitArena,
    pub items: ItemArena,
    pub equations: EquationRegistry,
    pub config: CoreConfig,
    pub board: Box<dyn Board>,
    pub rng: CombatRng,
}

impl BattleContext {
    pub fn new(board: Box<dyn Board>, seed: u64) -> Self {
        Self {
            units: UnitArena::new(),
            items: ItemArena::new(),
            equations: EquationRegistry::default(),
            config: CoreConfig::default(),
            board,
            rng: CombatRng::new(seed),
        }
    }

    /// Register a unit and mirror its position into the board occupancy
    pub fn place(&mut self, unit: Unit) {
        if let Some(pos) = unit.position {
            self.board.place_unit(pos, unit.nid.clone(), unit.team);
        }
        self.units.insert(unit);
    }

    pub fn unit(&self, nid: &Nid) -> Result<&Unit> {
        self.units
            .get(nid)
            .ok_or_else(|| EngineError::UnitNotFound(nid.clone()))
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items.get(id).ok_or(EngineError::ItemNotFound(id.0))
    }

    /// The unit standing on a tile, if any
    pub fn unit_at(&self, pos: Pos) -> Option<&Unit> {
        let nid = self.board.unit_at(pos)?;
        self.units.get(nid)
    }
}

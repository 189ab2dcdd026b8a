use thiserror::Error;

use crate::core::types::Nid;

/// Engine-level errors.
///
/// Authoring mistakes (bad equations, malformed component config) fail
/// loudly at parse/load time. Runtime impossibilities such as vanished
/// targets or empty AI candidate sets are handled locally by the solver
/// and planner and never become errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown equation: {0}")]
    UnknownEquation(String),

    #[error("Equation parse error in '{name}': {message}")]
    EquationParse { name: String, message: String },

    #[error("Equation eval error in '{name}': {message}")]
    EquationEval { name: String, message: String },

    #[error("Unit not found: {0}")]
    UnitNotFound(Nid),

    #[error("Item not found: id {0}")]
    ItemNotFound(u32),

    #[error("Component config error on '{nid}': {message}")]
    ComponentConfig { nid: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Spatial-subsystem error type.

use thiserror::Error;

use tdm_core::{CoreError, LinkId, NodeId, TurnId};

/// Errors produced by `tdm-spatial`.
///
/// "No path" is not an error: [`Search::calc_path`](crate::Search::calc_path)
/// reports it as an empty link list.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("geometry at ({x}, {y}) lies outside the grid extent")]
    OutOfBounds { x: f64, y: f64 },

    #[error("object not present in the grid index")]
    ObjectNotFound,

    #[error("geometry is empty or degenerate: {0}")]
    EmptyGeometry(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("links {from} and {to} do not meet at a common node")]
    InvalidTurn { from: LinkId, to: LinkId },

    #[error("link {link} has negative cost {cost}")]
    NegativeCost { link: LinkId, cost: f64 },

    #[error("turn {turn} has negative cost {cost}")]
    NegativeTurnCost { turn: TurnId, cost: f64 },

    #[error("node {0} not found in network")]
    NodeNotFound(NodeId),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type SpatialResult<T> = Result<T, SpatialError>;

//! Errors returned by world mutations.

use outpost_logic::geometry::TilePos;
use thiserror::Error;

/// Why a build-tool request was refused. None of these are fatal; callers
/// usually log and move on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("tile {0} is outside the world")]
    OutOfBounds(TilePos),
    #[error("{addition} cannot be placed on {pos}")]
    ConditionsNotMet { pos: TilePos, addition: &'static str },
    #[error("tile {0} already holds an addition")]
    Occupied(TilePos),
}

//! Storage index - built item containers that haul jobs can deliver to.

use outpost_logic::geometry::TilePos;
use outpost_logic::items::ItemStack;

use crate::components::TileGrid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageIndex {
    /// Container positions in registration order.
    containers: Vec<TilePos>,
}

impl StorageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a finished container. A second registration is rejected.
    pub fn register(&mut self, pos: TilePos) -> bool {
        if self.containers.contains(&pos) {
            log::error!("container at {} is already registered", pos);
            return false;
        }
        log::debug!("container registered at {}", pos);
        self.containers.push(pos);
        true
    }

    pub fn unregister(&mut self, pos: TilePos) -> bool {
        let before = self.containers.len();
        self.containers.retain(|p| *p != pos);
        self.containers.len() != before
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.containers.contains(&pos)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TilePos> + '_ {
        self.containers.iter().copied()
    }

    /// The closest container that can take all of `stack`. Ties go to the
    /// earlier registration.
    pub fn find_container_for(&self, grid: &TileGrid, stack: &ItemStack, origin: TilePos) -> Option<TilePos> {
        self.containers
            .iter()
            .copied()
            .filter(|&pos| {
                grid.get(pos)
                    .and_then(|t| t.addition())
                    .and_then(|a| a.container())
                    .map(|c| c.can_accept(stack))
                    .unwrap_or(false)
            })
            .min_by_key(|pos| pos.distance_squared(origin))
    }
}

//! Tile-grid geometry: integer tile coordinates, neighbourhoods and step
//! distances.
//!
//! Every other module addresses the world through [`TilePos`]. The world is
//! a dense `width × height` rectangle with `(0, 0)` in the south-west corner;
//! north is `+y`, east is `+x`.

use serde::{Deserialize, Serialize};

/// Integer tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile one step in `dir`.
    pub fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }

    /// Straight-line distance, used both as the A* heuristic and for the
    /// "close enough to work" radius.
    pub fn distance(self, other: Self) -> f32 {
        (self.distance_squared(other) as f32).sqrt()
    }

    /// Cost multiplier of a single step between two neighbouring tiles:
    /// 1 for orthogonal, √2 for diagonal, Euclidean otherwise.
    pub fn step_distance(self, other: Self) -> f32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        match (dx, dy) {
            (0, 1) | (1, 0) => 1.0,
            (1, 1) => std::f32::consts::SQRT_2,
            _ => self.distance(other),
        }
    }

    pub fn is_diagonal_to(self, other: Self) -> bool {
        (self.x - other.x).abs() == 1 && (self.y - other.y).abs() == 1
    }

    /// Orthogonal neighbours in N, S, E, W order (the order flood fills use).
    pub fn neighbours4(self) -> [TilePos; 4] {
        [
            self.step(Direction::North),
            self.step(Direction::South),
            self.step(Direction::East),
            self.step(Direction::West),
        ]
    }

    /// All eight neighbours: the orthogonal four first, then the diagonals.
    pub fn neighbours8(self) -> [TilePos; 8] {
        [
            self.step(Direction::North),
            self.step(Direction::South),
            self.step(Direction::East),
            self.step(Direction::West),
            self.offset(1, 1),
            self.offset(1, -1),
            self.offset(-1, 1),
            self.offset(-1, -1),
        ]
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Room recomputation order after a tile starts defining a border.
    pub const CLOCKWISE: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::East => (1, 0),
            Direction::South => (0, -1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }
}

/// Dense rectangular bounds `[0, width) × [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub width: i32,
    pub height: i32,
}

impl GridBounds {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Row-major index of an in-bounds position.
    pub fn index(&self, pos: TilePos) -> Option<usize> {
        if self.contains(pos) {
            Some((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    pub fn pos_of(&self, index: usize) -> TilePos {
        let i = index as i32;
        TilePos::new(i % self.width, i / self.width)
    }

    pub fn len(&self) -> usize {
        (self.width.max(0) * self.height.max(0)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn center(&self) -> TilePos {
        TilePos::new(self.width / 2, self.height / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_distance() {
        let a = TilePos::new(3, 3);
        assert_eq!(a.step_distance(TilePos::new(3, 4)), 1.0);
        assert!((a.step_distance(TilePos::new(4, 4)) - 1.414_213_5).abs() < 1e-5);
        assert!((a.step_distance(TilePos::new(6, 7)) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_neighbours_are_unique() {
        let n = TilePos::new(0, 0).neighbours8();
        for (i, a) in n.iter().enumerate() {
            for b in &n[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert!(n[..4].iter().all(|p| !p.is_diagonal_to(TilePos::new(0, 0))));
        assert!(n[4..].iter().all(|p| p.is_diagonal_to(TilePos::new(0, 0))));
    }

    #[test]
    fn test_bounds_index_roundtrip() {
        let b = GridBounds::new(7, 5);
        assert!(!b.contains(TilePos::new(7, 0)));
        assert!(!b.contains(TilePos::new(-1, 2)));
        let p = TilePos::new(4, 3);
        assert_eq!(b.pos_of(b.index(p).unwrap()), p);
        assert_eq!(b.len(), 35);
    }

    #[test]
    fn test_clockwise_order_starts_north() {
        assert_eq!(Direction::CLOCKWISE[0], Direction::North);
        assert_eq!(Direction::North.opposite(), Direction::South);
    }
}

//! Character components.
//!
//! A character is a `hecs` entity carrying [`Pawn`], [`Stats`],
//! [`JobPriorities`] and, while picked in the UI, [`Selected`].

use outpost_logic::geometry::TilePos;
use outpost_logic::items::ItemStack;
use outpost_logic::pathfinding::TilePath;

pub use outpost_logic::skills::Stats;

use super::job::{JobId, JobKind};

/// Position, current job and path of a character.
///
/// The character stands between `curr` and `next`, `progress` of the way
/// towards `next`.
#[derive(Debug, Clone)]
pub struct Pawn {
    pub curr: TilePos,
    pub next: TilePos,
    pub progress: f32,
    /// Where the current job wants the pawn. Equals `curr` when idle.
    pub dest: TilePos,
    pub job: Option<JobId>,
    /// Close enough to the job to work on it.
    pub job_reached: bool,
    /// Cleared whenever `dest` changes.
    pub path: Option<TilePath>,
    /// Stack carried for a haul.
    pub held_item: Option<ItemStack>,
}

impl Pawn {
    pub fn new(pos: TilePos) -> Self {
        Self {
            curr: pos,
            next: pos,
            progress: 0.0,
            dest: pos,
            job: None,
            job_reached: false,
            path: None,
            held_item: None,
        }
    }

    /// Interpolated position.
    pub fn position(&self) -> (f32, f32) {
        let x = self.curr.x as f32 + (self.next.x - self.curr.x) as f32 * self.progress;
        let y = self.curr.y as f32 + (self.next.y - self.curr.y) as f32 * self.progress;
        (x, y)
    }

    pub fn is_idle(&self) -> bool {
        self.job.is_none()
    }
}

/// Order in which a character polls the job sub-queues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPriorities(pub Vec<JobKind>);

impl JobPriorities {
    /// Append a newly discovered queue unless already listed.
    pub fn learn(&mut self, kind: JobKind) {
        if !self.0.contains(&kind) {
            self.0.push(kind);
        }
    }

    pub fn as_slice(&self) -> &[JobKind] {
        &self.0
    }
}

/// Marker for the character picked in the UI.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selected;

//! Systems - logic that operates on the world's tiles, rooms and characters
//!
//! Bookkeeping structures (rooms, navigation graph, job queue, storage index)
//! live here next to the per-tick systems that drive them.

mod additions;
mod characters;
mod job_queue;
mod navigation;
mod rooms;
mod storage;

pub use additions::*;
pub use characters::*;
pub use job_queue::*;
pub use navigation::*;
pub use rooms::*;
pub use storage::*;

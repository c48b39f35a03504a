//! Job queue - one FIFO sub-queue per job kind, with lazy deletion.
//!
//! The queue owns every live job (queued or assigned) in an id-keyed arena.
//! Sub-queues only hold ids. Deleting a queued job does not scan the
//! sub-queue: the id goes into that sub-queue's deprecated set and is
//! discarded when it reaches the front.
//!
//! Sub-queues are created the first time a job of their kind is enqueued;
//! [`JobQueue::enqueue`] reports that so characters can extend their
//! priority lists.

use std::collections::{HashMap, HashSet, VecDeque};

use outpost_logic::geometry::TilePos;

use crate::components::{Job, JobId, JobKind, JobTask};

#[derive(Debug, Clone, Default)]
struct SubQueue {
    queue: VecDeque<JobId>,
    deprecated: HashSet<JobId>,
}

impl SubQueue {
    fn holds(&self, id: JobId) -> bool {
        !self.deprecated.contains(&id) && self.queue.contains(&id)
    }

    /// Whether `id` occupies a slot, live or marked.
    fn occupies(&self, id: JobId) -> bool {
        self.queue.contains(&id)
    }
}

/// What happened to an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Queued; `discovered` is set when this created the kind's sub-queue.
    Queued { discovered: bool },
    /// Already waiting in its sub-queue.
    Duplicate,
    /// Unknown id, or a kind that is never queued.
    Rejected,
}

#[derive(Debug, Clone, Default)]
pub struct JobQueue {
    jobs: HashMap<JobId, Job>,
    queues: HashMap<JobKind, SubQueue>,
    /// Sub-queue kinds in discovery order.
    discovered: Vec<JobKind>,
    next_id: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in the arena without queueing it.
    pub(crate) fn create(&mut self, destination: TilePos, task: JobTask, subject: impl Into<String>) -> JobId {
        let id = JobId(self.next_id);
        self.next_id += 1;
        self.jobs.insert(id, Job::new(id, destination, task, subject));
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.get_mut(&id)
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.contains_key(&id)
    }

    /// Live jobs, queued or assigned.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Drop a job from the arena. Callers mark it deprecated first if it may
    /// still sit in a sub-queue.
    pub(crate) fn remove(&mut self, id: JobId) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// Kinds with a sub-queue, in discovery order.
    pub fn known_queues(&self) -> &[JobKind] {
        &self.discovered
    }

    /// Create an empty sub-queue for `kind` (save loading). Returns false if
    /// it already existed or `kind` is never queued.
    pub(crate) fn restore_queue(&mut self, kind: JobKind) -> bool {
        if !kind.is_queued() || self.queues.contains_key(&kind) {
            return false;
        }
        self.queues.insert(kind, SubQueue::default());
        self.discovered.push(kind);
        true
    }

    pub fn enqueue(&mut self, id: JobId) -> Enqueued {
        let Some(kind) = self.jobs.get(&id).map(Job::kind) else {
            log::warn!("enqueue of unknown {}", id);
            return Enqueued::Rejected;
        };
        if !kind.is_queued() {
            log::debug!("{} jobs are not queued", kind);
            return Enqueued::Rejected;
        }

        let discovered = !self.queues.contains_key(&kind);
        if discovered {
            self.discovered.push(kind);
            log::info!("job queue discovered: {}", kind);
        }
        let sub = self.queues.entry(kind).or_default();
        if sub.holds(id) {
            log::error!("{} is already queued", id);
            return Enqueued::Duplicate;
        }
        // A marked id still has its slot; reviving it keeps one copy per id
        if sub.deprecated.remove(&id) && sub.occupies(id) {
            log::debug!("{} revived in place", id);
        } else {
            sub.queue.push_back(id);
        }
        Enqueued::Queued { discovered }
    }

    /// Pop the first live job, polling sub-queues in `priorities` order.
    ///
    /// A priority naming a kind without a sub-queue ends the request with no
    /// job: the list was edited rather than reordered.
    pub fn request(&mut self, priorities: &[JobKind]) -> Option<JobId> {
        for kind in priorities {
            let Some(sub) = self.queues.get_mut(kind) else {
                log::info!("no job queue for priority {}; priority list was edited", kind);
                return None;
            };
            while let Some(id) = sub.queue.pop_front() {
                if sub.deprecated.remove(&id) {
                    log::debug!("skipping deleted {}", id);
                    continue;
                }
                if !self.jobs.contains_key(&id) {
                    log::debug!("skipping stale {}", id);
                    continue;
                }
                return Some(id);
            }
        }
        None
    }

    /// Mark a queued job as deleted. Jobs with no slot in a sub-queue need
    /// no marker; returns whether one was recorded.
    pub(crate) fn mark_deprecated(&mut self, id: JobId) -> bool {
        let Some(kind) = self.jobs.get(&id).map(Job::kind) else {
            return false;
        };
        match self.queues.get_mut(&kind) {
            Some(sub) if sub.occupies(id) => sub.deprecated.insert(id),
            _ => false,
        }
    }

    /// Whether the job is waiting in its sub-queue.
    pub fn is_queued(&self, id: JobId) -> bool {
        let Some(kind) = self.jobs.get(&id).map(Job::kind) else {
            return false;
        };
        self.queues.get(&kind).map(|s| s.holds(id)).unwrap_or(false)
    }

    /// Live jobs waiting in the `kind` sub-queue, front first.
    pub fn queued(&self, kind: JobKind) -> Vec<JobId> {
        self.queues
            .get(&kind)
            .map(|s| {
                s.queue
                    .iter()
                    .filter(|id| !s.deprecated.contains(id) && self.jobs.contains_key(id))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn queued_len(&self, kind: JobKind) -> usize {
        self.queued(kind).len()
    }

    /// Deleted jobs still waiting to be skipped.
    pub fn deprecated_len(&self, kind: JobKind) -> usize {
        self.queues.get(&kind).map(|s| s.deprecated.len()).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }
}

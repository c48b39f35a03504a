//! Job lifecycle: creation, queueing, assignment, work and teardown.
//!
//! A job ends in exactly one of two ways. Completion removes it after its
//! work is done. Deletion removes it and undoes what it was attached to: an
//! unfinished addition is taken off its tile, a harvest is offered again
//! after a delay, a carried stack is put down. Cancellation is not an ending; the job goes
//! back to its queue, except for a haul whose stack was already picked up,
//! which is deleted and replaced by a haul from wherever the stack now lies.

use hecs::Entity;
use rand::Rng;

use outpost_logic::geometry::TilePos;
use outpost_logic::items::{Item, ItemStack};
use outpost_logic::skills::SkillType;

use super::World;
use crate::components::{Addition, AdditionKind, Crop, Job, JobId, JobPriorities, JobTask, Pawn};
use crate::error::BuildError;
use crate::events::SimEvent;
use crate::systems::Enqueued;

impl World {
    /// Register a job and attach it to its destination tile. Not queued yet.
    pub(crate) fn create_job(&mut self, destination: TilePos, task: JobTask, subject: impl Into<String>) -> JobId {
        let id = self.jobs.create(destination, task, subject);
        if let Some(tile) = self.grid.get_mut(destination) {
            tile.add_job(id);
        }
        id
    }

    /// Offer a job to its kind's queue. The first job of a kind creates the
    /// queue and every character learns about it.
    pub fn enqueue_job(&mut self, id: JobId) -> bool {
        let Some(kind) = self.jobs.get(id).map(Job::kind) else {
            return false;
        };
        match self.jobs.enqueue(id) {
            Enqueued::Queued { discovered } => {
                if discovered {
                    for &character in &self.characters {
                        if let Ok(mut priorities) = self.ecs.get::<&mut JobPriorities>(character) {
                            priorities.learn(kind);
                        }
                    }
                    self.emit(SimEvent::JobQueueDiscovered(kind));
                }
                self.emit(SimEvent::JobEnqueued { job: id, kind });
                true
            }
            Enqueued::Duplicate | Enqueued::Rejected => false,
        }
    }

    /// Build-tool entry point: place an unbuilt `kind` on `pos` and queue
    /// the job that finishes it.
    pub fn build(&mut self, pos: TilePos, kind: AdditionKind) -> Result<JobId, BuildError> {
        let tile = self.grid.get(pos).ok_or(BuildError::OutOfBounds(pos))?;
        if kind.needs_clear_tile() && tile.addition().is_some() {
            log::debug!("{} refused on {}: tile occupied", kind, pos);
            return Err(BuildError::Occupied(pos));
        }
        let addition = Addition::new(kind, &self.config);
        self.install_addition(pos, addition, false, false)?;

        let uid = self
            .grid
            .get(pos)
            .and_then(|t| t.addition())
            .map(Addition::uid)
            .unwrap_or_default();
        let task = if kind.is_plant() {
            JobTask::Plant { addition: uid }
        } else {
            JobTask::Construction { addition: uid }
        };
        let id = self.create_job(pos, task, kind.name());
        self.enqueue_job(id);
        Ok(id)
    }

    /// Jobs whose current destination is `pos`.
    pub fn jobs_at(&self, pos: TilePos) -> Vec<JobId> {
        self.grid.get(pos).map(|t| t.jobs().to_vec()).unwrap_or_default()
    }

    pub fn job_title(&self, id: JobId) -> Option<String> {
        self.jobs.get(id).map(Job::title)
    }

    pub fn job_skill(&self, id: JobId) -> Option<SkillType> {
        self.jobs.get(id).map(Job::skill)
    }

    pub(crate) fn assign_job(&mut self, character: Entity, id: JobId) {
        let Some(destination) = self.jobs.get(id).map(Job::destination) else {
            return;
        };
        self.with_pawn(character, |pawn| {
            pawn.job = Some(id);
            pawn.dest = destination;
            pawn.path = None;
            pawn.job_reached = false;
        });
        log::debug!("{} assigned to {:?}", id, character);
        self.emit(SimEvent::JobAssigned { job: id, character });
    }

    /// Detach `id` from whoever holds it; that character goes idle.
    fn release_assignment(&mut self, id: JobId) -> Option<Entity> {
        let character = self.assignee(id)?;
        self.with_pawn(character, |pawn| {
            pawn.job = None;
            pawn.job_reached = false;
            pawn.path = None;
            pawn.dest = pawn.curr;
        });
        Some(character)
    }

    /// Force `character` onto `id`. Its current job goes back to the queue
    /// and a previous holder of `id` goes idle.
    pub fn override_job(&mut self, character: Entity, id: JobId) -> bool {
        if !self.characters.contains(&character) || !self.jobs.contains(id) {
            return false;
        }
        let current = self.pawn(character).and_then(|p| p.job);
        if current == Some(id) {
            return true;
        }
        self.jobs.mark_deprecated(id);
        self.release_assignment(id);
        if let Some(current) = current {
            log::debug!("requeueing {} for override", current);
            self.cancel_job(current);
        }
        self.assign_job(character, id);
        true
    }

    /// Send `character` to `pos` with an unqueued movement job.
    pub fn move_character_to(&mut self, character: Entity, pos: TilePos) -> Option<JobId> {
        if !self.grid.contains(pos) || !self.characters.contains(&character) {
            return None;
        }
        let id = self.create_job(pos, JobTask::Movement, "");
        if self.override_job(character, id) {
            Some(id)
        } else {
            self.delete_job(id);
            None
        }
    }

    pub fn complete_job(&mut self, id: JobId) -> bool {
        let Some(kind) = self.jobs.get(id).map(Job::kind) else {
            return false;
        };
        self.jobs.mark_deprecated(id);
        let Some(job) = self.jobs.remove(id) else {
            return false;
        };
        if let Some(tile) = self.grid.get_mut(job.destination()) {
            tile.remove_job(id);
        }
        self.release_assignment(id);
        log::debug!("{} completed", id);
        self.emit(SimEvent::JobCompleted { job: id, kind });
        true
    }

    /// Put a job back in circulation.
    pub fn cancel_job(&mut self, id: JobId) -> bool {
        let Some((kind, carrier)) = self.jobs.get(id).map(|j| (j.kind(), j.carrier())) else {
            return false;
        };
        if !kind.is_queued() {
            return self.delete_job(id);
        }
        if let Some(carrier) = carrier {
            self.emit(SimEvent::JobCancelled { job: id, kind });
            let dropped_at = self.drop_carried(carrier);
            self.delete_job(id);
            for pos in dropped_at {
                self.request_haul(pos);
            }
            return true;
        }
        if self.jobs.is_queued(id) {
            return true;
        }
        self.release_assignment(id);
        self.emit(SimEvent::JobCancelled { job: id, kind });
        self.enqueue_job(id)
    }

    /// End a job for good and undo what it was attached to.
    pub fn delete_job(&mut self, id: JobId) -> bool {
        let Some(job) = self.jobs.get(id).cloned() else {
            return false;
        };
        self.jobs.mark_deprecated(id);
        self.jobs.remove(id);
        let pos = job.destination();
        if let Some(tile) = self.grid.get_mut(pos) {
            tile.remove_job(id);
        }
        self.release_assignment(id);

        match *job.task() {
            JobTask::Construction { addition } | JobTask::Plant { addition } => {
                let unfinished = self
                    .grid
                    .get(pos)
                    .and_then(|t| t.addition())
                    .map(|a| a.uid() == addition && !a.is_built())
                    .unwrap_or(false);
                if unfinished {
                    log::debug!("{} deleted, removing unfinished addition on {}", id, pos);
                    self.remove_addition(pos);
                }
            }
            JobTask::Harvest { addition } => {
                // The plant offers a fresh harvest once its cooldown runs out
                let plant = self
                    .grid
                    .get_mut(pos)
                    .and_then(|t| t.addition.as_mut())
                    .filter(|a| a.uid() == addition)
                    .and_then(|a| a.plant_mut());
                if let Some(plant) = plant {
                    plant.harvest_queued = false;
                    plant.harvest_cooldown = plant.harvest_retry_delay;
                }
            }
            JobTask::Haul {
                carrier: Some(carrier),
                ..
            } => {
                self.drop_carried(carrier);
            }
            JobTask::Haul { carrier: None, .. } | JobTask::Movement => {}
        }

        log::debug!("{} deleted", id);
        self.emit(SimEvent::JobDeleted {
            job: id,
            kind: job.kind(),
        });
        true
    }

    /// Return every assigned job to its queue (before saving).
    pub fn cancel_active_jobs(&mut self) {
        let active: Vec<JobId> = self
            .characters
            .iter()
            .filter_map(|&c| self.ecs.get::<&Pawn>(c).ok().and_then(|p| p.job))
            .collect();
        for id in active {
            self.cancel_job(id);
        }
    }

    /// Put down whatever `character` carries, on its current tile or the
    /// closest ones that take it. Returns the tiles that received items.
    fn drop_carried(&mut self, character: Entity) -> Vec<TilePos> {
        let Some((Some(stack), pos)) = self.with_pawn(character, |pawn| (pawn.held_item.take(), pawn.curr)) else {
            return Vec::new();
        };
        self.put_down_near(pos, stack)
    }

    /// Spread `stack` over floor tiles in rings around `origin`, skipping
    /// containers and tiles holding another item type.
    fn put_down_near(&mut self, origin: TilePos, stack: ItemStack) -> Vec<TilePos> {
        let bounds = self.bounds();
        let reach = bounds.width.max(bounds.height);
        let mut left = Some(stack);
        let mut used = Vec::new();
        for r in 0..=reach {
            for dy in -r..=r {
                for dx in -r..=r {
                    if dx.abs().max(dy.abs()) != r {
                        continue;
                    }
                    let Some(stack) = left.take() else {
                        return used;
                    };
                    let pos = origin.offset(dx, dy);
                    let fits = self
                        .grid
                        .get(pos)
                        .map(|t| {
                            t.can_hold_item()
                                && t.addition().and_then(|a| a.container()).is_none()
                                && t.item_stack().map_or(true, |s| s.item_type() == stack.item_type())
                        })
                        .unwrap_or(false);
                    if !fits {
                        left = Some(stack);
                        continue;
                    }
                    let before = stack.count();
                    left = self.add_item_stack(pos, stack);
                    if left.as_ref().map_or(true, |rest| rest.count() < before) {
                        used.push(pos);
                    }
                }
            }
        }
        if let Some(rest) = left {
            log::warn!("no room for {} x{} near {}, lost", rest.item_type(), rest.count(), origin);
        }
        used
    }

    fn change_job_destination(&mut self, id: JobId, to: TilePos) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };
        let from = job.destination;
        job.destination = to;
        if let Some(tile) = self.grid.get_mut(from) {
            tile.remove_job(id);
        }
        if let Some(tile) = self.grid.get_mut(to) {
            tile.add_job(id);
        }
        if let Some(character) = self.assignee(id) {
            self.with_pawn(character, |pawn| {
                pawn.dest = to;
                pawn.path = None;
                pawn.job_reached = false;
            });
        }
        self.emit(SimEvent::JobDestinationChanged { job: id, from, to });
    }

    /// Queue the harvest of the grown plant on `pos`.
    pub(crate) fn queue_harvest(&mut self, pos: TilePos) -> Option<JobId> {
        let (uid, name) = self
            .grid
            .get(pos)
            .and_then(|t| t.addition())
            .filter(|a| a.plant().is_some())
            .map(|a| (a.uid(), a.name()))?;
        let id = self.create_job(pos, JobTask::Harvest { addition: uid }, name);
        self.enqueue_job(id);
        Some(id)
    }

    /// Apply `amount` of work from `character` to `id`.
    pub(crate) fn do_job_work(&mut self, character: Entity, id: JobId, amount: f32) {
        let Some((pos, task)) = self.jobs.get(id).map(|j| (j.destination(), j.task().clone())) else {
            return;
        };
        match task {
            JobTask::Construction { addition } | JobTask::Plant { addition } => {
                match self.work_addition(pos, addition, amount) {
                    Some(true) => {
                        self.complete_job(id);
                    }
                    Some(false) => {}
                    None => {
                        log::debug!("{} lost its addition on {}", id, pos);
                        self.delete_job(id);
                    }
                }
            }
            JobTask::Harvest { addition } => {
                let harvested = self
                    .grid
                    .get_mut(pos)
                    .and_then(|t| t.addition.as_mut())
                    .filter(|a| a.uid() == addition)
                    .map(|a| a.harvest_work(amount));
                match harvested {
                    Some(total) if total >= 1.0 => {
                        self.complete_job(id);
                        self.finish_harvest(pos);
                    }
                    Some(_) => {}
                    None => {
                        self.delete_job(id);
                    }
                }
            }
            JobTask::Haul { dropoff, carrier: None } => self.pick_up(character, id, pos, dropoff),
            JobTask::Haul { carrier: Some(_), .. } => self.drop_off(character, id, pos),
            JobTask::Movement => {
                self.complete_job(id);
            }
        }
    }

    /// Construction work on the addition `uid` at `pos`. `None` if it is
    /// gone, otherwise whether it is finished.
    fn work_addition(&mut self, pos: TilePos, uid: u64, amount: f32) -> Option<bool> {
        let addition = self
            .grid
            .get_mut(pos)?
            .addition
            .as_mut()
            .filter(|a| a.uid() == uid)?;
        if addition.is_built() {
            return Some(true);
        }
        let finished = addition.do_work(amount);
        let render_state = addition.render_state();
        self.emit(SimEvent::AdditionWorkDone { pos, render_state });
        if finished {
            self.on_addition_built(pos);
        }
        Some(finished)
    }

    fn on_addition_built(&mut self, pos: TilePos) {
        let Some(addition) = self.grid.get(pos).and_then(|t| t.addition()) else {
            return;
        };
        let kind = addition.kind();
        let multiplier = addition.movement_cost_multiplier();
        log::debug!("{} on {} finished", kind, pos);
        if multiplier != 1.0 {
            self.navigation.invalidate();
        }
        if kind == AdditionKind::ItemContainer {
            self.storage.register(pos);
        }
        self.emit(SimEvent::AdditionBuilt { pos, kind });
        self.refresh_border(pos);
    }

    /// Reset a harvested plant, queue its replanting and drop its yield.
    fn finish_harvest(&mut self, pos: TilePos) {
        let Some(addition) = self.grid.get_mut(pos).and_then(|t| t.addition.as_mut()) else {
            return;
        };
        let Some(crop) = addition.plant().map(|p| p.crop) else {
            return;
        };
        addition.reset_build();
        let uid = addition.uid();
        let name = addition.name();
        let render_state = addition.render_state();
        self.emit(SimEvent::AdditionWorkDone { pos, render_state });
        self.navigation.invalidate();

        let replant = self.create_job(pos, JobTask::Plant { addition: uid }, name);
        self.enqueue_job(replant);

        let crop_config = match crop {
            Crop::Tomato => self.config.tomato,
        };
        let (lo, hi) = (
            crop_config.min_yield.min(crop_config.max_yield),
            crop_config.min_yield.max(crop_config.max_yield),
        );
        let count = self.rng.gen_range(lo..=hi);
        if count == 0 {
            log::debug!("{} on {} yielded nothing", name, pos);
            return;
        }
        let item = Item::new(crop.name(), crop_config.max_stack_size);
        if count > item.max_stack_size {
            log::info!(
                "{} yield of {} exceeds stack size {}, {} lost",
                name,
                count,
                item.max_stack_size,
                count - item.max_stack_size
            );
        }
        let stack = ItemStack::with_count(&item, count);
        if let Some(rest) = self.add_item_stack(pos, stack) {
            log::info!("{} x{} did not fit on {}, lost", rest.item_type(), rest.count(), pos);
        }
        if !self.storage.is_empty() {
            self.request_haul(pos);
        }
    }

    fn pick_up(&mut self, character: Entity, id: JobId, pos: TilePos, dropoff: TilePos) {
        let Some(stack) = self.take_item_stack(pos) else {
            log::debug!("{}: nothing left to haul on {}", id, pos);
            self.delete_job(id);
            return;
        };
        self.with_pawn(character, |pawn| pawn.held_item = Some(stack));
        if let Some(job) = self.jobs.get_mut(id) {
            job.task = JobTask::Haul {
                dropoff,
                carrier: Some(character),
            };
        }
        self.change_job_destination(id, dropoff);
    }

    fn drop_off(&mut self, character: Entity, id: JobId, pos: TilePos) {
        let held = self.with_pawn(character, |pawn| pawn.held_item.take()).flatten();
        let Some(stack) = held else {
            log::warn!("{}: carrier {:?} holds nothing", id, character);
            self.delete_job(id);
            return;
        };
        let Some(rest) = self.add_item_stack(pos, stack) else {
            self.complete_job(id);
            return;
        };
        // The container filled up on the way; carry the rest on
        if let Some(next) = self.storage.find_container_for(&self.grid, &rest, pos) {
            log::debug!("{}: {} x{} did not fit on {}, moving on to {}", id, rest.item_type(), rest.count(), pos, next);
            self.with_pawn(character, |pawn| pawn.held_item = Some(rest));
            self.change_job_destination(id, next);
            return;
        }
        log::info!("{}: no container takes {} x{}, leaving it near {}", id, rest.item_type(), rest.count(), pos);
        self.put_down_near(pos, rest);
        self.complete_job(id);
    }
}

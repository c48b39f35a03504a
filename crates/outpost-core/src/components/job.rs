//! Jobs: units of assignable work with a destination tile.

use hecs::Entity;
use serde::{Deserialize, Serialize};

use outpost_logic::geometry::TilePos;
use outpost_logic::skills::SkillType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Job type tag. Each kind has its own FIFO sub-queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobKind {
    Construction,
    Plant,
    Harvest,
    Haul,
    Movement,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Construction,
        JobKind::Plant,
        JobKind::Harvest,
        JobKind::Haul,
        JobKind::Movement,
    ];

    /// Queue key shown in priority lists.
    pub fn description(self) -> &'static str {
        match self {
            JobKind::Construction => "Construction",
            JobKind::Plant => "Plant",
            JobKind::Harvest => "Harvest",
            JobKind::Haul => "Haul",
            JobKind::Movement => "Movement",
        }
    }

    pub fn skill(self) -> SkillType {
        match self {
            JobKind::Construction => SkillType::Construction,
            JobKind::Plant => SkillType::Planting,
            JobKind::Harvest => SkillType::Harvesting,
            JobKind::Haul | JobKind::Movement => SkillType::Speed,
        }
    }

    /// Hauling and plain movement need the pawn on the tile itself; the rest
    /// can be worked from nearby.
    pub fn stand_on_destination(self) -> bool {
        matches!(self, JobKind::Haul | JobKind::Movement)
    }

    /// Movement jobs are handed straight to a pawn.
    pub fn is_queued(self) -> bool {
        self != JobKind::Movement
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobTask {
    /// Build the addition with this uid.
    Construction { addition: u64 },
    /// Plant the crop addition with this uid.
    Plant { addition: u64 },
    /// Harvest the grown plant with this uid.
    Harvest { addition: u64 },
    /// Carry the stack on the destination tile to `dropoff`. Once picked up
    /// the destination becomes `dropoff` and `carrier` is set.
    Haul {
        dropoff: TilePos,
        carrier: Option<Entity>,
    },
    Movement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    id: JobId,
    pub(crate) destination: TilePos,
    pub(crate) task: JobTask,
    /// Addition or item name used in the title.
    subject: String,
}

impl Job {
    pub(crate) fn new(id: JobId, destination: TilePos, task: JobTask, subject: impl Into<String>) -> Self {
        Self {
            id,
            destination,
            task,
            subject: subject.into(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn kind(&self) -> JobKind {
        match self.task {
            JobTask::Construction { .. } => JobKind::Construction,
            JobTask::Plant { .. } => JobKind::Plant,
            JobTask::Harvest { .. } => JobKind::Harvest,
            JobTask::Haul { .. } => JobKind::Haul,
            JobTask::Movement => JobKind::Movement,
        }
    }

    pub fn destination(&self) -> TilePos {
        self.destination
    }

    pub fn task(&self) -> &JobTask {
        &self.task
    }

    /// Addition or item name the job is about.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn stand_on_destination(&self) -> bool {
        self.kind().stand_on_destination()
    }

    pub fn skill(&self) -> SkillType {
        self.kind().skill()
    }

    /// The addition this job works on, if any.
    pub fn addition_uid(&self) -> Option<u64> {
        match self.task {
            JobTask::Construction { addition }
            | JobTask::Plant { addition }
            | JobTask::Harvest { addition } => Some(addition),
            _ => None,
        }
    }

    /// The pawn carrying this haul's stack, once picked up.
    pub fn carrier(&self) -> Option<Entity> {
        match self.task {
            JobTask::Haul { carrier, .. } => carrier,
            _ => None,
        }
    }

    pub fn title(&self) -> String {
        match &self.task {
            JobTask::Construction { .. } => format!("Constructing {}", self.subject),
            JobTask::Plant { .. } => format!("Planting {}", self.subject),
            JobTask::Harvest { .. } => format!("Harvesting {}", self.subject),
            JobTask::Haul { dropoff, .. } => format!("Hauling {} to {}", self.subject, dropoff),
            JobTask::Movement => format!("Move to {}", self.destination),
        }
    }
}

//! Tile additions: walls, doors, soil, plants, generators and containers.
//!
//! An [`Addition`] is owned by exactly one tile. The common part (build
//! percentage, progress, costs) lives on the struct; variant data lives in
//! [`AdditionState`]. Behaviour that needs the rest of the world (door air
//! exchange, plant harvest jobs, generator output) is driven by
//! `systems::additions`; this module only holds the per-addition state
//! machine.

use serde::{Deserialize, Serialize};

use outpost_logic::config::SimConfig;
use outpost_logic::constants::{construction_cost, movement_cost, names, DOOR_STAGE_THRESHOLDS};
use outpost_logic::geometry::TilePos;
use outpost_logic::items::ItemStack;

/// Build percentage within this distance of 1 counts as finished, so a run of
/// fractional work amounts that sums to the cost always completes.
const BUILD_EPSILON: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Crop {
    Tomato,
}

impl Crop {
    pub fn name(self) -> &'static str {
        match self {
            Crop::Tomato => names::TOMATO,
        }
    }
}

/// Addition type tag, used for room indexes and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdditionKind {
    Wall,
    Door,
    Soil,
    Plant(Crop),
    OxygenGenerator,
    ItemContainer,
}

impl AdditionKind {
    pub const ALL: [AdditionKind; 6] = [
        AdditionKind::Wall,
        AdditionKind::Door,
        AdditionKind::Soil,
        AdditionKind::Plant(Crop::Tomato),
        AdditionKind::OxygenGenerator,
        AdditionKind::ItemContainer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AdditionKind::Wall => names::WALL,
            AdditionKind::Door => names::DOOR,
            AdditionKind::Soil => names::SOIL,
            AdditionKind::Plant(crop) => crop.name(),
            AdditionKind::OxygenGenerator => names::OXYGEN_GENERATOR,
            AdditionKind::ItemContainer => names::ITEM_CONTAINER,
        }
    }

    pub fn is_plant(self) -> bool {
        matches!(self, AdditionKind::Plant(_))
    }

    /// Kinds that may only be placed on a tile with no addition.
    pub fn needs_clear_tile(self) -> bool {
        matches!(
            self,
            AdditionKind::Wall
                | AdditionKind::Soil
                | AdditionKind::OxygenGenerator
                | AdditionKind::ItemContainer
        )
    }
}

impl std::fmt::Display for AdditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorState {
    pub open_speed: f32,
    pub linger_seconds: f32,
    /// Someone asked to pass since the door last finished opening.
    pub entering: bool,
    /// Seconds left before a fully opened door may start closing.
    pub open_timer: f32,
    /// The two tiles whose rooms this door connects.
    pub sides: Option<(TilePos, TilePos)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantState {
    pub crop: Crop,
    pub growth_speed: f32,
    pub growth_stages: u32,
    pub harvest_speed: f32,
    pub harvest_queued: bool,
    pub harvest_retry_delay: f32,
    /// Seconds left before a dropped harvest is offered again.
    #[serde(default)]
    pub harvest_cooldown: f32,
    /// Not persisted; an interrupted harvest starts over.
    #[serde(skip)]
    pub harvest_amount: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorState {
    pub oxygen_per_second: f32,
    pub max_oxygen: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub stacks: Vec<ItemStack>,
    pub capacity: usize,
}

impl ContainerState {
    pub fn new(capacity: usize) -> Self {
        Self {
            stacks: Vec::new(),
            capacity,
        }
    }

    /// Whether [`accept`](Self::accept) would take all of `stack`.
    pub fn can_accept(&self, stack: &ItemStack) -> bool {
        let mut rest = Some(stack.clone());
        for held in &self.stacks {
            rest = match rest {
                Some(r) => held.merge_result(&r),
                None => break,
            };
        }
        rest.is_none() || self.stacks.len() < self.capacity
    }

    /// Merge `stack` into matching stacks, then into a free slot. Returns
    /// whatever did not fit.
    pub fn accept(&mut self, stack: ItemStack) -> Option<ItemStack> {
        let mut rest = stack;
        for held in self.stacks.iter_mut() {
            match held.merge_into(rest) {
                Some(r) => rest = r,
                None => return None,
            }
        }
        if self.stacks.len() < self.capacity {
            self.stacks.push(rest);
            return None;
        }
        Some(rest)
    }

    pub fn item_count(&self, item_type: &str) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.item_type() == item_type)
            .map(|s| s.count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdditionState {
    Wall,
    Door(DoorState),
    Soil,
    Plant(PlantState),
    OxygenGenerator(GeneratorState),
    ItemContainer(ContainerState),
}

/// A buildable object on a tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addition {
    state: AdditionState,
    /// Render angle in degrees; east/west doors are rotated by 90.
    pub orientation: f32,
    movement_cost: f32,
    construction_cost: f32,
    build_percentage: f32,
    progress: f32,
    /// Assigned by the world on install; lets jobs tell a replaced addition
    /// from its successor.
    #[serde(skip)]
    uid: u64,
}

impl Addition {
    /// An unbuilt addition of `kind` with base values from `config`.
    pub fn new(kind: AdditionKind, config: &SimConfig) -> Self {
        let (state, movement, construction) = match kind {
            AdditionKind::Wall => (
                AdditionState::Wall,
                movement_cost::WALL,
                construction_cost::WALL,
            ),
            AdditionKind::Door => (
                AdditionState::Door(DoorState {
                    open_speed: config.door.open_speed,
                    linger_seconds: config.door.linger_seconds,
                    entering: false,
                    open_timer: 0.0,
                    sides: None,
                }),
                movement_cost::DOOR,
                construction_cost::DOOR,
            ),
            AdditionKind::Soil => (
                AdditionState::Soil,
                movement_cost::SOIL,
                construction_cost::SOIL,
            ),
            AdditionKind::Plant(crop) => {
                let crop_config = match crop {
                    Crop::Tomato => &config.tomato,
                };
                (
                    AdditionState::Plant(PlantState {
                        crop,
                        growth_speed: crop_config.growth_speed,
                        growth_stages: crop_config.growth_stages,
                        harvest_speed: crop_config.harvest_speed,
                        harvest_queued: false,
                        harvest_retry_delay: crop_config.harvest_retry_delay,
                        harvest_cooldown: 0.0,
                        harvest_amount: 0.0,
                    }),
                    movement_cost::PLANT,
                    crop_config.construction_cost,
                )
            }
            AdditionKind::OxygenGenerator => (
                AdditionState::OxygenGenerator(GeneratorState {
                    oxygen_per_second: config.oxygen_generator.oxygen_per_second,
                    max_oxygen: config.oxygen_generator.max_oxygen,
                }),
                movement_cost::OXYGEN_GENERATOR,
                construction_cost::OXYGEN_GENERATOR,
            ),
            AdditionKind::ItemContainer => (
                AdditionState::ItemContainer(ContainerState::new(config.container_capacity)),
                movement_cost::ITEM_CONTAINER,
                construction_cost::ITEM_CONTAINER,
            ),
        };
        Self {
            state,
            orientation: 0.0,
            movement_cost: movement,
            construction_cost: construction,
            build_percentage: 0.0,
            progress: 0.0,
            uid: 0,
        }
    }

    pub fn kind(&self) -> AdditionKind {
        match &self.state {
            AdditionState::Wall => AdditionKind::Wall,
            AdditionState::Door(_) => AdditionKind::Door,
            AdditionState::Soil => AdditionKind::Soil,
            AdditionState::Plant(p) => AdditionKind::Plant(p.crop),
            AdditionState::OxygenGenerator(_) => AdditionKind::OxygenGenerator,
            AdditionState::ItemContainer(_) => AdditionKind::ItemContainer,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn state(&self) -> &AdditionState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut AdditionState {
        &mut self.state
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub(crate) fn set_uid(&mut self, uid: u64) {
        self.uid = uid;
    }

    pub fn door(&self) -> Option<&DoorState> {
        match &self.state {
            AdditionState::Door(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn door_mut(&mut self) -> Option<&mut DoorState> {
        match &mut self.state {
            AdditionState::Door(d) => Some(d),
            _ => None,
        }
    }

    pub fn plant(&self) -> Option<&PlantState> {
        match &self.state {
            AdditionState::Plant(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn plant_mut(&mut self) -> Option<&mut PlantState> {
        match &mut self.state {
            AdditionState::Plant(p) => Some(p),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<&ContainerState> {
        match &self.state {
            AdditionState::ItemContainer(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut ContainerState> {
        match &mut self.state {
            AdditionState::ItemContainer(c) => Some(c),
            _ => None,
        }
    }

    pub fn build_percentage(&self) -> f32 {
        self.build_percentage
    }

    pub fn is_built(&self) -> bool {
        self.build_percentage >= 1.0
    }

    /// Door openness or plant growth, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub(crate) fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 1.0);
    }

    pub fn construction_cost(&self) -> f32 {
        self.construction_cost
    }

    /// Base movement cost; applies once the addition is built.
    pub fn base_movement_cost(&self) -> f32 {
        self.movement_cost
    }

    /// Multiplier on the tile's movement cost: the base cost when built,
    /// otherwise 1.
    pub fn movement_cost_multiplier(&self) -> f32 {
        if self.is_built() {
            self.movement_cost
        } else {
            1.0
        }
    }

    /// Walls seal a room only once finished; doors always do.
    pub fn defines_room_border(&self) -> bool {
        match self.state {
            AdditionState::Wall => self.is_built(),
            AdditionState::Door(_) => true,
            _ => false,
        }
    }

    /// Whether a loose item stack may sit on the tile under this addition.
    pub fn can_hold_item_on_tile(&self) -> bool {
        matches!(self.state, AdditionState::Soil | AdditionState::Plant(_))
    }

    /// Apply construction work. Returns true if this call finished the
    /// addition. Zero work is allowed and only signals a visual refresh.
    pub fn do_work(&mut self, amount: f32) -> bool {
        if amount <= 0.0 || self.is_built() {
            return false;
        }
        self.build_percentage += amount / self.construction_cost;
        if self.build_percentage >= 1.0 - BUILD_EPSILON {
            self.build_percentage = 1.0;
            return true;
        }
        false
    }

    /// Jump straight to built. Returns true if it was not built before.
    pub fn finish_building(&mut self) -> bool {
        let was_built = self.is_built();
        self.build_percentage = 1.0;
        !was_built
    }

    /// Back to a freshly placed, unbuilt state (a harvested plant).
    pub(crate) fn reset_build(&mut self) {
        self.build_percentage = 0.0;
        self.progress = 0.0;
        if let Some(plant) = self.plant_mut() {
            plant.harvest_queued = false;
            plant.harvest_cooldown = 0.0;
            plant.harvest_amount = 0.0;
        }
    }

    /// Ask to pass through. Doors remember the request and only let a pawn
    /// through once fully open; everything else is always passable.
    pub fn request_entry(&mut self) -> bool {
        let open = self.progress >= 1.0;
        match self.door_mut() {
            Some(door) => {
                door.entering = true;
                open
            }
            None => true,
        }
    }

    /// Harvest work on a grown plant. Returns the accumulated harvest amount;
    /// the harvest is done at 1.
    pub fn harvest_work(&mut self, amount: f32) -> f32 {
        let grown = self.progress >= 1.0;
        match self.plant_mut() {
            Some(plant) => {
                if grown {
                    plant.harvest_amount += amount * plant.harvest_speed;
                }
                plant.harvest_amount
            }
            None => 0.0,
        }
    }

    /// Growth stage of a plant, `0..=growth_stages`.
    pub fn growth_stage(&self) -> u32 {
        match self.plant() {
            Some(plant) => (self.progress * plant.growth_stages as f32).floor() as u32,
            None => 0,
        }
    }

    /// Sprite key for the current state.
    pub fn render_state(&self) -> String {
        match &self.state {
            AdditionState::Door(_) => {
                let stage = DOOR_STAGE_THRESHOLDS
                    .iter()
                    .rposition(|&t| self.progress >= t)
                    .map(|i| i + 1);
                match stage {
                    Some(s) => format!("{}_{}", names::DOOR, s),
                    None => names::DOOR.to_string(),
                }
            }
            AdditionState::Plant(p) => format!("{}_{}", p.crop.name(), self.growth_stage()),
            _ => self.name().to_string(),
        }
    }
}

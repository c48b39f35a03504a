//! Pawn skills, work output and experience gain.
//!
//! Every pawn carries four skill levels. Working on a job consumes the level
//! of the job's skill: the work produced per second equals the level, and the
//! experience gained per second is `1 / (level × xp_divisor)`, so practice
//! raises a low skill quickly and a high one slowly.
//!
//! ```
//! use outpost_logic::skills::{SkillType, Stats};
//!
//! let mut stats = Stats::uniform(1.0);
//! let work = stats.practice(SkillType::Construction, 0.5, 60.0);
//! assert_eq!(work, 0.5);
//! assert!(stats.get(SkillType::Construction) > 1.0);
//! ```

use serde::{Deserialize, Serialize};

/// Lowest level used when dividing by a skill level.
pub const MIN_SKILL_LEVEL: f32 = 0.01;

/// Skill categories a pawn can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillType {
    /// Walking speed, also used for hauling and plain movement.
    Speed,
    Construction,
    Planting,
    Harvesting,
}

impl SkillType {
    /// All skill categories in order.
    pub const ALL: [SkillType; 4] = [
        SkillType::Speed,
        SkillType::Construction,
        SkillType::Planting,
        SkillType::Harvesting,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SkillType::Speed => "Speed",
            SkillType::Construction => "Construction",
            SkillType::Planting => "Planting",
            SkillType::Harvesting => "Harvesting",
        }
    }
}

/// Per-pawn skill levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub speed: f32,
    pub construction: f32,
    pub planting: f32,
    pub harvesting: f32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

impl Stats {
    pub fn new(speed: f32, construction: f32, planting: f32, harvesting: f32) -> Self {
        Self {
            speed,
            construction,
            planting,
            harvesting,
        }
    }

    /// Every skill at the same level.
    pub fn uniform(level: f32) -> Self {
        Self::new(level, level, level, level)
    }

    pub fn get(&self, skill: SkillType) -> f32 {
        match skill {
            SkillType::Speed => self.speed,
            SkillType::Construction => self.construction,
            SkillType::Planting => self.planting,
            SkillType::Harvesting => self.harvesting,
        }
    }

    pub fn set(&mut self, skill: SkillType, value: f32) {
        let v = value.max(0.0);
        match skill {
            SkillType::Speed => self.speed = v,
            SkillType::Construction => self.construction = v,
            SkillType::Planting => self.planting = v,
            SkillType::Harvesting => self.harvesting = v,
        }
    }

    /// Work `dt` seconds at `skill`: returns the work produced and applies
    /// the experience gained.
    pub fn practice(&mut self, skill: SkillType, dt: f32, xp_divisor: f32) -> f32 {
        let level = self.get(skill);
        let work = work_amount(dt, level);
        self.set(skill, level + experience_gain(dt, level, xp_divisor));
        work
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkillType, f32)> + '_ {
        SkillType::ALL.iter().map(move |&s| (s, self.get(s)))
    }
}

/// Work produced by `dt` seconds at `level`.
pub fn work_amount(dt: f32, level: f32) -> f32 {
    dt * level.max(0.0)
}

/// Experience gained by `dt` seconds at `level`; diminishing as level rises.
pub fn experience_gain(dt: f32, level: f32, xp_divisor: f32) -> f32 {
    if dt <= 0.0 || xp_divisor <= 0.0 {
        return 0.0;
    }
    dt / (level.max(MIN_SKILL_LEVEL) * xp_divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_scales_with_level() {
        assert_eq!(work_amount(2.0, 1.5), 3.0);
        assert_eq!(work_amount(1.0, -1.0), 0.0);
    }

    #[test]
    fn test_experience_diminishes() {
        let low = experience_gain(1.0, 1.0, 60.0);
        let high = experience_gain(1.0, 3.0, 60.0);
        assert!((low - 1.0 / 60.0).abs() < 1e-6);
        assert!(high < low);
    }

    #[test]
    fn test_zero_level_does_not_divide_by_zero() {
        let gain = experience_gain(1.0, 0.0, 60.0);
        assert!(gain.is_finite());
        assert!(gain > 0.0);
    }

    #[test]
    fn test_practice_only_touches_one_skill() {
        let mut stats = Stats::uniform(1.0);
        stats.practice(SkillType::Harvesting, 60.0, 60.0);
        assert!((stats.harvesting - 2.0).abs() < 1e-5);
        assert_eq!(stats.speed, 1.0);
        assert_eq!(stats.construction, 1.0);
        assert_eq!(stats.planting, 1.0);
    }

    #[test]
    fn test_iter_covers_all() {
        let stats = Stats::new(1.0, 2.0, 3.0, 4.0);
        let collected: Vec<_> = stats.iter().collect();
        assert_eq!(collected.len(), 4);
        assert_eq!(collected[3], (SkillType::Harvesting, 4.0));
    }
}

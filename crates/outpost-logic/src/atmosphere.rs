//! Room-wide atmosphere: one temperature and one oxygen level per room.
//!
//! Quantities added to a room are spread over its floor tiles, so the same
//! generator raises a small room faster than a large one. A room that touches
//! an empty (space) tile is *vented*: anything added to it is lost and the
//! level is forced to zero.
//!
//! Two rooms joined by an open door exchange oxygen and heat through
//! [`exchange`], proportional to the level difference and to how far the
//! door is open, capped at [`MAX_TRANSFER_PER_SECOND`].

use serde::{Deserialize, Serialize};

/// Upper bound on the quantity moved between two rooms per second.
pub const MAX_TRANSFER_PER_SECOND: f32 = 1.0;

/// Atmospheric state of a single room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomAtmosphere {
    pub temperature: f32,
    pub oxygen: f32,
    /// The room border contains at least one empty tile.
    pub vented: bool,
}

impl RoomAtmosphere {
    pub fn new(temperature: f32, oxygen: f32) -> Self {
        Self {
            temperature,
            oxygen,
            vented: false,
        }
    }

    /// Add `amount` oxygen spread over `tile_count` tiles, capped at `max`.
    pub fn add_oxygen(&mut self, amount: f32, tile_count: usize, max: f32) {
        if self.vented {
            self.oxygen = 0.0;
            return;
        }
        if tile_count == 0 {
            return;
        }
        self.oxygen = (self.oxygen + amount / tile_count as f32).min(max).max(0.0);
    }

    /// Add `amount` heat spread over `tile_count` tiles, capped at `max`.
    pub fn add_heat(&mut self, amount: f32, tile_count: usize, max: f32) {
        if self.vented {
            self.temperature = 0.0;
            return;
        }
        if tile_count == 0 {
            return;
        }
        self.temperature = (self.temperature + amount / tile_count as f32).min(max);
    }

    /// Fold one absorbed tile into the running average.
    ///
    /// `absorbed` is the number of tiles already averaged in. A tile that was
    /// not part of any room contributes zero of both quantities.
    pub fn absorb_tile(&mut self, absorbed: usize, previous: Option<RoomAtmosphere>) {
        let n = absorbed as f32;
        let (t, o) = previous
            .map(|p| (p.temperature, p.oxygen))
            .unwrap_or((0.0, 0.0));
        self.temperature = (self.temperature * n + t) / (n + 1.0);
        self.oxygen = (self.oxygen * n + o) / (n + 1.0);
    }
}

/// One side of an exchange: a room's atmosphere and its floor tile count.
pub struct ExchangeSide<'a> {
    pub atmosphere: &'a mut RoomAtmosphere,
    pub tiles: usize,
}

/// Move oxygen and heat from the richer room to the poorer one.
///
/// `connection` is 0 for a sealed connection and 1 for a fully open one.
/// The moved quantity never exceeds `MAX_TRANSFER_PER_SECOND * dt` and never
/// overshoots the equilibrium point. Vented rooms swallow what they receive.
pub fn exchange(a: ExchangeSide<'_>, b: ExchangeSide<'_>, connection: f32, dt: f32) {
    if a.tiles == 0 || b.tiles == 0 || connection <= 0.0 || dt <= 0.0 {
        return;
    }
    let inv_a = 1.0 / a.tiles as f32;
    let inv_b = 1.0 / b.tiles as f32;

    let oxygen_flow = transfer_amount(a.atmosphere.oxygen - b.atmosphere.oxygen, connection, dt, inv_a, inv_b);
    let heat_flow = transfer_amount(
        a.atmosphere.temperature - b.atmosphere.temperature,
        connection,
        dt,
        inv_a,
        inv_b,
    );

    apply_flow(a.atmosphere, -oxygen_flow, -heat_flow, a.tiles);
    apply_flow(b.atmosphere, oxygen_flow, heat_flow, b.tiles);
}

/// Signed quantity flowing from `a` to `b` given `diff = level_a - level_b`.
fn transfer_amount(diff: f32, connection: f32, dt: f32, inv_a: f32, inv_b: f32) -> f32 {
    let rate = (diff.abs() * connection).min(MAX_TRANSFER_PER_SECOND) * dt;
    let equilibrium = diff.abs() / (inv_a + inv_b);
    rate.min(equilibrium).copysign(diff)
}

fn apply_flow(atmo: &mut RoomAtmosphere, oxygen: f32, heat: f32, tiles: usize) {
    if atmo.vented {
        atmo.oxygen = 0.0;
        atmo.temperature = 0.0;
        return;
    }
    let per_tile = 1.0 / tiles as f32;
    atmo.oxygen = (atmo.oxygen + oxygen * per_tile).max(0.0);
    atmo.temperature += heat * per_tile;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_oxygen_spreads_and_caps() {
        let mut atmo = RoomAtmosphere::default();
        atmo.add_oxygen(10.0, 20, f32::INFINITY);
        assert!((atmo.oxygen - 0.5).abs() < 1e-6);
        atmo.add_oxygen(100.0, 1, 2.0);
        assert_eq!(atmo.oxygen, 2.0);
    }

    #[test]
    fn test_vented_room_stays_empty() {
        let mut atmo = RoomAtmosphere::new(20.0, 5.0);
        atmo.vented = true;
        atmo.add_oxygen(10.0, 4, f32::INFINITY);
        atmo.add_heat(10.0, 4, f32::INFINITY);
        assert_eq!(atmo.oxygen, 0.0);
        assert_eq!(atmo.temperature, 0.0);
    }

    #[test]
    fn test_absorb_keeps_uniform_average() {
        let mut atmo = RoomAtmosphere::default();
        let prev = RoomAtmosphere::new(10.0, 4.0);
        for n in 0..5 {
            atmo.absorb_tile(n, Some(prev));
        }
        assert!((atmo.oxygen - 4.0).abs() < 1e-5);
        assert!((atmo.temperature - 10.0).abs() < 1e-5);
        // A tile from outside any room dilutes
        atmo.absorb_tile(5, None);
        assert!((atmo.oxygen - 4.0 * 5.0 / 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_exchange_is_rate_limited_and_conserves() {
        let mut a = RoomAtmosphere::new(0.0, 10.0);
        let mut b = RoomAtmosphere::new(0.0, 0.0);
        exchange(
            ExchangeSide { atmosphere: &mut a, tiles: 10 },
            ExchangeSide { atmosphere: &mut b, tiles: 10 },
            1.0,
            0.5,
        );
        // 0.5 units moved: each side changes by 0.05 per tile
        assert!((a.oxygen - 9.95).abs() < 1e-5);
        assert!((b.oxygen - 0.05).abs() < 1e-5);
        let total = a.oxygen * 10.0 + b.oxygen * 10.0;
        assert!((total - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_exchange_never_overshoots() {
        let mut a = RoomAtmosphere::new(0.0, 0.2);
        let mut b = RoomAtmosphere::new(0.0, 0.0);
        exchange(
            ExchangeSide { atmosphere: &mut a, tiles: 1 },
            ExchangeSide { atmosphere: &mut b, tiles: 1 },
            1.0,
            10.0,
        );
        assert!((a.oxygen - 0.1).abs() < 1e-5);
        assert!((b.oxygen - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_closed_connection_moves_nothing() {
        let mut a = RoomAtmosphere::new(30.0, 3.0);
        let mut b = RoomAtmosphere::new(10.0, 1.0);
        exchange(
            ExchangeSide { atmosphere: &mut a, tiles: 4 },
            ExchangeSide { atmosphere: &mut b, tiles: 4 },
            0.0,
            1.0,
        );
        assert_eq!(a.oxygen, 3.0);
        assert_eq!(b.temperature, 10.0);
    }

    #[test]
    fn test_exchange_into_vacuum_drains() {
        let mut room = RoomAtmosphere::new(20.0, 2.0);
        let mut space = RoomAtmosphere::default();
        space.vented = true;
        exchange(
            ExchangeSide { atmosphere: &mut room, tiles: 2 },
            ExchangeSide { atmosphere: &mut space, tiles: 2 },
            1.0,
            1.0,
        );
        assert!(room.oxygen < 2.0);
        assert_eq!(space.oxygen, 0.0);
    }
}

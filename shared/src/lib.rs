//! Game model and wire protocol shared by the match client and its tests.

pub mod geometry;
pub mod ids;
pub mod protocol;
pub mod sprites;
pub mod state;

pub use geometry::{Coords, Direction};
pub use ids::{IdAllocator, IdsExhausted};
pub use protocol::{ClientCommand, Frame, MessageKind, ProtocolError, ServerMessage, SnapAction};
pub use sprites::{Base, Bomb, Bullet, Coin, Side, Tower, Unit};
pub use state::{GameState, Player, SpriteHandle, User};

/// Simulation rate; every lifetime below is expressed in these ticks.
pub const TICK_RATE: u32 = 120;

pub const AREA_WIDTH: f32 = 960.0;
pub const AREA_HEIGHT: f32 = 640.0;

pub const UNIT_WIDTH: f32 = 50.0;
pub const UNIT_HEIGHT: f32 = 50.0;
pub const UNIT_HEALTH: i32 = 100;
pub const UNIT_SPEED: f32 = 5.0;
pub const UNIT_SPAWN_OFFSET: f32 = 30.0;

pub const TOWER_HEALTH: i32 = 100;
pub const TOWER_DAMAGE: i32 = 10;

pub const BULLET_SPEED: f32 = 6.0;
pub const BULLET_DAMAGE: i32 = 10;
pub const BULLET_LIFETIME_TICKS: u32 = 3 * TICK_RATE;

pub const COIN_VALUE: u32 = 10;
pub const COIN_DEFAULT: u32 = 3;
pub const COIN_LIFETIME_TICKS: u32 = 10 * TICK_RATE;

pub const BOMB_DAMAGE: i32 = 1;
pub const BOMB_LIFETIME_TICKS: u32 = 10 * TICK_RATE;

pub const BASE_HEALTH: i32 = 3;
pub const BASE_WIDTH: f32 = 110.0;
pub const BASE_HEIGHT: f32 = 110.0;
pub const BASE_OFFSET: f32 = 5.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_points_fit_inside_area() {
        for side in [Side::Man, Side::Alien] {
            let spawn = Unit::spawn_point(side);
            assert!(spawn.x >= 0.0 && spawn.x + UNIT_WIDTH <= AREA_WIDTH);
            assert!(spawn.y >= 0.0 && spawn.y + UNIT_HEIGHT <= AREA_HEIGHT);
        }
    }

    #[test]
    fn test_base_outlives_single_bomb() {
        assert!(BASE_HEALTH > BOMB_DAMAGE);
    }
}

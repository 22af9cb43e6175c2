use log::debug;
use shared::{
    GameState, SpriteHandle, BOMB_DAMAGE, BULLET_DAMAGE, COIN_VALUE, TOWER_DAMAGE,
};
use std::collections::VecDeque;

/// Pending collision pairs, resolved strictly in the order they were appended.
#[derive(Debug, Default)]
pub struct CollisionQueue {
    pending: VecDeque<(SpriteHandle, SpriteHandle)>,
}

impl CollisionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, a: SpriteHandle, b: SpriteHandle) {
        self.pending.push_back((a, b));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applies every queued pair to `state` and empties the queue.
    pub fn run(&mut self, state: &mut GameState) {
        while let Some((a, b)) = self.pending.pop_front() {
            resolve(state, a, b);
        }
    }
}

fn resolve(state: &mut GameState, a: SpriteHandle, b: SpriteHandle) {
    use SpriteHandle::*;

    match (a, b) {
        (Tower(tower), Bullet(serial)) | (Bullet(serial), Tower(tower)) => {
            if consume_bullet(state, serial) {
                if let Some(tower) = state.tower_mut(tower) {
                    tower.take_damage(BULLET_DAMAGE);
                }
            }
        }
        (Unit(unit), Bullet(serial)) | (Bullet(serial), Unit(unit)) => {
            if consume_bullet(state, serial) {
                if let Some(unit) = state.unit_mut(unit) {
                    unit.take_damage(BULLET_DAMAGE);
                }
            }
        }
        (Unit(unit), Coin(coin)) | (Coin(coin), Unit(unit)) => {
            let picked = match state.coin_mut(coin) {
                Some(coin) if coin.visible => {
                    coin.visible = false;
                    true
                }
                _ => false,
            };
            if picked {
                if let Some(player) = state.player_by_unit_mut(unit) {
                    player.coins += COIN_VALUE;
                }
            }
        }
        (Unit(unit), Base(base)) | (Base(base), Unit(unit)) => {
            let attacker = state.unit(unit).map(|u| u.side);
            if let (Some(side), Some(base)) = (attacker, state.base_mut(base)) {
                if base.side != side {
                    base.under_attack = true;
                }
            }
        }
        (Bomb(bomb), Base(base)) | (Base(base), Bomb(bomb)) => {
            let exploded = match state.bomb_mut(bomb) {
                Some(bomb) if bomb.visible => {
                    bomb.visible = false;
                    true
                }
                _ => false,
            };
            if exploded {
                if let Some(base) = state.base_mut(base) {
                    base.take_damage(BOMB_DAMAGE);
                }
            }
        }
        (Unit(unit), Bomb(bomb)) | (Bomb(bomb), Unit(unit)) => {
            let defender = state.unit(unit).map(|u| u.side);
            if let (Some(side), Some(bomb)) = (defender, state.bomb_mut(bomb)) {
                if bomb.target == side {
                    bomb.visible = false;
                }
            }
        }
        (Unit(unit), Tower(tower)) | (Tower(tower), Unit(unit)) => {
            let owner = state.towers.iter().find(|t| t.id == tower).map(|t| t.side);
            if let (Some(owner), Some(unit)) = (owner, state.unit_mut(unit)) {
                if unit.side != owner {
                    unit.take_damage(TOWER_DAMAGE);
                }
            }
        }
        other => debug!("No collision rule for {:?}", other),
    }
}

/// Hides a live bullet; a bullet that already hit something hits nothing else.
fn consume_bullet(state: &mut GameState, serial: u64) -> bool {
    match state.bullet_mut(serial) {
        Some(bullet) if bullet.visible => {
            bullet.visible = false;
            true
        }
        _ => false,
    }
}

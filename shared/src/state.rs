use crate::sprites::{Base, Bomb, Bullet, Coin, Side, Tower, Unit};
use crate::COIN_DEFAULT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
}

impl User {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Pairs a user with the unit they control.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub user: User,
    pub unit: u32,
    pub side: Side,
    pub coins: u32,
}

impl Player {
    pub fn new(user: User, unit: &Unit) -> Self {
        Self {
            user,
            unit: unit.id,
            side: unit.side,
            coins: COIN_DEFAULT,
        }
    }
}

/// Identifies one concrete sprite inside a [`GameState`].
/// Bullets are addressed by serial because their ids are shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteHandle {
    Unit(u32),
    Tower(u32),
    Bullet(u64),
    Bomb(u32),
    Coin(u32),
    Base(u32),
}

/// Every entity the client currently knows about.
#[derive(Debug, Clone, Default)]
pub struct GameState {
    pub tick: u32,
    pub users: Vec<User>,
    pub players: Vec<Player>,
    pub units: Vec<Unit>,
    pub towers: Vec<Tower>,
    pub bullets: Vec<Bullet>,
    pub bombs: Vec<Bomb>,
    pub coins: Vec<Coin>,
    pub bases: Vec<Base>,
    next_bullet_serial: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves an identifier across all sprite categories.
    ///
    /// Units win over everything else, so an id shared by a unit and its
    /// bullets resolves to the unit. Among bullets the earliest spawned wins.
    pub fn find_sprite(&self, id: u32) -> Option<SpriteHandle> {
        if self.units.iter().any(|u| u.id == id) {
            return Some(SpriteHandle::Unit(id));
        }
        if self.towers.iter().any(|t| t.id == id) {
            return Some(SpriteHandle::Tower(id));
        }
        if let Some(bullet) = self.bullets.iter().find(|b| b.id == id) {
            return Some(SpriteHandle::Bullet(bullet.serial));
        }
        if self.bombs.iter().any(|b| b.id == id) {
            return Some(SpriteHandle::Bomb(id));
        }
        if self.coins.iter().any(|c| c.id == id) {
            return Some(SpriteHandle::Coin(id));
        }
        if self.bases.iter().any(|b| b.id == id) {
            return Some(SpriteHandle::Base(id));
        }
        None
    }

    /// Stamps the bullet with the current tick and a fresh serial, then stores it.
    pub fn add_bullet(&mut self, mut bullet: Bullet) -> u64 {
        self.next_bullet_serial += 1;
        bullet.serial = self.next_bullet_serial;
        bullet.spawn_tick = self.tick;
        self.bullets.push(bullet);
        self.next_bullet_serial
    }

    /// Bullets sharing `id`, oldest first; equal spawn ticks keep insertion order.
    pub fn bullets_with_id(&self, id: u32) -> Vec<&Bullet> {
        let mut bullets: Vec<&Bullet> = self.bullets.iter().filter(|b| b.id == id).collect();
        bullets.sort_by_key(|b| b.spawn_tick);
        bullets
    }

    pub fn player_by_side(&self, side: Side) -> Option<&Player> {
        self.players.iter().find(|p| p.side == side)
    }

    pub fn player_by_unit_mut(&mut self, unit: u32) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.unit == unit)
    }

    pub fn unit(&self, id: u32) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: u32) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn tower_mut(&mut self, id: u32) -> Option<&mut Tower> {
        self.towers.iter_mut().find(|t| t.id == id)
    }

    pub fn bullet_mut(&mut self, serial: u64) -> Option<&mut Bullet> {
        self.bullets.iter_mut().find(|b| b.serial == serial)
    }

    pub fn bomb_mut(&mut self, id: u32) -> Option<&mut Bomb> {
        self.bombs.iter_mut().find(|b| b.id == id)
    }

    pub fn coin_mut(&mut self, id: u32) -> Option<&mut Coin> {
        self.coins.iter_mut().find(|c| c.id == id)
    }

    pub fn base_mut(&mut self, id: u32) -> Option<&mut Base> {
        self.bases.iter_mut().find(|b| b.id == id)
    }

    pub fn base_by_side(&self, side: Side) -> Option<&Base> {
        self.bases.iter().find(|b| b.side == side)
    }
}

use crate::geometry::{Coords, Direction};
use crate::{
    AREA_HEIGHT, AREA_WIDTH, BASE_HEALTH, BASE_HEIGHT, BASE_OFFSET, BASE_WIDTH,
    BOMB_LIFETIME_TICKS, BULLET_LIFETIME_TICKS, BULLET_SPEED, COIN_LIFETIME_TICKS, TOWER_HEALTH,
    UNIT_HEALTH, UNIT_HEIGHT, UNIT_SPAWN_OFFSET, UNIT_SPEED, UNIT_WIDTH,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two opposing factions of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Man,
    Alien,
}

impl Side {
    pub fn other(&self) -> Side {
        match self {
            Side::Man => Side::Alien,
            Side::Alien => Side::Man,
        }
    }

    /// Join-approved side code: `0` is MAN, anything else ALIEN.
    pub fn from_code(code: u32) -> Side {
        if code == 0 {
            Side::Man
        } else {
            Side::Alien
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Side::Man => 0,
            Side::Alien => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Man => write!(f, "man"),
            Side::Alien => write!(f, "alien"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "man" => Ok(Side::Man),
            "alien" => Ok(Side::Alien),
            other => Err(format!("unknown side '{}', expected 'man' or 'alien'", other)),
        }
    }
}

/// A player-controlled unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub id: u32,
    pub side: Side,
    pub coords: Coords,
    /// Accumulated held-input direction.
    pub direction: Direction,
    /// Last non-empty direction; shots and towers point this way.
    pub facing: Direction,
    /// Displacement achieved by the last motion step.
    pub speed: f32,
    pub health: i32,
    pub visible: bool,
}

impl Unit {
    pub fn new(id: u32, side: Side) -> Self {
        Self {
            id,
            side,
            coords: Self::spawn_point(side),
            direction: Direction::NONE,
            facing: Self::default_facing(side),
            speed: 0.0,
            health: UNIT_HEALTH,
            visible: true,
        }
    }

    pub fn spawn_point(side: Side) -> Coords {
        let inset = BASE_OFFSET + BASE_WIDTH + UNIT_SPAWN_OFFSET;
        let y = (AREA_HEIGHT - UNIT_HEIGHT) / 2.0;
        match side {
            Side::Man => Coords::new(inset, y),
            Side::Alien => Coords::new(AREA_WIDTH - inset - UNIT_WIDTH, y),
        }
    }

    fn default_facing(side: Side) -> Direction {
        match side {
            Side::Man => Direction::RIGHT,
            Side::Alien => Direction::LEFT,
        }
    }

    pub fn alive(&self) -> bool {
        self.health > 0
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        if !direction.is_none() {
            self.facing = direction;
        }
    }

    /// Advances one motion step, stopping at the field borders.
    pub fn move_step(&mut self) {
        let before = self.coords;
        let next = before.add(&self.direction.as_coords().scale(UNIT_SPEED));
        self.coords = Coords::new(
            next.x.clamp(0.0, AREA_WIDTH - UNIT_WIDTH),
            next.y.clamp(0.0, AREA_HEIGHT - UNIT_HEIGHT),
        );
        self.speed = if self.coords == before { 0.0 } else { UNIT_SPEED };
    }

    /// Shifts the unit by a delta without touching its direction.
    pub fn correct_coords(&mut self, delta: Coords) {
        self.coords = self.coords.add(&delta);
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.health = (self.health - amount).max(0);
    }

    /// Restores health and moves the unit back to its side's spawn point.
    pub fn spawn(&mut self) {
        self.health = UNIT_HEALTH;
        self.coords = Self::spawn_point(self.side);
        self.direction = Direction::NONE;
        self.facing = Self::default_facing(self.side);
        self.speed = 0.0;
    }

    pub fn center(&self) -> Coords {
        Coords::new(
            self.coords.x + UNIT_WIDTH / 2.0,
            self.coords.y + UNIT_HEIGHT / 2.0,
        )
    }

    /// True when the unit's center lies on its own side of the half line.
    pub fn on_his_half(&self) -> bool {
        let center = self.center().x;
        match self.side {
            Side::Man => center < AREA_WIDTH / 2.0,
            Side::Alien => center > AREA_WIDTH / 2.0,
        }
    }
}

/// A projectile. Bullets carry the identifier of the unit that fired them,
/// so several live bullets may share one `id`; `serial` tells them apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: u32,
    pub serial: u64,
    pub spawn_tick: u32,
    pub direction: Direction,
    pub coords: Coords,
    pub ticks_left: u32,
    pub visible: bool,
}

impl Bullet {
    pub fn new(id: u32, direction: Direction, coords: Coords) -> Self {
        Self {
            id,
            serial: 0,
            spawn_tick: 0,
            direction,
            coords,
            ticks_left: BULLET_LIFETIME_TICKS,
            visible: true,
        }
    }

    pub fn advance(&mut self) {
        if !self.visible {
            return;
        }
        self.coords = self
            .coords
            .add(&self.direction.as_coords().scale(BULLET_SPEED));
        self.ticks_left = self.ticks_left.saturating_sub(1);

        let inside = (0.0..=AREA_WIDTH).contains(&self.coords.x)
            && (0.0..=AREA_HEIGHT).contains(&self.coords.y);
        if self.ticks_left == 0 || !inside {
            self.visible = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tower {
    pub id: u32,
    pub side: Side,
    pub coords: Coords,
    pub direction: Direction,
    pub health: i32,
}

impl Tower {
    pub fn new(id: u32, coords: Coords, direction: Direction, side: Side) -> Self {
        Self {
            id,
            side,
            coords,
            direction,
            health: TOWER_HEALTH,
        }
    }

    pub fn alive(&self) -> bool {
        self.health > 0
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.health = (self.health - amount).max(0);
    }
}

/// A bomb planted at a base. `side` is the planter, `target` the base's side.
#[derive(Debug, Clone, PartialEq)]
pub struct Bomb {
    pub id: u32,
    pub side: Side,
    pub target: Side,
    pub coords: Coords,
    /// Ticks until the bomb removes itself; `None` once destruction is cancelled.
    pub destruction_ticks: Option<u32>,
    pub visible: bool,
}

impl Bomb {
    pub fn new(id: u32, side: Side, base: &Base) -> Self {
        Self {
            id,
            side,
            target: base.side,
            coords: base.coords,
            destruction_ticks: Some(BOMB_LIFETIME_TICKS),
            visible: true,
        }
    }

    pub fn cancel_destruction(&mut self) {
        self.destruction_ticks = None;
    }

    pub fn advance(&mut self) {
        if let Some(ticks) = self.destruction_ticks.as_mut() {
            *ticks = ticks.saturating_sub(1);
            if *ticks == 0 {
                self.visible = false;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coin {
    pub id: u32,
    pub coords: Coords,
    pub ticks_left: u32,
    pub visible: bool,
}

impl Coin {
    pub fn new(id: u32, coords: Coords) -> Self {
        Self {
            id,
            coords,
            ticks_left: COIN_LIFETIME_TICKS,
            visible: true,
        }
    }

    pub fn advance(&mut self) {
        self.ticks_left = self.ticks_left.saturating_sub(1);
        if self.ticks_left == 0 {
            self.visible = false;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Base {
    pub id: u32,
    pub side: Side,
    pub coords: Coords,
    pub health: i32,
    pub under_attack: bool,
}

impl Base {
    pub fn new(id: u32, side: Side) -> Self {
        let y = (AREA_HEIGHT - BASE_HEIGHT) / 2.0;
        let coords = match side {
            Side::Man => Coords::new(BASE_OFFSET, y),
            Side::Alien => Coords::new(AREA_WIDTH - BASE_WIDTH - BASE_OFFSET, y),
        };
        Self {
            id,
            side,
            coords,
            health: BASE_HEALTH,
            under_attack: false,
        }
    }

    pub fn alive(&self) -> bool {
        self.health > 0
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.health = (self.health - amount).max(0);
    }
}

use serde::{Deserialize, Serialize};

/// Represents a position or displacement on the playing field.
/// Screen axes: x grows to the right, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coords {
    pub x: f32,
    pub y: f32,
}

impl Coords {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the sum of two coordinates.
    pub fn add(&self, other: &Coords) -> Coords {
        Coords {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the displacement from `other` to `self`.
    pub fn sub(&self, other: &Coords) -> Coords {
        Coords {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    ///Returns the negated vector.
    pub fn neg(&self) -> Coords {
        Coords {
            x: -self.x,
            y: -self.y,
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Coords {
        Coords {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

/// Unit movement or facing direction. Each axis is one of -1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Direction {
    pub dx: i8,
    pub dy: i8,
}

impl Direction {
    pub const NONE: Direction = Direction { dx: 0, dy: 0 };
    pub const LEFT: Direction = Direction { dx: -1, dy: 0 };
    pub const RIGHT: Direction = Direction { dx: 1, dy: 0 };
    pub const UP: Direction = Direction { dx: 0, dy: -1 };
    pub const DOWN: Direction = Direction { dx: 0, dy: 1 };

    pub fn new(dx: i8, dy: i8) -> Self {
        Self {
            dx: dx.clamp(-1, 1),
            dy: dy.clamp(-1, 1),
        }
    }

    pub fn is_none(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }

    /// Adds a held direction, saturating each axis.
    pub fn sum(&self, other: Direction) -> Direction {
        Direction::new(self.dx + other.dx, self.dy + other.dy)
    }

    /// Removes a released direction, saturating each axis.
    pub fn sub(&self, other: Direction) -> Direction {
        Direction::new(self.dx - other.dx, self.dy - other.dy)
    }

    /// Splits the direction into its axis components, horizontal first.
    pub fn components(&self) -> Vec<Direction> {
        let mut parts = Vec::with_capacity(2);
        if self.dx != 0 {
            parts.push(Direction::new(self.dx, 0));
        }
        if self.dy != 0 {
            parts.push(Direction::new(0, self.dy));
        }
        parts
    }

    pub fn as_coords(&self) -> Coords {
        Coords::new(self.dx as f32, self.dy as f32)
    }

    /// Wire code in `0..=8`, row-major over `(dy, dx)`; `4` is no direction.
    pub fn code(&self) -> u8 {
        ((self.dy + 1) * 3 + (self.dx + 1)) as u8
    }

    pub fn from_code(code: u8) -> Option<Direction> {
        if code > 8 {
            return None;
        }
        let code = code as i8;
        Some(Direction {
            dx: code % 3 - 1,
            dy: code / 3 - 1,
        })
    }
}

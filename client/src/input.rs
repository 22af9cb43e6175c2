//! Player actions as delivered by the keyboard layer

use shared::Direction;
use std::str::FromStr;

/// A game action bound to one or more keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Fire,
    Left,
    Right,
    Down,
    Up,
    Tower,
    No,
}

impl InputEvent {
    /// Direction pushed by a movement action, `None` for everything else.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            InputEvent::Left => Some(Direction::LEFT),
            InputEvent::Right => Some(Direction::RIGHT),
            InputEvent::Up => Some(Direction::UP),
            InputEvent::Down => Some(Direction::DOWN),
            InputEvent::Fire | InputEvent::Tower | InputEvent::No => None,
        }
    }

    /// Movement actions that together produce `direction`.
    pub fn for_direction(direction: Direction) -> Vec<InputEvent> {
        let mut events = Vec::with_capacity(2);
        match direction.dx {
            -1 => events.push(InputEvent::Left),
            1 => events.push(InputEvent::Right),
            _ => {}
        }
        match direction.dy {
            -1 => events.push(InputEvent::Up),
            1 => events.push(InputEvent::Down),
            _ => {}
        }
        events
    }
}

impl FromStr for InputEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fire" => Ok(InputEvent::Fire),
            "left" => Ok(InputEvent::Left),
            "right" => Ok(InputEvent::Right),
            "down" => Ok(InputEvent::Down),
            "up" => Ok(InputEvent::Up),
            "tower" => Ok(InputEvent::Tower),
            "no" => Ok(InputEvent::No),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// Key transition reported by the keyboard layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Press(InputEvent),
    Release(InputEvent),
}

/// Line-based form used by the console client: `+left` presses, `-left`
/// releases, and a bare action is a press.
impl FromStr for InputCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(action) = s.strip_prefix('-') {
            Ok(InputCommand::Release(action.parse()?))
        } else {
            Ok(InputCommand::Press(s.trim_start_matches('+').parse()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_events_map_to_directions() {
        assert_eq!(InputEvent::Left.direction(), Some(Direction::LEFT));
        assert_eq!(InputEvent::Down.direction(), Some(Direction::DOWN));
        assert_eq!(InputEvent::Fire.direction(), None);
    }

    #[test]
    fn test_events_for_diagonal_direction() {
        assert_eq!(
            InputEvent::for_direction(Direction::new(-1, 1)),
            vec![InputEvent::Left, InputEvent::Down]
        );
        assert!(InputEvent::for_direction(Direction::NONE).is_empty());
    }

    #[test]
    fn test_console_commands() {
        assert_eq!("fire".parse(), Ok(InputCommand::Press(InputEvent::Fire)));
        assert_eq!(" +Left ".parse(), Ok(InputCommand::Press(InputEvent::Left)));
        assert_eq!("-up".parse(), Ok(InputCommand::Release(InputEvent::Up)));
        assert!("jump".parse::<InputCommand>().is_err());
    }

    #[test]
    fn test_direction_round_trip_through_events() {
        for dx in -1..=1 {
            for dy in -1..=1 {
                let direction = Direction::new(dx, dy);
                let rebuilt = InputEvent::for_direction(direction)
                    .iter()
                    .filter_map(InputEvent::direction)
                    .fold(Direction::NONE, |acc, d| acc.sum(d));
                assert_eq!(rebuilt, direction);
            }
        }
    }
}

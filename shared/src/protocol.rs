//! Wire protocol between a client and the match server.
//!
//! Every inbound frame is a message class plus a flat array of numbers. Frames
//! are decoded into a [`ServerMessage`] variant before any game code sees them;
//! anything that does not fit a known variant is a [`ProtocolError`].

use crate::geometry::{Coords, Direction};
use crate::sprites::Side;
use serde::{Deserialize, Serialize};

/// Text frame class of a join request.
pub const JOIN_REQUEST_CLASS: &str = "JoinRequest";
/// Text frame class of every sequenced client command.
pub const CLIENT_SNAP_CLASS: &str = "ClientSnap";
/// Binary frame class codes for outbound frames.
pub const JOIN_REQUEST_CODE: u16 = 8;
pub const CLIENT_SNAP_CODE: u16 = 9;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed binary frame: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("frame has no message class")]
    MissingClass,
    #[error("unknown message class {0}")]
    UnknownClass(u64),
    #[error("no handler subscribed for {0:?}")]
    Unhandled(MessageKind),
    #[error("payload is not an array of numbers")]
    NotNumeric,
    #[error("{kind:?} expects {expected} values, got {actual}")]
    Arity {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },
    #[error("{0} is not a valid identifier")]
    InvalidId(f64),
    #[error("{0} is not a valid direction code")]
    InvalidDirection(f64),
}

/// Raw inbound frame: message class and numeric payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub class: u16,
    pub data: Vec<f64>,
}

impl Frame {
    pub fn new(class: u16, data: Vec<f64>) -> Self {
        Self { class, data }
    }

    /// Parses a `{"class": n, "data": [...]}` text frame.
    pub fn from_json(text: &str) -> Result<Frame, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let class = value
            .get("class")
            .and_then(serde_json::Value::as_u64)
            .ok_or(ProtocolError::MissingClass)?;
        let class = u16::try_from(class).map_err(|_| ProtocolError::UnknownClass(class))?;

        let data = match value.get("data") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| item.as_f64().ok_or(ProtocolError::NotNumeric))
                .collect::<Result<Vec<f64>, _>>()?,
            _ => return Err(ProtocolError::NotNumeric),
        };

        Ok(Frame { class, data })
    }

    /// Parses a bincode-encoded frame.
    pub fn from_bincode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
        let frame: Frame = bincode::deserialize(bytes)?;
        if frame.data.iter().any(|v| !v.is_finite()) {
            return Err(ProtocolError::NotNumeric);
        }
        Ok(frame)
    }
}

/// Inbound message classes and their type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    RollbackAck,
    Collision,
    Move,
    Tower,
    BombInstall,
    Shout,
    JoinApproved,
    UnitCreated,
    CoinSpawned,
}

impl MessageKind {
    pub fn from_code(code: u16) -> Option<MessageKind> {
        match code {
            1 => Some(MessageKind::RollbackAck),
            2 => Some(MessageKind::Collision),
            3 => Some(MessageKind::Move),
            4 => Some(MessageKind::Tower),
            5 => Some(MessageKind::BombInstall),
            6 => Some(MessageKind::Shout),
            7 => Some(MessageKind::JoinApproved),
            10 => Some(MessageKind::UnitCreated),
            11 => Some(MessageKind::CoinSpawned),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            MessageKind::RollbackAck => 1,
            MessageKind::Collision => 2,
            MessageKind::Move => 3,
            MessageKind::Tower => 4,
            MessageKind::BombInstall => 5,
            MessageKind::Shout => 6,
            MessageKind::JoinApproved => 7,
            MessageKind::UnitCreated => 10,
            MessageKind::CoinSpawned => 11,
        }
    }

    fn arity(&self) -> usize {
        match self {
            MessageKind::RollbackAck | MessageKind::BombInstall => 1,
            MessageKind::JoinApproved | MessageKind::UnitCreated => 2,
            MessageKind::Collision | MessageKind::CoinSpawned => 3,
            MessageKind::Move | MessageKind::Tower | MessageKind::Shout => 4,
        }
    }
}

/// A validated inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RollbackAck { last_accepted: u32 },
    Collision { first: u32, second: u32, ordinal: u32 },
    Move { seq: u32, delta: Coords },
    Tower { at: Coords, direction: Direction, id: u32 },
    BombInstall { id: u32 },
    Shout { at: Coords, direction: Direction, id: u32 },
    JoinApproved { side: Side, opponent: u32 },
    UnitCreated { user: u32, unit: u32 },
    CoinSpawned { at: Coords, id: u32 },
}

impl ServerMessage {
    pub fn decode(kind: MessageKind, data: &[f64]) -> Result<ServerMessage, ProtocolError> {
        if data.len() != kind.arity() {
            return Err(ProtocolError::Arity {
                kind,
                expected: kind.arity(),
                actual: data.len(),
            });
        }

        let message = match kind {
            MessageKind::RollbackAck => ServerMessage::RollbackAck {
                last_accepted: id_at(data, 0)?,
            },
            MessageKind::Collision => ServerMessage::Collision {
                first: id_at(data, 0)?,
                second: id_at(data, 1)?,
                ordinal: id_at(data, 2)?,
            },
            MessageKind::Move => ServerMessage::Move {
                seq: id_at(data, 0)?,
                delta: coords_at(data, 2),
            },
            MessageKind::Tower => ServerMessage::Tower {
                at: coords_at(data, 0),
                direction: direction_at(data, 2)?,
                id: id_at(data, 3)?,
            },
            MessageKind::BombInstall => ServerMessage::BombInstall {
                id: id_at(data, 0)?,
            },
            MessageKind::Shout => ServerMessage::Shout {
                at: coords_at(data, 0),
                direction: direction_at(data, 2)?,
                id: id_at(data, 3)?,
            },
            MessageKind::JoinApproved => ServerMessage::JoinApproved {
                side: Side::from_code(id_at(data, 0)?),
                opponent: id_at(data, 1)?,
            },
            MessageKind::UnitCreated => ServerMessage::UnitCreated {
                user: id_at(data, 0)?,
                unit: id_at(data, 1)?,
            },
            MessageKind::CoinSpawned => ServerMessage::CoinSpawned {
                at: coords_at(data, 0),
                id: id_at(data, 2)?,
            },
        };
        Ok(message)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::RollbackAck { .. } => MessageKind::RollbackAck,
            ServerMessage::Collision { .. } => MessageKind::Collision,
            ServerMessage::Move { .. } => MessageKind::Move,
            ServerMessage::Tower { .. } => MessageKind::Tower,
            ServerMessage::BombInstall { .. } => MessageKind::BombInstall,
            ServerMessage::Shout { .. } => MessageKind::Shout,
            ServerMessage::JoinApproved { .. } => MessageKind::JoinApproved,
            ServerMessage::UnitCreated { .. } => MessageKind::UnitCreated,
            ServerMessage::CoinSpawned { .. } => MessageKind::CoinSpawned,
        }
    }
}

fn id_at(data: &[f64], index: usize) -> Result<u32, ProtocolError> {
    let value = data[index];
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(ProtocolError::InvalidId(value));
    }
    Ok(value as u32)
}

fn coords_at(data: &[f64], index: usize) -> Coords {
    Coords::new(data[index] as f32, data[index + 1] as f32)
}

fn direction_at(data: &[f64], index: usize) -> Result<Direction, ProtocolError> {
    let value = data[index];
    if value.fract() != 0.0 || !(0.0..=8.0).contains(&value) {
        return Err(ProtocolError::InvalidDirection(value));
    }
    Direction::from_code(value as u8).ok_or(ProtocolError::InvalidDirection(value))
}

/// Locally originated action carried by a `ClientSnap` frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapAction {
    Move { delta: Coords },
    Tower { at: Coords, direction: Direction, id: u32 },
    Bomb { id: u32 },
    Shout { at: Coords, direction: Direction, id: u32 },
}

impl SnapAction {
    pub fn code(&self) -> u8 {
        match self {
            SnapAction::Move { .. } => 0,
            SnapAction::Tower { .. } => 1,
            SnapAction::Bomb { .. } => 2,
            SnapAction::Shout { .. } => 3,
        }
    }

    fn args(&self) -> Vec<f64> {
        match self {
            SnapAction::Move { delta } => vec![delta.x as f64, delta.y as f64],
            SnapAction::Tower { at, direction, id } | SnapAction::Shout { at, direction, id } => {
                vec![
                    at.x as f64,
                    at.y as f64,
                    direction.code() as f64,
                    *id as f64,
                ]
            }
            SnapAction::Bomb { id } => vec![*id as f64],
        }
    }
}

/// Outbound command. Snaps are addressed by the sequence they were sent with.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    JoinRequest,
    Snap { seq: u32, action: SnapAction },
}

#[derive(Serialize)]
struct OutboundText<'a> {
    class: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request: Option<Vec<f64>>,
}

impl ClientCommand {
    /// Sequence the command was sent with; the join request is always `0`.
    pub fn sequence(&self) -> u32 {
        match self {
            ClientCommand::JoinRequest => 0,
            ClientCommand::Snap { seq, .. } => *seq,
        }
    }

    /// Payload as `[seq, kindCode, ...args]`; empty for the join request.
    pub fn request(&self) -> Vec<f64> {
        match self {
            ClientCommand::JoinRequest => Vec::new(),
            ClientCommand::Snap { seq, action } => {
                let mut request = vec![*seq as f64, action.code() as f64];
                request.extend(action.args());
                request
            }
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        let text = match self {
            ClientCommand::JoinRequest => OutboundText {
                class: JOIN_REQUEST_CLASS,
                request: None,
            },
            ClientCommand::Snap { .. } => OutboundText {
                class: CLIENT_SNAP_CLASS,
                request: Some(self.request()),
            },
        };
        Ok(serde_json::to_string(&text)?)
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>, ProtocolError> {
        let class = match self {
            ClientCommand::JoinRequest => JOIN_REQUEST_CODE,
            ClientCommand::Snap { .. } => CLIENT_SNAP_CODE,
        };
        Ok(bincode::serialize(&Frame::new(class, self.request()))?)
    }
}

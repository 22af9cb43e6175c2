use shared::{Side, TICK_RATE};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Encoding used for outbound frames. Inbound frames are accepted in both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Json,
    Bincode,
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Codec::Json),
            "bincode" => Ok(Codec::Bincode),
            other => Err(format!("unknown codec '{}', expected 'json' or 'bincode'", other)),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Json => write!(f, "json"),
            Codec::Bincode => write!(f, "bincode"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub user_id: u32,
    pub user_name: String,
    /// Side requested when joining; the server may assign the other one.
    pub side: Side,
    /// Position snapshots per second.
    pub send_rate: u32,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Unacknowledged commands allowed before sends are refused.
    pub max_events: usize,
    pub codec: Codec,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/game".to_string(),
            user_id: 1,
            user_name: "player".to_string(),
            side: Side::Man,
            send_rate: 30,
            tick_rate: TICK_RATE,
            max_events: 64,
            codec: Codec::Json,
        }
    }
}

impl ClientConfig {
    pub fn send_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.send_rate.max(1) as f64)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

//! # Match Client Library
//!
//! Client-side synchronization core for a two-player real-time match. The
//! library keeps a local copy of the game, applies the player's own actions
//! immediately, mirrors the opponent's actions as the server relays them, and
//! undoes local actions the server refused.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Every local action (moving, firing, placing a tower, planting a bomb) takes
//! effect on the local state as soon as it has been handed to the transport.
//! The player never waits for a round trip to see the result.
//!
//! ### Rollback
//! Each outbound command carries a sequence number and stays in the transport's
//! log until the server acknowledges it. A rollback acknowledgment names the
//! last command the server applied; everything logged after it is removed and
//! undone, newest first.
//!
//! ### Dead Reckoning
//! Unit movement is reported as a delta at a fixed rate, and only when the
//! unit actually moved since the previous report.
//!
//! ### Coordination-Free Identifiers
//! Both peers mint entity identifiers and sequence numbers without talking to
//! each other: the peer with the larger user id takes the odd series and the
//! other peer the even one.
//!
//! ## Module Organization
//!
//! ### Transport (`transport`)
//! - WebSocket connection with a dedicated writer task
//! - Outbound command log with backpressure and rollback
//! - Type-keyed dispatch of validated inbound messages
//!
//! ### Strategy (`strategy`)
//! - Join protocol from the join request to a running match
//! - Handlers for opponent events and collision notifications
//! - Local input handling and the undo of refused commands
//!
//! ### Simulation Tick (`tick`) and Collisions (`collision`)
//! - Fixed-rate motion, expiry, rewards, respawns and the end-of-match check
//! - Collision effects applied in the order they were reported
//!
//! ### Session (`network`)
//! Drives the strategy from a single task: inbound frames, local input, the
//! send loop and the simulation tick never run concurrently.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{Client, ClientConfig, InputCommand, InputEvent, Signals};
//! use tokio::sync::mpsc;
//!
//! # async fn play() -> Result<(), client::SyncError> {
//! let (signals, _signal_rx) = Signals::channel();
//! let (input_tx, input_rx) = mpsc::unbounded_channel();
//!
//! let mut client = Client::multiplayer(ClientConfig::default(), signals);
//! input_tx.send(InputCommand::Press(InputEvent::Right)).ok();
//! client.run(input_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod collision;
pub mod config;
pub mod error;
pub mod input;
pub mod network;
pub mod signals;
pub mod strategy;
pub mod tick;
pub mod transport;

pub use config::{ClientConfig, Codec};
pub use error::SyncError;
pub use input::{InputCommand, InputEvent};
pub use network::Client;
pub use signals::{GameSignal, Signals};
pub use strategy::{LocalProfiles, MultiPlayerStrategy, Phase, Profiles, Strategy};
pub use transport::{EventLog, Router, Transport};

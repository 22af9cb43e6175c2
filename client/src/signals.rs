//! Typed notifications from the synchronization core to the UI layer.

use crate::input::InputEvent;
use log::debug;
use shared::Side;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum GameSignal {
    /// The connection opened; the local user asks to join on `side`.
    JoinRequested { user_id: u32, side: Side },
    MatchStarted { side: Side },
    /// `won` is true when the opponent's base fell.
    MatchFinished { won: bool },
    /// The held action no longer moves the unit and should be released.
    UndoAction(InputEvent),
    ConnectivityError(String),
    ProtocolError(String),
    /// The connection failed or closed uncleanly.
    TransportError(String),
    /// Rejected commands could not all be undone; the match goes on.
    InternalError(String),
}

/// Sending half of the signal channel. Emitting never fails; signals are
/// dropped once the UI stops listening.
#[derive(Debug, Clone)]
pub struct Signals {
    tx: mpsc::UnboundedSender<GameSignal>,
}

impl Signals {
    pub fn channel() -> (Signals, mpsc::UnboundedReceiver<GameSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Signals { tx }, rx)
    }

    pub fn emit(&self, signal: GameSignal) {
        if let Err(e) = self.tx.send(signal) {
            debug!("Dropping signal without listener: {:?}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_are_delivered_in_order() {
        let (signals, mut rx) = Signals::channel();
        signals.emit(GameSignal::MatchStarted { side: Side::Man });
        signals.emit(GameSignal::MatchFinished { won: true });

        assert_eq!(
            rx.try_recv().unwrap(),
            GameSignal::MatchStarted { side: Side::Man }
        );
        assert_eq!(rx.try_recv().unwrap(), GameSignal::MatchFinished { won: true });
    }

    #[test]
    fn test_emit_without_listener_is_silent() {
        let (signals, rx) = Signals::channel();
        drop(rx);
        signals.emit(GameSignal::ProtocolError("late".to_string()));
    }
}

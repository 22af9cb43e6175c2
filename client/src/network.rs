use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::input::InputCommand;
use crate::signals::{GameSignal, Signals};
use crate::strategy::{MultiPlayerStrategy, Strategy};
use crate::transport::{InboundEvent, Router, Transport};
use log::{debug, error, info, warn};
use shared::User;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// Timer work that came due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    Send,
    Tick,
}

/// The send loop and simulation tick timers. When both are due in the same
/// instant the send loop comes first.
pub struct Schedule {
    send: Interval,
    tick: Interval,
}

impl Schedule {
    pub fn new(config: &ClientConfig) -> Self {
        let mut send = interval(config.send_period());
        send.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tick = interval(config.tick_period());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { send, tick }
    }

    pub async fn next(&mut self) -> Due {
        tokio::select! {
            biased;
            _ = self.send.tick() => Due::Send,
            _ = self.tick.tick() => Due::Tick,
        }
    }
}

/// Owns the connection and the strategy and drives both from one task.
pub struct Client<S: Strategy> {
    config: ClientConfig,
    strategy: S,
    router: Router<S>,
    signals: Signals,
}

impl Client<MultiPlayerStrategy> {
    pub fn multiplayer(config: ClientConfig, signals: Signals) -> Self {
        let me = User::new(config.user_id, config.user_name.clone());
        let strategy = MultiPlayerStrategy::new(me, config.side, signals.clone());
        Client::new(config, strategy, signals)
    }
}

impl<S: Strategy + 'static> Client<S> {
    pub fn new(config: ClientConfig, strategy: S, signals: Signals) -> Self {
        let mut router = Router::new();
        S::subscribe(&mut router);
        Self {
            config,
            strategy,
            router,
            signals,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Connects, joins a match and plays it until the match or the
    /// connection ends.
    ///
    /// Inbound frames, local input and the timers of [`Schedule`] are served
    /// in that priority order.
    pub async fn run(
        &mut self,
        mut input: mpsc::UnboundedReceiver<InputCommand>,
    ) -> Result<(), SyncError> {
        info!("Connecting to {}...", self.config.server_url);
        let (mut transport, mut inbound) = match Transport::connect(&self.config).await {
            Ok(connection) => connection,
            Err(e) => {
                self.signals.emit(GameSignal::TransportError(e.to_string()));
                return Err(e);
            }
        };

        self.signals.emit(GameSignal::JoinRequested {
            user_id: self.config.user_id,
            side: self.config.side,
        });
        let joined = self.strategy.join(&mut transport);
        self.report(joined)?;

        let mut schedule = Schedule::new(&self.config);

        loop {
            tokio::select! {
                biased;

                event = inbound.next() => match event {
                    InboundEvent::Frame(frame) => {
                        let result = self.router.dispatch(&mut self.strategy, &mut transport, &frame);
                        self.report(result)?;
                    }
                    InboundEvent::Malformed(e) => {
                        warn!("Dropping malformed frame: {}", e);
                        self.signals.emit(GameSignal::ProtocolError(e.to_string()));
                    }
                    InboundEvent::Closed { clean: true, reason } => {
                        info!("Server closed the connection: {}", reason);
                        if !self.strategy.is_finished() {
                            self.signals.emit(GameSignal::MatchFinished { won: false });
                        }
                        return Ok(());
                    }
                    InboundEvent::Closed { clean: false, reason } => {
                        error!("Connection lost: {}", reason);
                        self.signals.emit(GameSignal::TransportError(reason));
                        return Err(SyncError::Disconnected);
                    }
                    InboundEvent::Failed(e) => {
                        error!("Connection failed: {}", e);
                        self.signals.emit(GameSignal::TransportError(e.to_string()));
                        return Err(e);
                    }
                },

                Some(command) = input.recv() => {
                    let result = match command {
                        InputCommand::Press(event) => self.strategy.on_new_command(&mut transport, event),
                        InputCommand::Release(event) => self.strategy.on_stop_command(event),
                    };
                    self.report(result)?;
                },

                due = schedule.next(), if self.strategy.is_running() => {
                    self.on_due(due, &mut transport)?;
                    if self.strategy.is_finished() {
                        info!("Match over after {} ticks", self.strategy.state().tick);
                        return Ok(());
                    }
                },
            }
        }
    }

    fn on_due(&mut self, due: Due, transport: &mut Transport) -> Result<(), SyncError> {
        let result = match due {
            Due::Send => self.strategy.send_loop(transport),
            Due::Tick => self.strategy.game_loop(transport),
        };
        self.report(result)
    }

    /// Turns recoverable failures into signals; internal errors end the session.
    fn report(&self, result: Result<(), SyncError>) -> Result<(), SyncError> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_protocol() => {
                warn!("Protocol error: {}", e);
                self.signals.emit(GameSignal::ProtocolError(e.to_string()));
                Ok(())
            }
            Err(e) if e.is_connectivity() => {
                warn!("Connectivity error: {}", e);
                self.signals.emit(GameSignal::ConnectivityError(e.to_string()));
                Ok(())
            }
            Err(e) if e.is_rollback() => {
                error!("Rollback incomplete: {}", e);
                self.signals.emit(GameSignal::InternalError(e.to_string()));
                Ok(())
            }
            Err(e) => {
                error!("Aborting match: {}", e);
                Err(e)
            }
        }
    }
}

/// Logs every signal until the channel closes.
pub async fn log_signals(mut signals: mpsc::UnboundedReceiver<GameSignal>) {
    while let Some(signal) = signals.recv().await {
        match &signal {
            GameSignal::MatchFinished { won: true } => info!("You won!"),
            GameSignal::MatchFinished { won: false } => info!("You lost"),
            GameSignal::ConnectivityError(e) => warn!("Connectivity problem: {}", e),
            GameSignal::ProtocolError(e) => warn!("Bad message from server: {}", e),
            GameSignal::TransportError(e) => error!("Transport failure: {}", e),
            GameSignal::InternalError(e) => error!("Out of sync with the server: {}", e),
            other => debug!("Signal: {:?}", other),
        }
    }
}

//! Match strategies.
//!
//! A strategy owns the [`GameState`] of the match, predicts the effects of
//! local input, applies events the opponent caused, and undoes local commands
//! the server did not accept.

use crate::collision::CollisionQueue;
use crate::error::SyncError;
use crate::input::InputEvent;
use crate::signals::{GameSignal, Signals};
use crate::tick;
use crate::transport::{Router, Transport};
use log::{debug, info, warn};
use shared::{
    Base, Bomb, Bullet, ClientCommand, Coin, Coords, Direction, GameState, IdAllocator,
    MessageKind, Player, ServerMessage, Side, SnapAction, SpriteHandle, Tower, Unit, User,
};
use std::collections::BTreeMap;

pub trait Strategy {
    /// Registers the strategy's handlers for inbound messages.
    fn subscribe(router: &mut Router<Self>)
    where
        Self: Sized;

    /// Asks the server for a match.
    fn join(&mut self, transport: &mut Transport) -> Result<(), SyncError>;

    /// A key was pressed.
    fn on_new_command(
        &mut self,
        transport: &mut Transport,
        event: InputEvent,
    ) -> Result<(), SyncError>;

    /// A key was released.
    fn on_stop_command(&mut self, event: InputEvent) -> Result<(), SyncError>;

    /// Reports local movement since the last report.
    fn send_loop(&mut self, transport: &mut Transport) -> Result<(), SyncError>;

    /// Runs one simulation tick. A command the tick could not send is
    /// reported after the whole tick ran, end-of-match check included.
    fn game_loop(&mut self, transport: &mut Transport) -> Result<(), SyncError>;

    fn is_running(&self) -> bool;

    fn is_finished(&self) -> bool;

    fn state(&self) -> &GameState;
}

/// Progress of a match from the local client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    JoinRequested,
    /// The server picked our side and opponent.
    SideAssigned,
    /// At least one unit announced, waiting for the rest.
    AwaitingUnits,
    Running,
    Finished,
}

/// Source of user profiles.
pub trait Profiles {
    fn fetch(&self, user_id: u32) -> Result<User, SyncError>;
}

/// Profiles synthesized from the user id alone.
#[derive(Debug, Default)]
pub struct LocalProfiles;

impl Profiles for LocalProfiles {
    fn fetch(&self, user_id: u32) -> Result<User, SyncError> {
        Ok(User::new(user_id, format!("player-{}", user_id)))
    }
}

/// Two-player strategy with local prediction and server-driven rollback.
pub struct MultiPlayerStrategy {
    me: User,
    requested_side: Side,
    my_side: Option<Side>,
    phase: Phase,
    state: GameState,
    /// Copy of the state as of the last movement report.
    sent_state: GameState,
    ids: Option<IdAllocator>,
    /// Unit announced for each user.
    joined: BTreeMap<u32, u32>,
    collisions: CollisionQueue,
    signals: Signals,
    profiles: Box<dyn Profiles>,
}

impl MultiPlayerStrategy {
    pub fn new(me: User, requested_side: Side, signals: Signals) -> Self {
        Self {
            me,
            requested_side,
            my_side: None,
            phase: Phase::Idle,
            state: GameState::new(),
            sent_state: GameState::new(),
            ids: None,
            joined: BTreeMap::new(),
            collisions: CollisionQueue::new(),
            signals,
            profiles: Box::new(LocalProfiles),
        }
    }

    pub fn with_profiles(mut self, profiles: Box<dyn Profiles>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn my_side(&self) -> Option<Side> {
        self.my_side
    }

    /// Mutable state access for the embedding game layer.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    fn on_message(
        &mut self,
        transport: &mut Transport,
        message: &ServerMessage,
    ) -> Result<(), SyncError> {
        if self.phase == Phase::Finished {
            debug!("Match finished, dropping {:?}", message.kind());
            return Ok(());
        }

        match message {
            ServerMessage::RollbackAck { last_accepted } => {
                self.on_rollback_ack(transport, *last_accepted)
            }
            ServerMessage::JoinApproved { side, opponent } => {
                self.on_join_approved(*side, *opponent)
            }
            ServerMessage::UnitCreated { user, unit } => self.on_unit_created(*user, *unit),
            other if self.phase != Phase::Running => {
                debug!("Match not running, dropping {:?}", other.kind());
                Ok(())
            }
            ServerMessage::Collision {
                first,
                second,
                ordinal,
            } => {
                self.on_collision(*first, *second, *ordinal);
                Ok(())
            }
            ServerMessage::Move { delta, .. } => {
                self.on_move(*delta);
                Ok(())
            }
            ServerMessage::Tower { at, direction, id } => {
                let side = self.opponent_side()?;
                self.state.towers.push(Tower::new(*id, *at, *direction, side));
                Ok(())
            }
            ServerMessage::BombInstall { id } => self.on_bomb_install(*id),
            ServerMessage::Shout { at, direction, id } => {
                self.state.add_bullet(Bullet::new(*id, *direction, *at));
                Ok(())
            }
            ServerMessage::CoinSpawned { at, id } => {
                self.state.coins.push(Coin::new(*id, *at));
                Ok(())
            }
        }
    }

    /// Undoes every command after `last_accepted`. A command that cannot be
    /// undone does not keep the older ones in place.
    fn on_rollback_ack(
        &mut self,
        transport: &mut Transport,
        last_accepted: u32,
    ) -> Result<(), SyncError> {
        let mut failed = 0;
        let mut first = None;
        for command in transport.rollback(last_accepted) {
            if let Err(e) = self.rollback_event(&command) {
                warn!("Could not undo {:?}: {}", command, e);
                failed += 1;
                first.get_or_insert(e);
            }
        }
        match first {
            Some(first) => Err(SyncError::Rollback {
                failed,
                first: Box::new(first),
            }),
            None => Ok(()),
        }
    }

    fn on_join_approved(&mut self, side: Side, opponent: u32) -> Result<(), SyncError> {
        if self.phase != Phase::JoinRequested {
            warn!("Unexpected join approval in phase {:?}", self.phase);
            return Ok(());
        }

        let rival = self.profiles.fetch(opponent)?;
        info!(
            "Joined as {} against {} ({})",
            side, rival.name, rival.id
        );

        self.state.users = vec![self.me.clone(), rival];
        self.ids = Some(IdAllocator::for_peers(self.me.id, opponent));
        self.my_side = Some(side);
        self.phase = if self.joined.is_empty() {
            Phase::SideAssigned
        } else {
            Phase::AwaitingUnits
        };
        self.try_start()
    }

    fn on_unit_created(&mut self, user: u32, unit: u32) -> Result<(), SyncError> {
        if self.phase == Phase::Running {
            debug!("Ignoring late unit {} for user {}", unit, user);
            return Ok(());
        }

        debug!("User {} controls unit {}", user, unit);
        self.joined.insert(user, unit);
        if self.phase == Phase::SideAssigned {
            self.phase = Phase::AwaitingUnits;
        }
        self.try_start()
    }

    /// Builds players, units and bases once both participants are known.
    fn try_start(&mut self) -> Result<(), SyncError> {
        if !matches!(self.phase, Phase::SideAssigned | Phase::AwaitingUnits) {
            return Ok(());
        }
        let (Some(my_side), Some(ids)) = (self.my_side, self.ids.as_mut()) else {
            return Ok(());
        };
        let units: Option<Vec<(User, u32)>> = self
            .state
            .users
            .iter()
            .map(|user| self.joined.get(&user.id).map(|unit| (user.clone(), *unit)))
            .collect();
        let Some(units) = units else {
            return Ok(());
        };
        let base_ids = units
            .iter()
            .map(|_| ids.next_id())
            .collect::<Result<Vec<u32>, _>>()?;

        let mut sides = Vec::with_capacity(units.len());
        for (user, unit_id) in units {
            let side = if user.id == self.me.id {
                my_side
            } else {
                my_side.other()
            };
            let unit = Unit::new(unit_id, side);
            self.state.players.push(Player::new(user, &unit));
            self.state.units.push(unit);
            sides.push(side);
        }
        for (side, id) in sides.into_iter().zip(base_ids) {
            self.state.bases.push(Base::new(id, side));
        }

        self.sent_state = self.state.clone();
        self.phase = Phase::Running;
        info!(
            "Match started: {} players, playing {}",
            self.state.players.len(),
            my_side
        );
        self.signals.emit(GameSignal::MatchStarted { side: my_side });
        Ok(())
    }

    fn on_collision(&mut self, first: u32, second: u32, ordinal: u32) {
        let Some(a) = self.state.find_sprite(first) else {
            debug!("Collision with unknown sprite {}", first);
            return;
        };

        let pair = match a {
            SpriteHandle::Tower(_) | SpriteHandle::Unit(_) => self
                .bullet_at(second, ordinal)
                .or_else(|| self.state.find_sprite(second))
                .map(|b| (a, b)),
            _ => match self.state.find_sprite(second) {
                Some(b @ SpriteHandle::Tower(_)) => self
                    .bullet_at(first, ordinal)
                    .or(Some(a))
                    .map(|a| (a, b)),
                other => other.map(|b| (a, b)),
            },
        };

        match pair {
            Some((a, b)) => {
                self.collisions.append(a, b);
                self.collisions.run(&mut self.state);
            }
            None => debug!("Collision with unknown sprite {}", second),
        }
    }

    /// The `ordinal`-th (1-based) bullet with `id`, oldest first.
    fn bullet_at(&self, id: u32, ordinal: u32) -> Option<SpriteHandle> {
        let index = (ordinal as usize).checked_sub(1)?;
        self.state
            .bullets_with_id(id)
            .get(index)
            .map(|bullet| SpriteHandle::Bullet(bullet.serial))
    }

    fn on_move(&mut self, delta: Coords) {
        let Some(my_side) = self.my_side else {
            return;
        };
        let opponent = self
            .state
            .player_by_side(my_side.other())
            .map(|player| player.unit);
        match opponent.and_then(|unit| self.state.unit_mut(unit)) {
            Some(unit) => unit.correct_coords(delta),
            None => debug!("Move for unknown opponent"),
        }
    }

    fn on_bomb_install(&mut self, id: u32) -> Result<(), SyncError> {
        let my_side = self.side()?;
        let Some(base) = self.state.base_by_side(my_side) else {
            debug!("No base to plant bomb {} at", id);
            return Ok(());
        };
        let bomb = Bomb::new(id, my_side.other(), base);
        info!("Opponent planted bomb {}", id);
        self.state.bombs.push(bomb);
        Ok(())
    }

    /// Undoes the local effect of a command the server rejected.
    pub fn rollback_event(&mut self, command: &ClientCommand) -> Result<(), SyncError> {
        let action = match command {
            ClientCommand::JoinRequest => {
                return Err(SyncError::internal("join request cannot be rolled back"))
            }
            ClientCommand::Snap { action, .. } => action,
        };
        info!("Rolling back {:?}", command);

        match action {
            SnapAction::Move { delta } => {
                let unit_id = self.my_player()?.unit;
                let undo = delta.neg();
                self.my_unit_mut()?.correct_coords(undo);
                // Keep the next movement report from repeating the undo.
                if let Some(unit) = self.sent_state.unit_mut(unit_id) {
                    unit.correct_coords(undo);
                }
            }
            SnapAction::Shout { id, .. } => {
                let newest = self.state.bullets_with_id(*id).last().map(|b| b.serial);
                if let Some(serial) = newest {
                    self.state.bullets.retain(|b| b.serial != serial);
                }
            }
            SnapAction::Tower { id, .. } => self.state.towers.retain(|t| t.id != *id),
            SnapAction::Bomb { id } => self.state.bombs.retain(|b| b.id != *id),
        }
        Ok(())
    }

    fn side(&self) -> Result<Side, SyncError> {
        self.my_side
            .ok_or_else(|| SyncError::internal("side not assigned"))
    }

    fn opponent_side(&self) -> Result<Side, SyncError> {
        self.side().map(|side| side.other())
    }

    fn allocator(&mut self) -> Result<&mut IdAllocator, SyncError> {
        self.ids
            .as_mut()
            .ok_or_else(|| SyncError::internal("identifier series not assigned"))
    }

    fn my_player(&self) -> Result<&Player, SyncError> {
        self.state
            .players
            .iter()
            .find(|player| player.user.id == self.me.id)
            .ok_or_else(|| SyncError::internal("local player missing"))
    }

    fn my_unit_mut(&mut self) -> Result<&mut Unit, SyncError> {
        let unit_id = self.my_player()?.unit;
        self.state
            .unit_mut(unit_id)
            .ok_or_else(|| SyncError::internal("local unit missing"))
    }

    fn fire(&mut self, transport: &mut Transport) -> Result<(), SyncError> {
        self.send_loop(transport)?;

        let unit = self.my_unit_mut()?;
        let (id, at, direction) = (unit.id, unit.center(), unit.facing);
        let seq = self.allocator()?.next_id()?;
        transport.send(ClientCommand::Snap {
            seq,
            action: SnapAction::Shout { at, direction, id },
        })?;

        self.state.add_bullet(Bullet::new(id, direction, at));
        Ok(())
    }

    fn place_tower(&mut self, transport: &mut Transport) -> Result<(), SyncError> {
        if !self.my_unit_mut()?.on_his_half() {
            debug!("Towers can only be placed on our half");
            return Ok(());
        }
        self.send_loop(transport)?;

        let side = self.side()?;
        let unit = self.my_unit_mut()?;
        let (at, direction) = (unit.coords, unit.facing);
        let ids = self.allocator()?;
        let id = ids.next_id()?;
        let seq = ids.next_id()?;
        transport.send(ClientCommand::Snap {
            seq,
            action: SnapAction::Tower { at, direction, id },
        })?;

        self.state.towers.push(Tower::new(id, at, direction, side));
        Ok(())
    }

    fn steer(&mut self, change: Direction, pressed: bool) -> Result<(), SyncError> {
        let unit = self.my_unit_mut()?;
        let direction = if pressed {
            unit.direction.sum(change)
        } else {
            unit.direction.sub(change)
        };
        unit.set_direction(direction);
        Ok(())
    }
}

impl Strategy for MultiPlayerStrategy {
    fn subscribe(router: &mut Router<Self>) {
        for kind in [
            MessageKind::RollbackAck,
            MessageKind::Collision,
            MessageKind::Move,
            MessageKind::Tower,
            MessageKind::BombInstall,
            MessageKind::Shout,
            MessageKind::JoinApproved,
            MessageKind::UnitCreated,
            MessageKind::CoinSpawned,
        ] {
            router.subscribe(kind, Self::on_message);
        }
    }

    fn join(&mut self, transport: &mut Transport) -> Result<(), SyncError> {
        if self.phase != Phase::Idle {
            warn!("Join requested twice");
            return Ok(());
        }
        transport.send(ClientCommand::JoinRequest)?;
        info!("Requested to join as {} ({})", self.me.name, self.requested_side);
        self.phase = Phase::JoinRequested;
        Ok(())
    }

    fn on_new_command(
        &mut self,
        transport: &mut Transport,
        event: InputEvent,
    ) -> Result<(), SyncError> {
        if !self.is_running() {
            return Ok(());
        }
        match event {
            InputEvent::Fire => self.fire(transport),
            InputEvent::Tower => self.place_tower(transport),
            InputEvent::No => Ok(()),
            movement => match movement.direction() {
                Some(direction) => self.steer(direction, true),
                None => Ok(()),
            },
        }
    }

    fn on_stop_command(&mut self, event: InputEvent) -> Result<(), SyncError> {
        if !self.is_running() {
            return Ok(());
        }
        match event.direction() {
            Some(direction) => self.steer(direction, false),
            None => Ok(()),
        }
    }

    fn send_loop(&mut self, transport: &mut Transport) -> Result<(), SyncError> {
        if !self.is_running() {
            return Ok(());
        }

        let unit_id = self.my_player()?.unit;
        let now = self.my_unit_mut()?.coords;
        if let Some(sent) = self.sent_state.unit(unit_id).map(|unit| unit.coords) {
            if sent != now {
                let seq = self.allocator()?.next_id()?;
                transport.send(ClientCommand::Snap {
                    seq,
                    action: SnapAction::Move {
                        delta: now.sub(&sent),
                    },
                })?;
            }
        }

        self.sent_state = self.state.clone();
        Ok(())
    }

    fn game_loop(&mut self, transport: &mut Transport) -> Result<(), SyncError> {
        if !self.is_running() {
            return Ok(());
        }
        let my_side = self.side()?;
        let my_unit = self.my_player()?.unit;

        if tick::advance(&mut self.state, my_unit) {
            let facing = self.my_unit_mut()?.facing;
            for event in InputEvent::for_direction(facing) {
                self.signals.emit(GameSignal::UndoAction(event));
            }
        }

        let ids = self
            .ids
            .as_mut()
            .ok_or_else(|| SyncError::internal("identifier series not assigned"))?;
        // A refused bomb is retried next tick and must not hold up the end check.
        let planted = tick::plant_bombs(&mut self.state, ids, my_side, transport);
        tick::reward_towers(&mut self.state, ids)?;
        tick::respawn_units(&mut self.state);
        tick::prune(&mut self.state);

        if let Some(fallen) = tick::fallen_base(&self.state) {
            let won = fallen != my_side;
            info!(
                "Match finished at tick {}: {} base destroyed, {}",
                self.state.tick,
                fallen,
                if won { "won" } else { "lost" }
            );
            self.phase = Phase::Finished;
            self.signals.emit(GameSignal::MatchFinished { won });
        }
        planted
    }

    fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    fn state(&self) -> &GameState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared::Frame;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        strategy: MultiPlayerStrategy,
        router: Router<MultiPlayerStrategy>,
        transport: Transport,
        outbound: mpsc::UnboundedReceiver<ClientCommand>,
        signals: mpsc::UnboundedReceiver<GameSignal>,
    }

    impl Harness {
        fn new(me: u32, max_events: usize) -> Self {
            let (signals, signal_rx) = Signals::channel();
            let (tx, outbound) = mpsc::unbounded_channel();
            let mut router = Router::new();
            MultiPlayerStrategy::subscribe(&mut router);
            Self {
                strategy: MultiPlayerStrategy::new(User::new(me, "me"), Side::Man, signals),
                router,
                transport: Transport::new(tx, max_events),
                outbound,
                signals: signal_rx,
            }
        }

        fn deliver(&mut self, kind: MessageKind, data: &[f64]) -> Result<(), SyncError> {
            let frame = Frame::new(kind.code(), data.to_vec());
            self.router
                .dispatch(&mut self.strategy, &mut self.transport, &frame)
        }

        /// Runs the join flow: side MAN, opponent 9, units 1 and 3.
        fn start(me: u32) -> Self {
            Self::start_with(me, 64)
        }

        fn start_with(me: u32, max_events: usize) -> Self {
            let mut harness = Self::new(me, max_events);
            assert_ok!(harness.strategy.join(&mut harness.transport));
            assert_ok!(harness.deliver(MessageKind::JoinApproved, &[0.0, 9.0]));
            assert_ok!(harness.deliver(MessageKind::UnitCreated, &[me as f64, 1.0]));
            assert_ok!(harness.deliver(MessageKind::UnitCreated, &[9.0, 3.0]));
            harness.drain_outbound();
            harness
        }

        fn drain_outbound(&mut self) -> Vec<ClientCommand> {
            let mut sent = Vec::new();
            while let Ok(command) = self.outbound.try_recv() {
                sent.push(command);
            }
            sent
        }

        fn drain_signals(&mut self) -> Vec<GameSignal> {
            let mut seen = Vec::new();
            while let Ok(signal) = self.signals.try_recv() {
                seen.push(signal);
            }
            seen
        }

        fn my_unit(&self) -> Unit {
            self.strategy.state().unit(1).cloned().unwrap()
        }
    }

    #[test]
    fn test_join_flow_starts_match() {
        let mut harness = Harness::new(5, 64);
        assert_ok!(harness.strategy.join(&mut harness.transport));
        assert_eq!(harness.strategy.phase(), Phase::JoinRequested);
        assert_eq!(harness.drain_outbound(), vec![ClientCommand::JoinRequest]);

        assert_ok!(harness.deliver(MessageKind::JoinApproved, &[0.0, 9.0]));
        assert_eq!(harness.strategy.phase(), Phase::SideAssigned);

        assert_ok!(harness.deliver(MessageKind::UnitCreated, &[5.0, 1.0]));
        assert_eq!(harness.strategy.phase(), Phase::AwaitingUnits);
        assert!(!harness.strategy.is_running());

        assert_ok!(harness.deliver(MessageKind::UnitCreated, &[9.0, 3.0]));
        assert!(harness.strategy.is_running());

        let state = harness.strategy.state();
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.units.len(), 2);
        assert_eq!(state.bases.len(), 2);
        // 9 > 5, so this client mints the even series.
        let base_ids: Vec<u32> = state.bases.iter().map(|b| b.id).collect();
        assert_eq!(base_ids, vec![2, 4]);
        assert_eq!(state.unit(1).map(|u| u.side), Some(Side::Man));
        assert_eq!(state.unit(3).map(|u| u.side), Some(Side::Alien));
        assert_eq!(
            harness.drain_signals(),
            vec![GameSignal::MatchStarted { side: Side::Man }]
        );
    }

    #[test]
    fn test_units_announced_before_approval() {
        let mut harness = Harness::new(5, 64);
        assert_ok!(harness.strategy.join(&mut harness.transport));
        assert_ok!(harness.deliver(MessageKind::UnitCreated, &[9.0, 3.0]));
        assert_ok!(harness.deliver(MessageKind::UnitCreated, &[5.0, 1.0]));
        assert_eq!(harness.strategy.phase(), Phase::JoinRequested);

        assert_ok!(harness.deliver(MessageKind::JoinApproved, &[1.0, 9.0]));
        assert!(harness.strategy.is_running());
        assert_eq!(harness.strategy.my_side(), Some(Side::Alien));
    }

    #[test]
    fn test_events_before_start_are_dropped() {
        let mut harness = Harness::new(5, 64);
        assert_ok!(harness.deliver(MessageKind::Shout, &[1.0, 1.0, 5.0, 3.0]));
        assert_ok!(harness.deliver(MessageKind::Move, &[1.0, 0.0, 5.0, 0.0]));
        assert!(harness.strategy.state().bullets.is_empty());
    }

    #[test]
    fn test_send_loop_reports_delta() {
        let mut harness = Harness::start(5);
        harness.strategy.state_mut().unit_mut(1).unwrap().coords = Coords::new(0.0, 0.0);
        assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        harness.drain_outbound();

        harness.strategy.state_mut().unit_mut(1).unwrap().coords = Coords::new(10.0, 0.0);
        assert_ok!(harness.strategy.send_loop(&mut harness.transport));

        let sent = harness.drain_outbound();
        assert_eq!(sent.len(), 1);
        let request = sent[0].request();
        assert_eq!(request[1], 0.0);
        assert_approx_eq!(request[2], 10.0);
        assert_approx_eq!(request[3], 0.0);

        assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        assert!(harness.drain_outbound().is_empty());
    }

    #[test]
    fn test_failed_report_keeps_snapshot() {
        let mut harness = Harness::start(5);
        harness.strategy.state_mut().unit_mut(1).unwrap().correct_coords(Coords::new(7.0, 0.0));
        harness.outbound.close();

        assert_err!(harness.strategy.send_loop(&mut harness.transport));
        let unit = harness.my_unit();
        assert_ne!(harness.strategy.sent_state.unit(1).map(|u| u.coords), Some(unit.coords));
    }

    #[test]
    fn test_held_directions_accumulate() {
        let mut harness = Harness::start(5);
        let strategy = &mut harness.strategy;
        assert_ok!(strategy.on_new_command(&mut harness.transport, InputEvent::Up));
        assert_ok!(strategy.on_new_command(&mut harness.transport, InputEvent::Right));
        assert_eq!(harness.my_unit().direction, Direction::new(1, -1));

        assert_ok!(harness.strategy.on_stop_command(InputEvent::Up));
        assert_eq!(harness.my_unit().direction, Direction::RIGHT);
        assert_ok!(harness.strategy.on_stop_command(InputEvent::Fire));
        assert_eq!(harness.my_unit().direction, Direction::RIGHT);
    }

    #[test]
    fn test_fire_sends_then_spawns_bullet() {
        let mut harness = Harness::start(5);
        assert_ok!(harness.strategy.on_new_command(&mut harness.transport, InputEvent::Fire));

        let sent = harness.drain_outbound();
        assert!(matches!(
            sent.as_slice(),
            [ClientCommand::Snap { action: SnapAction::Shout { id: 1, .. }, .. }]
        ));
        let bullets = &harness.strategy.state().bullets;
        assert_eq!(bullets.len(), 1);
        assert_eq!(bullets[0].id, 1);
        assert_eq!(bullets[0].direction, Direction::RIGHT);
    }

    #[test]
    fn test_fire_under_backpressure_has_no_local_effect() {
        let mut harness = Harness::new(5, 1);
        assert_ok!(harness.strategy.join(&mut harness.transport));
        assert_ok!(harness.deliver(MessageKind::JoinApproved, &[0.0, 9.0]));
        assert_ok!(harness.deliver(MessageKind::UnitCreated, &[5.0, 1.0]));
        assert_ok!(harness.deliver(MessageKind::UnitCreated, &[9.0, 3.0]));

        let result = harness
            .strategy
            .on_new_command(&mut harness.transport, InputEvent::Fire);
        assert!(matches!(result, Err(SyncError::Backpressure { .. })));
        assert!(harness.strategy.state().bullets.is_empty());
    }

    #[test]
    fn test_tower_only_on_own_half() {
        let mut harness = Harness::start(5);
        assert_ok!(harness.strategy.on_new_command(&mut harness.transport, InputEvent::Tower));
        assert_eq!(harness.strategy.state().towers.len(), 1);
        assert_eq!(harness.strategy.state().towers[0].side, Side::Man);

        harness.strategy.state_mut().unit_mut(1).unwrap().coords = Unit::spawn_point(Side::Alien);
        harness.drain_outbound();
        assert_ok!(harness.strategy.on_new_command(&mut harness.transport, InputEvent::Tower));
        assert_eq!(harness.strategy.state().towers.len(), 1);
        assert!(harness
            .drain_outbound()
            .iter()
            .all(|c| !matches!(c, ClientCommand::Snap { action: SnapAction::Tower { .. }, .. })));
    }

    #[test]
    fn test_remote_events_use_opponent_side() {
        let mut harness = Harness::start(5);
        assert_ok!(harness.deliver(MessageKind::Tower, &[100.0, 100.0, 3.0, 11.0]));
        assert_ok!(harness.deliver(MessageKind::BombInstall, &[13.0]));
        assert_ok!(harness.deliver(MessageKind::CoinSpawned, &[50.0, 60.0, 15.0]));
        assert_ok!(harness.deliver(MessageKind::Shout, &[20.0, 30.0, 3.0, 3.0]));

        let state = harness.strategy.state();
        assert_eq!(state.towers[0].side, Side::Alien);
        assert_eq!(state.towers[0].direction, Direction::LEFT);
        assert_eq!(state.bombs[0].side, Side::Alien);
        assert_eq!(state.bombs[0].target, Side::Man);
        assert!(state.bombs[0].destruction_ticks.is_some());
        assert_eq!(state.coins[0].id, 15);
        assert_eq!(state.bullets[0].id, 3);
    }

    #[test]
    fn test_remote_move_is_a_delta() {
        let mut harness = Harness::start(5);
        let before = harness.strategy.state().unit(3).unwrap().coords;
        assert_ok!(harness.deliver(MessageKind::Move, &[7.0, 0.0, -10.0, 4.0]));

        let after = harness.strategy.state().unit(3).unwrap().coords;
        assert_approx_eq!(after.x, before.x - 10.0);
        assert_approx_eq!(after.y, before.y + 4.0);
    }

    #[test]
    fn test_tower_collision_picks_bullet_by_ordinal() {
        let mut harness = Harness::start(5);
        assert_ok!(harness.deliver(MessageKind::Tower, &[100.0, 100.0, 3.0, 11.0]));
        let state = harness.strategy.state_mut();
        state.tick = 1;
        let first = state.add_bullet(Bullet::new(1, Direction::RIGHT, Coords::default()));
        state.tick = 2;
        let second = state.add_bullet(Bullet::new(1, Direction::RIGHT, Coords::default()));

        assert_ok!(harness.deliver(MessageKind::Collision, &[11.0, 1.0, 2.0]));

        let state = harness.strategy.state();
        let visible = |serial| state.bullets.iter().find(|b| b.serial == serial).map(|b| b.visible);
        assert_eq!(visible(first), Some(true));
        assert_eq!(visible(second), Some(false));
        assert!(state.towers[0].health < shared::TOWER_HEALTH);
        assert_eq!(state.unit(1).map(|u| u.health), Some(shared::UNIT_HEALTH));
    }

    #[test]
    fn test_rollback_undoes_newest_first() {
        let mut harness = Harness::start(5);
        let origin = harness.my_unit().coords;

        for step in 1..=4 {
            harness
                .strategy
                .state_mut()
                .unit_mut(1)
                .unwrap()
                .correct_coords(Coords::new(step as f32, 0.0));
            assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        }
        // Bases took 2 and 4 from the even series.
        let seqs = harness.transport.log().sequences();
        assert_eq!(seqs, vec![0, 6, 8, 10, 12]);

        assert_ok!(harness.deliver(MessageKind::RollbackAck, &[8.0]));
        assert_eq!(harness.transport.log().sequences(), vec![0, 6, 8]);
        assert_approx_eq!(harness.my_unit().coords.x, origin.x + 3.0);

        // The undo itself is not reported back as movement.
        assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        assert_eq!(harness.transport.log().unacknowledged(), 0);
    }

    #[test]
    fn test_rollback_restores_position_for_random_sequences() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut harness = Harness::start(5);
            let count = rng.gen_range(1..12);
            let mut positions = vec![harness.my_unit().coords];
            for _ in 0..count {
                let delta = Coords::new(
                    rng.gen_range(1..=20) as f32,
                    rng.gen_range(-20..=20) as f32,
                );
                harness.strategy.state_mut().unit_mut(1).unwrap().correct_coords(delta);
                assert_ok!(harness.strategy.send_loop(&mut harness.transport));
                positions.push(harness.my_unit().coords);
            }

            let logged = harness.transport.log().sequences();
            let keep = rng.gen_range(0..logged.len());
            let ack = logged[keep];
            assert_ok!(harness.deliver(MessageKind::RollbackAck, &[ack as f64]));

            let expected = positions[keep];
            let actual = harness.my_unit().coords;
            assert_approx_eq!(actual.x, expected.x, 1e-3);
            assert_approx_eq!(actual.y, expected.y, 1e-3);
        }
    }

    #[test]
    fn test_rollback_of_shout_tower_and_bomb() {
        let mut harness = Harness::start(5);
        assert_ok!(harness.strategy.on_new_command(&mut harness.transport, InputEvent::Fire));
        assert_ok!(harness.strategy.on_new_command(&mut harness.transport, InputEvent::Tower));
        assert_eq!(harness.strategy.state().bullets.len(), 1);
        assert_eq!(harness.strategy.state().towers.len(), 1);

        assert_ok!(harness.deliver(MessageKind::RollbackAck, &[0.0]));
        assert!(harness.strategy.state().bullets.is_empty());
        assert!(harness.strategy.state().towers.is_empty());

        let bomb = ClientCommand::Snap {
            seq: 40,
            action: SnapAction::Bomb { id: 42 },
        };
        let base = harness.strategy.state().bases[1].clone();
        harness.strategy.state_mut().bombs.push(Bomb::new(42, Side::Man, &base));
        assert_ok!(harness.strategy.rollback_event(&bomb));
        assert!(harness.strategy.state().bombs.is_empty());
    }

    #[test]
    fn test_join_request_rollback_is_internal_error() {
        let mut harness = Harness::start(5);
        let result = harness.strategy.rollback_event(&ClientCommand::JoinRequest);
        assert!(matches!(result, Err(SyncError::Internal(_))));
    }

    #[test]
    fn test_failed_undo_does_not_skip_older_commands() {
        let mut harness = Harness::start(5);
        let origin = harness.my_unit().coords;

        harness.strategy.state_mut().unit_mut(1).unwrap().correct_coords(Coords::new(1.0, 0.0));
        assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        assert_ok!(harness.transport.send(ClientCommand::JoinRequest));
        harness.strategy.state_mut().unit_mut(1).unwrap().correct_coords(Coords::new(2.0, 0.0));
        assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        assert_eq!(harness.transport.log().sequences(), vec![0, 6, 0, 8]);

        let result = harness.deliver(MessageKind::RollbackAck, &[4.0]);
        match assert_err!(result) {
            SyncError::Rollback { failed, first } => {
                assert_eq!(failed, 1);
                assert!(matches!(*first, SyncError::Internal(_)));
            }
            other => panic!("expected rollback error, got {:?}", other),
        }

        assert_eq!(harness.transport.log().sequences(), vec![0]);
        assert_approx_eq!(harness.my_unit().coords.x, origin.x);
        assert!(harness.strategy.is_running());
    }

    #[test]
    fn test_stalled_unit_emits_undo() {
        let mut harness = Harness::start(5);
        harness.drain_signals();
        let unit = harness.strategy.state_mut().unit_mut(1).unwrap();
        unit.coords = Coords::new(2.0, unit.coords.y);
        assert_ok!(harness.strategy.on_new_command(&mut harness.transport, InputEvent::Left));

        assert_ok!(harness.strategy.game_loop(&mut harness.transport));
        assert!(harness.drain_signals().is_empty());
        assert_ok!(harness.strategy.game_loop(&mut harness.transport));
        assert_eq!(
            harness.drain_signals(),
            vec![GameSignal::UndoAction(InputEvent::Left)]
        );
    }

    #[test]
    fn test_base_destroyed_ends_match_on_same_tick() {
        let mut harness = Harness::start(5);
        harness.drain_signals();
        let tick = harness.strategy.state().tick;
        harness.strategy.state_mut().bases[1].take_damage(100);

        assert_ok!(harness.strategy.game_loop(&mut harness.transport));
        assert_eq!(harness.strategy.state().tick, tick + 1);
        assert!(harness.strategy.is_finished());
        assert_eq!(
            harness.drain_signals(),
            vec![GameSignal::MatchFinished { won: true }]
        );

        assert_ok!(harness.strategy.game_loop(&mut harness.transport));
        assert_eq!(harness.strategy.state().tick, tick + 1);
        assert_ok!(harness.deliver(MessageKind::Shout, &[1.0, 1.0, 5.0, 3.0]));
        assert!(harness.strategy.state().bullets.is_empty());
    }

    #[test]
    fn test_refused_bomb_does_not_delay_match_end() {
        let mut harness = Harness::start_with(5, 3);
        for _ in 0..2 {
            harness.strategy.state_mut().unit_mut(1).unwrap().correct_coords(Coords::new(1.0, 0.0));
            assert_ok!(harness.strategy.send_loop(&mut harness.transport));
        }
        assert_eq!(harness.transport.log().unacknowledged(), 3);
        harness.drain_outbound();
        harness.drain_signals();

        harness.strategy.state_mut().bases[1].under_attack = true;
        harness.strategy.state_mut().bases[0].take_damage(100);

        let result = harness.strategy.game_loop(&mut harness.transport);
        assert!(matches!(result, Err(SyncError::Backpressure { pending: 3, limit: 3 })));
        assert!(harness.strategy.is_finished());
        assert_eq!(
            harness.drain_signals(),
            vec![GameSignal::MatchFinished { won: false }]
        );
        assert!(harness.strategy.state().bases[1].under_attack);
        assert!(harness.strategy.state().bombs.is_empty());
        assert!(harness.drain_outbound().is_empty());
    }

    #[test]
    fn test_own_base_destroyed_is_a_loss() {
        let mut harness = Harness::start(5);
        harness.drain_signals();
        harness.strategy.state_mut().bases[0].take_damage(100);
        assert_ok!(harness.strategy.game_loop(&mut harness.transport));
        assert_eq!(
            harness.drain_signals(),
            vec![GameSignal::MatchFinished { won: false }]
        );
    }
}

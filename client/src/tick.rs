//! Steps of the fixed-rate simulation tick.
//!
//! Each step works on a plain [`GameState`]; the strategy decides which of
//! them run and in what order.

use crate::error::SyncError;
use crate::transport::Transport;
use log::{debug, info, warn};
use shared::{Bomb, ClientCommand, Coin, GameState, IdAllocator, Side, SnapAction};

/// Moves bullets and units one step and counts down every timer.
///
/// Returns true when the unit `watched` was moving and got stopped this tick,
/// which only happens against the field border.
pub fn advance(state: &mut GameState, watched: u32) -> bool {
    for bullet in state.bullets.iter_mut() {
        bullet.advance();
    }

    let mut stalled = false;
    for unit in state.units.iter_mut() {
        let previous = unit.speed;
        unit.move_step();
        if unit.id == watched && previous != 0.0 && unit.speed == 0.0 && !unit.direction.is_none() {
            stalled = true;
        }
    }

    for coin in state.coins.iter_mut() {
        coin.advance();
    }
    for bomb in state.bombs.iter_mut() {
        bomb.advance();
    }

    state.tick += 1;
    stalled
}

/// Plants a bomb on every enemy base our unit reached and tells the server.
///
/// Attack flags are cleared once handled. A bomb that cannot be sent leaves
/// its flag for the next tick and does not stop the other bases; the first
/// such failure is returned after every base was visited.
pub fn plant_bombs(
    state: &mut GameState,
    ids: &mut IdAllocator,
    my_side: Side,
    transport: &mut Transport,
) -> Result<(), SyncError> {
    let flagged: Vec<u32> = state
        .bases
        .iter()
        .filter(|base| base.under_attack)
        .map(|base| base.id)
        .collect();

    let mut failure = None;
    for base_id in flagged {
        let Some(base) = state.base_mut(base_id) else {
            continue;
        };
        if base.side == my_side {
            base.under_attack = false;
            continue;
        }

        let id = match send_bomb(ids, transport) {
            Ok(id) => id,
            Err(e) => {
                warn!("Bomb for {} base postponed: {}", base.side, e);
                failure.get_or_insert(e);
                continue;
            }
        };

        base.under_attack = false;
        let mut bomb = Bomb::new(id, my_side, base);
        bomb.cancel_destruction();
        info!("Planted bomb {} at {} base", id, bomb.target);
        state.bombs.push(bomb);
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn send_bomb(ids: &mut IdAllocator, transport: &mut Transport) -> Result<u32, SyncError> {
    let seq = ids.next_id()?;
    let id = ids.next_id()?;
    transport.send(ClientCommand::Snap {
        seq,
        action: SnapAction::Bomb { id },
    })?;
    Ok(id)
}

/// Drops a coin where each destroyed tower stood.
pub fn reward_towers(state: &mut GameState, ids: &mut IdAllocator) -> Result<(), SyncError> {
    for tower in state.towers.iter().filter(|tower| !tower.alive()) {
        state.coins.push(Coin::new(ids.next_id()?, tower.coords));
    }
    Ok(())
}

pub fn respawn_units(state: &mut GameState) {
    for unit in state.units.iter_mut().filter(|unit| !unit.alive()) {
        debug!("Respawning unit {}", unit.id);
        unit.spawn();
    }
}

/// Removes every sprite that is gone for good.
pub fn prune(state: &mut GameState) {
    state.bullets.retain(|bullet| bullet.visible);
    state.towers.retain(|tower| tower.alive());
    state.coins.retain(|coin| coin.visible);
    state.bombs.retain(|bomb| bomb.visible);
}

/// Side of the first destroyed base, if any.
pub fn fallen_base(state: &GameState) -> Option<Side> {
    state.bases.iter().find(|base| !base.alive()).map(|base| base.side)
}

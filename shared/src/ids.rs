//! Coordination-free identifier minting for the two peers of a match.
//!
//! Each peer owns one residue class modulo 2: the peer with the larger user id
//! mints odd identifiers (1, 3, 5, ...), the other mints even ones (2, 4, 6, ...).
//! Both peers derive the same split from the user ids alone, so minted
//! identifiers never collide and no range negotiation is needed.

/// Step between two identifiers minted by the same peer.
const STRIDE: u32 = 2;

/// The series reached the end of the `u32` range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identifier series exhausted after {last}")]
pub struct IdsExhausted {
    pub last: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Starts minting at `start`; only `1` and `2` are meaningful starts.
    pub fn new(start: u32) -> Self {
        Self { next: start }
    }

    /// Picks the residue class for `me` given the opponent's user id.
    /// Equal ids fall back to the even series.
    pub fn for_peers(me: u32, opponent: u32) -> Self {
        if me > opponent {
            Self::new(1)
        } else {
            Self::new(2)
        }
    }

    pub fn next_id(&mut self) -> Result<u32, IdsExhausted> {
        let id = self.next;
        self.next = id.checked_add(STRIDE).ok_or(IdsExhausted { last: id })?;
        Ok(id)
    }

    /// Value the next call to [`IdAllocator::next_id`] returns.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

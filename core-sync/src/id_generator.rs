//! # Unique Id Generator
//!
//! Time-ordered 64-bit ids used as storage primary keys and task ids.
//!
//! ## Layout
//!
//! ```text
//! | 51 bits: ms since EPOCH_MS | 3 bits: node | 10 bits: sequence |
//! ```
//!
//! Ids from one generator are strictly increasing while the clock does not
//! move backwards. Generators with distinct node ids never collide.

use crate::{Result, SyncError};
use bridge_traits::time::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// 2019-05-01T02:00:00Z
pub const EPOCH_MS: i64 = 1_556_676_000_000;

const SEQUENCE_BITS: u32 = 10;
const NODE_BITS: u32 = 3;
const NODE_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + NODE_BITS;

pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;
pub const MAX_NODE_ID: u8 = (1 << NODE_BITS) - 1;

/// A generated id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(i64);

/// Fields of a [`UniqueId`], for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Unix epoch milliseconds
    pub timestamp_ms: i64,
    pub node_id: u8,
    pub sequence: u16,
}

impl UniqueId {
    pub fn from_i64(value: i64) -> Self {
        Self(value)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn parts(&self) -> IdParts {
        IdParts {
            timestamp_ms: (self.0 >> TIMESTAMP_SHIFT) + EPOCH_MS,
            node_id: ((self.0 >> NODE_SHIFT) & i64::from(MAX_NODE_ID)) as u8,
            sequence: (self.0 & i64::from(MAX_SEQUENCE)) as u16,
        }
    }

    fn compose(timestamp_ms: i64, node_id: u8, sequence: u16) -> Self {
        Self(
            ((timestamp_ms - EPOCH_MS) << TIMESTAMP_SHIFT)
                | (i64::from(node_id) << NODE_SHIFT)
                | i64::from(sequence),
        )
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UniqueId> for i64 {
    fn from(id: UniqueId) -> Self {
        id.0
    }
}

#[derive(Debug)]
struct GeneratorState {
    /// Millisecond of the last issued id, `None` before the first
    last_ms: Option<i64>,
    sequence: u16,
}

/// Thread-safe id generator
///
/// # Example
///
/// ```rust,ignore
/// use core_sync::IdGenerator;
///
/// let generator = IdGenerator::with_system_clock(1)?;
/// let id = generator.next()?;
/// assert_eq!(id.parts().node_id, 1);
/// ```
pub struct IdGenerator {
    node_id: u8,
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Create a generator for `node_id` reading time from `clock`
    ///
    /// # Errors
    ///
    /// `InvalidInput` if `node_id` does not fit in the node field (0..=7)
    pub fn new(node_id: u8, clock: Arc<dyn Clock>) -> Result<Self> {
        if node_id > MAX_NODE_ID {
            return Err(SyncError::InvalidInput {
                field: "node_id".to_string(),
                message: format!("must be between 0 and {}, got {}", MAX_NODE_ID, node_id),
            });
        }

        Ok(Self {
            node_id,
            clock,
            state: Mutex::new(GeneratorState {
                last_ms: None,
                sequence: 0,
            }),
        })
    }

    pub fn with_system_clock(node_id: u8) -> Result<Self> {
        Self::new(node_id, Arc::new(SystemClock))
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Issue the next id
    ///
    /// Same millisecond increments the sequence; when all 1024 sequence values
    /// of a millisecond are used, spins until the clock moves on.
    ///
    /// # Errors
    ///
    /// `ClockRegressed` if the clock reads earlier than the last issued id
    /// (or earlier than [`EPOCH_MS`]). No id is issued.
    pub fn next(&self) -> Result<UniqueId> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SyncError::Worker("id generator lock poisoned".to_string()))?;

        let mut now_ms = self.read_clock(state.last_ms)?;

        match state.last_ms {
            Some(last_ms) if now_ms == last_ms => {
                if state.sequence == MAX_SEQUENCE {
                    while now_ms <= last_ms {
                        std::hint::spin_loop();
                        now_ms = self.read_clock(state.last_ms)?;
                    }
                    state.sequence = 0;
                } else {
                    state.sequence += 1;
                }
            }
            _ => state.sequence = 0,
        }

        state.last_ms = Some(now_ms);

        Ok(UniqueId::compose(now_ms, self.node_id, state.sequence))
    }

    fn read_clock(&self, last_ms: Option<i64>) -> Result<i64> {
        let now_ms = self.clock.unix_timestamp_millis();
        let floor = last_ms.unwrap_or(EPOCH_MS);

        if now_ms < floor {
            return Err(SyncError::ClockRegressed {
                last_ms: floor,
                now_ms,
            });
        }

        Ok(now_ms)
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

//! IdGenerator port.
//!
//! The pool asks this port for a fresh `StateId` every time it creates a
//! state. ULIDs need no coordination; within one millisecond their order is random.

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::StateId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_state_id(&self) -> StateId;
}

/// ULID generator: timestamp from the clock, random low bits.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_state_id(&self) -> StateId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        StateId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}

//! Ports - seams to collaborators outside the core.
//!
//! - **Transport**: remote activation (network layer lives elsewhere)
//! - **Clock**: time source for state timestamps and ids
//! - **IdGenerator**: `StateId` allocation

pub mod clock;
pub mod id_generator;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::transport::{RemoteActivation, Transport, TransportError};

//! App layer: handlers, runtime states, the pool and the pieces that drive it.
//!
//! - **RuntimeState**: one mailbox plus its handler registry
//! - **Runtime**: the pool, address routing and the `run` pass
//! - **Driver**: a tokio task calling `run` on a tick
//! - **RuntimeBuilder**: wiring with fail-fast validation

pub mod builder;
pub mod driver;
pub mod handlers;
pub mod runtime;
pub mod state;
pub mod status;

pub use self::builder::{BuildError, RuntimeBuilder};
pub use self::driver::{Driver, DriverReport};
pub use self::handlers::{
    ActivationSignal, FileHandler, FnHandler, HandlerRegistry, SharedHandler, SubscriptionPolicy,
};
pub use self::runtime::{Delivery, MAIN_STATE_NAME, Runtime, StateHandle};
pub use self::state::RuntimeState;
pub use self::status::{RunReport, RuntimeStatus, StateStatus};

//! courier-core
//!
//! An embeddable message-passing runtime. Named runtime states each own a
//! mailbox and a table of file handlers; producers activate a file on a state
//! by address and a driver pumps every mailbox.
//!
//! # Modules
//! - **domain**: addresses, messages, ids, channels, errors
//! - **ports**: Transport, Clock, IdGenerator
//! - **app**: RuntimeState, Runtime (pool), Driver, RuntimeBuilder, status views
//! - **typed**: `File` trait, typed `Handler<F>`, `PayloadCodec`
//! - **config**: `RuntimeConfig` / `DriverConfig`

pub mod app;
pub mod config;
pub mod domain;
pub mod ports;
pub mod typed;

mod sync;

pub use app::{
    ActivationSignal, BuildError, Delivery, Driver, DriverReport, FileHandler, Runtime,
    RuntimeBuilder, RuntimeState, RuntimeStatus, StateHandle, SubscriptionPolicy,
};
pub use config::{ConfigError, DriverConfig, RuntimeConfig};
pub use domain::{ActivateError, HandlerError, TargetAddress};

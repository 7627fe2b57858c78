//! Domain model: addresses, messages, ids, channels and errors.

pub mod address;
pub mod channel;
pub mod errors;
pub mod ids;
pub mod message;

pub use address::{DEFAULT_RELATIVE_PATH, LOCAL_STATE_ALIAS, TargetAddress};
pub use channel::{ChannelError, ChannelProperty, ChannelTable, Priority, Reliability};
pub use errors::{ActivateError, CodecError, HandlerError, RuntimeError};
pub use ids::{Id, IdMarker, StateId};
pub use message::{Message, MessageKind, Payload};

//! Typed files.
//!
//! A `File` type ties a serde payload to its target path, so a typo in a path
//! string becomes a missing trait impl instead of a silently dropped message.

pub mod codec;
pub mod file;
pub mod handler;

pub use self::codec::PayloadCodec;
pub use self::file::File;
pub use self::handler::{Handler, TypedHandler};

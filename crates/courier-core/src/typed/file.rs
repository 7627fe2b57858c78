//! File trait - binds a payload type to the target path it is sent to.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A typed activation payload.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Ping {
///     seq: u32,
/// }
///
/// impl File for Ping {
///     const PATH: &'static str = "script/ping.lua";
/// }
/// ```
///
/// `PATH` is the relative path handlers are registered under and that
/// `Runtime::activate_file` targets.
pub trait File: Serialize + DeserializeOwned + Send + Sync + 'static {
    const PATH: &'static str;
}

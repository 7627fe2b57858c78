//! Error types shared across the crate.
//!
//! Address parsing has no error type: malformed input degrades to fewer
//! populated fields. Everything else reports failures as values so the pool
//! stays usable after any single failed call.

use thiserror::Error;

use crate::domain::ids::StateId;
use crate::ports::TransportError;

/// Why an activation was rejected.
#[derive(Debug, Error)]
pub enum ActivateError {
    /// The address named a state that is not in the pool.
    #[error("runtime state not found: {0}")]
    UnknownState(String),

    /// The address names a remote node and no transport is installed.
    #[error("remote activation of network_id={network_id} is not supported without a transport")]
    RemoteUnsupported { network_id: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A typed payload could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Default routing fell through to main, but the pool has been cleaned up.
    #[error("main runtime state is not initialized")]
    NoMainState,
}

/// Failures reported by pool handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("runtime state {0} has been deleted")]
    StateGone(StateId),
}

/// Payload encode/decode failures.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("json decode: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Returned by file handlers. `process` logs these and moves on.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A follow-up activation sent from inside the handler failed.
    #[error(transparent)]
    Activate(#[from] ActivateError),

    #[error("no current message outside of a dispatch")]
    NoCurrentMessage,
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let err = ActivateError::UnknownState("worker9".into());
        assert_eq!(err.to_string(), "runtime state not found: worker9");

        let err = ActivateError::RemoteUnsupported {
            network_id: "peer".into(),
        };
        assert!(err.to_string().contains("network_id=peer"));

        let err = HandlerError::failed("boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn codec_errors_convert_into_handler_errors() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: HandlerError = CodecError::Decode(json_err).into();
        assert!(matches!(err, HandlerError::Codec(CodecError::Decode(_))));
        assert!(err.to_string().starts_with("json decode:"));
    }
}

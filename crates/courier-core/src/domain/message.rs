//! Message - one queued activation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Immutable payload bytes, shared between the mailbox and the current-message view.
pub type Payload = Arc<[u8]>;

/// Discriminator for queued work. Only file activation exists today.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    FileActivation,
}

/// A unit of work sitting in a mailbox.
///
/// The payload is pure data: scalars and nested arrays/objects. The typed
/// layer encodes it as JSON, but the mailbox treats it as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    target_path: String,
    payload: Payload,
    kind: MessageKind,
}

impl Message {
    pub fn new(target_path: impl Into<String>, payload: impl AsRef<[u8]>) -> Self {
        Self {
            target_path: target_path.into(),
            payload: Arc::from(payload.as_ref()),
            kind: MessageKind::FileActivation,
        }
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

//! Transport port - delivery of activations to other processes.
//!
//! The runtime never talks to the network itself. When an address carries a
//! `network_id`, the activation is handed to the installed `Transport`. With
//! no transport installed the runtime rejects the activation with
//! `ActivateError::RemoteUnsupported`.
//!
//! Implementations must not block: queue the activation and return.

use thiserror::Error;

use crate::domain::{ChannelProperty, TargetAddress};

/// Everything a transport needs to send one activation.
#[derive(Debug, Clone, Copy)]
pub struct RemoteActivation<'a> {
    pub address: &'a TargetAddress,
    pub payload: &'a [u8],
    pub channel: u8,
    pub property: ChannelProperty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("resolver not found: {0}")]
    UnknownResolver(String),

    #[error("{0}")]
    Other(String),
}

pub trait Transport: Send + Sync {
    fn activate(&self, activation: RemoteActivation<'_>) -> Result<(), TransportError>;
}

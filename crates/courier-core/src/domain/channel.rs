//! Delivery channels for remote activations.
//!
//! There are 16 numbered channels. Each carries a priority and a reliability
//! class that the transport applies when it sends an activation. The local
//! mailbox ignores channels entirely.
//!
//! Default mapping:
//!
//! | channel | priority | reliability          | usual traffic              |
//! |---------|----------|----------------------|----------------------------|
//! | 0       | medium   | reliable ordered     | system messages            |
//! | 1       | medium   | unreliable sequenced | positions                  |
//! | 2       | medium   | reliable ordered     | large simulation objects   |
//! | 4       | medium   | reliable ordered     | chat                       |
//! | 14      | medium   | reliable             | file transfer              |
//! | 15      | medium   | reliable sequenced   | voice                      |
//! | other   | medium   | reliable ordered     |                            |

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CHANNEL_COUNT: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Immediate,
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    Unreliable,
    UnreliableSequenced,
    Reliable,
    #[default]
    ReliableOrdered,
    ReliableSequenced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelProperty {
    pub priority: Priority,
    pub reliability: Reliability,
}

impl ChannelProperty {
    pub const fn new(priority: Priority, reliability: Reliability) -> Self {
        Self {
            priority,
            reliability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel {0} is out of range (0..=15)")]
    OutOfRange(u8),
}

/// The 16 channel properties plus the default channel used when an activation names none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTable {
    properties: [ChannelProperty; CHANNEL_COUNT],
    default_channel: u8,
}

impl ChannelTable {
    pub fn new() -> Self {
        let mut properties = [ChannelProperty::default(); CHANNEL_COUNT];
        properties[1].reliability = Reliability::UnreliableSequenced;
        properties[14].reliability = Reliability::Reliable;
        properties[15].reliability = Reliability::ReliableSequenced;
        Self {
            properties,
            default_channel: 0,
        }
    }

    fn check(channel: u8) -> Result<usize, ChannelError> {
        let index = usize::from(channel);
        if index < CHANNEL_COUNT {
            Ok(index)
        } else {
            Err(ChannelError::OutOfRange(channel))
        }
    }

    pub fn property(&self, channel: u8) -> Result<ChannelProperty, ChannelError> {
        Ok(self.properties[Self::check(channel)?])
    }

    pub fn set_property(
        &mut self,
        channel: u8,
        property: ChannelProperty,
    ) -> Result<(), ChannelError> {
        self.properties[Self::check(channel)?] = property;
        Ok(())
    }

    pub fn default_channel(&self) -> u8 {
        self.default_channel
    }

    pub fn set_default_channel(&mut self, channel: u8) -> Result<(), ChannelError> {
        Self::check(channel)?;
        self.default_channel = channel;
        Ok(())
    }

    /// Restores the default mapping. The default channel is left alone.
    pub fn reset_properties(&mut self) {
        self.properties = Self::new().properties;
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

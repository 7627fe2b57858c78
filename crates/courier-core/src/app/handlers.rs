//! File handlers and the per-state handler registry.
//!
//! A handler is keyed by the exact, case-sensitive target path. Two
//! subscription policies coexist and are chosen per registration:
//!
//! - `Replace`: the path keeps a single subscriber, the newest wins.
//! - `Multicast`: every subscriber runs, in registration order.
//!
//! Subscriber lists are stored as `Arc<[SharedHandler]>` so dispatch can take
//! a cheap snapshot and drop the registry lock before running user code.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::app::state::RuntimeState;
use crate::domain::HandlerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPolicy {
    #[default]
    Replace,
    Multicast,
}

/// Signal passed to every handler invocation. Only state activation exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationSignal {
    State,
}

/// A subscriber for one target path.
///
/// The message being processed is available through
/// [`RuntimeState::current_message`] for the duration of the call.
pub trait FileHandler: Send + Sync {
    fn activate(&self, signal: ActivationSignal, state: &RuntimeState) -> Result<(), HandlerError>;
}

pub type SharedHandler = Arc<dyn FileHandler>;

/// Adapts a closure into a [`FileHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F>
where
    F: Fn(ActivationSignal, &RuntimeState) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> FileHandler for FnHandler<F>
where
    F: Fn(ActivationSignal, &RuntimeState) -> Result<(), HandlerError> + Send + Sync,
{
    fn activate(&self, signal: ActivationSignal, state: &RuntimeState) -> Result<(), HandlerError> {
        (self.0)(signal, state)
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<[SharedHandler]>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Installs `handler` under `path`. `None` removes every subscriber for the path.
    ///
    /// Returns the number of subscribers registered for `path` afterwards.
    pub fn register(
        &mut self,
        path: &str,
        handler: Option<SharedHandler>,
        policy: SubscriptionPolicy,
    ) -> usize {
        let Some(handler) = handler else {
            self.handlers.remove(path);
            return 0;
        };

        let subscribers: Arc<[SharedHandler]> = match (policy, self.handlers.get(path)) {
            (SubscriptionPolicy::Multicast, Some(existing)) => {
                existing.iter().cloned().chain(Some(handler)).collect()
            }
            _ => Arc::from(vec![handler]),
        };
        let count = subscribers.len();
        self.handlers.insert(path.to_string(), subscribers);
        count
    }

    pub fn subscribers(&self, path: &str) -> Option<Arc<[SharedHandler]>> {
        self.handlers.get(path).cloned()
    }

    pub fn subscriber_count(&self, path: &str) -> usize {
        self.handlers.get(path).map_or(0, |s| s.len())
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.handlers.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.handlers.iter().map(|(path, subs)| (path, subs.len())))
            .finish()
    }
}

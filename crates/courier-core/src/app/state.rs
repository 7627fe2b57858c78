//! RuntimeState - an addressable mailbox with its own handler registry.
//!
//! Producers on any thread call [`RuntimeState::enqueue`]; a driver calls
//! [`RuntimeState::process`], which drains the mailbox under its lock and
//! dispatches after releasing it. Handlers can therefore enqueue into this
//! state (or reach the pool) without deadlocking. Messages enqueued while a
//! batch is being dispatched wait for the next `process` call.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use ulid::Ulid;

use crate::app::handlers::{
    ActivationSignal, FnHandler, HandlerRegistry, SharedHandler, SubscriptionPolicy,
};
use crate::app::runtime::{Runtime, RuntimeInner};
use crate::domain::{HandlerError, Message, Payload, StateId};
use crate::sync::{lock, read, write};
use crate::typed::{File, Handler, PayloadCodec, TypedHandler};

pub struct RuntimeState {
    id: StateId,
    name: String,
    created_at: DateTime<Utc>,
    default_policy: SubscriptionPolicy,
    mailbox: Mutex<VecDeque<Message>>,
    handlers: RwLock<HandlerRegistry>,
    processed: AtomicU64,
    runtime: Weak<RuntimeInner>,
}

impl RuntimeState {
    /// A standalone state, not owned by any pool.
    pub fn new(name: impl Into<String>) -> Self {
        Self::attached(
            StateId::from_ulid(Ulid::new()),
            name.into(),
            Utc::now(),
            SubscriptionPolicy::default(),
            Weak::new(),
        )
    }

    pub(crate) fn attached(
        id: StateId,
        name: String,
        created_at: DateTime<Utc>,
        default_policy: SubscriptionPolicy,
        runtime: Weak<RuntimeInner>,
    ) -> Self {
        Self {
            id,
            name,
            created_at,
            default_policy,
            mailbox: Mutex::new(VecDeque::new()),
            handlers: RwLock::new(HandlerRegistry::new()),
            processed: AtomicU64::new(0),
            runtime,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    /// Empty for anonymous states.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The pool this state belongs to, if it was created by one that is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade().map(Runtime::from_inner)
    }

    // ------------------------------------------------------------------
    // mailbox
    // ------------------------------------------------------------------

    /// Appends a file activation to the mailbox. Never blocks for long, never fails.
    pub fn enqueue(&self, target_path: impl Into<String>, payload: impl AsRef<[u8]>) {
        self.enqueue_message(Message::new(target_path, payload));
    }

    pub fn enqueue_message(&self, message: Message) {
        lock(&self.mailbox).push_back(message);
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.mailbox).len()
    }

    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Drains the mailbox and dispatches every message. Returns how many were drained.
    pub fn process(&self) -> usize {
        let batch: Vec<Message> = lock(&self.mailbox).drain(..).collect();
        for message in &batch {
            self.dispatch(message);
        }
        batch.len()
    }

    fn dispatch(&self, message: &Message) {
        self.processed.fetch_add(1, Ordering::Relaxed);

        let subscribers = read(&self.handlers).subscribers(message.target_path());
        let Some(subscribers) = subscribers else {
            tracing::trace!(
                state = %self.name,
                path = message.target_path(),
                "no handler registered, message dropped"
            );
            return;
        };

        let _scope = CurrentMessageScope::enter(self.id, message.clone());
        for handler in subscribers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                handler.activate(ActivationSignal::State, self)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(
                    state = %self.name,
                    path = message.target_path(),
                    error = %err,
                    "file handler failed"
                ),
                Err(panic) => tracing::error!(
                    state = %self.name,
                    path = message.target_path(),
                    panic = panic_message(panic.as_ref()),
                    "file handler panicked"
                ),
            }
        }
    }

    // ------------------------------------------------------------------
    // handlers
    // ------------------------------------------------------------------

    /// Installs (or with `None`, removes) the subscribers for `path`.
    ///
    /// Returns the subscriber count for `path` after the change.
    pub fn register_handler(
        &self,
        path: &str,
        handler: Option<SharedHandler>,
        policy: SubscriptionPolicy,
    ) -> usize {
        write(&self.handlers).register(path, handler, policy)
    }

    /// Registers a closure with this state's default policy.
    pub fn on<F>(&self, path: &str, f: F) -> usize
    where
        F: Fn(ActivationSignal, &RuntimeState) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on_with_policy(path, self.default_policy, f)
    }

    pub fn on_with_policy<F>(&self, path: &str, policy: SubscriptionPolicy, f: F) -> usize
    where
        F: Fn(ActivationSignal, &RuntimeState) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(path, Some(Arc::new(FnHandler::new(f))), policy)
    }

    /// Registers a typed handler under `F::PATH`.
    pub fn register_typed<F, H>(&self, handler: H, policy: SubscriptionPolicy) -> usize
    where
        F: File,
        H: Handler<F> + 'static,
    {
        self.register_handler(F::PATH, Some(Arc::new(TypedHandler::new(handler))), policy)
    }

    pub fn unregister(&self, path: &str) {
        self.register_handler(path, None, self.default_policy);
    }

    pub fn has_handler(&self, path: &str) -> bool {
        read(&self.handlers).subscriber_count(path) > 0
    }

    pub fn handler_paths(&self) -> Vec<String> {
        read(&self.handlers).paths()
    }

    pub fn default_policy(&self) -> SubscriptionPolicy {
        self.default_policy
    }

    // ------------------------------------------------------------------
    // current message
    // ------------------------------------------------------------------

    /// Payload of the message this thread is dispatching on this state.
    /// `None` outside a handler.
    pub fn current_message(&self) -> Option<Payload> {
        self.with_current(|m| Arc::clone(m.payload()))
    }

    /// Zero outside a handler.
    pub fn current_message_len(&self) -> usize {
        self.with_current(Message::len).unwrap_or(0)
    }

    pub fn current_target(&self) -> Option<String> {
        self.with_current(|m| m.target_path().to_string())
    }

    /// Decodes the current payload as JSON.
    pub fn current_message_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let payload = self.current_message().ok_or(HandlerError::NoCurrentMessage)?;
        Ok(PayloadCodec::decode(&payload)?)
    }

    fn with_current<R>(&self, f: impl FnOnce(&Message) -> R) -> Option<R> {
        CURRENT.with(|stack| {
            stack
                .borrow()
                .iter()
                .rev()
                .find(|(id, _)| *id == self.id)
                .map(|(_, message)| f(message))
        })
    }

    /// Drops queued messages and handlers. Used when the pool tears down.
    pub(crate) fn clear(&self) {
        lock(&self.mailbox).clear();
        write(&self.handlers).clear();
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.pending_len())
            .field("processed", &self.processed_count())
            .finish_non_exhaustive()
    }
}

thread_local! {
    /// Messages being dispatched on this thread, innermost last.
    static CURRENT: RefCell<Vec<(StateId, Message)>> = const { RefCell::new(Vec::new()) };
}

/// Pushes the current message on entry and pops it on drop, including when
/// the handler unwinds.
struct CurrentMessageScope;

impl CurrentMessageScope {
    fn enter(state: StateId, message: Message) -> Self {
        CURRENT.with(|stack| stack.borrow_mut().push((state, message)));
        Self
    }
}

impl Drop for CurrentMessageScope {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

//! Runtime - the pool of runtime states.
//!
//! The pool owns every state through an `Arc`; callers get [`StateHandle`]s
//! holding a `Weak`, so deleting a state never leaves a dangling reference.
//! `run` snapshots the pool once under its lock and processes that snapshot
//! after releasing it, so handlers can create and delete states freely.
//! States created during a `run` are first visited by the next one.
//!
//! Lock order: `main` before `pool`. No lock is held while a handler runs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde::{Deserialize, Serialize};

use crate::app::state::RuntimeState;
use crate::app::status::{RunReport, RuntimeStatus, StateStatus};
use crate::config::RuntimeConfig;
use crate::domain::{
    ActivateError, ChannelError, ChannelProperty, ChannelTable, Message, RuntimeError, StateId,
    TargetAddress,
};
use crate::ports::{Clock, IdGenerator, RemoteActivation, SystemClock, Transport, UlidGenerator};
use crate::sync::{lock, read, write};
use crate::typed::{File, PayloadCodec};

/// Name under which the main state is registered.
pub const MAIN_STATE_NAME: &str = "main";

/// Where an activation ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Delivery {
    Local { state: StateId },
    Remote { network_id: String },
}

/// States keyed by insertion sequence, so iteration follows creation order.
#[derive(Default)]
struct Pool {
    states: BTreeMap<u64, Arc<RuntimeState>>,
    seq_of: HashMap<StateId, u64>,
    named: HashMap<String, StateId>,
    next_seq: u64,
}

impl Pool {
    fn insert(&mut self, state: Arc<RuntimeState>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if !state.name().is_empty() {
            self.named.insert(state.name().to_string(), state.id());
        }
        self.seq_of.insert(state.id(), seq);
        self.states.insert(seq, state);
    }

    fn get(&self, id: &StateId) -> Option<&Arc<RuntimeState>> {
        self.seq_of.get(id).and_then(|seq| self.states.get(seq))
    }

    fn by_name(&self, name: &str) -> Option<&Arc<RuntimeState>> {
        self.named.get(name).and_then(|id| self.get(id))
    }

    fn remove(&mut self, id: &StateId) -> Option<Arc<RuntimeState>> {
        let seq = self.seq_of.remove(id)?;
        let state = self.states.remove(&seq)?;
        if self.named.get(state.name()) == Some(id) {
            self.named.remove(state.name());
        }
        Some(state)
    }

    fn take_all(&mut self) -> Vec<Arc<RuntimeState>> {
        self.named.clear();
        self.seq_of.clear();
        std::mem::take(&mut self.states).into_values().collect()
    }
}

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    transport: Option<Arc<dyn Transport>>,
    channels: RwLock<ChannelTable>,
    main: RwLock<Option<Arc<RuntimeState>>>,
    pool: Mutex<Pool>,
}

/// Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// A runtime with the system clock, ULID ids and no transport.
    pub fn new(config: RuntimeConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::from_parts(config, clock, ids, None)
    }

    pub(crate) fn from_parts(
        config: RuntimeConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        transport: Option<Arc<dyn Transport>>,
    ) -> Self {
        let mut channels = ChannelTable::new();
        if let Err(err) = channels.set_default_channel(config.default_channel) {
            tracing::warn!(error = %err, "ignoring configured default channel");
        }
        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                config,
                clock,
                ids,
                transport,
                channels: RwLock::new(channels),
                main: RwLock::new(None),
                pool: Mutex::new(Pool::default()),
            }),
        };
        runtime.initialize();
        runtime
    }

    pub(crate) fn from_inner(inner: Arc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn has_transport(&self) -> bool {
        self.inner.transport.is_some()
    }

    /// Creates the main state if it is missing. Safe to call repeatedly.
    pub fn initialize(&self) {
        let mut main = write(&self.inner.main);
        if main.is_some() {
            return;
        }
        let handle = self.create_state(MAIN_STATE_NAME);
        *main = handle.get();
        tracing::debug!(state = %handle.id(), "main runtime state initialized");
    }

    // ------------------------------------------------------------------
    // pool
    // ------------------------------------------------------------------

    /// Returns the state named `name`, creating it if needed.
    ///
    /// An empty name always creates a new anonymous state.
    pub fn create_state(&self, name: &str) -> StateHandle {
        let mut pool = lock(&self.inner.pool);
        if !name.is_empty() {
            if let Some(existing) = pool.by_name(name) {
                return StateHandle::new(existing);
            }
        }

        let state = Arc::new(RuntimeState::attached(
            self.inner.ids.generate_state_id(),
            name.to_string(),
            self.inner.clock.now(),
            self.inner.config.default_policy,
            Arc::downgrade(&self.inner),
        ));
        pool.insert(Arc::clone(&state));
        tracing::debug!(state = %state.id(), name, "runtime state created");
        StateHandle::new(&state)
    }

    /// Looks a state up by name. `""` and `"main"` return the main state.
    pub fn get_state(&self, name: &str) -> Option<StateHandle> {
        if name.is_empty() || name == MAIN_STATE_NAME {
            return self.main_state().map(|s| StateHandle::new(&s));
        }
        lock(&self.inner.pool).by_name(name).map(StateHandle::new)
    }

    pub fn get_or_create_state(&self, name: &str) -> StateHandle {
        if let Some(handle) = self.get_state(name) {
            return handle;
        }
        self.create_state(name)
    }

    /// Removes a state from the pool. The main state cannot be deleted.
    ///
    /// A state that is mid-dispatch finishes its current batch; it just
    /// stops being visited by later `run` calls.
    pub fn delete_state(&self, id: StateId) -> bool {
        if self.main_state().is_some_and(|main| main.id() == id) {
            tracing::warn!(state = %id, "refusing to delete the main runtime state");
            return false;
        }

        let Some(state) = lock(&self.inner.pool).remove(&id) else {
            return false;
        };
        tracing::debug!(state = %id, name = state.name(), "runtime state deleted");
        true
    }

    pub fn main_state(&self) -> Option<Arc<RuntimeState>> {
        read(&self.inner.main).clone()
    }

    pub fn state_count(&self) -> usize {
        lock(&self.inner.pool).states.len()
    }

    /// Names of named states, sorted.
    pub fn state_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.pool).named.keys().cloned().collect();
        names.sort();
        names
    }

    fn snapshot(&self) -> Vec<Arc<RuntimeState>> {
        lock(&self.inner.pool).states.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // processing
    // ------------------------------------------------------------------

    /// Processes every state in a single snapshot of the pool. With
    /// `drain_fully`, keeps cycling over that snapshot while messages are
    /// produced, up to `max_cycles_per_run` cycles.
    pub fn run(&self, drain_fully: bool) -> RunReport {
        let max_cycles = if drain_fully {
            self.inner.config.max_cycles_per_run.max(1)
        } else {
            1
        };

        let snapshot = self.snapshot();
        let mut report = RunReport::default();
        for _ in 0..max_cycles {
            let messages: usize = snapshot.iter().map(|state| state.process()).sum();
            report.absorb(RunReport {
                cycles: 1,
                states_visited: snapshot.len(),
                messages,
            });
            if messages == 0 {
                break;
            }
        }
        if report.messages > 0 {
            tracing::trace!(
                cycles = report.cycles,
                messages = report.messages,
                "runtime pass finished"
            );
        }
        report
    }

    // ------------------------------------------------------------------
    // activation
    // ------------------------------------------------------------------

    /// Parses `target` and delivers `payload` to it.
    ///
    /// Routing: a network id goes to the transport; an explicit state name
    /// goes to that state; otherwise to `from`, or main when `from` is `None`.
    pub fn activate(
        &self,
        from: Option<&RuntimeState>,
        target: &str,
        payload: impl AsRef<[u8]>,
    ) -> Result<Delivery, ActivateError> {
        self.activate_address(from, &TargetAddress::parse(target), payload.as_ref())
    }

    pub fn activate_address(
        &self,
        from: Option<&RuntimeState>,
        address: &TargetAddress,
        payload: &[u8],
    ) -> Result<Delivery, ActivateError> {
        if address.is_remote() {
            return self.activate_remote(address, payload);
        }

        let message = Message::new(address.effective_path(), payload);
        let state = if !address.targets_default_state() {
            self.get_state(&address.state_name)
                .and_then(|handle| handle.get())
                .ok_or_else(|| ActivateError::UnknownState(address.state_name.clone()))?
        } else if let Some(from) = from {
            from.enqueue_message(message);
            return Ok(Delivery::Local { state: from.id() });
        } else {
            self.main_state().ok_or(ActivateError::NoMainState)?
        };

        state.enqueue_message(message);
        tracing::trace!(state = %state.id(), path = address.effective_path(), "activation queued");
        Ok(Delivery::Local { state: state.id() })
    }

    /// Encodes `file` as JSON and activates `F::PATH` on `state_name`
    /// (or the default routing when `state_name` is empty).
    pub fn activate_file<F: File>(
        &self,
        from: Option<&RuntimeState>,
        state_name: &str,
        file: &F,
    ) -> Result<Delivery, ActivateError> {
        let payload = PayloadCodec::encode(file)?;
        let address = TargetAddress::local(F::PATH).with_state(state_name);
        self.activate_address(from, &address, &payload)
    }

    fn activate_remote(
        &self,
        address: &TargetAddress,
        payload: &[u8],
    ) -> Result<Delivery, ActivateError> {
        let Some(transport) = &self.inner.transport else {
            return Err(ActivateError::RemoteUnsupported {
                network_id: address.network_id.clone(),
            });
        };

        let (channel, property) = {
            let channels = read(&self.inner.channels);
            let channel = channels.default_channel();
            (channel, channels.property(channel).unwrap_or_default())
        };
        transport.activate(RemoteActivation {
            address,
            payload,
            channel,
            property,
        })?;
        tracing::trace!(network_id = %address.network_id, channel, "remote activation handed off");
        Ok(Delivery::Remote {
            network_id: address.network_id.clone(),
        })
    }

    // ------------------------------------------------------------------
    // teardown
    // ------------------------------------------------------------------

    /// Drops every state, main included, after clearing their handlers and
    /// mailboxes. Call `initialize` to start again.
    pub fn cleanup(&self) {
        let mut main = write(&self.inner.main);
        let states: Vec<Arc<RuntimeState>> = {
            lock(&self.inner.pool).take_all()
        };
        *main = None;
        drop(main);

        for state in &states {
            state.clear();
        }
        tracing::debug!(states = states.len(), "runtime cleaned up");
    }

    // ------------------------------------------------------------------
    // channels
    // ------------------------------------------------------------------

    pub fn default_channel(&self) -> u8 {
        read(&self.inner.channels).default_channel()
    }

    pub fn set_default_channel(&self, channel: u8) -> Result<(), ChannelError> {
        write(&self.inner.channels).set_default_channel(channel)
    }

    pub fn channel_property(&self, channel: u8) -> Result<ChannelProperty, ChannelError> {
        read(&self.inner.channels).property(channel)
    }

    pub fn set_channel_property(
        &self,
        channel: u8,
        property: ChannelProperty,
    ) -> Result<(), ChannelError> {
        write(&self.inner.channels).set_property(channel, property)
    }

    pub fn reset_channel_properties(&self) {
        write(&self.inner.channels).reset_properties();
    }

    // ------------------------------------------------------------------
    // status
    // ------------------------------------------------------------------

    pub fn status(&self) -> RuntimeStatus {
        let states: Vec<StateStatus> = self
            .snapshot()
            .iter()
            .map(|state| StateStatus::of(state))
            .collect();
        RuntimeStatus {
            total_pending: states.iter().map(|s| s.pending).sum(),
            total_processed: states.iter().map(|s| s.processed).sum(),
            default_channel: self.default_channel(),
            states,
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("states", &self.state_count())
            .field("transport", &self.has_transport())
            .finish_non_exhaustive()
    }
}

/// A non-owning reference to a pooled state.
#[derive(Clone)]
pub struct StateHandle {
    id: StateId,
    state: Weak<RuntimeState>,
}

impl StateHandle {
    fn new(state: &Arc<RuntimeState>) -> Self {
        Self {
            id: state.id(),
            state: Arc::downgrade(state),
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    /// `None` once the state has been deleted and no one else holds it.
    pub fn get(&self) -> Option<Arc<RuntimeState>> {
        self.state.upgrade()
    }

    pub fn with<R>(&self, f: impl FnOnce(&RuntimeState) -> R) -> Result<R, RuntimeError> {
        let state = self.get().ok_or(RuntimeError::StateGone(self.id))?;
        Ok(f(&state))
    }
}

impl PartialEq for StateHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StateHandle {}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("id", &self.id)
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

//! RuntimeBuilder - wiring and start-up validation.
//!
//! Handlers are declared against full addresses (`"(worker1)script/a.lua"`).
//! `expect_files` lists addresses that must have a handler once everything is
//! registered; `build` fails fast instead of letting activations to those
//! addresses be dropped at run time.

use std::sync::Arc;

use crate::app::handlers::{SharedHandler, SubscriptionPolicy};
use crate::app::runtime::Runtime;
use crate::config::{ConfigError, RuntimeConfig};
use crate::domain::{RuntimeError, TargetAddress};
use crate::ports::{Clock, IdGenerator, SystemClock, Transport, UlidGenerator};
use crate::typed::{File, Handler, TypedHandler};

/// ```ignore
/// let runtime = RuntimeBuilder::new()
///     .file::<Ping, _>("worker1", PingHandler)
///     .expect_files(&["(worker1)script/ping.lua"])
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    clock: Option<Arc<dyn Clock>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    transport: Option<Arc<dyn Transport>>,
    registrations: Vec<Registration>,
    expected: Option<Vec<String>>,
}

struct Registration {
    address: TargetAddress,
    handler: SharedHandler,
    policy: Option<SubscriptionPolicy>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing file handlers: {0:?}. These addresses were expected but have no handler.")]
    MissingFiles(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("registering handlers: {0}")]
    Runtime(#[from] RuntimeError),
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            clock: None,
            id_generator: None,
            transport: None,
            registrations: Vec::new(),
            expected: None,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Registers `handler` on the state and path named by `address`, using
    /// the configured default policy. No state name means main.
    pub fn handler(mut self, address: &str, handler: SharedHandler) -> Self {
        self.registrations.push(Registration {
            address: TargetAddress::parse(address),
            handler,
            policy: None,
        });
        self
    }

    pub fn handler_with_policy(
        mut self,
        address: &str,
        handler: SharedHandler,
        policy: SubscriptionPolicy,
    ) -> Self {
        self.registrations.push(Registration {
            address: TargetAddress::parse(address),
            handler,
            policy: Some(policy),
        });
        self
    }

    /// Registers a typed handler for `F::PATH` on `state_name`.
    pub fn file<F, H>(self, state_name: &str, handler: H) -> Self
    where
        F: File,
        H: Handler<F> + 'static,
    {
        let address = TargetAddress::local(F::PATH).with_state(state_name);
        self.handler(&address.format(), Arc::new(TypedHandler::new(handler)))
    }

    pub fn expect_files(mut self, addresses: &[&str]) -> Self {
        self.expected = Some(addresses.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<Runtime, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|text| {
                    let wanted = TargetAddress::parse(text);
                    !self.registrations.iter().any(|r| same_target(&r.address, &wanted))
                })
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingFiles(missing));
            }
        }

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let ids: Arc<dyn IdGenerator> = match self.id_generator {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };
        let default_policy = self.config.default_policy;
        let runtime = Runtime::from_parts(self.config, clock, ids, self.transport);

        for registration in self.registrations {
            let state = runtime.get_or_create_state(&registration.address.state_name);
            let policy = registration.policy.unwrap_or(default_policy);
            state.with(|s| {
                s.register_handler(
                    registration.address.effective_path(),
                    Some(registration.handler),
                    policy,
                )
            })?;
        }
        tracing::debug!(states = runtime.state_count(), "runtime built");
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Local targets match on state (with `gl`/empty/`main` all meaning main) and path.
fn same_target(registered: &TargetAddress, wanted: &TargetAddress) -> bool {
    fn state_key(address: &TargetAddress) -> &str {
        if address.targets_default_state() {
            crate::app::runtime::MAIN_STATE_NAME
        } else {
            &address.state_name
        }
    }
    state_key(registered) == state_key(wanted)
        && registered.effective_path() == wanted.effective_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handlers::FnHandler;
    use crate::app::state::RuntimeState;
    use crate::domain::HandlerError;
    use crate::ports::FixedClock;
    use crate::typed::file::fixtures::{Ping, Pong};
    use chrono::{TimeZone, Utc};

    struct Ignore;

    impl Handler<Ping> for Ignore {
        fn handle(&self, _: Ping, _: &RuntimeState) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    fn noop() -> SharedHandler {
        Arc::new(FnHandler::new(|_, _| Ok(())))
    }

    #[test]
    fn build_success() {
        let runtime = RuntimeBuilder::new()
            .file::<Ping, _>("worker1", Ignore)
            .handler("script/boot.lua", noop())
            .expect_files(&["(worker1)script/ping.lua", "(gl)script/boot.lua"])
            .build()
            .unwrap();

        let worker = runtime.get_state("worker1").unwrap().get().unwrap();
        assert!(worker.has_handler(Ping::PATH));
        assert!(runtime.main_state().unwrap().has_handler("script/boot.lua"));
    }

    #[test]
    fn build_missing_files() {
        let result = RuntimeBuilder::new()
            .file::<Ping, _>("worker1", Ignore)
            .expect_files(&["(worker1)script/ping.lua", Pong::PATH])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingFiles(missing)) if missing == vec![Pong::PATH.to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        assert!(RuntimeBuilder::new().file::<Ping, _>("", Ignore).build().is_ok());
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = RuntimeConfig {
            max_cycles_per_run: 0,
            ..RuntimeConfig::default()
        };
        let result = RuntimeBuilder::new().config(config).build();
        assert!(matches!(result, Err(BuildError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn deleted_state_surfaces_as_build_error() {
        let runtime = Runtime::default();
        let handle = runtime.create_state("w");
        assert!(runtime.delete_state(handle.id()));

        let err: BuildError = handle
            .with(|s| s.register_handler("a.lua", Some(noop()), SubscriptionPolicy::Replace))
            .unwrap_err()
            .into();
        assert!(matches!(err, BuildError::Runtime(RuntimeError::StateGone(id)) if id == handle.id()));
        assert!(err.to_string().starts_with("registering handlers: runtime state state-"));
    }

    #[test]
    fn multicast_registrations_accumulate() {
        let runtime = RuntimeBuilder::new()
            .handler_with_policy("(w)a.lua", noop(), SubscriptionPolicy::Multicast)
            .handler_with_policy("(w)a.lua", noop(), SubscriptionPolicy::Multicast)
            .build()
            .unwrap();
        let count = runtime
            .get_state("w")
            .unwrap()
            .with(|s| s.register_handler("a.lua", Some(noop()), SubscriptionPolicy::Multicast))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn injected_clock_stamps_states() {
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let runtime = RuntimeBuilder::new()
            .clock(Arc::new(FixedClock::new(instant)))
            .build()
            .unwrap();
        assert_eq!(runtime.main_state().unwrap().created_at(), instant);
        let id = runtime.main_state().unwrap().id();
        assert_eq!(id.as_ulid().timestamp_ms(), instant.timestamp_millis() as u64);
    }
}

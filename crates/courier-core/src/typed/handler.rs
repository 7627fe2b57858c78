//! Typed handlers and their type-erased adapter.
//!
//! `Handler<F>` receives the decoded payload. `TypedHandler<F, H>` wraps it
//! into a [`FileHandler`] so it can live in a state's registry next to
//! untyped closures.

use std::marker::PhantomData;

use crate::app::handlers::{ActivationSignal, FileHandler};
use crate::app::state::RuntimeState;
use crate::domain::HandlerError;
use crate::typed::codec::PayloadCodec;
use crate::typed::file::File;

pub trait Handler<F: File>: Send + Sync {
    fn handle(&self, file: F, state: &RuntimeState) -> Result<(), HandlerError>;
}

pub struct TypedHandler<F: File, H: Handler<F>> {
    handler: H,
    _marker: PhantomData<fn() -> F>,
}

impl<F: File, H: Handler<F>> TypedHandler<F, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

impl<F: File, H: Handler<F>> FileHandler for TypedHandler<F, H> {
    fn activate(&self, _signal: ActivationSignal, state: &RuntimeState) -> Result<(), HandlerError> {
        let payload = state
            .current_message()
            .ok_or(HandlerError::NoCurrentMessage)?;
        let file: F = PayloadCodec::decode(&payload)?;
        self.handler.handle(file, state)
    }
}

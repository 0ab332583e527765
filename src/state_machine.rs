//! Session state machine
//!
//! Elm-style: [`transition`] is pure, the runtime executes the effects it returns.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{Operation, OperationState};
pub use transition::{transition, TransitionError, TransitionResult};

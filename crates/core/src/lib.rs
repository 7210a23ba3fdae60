//! Core abstractions shared by the coordinator and participant engines.
//!
//! Both engines are synchronous state machines: a runner feeds them
//! [`Event`]s and executes the [`Action`]s they return. The same engines run
//! under the deterministic simulation and under the production tokio runner.

mod action;
mod event;
mod timer;
mod traits;

pub use action::Action;
pub use event::Event;
pub use timer::TimerId;
pub use traits::StateMachine;

//! The state machine seam between protocol logic and runners.

use crate::{Action, Event};
use std::time::Duration;

/// Protocol logic for one role, driven by a runner.
///
/// The coordinator and the participant both implement this. `handle` never
/// awaits and never touches a socket or a clock: it reads the time set by
/// the runner, mutates its own state and returns the I/O it wants done. The
/// same sequence of `set_time`/`handle` calls always yields the same
/// actions, which is what lets the simulation replay a run from a seed.
///
/// ```ignore
/// let mut coordinator = CoordinatorState::new(CoordinatorConfig::default());
/// coordinator.set_time(Duration::from_millis(40));
/// for action in coordinator.handle(Event::TimerFired(TimerId::VoteWindow(id))) {
///     runner.execute(action);
/// }
/// ```
pub trait StateMachine {
    /// React to one event.
    ///
    /// Events meant for the other role are logged and ignored.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Advance the clock. Runners call this before every `handle`.
    fn set_time(&mut self, now: Duration);

    /// The time last passed to `set_time`.
    fn now(&self) -> Duration;
}

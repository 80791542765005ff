//! Environment step.
use super::Env;
use crate::record::Record;

/// Represents the outcome of applying an action, `(a_t, r_t, s_t+1)`.
///
/// An environment emits a [`Step`] object at every decision point.
pub struct Step<E: Env> {
    /// Action.
    pub act: E::Act,

    /// Reward.
    pub reward: f64,

    /// State reached after the action.
    pub next_state: E::State,

    /// Flag denoting if the episode is terminated at `next_state`.
    ///
    /// No future value is bootstrapped from a terminal state.
    pub is_terminated: bool,

    /// Information defined by the environment, merged into the training record.
    pub record: Record,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(act: E::Act, reward: f64, next_state: E::State, is_terminated: bool) -> Self {
        Step {
            act,
            reward,
            next_state,
            is_terminated,
            record: Record::empty(),
        }
    }

    /// Attaches environment-specific information.
    pub fn with_record(mut self, record: Record) -> Self {
        self.record = record;
        self
    }
}

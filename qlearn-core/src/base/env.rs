//! Environment.
use super::{Act, StateKey, Step};
use anyhow::Result;

/// Represents an environment consumed by [`Trainer`](crate::Trainer).
///
/// The environment is passive with respect to learning: it never reads or
/// writes the value store. Reward semantics are entirely up to the implementor.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Discretized state of the environment.
    type State: StateKey;

    /// Action of the environment.
    type Act: Act;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Returns the projection of the current simulation state.
    fn current_state(&self) -> Self::State;

    /// Moves the simulation to an arbitrary valid configuration and returns
    /// its projection.
    fn random_state(&mut self) -> Self::State;

    /// Starts a new episode and returns its initial state.
    fn reset(&mut self) -> Result<Self::State>;

    /// Returns the legal actions in the given state, in ascending order.
    ///
    /// The returned vector must not be empty unless the state is terminal.
    fn legal_actions(&self, state: &Self::State) -> Vec<Self::Act>;

    /// Applies an action and advances the simulation up to its next decision
    /// point, which may take any number of internal sub-steps.
    fn step(&mut self, a: &Self::Act) -> Step<Self>
    where
        Self: Sized;

    /// Returns `true` if the simulation can not be stepped at the moment.
    fn is_paused(&self) -> bool {
        false
    }

    /// Lets the simulation advance while it is paused.
    ///
    /// Called between polls of [`Env::is_paused`].
    fn wait(&mut self) {}
}

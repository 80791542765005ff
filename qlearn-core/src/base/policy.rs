//! Policy.
use super::Env;
use crate::ValueStore;
use anyhow::Result;
use rand::RngCore;

/// A policy on an environment.
///
/// Policy is a mapping from a state and its legal actions to an action,
/// informed by the estimates in a [`ValueStore`]. Policies never write to the store.
pub trait Policy<E: Env> {
    /// Sample an action given a state and its legal actions.
    fn sample(
        &mut self,
        store: &ValueStore,
        state: &E::State,
        actions: &[E::Act],
        rng: &mut dyn RngCore,
    ) -> Result<E::Act>;
}

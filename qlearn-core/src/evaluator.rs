//! Evaluate learned action values.
use crate::{record::Record, Env, ValueStore};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluate the greedy policy of a [`ValueStore`].
pub trait Evaluator<E: Env> {
    /// Runs the greedy policy and returns a record of the performance.
    ///
    /// The store is only read.
    fn evaluate(&mut self, store: &ValueStore) -> Result<Record>;
}

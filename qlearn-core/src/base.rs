//! Core functionalities.
mod env;
mod policy;
mod step;
pub use env::Env;
pub use policy::Policy;
use std::{fmt::Debug, hash::Hash};
pub use step::Step;

/// Discretized state of an environment.
///
/// A state key is everything the agent conditions its decisions on. Adapters
/// own the projection from a raw simulation snapshot to a key: two snapshots
/// that are equivalent for decision making must project to equal keys.
pub trait StateKey: Clone + Debug + Eq + Hash {
    /// Returns the string encoding of the state, used as a part of the keys
    /// of [`ValueStore`](crate::ValueStore).
    fn encode(&self) -> String;
}

/// A member of a small, closed set of moves.
///
/// The set is totally ordered so that iteration over actions is deterministic.
pub trait Act: Copy + Debug + Eq + Ord + Hash {
    /// Returns the string encoding of the action.
    ///
    /// The encoding must not contain [`KEY_SEPARATOR`](crate::value_store::KEY_SEPARATOR).
    fn encode(&self) -> String;

    /// Returns all members of the action set in ascending order.
    fn all() -> Vec<Self>;
}

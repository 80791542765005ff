//! Exploration strategies.
use crate::{error::QlError, value_store::TieBreak, Env, Policy, ValueStore};
use anyhow::Result;
use rand::{seq::SliceRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Epsilon-greedy action selection.
///
/// With probability ε an action is drawn uniformly from the legal set,
/// otherwise the best known action is taken. ε is annealed linearly from
/// `eps_start` to `eps_final` over `final_step` decisions; with the default
/// configuration both ends are equal and ε is a fixed scalar.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Number of decisions taken so far.
    #[serde(default)]
    pub n_steps: usize,

    /// ε at the first decision.
    pub eps_start: f64,

    /// ε from `final_step` on.
    pub eps_final: f64,

    /// The decision at which ε reaches `eps_final`.
    pub final_step: usize,

    /// Resolution of ties among best actions when exploiting.
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self::constant(0.2)
    }
}

impl EpsilonGreedy {
    /// Constructs an explorer with a fixed ε.
    pub fn constant(eps: f64) -> Self {
        Self {
            n_steps: 0,
            eps_start: eps,
            eps_final: eps,
            final_step: 1,
            tie_break: TieBreak::default(),
        }
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(mut self, v: f64) -> Self {
        self.eps_final = v;
        self
    }

    /// Set the decision at which ε reaches its final value.
    pub fn final_step(mut self, v: usize) -> Self {
        self.final_step = v;
        self
    }

    /// Set the tie-breaking policy.
    pub fn tie_break(mut self, v: TieBreak) -> Self {
        self.tie_break = v;
        self
    }

    /// The ε used for the next decision.
    pub fn epsilon(&self) -> f64 {
        if self.n_steps >= self.final_step {
            return self.eps_final;
        }
        let d = (self.eps_start - self.eps_final) / self.final_step as f64;
        self.eps_start - d * self.n_steps as f64
    }

    /// Checks that both ends of the schedule are probabilities.
    pub fn validate(&self) -> Result<(), QlError> {
        for (name, v) in [("eps_start", self.eps_start), ("eps_final", self.eps_final)].iter() {
            if !v.is_finite() || !(0.0..=1.0).contains(v) {
                return Err(QlError::invalid(*name, v));
            }
        }
        if self.final_step == 0 {
            return Err(QlError::invalid("final_step", self.final_step));
        }
        Ok(())
    }

    /// Chooses an action among `actions`; the second value is `true` if the
    /// action was drawn at random.
    pub fn action_with_flag<E: Env>(
        &mut self,
        store: &ValueStore,
        state: &E::State,
        actions: &[E::Act],
        rng: &mut dyn RngCore,
    ) -> Result<(E::Act, bool), QlError> {
        let eps = self.epsilon();
        self.n_steps += 1;

        if rng.gen::<f64>() < eps {
            match actions.choose(rng) {
                Some(a) => Ok((*a, true)),
                None => Err(QlError::EmptyActionSet {
                    state: crate::StateKey::encode(state),
                }),
            }
        } else {
            let a = store.best_action_with(state, actions, self.tie_break, rng)?;
            Ok((a, false))
        }
    }
}

impl<E: Env> Policy<E> for EpsilonGreedy {
    fn sample(
        &mut self,
        store: &ValueStore,
        state: &E::State,
        actions: &[E::Act],
        rng: &mut dyn RngCore,
    ) -> Result<E::Act> {
        let (a, _) = self.action_with_flag::<E>(store, state, actions, rng)?;
        Ok(a)
    }
}

/// Always takes the best known action.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
pub struct Greedy {
    /// Resolution of ties among best actions.
    pub tie_break: TieBreak,
}

impl<E: Env> Policy<E> for Greedy {
    fn sample(
        &mut self,
        store: &ValueStore,
        state: &E::State,
        actions: &[E::Act],
        rng: &mut dyn RngCore,
    ) -> Result<E::Act> {
        Ok(store.best_action_with(state, actions, self.tie_break, rng)?)
    }
}

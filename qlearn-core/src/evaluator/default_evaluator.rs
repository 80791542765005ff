use super::{Evaluator, Record};
use crate::{error::QlError, record::RecordValue::Scalar, util, Env, Greedy, Policy, ValueStore};
use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};
use std::time::Duration;

/// A default [`Evaluator`].
///
/// Runs the greedy policy on its own environment for a fixed number of
/// decisions and reports the mean reward per decision and the number of
/// finished episodes.
pub struct DefaultEvaluator<E: Env> {
    env: E,
    n_steps: usize,
    policy: Greedy,
    rng: StdRng,
    pause_poll: Duration,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate(&mut self, store: &ValueStore) -> Result<Record> {
        let mut state = self.env.reset()?;
        let mut r_total = 0.0;
        let mut episodes = 0usize;

        for _ in 0..self.n_steps {
            util::wait_while_paused(&mut self.env, self.pause_poll);
            let actions = self.env.legal_actions(&state);
            let act =
                Policy::<E>::sample(&mut self.policy, store, &state, &actions, &mut self.rng)?;
            let step = self.env.step(&act);
            r_total += step.reward;
            state = match step.is_terminated {
                true => {
                    episodes += 1;
                    self.env.reset()?
                }
                false => step.next_state,
            };
        }

        let mut record = Record::empty();
        record.insert(
            "eval_reward_mean",
            Scalar((r_total / self.n_steps as f64) as _),
        );
        record.insert("eval_episodes", Scalar(episodes as _));
        Ok(record)
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs an evaluator on a new environment.
    ///
    /// `n_steps` is the number of decisions per evaluation.
    pub fn new(config: &E::Config, seed: i64, n_steps: usize) -> Result<Self> {
        Self::from_env(E::build(config, seed)?, seed as u64, n_steps)
    }

    /// Constructs an evaluator on a given environment.
    pub fn from_env(env: E, seed: u64, n_steps: usize) -> Result<Self> {
        if n_steps == 0 {
            return Err(QlError::invalid("n_steps", n_steps).into());
        }
        Ok(Self {
            env,
            n_steps,
            policy: Greedy::default(),
            rng: StdRng::seed_from_u64(seed),
            pause_poll: Duration::from_millis(100),
        })
    }

    /// Sets the interval between polls of a paused environment.
    pub fn pause_poll(mut self, v: Duration) -> Self {
        self.pause_poll = v;
        self
    }

    /// The environment used for evaluation.
    pub fn env(&self) -> &E {
        &self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{DummyAct, DummyState, LoopEnv, LoopEnvConfig};
    use tempdir::TempDir;

    #[test]
    fn test_evaluate_counts_episodes() {
        let dir = TempDir::new("evaluator").unwrap();
        let mut store = ValueStore::open(dir.path().join("q")).unwrap();
        store.put(&DummyState(0), &DummyAct(1), 1.0);
        let config = LoopEnvConfig {
            n_states: 2,
            reward: 2.0,
            episode_len: Some(4),
            ..LoopEnvConfig::default()
        };
        let mut evaluator = DefaultEvaluator::<LoopEnv>::new(&config, 0, 10).unwrap();
        let record = evaluator.evaluate(&store).unwrap();

        assert_eq!(record.get_scalar("eval_reward_mean").unwrap(), 2.0);
        assert_eq!(record.get_scalar("eval_episodes").unwrap(), 2.0);
        assert_eq!(evaluator.env().steps, 10);
        // Evaluation does not touch the store
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evaluate_waits_while_paused() {
        let dir = TempDir::new("evaluator").unwrap();
        let store = ValueStore::open(dir.path().join("q")).unwrap();
        let config = LoopEnvConfig {
            pause: Some((2, 3)),
            ..LoopEnvConfig::default()
        };
        let mut evaluator = DefaultEvaluator::<LoopEnv>::new(&config, 0, 5)
            .unwrap()
            .pause_poll(Duration::from_millis(1));
        evaluator.evaluate(&store).unwrap();
        assert_eq!(evaluator.env().waits, 3);
        assert_eq!(evaluator.env().steps, 5);
    }

    #[test]
    fn test_zero_steps_is_rejected() {
        assert!(DefaultEvaluator::<LoopEnv>::new(&LoopEnvConfig::default(), 0, 0).is_err());
    }
}

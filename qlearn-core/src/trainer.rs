//! Train action values with Q-learning.
mod config;
use crate::{
    record::{AggregateRecorder, Record, RecordValue::Scalar},
    util, Env, EpsilonGreedy, Evaluator, ValueStore,
};
use anyhow::Result;
pub use config::TrainerConfig;
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// One-step temporal-difference update, `(1 - α) q + α (r + γ maxQ)`.
///
/// With `alpha == 0` the estimate `q` is returned unchanged.
pub fn td_update(q: f64, reward: f64, max_q: f64, alpha: f64, gamma: f64) -> f64 {
    (1.0 - alpha) * q + alpha * (reward + gamma * max_q)
}

/// Phase of a [`Trainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerStatus {
    /// Built, not trained yet.
    Idle,

    /// An iteration is in flight.
    Running,

    /// The value store is being saved.
    Checkpointing,

    /// The training loop has returned.
    Stopped,
}

/// Requests a running [`Trainer`] to stop after its current iteration.
///
/// The handle can be cloned and sent to other threads.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Requests the trainer to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of a call to [`Trainer::train`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainStats {
    /// Iterations completed by the trainer, over all calls.
    pub iterations: usize,

    /// Saves of the value store done by the trainer.
    pub checkpoints: usize,

    /// Polls spent waiting for a paused environment.
    pub paused_polls: usize,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// The first iteration starts from [`Env::random_state`]. Then every iteration
/// of [`Trainer::train()`] does the following:
///
/// 1. If the environment is paused, let it advance, sleep for `pause_poll_millis`
///    and retry. Paused polls do not count as iterations.
/// 2. If `iterations % save_interval == 0`, save the [`ValueStore`].
/// 3. With probability `walk_restart_prob`, move the environment to a random state.
/// 4. Choose an action among the legal actions with [`EpsilonGreedy`].
/// 5. Step the environment, receiving reward `r` and next state `s'`.
/// 6. `q = Q(s, a)`, `maxQ = max_a' Q(s', a')` (`0` if `s'` is terminal).
/// 7. `Q(s, a) = (1 - α) q + α (r + γ maxQ)`.
/// 8. Continue from `s'`, or from a reset of the environment if `s'` is terminal.
///
/// The loop ends after `max_iters` iterations or when a [`StopHandle`] fires.
/// The store is not saved when the loop ends; the caller should call
/// [`ValueStore::save`] to keep the iterations after the last checkpoint.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     T[Trainer]-->|Env::Act|E[Env]
///     E -->|"Step&lt;E: Env&gt;"|T
///     T -->|put|V[ValueStore]
///     V -->|get, best_action|T
///     V -->|save|F[(store file)]
/// ```
pub struct Trainer<E: Env> {
    config: TrainerConfig,
    env: E,
    store: ValueStore,
    explorer: EpsilonGreedy,
    rng: StdRng,
    state: Option<E::State>,
    iterations: usize,
    checkpoints: usize,
    paused_polls: usize,
    status: TrainerStatus,
    stop: StopHandle,
}

impl<E: Env> Trainer<E> {
    /// Constructs a trainer for the given environment and value store.
    ///
    /// Fails if the configuration is out of range.
    pub fn build(config: TrainerConfig, env: E, store: ValueStore) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            explorer: config.exploration.clone(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            env,
            store,
            state: None,
            iterations: 0,
            checkpoints: 0,
            paused_polls: 0,
            status: TrainerStatus::Idle,
            stop: StopHandle::default(),
        })
    }

    /// Returns a handle to stop the training loop.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Phase of the trainer.
    pub fn status(&self) -> TrainerStatus {
        self.status
    }

    /// Iterations completed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The environment, mutable.
    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    /// The value store.
    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    /// The value store, mutable.
    pub fn store_mut(&mut self) -> &mut ValueStore {
        &mut self.store
    }

    /// Returns the environment and the value store.
    pub fn into_parts(self) -> (E, ValueStore) {
        (self.env, self.store)
    }

    fn stats(&self) -> TrainStats {
        TrainStats {
            iterations: self.iterations,
            checkpoints: self.checkpoints,
            paused_polls: self.paused_polls,
        }
    }

    fn checkpoint(&mut self) -> Result<()> {
        self.status = TrainerStatus::Checkpointing;
        info!("Saving value store at iteration {}", self.iterations);
        self.store.save()?;
        self.checkpoints += 1;
        self.status = TrainerStatus::Running;
        Ok(())
    }

    /// Performs a training iteration.
    ///
    /// Returns `None` without counting an iteration if the environment was
    /// paused; in that case the call has waited for `pause_poll_millis`.
    pub fn train_step(&mut self) -> Result<Option<Record>> {
        let poll = Duration::from_millis(self.config.pause_poll_millis);
        if util::poll_paused(&mut self.env, poll) {
            self.paused_polls += 1;
            return Ok(None);
        }
        self.status = TrainerStatus::Running;

        if self.iterations % self.config.save_interval == 0 {
            self.checkpoint()?;
        }

        let state = match self.state.take() {
            None => self.env.random_state(),
            Some(s) => {
                if self.rng.gen::<f64>() < self.config.walk_restart_prob {
                    self.env.random_state()
                } else {
                    s
                }
            }
        };

        let actions = self.env.legal_actions(&state);
        let (act, explored) =
            self.explorer
                .action_with_flag::<E>(&self.store, &state, &actions, &mut self.rng)?;
        let step = self.env.step(&act);

        let q = self.store.get(&state, &act);
        let max_q = if step.is_terminated {
            0.0
        } else {
            let next_actions = self.env.legal_actions(&step.next_state);
            self.store.max_value(&step.next_state, &next_actions)?
        };
        let q = td_update(
            q,
            step.reward,
            max_q,
            self.config.learning_rate,
            self.config.discount_rate,
        );
        self.store.put(&state, &act, q);

        self.state = Some(match step.is_terminated {
            true => self.env.reset()?,
            false => step.next_state,
        });
        self.iterations += 1;

        let mut record = step.record;
        record.insert("reward", Scalar(step.reward as _));
        record.insert("q", Scalar(q as _));
        record.insert("explored", Scalar(explored as u8 as _));
        Ok(Some(record))
    }

    /// Train the action values.
    ///
    /// `evaluator` is run every `eval_interval` iterations, if given.
    /// The trainer is [`TrainerStatus::Stopped`] on return, also on errors.
    pub fn train(
        &mut self,
        recorder: &mut dyn AggregateRecorder,
        evaluator: Option<&mut dyn Evaluator<E>>,
    ) -> Result<TrainStats> {
        let result = self.train_loop(recorder, evaluator);
        self.status = TrainerStatus::Stopped;
        result
    }

    fn train_loop(
        &mut self,
        recorder: &mut dyn AggregateRecorder,
        mut evaluator: Option<&mut dyn Evaluator<E>>,
    ) -> Result<TrainStats> {
        info!(
            "Start training from iteration {}, value store size = {}",
            self.iterations,
            self.store.len()
        );
        let mut timer = Instant::now();
        let mut iters_for_ips = 0usize;

        loop {
            if self.stop.is_stopped() {
                info!("Training stopped at iteration {}", self.iterations);
                break;
            }
            if let Some(max_iters) = self.config.max_iters {
                if self.iterations >= max_iters {
                    break;
                }
            }

            let record = match self.train_step()? {
                Some(record) => record,
                None => continue,
            };
            iters_for_ips += 1;
            recorder.store(record);

            if self.config.eval_interval > 0 && self.iterations % self.config.eval_interval == 0 {
                if let Some(evaluator) = evaluator.as_mut() {
                    info!("Starts evaluation at iteration {}", self.iterations);
                    recorder.store(evaluator.evaluate(&self.store)?);
                }
            }

            if self.iterations % self.config.record_interval == 0 {
                let secs = timer.elapsed().as_secs_f32();
                let mut record = Record::empty();
                record.insert("iterations", Scalar(self.iterations as _));
                record.insert("epsilon", Scalar(self.explorer.epsilon() as _));
                record.insert("store_size", Scalar(self.store.len() as _));
                if secs > 0.0 {
                    record.insert("iters_per_sec", Scalar(iters_for_ips as f32 / secs));
                }
                recorder.store(record);
                recorder.flush(self.iterations as _);
                timer = Instant::now();
                iters_for_ips = 0;
            }
        }

        info!(
            "Finished training at iteration {}, value store size = {}",
            self.iterations,
            self.store.len()
        );
        Ok(self.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAct, DummyState, LoopEnv, LoopEnvConfig},
        error::QlError,
        record::{BufferedRecorder, NullRecorder},
        TieBreak,
    };
    use tempdir::TempDir;
    use test_log::test;

    fn greedy_config() -> TrainerConfig {
        TrainerConfig::default()
            .exploration(EpsilonGreedy::constant(0.0).tie_break(TieBreak::First))
            .walk_restart_prob(0.0)
            .pause_poll_millis(1)
    }

    fn trainer(
        dir: &TempDir,
        config: TrainerConfig,
        env_config: LoopEnvConfig,
    ) -> Trainer<LoopEnv> {
        let env = LoopEnv::build(&env_config, 0).unwrap();
        let store = ValueStore::open(dir.path().join("store.qtable")).unwrap();
        Trainer::build(config, env, store).unwrap()
    }

    #[test]
    fn test_td_update_zero_learning_rate() {
        for q in [0.0, -3.5, 1e10, 0.1 + 0.2].iter() {
            for (r, max_q) in [(10.0, 0.0), (-7.0, 3.0), (1e6, -1e6)].iter() {
                assert_eq!(td_update(*q, *r, *max_q, 0.0, 0.9), *q);
            }
        }
    }

    #[test]
    fn test_td_update_converges_to_discounted_reward() {
        for (alpha, gamma) in [(0.5, 0.9), (0.1, 0.5), (0.9, 0.0)].iter() {
            let reward = 2.0;
            let mut q = 0.0;
            for _ in 0..5000 {
                q = td_update(q, reward, q, *alpha, *gamma);
            }
            let expected = reward / (1.0 - gamma);
            assert!((q - expected).abs() < 1e-6, "{} vs {}", q, expected);
        }
    }

    #[test]
    fn test_single_iteration_update() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config()
            .learning_rate(0.5)
            .discount_rate(0.9)
            .max_iters(Some(1));
        let env_config = LoopEnvConfig {
            reward: 10.0,
            ..LoopEnvConfig::default()
        };
        let mut trainer = trainer(&dir, config, env_config);
        let stats = trainer.train(&mut NullRecorder::new(), None).unwrap();

        assert_eq!(stats.iterations, 1);
        assert_eq!(trainer.status(), TrainerStatus::Stopped);
        assert_eq!(trainer.store().get(&DummyState(0), &DummyAct(0)), 5.0);
        assert_eq!(trainer.store().get(&DummyState(0), &DummyAct(1)), 0.0);
    }

    #[test]
    fn test_trainer_converges_on_self_loop() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config()
            .learning_rate(0.3)
            .discount_rate(0.8)
            .save_interval(1000)
            .max_iters(Some(2000));
        let env_config = LoopEnvConfig {
            n_acts: 1,
            reward: 1.0,
            ..LoopEnvConfig::default()
        };
        let mut trainer = trainer(&dir, config, env_config);
        trainer.train(&mut NullRecorder::new(), None).unwrap();

        let q = trainer.store().get(&DummyState(0), &DummyAct(0));
        assert!((q - 5.0).abs() < 1e-6, "{}", q);
    }

    #[test]
    fn test_checkpoint_cadence() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config().save_interval(50).max_iters(Some(120));
        let mut trainer = trainer(&dir, config, LoopEnvConfig::default());
        let stats = trainer.train(&mut NullRecorder::new(), None).unwrap();
        // Saves before iterations 0, 50 and 100.
        assert_eq!(stats.checkpoints, 3);

        // Iterations after the last checkpoint are only in memory.
        let on_disk = ValueStore::open(dir.path().join("store.qtable")).unwrap();
        assert_ne!(
            on_disk.get(&DummyState(0), &DummyAct(0)),
            trainer.store().get(&DummyState(0), &DummyAct(0))
        );
        trainer.store().save().unwrap();
        let on_disk = ValueStore::open(dir.path().join("store.qtable")).unwrap();
        assert_eq!(
            on_disk.get(&DummyState(0), &DummyAct(0)),
            trainer.store().get(&DummyState(0), &DummyAct(0))
        );
    }

    #[test]
    fn test_pause_does_not_consume_iterations() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config().max_iters(Some(10));
        let env_config = LoopEnvConfig {
            pause: Some((3, 4)),
            ..LoopEnvConfig::default()
        };
        let mut trainer = trainer(&dir, config, env_config);
        let stats = trainer.train(&mut NullRecorder::new(), None).unwrap();

        assert_eq!(stats.iterations, 10);
        assert_eq!(stats.paused_polls, 4);
        assert_eq!(trainer.env().steps, 10);
        assert_eq!(trainer.env().waits, 4);
    }

    #[test]
    fn test_walk_restart() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config().walk_restart_prob(1.0).max_iters(Some(20));
        let env_config = LoopEnvConfig {
            n_states: 5,
            ..LoopEnvConfig::default()
        };
        let mut trainer = trainer(&dir, config, env_config);
        trainer.train(&mut NullRecorder::new(), None).unwrap();
        // One for the start and one for every following iteration.
        assert_eq!(trainer.env().random_states, 20);
    }

    #[test]
    fn test_terminal_state_resets_episode() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config()
            .learning_rate(1.0)
            .discount_rate(0.5)
            .max_iters(Some(6));
        let env_config = LoopEnvConfig {
            n_states: 3,
            n_acts: 2,
            reward: 1.0,
            episode_len: Some(2),
            pause: None,
        };
        let mut trainer = trainer(&dir, config, env_config);
        trainer.train(&mut NullRecorder::new(), None).unwrap();
        assert_eq!(trainer.env().resets, 3);
    }

    #[test]
    fn test_empty_action_set_is_fatal() {
        let dir = TempDir::new("trainer").unwrap();
        let env_config = LoopEnvConfig {
            n_acts: 0,
            ..LoopEnvConfig::default()
        };
        let mut trainer = trainer(&dir, greedy_config(), env_config);
        let err = trainer.train(&mut NullRecorder::new(), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QlError>(),
            Some(QlError::EmptyActionSet { .. })
        ));
        assert_eq!(trainer.iterations(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = TempDir::new("trainer").unwrap();
        let env = LoopEnv::build(&LoopEnvConfig::default(), 0).unwrap();
        let store = ValueStore::open(dir.path().join("store.qtable")).unwrap();
        let config = greedy_config().learning_rate(f64::NAN);
        assert!(Trainer::build(config, env, store).is_err());
    }

    #[test]
    fn test_records_are_flushed() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config().record_interval(10).max_iters(Some(30));
        let mut trainer = trainer(&dir, config, LoopEnvConfig::default());
        let mut recorder = BufferedRecorder::new();
        trainer.train(&mut recorder, None).unwrap();

        assert_eq!(recorder.len(), 3);
        let last = recorder.iter().last().unwrap();
        assert_eq!(last.get_scalar("iterations").unwrap(), 30.0);
        assert_eq!(last.get_scalar("step").unwrap(), 30.0);
        assert_eq!(last.get_scalar("reward_mean").unwrap(), 1.0);
        assert_eq!(last.get_scalar("store_size").unwrap(), 1.0);
    }

    struct FailingEvaluator;

    impl Evaluator<LoopEnv> for FailingEvaluator {
        fn evaluate(&mut self, _store: &ValueStore) -> Result<Record> {
            anyhow::bail!("evaluation failed")
        }
    }

    #[test]
    fn test_evaluator_error_stops_training() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config().max_iters(Some(10)).eval_interval(2);
        let mut trainer = trainer(&dir, config, LoopEnvConfig::default());
        let mut evaluator = FailingEvaluator;
        let err = trainer
            .train(&mut NullRecorder::new(), Some(&mut evaluator))
            .unwrap_err();

        assert_eq!(err.to_string(), "evaluation failed");
        assert_eq!(trainer.status(), TrainerStatus::Stopped);
        assert_eq!(trainer.iterations(), 2);
    }

    #[test]
    fn test_stop_handle() {
        let dir = TempDir::new("trainer").unwrap();
        let config = greedy_config().max_iters(None).save_interval(100_000);
        let mut trainer = trainer(&dir, config, LoopEnvConfig::default());
        let stop = trainer.stop_handle();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.stop();
        });
        let stats = trainer.train(&mut NullRecorder::new(), None).unwrap();
        handle.join().unwrap();
        assert!(stats.iterations > 0);
        assert_eq!(trainer.status(), TrainerStatus::Stopped);
    }
}

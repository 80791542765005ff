//! Tabular Q-learning in Rust.
//!
//! qlearn consists of the following crates:
//!
//! * [qlearn-core](qlearn_core) provides the [`Env`](qlearn_core::Env) trait,
//!   the durable [`ValueStore`](qlearn_core::ValueStore), ε-greedy exploration
//!   and the [`Trainer`](qlearn_core::Trainer).
//! * [qlearn-env](qlearn_env) includes a tic-tac-toe environment and a maze
//!   with pellets and ghosts.
//! * [qlearn-tensorboard](qlearn_tensorboard) has `TensorboardRecorder` to write
//!   records which can be shown in TensorBoard.
//!
//! This crate re-exports them and hosts the example programs.
pub use qlearn_core as core;
pub use qlearn_env as env;
pub use qlearn_tensorboard as tensorboard;

use anyhow::Result;
use log::info;
use qlearn_core::{
    record::AggregateRecorder, DefaultEvaluator, Env, Evaluator, TrainStats, Trainer,
    TrainerConfig, ValueStore,
};
use std::path::Path;

/// Trains on a new environment, starting from the value store at `store_path`.
///
/// The store is saved once more after training, so the file holds every
/// iteration of the run. Evaluation runs every `eval_interval` iterations of
/// `trainer_config` when `eval_steps` is given.
pub fn train<E: Env>(
    env_config: &E::Config,
    trainer_config: TrainerConfig,
    store_path: impl AsRef<Path>,
    recorder: &mut dyn AggregateRecorder,
    eval_steps: Option<usize>,
) -> Result<TrainStats> {
    let seed = trainer_config.seed as i64;
    let env = E::build(env_config, seed)?;
    let store = ValueStore::open(store_path)?;
    info!(
        "Loaded value store {:?} with {} entries",
        store.path(),
        store.len()
    );
    let mut trainer = Trainer::build(trainer_config, env, store)?;
    let stats = match eval_steps {
        Some(n) => {
            let mut evaluator =
                DefaultEvaluator::<E>::new(env_config, seed.wrapping_add(1), n)?;
            trainer.train(recorder, Some(&mut evaluator))?
        }
        None => trainer.train(recorder, None)?,
    };
    trainer.store().save()?;
    info!("{:?}", stats);
    Ok(stats)
}

/// Runs the greedy policy of the value store at `store_path` for `n_steps` decisions.
pub fn evaluate<E: Env>(
    env_config: &E::Config,
    store_path: impl AsRef<Path>,
    n_steps: usize,
    seed: i64,
) -> Result<qlearn_core::record::Record> {
    let store = ValueStore::open(store_path)?;
    let mut evaluator = DefaultEvaluator::<E>::new(env_config, seed, n_steps)?;
    let record = evaluator.evaluate(&store)?;
    for (k, v) in record.iter() {
        info!("{}: {:?}", k, v);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlearn_core::{
        dummy::{LoopEnv, LoopEnvConfig},
        record::BufferedRecorder,
    };
    use tempdir::TempDir;

    #[test]
    fn test_train_with_largest_seed() {
        let dir = TempDir::new("qlearn").unwrap();
        let path = dir.path().join("store.qtable");
        let config = TrainerConfig::default()
            .seed(i64::MAX as u64)
            .max_iters(Some(10))
            .eval_interval(5)
            .pause_poll_millis(1);
        let mut recorder = BufferedRecorder::new();
        let stats = train::<LoopEnv>(
            &LoopEnvConfig::default(),
            config,
            &path,
            &mut recorder,
            Some(3),
        )
        .unwrap();

        assert_eq!(stats.iterations, 10);
        assert!(path.exists());
        assert!(!evaluate::<LoopEnv>(&LoopEnvConfig::default(), &path, 3, i64::MAX)
            .unwrap()
            .is_empty());
    }
}

//! Configuration of [`Trainer`](super::Trainer).
use crate::{error::QlError, EpsilonGreedy};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The maximum number of iterations. `None` runs until stopped with a
    /// [`StopHandle`](super::StopHandle).
    pub max_iters: Option<usize>,

    /// Learning rate α, the weight of new evidence in an update.
    pub learning_rate: f64,

    /// Discount rate γ, the weight of the estimated future value.
    pub discount_rate: f64,

    /// Probability of moving the environment to a random state before an iteration.
    pub walk_restart_prob: f64,

    /// Interval of saving the value store in iterations.
    pub save_interval: usize,

    /// Interval of flushing records in iterations.
    pub record_interval: usize,

    /// Interval of evaluation in iterations. `0` disables evaluation.
    pub eval_interval: usize,

    /// Sleep between polls of a paused environment, in milliseconds. Must be positive.
    pub pause_poll_millis: u64,

    /// Seed of the random number generator of the trainer.
    pub seed: u64,

    /// Exploration strategy.
    pub exploration: EpsilonGreedy,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_iters: Some(10_000),
            learning_rate: 0.7,
            discount_rate: 0.75,
            walk_restart_prob: 0.01,
            save_interval: 50,
            record_interval: 100,
            eval_interval: 0,
            pause_poll_millis: 1000,
            seed: 42,
            exploration: EpsilonGreedy::constant(0.2),
        }
    }
}

fn check_unit(name: &'static str, v: f64) -> Result<(), QlError> {
    if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(QlError::invalid(name, v))
    }
}

impl TrainerConfig {
    /// Sets the maximum number of iterations.
    pub fn max_iters(mut self, v: Option<usize>) -> Self {
        self.max_iters = v;
        self
    }

    /// Sets the learning rate.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the discount rate.
    pub fn discount_rate(mut self, v: f64) -> Self {
        self.discount_rate = v;
        self
    }

    /// Sets the fixed exploration probability.
    pub fn exploration_rate(mut self, v: f64) -> Self {
        self.exploration = EpsilonGreedy::constant(v).tie_break(self.exploration.tie_break);
        self
    }

    /// Sets the exploration strategy.
    pub fn exploration(mut self, v: EpsilonGreedy) -> Self {
        self.exploration = v;
        self
    }

    /// Sets the walk-restart probability.
    pub fn walk_restart_prob(mut self, v: f64) -> Self {
        self.walk_restart_prob = v;
        self
    }

    /// Sets the interval of saving the value store.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of flushing records.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }

    /// Sets the interval of evaluation.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the sleep between polls of a paused environment.
    pub fn pause_poll_millis(mut self, v: u64) -> Self {
        self.pause_poll_millis = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks ranges of the parameters.
    pub fn validate(&self) -> Result<(), QlError> {
        if self.max_iters == Some(0) {
            return Err(QlError::invalid("max_iters", 0));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 || self.learning_rate > 1.0
        {
            return Err(QlError::invalid("learning_rate", self.learning_rate));
        }
        check_unit("discount_rate", self.discount_rate)?;
        check_unit("walk_restart_prob", self.walk_restart_prob)?;
        if self.save_interval == 0 {
            return Err(QlError::invalid("save_interval", 0));
        }
        if self.record_interval == 0 {
            return Err(QlError::invalid("record_interval", 0));
        }
        if self.pause_poll_millis == 0 {
            return Err(QlError::invalid("pause_poll_millis", 0));
        }
        self.exploration.validate()
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

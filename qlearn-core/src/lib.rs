#![warn(missing_docs)]
//! A library for tabular Q-learning.
//!
//! An [`Env`] exposes discretized states and a small set of legal actions;
//! a [`Trainer`] walks the environment with [`EpsilonGreedy`] exploration and
//! updates the estimates of a [`ValueStore`], which is periodically saved to
//! a file so that training can be resumed.
//!
//! ```no_run
//! use qlearn_core::{
//!     dummy::{LoopEnv, LoopEnvConfig},
//!     record::NullRecorder,
//!     Env, Trainer, TrainerConfig, ValueStore,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = LoopEnv::build(&LoopEnvConfig::default(), 42)?;
//! let store = ValueStore::open("loop.qtable")?;
//! let mut trainer = Trainer::build(TrainerConfig::default(), env, store)?;
//! trainer.train(&mut NullRecorder::new(), None)?;
//! trainer.store().save()?;
//! # Ok(())
//! # }
//! ```
pub mod dummy;
pub mod error;
pub mod record;
pub mod util;
pub mod value_store;

mod base;
pub use base::{Act, Env, Policy, StateKey, Step};

mod explorer;
pub use explorer::{EpsilonGreedy, Greedy};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{td_update, StopHandle, TrainStats, Trainer, TrainerConfig, TrainerStatus};

pub use value_store::{TieBreak, ValueStore};

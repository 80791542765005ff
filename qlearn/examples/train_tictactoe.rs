use anyhow::Result;
use clap::Parser;
use qlearn::{
    core::{
        record::{AggregateRecorder, NullRecorder},
        EpsilonGreedy, TrainerConfig,
    },
    env::{TicTacToe, TicTacToeConfig},
    tensorboard::TensorboardRecorder,
};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

const STORE_PATH: &str = "tictactoe.qtable";
const MAX_ITERS: usize = 200_000;
const EVAL_STEPS: usize = 1000;

#[derive(Serialize, Deserialize, Default)]
struct TicTacToeDemoConfig {
    env_config: TicTacToeConfig,
    trainer_config: Option<TrainerConfig>,
}

impl TicTacToeDemoConfig {
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(rdr)?)
    }

    fn trainer_config(&self, max_iters: usize) -> TrainerConfig {
        match &self.trainer_config {
            Some(config) => config.clone(),
            None => TrainerConfig::default()
                .max_iters(Some(max_iters))
                .learning_rate(0.5)
                .discount_rate(0.9)
                .walk_restart_prob(0.01)
                .exploration(
                    EpsilonGreedy::default()
                        .eps_start(1.0)
                        .eps_final(0.1)
                        .final_step((max_iters / 2).max(1)),
                )
                .save_interval(10_000)
                .record_interval(1000)
                .eval_interval(10_000),
        }
    }
}

/// Train tic-tac-toe against a random player.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Train the value store.
    #[arg(short, long, default_value_t = false)]
    train: bool,

    /// Evaluate the greedy policy of the value store.
    #[arg(short, long, default_value_t = false)]
    eval: bool,

    /// Value store file, created if missing.
    #[arg(short, long, default_value = STORE_PATH)]
    store: String,

    /// YAML file with `env_config` and optionally `trainer_config`.
    #[arg(short, long)]
    config: Option<String>,

    /// Number of training iterations.
    #[arg(short, long, default_value_t = MAX_ITERS)]
    iters: usize,

    /// Directory of TensorBoard logs.
    #[arg(long)]
    tensorboard: Option<String>,
}

fn config(args: &Args) -> Result<TicTacToeDemoConfig> {
    match &args.config {
        Some(path) => TicTacToeDemoConfig::load(path),
        None => Ok(TicTacToeDemoConfig::default()),
    }
}

fn train(args: &Args) -> Result<()> {
    let config = config(args)?;
    let mut recorder: Box<dyn AggregateRecorder> = match &args.tensorboard {
        Some(dir) => Box::new(TensorboardRecorder::new(dir)),
        None => Box::new(NullRecorder::new()),
    };
    qlearn::train::<TicTacToe>(
        &config.env_config,
        config.trainer_config(args.iters),
        &args.store,
        recorder.as_mut(),
        Some(EVAL_STEPS),
    )?;
    Ok(())
}

fn eval(args: &Args) -> Result<()> {
    let config = config(args)?;
    qlearn::evaluate::<TicTacToe>(&config.env_config, &args.store, EVAL_STEPS, 0)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.train {
        train(&args)?;
    } else if args.eval {
        eval(&args)?;
    } else {
        train(&args)?;
        eval(&args)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{eval, train, Args};
    use anyhow::Result;
    use tempdir::TempDir;

    #[test]
    fn test_train_tictactoe() -> Result<()> {
        let tmp_dir = TempDir::new("train_tictactoe")?;
        let store = tmp_dir.path().join("tictactoe.qtable");
        let args = Args {
            train: true,
            eval: false,
            store: store.to_string_lossy().into_owned(),
            config: None,
            iters: 2000,
            tensorboard: Some(tmp_dir.path().join("tb").to_string_lossy().into_owned()),
        };
        train(&args)?;
        assert!(store.exists());
        eval(&args)?;
        Ok(())
    }
}

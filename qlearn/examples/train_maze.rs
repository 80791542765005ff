use anyhow::Result;
use clap::Parser;
use log::info;
use qlearn::{
    core::{
        record::{AggregateRecorder, NullRecorder},
        DefaultEvaluator, Env as _, EpsilonGreedy, Trainer, TrainerConfig, ValueStore,
    },
    env::{Maze, MazeConfig},
    tensorboard::TensorboardRecorder,
};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, thread, time::Duration};

const STORE_PATH: &str = "maze.qtable";
const MAX_ITERS: usize = 100_000;
const EVAL_STEPS: usize = 500;

#[derive(Serialize, Deserialize)]
struct MazeDemoConfig {
    env_config: MazeConfig,
    trainer_config: TrainerConfig,
}

impl MazeDemoConfig {
    fn new(max_iters: usize) -> Self {
        Self {
            env_config: MazeConfig::default(),
            trainer_config: TrainerConfig::default()
                .max_iters(Some(max_iters))
                .learning_rate(0.7)
                .discount_rate(0.75)
                .walk_restart_prob(0.01)
                .exploration(EpsilonGreedy::constant(0.2))
                .save_interval(5000)
                .record_interval(500)
                .eval_interval(5000),
        }
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let rdr = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(rdr)?)
    }
}

/// Train an agent eating pellets in a maze with ghosts.
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

    /// YAML file with `env_config` and `trainer_config`.
    #[arg(short, long)]
    config: Option<String>,

    /// Number of training iterations.
    #[arg(short, long, default_value_t = MAX_ITERS)]
    iters: usize,

    /// Directory of TensorBoard logs.
    #[arg(long)]
    tensorboard: Option<String>,

    /// Stop training after this many seconds.
    #[arg(long)]
    max_secs: Option<u64>,
}

fn config(args: &Args) -> Result<MazeDemoConfig> {
    match &args.config {
        Some(path) => MazeDemoConfig::load(path),
        None => Ok(MazeDemoConfig::new(args.iters)),
    }
}

fn train(args: &Args) -> Result<()> {
    let config = config(args)?;
    let seed = config.trainer_config.seed as i64;
    let mut recorder: Box<dyn AggregateRecorder> = match &args.tensorboard {
        Some(dir) => Box::new(TensorboardRecorder::new(dir)),
        None => Box::new(NullRecorder::new()),
    };
    let env = Maze::build(&config.env_config, seed)?;
    let store = ValueStore::open(&args.store)?;
    let mut evaluator =
        DefaultEvaluator::<Maze>::new(&config.env_config, seed.wrapping_add(1), EVAL_STEPS)?;
    let mut trainer = Trainer::build(config.trainer_config, env, store)?;

    if let Some(secs) = args.max_secs {
        let stop = trainer.stop_handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            info!("Time limit of {} seconds reached", secs);
            stop.stop();
        });
    }

    let stats = trainer.train(recorder.as_mut(), Some(&mut evaluator))?;
    trainer.store().save()?;
    info!("{:?}", stats);
    Ok(())
}

fn eval(args: &Args) -> Result<()> {
    let config = config(args)?;
    qlearn::evaluate::<Maze>(&config.env_config, &args.store, EVAL_STEPS, 0)?;
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

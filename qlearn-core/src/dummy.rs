//! Minimal environments used in tests.
use crate::{record::Record, Act, Env, StateKey, Step};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Dummy state, identified by an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DummyState(pub usize);

impl StateKey for DummyState {
    fn encode(&self) -> String {
        format!("s{}", self.0)
    }
}

/// Dummy action, identified by an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DummyAct(pub usize);

impl DummyAct {
    /// The first `n` actions.
    pub fn all_n(n: usize) -> Vec<Self> {
        (0..n).map(DummyAct).collect()
    }
}

impl Act for DummyAct {
    fn encode(&self) -> String {
        format!("a{}", self.0)
    }

    fn all() -> Vec<Self> {
        Self::all_n(4)
    }
}

/// Configuration of [`LoopEnv`].
#[derive(Clone, Debug)]
pub struct LoopEnvConfig {
    /// Number of states. Action `a` in state `s` leads to `(s + a) % n_states`.
    pub n_states: usize,

    /// Number of legal actions in every state.
    pub n_acts: usize,

    /// Reward of every step.
    pub reward: f64,

    /// Terminate an episode after this many steps.
    pub episode_len: Option<usize>,

    /// `(k, m)`: after the `k`-th step the environment stays paused for `m` polls.
    pub pause: Option<(usize, usize)>,
}

impl Default for LoopEnvConfig {
    fn default() -> Self {
        Self {
            n_states: 1,
            n_acts: 2,
            reward: 1.0,
            episode_len: None,
            pause: None,
        }
    }
}

/// A deterministic environment cycling over a few states with a constant reward.
pub struct LoopEnv {
    config: LoopEnvConfig,
    state: DummyState,
    rng: StdRng,
    episode_steps: usize,
    paused_polls_left: usize,

    /// Number of steps taken.
    pub steps: usize,

    /// Number of calls to [`Env::wait`].
    pub waits: usize,

    /// Number of calls to [`Env::reset`].
    pub resets: usize,

    /// Number of calls to [`Env::random_state`].
    pub random_states: usize,
}

impl Env for LoopEnv {
    type Config = LoopEnvConfig;
    type State = DummyState;
    type Act = DummyAct;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            state: DummyState(0),
            rng: StdRng::seed_from_u64(seed as u64),
            episode_steps: 0,
            paused_polls_left: 0,
            steps: 0,
            waits: 0,
            resets: 0,
            random_states: 0,
        })
    }

    fn current_state(&self) -> DummyState {
        self.state
    }

    fn random_state(&mut self) -> DummyState {
        self.random_states += 1;
        self.state = DummyState(self.rng.gen_range(0..self.config.n_states));
        self.state
    }

    fn reset(&mut self) -> Result<DummyState> {
        self.resets += 1;
        self.episode_steps = 0;
        self.state = DummyState(0);
        Ok(self.state)
    }

    fn legal_actions(&self, _state: &DummyState) -> Vec<DummyAct> {
        DummyAct::all_n(self.config.n_acts)
    }

    fn step(&mut self, a: &DummyAct) -> Step<Self> {
        assert!(!self.is_paused(), "stepped while paused");
        self.steps += 1;
        self.episode_steps += 1;
        self.state = DummyState((self.state.0 + a.0) % self.config.n_states);

        if let Some((k, m)) = self.config.pause {
            if self.steps == k {
                self.paused_polls_left = m;
            }
        }
        let is_terminated = match self.config.episode_len {
            Some(len) => self.episode_steps >= len,
            None => false,
        };

        Step::new(*a, self.config.reward, self.state, is_terminated)
            .with_record(Record::from_scalar("env_steps", self.steps as f32))
    }

    fn is_paused(&self) -> bool {
        self.paused_polls_left > 0
    }

    fn wait(&mut self) {
        self.waits += 1;
        self.paused_polls_left = self.paused_polls_left.saturating_sub(1);
    }
}

//! Tic-tac-toe against a random opponent.
use anyhow::{Context, Result};
use log::trace;
use qlearn_core::{record::Record, Act, Env, StateKey, Step};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Content of a cell of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cell {
    /// No mark.
    Empty,

    /// Mark of the agent.
    X,

    /// Mark of the opponent.
    O,
}

/// Board with X to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TttState(pub [Cell; 9]);

impl StateKey for TttState {
    fn encode(&self) -> String {
        self.0
            .iter()
            .map(|c| match c {
                Cell::Empty => '.',
                Cell::X => 'x',
                Cell::O => 'o',
            })
            .collect()
    }
}

impl TttState {
    fn empty() -> Self {
        Self([Cell::Empty; 9])
    }

    fn empty_cells(&self) -> Vec<TttAct> {
        (0..9)
            .filter(|&i| self.0[i] == Cell::Empty)
            .map(|i| TttAct(i as u8))
            .collect()
    }

    /// Returns the mark completing a line, if any.
    pub fn winner(&self) -> Option<Cell> {
        LINES.iter().find_map(|l| {
            let c = self.0[l[0]];
            if c != Cell::Empty && c == self.0[l[1]] && c == self.0[l[2]] {
                Some(c)
            } else {
                None
            }
        })
    }

    /// Returns `true` if the game has ended.
    pub fn is_finished(&self) -> bool {
        self.winner().is_some() || self.0.iter().all(|c| *c != Cell::Empty)
    }
}

/// Placing an X on a cell, `0..9` in row-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TttAct(pub u8);

impl Act for TttAct {
    fn encode(&self) -> String {
        self.0.to_string()
    }

    fn all() -> Vec<Self> {
        (0..9).map(TttAct).collect()
    }
}

/// Configuration of [`TicTacToe`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TicTacToeConfig {
    /// Reward when X completes a line.
    pub win_reward: f64,

    /// Reward when O completes a line.
    pub loss_reward: f64,

    /// Reward when the board is full without a winner.
    pub draw_reward: f64,
}

impl Default for TicTacToeConfig {
    fn default() -> Self {
        Self {
            win_reward: 1.0,
            loss_reward: 0.0,
            draw_reward: 0.1,
        }
    }
}

impl TicTacToeConfig {
    /// Constructs [`TicTacToeConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
        let rdr = BufReader::new(file);
        Ok(serde_yaml::from_reader(rdr)?)
    }
}

/// Tic-tac-toe where the agent plays X and a uniformly random player answers with O.
///
/// A step places the agent's X and, unless the game has ended, the opponent's O.
/// The step is terminal when the game ends.
pub struct TicTacToe {
    config: TicTacToeConfig,
    board: TttState,
    rng: fastrand::Rng,
}

impl TicTacToe {
    fn play_random(&mut self, mark: Cell) {
        let cells = self.board.empty_cells();
        if !cells.is_empty() {
            let i = cells[self.rng.usize(..cells.len())].0 as usize;
            self.board.0[i] = mark;
        }
    }

    fn outcome(&self) -> Option<f64> {
        match self.board.winner() {
            Some(Cell::X) => Some(self.config.win_reward),
            Some(_) => Some(self.config.loss_reward),
            None if self.board.is_finished() => Some(self.config.draw_reward),
            None => None,
        }
    }
}

impl Env for TicTacToe {
    type Config = TicTacToeConfig;
    type State = TttState;
    type Act = TttAct;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            board: TttState::empty(),
            rng: fastrand::Rng::with_seed(seed as u64),
        })
    }

    fn current_state(&self) -> TttState {
        self.board
    }

    /// Plays a random, even number of random plies from the empty board.
    ///
    /// Never returns a finished position.
    fn random_state(&mut self) -> TttState {
        loop {
            self.board = TttState::empty();
            let n_plies = 2 * self.rng.usize(..4);
            for ply in 0..n_plies {
                let mark = if ply % 2 == 0 { Cell::X } else { Cell::O };
                self.play_random(mark);
            }
            if !self.board.is_finished() {
                return self.board;
            }
        }
    }

    fn reset(&mut self) -> Result<TttState> {
        self.board = TttState::empty();
        Ok(self.board)
    }

    fn legal_actions(&self, state: &TttState) -> Vec<TttAct> {
        if state.is_finished() {
            vec![]
        } else {
            state.empty_cells()
        }
    }

    fn step(&mut self, a: &TttAct) -> Step<Self> {
        let i = a.0 as usize;
        debug_assert_eq!(self.board.0[i], Cell::Empty, "cell {} is taken", i);
        self.board.0[i] = Cell::X;

        let reward = match self.outcome() {
            Some(r) => Some(r),
            None => {
                self.play_random(Cell::O);
                self.outcome()
            }
        };
        trace!("board {}", self.board.encode());

        let is_terminated = reward.is_some();
        let mut record = Record::empty();
        if is_terminated {
            let result = match self.board.winner() {
                Some(Cell::X) => 1.0,
                Some(_) => -1.0,
                None => 0.0,
            };
            record = Record::from_scalar("game_result", result);
        }

        Step::new(*a, reward.unwrap_or(0.0), self.board, is_terminated).with_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn board(s: &str) -> TttState {
        let mut cells = [Cell::Empty; 9];
        for (i, c) in s.chars().enumerate() {
            cells[i] = match c {
                'x' => Cell::X,
                'o' => Cell::O,
                _ => Cell::Empty,
            };
        }
        TttState(cells)
    }

    fn env_with(s: &str) -> TicTacToe {
        let mut env = TicTacToe::build(&TicTacToeConfig::default(), 0).unwrap();
        env.board = board(s);
        env
    }

    #[test]
    fn test_encode() {
        assert_eq!(board("x...o...x").encode(), "x...o...x");
        assert_eq!(TttAct(7).encode(), "7");
    }

    #[test]
    fn test_win() {
        let mut env = env_with("xx.oo....");
        let step = env.step(&TttAct(2));
        assert!(step.is_terminated);
        assert_eq!(step.reward, 1.0);
        assert_eq!(step.record.get_scalar("game_result").unwrap(), 1.0);
        assert!(env.legal_actions(&step.next_state).is_empty());
    }

    #[test]
    fn test_loss() {
        // Both replies of O complete a line.
        let mut env = env_with("oo.oxx.x.");
        let step = env.step(&TttAct(8));
        assert!(step.is_terminated);
        assert_eq!(step.next_state.winner(), Some(Cell::O));
        assert_eq!(step.reward, 0.0);
        assert_eq!(step.record.get_scalar("game_result").unwrap(), -1.0);
    }

    #[test]
    fn test_draw() {
        let mut env = env_with("xoxxooox.");
        let step = env.step(&TttAct(8));
        assert!(step.is_terminated);
        assert_eq!(step.next_state.winner(), None);
        assert_eq!(step.reward, 0.1);
        assert_eq!(step.record.get_scalar("game_result").unwrap(), 0.0);
    }

    #[test]
    fn test_ongoing_game() {
        let mut env = env_with(".........");
        let step = env.step(&TttAct(4));
        assert!(!step.is_terminated);
        assert_eq!(step.reward, 0.0);
        let s = step.next_state.encode();
        assert_eq!(s.matches('x').count(), 1);
        assert_eq!(s.matches('o').count(), 1);
        assert_eq!(env.legal_actions(&step.next_state).len(), 7);
    }

    #[test]
    fn test_random_state_is_playable() {
        let mut env = TicTacToe::build(&TicTacToeConfig::default(), 7).unwrap();
        for _ in 0..200 {
            let s = env.random_state();
            assert!(!s.is_finished());
            assert!(!env.legal_actions(&s).is_empty());
            let e = s.encode();
            assert_eq!(e.matches('x').count(), e.matches('o').count());
        }
    }
}

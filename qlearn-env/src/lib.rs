//! Environments for tabular Q-learning.
//!
//! Both environments own their reward function and the projection of their
//! simulation onto a [`StateKey`](qlearn_core::StateKey).
pub mod maze;
pub mod tictactoe;
pub use maze::{Dir, Maze, MazeConfig, MazeState, PauseHandle};
pub use tictactoe::{Cell, TicTacToe, TicTacToeConfig, TttAct, TttState};

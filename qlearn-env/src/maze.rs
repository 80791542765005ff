//! Grid maze with pellets and randomly moving ghosts.
//!
//! The maze is given as ASCII rows:
//!
//! * `#` - wall
//! * `.` - open cell with a pellet
//! * ` ` - open cell
//! * `P` - start of the player
//! * `G` - start of a ghost
//!
//! Cells outside of the rows are walls. The simulation advances
//! `ghost_substeps` ticks of the ghosts per decision of the agent.
use anyhow::{bail, Context, Result};
use log::{debug, info};
use qlearn_core::{
    record::{Record, RecordValue},
    Act, Env, StateKey, Step,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs::File,
    io::BufReader,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

type Pos = (usize, usize);

/// Direction of a move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum Dir {
    /// Up.
    Up,

    /// Down.
    Down,

    /// Left.
    Left,

    /// Right.
    Right,
}

impl Dir {
    const ALL: [Dir; 4] = [Dir::Up, Dir::Down, Dir::Left, Dir::Right];

    fn index(self) -> usize {
        self as usize
    }

    fn as_char(self) -> char {
        match self {
            Dir::Up => 'U',
            Dir::Down => 'D',
            Dir::Left => 'L',
            Dir::Right => 'R',
        }
    }

    fn offset(self, (r, c): Pos) -> Option<Pos> {
        match self {
            Dir::Up => r.checked_sub(1).map(|r| (r, c)),
            Dir::Down => Some((r + 1, c)),
            Dir::Left => c.checked_sub(1).map(|c| (r, c)),
            Dir::Right => Some((r, c + 1)),
        }
    }
}

impl Act for Dir {
    fn encode(&self) -> String {
        self.as_char().to_string()
    }

    fn all() -> Vec<Self> {
        Self::ALL.to_vec()
    }
}

/// Projection of the maze seen by the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MazeState {
    /// Position of the player, `(row, column)`.
    pub pos: Pos,

    /// For each [`Dir`], `true` if no ghost is within `safe_distance` cells
    /// along the corridor in that direction.
    pub safe: [bool; 4],

    /// First move on a shortest path to the nearest pellet.
    pub pellet_dir: Option<Dir>,
}

impl MazeState {
    /// Returns `true` if moving in `dir` is safe.
    pub fn is_safe(&self, dir: Dir) -> bool {
        self.safe[dir.index()]
    }
}

impl StateKey for MazeState {
    fn encode(&self) -> String {
        let safe: String = self
            .safe
            .iter()
            .map(|s| if *s { '1' } else { '0' })
            .collect();
        let dir = self.pellet_dir.map(Dir::as_char).unwrap_or('-');
        format!("{},{};{};{}", self.pos.0, self.pos.1, safe, dir)
    }
}

/// Pauses and resumes a [`Maze`] from another thread.
#[derive(Clone, Debug, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    /// Pauses the simulation.
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Resumes the simulation.
    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns `true` if the simulation is paused.
    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration of [`Maze`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MazeConfig {
    /// Rows of the maze.
    pub layout: Vec<String>,

    /// Moves of every ghost per decision of the agent.
    pub ghost_substeps: usize,

    /// Distance within which a ghost makes a direction unsafe.
    pub safe_distance: usize,

    /// Reward for eating a pellet.
    pub pellet_reward: f64,

    /// Reward for moving towards the nearest pellet.
    pub toward_pellet_reward: f64,

    /// Reward for moving in an unsafe direction.
    pub unsafe_move_reward: f64,

    /// Reward for being caught by a ghost.
    pub caught_reward: f64,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            layout: [
                "###########",
                "#P....#...#",
                "#.##..#.#.#",
                "#.........#",
                "#.#.###.#.#",
                "#...#G....#",
                "###########",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ghost_substeps: 2,
            safe_distance: 3,
            pellet_reward: 5.0,
            toward_pellet_reward: 10.0,
            unsafe_move_reward: -20.0,
            caught_reward: -50.0,
        }
    }
}

impl MazeConfig {
    /// Constructs [`MazeConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {:?}", path))?;
        let rdr = BufReader::new(file);
        Ok(serde_yaml::from_reader(rdr)?)
    }

    /// Sets the rows of the maze.
    pub fn layout(mut self, rows: &[&str]) -> Self {
        self.layout = rows.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Sets the moves of every ghost per decision.
    pub fn ghost_substeps(mut self, v: usize) -> Self {
        self.ghost_substeps = v;
        self
    }

    /// Sets the distance within which a ghost makes a direction unsafe.
    pub fn safe_distance(mut self, v: usize) -> Self {
        self.safe_distance = v;
        self
    }
}

/// Static part of the maze.
struct Grid {
    walls: Vec<Vec<bool>>,
    open: Vec<Pos>,
    pellets: Vec<Pos>,
    player: Pos,
    ghosts: Vec<Pos>,
}

impl Grid {
    fn parse(rows: &[String]) -> Result<Self> {
        let width = match rows.first() {
            Some(row) => row.chars().count(),
            None => bail!("Empty maze layout"),
        };
        let mut walls = vec![];
        let mut open = vec![];
        let mut pellets = vec![];
        let mut player = None;
        let mut ghosts = vec![];

        for (r, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                bail!(
                    "Row {} of the maze has {} cells, expected {}",
                    r,
                    row.chars().count(),
                    width
                );
            }
            let mut line = vec![];
            for (c, ch) in row.chars().enumerate() {
                line.push(ch == '#');
                match ch {
                    '#' => continue,
                    '.' => pellets.push((r, c)),
                    ' ' => {}
                    'P' if player.is_none() => player = Some((r, c)),
                    'P' => bail!("More than one player in the maze"),
                    'G' => ghosts.push((r, c)),
                    _ => bail!("Unknown cell {:?} at ({}, {})", ch, r, c),
                }
                open.push((r, c));
            }
            walls.push(line);
        }

        let player = match player {
            Some(p) => p,
            None => bail!("No player in the maze"),
        };
        if pellets.is_empty() {
            bail!("No pellet in the maze");
        }
        let grid = Self {
            walls,
            open,
            pellets,
            player,
            ghosts,
        };
        for p in grid.open.iter() {
            if grid.open_dirs(*p).is_empty() {
                bail!("Open cell {:?} has no open neighbor", p);
            }
        }
        Ok(grid)
    }

    fn is_open(&self, (r, c): Pos) -> bool {
        match self.walls.get(r).and_then(|row| row.get(c)) {
            Some(wall) => !wall,
            None => false,
        }
    }

    fn neighbor(&self, p: Pos, dir: Dir) -> Option<Pos> {
        dir.offset(p).filter(|q| self.is_open(*q))
    }

    fn open_dirs(&self, p: Pos) -> Vec<Dir> {
        Dir::ALL
            .iter()
            .copied()
            .filter(|d| self.neighbor(p, *d).is_some())
            .collect()
    }
}

/// A maze where the agent eats pellets and avoids ghosts.
///
/// The simulation never terminates: a caught player respawns at a random cell
/// and the pellets are restored once all of them are eaten.
pub struct Maze {
    config: MazeConfig,
    grid: Grid,
    pellets: Vec<Vec<bool>>,
    n_pellets: usize,
    player: Pos,
    ghosts: Vec<Pos>,
    rng: fastrand::Rng,
    pause: PauseHandle,
}

impl Maze {
    /// Returns a handle to pause the simulation.
    pub fn pause_handle(&self) -> PauseHandle {
        self.pause.clone()
    }

    /// Positions of the ghosts.
    pub fn ghosts(&self) -> &[Pos] {
        &self.ghosts
    }

    /// Number of pellets left.
    pub fn n_pellets(&self) -> usize {
        self.n_pellets
    }

    fn restore_pellets(&mut self) {
        self.n_pellets = 0;
        for row in self.pellets.iter_mut() {
            row.iter_mut().for_each(|p| *p = false);
        }
        // A pellet under the player is eaten only when the player moves onto it again.
        for &(r, c) in self.grid.pellets.iter() {
            self.pellets[r][c] = true;
        }
        self.n_pellets = self.grid.pellets.len();
    }

    fn is_safe(&self, dir: Dir) -> bool {
        let mut p = self.player;
        for _ in 0..self.config.safe_distance {
            p = match self.grid.neighbor(p, dir) {
                Some(q) => q,
                None => return true,
            };
            if self.ghosts.contains(&p) {
                return false;
            }
        }
        true
    }

    fn nearest_pellet_dir(&self) -> Option<Dir> {
        let mut visited = vec![vec![false; self.pellets[0].len()]; self.pellets.len()];
        let mut queue = VecDeque::new();
        visited[self.player.0][self.player.1] = true;
        for dir in Dir::ALL.iter() {
            if let Some(q) = self.grid.neighbor(self.player, *dir) {
                visited[q.0][q.1] = true;
                queue.push_back((q, *dir));
            }
        }
        while let Some(((r, c), first)) = queue.pop_front() {
            if self.pellets[r][c] {
                return Some(first);
            }
            for dir in Dir::ALL.iter() {
                if let Some(q) = self.grid.neighbor((r, c), *dir) {
                    if !visited[q.0][q.1] {
                        visited[q.0][q.1] = true;
                        queue.push_back((q, first));
                    }
                }
            }
        }
        None
    }

    fn move_ghosts(&mut self) {
        for i in 0..self.ghosts.len() {
            let dirs = self.grid.open_dirs(self.ghosts[i]);
            let dir = dirs[self.rng.usize(..dirs.len())];
            if let Some(q) = self.grid.neighbor(self.ghosts[i], dir) {
                self.ghosts[i] = q;
            }
        }
    }

    fn is_caught(&self) -> bool {
        self.ghosts.contains(&self.player)
    }

    fn respawn(&mut self) {
        let free: Vec<Pos> = self
            .grid
            .open
            .iter()
            .copied()
            .filter(|p| !self.ghosts.contains(p))
            .collect();
        let cells = if free.is_empty() {
            &self.grid.open
        } else {
            &free
        };
        self.player = cells[self.rng.usize(..cells.len())];
    }
}

impl Env for Maze {
    type Config = MazeConfig;
    type State = MazeState;
    type Act = Dir;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let grid = Grid::parse(&config.layout)?;
        let pellets = grid
            .walls
            .iter()
            .map(|row| vec![false; row.len()])
            .collect();
        let mut maze = Self {
            config: config.clone(),
            player: grid.player,
            ghosts: grid.ghosts.clone(),
            grid,
            pellets,
            n_pellets: 0,
            rng: fastrand::Rng::with_seed(seed as u64),
            pause: PauseHandle::default(),
        };
        maze.restore_pellets();
        info!(
            "Maze with {} open cells, {} pellets and {} ghosts",
            maze.grid.open.len(),
            maze.n_pellets,
            maze.ghosts.len()
        );
        Ok(maze)
    }

    fn current_state(&self) -> MazeState {
        let mut safe = [true; 4];
        for dir in Dir::ALL.iter() {
            safe[dir.index()] = self.is_safe(*dir);
        }
        MazeState {
            pos: self.player,
            safe,
            pellet_dir: self.nearest_pellet_dir(),
        }
    }

    /// Moves the player to a random open cell without a ghost.
    fn random_state(&mut self) -> MazeState {
        self.respawn();
        self.current_state()
    }

    fn reset(&mut self) -> Result<MazeState> {
        self.player = self.grid.player;
        self.ghosts = self.grid.ghosts.clone();
        self.restore_pellets();
        Ok(self.current_state())
    }

    fn legal_actions(&self, state: &MazeState) -> Vec<Dir> {
        self.grid.open_dirs(state.pos)
    }

    fn step(&mut self, a: &Dir) -> Step<Self> {
        let state = self.current_state();
        let mut reward = 0.0;
        if state.pellet_dir == Some(*a) {
            reward += self.config.toward_pellet_reward;
        }
        if !state.is_safe(*a) {
            reward += self.config.unsafe_move_reward;
        }

        match self.grid.neighbor(self.player, *a) {
            Some(p) => self.player = p,
            None => debug!("Move {:?} from {:?} is blocked", a, self.player),
        }

        let (r, c) = self.player;
        let mut eaten = 0.0;
        let mut restored = 0.0;
        if self.pellets[r][c] {
            self.pellets[r][c] = false;
            self.n_pellets -= 1;
            reward += self.config.pellet_reward;
            eaten = 1.0;
            if self.n_pellets == 0 {
                debug!("All pellets eaten, restoring");
                self.restore_pellets();
                restored = 1.0;
            }
        }

        let mut caught = self.is_caught();
        for _ in 0..self.config.ghost_substeps {
            if caught {
                break;
            }
            self.move_ghosts();
            caught = self.is_caught();
        }
        if caught {
            reward += self.config.caught_reward;
            self.respawn();
        }

        let record = Record::from_slice(&[
            ("pellets_eaten", RecordValue::Scalar(eaten)),
            ("pellets_restored", RecordValue::Scalar(restored)),
            ("caught", RecordValue::Scalar(caught as u8 as f32)),
        ]);
        Step::new(*a, reward, self.current_state(), false).with_record(record)
    }

    fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }
}

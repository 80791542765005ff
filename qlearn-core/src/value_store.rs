//! Durable mapping from state-action pairs to value estimates.
//!
//! A [`ValueStore`] is loaded once when it is opened, then read and written
//! in memory by the training loop. Nothing is persisted until [`ValueStore::save`]
//! is called; the trainer calls it at a fixed cadence, and the caller is
//! expected to call it once more after training ends.
//!
//! ```no_run
//! # use qlearn_core::{ValueStore, Act, StateKey};
//! # fn run() -> Result<(), qlearn_core::error::QlError> {
//! let mut store = ValueStore::open("training.qtable")?;
//! // ... training ...
//! store.save()?;
//! # Ok(())
//! # }
//! ```
mod snapshot;
use crate::{error::QlError, Act, StateKey};
use log::info;
use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};
use snapshot::Snapshot;
use std::{
    collections::HashMap,
    fs::File,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Separates the state and action encodings in the keys of a [`ValueStore`].
pub const KEY_SEPARATOR: char = '|';

/// Policy for choosing among actions sharing the maximum estimate.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum TieBreak {
    /// The first maximizer in the order of the candidates.
    First,

    /// A maximizer chosen uniformly at random.
    Random,
}

impl Default for TieBreak {
    fn default() -> Self {
        Self::Random
    }
}

/// Composite key of a state-action pair.
pub fn key<S: StateKey, A: Act>(state: &S, act: &A) -> String {
    let act = act.encode();
    debug_assert!(
        !act.contains(KEY_SEPARATOR),
        "action encoding {:?} contains the key separator",
        act
    );
    format!("{}{}{}", state.encode(), KEY_SEPARATOR, act)
}

/// Persistent table of action values.
///
/// Absent pairs have the value `0.0`; reads never fail.
#[derive(Debug)]
pub struct ValueStore {
    path: PathBuf,
    table: HashMap<String, f64>,
}

impl ValueStore {
    /// Opens the store backed by the file at `path`.
    ///
    /// If the file does not exist, the store starts empty and an empty snapshot
    /// is written immediately, so that an interrupted first run still leaves a
    /// resumable file behind.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QlError> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            table: HashMap::new(),
        };
        store.load(path)?;
        Ok(store)
    }

    /// Replaces the in-memory table with the snapshot at `path`, which also
    /// becomes the target of subsequent saves.
    ///
    /// A missing file is not an error: the current table is written there instead.
    /// A file that exists but can not be decoded is reported as
    /// [`QlError::CorruptStore`] and leaves the table untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), QlError> {
        let path = path.as_ref().to_path_buf();
        match File::open(&path) {
            Ok(file) => {
                let table = Snapshot::read(file, &path)?;
                info!("Loaded value store {:?}, size = {}", &path, table.len());
                self.table = table;
                self.path = path;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.path = path;
                self.save()
            }
            Err(source) => Err(QlError::StoreIo { path, source }),
        }
    }

    /// Writes the full table to the backing file, replacing its content.
    pub fn save(&self) -> Result<(), QlError> {
        Snapshot::write(&self.table, &self.path)?;
        info!("Saved value store {:?}, size = {}", &self.path, self.table.len());
        Ok(())
    }

    /// Returns the estimate of a state-action pair, `0.0` if absent.
    pub fn get<S: StateKey, A: Act>(&self, state: &S, act: &A) -> f64 {
        self.table.get(&key(state, act)).copied().unwrap_or(0.0)
    }

    /// Sets the estimate of a state-action pair.
    pub fn put<S: StateKey, A: Act>(&mut self, state: &S, act: &A, value: f64) {
        self.table.insert(key(state, act), value);
    }

    /// Returns the first action in `actions` achieving the maximum estimate.
    pub fn best_action<S: StateKey, A: Act>(&self, state: &S, actions: &[A]) -> Result<A, QlError> {
        let mut best: Option<(A, f64)> = None;
        for act in actions {
            let v = self.get(state, act);
            match best {
                Some((_, bv)) if v <= bv => {}
                _ => best = Some((*act, v)),
            }
        }
        best.map(|(a, _)| a).ok_or_else(|| empty(state))
    }

    /// Returns an action achieving the maximum estimate, resolving ties
    /// with the given policy.
    pub fn best_action_with<S: StateKey, A: Act>(
        &self,
        state: &S,
        actions: &[A],
        tie_break: TieBreak,
        rng: &mut dyn RngCore,
    ) -> Result<A, QlError> {
        match tie_break {
            TieBreak::First => self.best_action(state, actions),
            TieBreak::Random => {
                let max = self.max_value(state, actions)?;
                let maximizers = actions
                    .iter()
                    .filter(|a| self.get(state, *a) == max)
                    .copied()
                    .collect::<Vec<_>>();
                match maximizers.choose(rng) {
                    Some(a) => Ok(*a),
                    // Only reachable with NaN estimates
                    None => self.best_action(state, actions),
                }
            }
        }
    }

    /// Returns the maximum estimate over `actions`.
    pub fn max_value<S: StateKey, A: Act>(&self, state: &S, actions: &[A]) -> Result<f64, QlError> {
        let act = self.best_action(state, actions)?;
        Ok(self.get(state, &act))
    }

    /// The number of stored pairs.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if no pair has been stored.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Iterates over composite keys and their estimates, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.table.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

fn empty<S: StateKey>(state: &S) -> QlError {
    QlError::EmptyActionSet {
        state: state.encode(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{DummyAct, DummyState};
    use rand::{rngs::StdRng, SeedableRng};
    use tempdir::TempDir;

    const S: DummyState = DummyState(0);
    const A: DummyAct = DummyAct(0);
    const B: DummyAct = DummyAct(1);

    fn store_in(dir: &TempDir) -> ValueStore {
        ValueStore::open(dir.path().join("store.qtable")).unwrap()
    }

    #[test]
    fn test_missing_pair_is_zero() {
        let dir = TempDir::new("value_store").unwrap();
        let store = store_in(&dir);
        for act in DummyAct::all_n(4) {
            assert_eq!(store.get(&S, &act), 0.0);
        }
        assert_eq!(store.get(&DummyState(42), &A), 0.0);
    }

    #[test]
    fn test_open_missing_file_creates_empty_snapshot() {
        let dir = TempDir::new("value_store").unwrap();
        let path = dir.path().join("fresh.qtable");
        assert!(!path.exists());

        let store = ValueStore::open(&path).unwrap();
        assert!(store.is_empty());
        assert!(path.exists());

        let reopened = ValueStore::open(&path).unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new("value_store").unwrap();
        let mut store = store_in(&dir);
        store.put(&S, &A, -3.25);
        assert_eq!(store.get(&S, &A), -3.25);
        assert_eq!(store.get(&S, &B), 0.0);
        store.put(&S, &A, 7.0);
        assert_eq!(store.get(&S, &A), 7.0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.iter().collect::<Vec<_>>(), vec![("s0|a0", 7.0)]);
    }

    #[test]
    fn test_save_load_preserves_bits() {
        let dir = TempDir::new("value_store").unwrap();
        let path = dir.path().join("bits.qtable");
        let values = [0.1 + 0.2, -1e-300, std::f64::consts::PI, 1.0 / 3.0, f64::MAX];
        {
            let mut store = ValueStore::open(&path).unwrap();
            for (i, v) in values.iter().enumerate() {
                store.put(&DummyState(i), &A, *v);
            }
            store.save().unwrap();
        }
        let store = ValueStore::open(&path).unwrap();
        assert_eq!(store.len(), values.len());
        for (i, v) in values.iter().enumerate() {
            assert_eq!(store.get(&DummyState(i), &A).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn test_best_action_unique_maximum() {
        let dir = TempDir::new("value_store").unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.get(&S, &A), 0.0);
        assert_eq!(store.get(&S, &B), 0.0);
        store.put(&S, &A, 5.0);
        assert_eq!(store.best_action(&S, &[A, B]).unwrap(), A);
        assert_eq!(store.best_action(&S, &[B, A]).unwrap(), A);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let a = store
                .best_action_with(&S, &[B, A], TieBreak::Random, &mut rng)
                .unwrap();
            assert_eq!(a, A);
        }
    }

    #[test]
    fn test_best_action_negative_values() {
        let dir = TempDir::new("value_store").unwrap();
        let mut store = store_in(&dir);
        store.put(&S, &A, -2.0);
        store.put(&S, &B, -1.0);
        assert_eq!(store.best_action(&S, &[A, B]).unwrap(), B);
        assert_eq!(store.max_value(&S, &[A, B]).unwrap(), -1.0);
    }

    #[test]
    fn test_tie_break() {
        let dir = TempDir::new("value_store").unwrap();
        let store = store_in(&dir);
        let acts = DummyAct::all_n(3);
        assert_eq!(store.best_action(&S, &acts).unwrap(), acts[0]);

        let mut rng = StdRng::seed_from_u64(0);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let a = store
                .best_action_with(&S, &acts, TieBreak::Random, &mut rng)
                .unwrap();
            counts[a.0] += 1;
        }
        for c in counts.iter() {
            assert!(*c > 800, "{:?}", counts);
        }
    }

    #[test]
    fn test_empty_action_set() {
        let dir = TempDir::new("value_store").unwrap();
        let store = store_in(&dir);
        let acts: Vec<DummyAct> = vec![];
        match store.best_action(&S, &acts) {
            Err(QlError::EmptyActionSet { .. }) => {}
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn test_corrupt_file_is_not_empty_store() {
        let dir = TempDir::new("value_store").unwrap();
        let path = dir.path().join("corrupt.qtable");
        std::fs::write(&path, b"definitely not a snapshot").unwrap();
        match ValueStore::open(&path) {
            Err(QlError::CorruptStore { .. }) | Err(QlError::UnsupportedStoreVersion { .. }) => {}
            r => panic!("unexpected {:?}", r),
        }
        // The damaged file is left as it was.
        assert_eq!(std::fs::read(&path).unwrap(), b"definitely not a snapshot");
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let dir = TempDir::new("value_store").unwrap();
        match ValueStore::open(dir.path()) {
            Err(QlError::StoreIo { .. }) => {}
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn test_load_switches_path() {
        let dir = TempDir::new("value_store").unwrap();
        let mut store = store_in(&dir);
        store.put(&S, &A, 1.5);
        store.save().unwrap();

        let other = dir.path().join("other.qtable");
        store.load(&other).unwrap();
        assert_eq!(store.path(), other.as_path());
        // The in-memory table is written to the new, missing file.
        assert_eq!(ValueStore::open(&other).unwrap().get(&S, &A), 1.5);
    }
}

//! Utilities for interaction with environments.
use crate::Env;
use log::debug;
use std::{thread, time::Duration};

/// The shortest sleep of [`poll_paused`].
pub const MIN_POLL: Duration = Duration::from_millis(1);

/// Polls the environment once.
///
/// If it is paused, lets it advance with [`Env::wait`], sleeps for `poll`
/// (at least [`MIN_POLL`]) and
/// returns `true`. Returns `false` immediately otherwise.
pub fn poll_paused<E: Env>(env: &mut E, poll: Duration) -> bool {
    if !env.is_paused() {
        return false;
    }
    debug!("Environment is paused, waiting {:?}", poll);
    env.wait();
    thread::sleep(poll.max(MIN_POLL));
    true
}

/// Blocks while the environment is paused and returns the number of polls.
pub fn wait_while_paused<E: Env>(env: &mut E, poll: Duration) -> usize {
    let mut polls = 0;
    while poll_paused(env, poll) {
        polls += 1;
    }
    polls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAct, LoopEnv, LoopEnvConfig},
        Env,
    };
    use std::time::Instant;
    use test_log::test;

    #[test]
    fn test_zero_poll_still_sleeps() {
        let config = LoopEnvConfig {
            pause: Some((1, 3)),
            ..Default::default()
        };
        let mut env = LoopEnv::build(&config, 0).unwrap();
        assert!(!poll_paused(&mut env, Duration::from_millis(0)));

        env.step(&DummyAct(0));
        let start = Instant::now();
        let polls = wait_while_paused(&mut env, Duration::from_millis(0));
        assert_eq!(polls, 3);
        assert_eq!(env.waits, 3);
        assert!(start.elapsed() >= MIN_POLL * 3);
    }
}

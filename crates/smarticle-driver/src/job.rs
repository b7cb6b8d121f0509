//! 后台任务状态机
//!
//! Shared by the sync coordinator and stream jobs. A job is created `Idle`,
//! toggles between `Running` and `Paused`, and ends in `Terminated`, which
//! is absorbing. Every transition wakes all waiters, so a paused job blocks
//! without polling and a stop cancels a wait that is already in progress.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Paused,
    Terminated,
}

/// Result of [`JobControl::wait_while_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The full timeout passed with the job running throughout.
    Elapsed,
    /// The job left `Running` (or was restarted) before the timeout.
    Interrupted,
}

#[derive(Debug)]
struct Inner {
    state: JobState,
    generation: u64,
}

#[derive(Debug)]
pub struct JobControl {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new()
    }
}

impl JobControl {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: JobState::Idle,
                generation: 0,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> JobState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == JobState::Terminated
    }

    /// `Idle`/`Paused` → `Running`. Returns `false` once terminated.
    pub fn resume(&self) -> bool {
        self.transition(JobState::Running)
    }

    /// `Idle`/`Running` → `Paused`. Returns `false` once terminated.
    pub fn pause(&self) -> bool {
        self.transition(JobState::Paused)
    }

    pub fn terminate(&self) {
        self.transition(JobState::Terminated);
    }

    fn transition(&self, next: JobState) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == JobState::Terminated {
            return false;
        }
        if inner.state != next {
            inner.state = next;
            inner.generation = inner.generation.wrapping_add(1);
            self.changed.notify_all();
        }
        true
    }

    /// Block while the job is idle or paused.
    ///
    /// Returns `true` when the job is running, `false` once terminated.
    pub fn wait_runnable(&self) -> bool {
        let mut inner = self.inner.lock();
        loop {
            match inner.state {
                JobState::Running => return true,
                JobState::Terminated => return false,
                JobState::Idle | JobState::Paused => self.changed.wait(&mut inner),
            }
        }
    }

    /// Wait up to `timeout`, returning early on any state transition.
    ///
    /// A pause followed by a resume inside the window still counts as an
    /// interruption.
    pub fn wait_while_running(&self, timeout: Duration) -> WaitOutcome {
        match self.run_after(timeout, || ()) {
            Some(()) => WaitOutcome::Elapsed,
            None => WaitOutcome::Interrupted,
        }
    }

    /// Like [`wait_while_running`](Self::wait_while_running), then run `f`
    /// if the wait elapsed.
    ///
    /// `f` runs with the state lock held, so a concurrent `pause()` returns
    /// only after `f` finished and `f` never runs after a `pause()` returned.
    /// `f` must not touch this `JobControl`.
    pub fn run_after<R>(&self, timeout: Duration, f: impl FnOnce() -> R) -> Option<R> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        let generation = inner.generation;
        while inner.state == JobState::Running && inner.generation == generation {
            if self.changed.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        if inner.state == JobState::Running && inner.generation == generation {
            Some(f())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_transitions() {
        let control = JobControl::new();
        assert_eq!(control.state(), JobState::Idle);
        assert!(control.resume());
        assert!(control.is_running());
        assert!(control.pause());
        assert_eq!(control.state(), JobState::Paused);
        control.terminate();
        assert!(!control.resume());
        assert!(control.is_terminated());
    }

    #[test]
    fn test_wait_runnable_wakes_on_resume() {
        let control = Arc::new(JobControl::new());
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.wait_runnable())
        };
        thread::sleep(Duration::from_millis(20));
        control.resume();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_runnable_returns_false_on_terminate() {
        let control = Arc::new(JobControl::new());
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.wait_runnable())
        };
        thread::sleep(Duration::from_millis(20));
        control.terminate();
        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn test_wait_elapses_while_running() {
        let control = JobControl::new();
        control.resume();
        let start = Instant::now();
        assert_eq!(
            control.wait_while_running(Duration::from_millis(30)),
            WaitOutcome::Elapsed
        );
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_pause_interrupts_wait() {
        let control = Arc::new(JobControl::new());
        control.resume();
        let waiter = {
            let control = control.clone();
            thread::spawn(move || {
                let start = Instant::now();
                (control.wait_while_running(Duration::from_secs(5)), start.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        control.pause();
        let (outcome, waited) = waiter.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Interrupted);
        assert!(waited < Duration::from_secs(1));
    }

    #[test]
    fn test_pause_resume_counts_as_interruption() {
        let control = Arc::new(JobControl::new());
        control.resume();
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.wait_while_running(Duration::from_millis(300)))
        };
        thread::sleep(Duration::from_millis(20));
        control.pause();
        control.resume();
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Interrupted);
    }

    #[test]
    fn test_run_after_skips_on_pause() {
        let control = Arc::new(JobControl::new());
        control.resume();
        let waiter = {
            let control = control.clone();
            thread::spawn(move || control.run_after(Duration::from_millis(200), || 7))
        };
        thread::sleep(Duration::from_millis(20));
        control.pause();
        assert_eq!(waiter.join().unwrap(), None);

        control.resume();
        assert_eq!(control.run_after(Duration::from_millis(5), || 7), Some(7));
    }
}

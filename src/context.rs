use crate::params::VecPolicy;
use crate::tiling::Tiling;
use crate::{Result, Seq};
use parking_lot::{Condvar, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// The bottom-right tile finished.
    Done,
    /// A worker panicked; the grid will never finish.
    Aborted,
}

/// One-shot broadcast event raised by the terminal tile.
#[derive(Debug)]
pub struct Completion {
    state: Mutex<RunState>,
    event: Condvar,
}

impl Default for Completion {
    fn default() -> Self {
        Self {
            state: Mutex::new(RunState::Running),
            event: Condvar::new(),
        }
    }
}

impl Completion {
    /// Marks the run as finished and wakes all waiters. May only be called once.
    pub fn signal(&self) {
        let mut state = self.state.lock();
        assert_eq!(*state, RunState::Running, "Completion signalled twice");
        *state = RunState::Done;
        drop(state);
        self.event.notify_all();
    }

    /// Marks a running run as aborted and wakes all waiters.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            *state = RunState::Aborted;
        }
        drop(state);
        self.event.notify_all();
    }

    /// Blocks until the run is done or aborted.
    pub fn wait(&self) -> RunState {
        let mut state = self.state.lock();
        while *state == RunState::Running {
            self.event.wait(&mut state);
        }
        *state
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub fn is_done(&self) -> bool {
        self.state() == RunState::Done
    }
}

/// State shared by every worker for the duration of one run.
/// Read-only apart from the batch lock and the completion event.
#[derive(Debug)]
pub struct RunContext<'a> {
    /// The sequence along tile columns.
    pub a: Seq<'a>,
    /// The sequence along tile rows.
    pub b: Seq<'a>,
    pub tiling: Tiling,
    pub policy: VecPolicy,
    /// Serializes batch formation across workers.
    batch_lock: Mutex<()>,
    pub completion: Completion,
}

impl<'a> RunContext<'a> {
    pub fn new(a: Seq<'a>, b: Seq<'a>, tile_size: usize, policy: VecPolicy) -> Result<Self> {
        Ok(Self {
            a,
            b,
            tiling: Tiling::new(a.len(), b.len(), tile_size)?,
            policy,
            batch_lock: Mutex::new(()),
            completion: Completion::default(),
        })
    }

    /// The number of tiles in a full SIMD batch.
    pub fn simd_width(&self) -> usize {
        self.policy.width()
    }

    pub(crate) fn lock_batch(&self) -> MutexGuard<'_, ()> {
        self.batch_lock.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn signal_wakes_all_waiters() {
        let c = Arc::new(Completion::default());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let c = c.clone();
                thread::spawn(move || c.wait())
            })
            .collect();
        assert_eq!(c.state(), RunState::Running);
        c.signal();
        for w in waiters {
            assert_eq!(w.join().unwrap(), RunState::Done);
        }
        assert!(c.is_done());
    }

    #[test]
    #[should_panic(expected = "signalled twice")]
    fn double_signal_panics() {
        let c = Completion::default();
        c.signal();
        c.signal();
    }

    #[test]
    fn abort_does_not_override_done() {
        let c = Completion::default();
        c.signal();
        c.abort();
        assert_eq!(c.wait(), RunState::Done);

        let c = Completion::default();
        c.abort();
        assert_eq!(c.wait(), RunState::Aborted);
    }

    #[test]
    fn context_tiling() {
        let ctx = RunContext::new(b"ACGTACGTAC", b"ACG", 4, VecPolicy::Simd { width: 4 }).unwrap();
        assert_eq!((ctx.tiling.cols(), ctx.tiling.rows()), (3, 1));
        assert_eq!(ctx.simd_width(), 4);
        assert!(RunContext::new(b"", b"ACG", 4, VecPolicy::Scalar).is_err());
    }
}

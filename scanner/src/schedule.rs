use std::cell::Cell;
use std::mem::take;
use std::rc::Rc;
use std::time::Duration;

/// Cancels a scheduled task. A cancelled task is dropped without running.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Rc<Cell<bool>>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Wake {
    At(Duration),
    Tick(u64),
}

struct Pending<T> {
    wake: Wake,
    token: CancellationToken,
    task: T,
}

/// Frame-driven scheduler for resumptions on a single logical thread.
///
/// Nothing ever blocks: the host advances the scheduler once per frame and
/// gets back the tasks that became due, in the order they were scheduled.
pub struct Scheduler<T> {
    now: Duration,
    tick: u64,
    pending: Vec<Pending<T>>,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            tick: 0,
            pending: Vec::new(),
        }
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Number of tasks still waiting, cancelled ones excluded.
    pub fn num_pending(&self) -> usize {
        self.pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }

    pub fn schedule_after(&mut self, delay: Duration, task: T) -> CancellationToken {
        self.push(Wake::At(self.now.saturating_add(delay)), task)
    }

    /// Resumes `task` once `ticks` more frames have started.
    pub fn schedule_ticks(&mut self, ticks: u32, task: T) -> CancellationToken {
        self.push(Wake::Tick(self.tick + ticks.max(1) as u64), task)
    }

    fn push(&mut self, wake: Wake, task: T) -> CancellationToken {
        let token = CancellationToken::default();
        self.pending.push(Pending {
            wake,
            token: token.clone(),
            task,
        });
        token
    }

    /// Starts a new frame `delta` after the previous one and returns the
    /// tasks that are due.
    pub fn advance(&mut self, delta: Duration) -> Vec<T> {
        self.now = self.now.saturating_add(delta);
        self.tick += 1;

        let (now, tick) = (self.now, self.tick);
        let mut due = Vec::new();
        for pending in take(&mut self.pending) {
            if pending.token.is_cancelled() {
                continue;
            }
            let ready = match pending.wake {
                Wake::At(deadline) => deadline <= now,
                Wake::Tick(at) => at <= tick,
            };
            if ready {
                due.push(pending.task);
            } else {
                self.pending.push(pending);
            }
        }
        due
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

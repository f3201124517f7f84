use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use slabmap::SlabMap;

use crate::Subscription;


pub type Task = Box<dyn FnOnce() + Send>;

/// Source of time and delayed execution for the time-based operators.
///
/// Dropping the [`Subscription`] returned by `schedule_at` cancels the task
/// if it has not run yet.
pub trait Scheduler: Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn schedule_at(&self, at: Instant, task: Task) -> Subscription;

    fn schedule_after(&self, delay: Duration, task: Task) -> Subscription {
        self.schedule_at(self.now() + delay, task)
    }
}

pub type DynScheduler = Arc<dyn Scheduler>;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    instant: Instant,
    seq: u64,
}

#[derive(Clone, Copy)]
struct TaskId {
    id: usize,
    seq: u64,
}

struct TaskQueue {
    tasks: BTreeMap<Key, usize>,
    entries: SlabMap<(Key, Task)>,
    next_seq: u64,
}
impl TaskQueue {
    fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            entries: SlabMap::new(),
            next_seq: 0,
        }
    }
    fn insert(&mut self, instant: Instant, task: Task) -> (TaskId, bool) {
        let key = Key {
            instant,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        let is_first = match self.tasks.first_key_value() {
            Some((first, _)) => key < *first,
            None => true,
        };
        let id = self.entries.insert((key, task));
        self.tasks.insert(key, id);
        (TaskId { id, seq: key.seq }, is_first)
    }

    /// Removes a task that has not run yet. Slab keys are reused, so the
    /// sequence number guards against removing a newer task.
    fn remove(&mut self, task: TaskId) {
        let is_same = matches!(self.entries.get(task.id), Some((key, _)) if key.seq == task.seq);
        if is_same {
            if let Some((key, _)) = self.entries.remove(task.id) {
                self.tasks.remove(&key);
            }
        }
    }
    fn first_instant(&self) -> Option<Instant> {
        self.tasks.first_key_value().map(|(key, _)| key.instant)
    }
    fn pop_due(&mut self, now: Instant) -> Option<(Instant, Task)> {
        let entry = self.tasks.first_entry()?;
        if entry.key().instant > now {
            return None;
        }
        let id = entry.remove();
        let (key, task) = self.entries.remove(id)?;
        Some((key.instant, task))
    }
    fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// A scheduler with a virtual clock that only moves when told to.
///
/// Tasks run on the thread calling [`advance_by`](Self::advance_by) or
/// [`advance_to`](Self::advance_to), in due-time order.
#[derive(Clone)]
pub struct TestScheduler(Arc<Mutex<TestClock>>);

struct TestClock {
    now: Instant,
    queue: TaskQueue,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(TestClock {
            now: Instant::now(),
            queue: TaskQueue::new(),
        })))
    }
    pub fn advance_by(&self, duration: Duration) {
        let to = self.now() + duration;
        self.advance_to(to);
    }
    pub fn advance_to(&self, to: Instant) {
        loop {
            let due = {
                let mut clock = self.0.lock();
                let due = clock.queue.pop_due(to);
                if let Some((at, _)) = &due {
                    clock.now = clock.now.max(*at);
                }
                due
            };
            match due {
                Some((_, task)) => task(),
                None => break,
            }
        }
        let mut clock = self.0.lock();
        clock.now = clock.now.max(to);
    }
    pub fn pending_tasks(&self) -> usize {
        self.0.lock().queue.len()
    }
}
impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}
impl Scheduler for TestScheduler {
    fn now(&self) -> Instant {
        self.0.lock().now
    }
    fn schedule_at(&self, at: Instant, task: Task) -> Subscription {
        let (id, _) = self.0.lock().queue.insert(at, task);
        Subscription::from_weak_fn(Arc::downgrade(&self.0), move |clock| {
            clock.lock().queue.remove(id)
        })
    }
}

static TIMER_REGISTRY: LazyLock<Arc<TimerRegistry>> = LazyLock::new(|| {
    Arc::new(TimerRegistry {
        queue: Mutex::new(TimerQueue {
            queue: TaskQueue::new(),
            thread_running: false,
        }),
        condvar: Condvar::new(),
    })
});

struct TimerRegistry {
    queue: Mutex<TimerQueue>,
    condvar: Condvar,
}
struct TimerQueue {
    queue: TaskQueue,
    thread_running: bool,
}

impl TimerRegistry {
    fn run_worker(&self) {
        let mut queue = self.queue.lock();
        loop {
            let now = Instant::now();
            if let Some((_, task)) = queue.queue.pop_due(now) {
                drop(queue);
                task();
                queue = self.queue.lock();
                continue;
            }
            match queue.queue.first_instant() {
                Some(instant) => {
                    let wait = instant.saturating_duration_since(now);
                    self.condvar.wait_for(&mut queue, wait);
                }
                None => self.condvar.wait(&mut queue),
            }
        }
    }
}

/// A scheduler running tasks on a shared background thread at wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }
    fn schedule_at(&self, at: Instant, task: Task) -> Subscription {
        let registry = &*TIMER_REGISTRY;
        let mut q = registry.queue.lock();
        if !q.thread_running {
            q.thread_running = true;
            std::thread::spawn(|| TIMER_REGISTRY.run_worker());
        }
        let (id, is_first) = q.queue.insert(at, task);
        drop(q);
        if is_first {
            registry.condvar.notify_one();
        }
        Subscription::from_weak_fn(Arc::downgrade(registry), move |registry| {
            registry.queue.lock().queue.remove(id)
        })
    }
}

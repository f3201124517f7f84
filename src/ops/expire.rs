use std::{
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use derive_ex::Ex;
use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{
        filter::{subscribe_core, Entry, FilterCore},
        push_changes,
    },
    source_list::WeakSourceList,
    ChangeSet, DynScheduler, ListItem, Observable, SourceList, Subscription,
};


type Due = Option<Instant>;

/// A single pending task of a scheduler, replaced whenever it is armed for
/// a different time.
pub(crate) struct DueTimer {
    scheduler: DynScheduler,
    slot: Mutex<Option<(Instant, Subscription)>>,
}

impl DueTimer {
    pub fn new(scheduler: DynScheduler) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            slot: Mutex::new(None),
        })
    }
    pub fn now(&self) -> Instant {
        self.scheduler.now()
    }

    /// Runs `on_due` at `due`, cancelling the pending task unless it is
    /// already due at that time.
    pub fn arm(&self, due: Option<Instant>, on_due: impl FnOnce() + Send + 'static) {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|(at, _)| *at) == due {
            return;
        }
        let old = slot.take();
        if let Some(due) = due {
            *slot = Some((due, self.scheduler.schedule_at(due, Box::new(on_due))));
        }
        drop(slot);
        drop(old);
    }

    /// Runs `on_due` as soon as possible unless a task is already pending.
    pub fn arm_if_idle(&self, on_due: impl FnOnce() + Send + 'static) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            let now = self.scheduler.now();
            *slot = Some((now, self.scheduler.schedule_at(now, Box::new(on_due))));
        }
    }

    /// Forgets the pending task, cancelling it if it has not run.
    pub fn clear(&self) {
        let old = self.slot.lock().take();
        drop(old);
    }
}

fn next_due<T>(core: &FilterCore<T, Due>) -> Due {
    core.all.iter().filter_map(|e| e.meta).min()
}

/// Removes `entries` from `list`, returning the items actually removed.
///
/// Each entry is an index and the item expected there. An item no longer
/// at its index is looked up by value.
pub(crate) fn evict<T: ListItem>(list: &SourceList<T>, entries: &[(usize, T)]) -> Vec<T> {
    if entries.is_empty() {
        return Vec::new();
    }
    let removed = list.edit(|l| {
        let mut removed = Vec::new();
        for (index, item) in entries.iter().rev() {
            let at = if l.get(*index).as_ref() == Some(item) {
                Some(*index)
            } else {
                l.position_of(item)
            };
            if let Some(at) = at {
                removed.push(l.remove_at(at));
            }
        }
        removed.reverse();
        removed
    });
    removed.unwrap_or_default()
}

#[derive(Ex)]
#[derive_ex(Clone(bound()))]
struct StreamExpiry<T: ListItem> {
    core: Weak<Mutex<FilterCore<T, Due>>>,
    timer: Weak<DueTimer>,
    out: Arc<Downstream<ChangeSet<T>>>,
}

impl<T: ListItem> StreamExpiry<T> {
    fn arm(&self, core: &FilterCore<T, Due>) {
        if let Some(timer) = self.timer.upgrade() {
            let this = self.clone();
            timer.arm(next_due(core), move || this.expire());
        }
    }
    fn expire(&self) {
        let (Some(core), Some(timer)) = (self.core.upgrade(), self.timer.upgrade()) else {
            return;
        };
        timer.clear();
        {
            let mut core = core.lock();
            let now = timer.now();
            let mut expired = 0;
            for index in 0..core.all.len() {
                if core.all[index].meta.is_some_and(|due| due <= now) {
                    core.all[index].meta = None;
                    core.set_match(index, false);
                    expired += 1;
                }
            }
            tracing::debug!(expired, "expire_after timer");
            let changes = core.result.capture_changes();
            push_changes(&self.out, Ok(changes), "expire_after");
            self.arm(&core);
        }
        self.out.drain();
    }
}

#[derive(Ex)]
#[derive_ex(Clone(bound()))]
struct ListExpiry<T: ListItem> {
    list: WeakSourceList<T>,
    core: Weak<Mutex<FilterCore<T, Due>>>,
    timer: Weak<DueTimer>,
    out: Arc<Downstream<Vec<T>>>,
}

impl<T: ListItem> ListExpiry<T> {
    fn arm(&self, core: &FilterCore<T, Due>) {
        if let Some(timer) = self.timer.upgrade() {
            let this = self.clone();
            timer.arm(next_due(core), move || this.expire());
        }
    }
    fn expire(&self) {
        let (Some(core), Some(timer)) = (self.core.upgrade(), self.timer.upgrade()) else {
            return;
        };
        timer.clear();
        let expired: Vec<(usize, T)> = {
            let mut core = core.lock();
            let now = timer.now();
            let mut expired = Vec::new();
            for (index, e) in core.all.iter_mut().enumerate() {
                if e.meta.is_some_and(|due| due <= now) {
                    e.meta = None;
                    expired.push((index, e.item.clone()));
                }
            }
            self.arm(&core);
            expired
        };
        tracing::debug!(expired = expired.len(), "expire_after timer");
        let Some(list) = self.list.upgrade() else {
            return;
        };
        let removed = evict(&list, &expired);
        if !removed.is_empty() {
            self.out.next(removed);
        }
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Hides each item once the time returned by `selector` for it has passed.
    ///
    /// Items for which `selector` returns `None` never expire. Replacing or
    /// refreshing an item restarts its expiry.
    pub fn expire_after(
        &self,
        selector: impl Fn(&T) -> Option<Duration> + Send + Sync + 'static,
        scheduler: DynScheduler,
    ) -> Observable<ChangeSet<T>> {
        let source = self.clone();
        let selector = Arc::new(selector);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let core = Arc::new(Mutex::new(FilterCore::<T, Due>::new()));
            let timer = DueTimer::new(scheduler.clone());
            let expiry = StreamExpiry {
                core: Arc::downgrade(&core),
                timer: Arc::downgrade(&timer),
                out: downstream.clone(),
            };
            let selector = selector.clone();
            let clock = scheduler.clone();
            let subscription = subscribe_core(
                &source,
                core,
                &downstream,
                "expire_after",
                move |x: &T, _: Option<&Entry<T, Due>>| {
                    let now = clock.now();
                    let due = selector(x).map(|d| now + d);
                    match due {
                        Some(due) if due <= now => (false, None),
                        due => (true, due),
                    }
                },
                move |core: &mut FilterCore<T, Due>| expiry.arm(core),
            );
            subscription.with(Subscription::from_fn(move || timer.clear()))
        })
    }
}

impl<T: ListItem> SourceList<T> {
    /// Removes each item from this list once the time returned by
    /// `selector` for it has passed, sending the items removed by each expiry.
    ///
    /// Expiry stops when the returned subscription is dropped.
    pub fn expire_after(
        &self,
        selector: impl Fn(&T) -> Option<Duration> + Send + Sync + 'static,
        scheduler: DynScheduler,
    ) -> Observable<Vec<T>> {
        let list = self.downgrade();
        let selector = Arc::new(selector);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let Some(source) = list.upgrade() else {
                downstream.completed();
                return Subscription::empty();
            };
            let core = Arc::new(Mutex::new(FilterCore::<T, Due>::new()));
            let timer = DueTimer::new(scheduler.clone());
            let expiry = ListExpiry {
                list: list.clone(),
                core: Arc::downgrade(&core),
                timer: Arc::downgrade(&timer),
                out: downstream.clone(),
            };
            let selector = selector.clone();
            let clock = scheduler.clone();
            let error_out = downstream.clone();
            let completed_out = downstream.clone();
            let subscription = source.connect().subscribe_all(
                move |changes: &ChangeSet<T>| {
                    let r = {
                        let mut core = core.lock();
                        let now = clock.now();
                        let r = core.apply(changes, &mut |x: &T, _: Option<&Entry<T, Due>>| {
                            (false, selector(x).map(|d| now + d))
                        });
                        if r.is_ok() {
                            expiry.arm(&core);
                        }
                        r
                    };
                    if let Err(e) = r {
                        tracing::error!(operator = "expire_after", "{e}");
                        error_out.error(e);
                    }
                },
                {
                    let out = downstream.clone();
                    move |e| out.error(e.clone())
                },
                move || completed_out.completed(),
            );
            subscription.with(Subscription::from_fn(move || timer.clear()))
        })
    }
}

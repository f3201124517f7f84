use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use derive_ex::Ex;
use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{
        expire::{evict, DueTimer},
        filter::{subscribe_core, Entry, FilterCore},
        FilterPolicy,
    },
    source_list::WeakSourceList,
    ChangeSet, DynScheduler, ListItem, Observable, SourceList, Subscription,
};

#[cfg(test)]
mod tests;

/// Insertion order of an item.
type Stamp = u64;

/// The stamp of the oldest item to keep, or `None` when nothing is kept.
fn oldest_kept<T>(core: &FilterCore<T, Stamp>, limit: usize) -> Option<Stamp> {
    let mut stamps: Vec<Stamp> = core.all.iter().map(|e| e.meta).collect();
    let skip = stamps.len().saturating_sub(limit);
    stamps.sort_unstable();
    stamps.get(skip).copied()
}

/// Gives added items the next stamp. Updated items keep theirs.
fn stamper<T>() -> impl Fn(Option<&Entry<T, Stamp>>) -> Stamp + Send + Sync {
    let next = AtomicU64::new(0);
    move |prev| match prev {
        Some(e) => e.meta,
        None => next.fetch_add(1, Ordering::Relaxed),
    }
}

#[derive(Ex)]
#[derive_ex(Clone(bound()))]
struct ListLimit<T: ListItem> {
    list: WeakSourceList<T>,
    core: Weak<Mutex<FilterCore<T, Stamp>>>,
    timer: Weak<DueTimer>,
    out: Arc<Downstream<Vec<T>>>,
    limit: usize,
}

impl<T: ListItem> ListLimit<T> {
    fn evict(&self) {
        let (Some(core), Some(timer)) = (self.core.upgrade(), self.timer.upgrade()) else {
            return;
        };
        timer.clear();
        let surplus: Vec<(usize, T)> = {
            let core = core.lock();
            let Some(oldest) = oldest_kept(&core, self.limit) else {
                return;
            };
            core.all
                .iter()
                .enumerate()
                .filter(|(_, e)| e.meta < oldest)
                .map(|(index, e)| (index, e.item.clone()))
                .collect()
        };
        tracing::debug!(surplus = surplus.len(), "limit_size_to eviction");
        let Some(list) = self.list.upgrade() else {
            return;
        };
        let removed = evict(&list, &surplus);
        if !removed.is_empty() {
            self.out.next(removed);
        }
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Keeps the `limit` most recently added items.
    ///
    /// Replacing or refreshing an item keeps its place in the insertion
    /// order. When a newer item is removed, the most recent hidden one
    /// takes its place.
    pub fn limit_size_to(&self, limit: usize) -> Observable<ChangeSet<T>> {
        let source = self.clone();
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let core = Arc::new(Mutex::new(FilterCore::<T, Stamp>::new()));
            let stamp = stamper();
            subscribe_core(
                &source,
                core,
                &downstream,
                "limit_size_to",
                move |_: &T, prev: Option<&Entry<T, Stamp>>| {
                    (prev.is_some_and(|e| e.is_match), stamp(prev))
                },
                move |core: &mut FilterCore<T, Stamp>| {
                    let oldest = oldest_kept(core, limit);
                    core.requery(FilterPolicy::CalculateDiff, |_, stamp| {
                        oldest.is_some_and(|oldest| *stamp >= oldest)
                    });
                },
            )
        })
    }
}

impl<T: ListItem> SourceList<T> {
    /// Removes the oldest items from this list whenever it holds more than
    /// `limit`, sending the items removed by each eviction.
    ///
    /// Evictions run on `scheduler` and stop when the returned subscription
    /// is dropped.
    pub fn limit_size_to(&self, limit: usize, scheduler: DynScheduler) -> Observable<Vec<T>> {
        let list = self.downgrade();
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let Some(source) = list.upgrade() else {
                downstream.completed();
                return Subscription::empty();
            };
            let core = Arc::new(Mutex::new(FilterCore::<T, Stamp>::new()));
            let timer = DueTimer::new(scheduler.clone());
            let eviction = ListLimit {
                list: list.clone(),
                core: Arc::downgrade(&core),
                timer: Arc::downgrade(&timer),
                out: downstream.clone(),
                limit,
            };
            let stamp = stamper();
            let error_out = downstream.clone();
            let completed_out = downstream.clone();
            let subscription = source.connect().subscribe_all(
                move |changes: &ChangeSet<T>| {
                    let r = {
                        let mut core = core.lock();
                        let r = core.apply(
                            changes,
                            &mut |_: &T, prev: Option<&Entry<T, Stamp>>| (false, stamp(prev)),
                        );
                        if r.is_ok() && core.all.len() > limit {
                            if let Some(timer) = eviction.timer.upgrade() {
                                let eviction = eviction.clone();
                                timer.arm_if_idle(move || eviction.evict());
                            }
                        }
                        r
                    };
                    if let Err(e) = r {
                        tracing::error!(operator = "limit_size_to", "{e}");
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

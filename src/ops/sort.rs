use std::{cmp::Ordering, sync::Arc};

use derive_ex::Ex;
use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{push_changes, push_error},
    Change, ChangeSet, Error, ListItem, Observable, Result, Subscription, TrackedList,
};

#[cfg(test)]
mod tests;

pub type Comparer<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct SortOptions {
    /// Locate insertion points with a binary search.
    ///
    /// Only valid when the sort key of an item never changes after the item
    /// was added; debug builds check the order around every insertion.
    pub use_binary_search: bool,

    /// Largest number of changes reported one by one.
    ///
    /// A re-sort needing more moves than this, or an upstream change set
    /// with more changes than this, is reported as a `Clear` followed by an
    /// `AddRange` of the whole sorted list. An upstream change set is measured
    /// by its [`total_changes`](crate::ChangeSet::total_changes), not by the
    /// positional changes it causes in the sorted list.
    pub reset_threshold: usize,
}
impl SortOptions {
    pub const fn new() -> Self {
        Self {
            use_binary_search: false,
            reset_threshold: 100,
        }
    }
}

struct SortState<T> {
    all: Vec<T>,
    result: TrackedList<T>,
    comparer: Option<Comparer<T>>,
    options: SortOptions,
}

impl<T: ListItem> SortState<T> {
    fn new(comparer: Option<Comparer<T>>, options: SortOptions) -> Self {
        Self {
            all: Vec::new(),
            result: TrackedList::new(),
            comparer,
            options,
        }
    }

    fn apply(&mut self, changes: &ChangeSet<T>) -> Result<()> {
        changes.apply_to(&mut self.all)?;
        let Some(comparer) = self.comparer.clone() else {
            return Ok(());
        };
        if changes.total_changes() > self.options.reset_threshold {
            self.reset(&*comparer);
            return Ok(());
        }
        for change in changes {
            self.apply_change(change, &*comparer)?;
        }
        Ok(())
    }

    fn apply_change(&mut self, change: &Change<T>, cmp: &dyn Fn(&T, &T) -> Ordering) -> Result<()> {
        match change {
            Change::Add { item, .. } => self.insert(item.clone(), cmp),
            Change::AddRange { items, .. } => {
                if self.result.is_empty() {
                    let mut items = items.clone();
                    items.sort_by(|a, b| cmp(a, b));
                    self.result.add_range(items);
                } else {
                    for item in items {
                        self.insert(item.clone(), cmp);
                    }
                }
            }
            Change::Replace {
                current, previous, ..
            } => {
                let index = self.locate(previous, cmp, self.options.use_binary_search)?;
                self.result.set(index, current.clone());
                self.relocate(index, cmp, false);
            }
            Change::Refresh { item, .. } => {
                let index = self.locate(item, cmp, false)?;
                self.relocate(index, cmp, true);
            }
            Change::Remove { item, .. } => {
                let index = self.locate(item, cmp, self.options.use_binary_search)?;
                self.result.remove_at(index);
            }
            Change::RemoveRange { items, .. } => {
                for item in items {
                    let index = self.locate(item, cmp, self.options.use_binary_search)?;
                    self.result.remove_at(index);
                }
            }
            Change::Moved { .. } => {}
            Change::Clear { .. } => self.result.clear(),
        }
        Ok(())
    }

    fn insert(&mut self, item: T, cmp: &dyn Fn(&T, &T) -> Ordering) {
        let index = self.insertion_point(&item, None, cmp);
        self.result.insert(index, item);
        debug_assert!(
            self.is_ordered_around(index, cmp),
            "sort key changed after the item was added"
        );
    }

    /// Moves the item at `index` to its sorted position.
    fn relocate(&mut self, index: usize, cmp: &dyn Fn(&T, &T) -> Ordering, is_refresh: bool) {
        let to = self.insertion_point(&self.result[index], Some(index), cmp);
        if to != index {
            self.result.move_item(index, to);
        } else if is_refresh {
            self.result.refresh_at(index);
        }
    }

    /// Index after the last item not greater than `item`, ignoring the item
    /// at `skip`.
    fn insertion_point(&self, item: &T, skip: Option<usize>, cmp: &dyn Fn(&T, &T) -> Ordering) -> usize {
        let items = self.result.as_slice();
        let before = |x: &T| cmp(x, item) != Ordering::Greater;
        match (skip, self.options.use_binary_search) {
            (None, true) => items.partition_point(before),
            (None, false) => items.iter().position(|x| !before(x)).unwrap_or(items.len()),
            (Some(skip), true) => {
                let (left, right) = (&items[..skip], &items[skip + 1..]);
                if left.last().is_some_and(|x| !before(x)) {
                    left.partition_point(before)
                } else {
                    skip + right.partition_point(before)
                }
            }
            (Some(skip), false) => items
                .iter()
                .enumerate()
                .filter(|&(i, x)| i != skip && before(x))
                .count(),
        }
    }

    fn locate(&self, item: &T, cmp: &dyn Fn(&T, &T) -> Ordering, use_binary_search: bool) -> Result<usize> {
        let items = self.result.as_slice();
        let found = if use_binary_search {
            let start = items.partition_point(|x| cmp(x, item) == Ordering::Less);
            items[start..]
                .iter()
                .take_while(|x| cmp(x, item) == Ordering::Equal)
                .position(|x| x == item)
                .map(|i| start + i)
        } else {
            items.iter().position(|x| x == item)
        };
        found.ok_or(Error::ItemNotFound { operation: "sort" })
    }

    fn is_ordered_around(&self, index: usize, cmp: &dyn Fn(&T, &T) -> Ordering) -> bool {
        let items = self.result.as_slice();
        let item = &items[index];
        let after_prev = index == 0 || cmp(&items[index - 1], item) != Ordering::Greater;
        let before_next = items
            .get(index + 1)
            .map_or(true, |next| cmp(item, next) != Ordering::Greater);
        after_prev && before_next
    }

    /// Replaces the result with every item sorted from scratch.
    fn reset(&mut self, cmp: &dyn Fn(&T, &T) -> Ordering) {
        let mut sorted = self.all.clone();
        sorted.sort_by(|a, b| cmp(a, b));
        if sorted.as_slice() == self.result.as_slice() {
            return;
        }
        tracing::debug!(items = sorted.len(), "sort reset");
        if self.result.is_empty() {
            self.result.add_range(sorted);
        } else {
            self.result.reset(sorted);
        }
    }

    /// Re-sorts the current result, as moves or as a reset.
    fn resort(&mut self) {
        let Some(comparer) = self.comparer.clone() else {
            return;
        };
        let mut order = self.result.as_slice().to_vec();
        let mut sorted = order.clone();
        sorted.sort_by(|a, b| comparer(a, b));
        let mut moves = Vec::new();
        for (to, item) in sorted.iter().enumerate() {
            if &order[to] == item {
                continue;
            }
            let from = order[to + 1..]
                .iter()
                .position(|x| x == item)
                .map(|i| to + 1 + i);
            debug_assert!(from.is_some(), "sorted items differ from the result");
            if let Some(from) = from {
                let item = order.remove(from);
                order.insert(to, item);
                moves.push((from, to));
            }
        }
        if moves.len() > self.options.reset_threshold {
            tracing::debug!(moves = moves.len(), "sort resort exceeds the reset threshold");
            self.reset(&*comparer);
            return;
        }
        for (from, to) in moves {
            self.result.move_item(from, to);
        }
    }

    fn set_comparer(&mut self, comparer: Comparer<T>) {
        let is_first = self.comparer.is_none();
        self.comparer = Some(comparer.clone());
        if is_first {
            self.reset(&*comparer);
        } else {
            self.resort();
        }
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Sorts the items with `comparer`, reporting positions in the sorted list.
    ///
    /// Items that compare equal keep the order in which they were inserted.
    /// Upstream moves have no effect.
    pub fn sort(
        &self,
        comparer: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> Observable<ChangeSet<T>> {
        self.sort_with(comparer, SortOptions::new())
    }

    pub fn sort_with(
        &self,
        comparer: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
        options: SortOptions,
    ) -> Observable<ChangeSet<T>> {
        sort_core(self, Some(Arc::new(comparer)), None, None, options)
    }

    /// Sorts with the latest comparer sent by `comparers`.
    ///
    /// Nothing is emitted before the first comparer arrives. A new comparer,
    /// or a value from `resort`, re-sorts every item; use `resort` when sort
    /// keys change without the items being refreshed.
    pub fn sort_dynamic(
        &self,
        comparers: &Observable<Comparer<T>>,
        resort: Option<&Observable<()>>,
        options: SortOptions,
    ) -> Observable<ChangeSet<T>> {
        sort_core(self, None, Some(comparers.clone()), resort.cloned(), options)
    }
}

fn sort_core<T: ListItem>(
    source: &Observable<ChangeSet<T>>,
    comparer: Option<Comparer<T>>,
    comparers: Option<Observable<Comparer<T>>>,
    resort: Option<Observable<()>>,
    options: SortOptions,
) -> Observable<ChangeSet<T>> {
    let source = source.clone();
    Observable::new(move |observer| {
        let downstream = Downstream::new(observer);
        let state = Arc::new(Mutex::new(SortState::new(comparer.clone(), options)));
        let mut subscriptions = Vec::new();

        if let Some(comparers) = &comparers {
            subscriptions.push(subscribe_control(
                comparers,
                &state,
                &downstream,
                |s, comparer: &Comparer<T>| s.set_comparer(comparer.clone()),
            ));
        }
        if let Some(resort) = &resort {
            subscriptions.push(subscribe_control(resort, &state, &downstream, |s, _: &()| {
                tracing::debug!(items = s.result.len(), "sort resort");
                s.resort()
            }));
        }

        let out = downstream.clone();
        subscriptions.push(source.subscribe_raw(
            move |changes: &ChangeSet<T>| {
                {
                    let mut s = state.lock();
                    let r = s.apply(changes).map(|_| s.result.capture_changes());
                    push_changes(&out, r, "sort");
                }
                out.drain();
            },
            downstream.as_observer(),
        ));
        Subscription::merge(subscriptions)
    })
}

fn subscribe_control<T: ListItem, V: 'static>(
    control: &Observable<V>,
    state: &Arc<Mutex<SortState<T>>>,
    downstream: &Arc<Downstream<ChangeSet<T>>>,
    f: impl Fn(&mut SortState<T>, &V) + Send + Sync + 'static,
) -> Subscription {
    let s = state.clone();
    let out = downstream.clone();
    let error_out = downstream.clone();
    control.subscribe_all(
        move |value| {
            {
                let mut s = s.lock();
                f(&mut *s, value);
                let changes = s.result.capture_changes();
                push_changes(&out, Ok(changes), "sort");
            }
            out.drain();
        },
        move |e| {
            push_error(&error_out, e.clone(), "sort");
            error_out.drain();
        },
        || {},
    )
}

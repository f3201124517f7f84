use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{check_index, locate, push_changes, push_error},
    Change, ChangeSet, ListItem, ListTarget, Observable, Result, Subscription, TrackedList,
};


pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// How a filter with a changing predicate reports a requery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterPolicy {
    /// Emit single adds and removes for the items whose match state changed.
    #[default]
    CalculateDiff,
    /// Emit a `Clear` followed by an `AddRange` of every matching item.
    ClearAndReplace,
}

pub(crate) struct Entry<T, M = ()> {
    pub item: T,
    pub is_match: bool,
    pub meta: M,
}

/// Mirror of an upstream list with a match flag per item, and the list of
/// matching items in upstream order.
///
/// `eval` computes the match flag and the per-item data for an added or
/// updated item; for `Replace` and `Refresh` it also receives the entry the
/// item had before.
pub(crate) struct FilterCore<T, M = ()> {
    pub all: Vec<Entry<T, M>>,
    pub result: TrackedList<T>,
}

pub(crate) type Eval<'a, T, M> =
    &'a mut dyn FnMut(&T, Option<&Entry<T, M>>) -> (bool, M);

impl<T: ListItem, M> FilterCore<T, M> {
    pub fn new() -> Self {
        Self {
            all: Vec::new(),
            result: TrackedList::new(),
        }
    }

    /// Position in the result of the first matching item at or after `index`.
    pub fn filtered_index(&self, index: usize) -> usize {
        self.all[..index].iter().filter(|e| e.is_match).count()
    }

    pub fn apply(&mut self, changes: &ChangeSet<T>, eval: Eval<T, M>) -> Result<()> {
        for change in changes {
            self.apply_change(change, &mut *eval)?;
        }
        Ok(())
    }

    fn position(&self, index: Option<usize>, item: &T, operation: &'static str) -> Result<usize> {
        match index {
            Some(index) => {
                check_index(index, self.all.len())?;
                Ok(index)
            }
            None => locate(self.all.iter().map(|e| &e.item), item, operation),
        }
    }

    fn apply_change(&mut self, change: &Change<T>, eval: Eval<T, M>) -> Result<()> {
        match change {
            Change::Add { item, index } => {
                let index = index.unwrap_or(self.all.len());
                check_index(index, self.all.len() + 1)?;
                let (is_match, meta) = eval(item, None);
                if is_match {
                    let at = self.filtered_index(index);
                    self.result.insert(at, item.clone());
                }
                self.all.insert(
                    index,
                    Entry {
                        item: item.clone(),
                        is_match,
                        meta,
                    },
                );
            }
            Change::AddRange { items, index } => {
                let index = index.unwrap_or(self.all.len());
                check_index(index, self.all.len() + 1)?;
                let at = self.filtered_index(index);
                let mut matched = Vec::new();
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    let (is_match, meta) = eval(item, None);
                    if is_match {
                        matched.push(item.clone());
                    }
                    entries.push(Entry {
                        item: item.clone(),
                        is_match,
                        meta,
                    });
                }
                self.all.splice(index..index, entries);
                self.result.insert_range(at, matched);
            }
            Change::Replace {
                current,
                previous,
                index,
            } => {
                let index = self.position(*index, previous, "filter replace")?;
                let (is_match, meta) = eval(current, Some(&self.all[index]));
                self.update(index, current.clone(), is_match, meta, false);
            }
            Change::Refresh { item, index } => {
                check_index(*index, self.all.len())?;
                let (is_match, meta) = eval(item, Some(&self.all[*index]));
                self.update(*index, item.clone(), is_match, meta, true);
            }
            Change::Remove { item, index } => {
                let index = self.position(*index, item, "filter remove")?;
                let at = self.filtered_index(index);
                if self.all.remove(index).is_match {
                    self.result.remove_at(at);
                }
            }
            Change::RemoveRange { items, index } => match *index {
                Some(index) => {
                    check_index(index + items.len(), self.all.len() + 1)?;
                    let at = self.filtered_index(index);
                    let count = self
                        .all
                        .drain(index..index + items.len())
                        .filter(|e| e.is_match)
                        .count();
                    self.result.remove_range(at, count);
                }
                None => {
                    for item in items {
                        let index = self.position(None, item, "filter remove_range")?;
                        let at = self.filtered_index(index);
                        if self.all.remove(index).is_match {
                            self.result.remove_at(at);
                        }
                    }
                }
            },
            Change::Moved {
                current_index,
                previous_index,
                ..
            } => {
                check_index(*previous_index, self.all.len())?;
                check_index(*current_index, self.all.len())?;
                let from = self.filtered_index(*previous_index);
                let entry = self.all.remove(*previous_index);
                let is_match = entry.is_match;
                self.all.insert(*current_index, entry);
                if is_match {
                    let to = self.filtered_index(*current_index);
                    self.result.move_item(from, to);
                }
            }
            Change::Clear { .. } => {
                self.all.clear();
                self.result.clear();
            }
        }
        Ok(())
    }

    fn update(&mut self, index: usize, item: T, is_match: bool, meta: M, is_refresh: bool) {
        let at = self.filtered_index(index);
        let entry = &mut self.all[index];
        match (entry.is_match, is_match) {
            (true, true) if is_refresh => ListTarget::refresh_at(&mut self.result, at, item.clone()),
            (true, true) => {
                self.result.set(at, item.clone());
            }
            (false, true) => self.result.insert(at, item.clone()),
            (true, false) => {
                self.result.remove_at(at);
            }
            (false, false) => {}
        }
        *entry = Entry {
            item,
            is_match,
            meta,
        };
    }

    /// Changes the match flag of the item at `index`, updating the result.
    pub fn set_match(&mut self, index: usize, is_match: bool) {
        if self.all[index].is_match == is_match {
            return;
        }
        let at = self.filtered_index(index);
        self.all[index].is_match = is_match;
        if is_match {
            let item = self.all[index].item.clone();
            self.result.insert(at, item);
        } else {
            self.result.remove_at(at);
        }
    }

    /// Re-evaluates every item with `is_match`.
    pub fn requery(&mut self, policy: FilterPolicy, mut is_match: impl FnMut(&T, &M) -> bool) {
        match policy {
            FilterPolicy::ClearAndReplace => {
                for e in &mut self.all {
                    e.is_match = is_match(&e.item, &e.meta);
                }
                let items: Vec<T> = self
                    .all
                    .iter()
                    .filter(|e| e.is_match)
                    .map(|e| e.item.clone())
                    .collect();
                if items.as_slice() != self.result.as_slice() {
                    self.result.reset(items);
                }
            }
            FilterPolicy::CalculateDiff => {
                let mut at = 0;
                for e in &mut self.all {
                    let now = is_match(&e.item, &e.meta);
                    match (e.is_match, now) {
                        (true, true) => at += 1,
                        (false, true) => {
                            self.result.insert(at, e.item.clone());
                            at += 1;
                        }
                        (true, false) => {
                            self.result.remove_at(at);
                        }
                        (false, false) => {}
                    }
                    e.is_match = now;
                }
            }
        }
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Keeps the items matching `predicate`, with indexes in the filtered list.
    ///
    /// The predicate is evaluated again when an item is replaced or refreshed.
    pub fn filter(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Observable<ChangeSet<T>> {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Mutex::new(FilterCore::<T>::new());
            let predicate = predicate.clone();
            let out = downstream.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    {
                        let mut s = state.lock();
                        let r = s.apply(changes, &mut |x: &T, _: Option<&Entry<T>>| {
                            (predicate(x), ())
                        });
                        let r = r.map(|_| s.result.capture_changes());
                        push_changes(&out, r, "filter");
                    }
                    out.drain();
                },
                downstream.as_observer(),
            )
        })
    }

    /// Keeps the items matching the latest predicate sent by `predicates`.
    ///
    /// No item matches until the first predicate arrives. Each new predicate
    /// requeries every item, reported as described by `policy`.
    pub fn filter_dynamic(
        &self,
        predicates: &Observable<Predicate<T>>,
        policy: FilterPolicy,
    ) -> Observable<ChangeSet<T>> {
        let source = self.clone();
        let predicates = predicates.clone();
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Arc::new(Mutex::new(DynamicFilter {
                core: FilterCore::<T>::new(),
                predicate: None,
            }));

            let out = downstream.clone();
            let s = state.clone();
            let predicate_subscription = predicates.subscribe_all(
                move |predicate: &Predicate<T>| {
                    {
                        let mut s = s.lock();
                        s.predicate = Some(predicate.clone());
                        tracing::debug!(?policy, items = s.core.all.len(), "filter requery");
                        s.core.requery(policy, |x: &T, _: &()| predicate(x));
                        let changes = s.core.result.capture_changes();
                        push_changes(&out, Ok(changes), "filter_dynamic");
                    }
                    out.drain();
                },
                {
                    let out = downstream.clone();
                    move |e| {
                        push_error(&out, e.clone(), "filter_dynamic");
                        out.drain();
                    }
                },
                || {},
            );

            let out = downstream.clone();
            let source_subscription = source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    {
                        let mut s = state.lock();
                        let s = &mut *s;
                        let predicate = s.predicate.clone();
                        let r = s.core.apply(changes, &mut |x: &T, _: Option<&Entry<T>>| {
                            (predicate.as_ref().is_some_and(|p| p(x)), ())
                        });
                        let r = r.map(|_| s.core.result.capture_changes());
                        push_changes(&out, r, "filter_dynamic");
                    }
                    out.drain();
                },
                downstream.as_observer(),
            );
            Subscription::merge([predicate_subscription, source_subscription])
        })
    }
}

struct DynamicFilter<T: ListItem> {
    core: FilterCore<T>,
    predicate: Option<Predicate<T>>,
}

/// Subscribes `source`, keeping the per-item state of a [`FilterCore`]
/// in `state` and sending the captured result changes to `downstream`.
pub(crate) fn subscribe_core<T: ListItem, M: Send + 'static>(
    source: &Observable<ChangeSet<T>>,
    state: Arc<Mutex<FilterCore<T, M>>>,
    downstream: &Arc<Downstream<ChangeSet<T>>>,
    operator: &'static str,
    eval: impl Fn(&T, Option<&Entry<T, M>>) -> (bool, M) + Send + Sync + 'static,
    after: impl Fn(&mut FilterCore<T, M>) + Send + Sync + 'static,
) -> Subscription {
    let out = downstream.clone();
    source.subscribe_raw(
        move |changes: &ChangeSet<T>| {
            {
                let mut s = state.lock();
                let r = s.apply(changes, &mut |x: &T, e: Option<&Entry<T, M>>| eval(x, e));
                let r = r.map(|_| {
                    after(&mut *s);
                    s.result.capture_changes()
                });
                push_changes(&out, r, operator);
            }
            out.drain();
        },
        downstream.as_observer(),
    )
}

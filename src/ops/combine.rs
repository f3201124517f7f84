use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;
use parse_display::Display;

use crate::{
    observable::Downstream,
    ops::{check_index, push_changes, push_error},
    Change, ChangeSet, Error, ListItem, Observable, ObservableList, Result, SourceList,
    Subscription, TrackedList,
};

#[cfg(test)]
mod tests;

/// How the memberships of several lists are combined.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(style = "snake_case")]
pub enum CombineOperator {
    /// Items present in every list.
    And,
    /// Items present in at least one list.
    Or,
    /// Items present in exactly one list.
    Xor,
    /// Items present in the first list and in no other.
    Except,
}

type Counts<T> = HashMap<T, usize>;

fn count_in<T: Eq + Hash + Clone>(counts: &mut Counts<T>, item: &T) {
    *counts.entry(item.clone()).or_insert(0) += 1;
}
fn count_out<T: Eq + Hash>(counts: &mut Counts<T>, item: &T) -> Result<()> {
    let Some(n) = counts.get_mut(item) else {
        return Err(Error::ItemNotFound {
            operation: "combine",
        });
    };
    *n -= 1;
    if *n == 0 {
        counts.remove(item);
    }
    Ok(())
}

struct SourceEntry<T: ListItem> {
    id: u64,
    source: Observable<ChangeSet<T>>,
    counts: Counts<T>,
    subscription: Option<Subscription>,
}

struct CombineState<T: ListItem> {
    operator: CombineOperator,
    sources: Vec<SourceEntry<T>>,
    result: TrackedList<T>,
    next_id: u64,
}

/// Work left after the state lock is released.
struct SourceUpdate<T: ListItem> {
    subscribe: Vec<(u64, Observable<ChangeSet<T>>)>,
    unsubscribe: Vec<Subscription>,
}

impl<T: ListItem + Eq + Hash> CombineState<T> {
    fn new(operator: CombineOperator) -> Self {
        Self {
            operator,
            sources: Vec::new(),
            result: TrackedList::new(),
            next_id: 0,
        }
    }

    fn is_visible(&self, item: &T) -> bool {
        let mut present = self.sources.iter().map(|s| s.counts.contains_key(item));
        match self.operator {
            CombineOperator::And => !self.sources.is_empty() && present.all(|p| p),
            CombineOperator::Or => present.any(|p| p),
            CombineOperator::Xor => present.filter(|&p| p).count() == 1,
            CombineOperator::Except => present.next().unwrap_or(false) && !present.any(|p| p),
        }
    }

    fn update_item(&mut self, item: &T) {
        match (self.is_visible(item), self.result.position_of(item)) {
            (true, None) => self.result.push(item.clone()),
            (false, Some(index)) => {
                self.result.remove_at(index);
            }
            _ => {}
        }
    }

    fn update_all(&mut self) {
        let mut items: Vec<T> = self.result.as_slice().to_vec();
        for source in &self.sources {
            items.extend(source.counts.keys().cloned());
        }
        for item in items {
            self.update_item(&item);
        }
    }

    /// Applies the changes of the source registered as `id`.
    fn apply(&mut self, id: u64, changes: &ChangeSet<T>) -> Result<()> {
        let Some(source) = self.sources.iter_mut().find(|s| s.id == id) else {
            return Ok(());
        };
        let counts = &mut source.counts;
        let mut touched = Vec::new();
        for change in changes {
            match change {
                Change::Add { item, .. } => {
                    count_in(counts, item);
                    touched.push(item.clone());
                }
                Change::AddRange { items, .. } => {
                    for item in items {
                        count_in(counts, item);
                    }
                    touched.extend(items.iter().cloned());
                }
                Change::Replace {
                    current, previous, ..
                } => {
                    count_out(counts, previous)?;
                    count_in(counts, current);
                    touched.push(previous.clone());
                    touched.push(current.clone());
                }
                Change::Remove { item, .. } => {
                    count_out(counts, item)?;
                    touched.push(item.clone());
                }
                Change::RemoveRange { items, .. } => {
                    for item in items {
                        count_out(counts, item)?;
                    }
                    touched.extend(items.iter().cloned());
                }
                Change::Clear { .. } => touched.extend(counts.drain().map(|(item, _)| item)),
                Change::Refresh { .. } | Change::Moved { .. } => {}
            }
        }
        for item in touched {
            self.update_item(&item);
        }
        Ok(())
    }

    fn add_source(&mut self, index: usize, source: Observable<ChangeSet<T>>, update: &mut SourceUpdate<T>) {
        let id = self.next_id;
        self.next_id += 1;
        update.subscribe.push((id, source.clone()));
        self.sources.insert(
            index,
            SourceEntry {
                id,
                source,
                counts: HashMap::new(),
                subscription: None,
            },
        );
    }
    fn remove_source(&mut self, index: usize, update: &mut SourceUpdate<T>) {
        let entry = self.sources.remove(index);
        update.unsubscribe.extend(entry.subscription);
    }
    fn position(&self, index: Option<usize>, source: &Observable<ChangeSet<T>>) -> Result<usize> {
        match index {
            Some(index) => {
                check_index(index, self.sources.len())?;
                Ok(index)
            }
            None => self
                .sources
                .iter()
                .position(|s| &s.source == source)
                .ok_or(Error::ItemNotFound {
                    operation: "combine sources",
                }),
        }
    }

    /// Mirrors a change of the list of sources.
    fn apply_sources(
        &mut self,
        changes: &ChangeSet<Observable<ChangeSet<T>>>,
        update: &mut SourceUpdate<T>,
    ) -> Result<()> {
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let index = index.unwrap_or(self.sources.len());
                    check_index(index, self.sources.len() + 1)?;
                    self.add_source(index, item.clone(), update);
                }
                Change::AddRange { items, index } => {
                    let index = index.unwrap_or(self.sources.len());
                    check_index(index, self.sources.len() + 1)?;
                    for (i, item) in items.iter().enumerate() {
                        self.add_source(index + i, item.clone(), update);
                    }
                }
                Change::Replace {
                    current,
                    previous,
                    index,
                } => {
                    let index = self.position(*index, previous)?;
                    self.remove_source(index, update);
                    self.add_source(index, current.clone(), update);
                }
                Change::Remove { item, index } => {
                    let index = self.position(*index, item)?;
                    self.remove_source(index, update);
                }
                Change::RemoveRange { items, index } => match *index {
                    Some(index) => {
                        check_index(index + items.len(), self.sources.len() + 1)?;
                        for _ in 0..items.len() {
                            self.remove_source(index, update);
                        }
                    }
                    None => {
                        for item in items {
                            let index = self.position(None, item)?;
                            self.remove_source(index, update);
                        }
                    }
                },
                Change::Moved {
                    current_index,
                    previous_index,
                    ..
                } => {
                    check_index(*previous_index, self.sources.len())?;
                    check_index(*current_index, self.sources.len())?;
                    let entry = self.sources.remove(*previous_index);
                    self.sources.insert(*current_index, entry);
                }
                Change::Clear { .. } => {
                    while !self.sources.is_empty() {
                        self.remove_source(0, update);
                    }
                }
                Change::Refresh { .. } => {}
            }
        }
        Ok(())
    }
}

fn subscribe_source<T: ListItem + Eq + Hash>(
    id: u64,
    source: &Observable<ChangeSet<T>>,
    state: &Arc<Mutex<CombineState<T>>>,
    downstream: &Arc<Downstream<ChangeSet<T>>>,
) {
    let s = state.clone();
    let out = downstream.clone();
    let error_out = downstream.clone();
    let subscription = source.subscribe_all(
        move |changes: &ChangeSet<T>| {
            {
                let mut s = s.lock();
                let r = s.apply(id, changes).map(|_| s.result.capture_changes());
                push_changes(&out, r, "combine");
            }
            out.drain();
        },
        move |e| {
            error_out.push_error(e.clone());
            error_out.drain();
        },
        || {},
    );
    let mut s = state.lock();
    if let Some(entry) = s.sources.iter_mut().find(|e| e.id == id) {
        entry.subscription = Some(subscription);
    }
}

impl<T: ListItem + Eq + Hash> ObservableList<Observable<ChangeSet<T>>> {
    /// Combines the memberships of the lists in this list.
    ///
    /// Items are compared by equality and each appears at most once in the
    /// result. Adding a list contributes its current items, and removing one
    /// withdraws them. For [`CombineOperator::Except`] the first list in this
    /// list is the primary one.
    pub fn combine(&self, operator: CombineOperator) -> Observable<ChangeSet<T>> {
        let sources = self.connect();
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Arc::new(Mutex::new(CombineState::new(operator)));
            let s = state.clone();
            let out = downstream.clone();
            let error_out = downstream.clone();
            let subscription = sources.subscribe_all(
                move |changes: &ChangeSet<Observable<ChangeSet<T>>>| {
                    let mut update = SourceUpdate {
                        subscribe: Vec::new(),
                        unsubscribe: Vec::new(),
                    };
                    {
                        let mut st = s.lock();
                        let r = st.apply_sources(changes, &mut update).map(|_| {
                            st.update_all();
                            st.result.capture_changes()
                        });
                        push_changes(&out, r, "combine");
                    }
                    drop(update.unsubscribe);
                    for (id, source) in &update.subscribe {
                        subscribe_source(*id, source, &s, &out);
                    }
                    out.drain();
                },
                move |e| {
                    push_error(&error_out, e.clone(), "combine");
                    error_out.drain();
                },
                || {},
            );
            subscription.with(Subscription::from_fn(move || {
                let inner: Vec<Subscription> = state
                    .lock()
                    .sources
                    .iter_mut()
                    .filter_map(|e| e.subscription.take())
                    .collect();
                drop(inner);
            }))
        })
    }
    pub fn and(&self) -> Observable<ChangeSet<T>> {
        self.combine(CombineOperator::And)
    }
    pub fn or(&self) -> Observable<ChangeSet<T>> {
        self.combine(CombineOperator::Or)
    }
    pub fn xor(&self) -> Observable<ChangeSet<T>> {
        self.combine(CombineOperator::Xor)
    }
    pub fn except(&self) -> Observable<ChangeSet<T>> {
        self.combine(CombineOperator::Except)
    }
}

impl<T: ListItem + Eq + Hash> Observable<ChangeSet<T>> {
    /// Combines a fixed set of change-set streams.
    pub fn combine(
        operator: CombineOperator,
        sources: impl IntoIterator<Item = Observable<ChangeSet<T>>>,
    ) -> Observable<ChangeSet<T>> {
        SourceList::from_vec(sources.into_iter().collect())
            .as_observable_list()
            .combine(operator)
    }
    fn combine_with(&self, operator: CombineOperator, others: &[Self]) -> Self {
        let sources = std::iter::once(self.clone()).chain(others.iter().cloned());
        Self::combine(operator, sources)
    }

    /// Items present in this stream and in every one of `others`.
    pub fn and(&self, others: &[Self]) -> Self {
        self.combine_with(CombineOperator::And, others)
    }
    /// Items present in this stream or in any of `others`.
    pub fn or(&self, others: &[Self]) -> Self {
        self.combine_with(CombineOperator::Or, others)
    }
    /// Items present in exactly one of this stream and `others`.
    pub fn xor(&self, others: &[Self]) -> Self {
        self.combine_with(CombineOperator::Xor, others)
    }
    /// Items present in this stream and in none of `others`.
    pub fn except(&self, others: &[Self]) -> Self {
        self.combine_with(CombineOperator::Except, others)
    }
}

use std::sync::Arc;

use derive_ex::Ex;
use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{check_index, locate, push_changes},
    Change, ChangeSet, ListItem, Observable, Result, TrackedList,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct TransformOptions {
    /// Recreate the transformed item when the source item is refreshed,
    /// reported as a `Replace`. Otherwise the transformed item is refreshed.
    pub transform_on_refresh: bool,
}
impl TransformOptions {
    pub const fn new() -> Self {
        Self {
            transform_on_refresh: false,
        }
    }
}

pub(crate) struct TransformState<T, U> {
    sources: Vec<T>,
    result: TrackedList<U>,
}

impl<T: ListItem, U: ListItem> TransformState<T, U> {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            result: TrackedList::new(),
        }
    }

    fn position(&self, index: Option<usize>, item: &T, operation: &'static str) -> Result<usize> {
        match index {
            Some(index) => {
                check_index(index, self.sources.len())?;
                Ok(index)
            }
            None => locate(&self.sources, item, operation),
        }
    }

    /// Applies `changes`, calling `f` for every item that needs a new
    /// projection in the order given by [`transform_inputs`].
    pub fn apply(
        &mut self,
        changes: &ChangeSet<T>,
        f: &mut dyn FnMut(&T) -> U,
        options: TransformOptions,
    ) -> Result<ChangeSet<U>> {
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let index = index.unwrap_or(self.sources.len());
                    check_index(index, self.sources.len() + 1)?;
                    self.result.insert(index, f(item));
                    self.sources.insert(index, item.clone());
                }
                Change::AddRange { items, index } => {
                    let index = index.unwrap_or(self.sources.len());
                    check_index(index, self.sources.len() + 1)?;
                    self.result.insert_range(index, items.iter().map(&mut *f));
                    self.sources.splice(index..index, items.iter().cloned());
                }
                Change::Replace {
                    current,
                    previous,
                    index,
                } => {
                    let index = self.position(*index, previous, "transform replace")?;
                    self.result.set(index, f(current));
                    self.sources[index] = current.clone();
                }
                Change::Refresh { item, index } => {
                    check_index(*index, self.sources.len())?;
                    if options.transform_on_refresh {
                        self.result.set(*index, f(item));
                    } else {
                        self.result.refresh_at(*index);
                    }
                    self.sources[*index] = item.clone();
                }
                Change::Remove { item, index } => {
                    let index = self.position(*index, item, "transform remove")?;
                    self.result.remove_at(index);
                    self.sources.remove(index);
                }
                Change::RemoveRange { items, index } => match *index {
                    Some(index) => {
                        check_index(index + items.len(), self.sources.len() + 1)?;
                        self.result.remove_range(index, items.len());
                        self.sources.drain(index..index + items.len());
                    }
                    None => {
                        for item in items {
                            let index = self.position(None, item, "transform remove_range")?;
                            self.result.remove_at(index);
                            self.sources.remove(index);
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
                    self.result.move_item(*previous_index, *current_index);
                    let item = self.sources.remove(*previous_index);
                    self.sources.insert(*current_index, item);
                }
                Change::Clear { .. } => {
                    self.result.clear();
                    self.sources.clear();
                }
            }
        }
        Ok(self.result.capture_changes())
    }
}

/// The items of `changes` that [`TransformState::apply`] projects, in call order.
pub(crate) fn transform_inputs<T: Clone>(changes: &ChangeSet<T>, options: TransformOptions) -> Vec<T> {
    let mut inputs = Vec::new();
    for change in changes {
        match change {
            Change::Add { item, .. } => inputs.push(item.clone()),
            Change::AddRange { items, .. } => inputs.extend(items.iter().cloned()),
            Change::Replace { current, .. } => inputs.push(current.clone()),
            Change::Refresh { item, .. } if options.transform_on_refresh => {
                inputs.push(item.clone())
            }
            _ => {}
        }
    }
    inputs
}

struct TransformManyState<T, U> {
    sources: Vec<(T, usize)>,
    result: TrackedList<U>,
}

impl<T: ListItem, U: ListItem> TransformManyState<T, U> {
    fn offset(&self, index: usize) -> usize {
        self.sources[..index].iter().map(|(_, n)| n).sum()
    }
    fn position(&self, index: Option<usize>, item: &T, operation: &'static str) -> Result<usize> {
        match index {
            Some(index) => {
                check_index(index, self.sources.len())?;
                Ok(index)
            }
            None => locate(self.sources.iter().map(|(x, _)| x), item, operation),
        }
    }
    fn remove(&mut self, index: usize) {
        let offset = self.offset(index);
        let (_, count) = self.sources.remove(index);
        self.result.remove_range(offset, count);
    }
    fn update(&mut self, index: usize, item: &T, f: &dyn Fn(&T) -> Vec<U>, is_refresh: bool) {
        let offset = self.offset(index);
        let count = self.sources[index].1;
        let children = f(item);
        if is_refresh && children.as_slice() == &self.result.as_slice()[offset..offset + count] {
            for i in offset..offset + count {
                self.result.refresh_at(i);
            }
        } else {
            self.result.remove_range(offset, count);
            self.sources[index].1 = children.len();
            self.result.insert_range(offset, children);
        }
        self.sources[index].0 = item.clone();
    }

    fn apply(&mut self, changes: &ChangeSet<T>, f: &dyn Fn(&T) -> Vec<U>) -> Result<ChangeSet<U>> {
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let index = index.unwrap_or(self.sources.len());
                    check_index(index, self.sources.len() + 1)?;
                    let children = f(item);
                    let offset = self.offset(index);
                    self.sources.insert(index, (item.clone(), children.len()));
                    self.result.insert_range(offset, children);
                }
                Change::AddRange { items, index } => {
                    let index = index.unwrap_or(self.sources.len());
                    check_index(index, self.sources.len() + 1)?;
                    let offset = self.offset(index);
                    let mut all = Vec::new();
                    let mut entries = Vec::with_capacity(items.len());
                    for item in items {
                        let children = f(item);
                        entries.push((item.clone(), children.len()));
                        all.extend(children);
                    }
                    self.sources.splice(index..index, entries);
                    self.result.insert_range(offset, all);
                }
                Change::Replace {
                    current,
                    previous,
                    index,
                } => {
                    let index = self.position(*index, previous, "transform_many replace")?;
                    self.update(index, current, f, false);
                }
                Change::Refresh { item, index } => {
                    check_index(*index, self.sources.len())?;
                    self.update(*index, item, f, true);
                }
                Change::Remove { item, index } => {
                    let index = self.position(*index, item, "transform_many remove")?;
                    self.remove(index);
                }
                Change::RemoveRange { items, index } => match *index {
                    Some(index) => {
                        check_index(index + items.len(), self.sources.len() + 1)?;
                        let offset = self.offset(index);
                        let count: usize = self
                            .sources
                            .drain(index..index + items.len())
                            .map(|(_, n)| n)
                            .sum();
                        self.result.remove_range(offset, count);
                    }
                    None => {
                        for item in items {
                            let index = self.position(None, item, "transform_many remove_range")?;
                            self.remove(index);
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
                    let from = self.offset(*previous_index);
                    let entry = self.sources.remove(*previous_index);
                    let count = entry.1;
                    self.sources.insert(*current_index, entry);
                    let to = self.offset(*current_index);
                    if from < to {
                        for _ in 0..count {
                            self.result.move_item(from, to + count - 1);
                        }
                    } else {
                        for i in 0..count {
                            self.result.move_item(from + i, to + i);
                        }
                    }
                }
                Change::Clear { .. } => {
                    self.result.clear();
                    self.sources.clear();
                }
            }
        }
        Ok(self.result.capture_changes())
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Projects every item with `f`, keeping positions.
    pub fn transform<U: ListItem>(
        &self,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> Observable<ChangeSet<U>> {
        self.transform_with(f, TransformOptions::new())
    }

    pub fn transform_with<U: ListItem>(
        &self,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
        options: TransformOptions,
    ) -> Observable<ChangeSet<U>> {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Mutex::new(TransformState::new());
            let f = f.clone();
            let out = downstream.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    {
                        let mut s = state.lock();
                        let r = s.apply(changes, &mut |x: &T| f(x), options);
                        push_changes(&out, r, "transform");
                    }
                    out.drain();
                },
                downstream.as_observer(),
            )
        })
    }

    /// Expands every item into the items returned by `f`, flattened in
    /// source order.
    pub fn transform_many<U: ListItem>(
        &self,
        f: impl Fn(&T) -> Vec<U> + Send + Sync + 'static,
    ) -> Observable<ChangeSet<U>> {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Mutex::new(TransformManyState {
                sources: Vec::new(),
                result: TrackedList::new(),
            });
            let f = f.clone();
            let out = downstream.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    {
                        let mut s = state.lock();
                        push_changes(&out, s.apply(changes, &*f), "transform_many");
                    }
                    out.drain();
                },
                downstream.as_observer(),
            )
        })
    }
}

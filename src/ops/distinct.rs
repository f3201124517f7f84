use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{check_index, locate, push_changes},
    Change, ChangeSet, ListItem, Observable, Result, TrackedList,
};

#[cfg(test)]
mod tests;

struct DistinctState<T, U> {
    all: Vec<(T, U)>,
    counts: HashMap<U, usize>,
    result: TrackedList<U>,
}

impl<T: ListItem, U: ListItem + Eq + Hash> DistinctState<T, U> {
    fn position(&self, index: Option<usize>, item: &T) -> Result<usize> {
        match index {
            Some(index) => {
                check_index(index, self.all.len())?;
                Ok(index)
            }
            None => locate(self.all.iter().map(|(x, _)| x), item, "distinct_values"),
        }
    }

    fn add_ref(&mut self, value: U) {
        let count = self.counts.entry(value.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.result.push(value);
        }
    }
    fn release(&mut self, value: &U) {
        let Some(count) = self.counts.get_mut(value) else {
            debug_assert!(false, "released a value that was never counted");
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(value);
            self.result.remove(value);
        }
    }
    fn update(&mut self, index: usize, item: T, value: U) {
        let previous = std::mem::replace(&mut self.all[index], (item, value.clone())).1;
        if previous != value {
            self.add_ref(value);
            self.release(&previous);
        }
    }

    fn apply(&mut self, changes: &ChangeSet<T>, f: &dyn Fn(&T) -> U) -> Result<ChangeSet<U>> {
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let index = index.unwrap_or(self.all.len());
                    check_index(index, self.all.len() + 1)?;
                    let value = f(item);
                    self.all.insert(index, (item.clone(), value.clone()));
                    self.add_ref(value);
                }
                Change::AddRange { items, index } => {
                    let index = index.unwrap_or(self.all.len());
                    check_index(index, self.all.len() + 1)?;
                    let entries: Vec<(T, U)> = items.iter().map(|x| (x.clone(), f(x))).collect();
                    self.all.splice(index..index, entries.iter().cloned());
                    for (_, value) in entries {
                        self.add_ref(value);
                    }
                }
                Change::Replace {
                    current,
                    previous,
                    index,
                } => {
                    let index = self.position(*index, previous)?;
                    self.update(index, current.clone(), f(current));
                }
                Change::Refresh { item, index } => {
                    check_index(*index, self.all.len())?;
                    self.update(*index, item.clone(), f(item));
                }
                Change::Remove { item, index } => {
                    let index = self.position(*index, item)?;
                    let (_, value) = self.all.remove(index);
                    self.release(&value);
                }
                Change::RemoveRange { items, index } => match *index {
                    Some(index) => {
                        check_index(index + items.len(), self.all.len() + 1)?;
                        let removed: Vec<(T, U)> = self.all.drain(index..index + items.len()).collect();
                        for (_, value) in removed {
                            self.release(&value);
                        }
                    }
                    None => {
                        for item in items {
                            let index = self.position(None, item)?;
                            let (_, value) = self.all.remove(index);
                            self.release(&value);
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
                    let entry = self.all.remove(*previous_index);
                    self.all.insert(*current_index, entry);
                }
                Change::Clear { .. } => {
                    self.all.clear();
                    self.counts.clear();
                    self.result.clear();
                }
            }
        }
        Ok(self.result.capture_changes())
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// The distinct values returned by `f`, in the order they first appeared.
    ///
    /// A value is removed once no item produces it.
    pub fn distinct_values<U>(
        &self,
        f: impl Fn(&T) -> U + Send + Sync + 'static,
    ) -> Observable<ChangeSet<U>>
    where
        U: ListItem + Eq + Hash,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Mutex::new(DistinctState {
                all: Vec::new(),
                counts: HashMap::new(),
                result: TrackedList::new(),
            });
            let f = f.clone();
            let out = downstream.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    {
                        let mut s = state.lock();
                        push_changes(&out, s.apply(changes, &*f), "distinct_values");
                    }
                    out.drain();
                },
                downstream.as_observer(),
            )
        })
    }
}

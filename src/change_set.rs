use std::ops::Index;

use derive_ex::Ex;

use crate::{ops::check_index, Change, Error, ListTarget, Result};


/// Running totals of the item-level effects in a [`ChangeSet`].
///
/// Range changes count once per item they carry, item changes count once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeCounts {
    pub adds: usize,
    pub removes: usize,
    pub replaced: usize,
    pub moves: usize,
    pub refreshes: usize,
}

impl ChangeCounts {
    pub fn from_changes<'a, T: 'a>(changes: impl IntoIterator<Item = &'a Change<T>>) -> Self {
        let mut counts = Self::default();
        for change in changes {
            counts.record(change);
        }
        counts
    }
    fn record<T>(&mut self, change: &Change<T>) {
        match change {
            Change::Add { .. } | Change::AddRange { .. } => self.adds += change.len(),
            Change::Remove { .. } | Change::RemoveRange { .. } | Change::Clear { .. } => {
                self.removes += change.len()
            }
            Change::Replace { .. } => self.replaced += 1,
            Change::Moved { .. } => self.moves += 1,
            Change::Refresh { .. } => self.refreshes += 1,
        }
    }
    pub fn total(&self) -> usize {
        self.adds + self.removes + self.replaced + self.moves + self.refreshes
    }
}

/// Ordered batch of changes produced by one edit transaction.
///
/// Changes must be replayed in order: each change's indices are relative to
/// the list state left by the changes before it.
#[derive(Debug, Clone, PartialEq, Eq, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct ChangeSet<T> {
    changes: Vec<Change<T>>,
    counts: ChangeCounts,
}

impl<T> ChangeSet<T> {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            counts: ChangeCounts::default(),
        }
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
            counts: ChangeCounts::default(),
        }
    }

    pub fn push(&mut self, change: Change<T>) {
        self.counts.record(&change);
        self.changes.push(change);
    }
    pub fn append(&mut self, other: ChangeSet<T>) {
        self.extend(other.changes);
    }

    /// Number of changes (not items) in the set.
    pub fn len(&self) -> usize {
        self.changes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Change<T>> {
        self.changes.iter()
    }
    pub fn as_slice(&self) -> &[Change<T>] {
        &self.changes
    }

    pub fn counts(&self) -> ChangeCounts {
        self.counts
    }
    pub fn adds(&self) -> usize {
        self.counts.adds
    }
    pub fn removes(&self) -> usize {
        self.counts.removes
    }
    pub fn replaced(&self) -> usize {
        self.counts.replaced
    }
    pub fn moves(&self) -> usize {
        self.counts.moves
    }
    pub fn refreshes(&self) -> usize {
        self.counts.refreshes
    }
    pub fn total_changes(&self) -> usize {
        self.counts.total()
    }

    /// Counts recomputed by scanning every change.
    pub fn recount(&self) -> ChangeCounts {
        ChangeCounts::from_changes(&self.changes)
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> ChangeSet<U> {
        ChangeSet {
            changes: self.changes.into_iter().map(|c| c.map(&mut f)).collect(),
            counts: self.counts,
        }
    }

    /// Replays the changes onto `target`.
    ///
    /// Positional changes are applied by index. Changes without an index
    /// append (adds) or locate the item by value (replace and removals).
    /// `Clear` always empties the whole target.
    pub fn apply_to(&self, target: &mut (impl ListTarget<T> + ?Sized)) -> Result<()>
    where
        T: Clone + PartialEq,
    {
        for change in &self.changes {
            apply_change(change, target)?;
        }
        Ok(())
    }
}

fn apply_change<T: Clone + PartialEq>(
    change: &Change<T>,
    target: &mut (impl ListTarget<T> + ?Sized),
) -> Result<()> {
    match change {
        Change::Add { item, index } => match *index {
            Some(index) => {
                check_index(index, target.len() + 1)?;
                target.insert(index, item.clone());
            }
            None => target.push(item.clone()),
        },
        Change::AddRange { items, index } => {
            let index = index.unwrap_or(target.len());
            check_index(index, target.len() + 1)?;
            target.insert_range(index, items.clone());
        }
        Change::Replace {
            current,
            previous,
            index,
        } => {
            let index = match *index {
                Some(index) => index,
                None => locate(&*target, previous, "replace")?,
            };
            check_index(index, target.len())?;
            target.set(index, current.clone());
        }
        Change::Remove { item, index } => {
            let index = match *index {
                Some(index) => index,
                None => locate(&*target, item, "remove")?,
            };
            check_index(index, target.len())?;
            target.remove_at(index);
        }
        Change::RemoveRange { items, index } => match *index {
            Some(index) => {
                if index + items.len() > target.len() {
                    return Err(Error::IndexOutOfRange {
                        index: index + items.len(),
                        len: target.len(),
                    });
                }
                target.remove_range(index, items.len())?;
            }
            None => {
                for item in items {
                    let index = locate(&*target, item, "remove_range")?;
                    target.remove_at(index);
                }
            }
        },
        Change::Refresh { item, index } => {
            check_index(*index, target.len())?;
            target.refresh_at(*index, item.clone());
        }
        Change::Moved {
            current_index,
            previous_index,
            ..
        } => {
            check_index(*previous_index, target.len())?;
            check_index(*current_index, target.len())?;
            target.move_item(*previous_index, *current_index);
        }
        Change::Clear { .. } => target.clear(),
    }
    Ok(())
}

fn locate<T: PartialEq>(
    target: &(impl ListTarget<T> + ?Sized),
    item: &T,
    operation: &'static str,
) -> Result<usize> {
    target
        .position_of(item)
        .ok_or(Error::ItemNotFound { operation })
}

impl<T> Index<usize> for ChangeSet<T> {
    type Output = Change<T>;
    fn index(&self, index: usize) -> &Self::Output {
        &self.changes[index]
    }
}
impl<T> Extend<Change<T>> for ChangeSet<T> {
    fn extend<I: IntoIterator<Item = Change<T>>>(&mut self, iter: I) {
        for change in iter {
            self.push(change);
        }
    }
}
impl<T> FromIterator<Change<T>> for ChangeSet<T> {
    fn from_iter<I: IntoIterator<Item = Change<T>>>(iter: I) -> Self {
        let mut this = Self::new();
        this.extend(iter);
        this
    }
}
impl<T> From<Vec<Change<T>>> for ChangeSet<T> {
    fn from(changes: Vec<Change<T>>) -> Self {
        let counts = ChangeCounts::from_changes(&changes);
        Self { changes, counts }
    }
}
impl<T> IntoIterator for ChangeSet<T> {
    type Item = Change<T>;
    type IntoIter = std::vec::IntoIter<Change<T>>;
    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}
impl<'a, T> IntoIterator for &'a ChangeSet<T> {
    type Item = &'a Change<T>;
    type IntoIter = std::slice::Iter<'a, Change<T>>;
    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

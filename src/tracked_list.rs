use std::{
    fmt::{self, Debug},
    mem::take,
    ops::Index,
    slice::Iter,
};

use derive_ex::Ex;

use crate::{Change, ChangeSet, ListTarget, Result};

#[cfg(test)]
mod tests;

/// A `Vec` that records every structural mutation as a [`Change`].
///
/// Recorded changes are read out with [`capture_changes`](Self::capture_changes),
/// which reports each mutation exactly once.
///
/// Methods taking an index panic when the index is out of bounds, like the
/// corresponding `Vec` methods.
#[derive(Clone, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct TrackedList<T> {
    items: Vec<T>,
    changes: ChangeSet<T>,
}

impl<T> TrackedList<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            changes: ChangeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }
    pub fn iter(&self) -> Iter<'_, T> {
        self.items.iter()
    }
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    /// Whether changes were recorded since the last capture.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Takes the changes recorded so far, leaving an empty accumulator.
    pub fn capture_changes(&mut self) -> ChangeSet<T> {
        take(&mut self.changes)
    }

    pub(crate) fn swap_items(&mut self, items: &mut Vec<T>) {
        std::mem::swap(&mut self.items, items);
    }
}

impl<T: Clone> TrackedList<T> {
    pub fn insert(&mut self, index: usize, item: T) {
        self.items.insert(index, item.clone());
        self.changes.push(Change::Add {
            item,
            index: Some(index),
        });
    }
    pub fn push(&mut self, item: T) {
        let len = self.len();
        self.insert(len, item);
    }
    pub fn remove_at(&mut self, index: usize) -> T {
        let item = self.items.remove(index);
        self.changes.push(Change::Remove {
            item: item.clone(),
            index: Some(index),
        });
        item
    }
    pub fn set(&mut self, index: usize, item: T) -> T {
        let previous = std::mem::replace(&mut self.items[index], item.clone());
        self.changes.push(Change::Replace {
            current: item,
            previous: previous.clone(),
            index: Some(index),
        });
        previous
    }

    /// Moves the item at `old_index` so that it ends up at `new_index`.
    ///
    /// Records a single [`Change::Moved`]. Moving an item onto itself records
    /// nothing.
    pub fn move_item(&mut self, old_index: usize, new_index: usize) {
        match old_index.cmp(&new_index) {
            std::cmp::Ordering::Less => self.items[old_index..=new_index].rotate_left(1),
            std::cmp::Ordering::Greater => self.items[new_index..=old_index].rotate_right(1),
            std::cmp::Ordering::Equal => {
                assert!(old_index < self.len(), "index out of bounds");
                return;
            }
        }
        self.changes.push(Change::Moved {
            item: self.items[new_index].clone(),
            current_index: new_index,
            previous_index: old_index,
        });
    }

    /// Records a [`Change::Refresh`] for the item at `index`.
    pub fn refresh_at(&mut self, index: usize) {
        let item = self.items[index].clone();
        self.changes.push(Change::Refresh { item, index });
    }

    pub fn add_range(&mut self, items: impl IntoIterator<Item = T>) {
        let len = self.len();
        self.insert_range(len, items);
    }
    pub fn insert_range(&mut self, index: usize, items: impl IntoIterator<Item = T>) {
        assert!(index <= self.len(), "index out of bounds");
        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return;
        }
        self.items.splice(index..index, items.iter().cloned());
        self.changes.push(Change::AddRange {
            items,
            index: Some(index),
        });
    }
    pub fn remove_range(&mut self, index: usize, count: usize) {
        assert!(index + count <= self.len(), "range out of bounds");
        if count == 0 {
            return;
        }
        let items: Vec<T> = self.items.drain(index..index + count).collect();
        self.changes.push(Change::RemoveRange {
            items,
            index: Some(index),
        });
    }

    /// Removes every item, recording them in their current order.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let items = take(&mut self.items);
        self.changes.push(Change::Clear { items });
    }

    /// Replaces the whole content, recording a `Clear` followed by an `AddRange`.
    pub fn reset(&mut self, items: impl IntoIterator<Item = T>) {
        self.clear();
        self.add_range(items);
    }
}

impl<T: Clone + PartialEq> TrackedList<T> {
    pub fn position_of(&self, item: &T) -> Option<usize> {
        self.items.iter().position(|x| x == item)
    }
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Removes the first item equal to `item`.
    pub fn remove(&mut self, item: &T) -> bool {
        if let Some(index) = self.position_of(item) {
            self.remove_at(index);
            true
        } else {
            false
        }
    }

    /// Removes the first occurrence of each of `items`.
    ///
    /// Removals are recorded as single removes in descending index order,
    /// so every recorded index is valid against the list as it was before
    /// that removal. When two of `items` resolve to the same position the
    /// removal falls back to removing the items one by one.
    pub fn remove_many(&mut self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        let mut indexes: Vec<usize> = items.iter().filter_map(|x| self.position_of(x)).collect();
        indexes.sort_unstable_by(|a, b| b.cmp(a));
        let has_duplicates = indexes.windows(2).any(|w| w[0] == w[1]);
        if has_duplicates {
            for item in &items {
                self.remove(item);
            }
        } else {
            for index in indexes {
                self.remove_at(index);
            }
        }
    }

    /// Replaces the first item equal to `previous`.
    pub fn replace(&mut self, previous: &T, item: T) -> bool {
        if let Some(index) = self.position_of(previous) {
            self.set(index, item);
            true
        } else {
            false
        }
    }
}

impl<T> Index<usize> for TrackedList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}
impl<'a, T> IntoIterator for &'a TrackedList<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
impl<T: Clone> Extend<T> for TrackedList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.add_range(iter)
    }
}
impl<T> From<Vec<T>> for TrackedList<T> {
    /// Creates a list holding `items` with nothing recorded.
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            changes: ChangeSet::new(),
        }
    }
}
impl<T: Debug> Debug for TrackedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Clone> ListTarget<T> for TrackedList<T> {
    fn len(&self) -> usize {
        self.items.len()
    }
    fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }
    fn insert(&mut self, index: usize, item: T) {
        TrackedList::insert(self, index, item)
    }
    fn remove_at(&mut self, index: usize) -> T {
        TrackedList::remove_at(self, index)
    }
    fn set(&mut self, index: usize, item: T) -> T {
        TrackedList::set(self, index, item)
    }
    fn clear(&mut self) {
        TrackedList::clear(self)
    }
    fn insert_range(&mut self, index: usize, items: Vec<T>) {
        TrackedList::insert_range(self, index, items)
    }
    fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        TrackedList::remove_range(self, index, count);
        Ok(())
    }
    fn move_item(&mut self, old_index: usize, new_index: usize) {
        TrackedList::move_item(self, old_index, new_index)
    }
    fn refresh_at(&mut self, index: usize, item: T) {
        self.items[index] = item;
        TrackedList::refresh_at(self, index)
    }
}

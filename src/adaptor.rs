use std::sync::Arc;

use parking_lot::Mutex;

use crate::{observable::Downstream, ChangeSet, Error, ListItem, Observable, Result};


/// A mutable collection that change sets can be replayed onto.
///
/// Implement this for a UI collection type to bind it to a change-set stream
/// with [`ChangeSet::apply_to`] or [`Observable::bind_to`].
pub trait ListTarget<T> {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&T>;
    fn insert(&mut self, index: usize, item: T);
    fn remove_at(&mut self, index: usize) -> T;
    fn set(&mut self, index: usize, item: T) -> T;
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn push(&mut self, item: T) {
        let len = self.len();
        self.insert(len, item);
    }
    fn insert_range(&mut self, index: usize, items: Vec<T>) {
        for (offset, item) in items.into_iter().enumerate() {
            self.insert(index + offset, item);
        }
    }

    /// Removes `count` items starting at `index`.
    ///
    /// Collections without indexed range removal keep the default, which
    /// fails with [`Error::NotSupported`].
    fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        let _ = (index, count);
        Err(Error::NotSupported {
            operation: "remove_range",
        })
    }
    fn move_item(&mut self, old_index: usize, new_index: usize) {
        let item = self.remove_at(old_index);
        self.insert(new_index, item);
    }
    fn refresh_at(&mut self, index: usize, item: T) {
        self.set(index, item);
    }
    fn position_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        (0..self.len()).find(|&index| self.get(index) == Some(item))
    }
}

impl<T> ListTarget<T> for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
    fn get(&self, index: usize) -> Option<&T> {
        <[T]>::get(self, index)
    }
    fn insert(&mut self, index: usize, item: T) {
        Vec::insert(self, index, item)
    }
    fn remove_at(&mut self, index: usize) -> T {
        self.remove(index)
    }
    fn set(&mut self, index: usize, item: T) -> T {
        std::mem::replace(&mut self[index], item)
    }
    fn clear(&mut self) {
        Vec::clear(self)
    }
    fn insert_range(&mut self, index: usize, items: Vec<T>) {
        self.splice(index..index, items);
    }
    fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        self.drain(index..index + count);
        Ok(())
    }
    fn move_item(&mut self, old_index: usize, new_index: usize) {
        if old_index < new_index {
            self[old_index..=new_index].rotate_left(1);
        } else {
            self[new_index..=old_index].rotate_right(1);
        }
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Replays every change set onto `target` before passing it on.
    ///
    /// A change set that cannot be applied ends the subscription with the
    /// replay error.
    pub fn bind_to<L>(&self, target: Arc<Mutex<L>>) -> Observable<ChangeSet<T>>
    where
        L: ListTarget<T> + Send + 'static,
    {
        let source = self.clone();
        Observable::new(move |observer| {
            let target = target.clone();
            let downstream = Downstream::new(observer);
            let out = downstream.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    if out.is_stopped() {
                        return;
                    }
                    let applied = changes.apply_to(&mut *target.lock());
                    match applied {
                        Ok(()) => out.next(changes.clone()),
                        Err(e) => {
                            tracing::error!("bind_to failed to replay a change set: {e}");
                            out.error(e)
                        }
                    }
                },
                downstream.as_observer(),
            )
        })
    }
}

use std::fmt;

use derive_ex::Ex;

use crate::{ChangeSet, ListItem, Observable, SourceList};


/// A read-only view of a list.
///
/// Created from a [`SourceList`] with [`SourceList::as_observable_list`], or
/// from any change-set stream with [`Observable::as_observable_list`], in
/// which case the view keeps a copy of the items built by replaying the
/// stream.
#[derive(Ex, PartialEq, Eq)]
#[derive_ex(Clone(bound()))]
pub struct ObservableList<T: ListItem>(SourceList<T>);

impl<T: ListItem + fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: ListItem> ObservableList<T> {
    pub(crate) fn from_source(source: SourceList<T>) -> Self {
        Self(source)
    }
    pub fn from_observable(source: &Observable<ChangeSet<T>>) -> Self {
        Self(SourceList::from_observable(source))
    }

    pub fn connect(&self) -> Observable<ChangeSet<T>> {
        self.0.connect()
    }
    pub fn connect_where(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Observable<ChangeSet<T>> {
        self.0.connect_where(predicate)
    }
    pub fn count_changed(&self) -> Observable<usize> {
        self.0.count_changed()
    }

    pub fn count(&self) -> usize {
        self.0.count()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn items(&self) -> Vec<T> {
        self.0.items()
    }
    pub fn get(&self, index: usize) -> Option<T> {
        self.0.get(index)
    }
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.0.read(|items| items.iter().position(|x| x == item))
    }
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.0.read(f)
    }

    /// Whether the underlying list was disposed, or its stream failed.
    pub fn is_closed(&self) -> bool {
        self.0.is_disposed()
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Materializes the stream into a read-only list.
    pub fn as_observable_list(&self) -> ObservableList<T> {
        ObservableList::from_observable(self)
    }
}

use std::{
    cell::RefCell,
    fmt,
    marker::PhantomData,
    sync::{Arc, Weak},
};

use derive_ex::Ex;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use serde::{Deserialize, Serialize};

use crate::{
    observable::Downstream, ops::check_index, Change, ChangeSet, Error, ListItem, Observable,
    ObservableList, Observer, Result, Subject, Subscription, TrackedList,
};


/// An editable list that publishes every edit as a [`ChangeSet`].
///
/// Edits are serialized by a write lock. The lock is reentrant, so an
/// observer may edit the list from inside its callback on the emitting
/// thread; the resulting change set is delivered after the one currently
/// being delivered.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct SourceList<T: ListItem>(Arc<RawSourceList<T>>);

struct RawSourceList<T: ListItem> {
    state: ReentrantMutex<RefCell<ListState<T>>>,
    changes: Subject<ChangeSet<T>>,
    previews: Subject<ChangeSet<T>>,
}

struct ListState<T> {
    list: TrackedList<T>,
    depth: usize,
    preview_base: Option<Vec<T>>,
    is_disposed: bool,
    seed: Option<Subscription>,
}

impl<T: ListItem> SourceList<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Creates a list holding `items`.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self(Arc::new(RawSourceList {
            state: ReentrantMutex::new(RefCell::new(ListState {
                list: TrackedList::from(items),
                depth: 0,
                preview_base: None,
                is_disposed: false,
                seed: None,
            })),
            changes: Subject::new(),
            previews: Subject::new(),
        }))
    }

    /// Creates a list that replays every change set of `source` onto itself.
    ///
    /// An error from `source`, or a change set that cannot be replayed,
    /// is sent to the subscribers of [`connect`](Self::connect) and closes the list.
    pub fn from_observable(source: &Observable<ChangeSet<T>>) -> Self {
        let this = Self::new();
        let seed = source.subscribe_with(SeedObserver(Arc::downgrade(&this.0)));
        let state = this.0.state.lock();
        let mut s = state.borrow_mut();
        if !s.is_disposed {
            s.seed = Some(seed);
        }
        drop(s);
        drop(state);
        this
    }

    /// Starts an edit transaction.
    ///
    /// Edits made while the returned guard is alive, through the guard or
    /// through the methods of this list, are published as one change set
    /// when the outermost guard is dropped.
    pub fn begin_edit(&self) -> Result<EditGuard<'_, T>> {
        let state = self.0.state.lock();
        {
            let mut s = state.borrow_mut();
            if s.is_disposed {
                tracing::warn!("edit of a disposed source list was ignored");
                return Err(Error::Disposed);
            }
            s.depth += 1;
            if s.depth == 1 && self.0.previews.has_observers() {
                s.preview_base = Some(s.list.as_slice().to_vec());
            }
        }
        Ok(EditGuard {
            list: &self.0,
            state,
        })
    }

    /// Runs `f` against the list and publishes the recorded changes as one
    /// change set.
    ///
    /// Edits made from inside `f` through other methods of this list, or by
    /// code `f` calls, join the same change set.
    pub fn edit<R>(&self, f: impl FnOnce(&mut ListEditor<'_, T>) -> R) -> Result<R> {
        let guard = self.begin_edit()?;
        Ok(guard.edit(f))
    }

    /// Change sets of this list, starting with the current contents.
    ///
    /// On subscription the current items are sent as a single `AddRange`
    /// (nothing is sent for an empty list), followed by every later change set.
    pub fn connect(&self) -> Observable<ChangeSet<T>> {
        let this = self.0.clone();
        Observable::new(move |observer| this.subscribe_changes(observer))
    }

    /// Like [`connect`](Self::connect), reduced to the items matching `predicate`.
    pub fn connect_where(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Observable<ChangeSet<T>> {
        self.connect().filter(predicate)
    }

    /// Change sets sent before the main notification of each edit.
    ///
    /// While a preview observer runs, the list still holds the items from
    /// before the edit. Preview observers must not edit the list.
    pub fn preview(&self) -> Observable<ChangeSet<T>> {
        self.0.previews.as_observable()
    }

    /// Like [`preview`](Self::preview), keeping only changes of items matching
    /// `predicate`. Indexes refer to positions in this list.
    pub fn preview_where(
        &self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Observable<ChangeSet<T>> {
        let source = self.preview();
        let predicate = Arc::new(predicate);
        Observable::new(move |observer| {
            let predicate = predicate.clone();
            let out = observer.clone();
            source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    let changes = retain_matching(changes, &*predicate);
                    if !changes.is_empty() {
                        out.on_next(&changes);
                    }
                },
                observer,
            )
        })
    }

    /// The number of items, starting with the current count and sending
    /// only values that differ from the previous one.
    pub fn count_changed(&self) -> Observable<usize> {
        let this = self.0.clone();
        Observable::new(move |observer| this.subscribe_count(observer))
    }

    pub fn count(&self) -> usize {
        self.read(|items| items.len())
    }
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// A snapshot of the items.
    pub fn items(&self) -> Vec<T> {
        self.read(|items| items.to_vec())
    }
    pub fn get(&self, index: usize) -> Option<T> {
        self.read(|items| items.get(index).cloned())
    }

    /// Runs `f` with the items under the write lock.
    pub fn read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let state = self.0.state.lock();
        let s = state.borrow();
        f(s.list.as_slice())
    }

    pub fn is_disposed(&self) -> bool {
        self.0.state.lock().borrow().is_disposed
    }

    /// Completes every stream of this list and releases the items.
    ///
    /// Calling this more than once has no effect.
    pub fn dispose(&self) {
        self.0.close(None)
    }

    pub fn as_observable_list(&self) -> ObservableList<T> {
        ObservableList::from_source(self.clone())
    }

    pub(crate) fn downgrade(&self) -> WeakSourceList<T> {
        WeakSourceList(Arc::downgrade(&self.0))
    }

    pub fn add(&self, item: T) -> Result<()> {
        self.edit(|list| list.push(item))
    }
    pub fn add_range(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.edit(|list| list.add_range(items))
    }
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.edit(|list| {
            check_index(index, list.len() + 1)?;
            list.insert(index, item);
            Ok(())
        })?
    }
    pub fn insert_range(&self, index: usize, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.edit(|list| {
            check_index(index, list.len() + 1)?;
            list.insert_range(index, items);
            Ok(())
        })?
    }

    /// Removes the first item equal to `item`, returning whether one was found.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.edit(|list| list.remove(item))
    }
    pub fn remove_many(&self, items: impl IntoIterator<Item = T>) -> Result<()> {
        self.edit(|list| list.remove_many(items))
    }
    pub fn remove_at(&self, index: usize) -> Result<T> {
        self.edit(|list| {
            check_index(index, list.len())?;
            Ok(list.remove_at(index))
        })?
    }
    pub fn remove_range(&self, index: usize, count: usize) -> Result<()> {
        self.edit(|list| {
            check_index(index + count, list.len() + 1)?;
            list.remove_range(index, count);
            Ok(())
        })?
    }
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.edit(|list| {
            check_index(old_index, list.len())?;
            check_index(new_index, list.len())?;
            list.move_item(old_index, new_index);
            Ok(())
        })?
    }

    /// Replaces the first item equal to `previous`, returning whether one was found.
    pub fn replace(&self, previous: &T, item: T) -> Result<bool> {
        self.edit(|list| list.replace(previous, item))
    }
    pub fn replace_at(&self, index: usize, item: T) -> Result<T> {
        self.edit(|list| {
            check_index(index, list.len())?;
            Ok(list.set(index, item))
        })?
    }
    pub fn refresh_at(&self, index: usize) -> Result<()> {
        self.edit(|list| {
            check_index(index, list.len())?;
            list.refresh_at(index);
            Ok(())
        })?
    }
    pub fn clear(&self) -> Result<()> {
        self.edit(|list| list.clear())
    }
}

/// Two handles are equal when they refer to the same list.
impl<T: ListItem> PartialEq for SourceList<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl<T: ListItem> Eq for SourceList<T> {}

impl<T: ListItem> Default for SourceList<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: ListItem> FromIterator<T> for SourceList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
impl<T: ListItem + fmt::Debug> fmt::Debug for SourceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|items| f.debug_list().entries(items).finish())
    }
}

impl<T: ListItem + Serialize> Serialize for SourceList<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.read(|items| serializer.collect_seq(items))
    }
}
impl<'de, T: ListItem + Deserialize<'de>> Deserialize<'de> for SourceList<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SourceListVisitor<T>(PhantomData<fn(T)>);
        impl<'de, T: ListItem + Deserialize<'de>> serde::de::Visitor<'de> for SourceListVisitor<T> {
            type Value = SourceList<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("sequence")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(value) = seq.next_element()? {
                    items.push(value);
                }
                Ok(SourceList::from_vec(items))
            }
        }
        deserializer.deserialize_seq(SourceListVisitor(PhantomData))
    }
}

/// An open edit transaction of a [`SourceList`], created by
/// [`SourceList::begin_edit`].
#[must_use]
pub struct EditGuard<'a, T: ListItem> {
    list: &'a RawSourceList<T>,
    state: ReentrantMutexGuard<'a, RefCell<ListState<T>>>,
}

impl<T: ListItem> EditGuard<'_, T> {
    pub fn edit<R>(&self, f: impl FnOnce(&mut ListEditor<'_, T>) -> R) -> R {
        f(&mut ListEditor { state: &*self.state })
    }
}

/// Mutable access to the items of a [`SourceList`] during an edit.
///
/// Each method borrows the items only while it runs, so the list can be
/// read or edited through its other handles between two calls. Index
/// arguments panic when out of bounds, like the methods of [`TrackedList`].
pub struct ListEditor<'a, T: ListItem> {
    state: &'a RefCell<ListState<T>>,
}

impl<T: ListItem> ListEditor<'_, T> {
    fn with<R>(&self, f: impl FnOnce(&mut TrackedList<T>) -> R) -> R {
        f(&mut self.state.borrow_mut().list)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().list.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.borrow().list.get(index).cloned()
    }
    pub fn items(&self) -> Vec<T> {
        self.state.borrow().list.as_slice().to_vec()
    }
    pub fn position_of(&self, item: &T) -> Option<usize> {
        self.state.borrow().list.position_of(item)
    }
    pub fn contains(&self, item: &T) -> bool {
        self.position_of(item).is_some()
    }

    pub fn push(&mut self, item: T) {
        self.with(|l| l.push(item))
    }
    pub fn insert(&mut self, index: usize, item: T) {
        self.with(|l| l.insert(index, item))
    }
    pub fn add_range(&mut self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        self.with(|l| l.add_range(items))
    }
    pub fn insert_range(&mut self, index: usize, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        self.with(|l| l.insert_range(index, items))
    }
    pub fn remove_at(&mut self, index: usize) -> T {
        self.with(|l| l.remove_at(index))
    }
    pub fn remove_range(&mut self, index: usize, count: usize) {
        self.with(|l| l.remove_range(index, count))
    }
    pub fn remove(&mut self, item: &T) -> bool {
        self.with(|l| l.remove(item))
    }
    pub fn remove_many(&mut self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        self.with(|l| l.remove_many(items))
    }
    pub fn set(&mut self, index: usize, item: T) -> T {
        self.with(|l| l.set(index, item))
    }
    pub fn replace(&mut self, previous: &T, item: T) -> bool {
        self.with(|l| l.replace(previous, item))
    }
    pub fn move_item(&mut self, old_index: usize, new_index: usize) {
        self.with(|l| l.move_item(old_index, new_index))
    }
    pub fn refresh_at(&mut self, index: usize) {
        self.with(|l| l.refresh_at(index))
    }
    pub fn clear(&mut self) {
        self.with(|l| l.clear())
    }

    /// Replays `changes` onto the items.
    pub fn apply(&mut self, changes: &ChangeSet<T>) -> Result<()> {
        self.with(|l| changes.apply_to(l))
    }
}
impl<T: ListItem> Drop for EditGuard<'_, T> {
    fn drop(&mut self) {
        self.list.end_edit(&self.state)
    }
}

impl<T: ListItem> RawSourceList<T> {
    fn end_edit(&self, state: &RefCell<ListState<T>>) {
        let (changes, base) = {
            let mut s = state.borrow_mut();
            s.depth -= 1;
            if s.depth > 0 {
                return;
            }
            let base = s.preview_base.take();
            if s.is_disposed {
                return;
            }
            (s.list.capture_changes(), base)
        };
        if changes.is_empty() {
            return;
        }
        tracing::debug!(
            changes = changes.len(),
            total = changes.total_changes(),
            "source list flush"
        );
        if let Some(mut base) = base {
            state.borrow_mut().list.swap_items(&mut base);
            self.previews.on_next(changes.clone());
            state.borrow_mut().list.swap_items(&mut base);
        }
        self.changes.on_next(changes);
    }

    fn subscribe_changes(&self, observer: Arc<dyn Observer<ChangeSet<T>>>) -> Subscription {
        let downstream = Downstream::new(observer);
        let state = self.state.lock();
        let items = state.borrow().list.as_slice().to_vec();
        if !items.is_empty() {
            downstream.push_next(ChangeSet::from(vec![Change::AddRange {
                items,
                index: Some(0),
            }]));
        }
        let subscription = self.changes.subscribe_dyn(downstream.as_observer());
        drop(state);
        downstream.drain();
        subscription
    }

    fn subscribe_count(&self, observer: Arc<dyn Observer<usize>>) -> Subscription {
        let downstream = Downstream::new(observer);
        let state = self.state.lock();
        let count = state.borrow().list.len();
        downstream.push_next(count);
        let last = Mutex::new(count);
        let out = downstream.clone();
        let subscription = self.changes.as_observable().subscribe_raw(
            move |changes: &ChangeSet<T>| {
                {
                    let mut last = last.lock();
                    let count = (*last + changes.adds()).saturating_sub(changes.removes());
                    if count != *last {
                        *last = count;
                        out.push_next(count);
                    }
                }
                out.drain();
            },
            downstream.as_observer(),
        );
        drop(state);
        downstream.drain();
        subscription
    }

    fn close(&self, error: Option<Error>) {
        let seed = {
            let state = self.state.lock();
            let mut s = state.borrow_mut();
            if s.is_disposed {
                return;
            }
            s.is_disposed = true;
            s.list = TrackedList::new();
            s.preview_base = None;
            s.seed.take()
        };
        drop(seed);
        match error {
            Some(e) => {
                tracing::error!("source list closed by an upstream error: {e}");
                self.changes.on_error(e);
            }
            None => {
                tracing::debug!("source list disposed");
                self.changes.on_completed();
            }
        }
        self.previews.on_completed();
    }
}
impl<T: ListItem> Drop for RawSourceList<T> {
    fn drop(&mut self) {
        self.changes.on_completed();
        self.previews.on_completed();
    }
}

/// A handle that does not keep the list alive.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub(crate) struct WeakSourceList<T: ListItem>(Weak<RawSourceList<T>>);

impl<T: ListItem> WeakSourceList<T> {
    pub fn upgrade(&self) -> Option<SourceList<T>> {
        self.0.upgrade().map(SourceList)
    }
}

struct SeedObserver<T: ListItem>(Weak<RawSourceList<T>>);

impl<T: ListItem> Observer<ChangeSet<T>> for SeedObserver<T> {
    fn on_next(&self, changes: &ChangeSet<T>) {
        let Some(list) = self.0.upgrade() else {
            return;
        };
        let list = SourceList(list);
        if let Ok(Err(e)) = list.edit(|l| l.apply(changes)) {
            list.0.close(Some(e));
        }
    }
    fn on_error(&self, error: &Error) {
        if let Some(list) = self.0.upgrade() {
            list.close(Some(error.clone()));
        }
    }
    fn on_completed(&self) {}
}

fn retain_matching<T: Clone>(changes: &ChangeSet<T>, predicate: &dyn Fn(&T) -> bool) -> ChangeSet<T> {
    let mut out = ChangeSet::new();
    for change in changes {
        match change {
            Change::Replace {
                current, previous, ..
            } => {
                if predicate(current) || predicate(previous) {
                    out.push(change.clone());
                }
            }
            Change::AddRange { items, index } => {
                if let Some((items, index)) = retain_range(items, *index, predicate) {
                    out.push(Change::AddRange { items, index });
                }
            }
            Change::RemoveRange { items, index } => {
                if let Some((items, index)) = retain_range(items, *index, predicate) {
                    out.push(Change::RemoveRange { items, index });
                }
            }
            Change::Clear { items } => match retain_range(items, Some(0), predicate) {
                Some((items, Some(_))) => out.push(Change::Clear { items }),
                Some((items, None)) => out.push(Change::RemoveRange { items, index: None }),
                None => {}
            },
            _ => {
                if change.items().all(|x| predicate(x)) {
                    out.push(change.clone());
                }
            }
        }
    }
    out
}

/// Keeps the matching items of a range. The index is kept only when every
/// item matches.
fn retain_range<T: Clone>(
    items: &[T],
    index: Option<usize>,
    predicate: &dyn Fn(&T) -> bool,
) -> Option<(Vec<T>, Option<usize>)> {
    let matched: Vec<T> = items.iter().filter(|x| predicate(x)).cloned().collect();
    if matched.is_empty() {
        return None;
    }
    let index = if matched.len() == items.len() {
        index
    } else {
        None
    };
    Some((matched, index))
}

use std::{collections::HashMap, fmt, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{
    observable::Downstream,
    ops::{check_index, locate, push_changes, push_error},
    Change, ChangeSet, Error, ListItem, Observable, ObservableList, Result, SourceList,
    Subscription, TrackedList,
};


/// Items sharing a group key, produced by
/// [`group_on`](Observable::group_on).
///
/// Members are kept in the order they joined the group.
#[derive(Clone)]
pub struct Group<T: ListItem, K> {
    key: K,
    list: SourceList<T>,
}

impl<T: ListItem, K> Group<T, K> {
    pub fn key(&self) -> &K {
        &self.key
    }
    pub fn list(&self) -> ObservableList<T> {
        self.list.as_observable_list()
    }
    pub fn connect(&self) -> Observable<ChangeSet<T>> {
        self.list.connect()
    }
    pub fn count(&self) -> usize {
        self.list.count()
    }
    pub fn items(&self) -> Vec<T> {
        self.list.items()
    }
}
impl<T: ListItem, K: PartialEq> PartialEq for Group<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.list == other.list
    }
}
impl<T: ListItem + fmt::Debug, K: fmt::Debug> fmt::Debug for Group<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("key", &self.key)
            .field("items", &self.list)
            .finish()
    }
}

enum MemberEdit<T> {
    Add(T),
    Remove(T),
    Replace(T, T),
    Refresh(T),
}

struct GroupData<T: ListItem, K> {
    group: Group<T, K>,
    count: usize,
}

/// Member edits of one change set, applied after the state lock is released.
struct PendingEdits<T: ListItem> {
    lists: Vec<(SourceList<T>, Vec<MemberEdit<T>>)>,
    removed: Vec<SourceList<T>>,
}

impl<T: ListItem> PendingEdits<T> {
    fn apply(self) {
        for (list, edits) in self.lists {
            let _ = list.edit(|l| {
                for edit in edits {
                    match edit {
                        MemberEdit::Add(item) => l.push(item),
                        MemberEdit::Remove(item) => {
                            l.remove(&item);
                        }
                        MemberEdit::Replace(previous, current) => {
                            l.replace(&previous, current);
                        }
                        MemberEdit::Refresh(item) => {
                            if let Some(index) = l.position_of(&item) {
                                l.refresh_at(index);
                            }
                        }
                    }
                }
            });
        }
        for list in self.removed {
            list.dispose();
        }
    }
}

type KeySelector<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

struct GroupState<T: ListItem, K> {
    all: Vec<(T, K)>,
    groups: HashMap<K, GroupData<T, K>>,
    result: TrackedList<Group<T, K>>,
    edits: Vec<(K, Vec<MemberEdit<T>>)>,
}

impl<T, K> GroupState<T, K>
where
    T: ListItem,
    K: ListItem + Eq + Hash,
{
    fn new() -> Self {
        Self {
            all: Vec::new(),
            groups: HashMap::new(),
            result: TrackedList::new(),
            edits: Vec::new(),
        }
    }

    fn position(&self, index: Option<usize>, item: &T) -> Result<usize> {
        match index {
            Some(index) => {
                check_index(index, self.all.len())?;
                Ok(index)
            }
            None => locate(self.all.iter().map(|(x, _)| x), item, "group_on"),
        }
    }

    fn edit(&mut self, key: &K, edit: MemberEdit<T>) {
        match self.edits.iter_mut().find(|(k, _)| k == key) {
            Some((_, edits)) => edits.push(edit),
            None => self.edits.push((key.clone(), vec![edit])),
        }
    }

    fn join(&mut self, key: K, item: T) {
        let data = self.groups.entry(key.clone()).or_insert_with(|| {
            tracing::debug!("group created");
            GroupData {
                group: Group {
                    key: key.clone(),
                    list: SourceList::new(),
                },
                count: 0,
            }
        });
        if data.count == 0 && !self.result.contains(&data.group) {
            self.result.push(data.group.clone());
        }
        data.count += 1;
        self.edit(&key, MemberEdit::Add(item));
    }

    fn leave(&mut self, key: &K, item: T) -> Result<()> {
        let Some(data) = self.groups.get_mut(key) else {
            debug_assert!(false, "item left a group that does not exist");
            return Err(Error::ItemNotFound {
                operation: "group_on",
            });
        };
        data.count -= 1;
        self.edit(key, MemberEdit::Remove(item));
        Ok(())
    }

    /// Moves `item` to the group of `key` if its cached key differs.
    fn rekey(&mut self, index: usize, key: K, edit: MemberEdit<T>, item: T) -> Result<()> {
        let (previous, old_key) = self.all[index].clone();
        if old_key == key {
            self.edit(&key, edit);
        } else {
            self.leave(&old_key, previous)?;
            self.join(key.clone(), item.clone());
        }
        self.all[index] = (item, key);
        Ok(())
    }

    fn apply(&mut self, changes: &ChangeSet<T>, f: &dyn Fn(&T) -> K) -> Result<()> {
        for change in changes {
            match change {
                Change::Add { item, index } => {
                    let index = index.unwrap_or(self.all.len());
                    check_index(index, self.all.len() + 1)?;
                    let key = f(item);
                    self.all.insert(index, (item.clone(), key.clone()));
                    self.join(key, item.clone());
                }
                Change::AddRange { items, index } => {
                    let index = index.unwrap_or(self.all.len());
                    check_index(index, self.all.len() + 1)?;
                    let entries: Vec<(T, K)> = items.iter().map(|x| (x.clone(), f(x))).collect();
                    self.all.splice(index..index, entries.iter().cloned());
                    for (item, key) in entries {
                        self.join(key, item);
                    }
                }
                Change::Replace {
                    current,
                    previous,
                    index,
                } => {
                    let index = self.position(*index, previous)?;
                    let edit = MemberEdit::Replace(previous.clone(), current.clone());
                    self.rekey(index, f(current), edit, current.clone())?;
                }
                Change::Refresh { item, index } => {
                    check_index(*index, self.all.len())?;
                    self.rekey(*index, f(item), MemberEdit::Refresh(item.clone()), item.clone())?;
                }
                Change::Remove { item, index } => {
                    let index = self.position(*index, item)?;
                    let (item, key) = self.all.remove(index);
                    self.leave(&key, item)?;
                }
                Change::RemoveRange { items, index } => match *index {
                    Some(index) => {
                        check_index(index + items.len(), self.all.len() + 1)?;
                        let removed: Vec<(T, K)> = self.all.drain(index..index + items.len()).collect();
                        for (item, key) in removed {
                            self.leave(&key, item)?;
                        }
                    }
                    None => {
                        for item in items {
                            let index = self.position(None, item)?;
                            let (item, key) = self.all.remove(index);
                            self.leave(&key, item)?;
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
                    for (item, key) in std::mem::take(&mut self.all) {
                        self.leave(&key, item)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Recomputes the key of every item.
    fn regroup(&mut self, f: &dyn Fn(&T) -> K) -> Result<()> {
        tracing::debug!(items = self.all.len(), "regroup");
        for index in 0..self.all.len() {
            let item = self.all[index].0.clone();
            let key = f(&item);
            if key != self.all[index].1 {
                self.rekey(index, key, MemberEdit::Refresh(item.clone()), item)?;
            }
        }
        Ok(())
    }

    /// Takes the member edits and drops the groups left empty.
    fn finish(&mut self) -> PendingEdits<T> {
        let mut lists = Vec::new();
        for (key, edits) in std::mem::take(&mut self.edits) {
            if let Some(data) = self.groups.get(&key) {
                lists.push((data.group.list.clone(), edits));
            }
        }
        let empty: Vec<K> = self
            .groups
            .iter()
            .filter(|(_, data)| data.count == 0)
            .map(|(key, _)| key.clone())
            .collect();
        let mut removed = Vec::new();
        for key in empty {
            if let Some(data) = self.groups.remove(&key) {
                tracing::debug!("group destroyed");
                self.result.remove(&data.group);
                removed.push(data.group.list);
            }
        }
        PendingEdits { lists, removed }
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Groups the items by the key returned by `key_selector`.
    ///
    /// Each group holds a list of its members and is removed once it has no
    /// members. The key of an item is computed when the item is added,
    /// replaced or refreshed. A value from `regrouper` recomputes the key of
    /// every item, for keys that change without the item changing.
    pub fn group_on<K>(
        &self,
        key_selector: impl Fn(&T) -> K + Send + Sync + 'static,
        regrouper: Option<&Observable<()>>,
    ) -> Observable<ChangeSet<Group<T, K>>>
    where
        K: ListItem + Eq + Hash,
    {
        let source = self.clone();
        let regrouper = regrouper.cloned();
        let f: KeySelector<T, K> = Arc::new(key_selector);
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Arc::new(Mutex::new(GroupState::new()));

            let regroup_subscription = match &regrouper {
                Some(regrouper) => {
                    let s = state.clone();
                    let f = f.clone();
                    let out = downstream.clone();
                    let error_out = downstream.clone();
                    regrouper.subscribe_all(
                        move |_| {
                            let pending = {
                                let mut s = s.lock();
                                let r = s.regroup(&*f);
                                let pending = s.finish();
                                let r = r.map(|_| s.result.capture_changes());
                                push_changes(&out, r, "group_on");
                                pending
                            };
                            pending.apply();
                            out.drain();
                        },
                        move |e| {
                            push_error(&error_out, e.clone(), "group_on");
                            error_out.drain();
                        },
                        || {},
                    )
                }
                None => Subscription::empty(),
            };

            let f = f.clone();
            let out = downstream.clone();
            let source_subscription = source.subscribe_raw(
                move |changes: &ChangeSet<T>| {
                    let pending = {
                        let mut s = state.lock();
                        let r = s.apply(changes, &*f);
                        let pending = s.finish();
                        let r = r.map(|_| s.result.capture_changes());
                        push_changes(&out, r, "group_on");
                        pending
                    };
                    pending.apply();
                    out.drain();
                },
                downstream.as_observer(),
            );
            Subscription::merge([regroup_subscription, source_subscription])
        })
    }
}

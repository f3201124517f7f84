use std::{
    collections::BTreeMap,
    future::Future,
    sync::{Arc, Weak},
};

use futures::{
    future::join_all,
    task::{Spawn, SpawnExt},
};
use parking_lot::Mutex;

use crate::{
    observable::{Downstream, Notification},
    ops::{
        push_changes, push_error,
        transform::{transform_inputs, TransformState},
    },
    ChangeSet, Error, ListItem, Observable, Observer, Subscription, TransformOptions,
};

#[cfg(test)]
mod tests;

struct AsyncState<T, U> {
    transform: TransformState<T, U>,
    next_submit: u64,
    next_apply: u64,
    ready: BTreeMap<u64, (ChangeSet<T>, Vec<U>)>,
    is_upstream_completed: bool,
}

impl<T: ListItem, U: ListItem> AsyncState<T, U> {
    fn new() -> Self {
        Self {
            transform: TransformState::new(),
            next_submit: 0,
            next_apply: 0,
            ready: BTreeMap::new(),
            is_upstream_completed: false,
        }
    }

    fn is_idle(&self) -> bool {
        self.next_apply == self.next_submit
    }

    /// Applies every completed change set whose predecessors have all been applied.
    fn flush(&mut self, out: &Downstream<ChangeSet<U>>, options: TransformOptions) {
        while let Some((changes, values)) = self.ready.remove(&self.next_apply) {
            self.next_apply += 1;
            let mut values = values.into_iter();
            let r = self.transform.apply(
                &changes,
                &mut |_: &T| values.next().expect("one projection per transformed item"),
                options,
            );
            push_changes(out, r, "transform_async");
        }
        if self.is_upstream_completed && self.is_idle() {
            out.push(Notification::Completed);
        }
    }
}

struct AsyncObserver<T, U: 'static, F, S> {
    state: Arc<Mutex<AsyncState<T, U>>>,
    downstream: Arc<Downstream<ChangeSet<U>>>,
    f: Arc<F>,
    spawner: Arc<S>,
    options: TransformOptions,
}

impl<T, U, F, Fut, S> Observer<ChangeSet<T>> for AsyncObserver<T, U, F, S>
where
    T: ListItem,
    U: ListItem,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = U> + Send + 'static,
    S: Spawn + Send + Sync + 'static,
{
    fn on_next(&self, changes: &ChangeSet<T>) {
        let seq = {
            let mut s = self.state.lock();
            let seq = s.next_submit;
            s.next_submit += 1;
            seq
        };
        let futures: Vec<Fut> = transform_inputs(changes, self.options)
            .into_iter()
            .map(|x| (self.f)(x))
            .collect();
        let changes = changes.clone();
        let state: Weak<Mutex<AsyncState<T, U>>> = Arc::downgrade(&self.state);
        let out = self.downstream.clone();
        let options = self.options;
        let task = async move {
            let values = join_all(futures).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            {
                let mut s = state.lock();
                s.ready.insert(seq, (changes, values));
                s.flush(&out, options);
            }
            out.drain();
        };
        if let Err(e) = self.spawner.spawn(task) {
            push_error(&self.downstream, Error::from_source(e), "transform_async");
            self.downstream.drain();
        }
    }
    fn on_error(&self, error: &Error) {
        self.downstream.error(error.clone());
    }
    fn on_completed(&self) {
        {
            let mut s = self.state.lock();
            s.is_upstream_completed = true;
            s.flush(&self.downstream, self.options);
        }
        self.downstream.drain();
    }
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Projects every item with the asynchronous function `f`, running the
    /// projections of each change set as one task on `spawner`.
    ///
    /// Tasks may finish in any order. A change set is emitted once its own
    /// task and the tasks of every earlier change set have finished, so the
    /// emitted indexes always refer to the projected list as it is.
    /// Completion of the source is forwarded after the last pending task.
    pub fn transform_async<U, Fut>(
        &self,
        f: impl Fn(T) -> Fut + Send + Sync + 'static,
        spawner: impl Spawn + Send + Sync + 'static,
        options: TransformOptions,
    ) -> Observable<ChangeSet<U>>
    where
        U: ListItem,
        Fut: Future<Output = U> + Send + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        let spawner = Arc::new(spawner);
        Observable::new(move |observer| {
            let state = Arc::new(Mutex::new(AsyncState::new()));
            let subscription = source.subscribe_with(AsyncObserver {
                state: state.clone(),
                downstream: Downstream::new(observer),
                f: f.clone(),
                spawner: spawner.clone(),
                options,
            });
            subscription.with(Subscription::from_arc(state))
        })
    }
}

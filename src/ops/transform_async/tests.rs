use std::sync::Arc;

use futures::{
    executor::block_on,
    future::FutureObj,
    task::{Spawn, SpawnError},
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use crate::{
    Change, ChangeSet, ChangeSetAggregator, Error, SourceList, Subject, TransformOptions,
};

/// Holds spawned tasks until the test runs them.
#[derive(Clone, Default)]
struct QueueSpawner(Arc<Mutex<Vec<FutureObj<'static, ()>>>>);

impl Spawn for QueueSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.0.lock().push(future);
        Ok(())
    }
}
impl QueueSpawner {
    fn len(&self) -> usize {
        self.0.lock().len()
    }
    fn run_oldest_first(&self) {
        loop {
            let task = {
                let mut q = self.0.lock();
                if q.is_empty() {
                    None
                } else {
                    Some(q.remove(0))
                }
            };
            let Some(task) = task else {
                return;
            };
            block_on(task);
        }
    }
    fn run_newest_first(&self) {
        loop {
            let task = self.0.lock().pop();
            let Some(task) = task else {
                return;
            };
            block_on(task);
        }
    }
}

struct ShutdownSpawner;

impl Spawn for ShutdownSpawner {
    fn spawn_obj(&self, _: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        Err(SpawnError::shutdown())
    }
}

#[test]
fn projects_when_tasks_finish() {
    let spawner = QueueSpawner::default();
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_async(
        |x| async move { x * 10 },
        spawner.clone(),
        TransformOptions::new(),
    ));
    assert_eq!(spawner.len(), 1);
    assert_eq!(agg.message_count(), 0);
    spawner.run_oldest_first();
    assert_eq!(agg.data(), vec![10, 20, 30]);
}

#[test]
fn out_of_order_tasks_are_applied_in_order() {
    let spawner = QueueSpawner::default();
    let list = SourceList::from_vec(vec![1]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_async(
        |x| async move { x * 10 },
        spawner.clone(),
        TransformOptions::new(),
    ));
    list.add(2).unwrap();
    list.insert(0, 0).unwrap();
    assert_eq!(spawner.len(), 3);
    spawner.run_newest_first();
    assert_eq!(agg.data(), vec![0, 10, 20]);
    assert_eq!(agg.message_count(), 3);
    assert_eq!(
        agg.messages()[2],
        ChangeSet::from(vec![Change::Add {
            item: 0,
            index: Some(0)
        }])
    );
}

#[test]
fn removals_wait_for_earlier_tasks() {
    let spawner = QueueSpawner::default();
    let list = SourceList::from_vec(vec![1, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_async(
        |x| async move { x + 100 },
        spawner.clone(),
        TransformOptions::new(),
    ));
    list.remove_at(0).unwrap();
    spawner.run_newest_first();
    assert_eq!(agg.data(), vec![102]);
    assert!(agg.error().is_none());
}

#[test]
fn completion_waits_for_pending_tasks() {
    let spawner = QueueSpawner::default();
    let source = Subject::<ChangeSet<i32>>::new();
    let agg = ChangeSetAggregator::new(&source.as_observable().transform_async(
        |x| async move { x * 2 },
        spawner.clone(),
        TransformOptions::new(),
    ));
    source.on_next(ChangeSet::from(vec![Change::Add {
        item: 4,
        index: None,
    }]));
    source.on_completed();
    assert!(!agg.is_completed());
    spawner.run_oldest_first();
    assert_eq!(agg.data(), vec![8]);
    assert!(agg.is_completed());
}

#[test]
fn spawn_failure_is_reported() {
    let list = SourceList::from_vec(vec![1]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_async(
        |x| async move { x },
        ShutdownSpawner,
        TransformOptions::new(),
    ));
    assert!(matches!(agg.error(), Some(Error::Source(_))));
}

#[test]
fn tasks_after_unsubscribe_are_ignored() {
    let spawner = QueueSpawner::default();
    let list = SourceList::from_vec(vec![1]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_async(
        |x| async move { x },
        spawner.clone(),
        TransformOptions::new(),
    ));
    drop(agg);
    spawner.run_oldest_first();
    assert_eq!(spawner.len(), 0);
}

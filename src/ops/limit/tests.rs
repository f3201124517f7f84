use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use crate::{Change, ChangeSetAggregator, SourceList, TestScheduler};

#[test]
fn keeps_the_newest_items() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().limit_size_to(2));
    assert_eq!(agg.data(), vec![2, 3]);
    list.add(4).unwrap();
    assert_eq!(agg.data(), vec![3, 4]);
    list.insert(0, 5).unwrap();
    assert_eq!(agg.data(), vec![5, 4]);
}

#[test]
fn removal_brings_back_a_hidden_item() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().limit_size_to(2));
    list.remove(&3).unwrap();
    assert_eq!(agg.data(), vec![1, 2]);
}

#[test]
fn replace_keeps_the_insertion_order() {
    let list = SourceList::from_vec(vec![1, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().limit_size_to(2));
    list.replace(&1, 10).unwrap();
    list.add(3).unwrap();
    assert_eq!(agg.data(), vec![2, 3]);
}

#[test]
fn updating_a_hidden_item_sends_nothing() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().limit_size_to(2));
    list.replace_at(0, 9).unwrap();
    list.refresh_at(0).unwrap();
    assert_eq!(agg.message_count(), 1);
    list.replace_at(2, 8).unwrap();
    assert_eq!(agg.message_count(), 2);
    assert_eq!(
        agg.last_message().unwrap().as_slice(),
        &[Change::Replace {
            current: 8,
            previous: 3,
            index: Some(1)
        }]
    );
    assert_eq!(agg.data(), vec![2, 8]);
}

#[test]
fn zero_limit_shows_nothing() {
    let list = SourceList::from_vec(vec![1, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().limit_size_to(0));
    list.add(3).unwrap();
    assert_eq!(agg.data(), Vec::<i32>::new());
    assert_eq!(agg.message_count(), 0);
}

#[test]
fn source_list_evicts_the_oldest_items() {
    let list = SourceList::from_vec(vec![1, 2]);
    let scheduler = TestScheduler::new();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let r = removed.clone();
    let _subscription = list
        .limit_size_to(3, Arc::new(scheduler.clone()))
        .subscribe(move |items: &Vec<i32>| r.lock().push(items.clone()));
    list.add_range([3, 4, 5]).unwrap();
    assert_eq!(list.count(), 5);
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(list.items(), vec![3, 4, 5]);
    assert_eq!(*removed.lock(), vec![vec![1, 2]]);
    assert_eq!(scheduler.pending_tasks(), 0);
}

#[test]
fn source_list_eviction_uses_insertion_order() {
    let list = SourceList::from_vec(vec![1]);
    let scheduler = TestScheduler::new();
    let _subscription = list
        .limit_size_to(2, Arc::new(scheduler.clone()))
        .subscribe(|_| {});
    list.insert(0, 2).unwrap();
    list.insert(0, 3).unwrap();
    scheduler.advance_by(Duration::ZERO);
    assert_eq!(list.items(), vec![3, 2]);
}

use std::sync::{
    atomic::{AtomicI32, Ordering as AtomicOrdering},
    Arc,
};

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    Change, ChangeSet, ChangeSetAggregator, Comparer, ListChangeReason, SortOptions, SourceList,
    Subject,
};

fn options(use_binary_search: bool) -> SortOptions {
    SortOptions {
        use_binary_search,
        ..SortOptions::new()
    }
}

fn reasons<T>(changes: &ChangeSet<T>) -> Vec<ListChangeReason> {
    changes.iter().map(|c| c.reason()).collect()
}

#[test]
fn initial_items_are_one_sorted_range() {
    let list = SourceList::from_vec(vec![3, 1, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().sort(|a: &i32, b: &i32| a.cmp(b)));
    assert_eq!(
        agg.messages(),
        vec![ChangeSet::from(vec![Change::AddRange {
            items: vec![1, 2, 3],
            index: Some(0)
        }])]
    );
}

#[rstest]
#[case(false)]
#[case(true)]
fn edits_keep_the_result_sorted(#[case] use_binary_search: bool) {
    let list = SourceList::from_vec(vec![5, 1, 9]);
    let agg = ChangeSetAggregator::new(
        &list
            .connect()
            .sort_with(|a: &i32, b: &i32| a.cmp(b), options(use_binary_search)),
    );
    list.add(4).unwrap();
    assert_eq!(
        agg.last_message().unwrap()[0],
        Change::Add {
            item: 4,
            index: Some(1)
        }
    );
    list.add_range(vec![7, 0]).unwrap();
    assert_eq!(agg.data(), vec![0, 1, 4, 5, 7, 9]);
    list.remove(&5).unwrap();
    list.move_item(0, 3).unwrap();
    list.replace(&9, 2).unwrap();
    assert_eq!(agg.data(), vec![0, 1, 2, 4, 7]);
    list.clear().unwrap();
    assert_eq!(agg.data(), Vec::<i32>::new());
    assert!(agg.error().is_none());
}

#[test]
fn replace_reports_replace_then_move() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().sort(|a: &i32, b: &i32| a.cmp(b)));
    list.replace(&1, 10).unwrap();
    assert_eq!(
        agg.last_message().unwrap(),
        ChangeSet::from(vec![
            Change::Replace {
                current: 10,
                previous: 1,
                index: Some(0)
            },
            Change::Moved {
                item: 10,
                current_index: 2,
                previous_index: 0
            },
        ])
    );
    assert_eq!(agg.data(), vec![2, 3, 10]);
}

#[test]
fn upstream_moves_are_ignored() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().sort(|a: &i32, b: &i32| a.cmp(b)));
    list.move_item(0, 2).unwrap();
    assert_eq!(agg.message_count(), 1);
}

#[test]
fn large_change_sets_reset() {
    let list = SourceList::from_vec(vec![2]);
    let agg = ChangeSetAggregator::new(&list.connect().sort_with(
        |a: &i32, b: &i32| a.cmp(b),
        SortOptions {
            reset_threshold: 2,
            ..SortOptions::new()
        },
    ));
    list.add_range(vec![3, 1, 0]).unwrap();
    assert_eq!(
        reasons(&agg.last_message().unwrap()),
        vec![ListChangeReason::Clear, ListChangeReason::AddRange]
    );
    assert_eq!(agg.data(), vec![0, 1, 2, 3]);
}

#[test]
fn comparer_changes_resort() {
    let list = SourceList::from_vec(vec![2, 3, 1]);
    let comparers = Subject::<Comparer<i32>>::new();
    let agg = ChangeSetAggregator::new(&list.connect().sort_dynamic(
        &comparers.as_observable(),
        None,
        SortOptions::new(),
    ));
    assert_eq!(agg.message_count(), 0);
    comparers.on_next(Arc::new(|a: &i32, b: &i32| a.cmp(b)));
    assert_eq!(agg.data(), vec![1, 2, 3]);
    comparers.on_next(Arc::new(|a: &i32, b: &i32| b.cmp(a)));
    assert_eq!(agg.data(), vec![3, 2, 1]);
    assert!(reasons(&agg.last_message().unwrap())
        .iter()
        .all(|r| *r == ListChangeReason::Moved));
    list.add(0).unwrap();
    assert_eq!(agg.data(), vec![3, 2, 1, 0]);
}

#[test]
fn resort_resets_only_above_the_threshold() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let comparers = Subject::<Comparer<i32>>::new();
    let agg = ChangeSetAggregator::new(&list.connect().sort_dynamic(
        &comparers.as_observable(),
        None,
        SortOptions {
            reset_threshold: 1,
            ..SortOptions::new()
        },
    ));
    comparers.on_next(Arc::new(|a: &i32, b: &i32| a.cmp(b)));
    comparers.on_next(Arc::new(|a: &i32, b: &i32| (a % 3).cmp(&(b % 3))));
    assert_eq!(agg.data(), vec![3, 1, 2]);
    assert_eq!(
        reasons(&agg.last_message().unwrap()),
        vec![ListChangeReason::Moved]
    );
    comparers.on_next(Arc::new(|a: &i32, b: &i32| a.cmp(b)));
    assert_eq!(agg.data(), vec![1, 2, 3]);
    assert_eq!(
        reasons(&agg.last_message().unwrap()),
        vec![ListChangeReason::Clear, ListChangeReason::AddRange]
    );
}

#[derive(Clone, Debug)]
struct Score(Arc<AtomicI32>);

impl Score {
    fn new(value: i32) -> Self {
        Self(Arc::new(AtomicI32::new(value)))
    }
    fn get(&self) -> i32 {
        self.0.load(AtomicOrdering::SeqCst)
    }
    fn set(&self, value: i32) {
        self.0.store(value, AtomicOrdering::SeqCst)
    }
}
impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn by_score() -> Comparer<Score> {
    Arc::new(|a: &Score, b: &Score| a.get().cmp(&b.get()))
}

#[test]
fn resort_signal_moves_mutated_items() {
    let items = vec![Score::new(1), Score::new(2), Score::new(3)];
    let list = SourceList::from_vec(items.clone());
    let comparers = Subject::new();
    let resort = Subject::new();
    let agg = ChangeSetAggregator::new(&list.connect().sort_dynamic(
        &comparers.as_observable(),
        Some(&resort.as_observable()),
        SortOptions::new(),
    ));
    comparers.on_next(by_score());
    items[0].set(10);
    items[2].set(0);
    resort.on_next(());
    let scores: Vec<i32> = agg.data().iter().map(|s| s.get()).collect();
    assert_eq!(scores, vec![0, 2, 10]);
}

#[test]
fn refresh_moves_the_refreshed_item() {
    let items = vec![Score::new(1), Score::new(2), Score::new(3)];
    let list = SourceList::from_vec(items.clone());
    let comparer = by_score();
    let agg =
        ChangeSetAggregator::new(&list.connect().sort(move |a: &Score, b: &Score| comparer(a, b)));
    items[0].set(5);
    list.refresh_at(0).unwrap();
    assert_eq!(
        agg.last_message().unwrap()[0],
        Change::Moved {
            item: items[0].clone(),
            current_index: 2,
            previous_index: 0
        }
    );
    list.refresh_at(1).unwrap();
    assert!(matches!(
        agg.last_message().unwrap()[0],
        Change::Refresh { index: 0, .. }
    ));
}

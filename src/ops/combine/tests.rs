use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::{
    Change, ChangeSet, ChangeSetAggregator, CombineOperator, Error, Observable, SourceList,
};

fn sorted(mut items: Vec<i32>) -> Vec<i32> {
    items.sort();
    items
}

#[rstest]
#[case(CombineOperator::And, vec![3])]
#[case(CombineOperator::Or, vec![1, 2, 3, 4, 5])]
#[case(CombineOperator::Xor, vec![1, 2, 4, 5])]
#[case(CombineOperator::Except, vec![1, 2])]
fn static_sources(#[case] operator: CombineOperator, #[case] expected: Vec<i32>) {
    let a = SourceList::from_vec(vec![1, 2, 3]);
    let b = SourceList::from_vec(vec![3, 4]);
    let c = SourceList::from_vec(vec![3, 5]);
    let agg = ChangeSetAggregator::new(&Observable::combine(
        operator,
        [a.connect(), b.connect(), c.connect()],
    ));
    assert_eq!(sorted(agg.data()), expected);
}

#[test]
fn and_follows_edits() {
    let a = SourceList::from_vec(vec![1, 2]);
    let b = SourceList::new();
    let agg = ChangeSetAggregator::new(&a.connect().and(&[b.connect()]));
    assert_eq!(agg.data(), Vec::<i32>::new());
    b.add(2).unwrap();
    assert_eq!(agg.data(), vec![2]);
    b.add(2).unwrap();
    b.remove(&2).unwrap();
    assert_eq!(agg.data(), vec![2]);
    a.remove(&2).unwrap();
    assert_eq!(agg.data(), Vec::<i32>::new());
}

#[test]
fn or_keeps_one_copy() {
    let a = SourceList::from_vec(vec![1]);
    let b = SourceList::from_vec(vec![1]);
    let agg = ChangeSetAggregator::new(&a.connect().or(&[b.connect()]));
    assert_eq!(agg.data(), vec![1]);
    a.clear().unwrap();
    assert_eq!(agg.data(), vec![1]);
    b.replace(&1, 2).unwrap();
    assert_eq!(agg.data(), vec![2]);
}

#[test]
fn except_uses_the_first_source() {
    let a = SourceList::from_vec(vec![1, 2, 3]);
    let b = SourceList::new();
    let agg = ChangeSetAggregator::new(&a.connect().except(&[b.connect()]));
    b.add(2).unwrap();
    assert_eq!(agg.data(), vec![1, 3]);
    b.clear().unwrap();
    assert_eq!(sorted(agg.data()), vec![1, 2, 3]);
}

#[test]
fn xor_drops_shared_items() {
    let a = SourceList::from_vec(vec![1, 2]);
    let b = SourceList::from_vec(vec![2, 3]);
    let agg = ChangeSetAggregator::new(&a.connect().xor(&[b.connect()]));
    assert_eq!(sorted(agg.data()), vec![1, 3]);
}

#[test]
fn dynamic_sources() {
    let a = SourceList::from_vec(vec![1, 2]);
    let b = SourceList::from_vec(vec![2, 3]);
    let sources = SourceList::<Observable<ChangeSet<i32>>>::new();
    let agg = ChangeSetAggregator::new(&sources.as_observable_list().and());
    assert_eq!(agg.message_count(), 0);
    sources.add(a.connect()).unwrap();
    assert_eq!(agg.data(), vec![1, 2]);
    let b_stream = b.connect();
    sources.add(b_stream.clone()).unwrap();
    assert_eq!(agg.data(), vec![2]);
    sources.remove(&b_stream).unwrap();
    assert_eq!(sorted(agg.data()), vec![1, 2]);
    b.add(1).unwrap();
    assert_eq!(sorted(agg.data()), vec![1, 2]);
    sources.clear().unwrap();
    assert_eq!(agg.data(), Vec::<i32>::new());
}

#[test]
fn removed_source_is_unsubscribed() {
    let a = SourceList::from_vec(vec![1]);
    let sources = SourceList::from_vec(vec![a.connect()]);
    let agg = ChangeSetAggregator::new(&sources.as_observable_list().or());
    sources.clear().unwrap();
    let count = agg.message_count();
    a.add(5).unwrap();
    assert_eq!(agg.message_count(), count);
}

#[test]
fn source_errors_propagate() {
    let a = SourceList::from_vec(vec![1]);
    let broken = Observable::from_values([ChangeSet::from(vec![Change::Remove {
        item: 9,
        index: None,
    }])]);
    let agg = ChangeSetAggregator::new(&a.connect().or(&[broken]));
    assert!(matches!(agg.error(), Some(Error::ItemNotFound { .. })));

    let agg = ChangeSetAggregator::new(&a.connect().or(&[Observable::error(Error::Disposed)]));
    assert!(matches!(agg.error(), Some(Error::Disposed)));
}

#[test]
fn operator_display() {
    assert_eq!(CombineOperator::Except.to_string(), "except");
}

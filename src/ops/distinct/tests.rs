use pretty_assertions::assert_eq;

use crate::{Change, ChangeSetAggregator, SourceList};

#[test]
fn values_are_reference_counted() {
    let list = SourceList::from_vec(vec![1, 11, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().distinct_values(|x: &i32| x % 10));
    assert_eq!(agg.data(), vec![1, 2]);
    list.remove(&1).unwrap();
    assert_eq!(agg.message_count(), 1);
    list.remove(&11).unwrap();
    assert_eq!(agg.data(), vec![2]);
    assert_eq!(
        agg.last_message().unwrap()[0],
        Change::Remove {
            item: 1,
            index: Some(0)
        }
    );
}

#[test]
fn replace_swaps_values() {
    let list = SourceList::from_vec(vec![1, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().distinct_values(|x: &i32| x % 10));
    list.replace(&2, 13).unwrap();
    assert_eq!(agg.data(), vec![1, 3]);
    list.replace(&13, 23).unwrap();
    assert_eq!(agg.message_count(), 2);
}

#[test]
fn clear_removes_every_value() {
    let list = SourceList::from_vec(vec![1, 2, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().distinct_values(|x: &i32| *x));
    list.clear().unwrap();
    assert_eq!(agg.data(), Vec::<i32>::new());
    list.add(2).unwrap();
    assert_eq!(agg.data(), vec![2]);
}

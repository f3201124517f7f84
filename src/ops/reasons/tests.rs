use pretty_assertions::assert_eq;

use crate::{Change, ChangeSet, ChangeSetAggregator, Error, ListChangeReason, Observable, SourceList};

#[test]
fn empty_reason_sets_are_rejected() {
    let list = SourceList::<i32>::new();
    assert!(matches!(list.connect().where_reasons_are(&[]), Err(Error::NoReasons)));
    assert!(matches!(
        list.connect().where_reasons_are_not(&[]),
        Err(Error::NoReasons)
    ));
}

#[test]
fn keeps_matching_reasons_without_indexes() {
    let list = SourceList::from_vec(vec![1, 2]);
    let agg = ChangeSetAggregator::new(
        &list
            .connect()
            .where_reasons_are(&[ListChangeReason::Add])
            .unwrap(),
    );
    assert_eq!(agg.message_count(), 0);
    list.edit(|l| {
        l.push(3);
        l.remove_at(0);
    })
    .unwrap();
    assert_eq!(
        agg.last_message().unwrap().as_slice(),
        &[Change::Add {
            item: 3,
            index: None
        }]
    );
}

#[test]
fn whole_change_sets_keep_their_indexes() {
    let list = SourceList::new();
    let agg = ChangeSetAggregator::new(
        &list
            .connect()
            .where_reasons_are_not(&[ListChangeReason::Refresh])
            .unwrap(),
    );
    list.add(1).unwrap();
    list.refresh_at(0).unwrap();
    assert_eq!(agg.message_count(), 1);
    assert_eq!(
        agg.last_message().unwrap().as_slice(),
        &[Change::Add {
            item: 1,
            index: Some(0)
        }]
    );
}

#[test]
fn not_empty_drops_empty_change_sets() {
    let source = Observable::from_values([
        ChangeSet::new(),
        ChangeSet::from(vec![Change::Add {
            item: 1,
            index: None,
        }]),
        ChangeSet::new(),
    ]);
    let agg = ChangeSetAggregator::new(&source.not_empty());
    assert_eq!(agg.message_count(), 1);
    assert_eq!(agg.data(), vec![1]);
}

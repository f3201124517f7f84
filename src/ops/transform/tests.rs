use pretty_assertions::assert_eq;

use crate::{Change, ChangeSet, ChangeSetAggregator, Observable, SourceList, TransformOptions};

#[test]
fn transform_keeps_positions() {
    let list = SourceList::from_vec(vec![1, 2, 3]);
    let agg = ChangeSetAggregator::new(&list.connect().transform(|x| x * 10));
    list.insert(1, 5).unwrap();
    list.move_item(0, 3).unwrap();
    list.remove_range(0, 2).unwrap();
    list.replace(&3, 4).unwrap();
    assert_eq!(agg.data(), vec![40, 10]);
    assert_eq!(
        agg.messages()[1][0],
        Change::Add {
            item: 50,
            index: Some(1)
        }
    );
}

#[test]
fn transform_refresh() {
    let list = SourceList::from_vec(vec![1]);
    let agg = ChangeSetAggregator::new(&list.connect().transform(|x| x + 1));
    list.refresh_at(0).unwrap();
    assert_eq!(
        agg.last_message().unwrap()[0],
        Change::Refresh { item: 2, index: 0 }
    );

    let agg = ChangeSetAggregator::new(&list.connect().transform_with(
        |x| x + 1,
        TransformOptions {
            transform_on_refresh: true,
        },
    ));
    list.refresh_at(0).unwrap();
    assert_eq!(
        agg.last_message().unwrap()[0],
        Change::Replace {
            current: 2,
            previous: 2,
            index: Some(0)
        }
    );
}

#[test]
fn transform_without_indexes() {
    let source = Observable::from_values([
        ChangeSet::from(vec![Change::AddRange {
            items: vec!['a', 'b', 'c'],
            index: None,
        }]),
        ChangeSet::from(vec![
            Change::Remove {
                item: 'b',
                index: None,
            },
            Change::Replace {
                current: 'z',
                previous: 'c',
                index: None,
            },
        ]),
    ]);
    let agg = ChangeSetAggregator::new(&source.transform(|c| c.to_ascii_uppercase()));
    assert_eq!(agg.data(), vec!['A', 'Z']);
    assert!(agg.error().is_none());
}

#[test]
fn transform_many_flattens() {
    let list = SourceList::from_vec(vec![1, 2]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_many(|x| vec![*x; *x]));
    assert_eq!(agg.data(), vec![1, 2, 2]);
    list.insert(1, 3).unwrap();
    assert_eq!(agg.data(), vec![1, 3, 3, 3, 2, 2]);
    list.move_item(0, 2).unwrap();
    assert_eq!(agg.data(), vec![3, 3, 3, 2, 2, 1]);
    list.move_item(2, 0).unwrap();
    assert_eq!(agg.data(), vec![1, 3, 3, 3, 2, 2]);
    list.replace_at(1, 0).unwrap();
    assert_eq!(agg.data(), vec![1, 2, 2]);
    list.remove_at(0).unwrap();
    assert_eq!(agg.data(), vec![2, 2]);
    list.clear().unwrap();
    assert_eq!(agg.data(), Vec::<usize>::new());
}

#[test]
fn transform_many_refresh_keeps_children() {
    let list = SourceList::from_vec(vec![2]);
    let agg = ChangeSetAggregator::new(&list.connect().transform_many(|x| vec![*x; *x]));
    list.refresh_at(0).unwrap();
    let reasons: Vec<_> = agg
        .last_message()
        .unwrap()
        .iter()
        .map(|c| c.reason())
        .collect();
    assert_eq!(
        reasons,
        vec![
            crate::ListChangeReason::Refresh,
            crate::ListChangeReason::Refresh
        ]
    );
}

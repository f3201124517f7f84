use pretty_assertions::assert_eq;

use super::*;

#[test]
fn change_type_follows_reason() {
    let ranges: Vec<_> = ListChangeReason::ALL
        .into_iter()
        .filter(|r| r.change_type() == ChangeType::Range)
        .collect();
    assert_eq!(
        ranges,
        vec![
            ListChangeReason::AddRange,
            ListChangeReason::RemoveRange,
            ListChangeReason::Clear
        ]
    );
}

#[test]
fn items_of_item_change() {
    let c = Change::Replace {
        current: 2,
        previous: 1,
        index: Some(0),
    };
    assert_eq!(c.items().collect::<Vec<_>>(), vec![&2]);
    assert_eq!(c.len(), 1);
    assert_eq!(c.reason(), ListChangeReason::Replace);
}

#[test]
fn items_of_range_change() {
    let c = Change::RemoveRange {
        items: vec![1, 2, 3],
        index: Some(4),
    };
    assert_eq!(c.items().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(c.index(), Some(4));
    assert_eq!(c.change_type(), ChangeType::Range);
}

#[test]
fn map_keeps_indices() {
    let c = Change::Moved {
        item: 3,
        current_index: 0,
        previous_index: 2,
    };
    assert_eq!(
        c.map(|x| x.to_string()),
        Change::Moved {
            item: "3".to_string(),
            current_index: 0,
            previous_index: 2,
        }
    );
}

#[test]
fn clear_index_is_zero() {
    let c = Change::Clear { items: vec!['a'] };
    assert_eq!(c.index(), Some(0));
}

#[test]
fn reason_display() {
    assert_eq!(ListChangeReason::RemoveRange.to_string(), "RemoveRange");
    assert_eq!(ChangeType::Item.to_string(), "Item");
}

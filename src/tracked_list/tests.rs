use pretty_assertions::assert_eq;

use super::*;
use crate::ListChangeReason;

fn list(items: &[char]) -> TrackedList<char> {
    TrackedList::from(items.to_vec())
}

#[test]
fn from_vec_records_nothing() {
    let mut l = list(&['a', 'b']);
    assert!(!l.has_changes());
    assert!(l.capture_changes().is_empty());
}

#[test]
fn insert_and_remove_record_items() {
    let mut l = list(&['a', 'c']);
    l.insert(1, 'b');
    let removed = l.remove_at(0);
    assert_eq!(removed, 'a');
    assert_eq!(l.as_slice(), &['b', 'c']);
    assert_eq!(
        l.capture_changes().as_slice(),
        &[
            Change::Add {
                item: 'b',
                index: Some(1)
            },
            Change::Remove {
                item: 'a',
                index: Some(0)
            },
        ]
    );
}

#[test]
fn set_records_previous() {
    let mut l = list(&['a', 'b', 'c']);
    assert_eq!(l.set(1, 'x'), 'b');
    assert_eq!(
        l.capture_changes().as_slice(),
        &[Change::Replace {
            current: 'x',
            previous: 'b',
            index: Some(1)
        }]
    );
}

#[test]
fn move_is_atomic() {
    let mut l = list(&['a', 'b', 'c', 'd', 'e']);
    l.move_item(2, 0);
    assert_eq!(l.as_slice(), &['c', 'a', 'b', 'd', 'e']);
    let changes = l.capture_changes();
    assert_eq!(
        changes.as_slice(),
        &[Change::Moved {
            item: 'c',
            current_index: 0,
            previous_index: 2
        }]
    );
    assert_eq!(changes.moves(), 1);
    assert_eq!(changes.adds(), 0);
    assert_eq!(changes.removes(), 0);
}

#[test]
fn move_forward() {
    let mut l = list(&['a', 'b', 'c']);
    l.move_item(0, 2);
    assert_eq!(l.as_slice(), &['b', 'c', 'a']);
}

#[test]
fn move_onto_itself_records_nothing() {
    let mut l = list(&['a', 'b']);
    l.move_item(1, 1);
    assert!(!l.has_changes());
}

#[test]
#[should_panic]
fn move_out_of_bounds_panics() {
    let mut l = list(&['a']);
    l.move_item(0, 3);
}

#[test]
fn remove_range_records_one_change() {
    let mut l = list(&['a', 'b', 'c', 'd']);
    l.remove_range(1, 2);
    assert_eq!(l.as_slice(), &['a', 'd']);
    assert_eq!(
        l.capture_changes().as_slice(),
        &[Change::RemoveRange {
            items: vec!['b', 'c'],
            index: Some(1)
        }]
    );
}

#[test]
fn empty_ranges_record_nothing() {
    let mut l = list(&['a']);
    l.add_range(Vec::new());
    l.remove_range(1, 0);
    assert!(!l.has_changes());
    let mut e = TrackedList::<char>::new();
    e.clear();
    assert!(!e.has_changes());
}

#[test]
fn clear_records_forward_order() {
    let mut l = list(&['a', 'b', 'c']);
    l.clear();
    assert!(l.is_empty());
    assert_eq!(
        l.capture_changes().as_slice(),
        &[Change::Clear {
            items: vec!['a', 'b', 'c']
        }]
    );
}

#[test]
fn remove_many_records_reverse_order() {
    let mut l = list(&['a', 'b', 'c', 'd']);
    l.remove_many(['b', 'd', 'a']);
    assert_eq!(l.as_slice(), &['c']);
    let mut mirror = vec!['a', 'b', 'c', 'd'];
    let changes = l.capture_changes();
    let indexes: Vec<_> = changes.iter().map(|c| c.index()).collect();
    assert_eq!(indexes, vec![Some(3), Some(1), Some(0)]);
    changes.apply_to(&mut mirror).unwrap();
    assert_eq!(mirror, vec!['c']);
}

#[test]
fn remove_many_with_duplicates_removes_each() {
    let mut l = list(&['a', 'b', 'a', 'c']);
    l.remove_many(['a', 'a']);
    assert_eq!(l.as_slice(), &['b', 'c']);
    let mut mirror = vec!['a', 'b', 'a', 'c'];
    l.capture_changes().apply_to(&mut mirror).unwrap();
    assert_eq!(mirror, vec!['b', 'c']);
}

#[test]
fn refresh_records_index() {
    let mut l = list(&['a', 'b']);
    l.refresh_at(1);
    assert_eq!(
        l.capture_changes().as_slice(),
        &[Change::Refresh {
            item: 'b',
            index: 1
        }]
    );
}

#[test]
fn capture_resets_accumulator() {
    let mut l = TrackedList::new();
    l.push(1);
    assert_eq!(l.capture_changes().len(), 1);
    assert!(l.capture_changes().is_empty());
}

#[test]
fn replace_and_remove_by_value() {
    let mut l = list(&['a', 'b']);
    assert!(l.replace(&'b', 'z'));
    assert!(!l.replace(&'q', 'z'));
    assert!(l.remove(&'a'));
    assert!(!l.remove(&'a'));
    assert_eq!(l.as_slice(), &['z']);
}

#[test]
fn reset_records_clear_then_add_range() {
    let mut l = list(&['a']);
    l.reset(['x', 'y']);
    let reasons: Vec<_> = l.capture_changes().iter().map(|c| c.reason()).collect();
    assert_eq!(
        reasons,
        vec![ListChangeReason::Clear, ListChangeReason::AddRange]
    );
}

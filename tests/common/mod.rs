use listmut::SourceList;
use proptest::prelude::*;

/// One edit of a list of small numbers. Indexes are reduced modulo the
/// length at the time the edit runs.
#[derive(Debug, Clone)]
pub enum Edit {
    Add(u8),
    AddRange(Vec<u8>),
    Insert(usize, u8),
    RemoveAt(usize),
    RemoveRange(usize, usize),
    RemoveValue(u8),
    RemoveMany(Vec<u8>),
    Move(usize, usize),
    Replace(usize, u8),
    Refresh(usize),
    Clear,
}

pub fn edit() -> impl Strategy<Value = Edit> {
    let value = 0u8..20;
    let index = 0usize..64;
    prop_oneof![
        4 => value.clone().prop_map(Edit::Add),
        2 => prop::collection::vec(value.clone(), 0..6).prop_map(Edit::AddRange),
        3 => (index.clone(), value.clone()).prop_map(|(i, v)| Edit::Insert(i, v)),
        2 => index.clone().prop_map(Edit::RemoveAt),
        1 => (index.clone(), 0usize..4).prop_map(|(i, n)| Edit::RemoveRange(i, n)),
        1 => value.clone().prop_map(Edit::RemoveValue),
        1 => prop::collection::vec(value.clone(), 0..4).prop_map(Edit::RemoveMany),
        2 => (index.clone(), index.clone()).prop_map(|(a, b)| Edit::Move(a, b)),
        2 => (index.clone(), value).prop_map(|(i, v)| Edit::Replace(i, v)),
        1 => index.prop_map(Edit::Refresh),
        1 => Just(Edit::Clear),
    ]
}

pub fn edits() -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(edit(), 0..40)
}

pub fn apply(list: &SourceList<u8>, edit: &Edit) {
    let len = list.count();
    match edit {
        Edit::Add(v) => list.add(*v).unwrap(),
        Edit::AddRange(vs) => list.add_range(vs.iter().copied()).unwrap(),
        Edit::Insert(i, v) => list.insert(i % (len + 1), *v).unwrap(),
        Edit::RemoveValue(v) => {
            list.remove(v).unwrap();
        }
        Edit::RemoveMany(vs) => list.remove_many(vs.iter().copied()).unwrap(),
        Edit::Clear => list.clear().unwrap(),
        _ if len == 0 => {}
        Edit::RemoveAt(i) => {
            list.remove_at(i % len).unwrap();
        }
        Edit::RemoveRange(i, n) => {
            let i = i % len;
            list.remove_range(i, (*n).min(len - i)).unwrap();
        }
        Edit::Move(a, b) => list.move_item(a % len, b % len).unwrap(),
        Edit::Replace(i, v) => {
            list.replace_at(i % len, *v).unwrap();
        }
        Edit::Refresh(i) => list.refresh_at(i % len).unwrap(),
    }
}

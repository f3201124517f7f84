use parse_display::Display;

#[cfg(test)]
mod tests;

/// Why a [`Change`] was recorded.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListChangeReason {
    Add,
    AddRange,
    Replace,
    Remove,
    RemoveRange,
    Refresh,
    Moved,
    Clear,
}

impl ListChangeReason {
    pub const ALL: [ListChangeReason; 8] = [
        Self::Add,
        Self::AddRange,
        Self::Replace,
        Self::Remove,
        Self::RemoveRange,
        Self::Refresh,
        Self::Moved,
        Self::Clear,
    ];

    pub fn change_type(self) -> ChangeType {
        match self {
            Self::Add | Self::Replace | Self::Remove | Self::Refresh | Self::Moved => {
                ChangeType::Item
            }
            Self::AddRange | Self::RemoveRange | Self::Clear => ChangeType::Range,
        }
    }
}

/// Whether a change describes one item or a contiguous range of items.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Item,
    Range,
}

/// One atomic mutation of a list.
///
/// An index of `None` means the producer does not know the position of the
/// item. Consumers fall back to locating the item by value (removal) or to
/// appending (insertion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<T> {
    Add {
        item: T,
        index: Option<usize>,
    },
    AddRange {
        items: Vec<T>,
        index: Option<usize>,
    },
    Replace {
        current: T,
        previous: T,
        index: Option<usize>,
    },
    Remove {
        item: T,
        index: Option<usize>,
    },
    RemoveRange {
        items: Vec<T>,
        index: Option<usize>,
    },
    /// The item at `index` should be re-evaluated in place.
    Refresh {
        item: T,
        index: usize,
    },
    Moved {
        item: T,
        current_index: usize,
        previous_index: usize,
    },
    /// Every item of the list was removed.
    Clear {
        items: Vec<T>,
    },
}

impl<T> Change<T> {
    pub fn reason(&self) -> ListChangeReason {
        match self {
            Change::Add { .. } => ListChangeReason::Add,
            Change::AddRange { .. } => ListChangeReason::AddRange,
            Change::Replace { .. } => ListChangeReason::Replace,
            Change::Remove { .. } => ListChangeReason::Remove,
            Change::RemoveRange { .. } => ListChangeReason::RemoveRange,
            Change::Refresh { .. } => ListChangeReason::Refresh,
            Change::Moved { .. } => ListChangeReason::Moved,
            Change::Clear { .. } => ListChangeReason::Clear,
        }
    }
    pub fn change_type(&self) -> ChangeType {
        self.reason().change_type()
    }

    /// The position the change applies to.
    ///
    /// For range changes this is the start of the range, for `Clear` it is `0`.
    pub fn index(&self) -> Option<usize> {
        match self {
            Change::Add { index, .. }
            | Change::AddRange { index, .. }
            | Change::Replace { index, .. }
            | Change::Remove { index, .. }
            | Change::RemoveRange { index, .. } => *index,
            Change::Refresh { index, .. } => Some(*index),
            Change::Moved { current_index, .. } => Some(*current_index),
            Change::Clear { .. } => Some(0),
        }
    }

    /// Number of items the change carries.
    pub fn len(&self) -> usize {
        match self {
            Change::AddRange { items, .. }
            | Change::RemoveRange { items, .. }
            | Change::Clear { items } => items.len(),
            _ => 1,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current items carried by the change.
    ///
    /// For `Replace` this is the new value only.
    pub fn items(&self) -> impl Iterator<Item = &T> + '_ {
        use iter_n::iter2::*;
        match self {
            Change::Add { item, .. }
            | Change::Remove { item, .. }
            | Change::Refresh { item, .. }
            | Change::Moved { item, .. }
            | Change::Replace { current: item, .. } => std::iter::once(item).into_iter0(),
            Change::AddRange { items, .. }
            | Change::RemoveRange { items, .. }
            | Change::Clear { items } => items.iter().into_iter1(),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Change<U> {
        match self {
            Change::Add { item, index } => Change::Add {
                item: f(item),
                index,
            },
            Change::AddRange { items, index } => Change::AddRange {
                items: items.into_iter().map(f).collect(),
                index,
            },
            Change::Replace {
                current,
                previous,
                index,
            } => Change::Replace {
                current: f(current),
                previous: f(previous),
                index,
            },
            Change::Remove { item, index } => Change::Remove {
                item: f(item),
                index,
            },
            Change::RemoveRange { items, index } => Change::RemoveRange {
                items: items.into_iter().map(f).collect(),
                index,
            },
            Change::Refresh { item, index } => Change::Refresh {
                item: f(item),
                index,
            },
            Change::Moved {
                item,
                current_index,
                previous_index,
            } => Change::Moved {
                item: f(item),
                current_index,
                previous_index,
            },
            Change::Clear { items } => Change::Clear {
                items: items.into_iter().map(f).collect(),
            },
        }
    }
}

use crate::{observable::Downstream, ChangeSet, Error, Result};

mod buffer;
mod combine;
mod distinct;
mod expire;
mod filter;
mod group;
mod limit;
mod reasons;
mod sort;
mod transform;
mod transform_async;
mod virtualise;

pub use buffer::*;
pub use combine::*;
pub use filter::*;
pub use group::*;
pub use sort::*;
pub use transform::*;
pub use virtualise::*;

/// Queues the outcome of one upstream notification.
///
/// Empty change sets are dropped. Call while holding the operator state lock,
/// and drain `downstream` after releasing it.
pub(crate) fn push_changes<T>(
    downstream: &Downstream<ChangeSet<T>>,
    changes: Result<ChangeSet<T>>,
    operator: &'static str,
) {
    match changes {
        Ok(changes) => {
            if !changes.is_empty() {
                downstream.push_next(changes);
            }
        }
        Err(e) => push_error(downstream, e, operator),
    }
}

pub(crate) fn push_error<T>(downstream: &Downstream<T>, e: Error, operator: &'static str) {
    tracing::error!(operator, "{e}");
    downstream.push_error(e);
}

pub(crate) fn check_index(index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(Error::IndexOutOfRange { index, len })
    }
}

pub(crate) fn locate<'a, T: PartialEq + 'a>(
    items: impl IntoIterator<Item = &'a T>,
    item: &T,
    operation: &'static str,
) -> Result<usize> {
    items
        .into_iter()
        .position(|x| x == item)
        .ok_or(Error::ItemNotFound { operation })
}

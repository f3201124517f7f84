//! Observable lists that report every mutation as a replayable change set,
//! and operators that transform one change-set stream into another.
//!
//! ```
//! use listmut::SourceList;
//!
//! let list = SourceList::new();
//! let evens = list.connect().filter(|x: &i32| x % 2 == 0).as_observable_list();
//! list.add_range(vec![1, 2, 3, 4]).unwrap();
//! assert_eq!(evens.items(), vec![2, 4]);
//! ```

mod adaptor;
mod aggregator;
mod change;
mod change_set;
mod error;
mod observable;
mod observable_list;
mod ops;
mod scheduler;
mod source_list;
mod subscription;
mod tracked_list;

#[cfg(doctest)]
mod tests_readme;

pub use adaptor::*;
pub use aggregator::*;
pub use change::*;
pub use change_set::*;
pub use error::*;
pub use observable::*;
pub use observable_list::*;
pub use ops::*;
pub use scheduler::*;
pub use source_list::*;
pub use subscription::*;
pub use tracked_list::*;

/// Bounds shared by every item type that flows through a list.
pub trait ListItem: Clone + PartialEq + Send + Sync + 'static {}
impl<T: Clone + PartialEq + Send + Sync + 'static> ListItem for T {}

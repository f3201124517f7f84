// #![include_doc("../README.md", start)]
//! # listmut
//!
//! `listmut` provides observable lists that report every mutation as a replayable change set, and an operator library that transforms one change-set stream into another incrementally.
//!
//! > [!WARNING]
//! > Warning: This crate is still in the very early stages of development. APIs will change.
//!
//! ## Features
//!
//! - Change sets that carry enough information (items, indexes, reasons) to rebuild the list on the consumer side
//! - Transactional edits: one edit, or one `begin_edit` scope, publishes one change set
//! - Incremental operators: filter, transform, sort, group, distinct values, set combination, virtualisation and paging
//! - Time-based operators (buffering, expiry, size limits) driven by an injected scheduler, with a virtual-time scheduler for tests
//! - Thread-safe: lists and streams are `Send + Sync`, and every subscriber sees change sets in the order they were produced
//!
//! ## Example
//!
//! ```rust
//! use listmut::{ChangeSetAggregator, SourceList};
//!
//! let list = SourceList::from_vec(vec![5, 3, 8]);
//! let sorted_evens = list
//!     .connect()
//!     .filter(|x: &i32| x % 2 == 0)
//!     .sort(|a, b| a.cmp(b));
//! let agg = ChangeSetAggregator::new(&sorted_evens);
//!
//! list.add_range(vec![4, 7, 2]).unwrap();
//! assert_eq!(agg.data(), vec![2, 4, 8]);
//!
//! list.remove(&4).unwrap();
//! assert_eq!(agg.data(), vec![2, 8]);
//! ```
//!
//! A consumer keeps its own collection in sync by replaying each change set onto it:
//!
//! ```rust
//! use std::sync::Arc;
//! use listmut::SourceList;
//! use parking_lot::Mutex;
//!
//! let list = SourceList::new();
//! let view = Arc::new(Mutex::new(Vec::<&str>::new()));
//! let _s = list.connect().bind_to(view.clone()).subscribe(|_| {});
//!
//! list.add("a").unwrap();
//! list.insert(0, "b").unwrap();
//! list.move_item(0, 1).unwrap();
//! assert_eq!(*view.lock(), vec!["a", "b"]);
//! ```
//!
//! ## License
//!
//! This project is dual licensed under Apache-2.0/MIT. See the two LICENSE-\* files for details.
//!
//! ## Contribution
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.
// #![include_doc("../README.md", end)]

use std::{ops::Range, sync::Arc};

use parking_lot::Mutex;
use parse_display::Display;

use crate::{
    observable::Downstream, ops::push_error, ChangeSet, Error, ListItem, Observable, Result,
    Subscription, TrackedList,
};


/// A window of `size` items starting at `start_index`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{size} items from {start_index}")]
pub struct VirtualRequest {
    pub start_index: usize,
    pub size: usize,
}
impl VirtualRequest {
    pub fn new(start_index: usize, size: usize) -> Result<Self> {
        let this = Self { start_index, size };
        this.validate()?;
        Ok(this)
    }
    fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidRequest(format!("window size of `{self}` is zero")));
        }
        Ok(())
    }
}

/// Page `page` (starting at 1) of a list split into pages of `size` items.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("page {page} of size {size}")]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}
impl PageRequest {
    pub fn new(page: usize, size: usize) -> Result<Self> {
        let this = Self { page, size };
        this.validate()?;
        Ok(this)
    }
    fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(Error::InvalidRequest(format!("`{self}`: pages start at 1")));
        }
        if self.size == 0 {
            return Err(Error::InvalidRequest(format!("`{self}`: page size is zero")));
        }
        Ok(())
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("{size} items from {start_index} of {total_size}")]
pub struct VirtualResponse {
    pub start_index: usize,
    pub size: usize,
    pub total_size: usize,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display("page {page} of {pages}, size {page_size}, {total_size} items")]
pub struct PageResponse {
    pub page: usize,
    pub page_size: usize,
    pub pages: usize,
    pub total_size: usize,
}

/// Changes of a virtual window, indexed from the start of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualChangeSet<T> {
    pub changes: ChangeSet<T>,
    pub response: VirtualResponse,
}

/// Changes of a page, indexed from the start of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageChangeSet<T> {
    pub changes: ChangeSet<T>,
    pub response: PageResponse,
}

trait Window: Copy + Send + Sync + 'static {
    type Response: Copy + Send + 'static;
    fn validate(&self) -> Result<()>;
    fn resolve(&self, total_size: usize) -> (Range<usize>, Self::Response);
}

impl Window for VirtualRequest {
    type Response = VirtualResponse;
    fn validate(&self) -> Result<()> {
        VirtualRequest::validate(self)
    }
    fn resolve(&self, total_size: usize) -> (Range<usize>, VirtualResponse) {
        let start = self.start_index.min(total_size);
        let end = self.start_index.saturating_add(self.size).min(total_size);
        let response = VirtualResponse {
            start_index: self.start_index,
            size: self.size,
            total_size,
        };
        (start..end, response)
    }
}

impl Window for PageRequest {
    type Response = PageResponse;
    fn validate(&self) -> Result<()> {
        PageRequest::validate(self)
    }
    fn resolve(&self, total_size: usize) -> (Range<usize>, PageResponse) {
        let pages = total_size.div_ceil(self.size);
        let page = self.page.min(pages).max(1);
        let start = ((page - 1) * self.size).min(total_size);
        let end = (start + self.size).min(total_size);
        let response = PageResponse {
            page,
            page_size: self.size,
            pages,
            total_size,
        };
        (start..end, response)
    }
}

struct WindowState<T, R> {
    all: Vec<T>,
    result: TrackedList<T>,
    request: Option<R>,
}

impl<T: ListItem, R: Window> WindowState<T, R> {
    /// Recomputes the window, returning its changes and the response.
    fn update(&mut self) -> Option<(ChangeSet<T>, R::Response)> {
        let request = self.request?;
        let (range, response) = request.resolve(self.all.len());
        diff_window(&mut self.result, &self.all[range]);
        let changes = self.result.capture_changes();
        if changes.is_empty() {
            None
        } else {
            Some((changes, response))
        }
    }
}

/// Edits `result` until it equals `target`, reusing the items both contain.
///
/// Items only in `result` are replaced in place when the same position of
/// `target` holds an item only in `target`, and removed otherwise. The kept
/// items are then moved into order and the missing ones inserted.
pub(crate) fn diff_window<T: Clone + PartialEq>(result: &mut TrackedList<T>, target: &[T]) {
    let mut used = vec![false; target.len()];
    let mut kept = vec![false; result.len()];
    for (i, item) in result.iter().enumerate() {
        if let Some(j) = (0..target.len()).find(|&j| !used[j] && &target[j] == item) {
            used[j] = true;
            kept[i] = true;
        }
    }
    for i in 0..result.len().min(target.len()) {
        if !kept[i] && !used[i] {
            result.set(i, target[i].clone());
            used[i] = true;
            kept[i] = true;
        }
    }
    for i in (0..kept.len()).rev() {
        if !kept[i] {
            result.remove_at(i);
        }
    }
    for (i, item) in target.iter().enumerate() {
        if result.get(i) == Some(item) {
            continue;
        }
        let from = result.as_slice()[(i + 1).min(result.len())..]
            .iter()
            .position(|x| x == item)
            .map(|p| i + 1 + p);
        match from {
            Some(from) => result.move_item(from, i),
            None => result.insert(i, item.clone()),
        }
    }
    debug_assert_eq!(result.len(), target.len());
}

fn window_core<T, R, O>(
    source: &Observable<ChangeSet<T>>,
    requests: &Observable<R>,
    operator: &'static str,
    make: fn(ChangeSet<T>, R::Response) -> O,
) -> Observable<O>
where
    T: ListItem,
    R: Window,
    O: Clone + Send + 'static,
{
    let source = source.clone();
    let requests = requests.clone();
    Observable::new(move |observer| {
        let downstream = Downstream::new(observer);
        let state = Arc::new(Mutex::new(WindowState::<T, R> {
            all: Vec::new(),
            result: TrackedList::new(),
            request: None,
        }));

        let s = state.clone();
        let out = downstream.clone();
        let error_out = downstream.clone();
        let request_subscription = requests.subscribe_all(
            move |request: &R| {
                if let Err(e) = request.validate() {
                    tracing::warn!(operator, "ignored invalid request: {e}");
                    return;
                }
                {
                    let mut s = s.lock();
                    s.request = Some(*request);
                    if let Some((changes, response)) = s.update() {
                        out.push_next(make(changes, response));
                    }
                }
                out.drain();
            },
            move |e| {
                push_error(&error_out, e.clone(), operator);
                error_out.drain();
            },
            || {},
        );

        let out = downstream.clone();
        let source_subscription = source.subscribe_raw(
            move |changes: &ChangeSet<T>| {
                {
                    let mut s = state.lock();
                    match changes.apply_to(&mut s.all) {
                        Ok(()) => {
                            if let Some((changes, response)) = s.update() {
                                out.push_next(make(changes, response));
                            }
                        }
                        Err(e) => push_error(&out, e, operator),
                    }
                }
                out.drain();
            },
            downstream.as_observer(),
        );
        Subscription::merge([request_subscription, source_subscription])
    })
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// The items inside the window described by the latest request.
    ///
    /// Nothing is sent before the first request. Changes are indexed from
    /// the start of the window; items moving into or out of the window
    /// because of edits before it are reported as adds and removes.
    /// Invalid requests are ignored.
    pub fn virtualise(&self, requests: &Observable<VirtualRequest>) -> Observable<VirtualChangeSet<T>> {
        window_core(self, requests, "virtualise", |changes, response| VirtualChangeSet {
            changes,
            response,
        })
    }

    /// The items of the page described by the latest request.
    ///
    /// A request past the last page shows the last page.
    pub fn page(&self, requests: &Observable<PageRequest>) -> Observable<PageChangeSet<T>> {
        window_core(self, requests, "page", |changes, response| PageChangeSet {
            changes,
            response,
        })
    }
}

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ChangeSet, Error, ListItem, Observable, Subscription};


/// Counts for one change set, or accumulated over a whole stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeStatistics {
    /// Position of the change set in the stream, starting at 0.
    pub index: usize,
    pub adds: usize,
    pub removes: usize,
    pub replaced: usize,
    pub moves: usize,
    pub refreshes: usize,
    /// Number of items after the change set was applied.
    pub count: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSummary {
    pub latest: ChangeStatistics,
    pub overall: ChangeStatistics,
}

/// Records a change-set stream for assertions.
///
/// Keeps every message, a copy of the list built by replaying the messages,
/// and the terminal state of the stream.
pub struct ChangeSetAggregator<T: ListItem> {
    data: Arc<Mutex<AggregatorData<T>>>,
    _subscription: Subscription,
}

struct AggregatorData<T> {
    messages: Vec<ChangeSet<T>>,
    data: Vec<T>,
    summary: ChangeSummary,
    error: Option<Error>,
    is_completed: bool,
}

impl<T: ListItem> ChangeSetAggregator<T> {
    pub fn new(source: &Observable<ChangeSet<T>>) -> Self {
        let data = Arc::new(Mutex::new(AggregatorData {
            messages: Vec::new(),
            data: Vec::new(),
            summary: ChangeSummary::default(),
            error: None,
            is_completed: false,
        }));
        let on_next = data.clone();
        let on_error = data.clone();
        let on_completed = data.clone();
        let subscription = source.subscribe_all(
            move |changes| on_next.lock().record(changes),
            move |e| on_error.lock().error = Some(e.clone()),
            move || on_completed.lock().is_completed = true,
        );
        Self {
            data,
            _subscription: subscription,
        }
    }

    pub fn messages(&self) -> Vec<ChangeSet<T>> {
        self.data.lock().messages.clone()
    }
    pub fn message_count(&self) -> usize {
        self.data.lock().messages.len()
    }
    pub fn last_message(&self) -> Option<ChangeSet<T>> {
        self.data.lock().messages.last().cloned()
    }

    /// The items obtained by replaying every message onto an empty list.
    pub fn data(&self) -> Vec<T> {
        self.data.lock().data.clone()
    }
    pub fn summary(&self) -> ChangeSummary {
        self.data.lock().summary
    }
    pub fn error(&self) -> Option<Error> {
        self.data.lock().error.clone()
    }
    pub fn is_completed(&self) -> bool {
        self.data.lock().is_completed
    }
}

impl<T: ListItem> AggregatorData<T> {
    fn record(&mut self, changes: &ChangeSet<T>) {
        if let Err(e) = changes.apply_to(&mut self.data) {
            tracing::error!("aggregator could not replay a change set: {e}");
            self.error = Some(e);
        }
        let c = changes.counts();
        let latest = ChangeStatistics {
            index: self.messages.len(),
            adds: c.adds,
            removes: c.removes,
            replaced: c.replaced,
            moves: c.moves,
            refreshes: c.refreshes,
            count: self.data.len(),
        };
        let o = &mut self.summary.overall;
        o.index = latest.index;
        o.adds += latest.adds;
        o.removes += latest.removes;
        o.replaced += latest.replaced;
        o.moves += latest.moves;
        o.refreshes += latest.refreshes;
        o.count = latest.count;
        self.summary.latest = latest;
        self.messages.push(changes.clone());
    }
}

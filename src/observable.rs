use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use derive_ex::Ex;
use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
    Stream,
};
use parking_lot::Mutex;
use slabmap::SlabMap;

use crate::{Error, Subscription};

#[cfg(test)]
mod tests;

/// Receiver of the notifications of an [`Observable`].
///
/// After `on_error` or `on_completed` no further notification is delivered.
pub trait Observer<T: ?Sized>: Send + Sync {
    fn on_next(&self, value: &T);
    fn on_error(&self, error: &Error);
    fn on_completed(&self);
}

pub type DynObserver<T> = Arc<dyn Observer<T>>;

struct FnObserver<N, E, C> {
    on_next: N,
    on_error: E,
    on_completed: C,
}
impl<T, N, E, C> Observer<T> for FnObserver<N, E, C>
where
    T: ?Sized,
    N: Fn(&T) + Send + Sync,
    E: Fn(&Error) + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn on_next(&self, value: &T) {
        (self.on_next)(value)
    }
    fn on_error(&self, error: &Error) {
        (self.on_error)(error)
    }
    fn on_completed(&self) {
        (self.on_completed)()
    }
}

struct ForwardObserver<F, U: 'static> {
    on_next: F,
    downstream: DynObserver<U>,
}
impl<T, U, F> Observer<T> for ForwardObserver<F, U>
where
    T: ?Sized,
    F: Fn(&T) + Send + Sync,
{
    fn on_next(&self, value: &T) {
        (self.on_next)(value)
    }
    fn on_error(&self, error: &Error) {
        self.downstream.on_error(error)
    }
    fn on_completed(&self) {
        self.downstream.on_completed()
    }
}

/// A push-based stream of values.
///
/// Subscribing runs the subscribe function of the observable, which may
/// deliver values synchronously before returning. Every operator of this
/// crate is an `Observable` built on top of another one.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct Observable<T: 'static>(Arc<dyn Fn(DynObserver<T>) -> Subscription + Send + Sync>);

impl<T: 'static> Observable<T> {
    pub fn new(subscribe: impl Fn(DynObserver<T>) -> Subscription + Send + Sync + 'static) -> Self {
        Self(Arc::new(subscribe))
    }

    /// An observable that completes immediately.
    pub fn empty() -> Self {
        Self::new(|observer| {
            observer.on_completed();
            Subscription::empty()
        })
    }

    /// An observable that never notifies.
    pub fn never() -> Self {
        Self::new(|_| Subscription::empty())
    }

    pub fn error(error: Error) -> Self {
        Self::new(move |observer| {
            observer.on_error(&error);
            Subscription::empty()
        })
    }

    /// Delivers `values` to each subscriber and then completes.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self
    where
        T: Send + Sync,
    {
        let values: Vec<T> = values.into_iter().collect();
        Self::new(move |observer| {
            for value in &values {
                observer.on_next(value);
            }
            observer.on_completed();
            Subscription::empty()
        })
    }

    pub fn subscribe(&self, on_next: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.subscribe_all(on_next, |_| {}, || {})
    }
    pub fn subscribe_all(
        &self,
        on_next: impl Fn(&T) + Send + Sync + 'static,
        on_error: impl Fn(&Error) + Send + Sync + 'static,
        on_completed: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        self.subscribe_dyn(Arc::new(FnObserver {
            on_next,
            on_error,
            on_completed,
        }))
    }
    pub fn subscribe_with(&self, observer: impl Observer<T> + 'static) -> Subscription {
        self.subscribe_dyn(Arc::new(observer))
    }
    pub fn subscribe_dyn(&self, observer: DynObserver<T>) -> Subscription {
        (self.0)(observer)
    }

    /// Subscribes with `on_next` and forwards errors and completion to `downstream`.
    pub(crate) fn subscribe_raw<U: 'static>(
        &self,
        on_next: impl Fn(&T) + Send + Sync + 'static,
        downstream: DynObserver<U>,
    ) -> Subscription {
        self.subscribe_dyn(Arc::new(ForwardObserver {
            on_next,
            downstream,
        }))
    }

    pub fn map<U: 'static>(&self, f: impl Fn(&T) -> U + Send + Sync + 'static) -> Observable<U> {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::new(move |observer| {
            let f = f.clone();
            let out = observer.clone();
            source.subscribe_raw(move |value| out.on_next(&f(value)), observer)
        })
    }

    /// Bridges the observable to a [`futures::Stream`].
    ///
    /// Errors are yielded as `Err` items and end the stream.
    pub fn to_stream(&self) -> ObservableStream<T>
    where
        T: Clone + Send,
    {
        let (sender, receiver) = unbounded();
        let subscription = self.subscribe_with(StreamObserver(sender));
        ObservableStream {
            receiver,
            _subscription: subscription,
        }
    }
}
impl<T: 'static> PartialEq for Observable<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl<T: 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Observable({:p})", Arc::as_ptr(&self.0))
    }
}

struct StreamObserver<T>(UnboundedSender<Result<T, Error>>);
impl<T: Clone + Send> Observer<T> for StreamObserver<T> {
    fn on_next(&self, value: &T) {
        let _ = self.0.unbounded_send(Ok(value.clone()));
    }
    fn on_error(&self, error: &Error) {
        let _ = self.0.unbounded_send(Err(error.clone()));
        self.0.close_channel();
    }
    fn on_completed(&self) {
        self.0.close_channel();
    }
}

/// A [`Stream`] created by [`Observable::to_stream`].
pub struct ObservableStream<T> {
    receiver: UnboundedReceiver<Result<T, Error>>,
    _subscription: Subscription,
}
impl<T> Stream for ObservableStream<T> {
    type Item = Result<T, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

pub(crate) enum Notification<T> {
    Next(T),
    Error(Error),
    Completed,
}
impl<T> Notification<T> {
    fn deliver(&self, observer: &dyn Observer<T>) {
        match self {
            Notification::Next(value) => observer.on_next(value),
            Notification::Error(e) => observer.on_error(e),
            Notification::Completed => observer.on_completed(),
        }
    }
    fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }
}

/// Ordered delivery to a single observer.
///
/// Operators push results while holding their state lock and drain after
/// releasing it. A push made while a drain is running, from the same thread
/// or another one, is delivered by the running drain, so the observer sees
/// notifications in push order and is never re-entered.
pub(crate) struct Downstream<T: 'static> {
    observer: DynObserver<T>,
    queue: Mutex<DownstreamQueue<T>>,
}
struct DownstreamQueue<T> {
    items: VecDeque<Notification<T>>,
    is_draining: bool,
    is_stopped: bool,
}

impl<T: 'static> Downstream<T> {
    pub fn new(observer: DynObserver<T>) -> Arc<Self> {
        Arc::new(Self {
            observer,
            queue: Mutex::new(DownstreamQueue {
                items: VecDeque::new(),
                is_draining: false,
                is_stopped: false,
            }),
        })
    }
    pub fn push(&self, notification: Notification<T>) {
        let mut q = self.queue.lock();
        if q.is_stopped {
            return;
        }
        q.is_stopped = notification.is_terminal();
        q.items.push_back(notification);
    }
    pub fn push_next(&self, value: T) {
        self.push(Notification::Next(value))
    }
    pub fn push_error(&self, error: Error) {
        self.push(Notification::Error(error))
    }
    pub fn is_stopped(&self) -> bool {
        self.queue.lock().is_stopped
    }
    pub fn as_observer(self: &Arc<Self>) -> DynObserver<T>
    where
        T: Clone + Send,
    {
        self.clone()
    }

    pub fn drain(&self) {
        {
            let mut q = self.queue.lock();
            if q.is_draining {
                return;
            }
            q.is_draining = true;
        }
        let _guard = DrainGuard(|| self.queue.lock().is_draining = false);
        loop {
            let next = self.queue.lock().items.pop_front();
            let Some(notification) = next else {
                return;
            };
            notification.deliver(&*self.observer);
        }
    }

    pub fn next(&self, value: T) {
        self.push_next(value);
        self.drain();
    }
    pub fn error(&self, error: Error) {
        self.push_error(error);
        self.drain();
    }
    pub fn completed(&self) {
        self.push(Notification::Completed);
        self.drain();
    }
}

impl<T> Observer<T> for Downstream<T>
where
    T: Clone + Send + 'static,
{
    fn on_next(&self, value: &T) {
        self.next(value.clone())
    }
    fn on_error(&self, error: &Error) {
        self.error(error.clone())
    }
    fn on_completed(&self) {
        self.completed()
    }
}

struct DrainGuard<F: FnMut()>(F);
impl<F: FnMut()> Drop for DrainGuard<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

/// A multicast source of notifications.
///
/// Notifications are queued and delivered in order; an observer registered
/// while earlier notifications are still queued only receives the ones
/// pushed after it registered.
#[derive(Ex)]
#[derive_ex(Clone(bound()))]
pub struct Subject<T: 'static>(Arc<RawSubject<T>>);

impl<T: Send + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct RawSubject<T: 'static> {
    data: Mutex<SubjectData<T>>,
}
struct SubjectData<T: 'static> {
    observers: SlabMap<ObserverEntry<T>>,
    queue: VecDeque<(u64, Notification<T>)>,
    next_seq: u64,
    is_draining: bool,
    terminal: Option<Notification<T>>,
}
struct ObserverEntry<T: 'static> {
    observer: DynObserver<T>,
    since: u64,
}

impl<T: Send + 'static> Subject<T> {
    pub fn new() -> Self {
        Self(Arc::new(RawSubject {
            data: Mutex::new(SubjectData {
                observers: SlabMap::new(),
                queue: VecDeque::new(),
                next_seq: 0,
                is_draining: false,
                terminal: None,
            }),
        }))
    }

    pub fn on_next(&self, value: T) {
        self.push(Notification::Next(value));
        self.drain();
    }
    pub fn on_error(&self, error: Error) {
        self.push(Notification::Error(error));
        self.drain();
    }
    pub fn on_completed(&self) {
        self.push(Notification::Completed);
        self.drain();
    }

    pub fn has_observers(&self) -> bool {
        !self.0.data.lock().observers.is_empty()
    }
    pub fn is_stopped(&self) -> bool {
        self.0.data.lock().terminal.is_some()
    }

    pub fn subscribe_dyn(&self, observer: DynObserver<T>) -> Subscription {
        let mut d = self.0.data.lock();
        if let Some(terminal) = &d.terminal {
            let terminal = match terminal {
                Notification::Error(e) => Notification::Error(e.clone()),
                _ => Notification::Completed,
            };
            drop(d);
            terminal.deliver(&*observer);
            return Subscription::empty();
        }
        let since = d.next_seq;
        let key = d.observers.insert(ObserverEntry { observer, since });
        drop(d);
        Subscription::from_weak_fn(Arc::downgrade(&self.0), move |this| {
            this.data.lock().observers.remove(key);
        })
    }

    pub fn as_observable(&self) -> Observable<T> {
        let this = self.clone();
        Observable::new(move |observer| this.subscribe_dyn(observer))
    }

    fn push(&self, notification: Notification<T>) {
        let mut d = self.0.data.lock();
        if d.terminal.is_some() {
            return;
        }
        if notification.is_terminal() {
            d.terminal = Some(match &notification {
                Notification::Error(e) => Notification::Error(e.clone()),
                _ => Notification::Completed,
            });
        }
        let seq = d.next_seq;
        d.next_seq += 1;
        d.queue.push_back((seq, notification));
    }

    fn drain(&self) {
        {
            let mut d = self.0.data.lock();
            if d.is_draining {
                return;
            }
            d.is_draining = true;
        }
        let _guard = DrainGuard(|| self.0.data.lock().is_draining = false);
        loop {
            let (notification, observers) = {
                let mut d = self.0.data.lock();
                let Some((seq, notification)) = d.queue.pop_front() else {
                    return;
                };
                let observers: Vec<_> = d
                    .observers
                    .values()
                    .filter(|e| e.since <= seq)
                    .map(|e| e.observer.clone())
                    .collect();
                if notification.is_terminal() {
                    d.observers.clear();
                }
                (notification, observers)
            };
            for observer in observers {
                notification.deliver(&*observer);
            }
        }
    }
}

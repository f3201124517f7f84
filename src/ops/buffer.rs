use std::{mem::take, sync::Arc, time::Duration};

use derive_ex::Ex;
use parking_lot::Mutex;

use crate::{
    observable::{Downstream, Notification},
    ops::push_error,
    ChangeSet, DynScheduler, ListItem, Observable, Subscription,
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Ex)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct BufferOptions {
    /// Start paused.
    pub initial_pause: bool,
    /// Resume on its own after being paused this long.
    pub timeout: Option<Duration>,
}
impl BufferOptions {
    pub const fn new() -> Self {
        Self {
            initial_pause: false,
            timeout: None,
        }
    }
}

struct BufferState<T> {
    paused: bool,
    buffer: ChangeSet<T>,
    timer: Option<Subscription>,
}

impl<T: ListItem> BufferState<T> {
    fn flush(&mut self, out: &Downstream<ChangeSet<T>>) {
        if !self.buffer.is_empty() {
            out.push_next(take(&mut self.buffer));
        }
    }
}

fn start_timer<T: ListItem>(
    scheduler: &DynScheduler,
    timeout: Option<Duration>,
    state: &Arc<Mutex<BufferState<T>>>,
    out: &Arc<Downstream<ChangeSet<T>>>,
) -> Option<Subscription> {
    let timeout = timeout?;
    let state = Arc::downgrade(state);
    let out = out.clone();
    Some(scheduler.schedule_after(
        timeout,
        Box::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let timer = {
                let mut s = state.lock();
                tracing::debug!(changes = s.buffer.len(), "buffer timeout");
                s.paused = false;
                s.flush(&out);
                s.timer.take()
            };
            drop(timer);
            out.drain();
        }),
    ))
}

impl<T: ListItem> Observable<ChangeSet<T>> {
    /// Holds change sets back while the latest value of `pause` is `true`,
    /// and sends them as one change set on resume.
    ///
    /// With a timeout, the buffer resumes by itself once it has been paused
    /// for that long. Completion of the source sends the buffered changes first.
    pub fn buffer_if(
        &self,
        pause: &Observable<bool>,
        options: BufferOptions,
        scheduler: DynScheduler,
    ) -> Observable<ChangeSet<T>> {
        let source = self.clone();
        let pause = pause.clone();
        Observable::new(move |observer| {
            let downstream = Downstream::new(observer);
            let state = Arc::new(Mutex::new(BufferState {
                paused: options.initial_pause,
                buffer: ChangeSet::new(),
                timer: None,
            }));
            if options.initial_pause {
                let timer = start_timer(&scheduler, options.timeout, &state, &downstream);
                state.lock().timer = timer;
            }

            let s = state.clone();
            let out = downstream.clone();
            let error_out = downstream.clone();
            let scheduler = scheduler.clone();
            let pause_subscription = pause.subscribe_all(
                move |&paused: &bool| {
                    let timer = {
                        let mut st = s.lock();
                        if st.paused == paused {
                            return;
                        }
                        st.paused = paused;
                        if paused {
                            st.timer = start_timer(&scheduler, options.timeout, &s, &out);
                            None
                        } else {
                            st.flush(&out);
                            st.timer.take()
                        }
                    };
                    drop(timer);
                    out.drain();
                },
                move |e| {
                    push_error(&error_out, e.clone(), "buffer_if");
                    error_out.drain();
                },
                || {},
            );

            let s = state.clone();
            let next_out = downstream.clone();
            let error_out = downstream.clone();
            let completed_out = downstream.clone();
            let completed_state = state.clone();
            let source_subscription = source.subscribe_all(
                move |changes: &ChangeSet<T>| {
                    {
                        let mut s = s.lock();
                        if s.paused {
                            s.buffer.append(changes.clone());
                        } else {
                            next_out.push_next(changes.clone());
                        }
                    }
                    next_out.drain();
                },
                move |e| error_out.error(e.clone()),
                move || {
                    {
                        let mut s = completed_state.lock();
                        s.flush(&completed_out);
                        completed_out.push(Notification::Completed);
                    }
                    completed_out.drain();
                },
            );
            let cancel_timer = Subscription::from_fn(move || {
                let timer = state.lock().timer.take();
                drop(timer);
            });
            Subscription::merge([pause_subscription, source_subscription, cancel_timer])
        })
    }
}

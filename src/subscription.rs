use std::{
    any::Any,
    mem::take,
    sync::{Arc, Weak},
};

#[cfg(test)]
mod tests;

/// Handle to an active subscription.
///
/// Dropping the handle cancels the subscription. Values already being
/// delivered to other observers may still complete delivery.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }
    pub fn from_arc(arc: Arc<dyn Any + Send + Sync>) -> Self {
        Subscription(RawSubscription::Arc(arc))
    }
    pub fn from_weak_fn<T: Send + Sync + 'static>(
        this: Weak<T>,
        unsubscribe: impl FnOnce(Arc<T>) + Send + 'static,
    ) -> Self {
        Self::from_fn(move || {
            if let Some(this) = this.upgrade() {
                unsubscribe(this)
            }
        })
    }
    pub fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        Subscription(RawSubscription::Many(subscriptions.into_iter().collect()))
    }

    /// Keeps `other` alive for as long as this subscription.
    pub fn with(self, other: Subscription) -> Self {
        Self::merge([self, other])
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.0, RawSubscription::Empty)
    }

    pub fn unsubscribe(self) {
        drop(self)
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
            RawSubscription::Arc(_) => {}
            RawSubscription::Many(subscriptions) => drop(subscriptions),
        }
    }
}
impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.0 {
            RawSubscription::Empty => "empty",
            RawSubscription::Fn(_) => "fn",
            RawSubscription::Arc(_) => "arc",
            RawSubscription::Many(_) => "many",
        };
        f.debug_tuple("Subscription").field(&kind).finish()
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + Send + 'static>),
    Arc(#[allow(unused)] Arc<dyn Any + Send + Sync>),
    Many(Vec<Subscription>),
}

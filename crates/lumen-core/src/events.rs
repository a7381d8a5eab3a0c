//! Typed publish/subscribe channels.
//!
//! Each event kind has its own [`Channel`]. Subscribers are called
//! synchronously on [`Channel::publish`], in the order they registered.

use std::sync::{Arc, RwLock};

use crate::types::RecallRecord;

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Channel::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A channel delivering events of one kind to an ordered list of subscribers.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use lumen_core::events::Channel;
///
/// let channel = Channel::<u32>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// channel.subscribe(move |n| sink.lock().unwrap().push(*n));
/// channel.publish(&7);
/// assert_eq!(*seen.lock().unwrap(), vec![7]);
/// ```
pub struct Channel<T> {
    inner: RwLock<ChannelInner<T>>,
}

struct ChannelInner<T> {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(ChannelInner {
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Register a subscriber. It is called after every subscriber registered
    /// before it.
    pub fn subscribe<F>(&self, f: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(f)));
        id
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sid, _)| *sid != id);
        inner.subscribers.len() != before
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// The subscriber list is snapshotted first, so a subscriber may
    /// subscribe or unsubscribe without deadlocking.
    pub fn publish(&self, event: &T) {
        let snapshot: Vec<Subscriber<T>> = {
            let inner = match self.inner.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            inner.subscribers.iter().map(|(_, s)| s.clone()).collect()
        };
        for subscriber in snapshot {
            subscriber(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.inner.read() {
            Ok(guard) => guard.subscribers.len(),
            Err(poisoned) => poisoned.into_inner().subscribers.len(),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// A configuration value changed at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    /// The local-RAG toggle was set to the given value.
    LocalRag(bool),
}

/// Progress of an index pass, published as human-readable lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProgress {
    pub project: String,
    pub message: String,
}

/// A snapshot of the recall record of one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallUpdate {
    pub turn: u64,
    pub record: RecallRecord,
}

/// Start and end of an inline-completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionLifecycle {
    Start,
    End,
}

/// All event channels of one process.
#[derive(Debug, Default)]
pub struct Events {
    pub config: Channel<ConfigChange>,
    pub index_progress: Channel<IndexProgress>,
    pub recall: Channel<RecallUpdate>,
    pub completion: Channel<CompletionLifecycle>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn delivers_in_registration_order() {
        let channel = Channel::<&'static str>::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let log = log.clone();
            channel.subscribe(move |event| log.lock().unwrap().push(format!("{tag}:{event}")));
        }
        channel.publish(&"ping");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:ping", "second:ping", "third:ping"]
        );
    }

    #[test]
    fn unsubscribe_removes_only_that_subscriber() {
        let channel = Channel::<u8>::new();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let a = {
            let hits = hits.clone();
            channel.subscribe(move |_| hits.lock().unwrap().push('a'))
        };
        {
            let hits = hits.clone();
            channel.subscribe(move |_| hits.lock().unwrap().push('b'));
        }
        assert!(channel.unsubscribe(a));
        assert!(!channel.unsubscribe(a));
        channel.publish(&1);
        assert_eq!(*hits.lock().unwrap(), vec!['b']);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_may_subscribe_during_publish() {
        let channel = Arc::new(Channel::<u8>::new());
        let inner = channel.clone();
        channel.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        channel.publish(&0);
        assert_eq!(channel.subscriber_count(), 2);
    }

    #[test]
    fn subscriber_effects_are_visible_when_publish_returns() {
        let channel = Channel::<u32>::new();
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let sink = flag.clone();
        channel.subscribe(move |n| {
            if *n == 1 {
                sink.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        });
        channel.publish(&0);
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
        channel.publish(&1);
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn events_bundle_is_independent_per_kind() {
        let events = Events::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();
        events
            .config
            .subscribe(move |change| *sink.lock().unwrap() = Some(change.clone()));
        events.completion.publish(&CompletionLifecycle::Start);
        assert!(seen.lock().unwrap().is_none());
        events.config.publish(&ConfigChange::LocalRag(false));
        assert_eq!(*seen.lock().unwrap(), Some(ConfigChange::LocalRag(false)));
    }
}

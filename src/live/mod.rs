//! In-process mirror of the votes cast on each motion, with fan-out of
//! change events to live observers.
//!
//! Delivery is best-effort and at-most-once: every subscriber owns a bounded
//! channel and an event is dropped for a subscriber whose buffer is full
//! (drop-newest). Observers resynchronize through [`LiveVoteCache::voting_state`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::models::assembly::VoteView;

pub const MIN_SUBSCRIBER_BUFFER: usize = 1;
pub const MAX_SUBSCRIBER_BUFFER: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoteEvent {
    NewVote { voting_id: i64, vote: VoteView },
    VoteDeleted { voting_id: i64, vote: VoteView },
}

impl VoteEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VoteEvent::NewVote { .. } => "new_vote",
            VoteEvent::VoteDeleted { .. } => "vote_deleted",
        }
    }

    pub fn vote(&self) -> &VoteView {
        match self {
            VoteEvent::NewVote { vote, .. } | VoteEvent::VoteDeleted { vote, .. } => vote,
        }
    }
}

/// Receiving half handed to an observer.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub voting_id: i64,
    pub receiver: mpsc::Receiver<VoteEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveCacheStats {
    pub motions: usize,
    pub cached_votes: usize,
    pub subscribers: usize,
}

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<VoteEvent>,
    // Dropped with the entry; wakes the watcher task.
    _removed: oneshot::Sender<()>,
}

#[derive(Default)]
struct LiveState {
    votes: HashMap<i64, Vec<VoteView>>,
    subscribers: HashMap<i64, Vec<Subscriber>>,
}

impl LiveState {
    fn fan_out(&mut self, voting_id: i64, event: &VoteEvent) {
        let Some(subscribers) = self.subscribers.get_mut(&voting_id) else {
            return;
        };

        subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(
                    voting_id,
                    subscriber_id = subscriber.id,
                    event = event.name(),
                    "subscriber buffer full, dropping event"
                );
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(
                    voting_id,
                    subscriber_id = subscriber.id,
                    "subscriber went away, pruning"
                );
                false
            }
        });

        if subscribers.is_empty() {
            self.subscribers.remove(&voting_id);
        }
    }
}

/// Shared, explicitly constructed cache. Hand it around as `Arc<LiveVoteCache>`.
pub struct LiveVoteCache {
    state: RwLock<LiveState>,
    buffer: usize,
    next_subscriber: AtomicU64,
}

impl LiveVoteCache {
    pub fn new(buffer: usize) -> Self {
        assert!(
            (MIN_SUBSCRIBER_BUFFER..=MAX_SUBSCRIBER_BUFFER).contains(&buffer),
            "Subscriber buffer out of bounds"
        );
        Self {
            state: RwLock::new(LiveState::default()),
            buffer,
            next_subscriber: AtomicU64::new(1),
        }
    }

    /// Appends the vote (once per vote id) and notifies every subscriber of the motion.
    pub fn publish_vote(&self, voting_id: i64, vote: VoteView) {
        let mut state = self.state.write();
        let votes = state.votes.entry(voting_id).or_default();
        if !votes.iter().any(|cached| cached.vote_id == vote.vote_id) {
            votes.push(vote.clone());
        }
        state.fan_out(voting_id, &VoteEvent::NewVote { voting_id, vote });
    }

    /// Removes the vote and notifies subscribers with its prior data.
    pub fn remove_vote(&self, voting_id: i64, vote_id: i64) -> Option<VoteView> {
        let mut state = self.state.write();
        let votes = state.votes.get_mut(&voting_id)?;
        let position = votes.iter().position(|cached| cached.vote_id == vote_id)?;
        let removed = votes.remove(position);
        state.fan_out(
            voting_id,
            &VoteEvent::VoteDeleted {
                voting_id,
                vote: removed.clone(),
            },
        );
        Some(removed)
    }

    /// Owned copy of the cached votes; later mutations never leak into it.
    pub fn voting_state(&self, voting_id: i64) -> Vec<VoteView> {
        self.state
            .read()
            .votes
            .get(&voting_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_initialized(&self, voting_id: i64) -> bool {
        self.state.read().votes.contains_key(&voting_id)
    }

    /// Seeds the motion from durable storage, replacing anything cached.
    pub fn initialize_voting(&self, voting_id: i64, votes: Vec<VoteView>) {
        debug!(voting_id, votes = votes.len(), "initializing live vote state");
        self.state.write().votes.insert(voting_id, votes);
    }

    /// Seeds the motion only when nothing is cached yet and returns the
    /// resulting state. A snapshot loaded before a concurrent publish never
    /// replaces the newer state.
    pub fn initialize_if_absent(&self, voting_id: i64, votes: Vec<VoteView>) -> Vec<VoteView> {
        let mut state = self.state.write();
        let cached = state.votes.entry(voting_id).or_insert_with(|| {
            debug!(voting_id, votes = votes.len(), "initializing live vote state");
            votes
        });
        cached.clone()
    }

    /// Registers an observer. The channel is torn down when `cancel` flips to
    /// `true` or its sender is dropped. The watcher task also exits once the
    /// receiver goes away or the subscriber is removed by the cache.
    pub fn subscribe(
        self: &Arc<Self>,
        voting_id: i64,
        mut cancel: watch::Receiver<bool>,
    ) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let (removed_tx, mut removed_rx) = oneshot::channel::<()>();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let watched = sender.clone();

        self.state
            .write()
            .subscribers
            .entry(voting_id)
            .or_default()
            .push(Subscriber {
                id,
                sender,
                _removed: removed_tx,
            });
        debug!(voting_id, subscriber_id = id, "subscriber registered");

        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let cancelled = async {
                while !*cancel.borrow_and_update() {
                    if cancel.changed().await.is_err() {
                        break;
                    }
                }
            };
            tokio::select! {
                _ = cancelled => {
                    cache.unsubscribe(voting_id, id);
                }
                _ = watched.closed() => {
                    cache.unsubscribe(voting_id, id);
                }
                _ = &mut removed_rx => {}
            }
        });

        Subscription {
            id,
            voting_id,
            receiver,
        }
    }

    /// Removes and closes one subscriber channel. Returns whether it was registered.
    pub fn unsubscribe(&self, voting_id: i64, subscriber_id: u64) -> bool {
        let mut state = self.state.write();
        let Some(subscribers) = state.subscribers.get_mut(&voting_id) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != subscriber_id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            state.subscribers.remove(&voting_id);
        }
        if removed {
            debug!(voting_id, subscriber_id, "subscriber removed");
        }
        removed
    }

    /// Drops cached votes and closes every subscriber of the motion.
    pub fn clear_voting(&self, voting_id: i64) {
        let mut state = self.state.write();
        state.votes.remove(&voting_id);
        let closed = state
            .subscribers
            .remove(&voting_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0);
        debug!(voting_id, closed, "live vote state cleared");
    }

    /// Closes every subscriber channel of every motion. Cached votes stay.
    pub fn disconnect_all(&self) -> usize {
        let mut state = self.state.write();
        let closed = state.subscribers.values().map(Vec::len).sum();
        state.subscribers.clear();
        closed
    }

    pub fn subscriber_count(&self, voting_id: i64) -> usize {
        self.state
            .read()
            .subscribers
            .get(&voting_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> LiveCacheStats {
        let state = self.state.read();
        LiveCacheStats {
            motions: state.votes.len(),
            cached_votes: state.votes.values().map(Vec::len).sum(),
            subscribers: state.subscribers.values().map(Vec::len).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn vote(vote_id: i64) -> VoteView {
        VoteView {
            vote_id,
            voting_id: 1,
            property_unit_id: Some(100 + vote_id),
            voting_option_id: 7,
            option_text: "Yes".to_string(),
            option_code: "yes".to_string(),
            option_color: Some("#2e7d32".to_string()),
            cast_by_proxy: false,
            voted_at: Utc::now(),
        }
    }

    async fn wait_for_unsubscribe(cache: &LiveVoteCache, voting_id: i64) {
        for _ in 0..50 {
            if cache.subscriber_count(voting_id) == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscriber was not removed");
    }

    #[tokio::test]
    async fn voting_state_returns_isolated_copy() {
        let cache = LiveVoteCache::new(8);
        cache.initialize_voting(1, vec![vote(1), vote(2)]);

        let mut snapshot = cache.voting_state(1);
        snapshot.clear();
        snapshot.push(vote(99));

        let fresh = cache.voting_state(1);
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].vote_id, 1);
        assert_eq!(fresh[1].vote_id, 2);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let cache = Arc::new(LiveVoteCache::new(32));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut subscription = cache.subscribe(1, cancel_rx);

        for id in 1..=20 {
            cache.publish_vote(1, vote(id));
        }

        for expected in 1..=20 {
            let event = subscription.receiver.recv().await.expect("event delivered");
            assert_eq!(event.name(), "new_vote");
            assert_eq!(event.vote().vote_id, expected);
        }
        assert_eq!(cache.voting_state(1).len(), 20);
    }

    #[tokio::test]
    async fn late_snapshot_does_not_replace_published_votes() {
        let cache = LiveVoteCache::new(4);
        cache.publish_vote(1, vote(2));

        let state = cache.initialize_if_absent(1, vec![vote(1)]);
        assert_eq!(state.len(), 1);
        assert_eq!(state[0].vote_id, 2);

        let seeded = cache.initialize_if_absent(3, vec![vote(1)]);
        assert_eq!(seeded.len(), 1);
        assert!(cache.is_initialized(3));
    }

    #[tokio::test]
    async fn publish_is_deduplicated_by_vote_id() {
        let cache = LiveVoteCache::new(4);
        cache.initialize_voting(1, vec![vote(1)]);
        cache.publish_vote(1, vote(1));
        assert_eq!(cache.voting_state(1).len(), 1);
    }

    #[tokio::test]
    async fn remove_vote_emits_prior_data() {
        let cache = Arc::new(LiveVoteCache::new(8));
        cache.initialize_voting(1, vec![vote(1), vote(2)]);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut subscription = cache.subscribe(1, cancel_rx);

        let removed = cache.remove_vote(1, 2).expect("vote cached");
        assert_eq!(removed.vote_id, 2);
        assert!(cache.remove_vote(1, 2).is_none());

        let event = subscription.receiver.recv().await.expect("event delivered");
        assert_eq!(
            event,
            VoteEvent::VoteDeleted {
                voting_id: 1,
                vote: removed
            }
        );
        assert_eq!(cache.voting_state(1).len(), 1);
    }

    #[tokio::test]
    async fn full_buffer_drops_newest_without_blocking() {
        let cache = Arc::new(LiveVoteCache::new(2));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut subscription = cache.subscribe(1, cancel_rx);

        for id in 1..=5 {
            cache.publish_vote(1, vote(id));
        }

        let first = subscription.receiver.recv().await.expect("first event");
        let second = subscription.receiver.recv().await.expect("second event");
        assert_eq!(first.vote().vote_id, 1);
        assert_eq!(second.vote().vote_id, 2);
        assert!(subscription.receiver.try_recv().is_err());

        // the cache itself keeps every vote for resynchronization
        assert_eq!(cache.voting_state(1).len(), 5);
        assert_eq!(cache.subscriber_count(1), 1);
    }

    #[tokio::test]
    async fn unsubscribe_closes_channel_and_stops_delivery() {
        let cache = Arc::new(LiveVoteCache::new(8));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut subscription = cache.subscribe(1, cancel_rx);

        cache.publish_vote(1, vote(1));
        assert!(cache.unsubscribe(1, subscription.id));
        cache.publish_vote(1, vote(2));

        let event = subscription.receiver.recv().await.expect("buffered event");
        assert_eq!(event.vote().vote_id, 1);
        assert!(subscription.receiver.recv().await.is_none());
        assert_eq!(cache.subscriber_count(1), 0);
        assert_eq!(cache.voting_state(1).len(), 2);
    }

    #[tokio::test]
    async fn cancel_signal_tears_down_subscription() {
        let cache = Arc::new(LiveVoteCache::new(8));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut subscription = cache.subscribe(1, cancel_rx);
        assert_eq!(cache.subscriber_count(1), 1);

        cancel_tx.send(true).expect("watcher alive");
        wait_for_unsubscribe(&cache, 1).await;

        let closed = timeout(Duration::from_secs(1), subscription.receiver.recv())
            .await
            .expect("channel closes");
        assert!(closed.is_none());
    }

    #[tokio::test]
    async fn dropping_cancel_sender_tears_down_subscription() {
        let cache = Arc::new(LiveVoteCache::new(8));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let _subscription = cache.subscribe(1, cancel_rx);

        drop(cancel_tx);
        wait_for_unsubscribe(&cache, 1).await;
    }

    #[tokio::test]
    async fn dropping_receiver_releases_subscription() {
        let cache = Arc::new(LiveVoteCache::new(8));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let subscription = cache.subscribe(1, cancel_rx);
        assert_eq!(cache.subscriber_count(1), 1);

        drop(subscription);
        wait_for_unsubscribe(&cache, 1).await;
    }

    #[tokio::test]
    async fn watcher_exits_after_explicit_unsubscribe() {
        let cache = Arc::new(LiveVoteCache::new(8));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let subscription = cache.subscribe(1, cancel_rx);

        assert!(cache.unsubscribe(1, subscription.id));
        // the watcher owns the only cancel receiver
        timeout(Duration::from_secs(1), cancel_tx.closed())
            .await
            .expect("watcher task finished");
    }

    #[tokio::test]
    async fn clear_voting_closes_all_subscribers() {
        let cache = Arc::new(LiveVoteCache::new(8));
        cache.initialize_voting(1, vec![vote(1)]);
        let (_a_tx, a_rx) = watch::channel(false);
        let (_b_tx, b_rx) = watch::channel(false);
        let mut first = cache.subscribe(1, a_rx);
        let mut second = cache.subscribe(1, b_rx);

        cache.clear_voting(1);

        assert!(first.receiver.recv().await.is_none());
        assert!(second.receiver.recv().await.is_none());
        assert!(!cache.is_initialized(1));
        assert_eq!(cache.stats().subscribers, 0);
    }

    #[tokio::test]
    async fn disconnect_all_keeps_cached_votes() {
        let cache = Arc::new(LiveVoteCache::new(8));
        cache.initialize_voting(1, vec![vote(1)]);
        let (_a_tx, a_rx) = watch::channel(false);
        let (_b_tx, b_rx) = watch::channel(false);
        let mut first = cache.subscribe(1, a_rx);
        let mut second = cache.subscribe(2, b_rx);

        assert_eq!(cache.disconnect_all(), 2);

        assert!(first.receiver.recv().await.is_none());
        assert!(second.receiver.recv().await.is_none());
        assert_eq!(cache.voting_state(1).len(), 1);
    }

    #[tokio::test]
    async fn motions_are_isolated() {
        let cache = Arc::new(LiveVoteCache::new(8));
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let mut other = cache.subscribe(2, cancel_rx);

        cache.publish_vote(1, vote(1));

        assert!(other.receiver.try_recv().is_err());
        assert!(cache.voting_state(2).is_empty());
        assert_eq!(cache.stats().motions, 1);
    }
}

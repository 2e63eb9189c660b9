//! Health state of one realtime subscription.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ChangeFeed, ChannelStatus, FeedItem, RowChange, Subscription, SubscriptionFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Connecting,
    Subscribed,
    /// Events may have been lost; local state is resynced from the store.
    Degraded,
    Closed,
}

/// Inputs driving [`ChannelState::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSignal {
    Status(ChannelStatus),
    EventReceived,
}

impl From<ChannelStatus> for ChannelSignal {
    fn from(status: ChannelStatus) -> Self {
        ChannelSignal::Status(status)
    }
}

/// Work the consumer must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    /// Refetch the full state instead of trusting incremental updates.
    Resync,
    /// Stop reading the subscription.
    Teardown,
}

impl ChannelState {
    /// Applies a signal, returning the next state and the action it requires.
    /// `Closed` is terminal.
    pub fn on(self, signal: impl Into<ChannelSignal>) -> (ChannelState, Option<ChannelAction>) {
        use ChannelState::*;
        use ChannelStatus as S;

        match (self, signal.into()) {
            (Closed, _) => (Closed, None),
            (_, ChannelSignal::Status(S::Closed)) => (Closed, Some(ChannelAction::Teardown)),
            (_, ChannelSignal::Status(S::ChannelError | S::TimedOut)) => {
                (Degraded, Some(ChannelAction::Resync))
            }
            (_, ChannelSignal::Status(S::Subscribed)) => (Subscribed, None),
            (Degraded, ChannelSignal::EventReceived) => (Subscribed, None),
            (state, ChannelSignal::EventReceived) => (state, None),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ChannelState::Subscribed | ChannelState::Degraded)
    }
}

/// What a consumer of a [`ManagedChannel`] has to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Change(RowChange),
    Action(ChannelAction),
}

/// A subscription driven through [`ChannelState`].
///
/// Status signals are folded into the state machine and only surface when
/// they require an action. A subscription that has not confirmed within the
/// subscribe timeout is treated as timed out.
#[derive(Debug)]
pub struct ManagedChannel {
    subscription: Option<Subscription>,
    state: ChannelState,
    connect_deadline: Instant,
}

impl ManagedChannel {
    pub fn open(feed: &ChangeFeed, filter: SubscriptionFilter, subscribe_timeout: Duration) -> Self {
        debug!(table = %filter.table, "Opening realtime channel");
        Self {
            subscription: Some(feed.subscribe(filter)),
            state: ChannelState::Connecting,
            connect_deadline: Instant::now() + subscribe_timeout,
        }
    }

    /// A channel with nothing to watch; `next` never resolves.
    pub fn idle() -> Self {
        Self {
            subscription: None,
            state: ChannelState::Closed,
            connect_deadline: Instant::now(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Unsubscribes.
    pub fn close(&mut self) {
        self.subscription = None;
        self.state = ChannelState::Closed;
    }

    /// Next change or required action. Pending forever once closed.
    /// Cancel safe: nothing is consumed until an item is returned.
    pub async fn next(&mut self) -> ChannelEvent {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return std::future::pending().await;
            };

            let item = if self.state == ChannelState::Connecting {
                match tokio::time::timeout_at(self.connect_deadline, subscription.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        warn!("Realtime subscription timed out");
                        Some(FeedItem::Status(ChannelStatus::TimedOut))
                    }
                }
            } else {
                subscription.next().await
            };

            let signal = match item {
                Some(FeedItem::Change(change)) => {
                    self.state = self.state.on(ChannelSignal::EventReceived).0;
                    return ChannelEvent::Change(change);
                }
                Some(FeedItem::Status(status)) => status,
                None => ChannelStatus::Closed,
            };

            let (next, action) = self.state.on(signal);
            debug!(from = ?self.state, to = ?next, ?signal, "Channel transition");
            self.state = next;
            match action {
                Some(ChannelAction::Teardown) => {
                    self.subscription = None;
                    return ChannelEvent::Action(ChannelAction::Teardown);
                }
                Some(action) => return ChannelEvent::Action(action),
                None => continue,
            }
        }
    }
}

//! Live order-status counters for the admin dashboard.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::counters::{CounterOutcome, StatusCounters};
use crate::api::OrderSource;
use crate::bus::{AppBus, AppEvent};
use crate::clients::ServiceResponse;
use crate::domain::OrderStatus;
use crate::realtime::{ChangeFeed, ChannelAction, ChannelEvent, ManagedChannel, SubscriptionFilter};

/// Queued feed events read ahead of a due refetch.
const MAX_EVENTS_BEFORE_RESYNC: usize = 32;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CountersError {
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

#[derive(Debug)]
pub enum CountersRequest {
    GetCounts {
        respond_to: ServiceResponse<StatusCounters, CountersError>,
    },
    Resync {
        respond_to: ServiceResponse<(), CountersError>,
    },
    Shutdown,
}

/// Keeps [`StatusCounters`] current from the `commandes` change feed.
///
/// Events are applied incrementally when they carry enough information;
/// everything else falls back to a full refetch. Refetch requests that pile
/// up before one runs are served by a single refetch.
pub struct CounterService {
    receiver: mpsc::Receiver<CountersRequest>,
    source: Arc<dyn OrderSource>,
    /// Consumed when the subscription opens.
    feed: Option<ChangeFeed>,
    bus: Option<broadcast::Receiver<AppEvent>>,
    channel: ManagedChannel,
    counters: StatusCounters,
    debounce: Duration,
    subscribe_timeout: Duration,
    resync_at: Option<Instant>,
}

impl CounterService {
    pub fn new(
        buffer_size: usize,
        source: Arc<dyn OrderSource>,
        feed: ChangeFeed,
        bus: &AppBus,
        debounce: Duration,
        subscribe_timeout: Duration,
    ) -> (Self, CountersClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let service = Self {
            receiver,
            source,
            feed: Some(feed),
            bus: Some(bus.subscribe()),
            channel: ManagedChannel::idle(),
            counters: StatusCounters::default(),
            debounce,
            subscribe_timeout,
            resync_at: None,
        };
        (service, CountersClient::new(sender))
    }

    #[instrument(name = "counter_service", skip(self))]
    pub async fn run(mut self) {
        info!("CounterService starting");

        self.resync().await;
        if let Some(feed) = self.feed.take() {
            self.channel = ManagedChannel::open(
                &feed,
                SubscriptionFilter::table("commandes"),
                self.subscribe_timeout,
            );
        }

        loop {
            if matches!(self.resync_at, Some(at) if at <= Instant::now()) {
                self.run_due_resync().await;
                continue;
            }

            let deadline = self.resync_at.unwrap_or_else(Instant::now);
            tokio::select! {
                biased;

                msg = self.receiver.recv() => match msg {
                    Some(CountersRequest::GetCounts { respond_to }) => {
                        let _ = respond_to.send(Ok(self.counters.clone()));
                    }
                    Some(CountersRequest::Resync { respond_to }) => {
                        self.resync_at = None;
                        self.resync().await;
                        let _ = respond_to.send(Ok(()));
                    }
                    Some(CountersRequest::Shutdown) | None => {
                        info!("CounterService shutting down");
                        break;
                    }
                },
                event = self.channel.next() => self.on_channel_event(event),
                app = next_app_event(&mut self.bus) => match app {
                    Ok(AppEvent::OrderStatusChanged { order_id, statut }) => {
                        debug!(%order_id, %statut, "Status change announced");
                        self.schedule_resync(self.debounce);
                    }
                    Ok(AppEvent::OrderDeleted { order_id }) => {
                        debug!(%order_id, "Order deletion announced");
                        self.schedule_resync(self.debounce);
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => self.schedule_resync(self.debounce),
                    Err(broadcast::error::RecvError::Closed) => self.bus = None,
                },
                _ = tokio::time::sleep_until(deadline), if self.resync_at.is_some() => {}
            }
        }

        self.channel.close();
        info!("CounterService stopped");
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Change(change) => match self.counters.apply(&change) {
                CounterOutcome::Applied => debug!(kind = ?change.kind, "Counters updated"),
                CounterOutcome::Ignored => {}
                CounterOutcome::NeedsResync => self.schedule_resync(Duration::ZERO),
            },
            ChannelEvent::Action(ChannelAction::Resync) => {
                warn!("Order channel degraded, resyncing counters");
                self.schedule_resync(Duration::ZERO);
            }
            ChannelEvent::Action(ChannelAction::Teardown) => {
                warn!("Order channel closed, counters frozen at last known values");
            }
        }
    }

    /// Applies events already queued on the channel, at most
    /// [`MAX_EVENTS_BEFORE_RESYNC`] of them, then refetches.
    async fn run_due_resync(&mut self) {
        for _ in 0..MAX_EVENTS_BEFORE_RESYNC {
            let event = tokio::select! {
                biased;
                event = self.channel.next() => event,
                _ = std::future::ready(()) => break,
            };
            self.on_channel_event(event);
        }
        self.resync_at = None;
        self.resync().await;
    }

    /// A pending immediate resync absorbs later requests; a pending delayed
    /// one is pushed back.
    fn schedule_resync(&mut self, delay: Duration) {
        let now = Instant::now();
        self.resync_at = match self.resync_at {
            Some(due) if due <= now => Some(due),
            _ => Some(now + delay),
        };
    }

    /// Refetches every status concurrently. A failed fetch keeps that
    /// status's last known count.
    #[instrument(skip(self))]
    async fn resync(&mut self) {
        let mut fetches = JoinSet::new();
        for statut in OrderStatus::ALL {
            let source = Arc::clone(&self.source);
            fetches.spawn(async move { (statut, source.orders_by_status(statut).await) });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((statut, Ok(orders))) => self.counters.set(statut, orders.len() as u64),
                Ok((statut, Err(e))) => {
                    warn!(%statut, error = %e, "Count fetch failed, keeping last known value")
                }
                Err(e) => warn!(error = %e, "Count fetch task failed"),
            }
        }
        info!(total = self.counters.total(), "Counters resynced");
    }
}

async fn next_app_event(
    bus: &mut Option<broadcast::Receiver<AppEvent>>,
) -> Result<AppEvent, broadcast::error::RecvError> {
    match bus {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Client for [`CounterService`].
#[derive(Clone)]
pub struct CountersClient {
    sender: mpsc::Sender<CountersRequest>,
}

impl CountersClient {
    pub fn new(sender: mpsc::Sender<CountersRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), CountersError> {
        debug!("Sending shutdown request");
        self.sender
            .send(CountersRequest::Shutdown)
            .await
            .map_err(|e| CountersError::ActorCommunicationError(e.to_string()))
    }
}

crate::client_method!(CountersClient => fn get_counts() -> StatusCounters as CountersRequest::GetCounts, Error = CountersError);
crate::client_method!(CountersClient => fn resync() -> () as CountersRequest::Resync, Error = CountersError);

//! Continuous stock validation for the open cart.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::reconciler::{assess_line, validate_cart, StockNotice};
use crate::api::ProductSource;
use crate::clients::ServiceResponse;
use crate::domain::{CartItem, Product};
use crate::realtime::{
    ChangeFeed, ChangeKind, ChannelAction, ChannelEvent, ManagedChannel, RowChange, SubscriptionFilter,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum WatcherError {
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),
}

#[derive(Debug)]
pub enum WatcherRequest {
    SetLines {
        lines: Vec<CartItem>,
        respond_to: ServiceResponse<(), WatcherError>,
    },
    Shutdown,
}

/// Watches product updates for the lines currently in the cart and emits a
/// [`StockNotice`] whenever a line can no longer be fully served.
///
/// Each event is assessed from its own payload only, so out-of-order
/// delivery settles on whatever the last event says.
pub struct StockWatcher {
    receiver: mpsc::Receiver<WatcherRequest>,
    feed: ChangeFeed,
    source: Arc<dyn ProductSource>,
    notices: mpsc::Sender<StockNotice>,
    subscribe_timeout: Duration,
    lines: Vec<CartItem>,
    channel: ManagedChannel,
}

impl StockWatcher {
    pub fn new(
        buffer_size: usize,
        feed: ChangeFeed,
        source: Arc<dyn ProductSource>,
        notices: mpsc::Sender<StockNotice>,
        subscribe_timeout: Duration,
    ) -> (Self, WatcherClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let watcher = Self {
            receiver,
            feed,
            source,
            notices,
            subscribe_timeout,
            lines: Vec::new(),
            channel: ManagedChannel::idle(),
        };
        (watcher, WatcherClient::new(sender))
    }

    #[instrument(name = "stock_watcher", skip(self))]
    pub async fn run(mut self) {
        info!("StockWatcher starting");

        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(WatcherRequest::SetLines { lines, respond_to }) => {
                        self.handle_set_lines(lines);
                        let _ = respond_to.send(Ok(()));
                    }
                    Some(WatcherRequest::Shutdown) | None => {
                        info!("StockWatcher shutting down");
                        break;
                    }
                },
                event = self.channel.next() => match event {
                    ChannelEvent::Change(change) => self.handle_change(change).await,
                    ChannelEvent::Action(ChannelAction::Resync) => self.handle_resync().await,
                    ChannelEvent::Action(ChannelAction::Teardown) => {
                        warn!("Product channel closed, stock updates stopped");
                    }
                },
            }
        }

        self.channel.close();
        info!("StockWatcher stopped");
    }

    /// Replaces the watched lines and re-subscribes for their product ids.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    fn handle_set_lines(&mut self, lines: Vec<CartItem>) {
        let mut ids: Vec<String> = lines.iter().map(|l| l.produit_id.clone()).collect();
        ids.sort();
        ids.dedup();
        self.lines = lines;

        self.channel = if ids.is_empty() {
            debug!("Cart empty, nothing to watch");
            ManagedChannel::idle()
        } else {
            let filter = SubscriptionFilter::table("produits")
                .only(&[ChangeKind::Update])
                .column_in("id", ids);
            ManagedChannel::open(&self.feed, filter, self.subscribe_timeout)
        };
    }

    async fn handle_change(&mut self, change: RowChange) {
        let Some(row) = change.new else {
            debug!("Update without new row ignored");
            return;
        };
        let product: Product = match serde_json::from_value(row) {
            Ok(product) => product,
            Err(e) => {
                warn!(error = %e, "Undecodable product payload skipped");
                return;
            }
        };

        let notices: Vec<StockNotice> = self
            .lines
            .iter()
            .filter(|line| line.produit_id == product.id)
            .filter_map(|line| {
                let (_, issue) = assess_line(&product, line);
                issue.map(|issue| StockNotice {
                    key: line.key(),
                    nom: line.nom.clone(),
                    issue,
                })
            })
            .collect();

        debug!(product_id = %product.id, notices = notices.len(), "Product update assessed");
        self.emit(notices).await;
    }

    /// Events may have been lost: re-check every line from the source.
    async fn handle_resync(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        info!("Revalidating cart after channel degradation");
        let report = validate_cart(Arc::clone(&self.source), &self.lines).await;
        self.emit(report.notices()).await;
    }

    async fn emit(&self, notices: Vec<StockNotice>) {
        for notice in notices {
            warn!(product_id = %notice.key.produit_id, "{}", notice.message());
            if self.notices.send(notice).await.is_err() {
                debug!("Notice receiver dropped");
                return;
            }
        }
    }
}

/// Client for [`StockWatcher`].
#[derive(Clone)]
pub struct WatcherClient {
    sender: mpsc::Sender<WatcherRequest>,
}

impl WatcherClient {
    pub fn new(sender: mpsc::Sender<WatcherRequest>) -> Self {
        Self { sender }
    }

    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), WatcherError> {
        debug!("Sending shutdown request");
        self.sender
            .send(WatcherRequest::Shutdown)
            .await
            .map_err(|e| WatcherError::ActorCommunicationError(e.to_string()))
    }
}

crate::client_method!(WatcherClient => fn set_lines(lines: Vec<CartItem>) -> () as WatcherRequest::SetLines, Error = WatcherError);

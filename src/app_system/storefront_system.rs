use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::actor_framework::ResourceActor;
use crate::admin::{AdminOrders, CounterService, CountersClient};
use crate::api::{ApiError, HttpApi};
use crate::bus::AppBus;
use crate::clients::{CommentClient, OrderClient, ProductClient};
use crate::config::AppConfig;
use crate::domain::{Comment, Order, Product};
use crate::realtime::{ChangeFeed, ReplicaIdentity};
use crate::storefront::{
    CartStore, Checkout, LocalStorage, StockNotice, StockWatcher, WatcherClient, WishlistStore,
};

/// Sequential ids of the form `<prefix>_<n>`.
fn id_sequence(prefix: &'static str) -> impl Fn() -> String + Send + Sync + 'static {
    let counter = AtomicU64::new(1);
    move || format!("{}_{}", prefix, counter.fetch_add(1, Ordering::SeqCst))
}

/// Starts the table actors and the services around them, and shuts them
/// down in dependency order.
pub struct StorefrontSystem {
    pub product_client: ProductClient,
    pub order_client: OrderClient,
    pub comment_client: CommentClient,
    pub counters: CountersClient,
    pub feed: ChangeFeed,
    pub bus: AppBus,
    config: AppConfig,
    watchers: Vec<(WatcherClient, JoinHandle<()>)>,
    service_handles: Vec<JoinHandle<()>>,
    actor_handles: Vec<JoinHandle<()>>,
}

impl StorefrontSystem {
    pub fn new(config: AppConfig) -> Self {
        let feed = ChangeFeed::new(config.feed_capacity);
        let bus = AppBus::new(config.channel_buffer);

        // Tables keep the default replica identity: UPDATE events carry
        // only the id in their old row.
        let (product_actor, product_inner) =
            ResourceActor::<Product>::new(config.channel_buffer, id_sequence("produit"));
        let product_client = ProductClient::new(product_inner);
        let product_handle =
            tokio::spawn(product_actor.with_change_feed(feed.clone(), ReplicaIdentity::Default).run());

        let (order_actor, order_inner) =
            ResourceActor::<Order>::new(config.channel_buffer, id_sequence("commande"));
        let order_client = OrderClient::new(order_inner, product_client.clone());
        let order_handle =
            tokio::spawn(order_actor.with_change_feed(feed.clone(), ReplicaIdentity::Default).run());

        let (comment_actor, comment_inner) =
            ResourceActor::<Comment>::new(config.channel_buffer, id_sequence("commentaire"));
        let comment_client = CommentClient::new(comment_inner, product_client.clone());
        let comment_handle =
            tokio::spawn(comment_actor.with_change_feed(feed.clone(), ReplicaIdentity::Default).run());

        let (counter_service, counters) = CounterService::new(
            config.channel_buffer,
            Arc::new(order_client.clone()),
            feed.clone(),
            &bus,
            config.resync_debounce,
            config.subscribe_timeout,
        );
        let counters_handle = tokio::spawn(counter_service.run());

        info!("Storefront system started");
        Self {
            product_client,
            order_client,
            comment_client,
            counters,
            feed,
            bus,
            config,
            watchers: Vec::new(),
            service_handles: vec![counters_handle],
            actor_handles: vec![product_handle, order_handle, comment_handle],
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn checkout(&self) -> Checkout {
        Checkout::new(
            Arc::new(self.product_client.clone()),
            Arc::new(self.order_client.clone()),
        )
    }

    pub fn admin_orders(&self) -> AdminOrders {
        AdminOrders::new(Arc::new(self.order_client.clone()), self.bus.clone())
    }

    /// Client for the deployed `/api` routes, from `api_base_url` and
    /// `http_timeout`.
    pub fn http_api(&self) -> Result<HttpApi, ApiError> {
        HttpApi::new(&self.config.api_base_url, self.config.http_timeout)
    }

    pub fn cart_store(&self) -> CartStore {
        CartStore::new(LocalStorage::new(self.config.storage_dir.clone()))
    }

    pub fn wishlist_store(&self) -> WishlistStore {
        WishlistStore::new(LocalStorage::new(self.config.storage_dir.clone()))
    }

    /// Starts a stock watcher reporting on `notices`.
    pub fn watch_stock(&mut self, notices: mpsc::Sender<StockNotice>) -> WatcherClient {
        let (watcher, client) = StockWatcher::new(
            self.config.channel_buffer,
            self.feed.clone(),
            Arc::new(self.product_client.clone()),
            notices,
            self.config.subscribe_timeout,
        );
        let handle = tokio::spawn(watcher.run());
        self.watchers.push((client.clone(), handle));
        client
    }

    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");

        // Services first: they hold clients of the table actors.
        for (watcher, handle) in self.watchers {
            if let Err(e) = watcher.shutdown().await {
                error!(error = %e, "Stock watcher already stopped");
            }
            join(handle).await?;
        }
        if let Err(e) = self.counters.shutdown().await {
            error!(error = %e, "Counter service already stopped");
        }
        for handle in self.service_handles {
            join(handle).await?;
        }

        // Table actors stop once every client is dropped.
        drop(self.order_client);
        drop(self.comment_client);
        drop(self.product_client);
        for handle in self.actor_handles {
            join(handle).await?;
        }

        info!("System shutdown complete.");
        Ok(())
    }
}

async fn join(handle: JoinHandle<()>) -> Result<(), String> {
    handle.await.map_err(|e| {
        error!("Task failed: {:?}", e);
        format!("Task failed: {:?}", e)
    })
}

use tokio::sync::mpsc;
use tracing::{error, info, warn, Instrument};

use maison_slimani::app_system::{setup_tracing, StorefrontSystem};
use maison_slimani::config::AppConfig;
use maison_slimani::domain::{CartItem, Couleur, Customer, OrderStatus, ProductCreate, TailleStock, WishlistItem};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    info!(storage_dir = %config.storage_dir.display(), "Starting storefront system");

    let mut system = StorefrontSystem::new(config);
    let api = system.http_api().map_err(|e| e.to_string())?;
    info!(base_url = api.base_url(), "Remote API configured");

    let span = tracing::info_span!("catalog_setup");
    let product_id = async {
        info!("Creating demo product");
        system
            .product_client
            .create_product(ProductCreate {
                nom: "Mocassin cuir".into(),
                prix: 890.0,
                stock: None,
                couleurs: vec![Couleur::new("Noir", "#000000", 0).with_tailles(vec![
                    TailleStock { taille: "42".into(), stock: 2 },
                    TailleStock { taille: "43".into(), stock: 1 },
                ])],
                categorie: Some("chaussures".into()),
                image_url: None,
            })
            .await
            .map_err(|e| e.to_string())
    }
    .instrument(span)
    .await?;
    info!(product_id = %product_id, "Product created successfully");

    let mut wishlist = system.wishlist_store();
    wishlist.load().await.map_err(|e| e.to_string())?;
    let saved = wishlist
        .toggle(WishlistItem::new(product_id.clone(), "Mocassin cuir", 890.0))
        .await
        .map_err(|e| e.to_string())?;
    info!(saved, favorites = wishlist.items().len(), "Wishlist updated");

    let (notice_tx, mut notice_rx) = mpsc::channel(16);
    let watcher = system.watch_stock(notice_tx);

    let mut cart = system.cart_store();
    cart.load().await.map_err(|e| e.to_string())?;
    cart.clear().await.map_err(|e| e.to_string())?;
    let line = CartItem::new(product_id.clone(), "Mocassin cuir", 890.0, 2, Some(2))
        .with_couleur("Noir")
        .with_taille("42");
    cart.add(line).await.map_err(|e| e.to_string())?;
    watcher
        .set_lines(cart.lines().to_vec())
        .await
        .map_err(|e| e.to_string())?;

    let customer = Customer {
        client_nom: "Yasmine Alaoui".into(),
        client_email: Some("yasmine@example.com".into()),
        client_telephone: "0661000000".into(),
        adresse: "8 derb Sidi Bouloukat".into(),
        ville: "Marrakech".into(),
    };

    let span = tracing::info_span!("checkout");
    let checkout = system.checkout();
    let max_age = system.config().snapshot_max_age;
    let order = async {
        if let Err(e) = checkout.refresh_snapshots(&mut cart, max_age).await {
            warn!(error = %e, "Stock snapshots not refreshed");
        }
        info!("Submitting cart");
        checkout.submit(&mut cart, customer).await
    }
    .instrument(span)
    .await;
    drop(checkout);

    match order {
        Ok(order) => {
            info!(order_id = %order.id, total = order.total, "Order placed");

            let admin = system.admin_orders();
            if let Err(e) = admin.set_status(order.id.clone(), OrderStatus::Expediee).await {
                error!(error = %e, "Status update failed");
            }
            drop(admin);
        }
        Err(e) => error!(error = %e, "Checkout failed"),
    }

    while let Ok(notice) = notice_rx.try_recv() {
        warn!("{}", notice.message());
    }

    if let Err(e) = system.counters.resync().await {
        error!(error = %e, "Counter resync failed");
    }
    match system.counters.get_counts().await {
        Ok(counts) => {
            for (statut, count) in counts.iter() {
                info!(%statut, count, "Order counter");
            }
        }
        Err(e) => error!(error = %e, "Counters unavailable"),
    }

    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}

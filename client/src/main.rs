//! tabula-sync - keeps a local copy of the inventory spreadsheet in sync
//! and flushes queued writes until interrupted.

use tabula_client::{Config, Notice, SyncClient};
use tabula_engine::EntityKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabula_client=debug,tabula_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        spreadsheet = %config.spreadsheet_id,
        api = %config.api_base_url,
        "Starting tabula-sync"
    );

    let client = SyncClient::from_config(&config).await?;

    for kind in EntityKind::ALL {
        match client.repository().verify_header(&kind.schema()).await {
            Ok(mismatches) if mismatches.is_empty() => {}
            Ok(mismatches) => {
                tracing::warn!(entity = %kind, ?mismatches, "Header does not match expected layout")
            }
            Err(e) => tracing::warn!(entity = %kind, error = %e, "Could not verify header"),
        }
    }

    let report = client.cache.initial_load().await;
    let snapshot = client.cache.snapshot();
    tracing::info!(
        products = snapshot.dataset.products.len(),
        suppliers = snapshot.dataset.suppliers.len(),
        inventory = snapshot.dataset.inventory.len(),
        failed = ?report.failed,
        pending = client.cache.pending_count(),
        "Initial load complete"
    );

    let mut notices = client.cache.subscribe();
    let runtime = client.start();

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(Notice::MutationFailed { entity, key, message }) => {
                    tracing::error!(%entity, %key, %message, "Mutation failed");
                }
                Ok(Notice::QueuedForSync { entity, key, .. }) => {
                    tracing::info!(%entity, %key, "Queued for sync");
                }
                Ok(Notice::QueueDrained { applied }) => {
                    tracing::info!(applied, "Offline queue drained");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Notice subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}

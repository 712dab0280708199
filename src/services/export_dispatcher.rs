// src/services/export_dispatcher.rs
use crate::errors::ListingError;
use crate::models::*;
use crate::services::ListingStore;
use chrono::Utc;
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

/// Records marketplace exports for stored listings.
///
/// Exporting to a marketplace where the listing is already `published` is a
/// no-op that returns the existing record. Exports of the same listing run one
/// at a time; different listings proceed independently. Across processes the
/// store's `publish_export` keeps the first published record.
pub struct ExportDispatcher {
    store: Arc<dyn ListingStore>,
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl ExportDispatcher {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn listing_lock(&self, id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id).or_default().clone()
    }

    /// Drops the lock entry once no other export of the listing holds it.
    fn release_lock(&self, id: Uuid, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&id);
        }
    }

    pub async fn export(
        &self,
        request: ExportRequest,
    ) -> Result<Vec<MarketplaceListing>, ListingError> {
        if request.marketplaces.is_empty() {
            return Err(ListingError::Validation(
                "At least one marketplace is required".to_string(),
            ));
        }

        let listing_id = request.listing_id;
        let lock = self.listing_lock(listing_id);
        let result = {
            let _guard = lock.lock().await;
            self.export_locked(request).await
        };
        self.release_lock(listing_id, lock);
        result
    }

    async fn export_locked(
        &self,
        request: ExportRequest,
    ) -> Result<Vec<MarketplaceListing>, ListingError> {
        let marketplaces: BTreeSet<Marketplace> = request.marketplaces.into_iter().collect();
        let listing = self.store.get(&request.listing_id).await?;

        let mut results = Vec::with_capacity(marketplaces.len());
        for marketplace in marketplaces {
            if let Some(existing) = self.store.get_export(&listing.id, marketplace).await? {
                if existing.status == ExportStatus::Published {
                    info!("Listing {} already published on {}", listing.id, marketplace);
                    results.push(existing);
                    continue;
                }
            }

            let record = evaluate(&listing, marketplace);
            match record.status {
                ExportStatus::Published => {
                    let stored = self.store.publish_export(&record).await?;
                    info!("Published {} on {}", listing.id, marketplace);
                    results.push(stored);
                }
                ExportStatus::Draft => {
                    info!("Exported {} to {} as draft", listing.id, marketplace);
                    self.store.put_export(&record).await?;
                    results.push(record);
                }
                ExportStatus::Error => {
                    warn!(
                        "Export of {} to {} failed: {}",
                        listing.id,
                        marketplace,
                        record.error.as_deref().unwrap_or("")
                    );
                    self.store.put_export(&record).await?;
                    results.push(record);
                }
            }
        }

        Ok(results)
    }
}

/// Names of required marketplace fields the listing does not fill.
pub fn missing_fields(listing: &ProductListing, marketplace: Marketplace) -> Vec<&'static str> {
    marketplace
        .required_fields()
        .iter()
        .copied()
        .filter(|field| match *field {
            "title" => listing.title.trim().is_empty(),
            "description" => listing.description.trim().is_empty(),
            "images" => listing.images.is_empty(),
            "category" => listing.category.trim().is_empty(),
            "tags" => listing.features.is_empty(),
            "condition" => !listing.specifications.contains_key("Condition"),
            // Price may be unset (draft); a single default variant is always created.
            _ => false,
        })
        .collect()
}

fn evaluate(listing: &ProductListing, marketplace: Marketplace) -> MarketplaceListing {
    let missing = missing_fields(listing, marketplace);

    let (status, url, error) = if !missing.is_empty() {
        (
            ExportStatus::Error,
            None,
            Some(format!("Missing required fields: {}", missing.join(", "))),
        )
    } else if listing.price <= 0.0 {
        (ExportStatus::Draft, None, None)
    } else {
        (
            ExportStatus::Published,
            Some(marketplace.listing_url(&listing.id)),
            None,
        )
    };

    MarketplaceListing {
        platform: marketplace,
        listing_id: listing.id,
        status,
        url,
        error,
        updated_at: Utc::now(),
    }
}

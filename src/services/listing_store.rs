// src/services/listing_store.rs
use crate::errors::ListingError;
use crate::models::*;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Persistence for listings and their marketplace export records.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Assigns a fresh id and timestamps. Never deduplicates.
    async fn create(&self, draft: ListingDraft) -> Result<ProductListing, ListingError>;
    async fn get(&self, id: &Uuid) -> Result<ProductListing, ListingError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<ProductListing>, ListingError>;
    async fn update(&self, id: &Uuid, draft: ListingDraft) -> Result<ProductListing, ListingError>;

    async fn get_export(
        &self,
        listing_id: &Uuid,
        marketplace: Marketplace,
    ) -> Result<Option<MarketplaceListing>, ListingError>;
    /// Stores a `draft` or `error` record. A published record is final and
    /// is never replaced.
    async fn put_export(&self, record: &MarketplaceListing) -> Result<(), ListingError>;
    /// Stores a published record unless one already exists, returning
    /// whichever record holds the slot afterwards.
    async fn publish_export(
        &self,
        record: &MarketplaceListing,
    ) -> Result<MarketplaceListing, ListingError>;
    /// Every export record of a listing, ordered by marketplace.
    async fn exports_for(&self, listing_id: &Uuid) -> Result<Vec<MarketplaceListing>, ListingError>;
}

#[derive(Default)]
struct Tables {
    listings: HashMap<Uuid, ProductListing>,
    exports: HashMap<(Uuid, Marketplace), MarketplaceListing>,
}

/// Process-local store, used when no Redis URL is configured.
#[derive(Default)]
pub struct MemoryListingStore {
    tables: RwLock<Tables>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn create(&self, draft: ListingDraft) -> Result<ProductListing, ListingError> {
        let mut tables = self.tables.write().await;
        let mut id = Uuid::new_v4();
        while tables.listings.contains_key(&id) {
            id = Uuid::new_v4();
        }
        let listing = ProductListing::from_draft(id, draft);
        tables.listings.insert(id, listing.clone());
        Ok(listing)
    }

    async fn get(&self, id: &Uuid) -> Result<ProductListing, ListingError> {
        self.tables
            .read()
            .await
            .listings
            .get(id)
            .cloned()
            .ok_or_else(|| ListingError::NotFound(format!("listing {}", id)))
    }

    async fn list(&self) -> Result<Vec<ProductListing>, ListingError> {
        let mut listings: Vec<_> = self.tables.read().await.listings.values().cloned().collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    async fn update(&self, id: &Uuid, draft: ListingDraft) -> Result<ProductListing, ListingError> {
        let mut tables = self.tables.write().await;
        let listing = tables
            .listings
            .get_mut(id)
            .ok_or_else(|| ListingError::NotFound(format!("listing {}", id)))?;
        listing.apply(draft);
        Ok(listing.clone())
    }

    async fn get_export(
        &self,
        listing_id: &Uuid,
        marketplace: Marketplace,
    ) -> Result<Option<MarketplaceListing>, ListingError> {
        Ok(self
            .tables
            .read()
            .await
            .exports
            .get(&(*listing_id, marketplace))
            .cloned())
    }

    async fn put_export(&self, record: &MarketplaceListing) -> Result<(), ListingError> {
        let mut tables = self.tables.write().await;
        let key = (record.listing_id, record.platform);
        if tables
            .exports
            .get(&key)
            .is_some_and(|r| r.status == ExportStatus::Published)
        {
            return Ok(());
        }
        tables.exports.insert(key, record.clone());
        Ok(())
    }

    async fn publish_export(
        &self,
        record: &MarketplaceListing,
    ) -> Result<MarketplaceListing, ListingError> {
        let mut tables = self.tables.write().await;
        let key = (record.listing_id, record.platform);
        if let Some(existing) = tables.exports.get(&key) {
            if existing.status == ExportStatus::Published {
                return Ok(existing.clone());
            }
        }
        tables.exports.insert(key, record.clone());
        Ok(record.clone())
    }

    async fn exports_for(&self, listing_id: &Uuid) -> Result<Vec<MarketplaceListing>, ListingError> {
        let mut exports: Vec<_> = self
            .tables
            .read()
            .await
            .exports
            .values()
            .filter(|r| r.listing_id == *listing_id)
            .cloned()
            .collect();
        exports.sort_by_key(|r| r.platform);
        Ok(exports)
    }
}

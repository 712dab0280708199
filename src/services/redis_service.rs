// src/services/redis_service.rs
use crate::errors::ListingError;
use crate::models::*;
use crate::services::ListingStore;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use uuid::Uuid;

const LISTING_INDEX: &str = "listings";

fn listing_key(id: &Uuid) -> String {
    format!("listing:{}", id)
}

fn export_key(listing_id: &Uuid, marketplace: Marketplace) -> String {
    format!("export:{}:{}", listing_id, marketplace.name().to_lowercase())
}

/// Written once with `SET NX`; takes precedence over `export_key`.
fn published_key(listing_id: &Uuid, marketplace: Marketplace) -> String {
    format!("{}:published", export_key(listing_id, marketplace))
}

/// Set of marketplace names the listing has export records for.
fn export_index_key(listing_id: &Uuid) -> String {
    format!("listing:{}:exports", listing_id)
}

pub struct RedisService {
    conn: ConnectionManager,
}

impl RedisService {
    pub async fn new(redis_url: &str) -> Result<Self, ListingError> {
        let client = Client::open(redis_url)?;
        let mut conn = ConnectionManager::new(client).await?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;

        Ok(Self { conn })
    }

    async fn write_listing(&self, listing: &ProductListing) -> Result<(), ListingError> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(listing)?;
        conn.set::<_, _, ()>(listing_key(&listing.id), value).await?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for RedisService {
    async fn create(&self, draft: ListingDraft) -> Result<ProductListing, ListingError> {
        let mut conn = self.conn.clone();

        // SET NX claims the id; a collision just draws again.
        loop {
            let listing = ProductListing::from_draft(Uuid::new_v4(), draft.clone());
            let value = serde_json::to_string(&listing)?;

            let claimed: Option<String> = redis::cmd("SET")
                .arg(listing_key(&listing.id))
                .arg(value)
                .arg("NX")
                .query_async(&mut conn)
                .await?;

            if claimed.is_some() {
                let indexed = conn
                    .zadd::<_, _, _, ()>(
                        LISTING_INDEX,
                        listing.id.to_string(),
                        listing.created_at.timestamp_millis(),
                    )
                    .await;
                if let Err(e) = indexed {
                    // Don't leave a listing that `list` can never see.
                    let _ = conn.del::<_, ()>(listing_key(&listing.id)).await;
                    return Err(e.into());
                }
                return Ok(listing);
            }
        }
    }

    async fn get(&self, id: &Uuid) -> Result<ProductListing, ListingError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(listing_key(id)).await?;
        let value = value.ok_or_else(|| ListingError::NotFound(format!("listing {}", id)))?;
        Ok(serde_json::from_str(&value)?)
    }

    async fn list(&self) -> Result<Vec<ProductListing>, ListingError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.zrevrange(LISTING_INDEX, 0, -1).await?;

        let mut listings = Vec::with_capacity(ids.len());
        for id in ids {
            let Ok(id) = Uuid::parse_str(&id) else {
                continue;
            };
            let value: Option<String> = conn.get(listing_key(&id)).await?;
            if let Some(value) = value {
                listings.push(serde_json::from_str(&value)?);
            }
        }
        Ok(listings)
    }

    async fn update(&self, id: &Uuid, draft: ListingDraft) -> Result<ProductListing, ListingError> {
        let mut listing = self.get(id).await?;
        listing.apply(draft);
        self.write_listing(&listing).await?;
        Ok(listing)
    }

    async fn get_export(
        &self,
        listing_id: &Uuid,
        marketplace: Marketplace,
    ) -> Result<Option<MarketplaceListing>, ListingError> {
        let mut conn = self.conn.clone();
        let (published, latest): (Option<String>, Option<String>) = redis::pipe()
            .get(published_key(listing_id, marketplace))
            .get(export_key(listing_id, marketplace))
            .query_async(&mut conn)
            .await?;
        published
            .or(latest)
            .map(|v| serde_json::from_str(&v).map_err(ListingError::from))
            .transpose()
    }

    async fn put_export(&self, record: &MarketplaceListing) -> Result<(), ListingError> {
        let mut conn = self.conn.clone();
        let value = serde_json::to_string(record)?;
        redis::pipe()
            .atomic()
            .set(export_key(&record.listing_id, record.platform), value)
            .ignore()
            .sadd(export_index_key(&record.listing_id), record.platform.name())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn publish_export(
        &self,
        record: &MarketplaceListing,
    ) -> Result<MarketplaceListing, ListingError> {
        let mut conn = self.conn.clone();
        let key = published_key(&record.listing_id, record.platform);
        let value = serde_json::to_string(record)?;

        // Indexed before the claim so a published record is always listed.
        conn.sadd::<_, _, ()>(export_index_key(&record.listing_id), record.platform.name())
            .await?;
        let claimed: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        if claimed.is_some() {
            return Ok(record.clone());
        }

        // Another writer published first; theirs stands.
        let existing: Option<String> = conn.get(&key).await?;
        let existing = existing.ok_or_else(|| {
            ListingError::Persistence(format!("published record vanished: {}", key))
        })?;
        Ok(serde_json::from_str(&existing)?)
    }

    async fn exports_for(&self, listing_id: &Uuid) -> Result<Vec<MarketplaceListing>, ListingError> {
        let mut conn = self.conn.clone();
        let names: Vec<String> = conn.smembers(export_index_key(listing_id)).await?;

        let mut marketplaces: Vec<Marketplace> =
            names.iter().filter_map(|n| n.parse().ok()).collect();
        marketplaces.sort();

        let mut exports = Vec::with_capacity(marketplaces.len());
        for marketplace in marketplaces {
            if let Some(record) = self.get_export(listing_id, marketplace).await? {
                exports.push(record);
            }
        }
        Ok(exports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let id = Uuid::nil();
        assert_eq!(
            listing_key(&id),
            "listing:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            export_key(&id, Marketplace::Ebay),
            "export:00000000-0000-0000-0000-000000000000:ebay"
        );
        assert_eq!(
            published_key(&id, Marketplace::Ebay),
            "export:00000000-0000-0000-0000-000000000000:ebay:published"
        );
        assert_eq!(
            export_index_key(&id),
            "listing:00000000-0000-0000-0000-000000000000:exports"
        );
    }
}

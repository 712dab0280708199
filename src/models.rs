// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ListingError;

/// Image reference submitted for analysis.
#[derive(Debug, Clone)]
pub enum AnalysisInput {
    Url(String),
    Upload { content_type: String, data: Vec<u8> },
}

impl AnalysisInput {
    /// Image reference suitable for services that only accept a URL-like string.
    pub fn as_reference(&self) -> String {
        use base64::{Engine as _, engine::general_purpose};

        match self {
            AnalysisInput::Url(url) => url.clone(),
            AnalysisInput::Upload { content_type, data } => format!(
                "data:{};base64,{}",
                content_type,
                general_purpose::STANDARD.encode(data)
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisionResult {
    pub labels: Vec<Label>,
    pub objects: Vec<DetectedObject>,
    pub properties: ImageProperties,
    pub text: Vec<TextFragment>,
}

impl VisionResult {
    pub fn label_names(&self, limit: usize) -> Vec<&str> {
        self.labels
            .iter()
            .take(limit)
            .map(|l| l.description.as_str())
            .collect()
    }

    pub fn object_names(&self, limit: usize) -> Vec<&str> {
        self.objects
            .iter()
            .take(limit)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// The first text annotation holds the full detected text block.
    pub fn detected_text(&self) -> &str {
        self.text
            .first()
            .map(|t| t.description.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub description: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedObject {
    pub name: String,
    pub score: f32,
    pub bounding_poly: Vec<Vertex>,
}

/// Normalized vertex, both coordinates in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageProperties {
    pub dominant_colors: Vec<ColorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColorInfo {
    pub rgb: (u8, u8, u8),
    pub score: f32,
    pub pixel_fraction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextFragment {
    pub description: String,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedCopy {
    pub title: String,
    pub description: String,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_enhance: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_crop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_background: Option<bool>,
}

impl EnhancementOptions {
    pub const MIN_ADJUSTMENT: i32 = -100;
    pub const MAX_ADJUSTMENT: i32 = 100;

    pub fn auto() -> Self {
        Self {
            auto_enhance: Some(true),
            auto_crop: Some(true),
            ..Self::default()
        }
    }

    /// Rejects brightness/contrast/saturation outside [-100, 100].
    pub fn validate(&self) -> Result<(), ListingError> {
        let adjustments = [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
        ];
        for (name, value) in adjustments {
            if let Some(v) = value {
                if !(Self::MIN_ADJUSTMENT..=Self::MAX_ADJUSTMENT).contains(&v) {
                    return Err(ListingError::Validation(format!(
                        "{} must be between {} and {}, got {}",
                        name,
                        Self::MIN_ADJUSTMENT,
                        Self::MAX_ADJUSTMENT,
                        v
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnhancedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductListing {
    pub fn from_draft(id: Uuid, draft: ListingDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: draft.title,
            description: draft.description,
            price: draft.price,
            images: draft.images,
            category: draft.category,
            features: draft.features,
            specifications: draft.specifications,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an edit, keeping identity and creation time.
    pub fn apply(&mut self, draft: ListingDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.price = draft.price;
        self.images = draft.images;
        self.category = draft.category;
        self.features = draft.features;
        self.specifications = draft.specifications;
        self.updated_at = Utc::now();
    }
}

/// Listing payload without the store-assigned fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

impl ListingDraft {
    pub fn validate(&self) -> Result<(), ListingError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ListingError::Validation(
                "price must be a non-negative number".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(ListingError::Validation("title is required".to_string()));
        }
        Ok(())
    }
}

/// Marketplace names are matched case-insensitively on input and written
/// back in their canonical spelling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String")]
pub enum Marketplace {
    Shopify,
    Amazon,
    Etsy,
    #[serde(rename = "eBay")]
    Ebay,
}

impl Marketplace {
    pub const ALL: [Marketplace; 4] = [
        Marketplace::Shopify,
        Marketplace::Amazon,
        Marketplace::Etsy,
        Marketplace::Ebay,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Marketplace::Shopify => "Shopify",
            Marketplace::Amazon => "Amazon",
            Marketplace::Etsy => "Etsy",
            Marketplace::Ebay => "eBay",
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Marketplace::Shopify => &["title", "description", "price", "images", "variants"],
            Marketplace::Amazon => &["title", "description", "price", "images", "category"],
            Marketplace::Etsy => &["title", "description", "price", "images", "tags"],
            Marketplace::Ebay => &["title", "description", "price", "images", "condition"],
        }
    }

    pub fn listing_url(&self, listing_id: &Uuid) -> String {
        let host = match self {
            Marketplace::Shopify => "shopify.com",
            Marketplace::Amazon => "amazon.com",
            Marketplace::Etsy => "etsy.com",
            Marketplace::Ebay => "ebay.com",
        };
        format!("https://{}/listing/{}", host, listing_id)
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Marketplace {
    type Err = ListingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Marketplace::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ListingError::Validation(format!("Unknown marketplace: {}", s)))
    }
}

impl TryFrom<String> for Marketplace {
    type Error = ListingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Draft,
    Published,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceListing {
    pub platform: Marketplace,
    pub listing_id: Uuid,
    pub status: ExportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub listing_id: Uuid,
    pub marketplaces: Vec<Marketplace>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhancement_options_boundaries_accepted() {
        for v in [-100, 0, 100] {
            let options = EnhancementOptions {
                brightness: Some(v),
                contrast: Some(v),
                saturation: Some(v),
                ..Default::default()
            };
            assert!(options.validate().is_ok(), "value {} should be valid", v);
        }
    }

    #[test]
    fn test_enhancement_options_out_of_range_rejected() {
        let options = EnhancementOptions {
            contrast: Some(101),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(ListingError::Validation(_))));

        let options = EnhancementOptions {
            saturation: Some(-101),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(ListingError::Validation(_))));
    }

    #[test]
    fn test_enhancement_options_omit_absent_fields() {
        let json = serde_json::to_value(EnhancementOptions::auto()).unwrap();
        assert_eq!(json, serde_json::json!({"autoEnhance": true, "autoCrop": true}));
    }

    #[test]
    fn test_listing_missing_collections_deserialize_empty() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "title": "Mug",
            "description": "A mug",
            "category": "Kitchen",
            "createdAt": Utc::now(),
            "updatedAt": Utc::now(),
        });
        let listing: ProductListing = serde_json::from_value(json).unwrap();
        assert!(listing.features.is_empty());
        assert!(listing.specifications.is_empty());
        assert_eq!(listing.price, 0.0);
    }

    #[test]
    fn test_draft_rejects_negative_price() {
        let draft = ListingDraft {
            title: "Mug".to_string(),
            price: -1.0,
            ..Default::default()
        };
        assert!(matches!(draft.validate(), Err(ListingError::Validation(_))));
    }

    #[test]
    fn test_marketplace_parse_and_serde() {
        assert_eq!("ebay".parse::<Marketplace>().unwrap(), Marketplace::Ebay);
        assert!("walmart".parse::<Marketplace>().is_err());
        assert_eq!(
            serde_json::to_value(Marketplace::Ebay).unwrap(),
            serde_json::json!("eBay")
        );
    }

    #[test]
    fn test_marketplace_deserialize_matches_parse() {
        let request: ExportRequest = serde_json::from_value(serde_json::json!({
            "listingId": Uuid::new_v4(),
            "marketplaces": ["ebay", "SHOPIFY", "Etsy"]
        }))
        .unwrap();
        assert_eq!(
            request.marketplaces,
            vec![Marketplace::Ebay, Marketplace::Shopify, Marketplace::Etsy]
        );

        let err = serde_json::from_value::<Marketplace>(serde_json::json!("Walmart")).unwrap_err();
        assert!(err.to_string().contains("Unknown marketplace: Walmart"));
    }

    #[test]
    fn test_upload_reference_is_data_uri() {
        let input = AnalysisInput::Upload {
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(input.as_reference(), "data:image/png;base64,AQID");
    }
}

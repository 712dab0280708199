// src/services/orchestrator.rs
use crate::errors::ListingError;
use crate::models::*;
use crate::services::{PhotoEnhancer, TextGenerator, VisionApi};
use chrono::Utc;
use log::{error, info};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

pub const UNCATEGORIZED: &str = "Uncategorized";
const PROMPT_CONTEXT_ITEMS: usize = 5;

/// Turns one product photo into one listing.
///
/// Runs in strict mode: a failure of any upstream call aborts the whole
/// analysis with [`ListingError::AnalysisFailed`] and no listing is produced.
pub struct AnalysisOrchestrator {
    vision: Arc<dyn VisionApi>,
    text: Arc<dyn TextGenerator>,
    enhancer: Arc<dyn PhotoEnhancer>,
    model: String,
}

impl AnalysisOrchestrator {
    pub fn new(
        vision: Arc<dyn VisionApi>,
        text: Arc<dyn TextGenerator>,
        enhancer: Arc<dyn PhotoEnhancer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            vision,
            text,
            enhancer,
            model: model.into(),
        }
    }

    pub fn enhancer(&self) -> &Arc<dyn PhotoEnhancer> {
        &self.enhancer
    }

    pub async fn analyze(&self, input: &AnalysisInput) -> Result<ProductListing, ListingError> {
        let start = Instant::now();

        let listing = self.run(input).await.map_err(|e| {
            error!("Product analysis failed: {}", e);
            match e {
                ListingError::AnalysisFailed(message) => ListingError::AnalysisFailed(message),
                other => ListingError::AnalysisFailed(other.to_string()),
            }
        })?;

        info!(
            "Analyzed product {} ({}) in {}ms",
            listing.id,
            listing.category,
            start.elapsed().as_millis()
        );
        Ok(listing)
    }

    async fn run(&self, input: &AnalysisInput) -> Result<ProductListing, ListingError> {
        let vision = self.vision.annotate(input).await?;
        let copy = self.regenerate_copy(&vision).await?;
        let enhanced = self
            .enhancer
            .enhance(&input.as_reference(), &EnhancementOptions::auto())
            .await?;

        Ok(assemble_listing(&vision, copy, enhanced))
    }

    /// Issues the title, description and feature prompts concurrently.
    pub async fn regenerate_copy(
        &self,
        vision: &VisionResult,
    ) -> Result<GeneratedCopy, ListingError> {
        let prompts = ListingPrompts::from_vision(vision);

        let (title, description, features) = futures_util::try_join!(
            self.text.generate(&prompts.title, &self.model),
            self.text.generate(&prompts.description, &self.model),
            self.text.generate(&prompts.features, &self.model),
        )?;

        Ok(GeneratedCopy {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            features: parse_features(&features),
        })
    }
}

pub struct ListingPrompts {
    pub title: String,
    pub description: String,
    pub features: String,
}

impl ListingPrompts {
    pub fn from_vision(vision: &VisionResult) -> Self {
        let details = format!(
            "Labels: {}\nObjects: {}\nText: {}",
            vision.label_names(PROMPT_CONTEXT_ITEMS).join(", "),
            vision.object_names(PROMPT_CONTEXT_ITEMS).join(", "),
            vision.detected_text().trim()
        );

        Self {
            title: format!(
                "Generate a concise, appealing product title based on these details:\n{}\nKeep it under 10 words and make it marketable.",
                details
            ),
            description: format!(
                "Generate a detailed product description based on these details:\n{}\nInclude key features and selling points. Keep it under 200 words.",
                details
            ),
            features: format!(
                "List 5 key features based on these details:\n{}\nMake them concise and marketable. Put each feature on its own line.",
                details
            ),
        }
    }
}

/// One feature per non-blank line, with a leading bullet marker removed.
pub fn parse_features(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.strip_prefix(['-', '*', '•'])
                .map(str::trim_start)
                .unwrap_or(line)
                .to_string()
        })
        .filter(|feature| !feature.is_empty())
        .collect()
}

pub fn assemble_listing(
    vision: &VisionResult,
    copy: GeneratedCopy,
    enhanced: EnhancedImage,
) -> ProductListing {
    let category = vision
        .labels
        .first()
        .map(|l| l.description.clone())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());
    let product_type = vision
        .objects
        .first()
        .map(|o| o.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut specifications = BTreeMap::new();
    specifications.insert("Category".to_string(), category.clone());
    specifications.insert("Type".to_string(), product_type);
    specifications.insert("Condition".to_string(), "New".to_string());

    let now = Utc::now();
    ProductListing {
        id: Uuid::new_v4(),
        title: copy.title,
        description: copy.description,
        price: 0.0,
        images: vec![enhanced.url],
        category,
        features: copy.features,
        specifications,
        created_at: now,
        updated_at: now,
    }
}

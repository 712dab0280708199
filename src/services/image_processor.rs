// src/services/image_processor.rs
use crate::errors::ListingError;
use crate::models::AnalysisInput;
use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};

const MAX_DIMENSION: u32 = 4096;
const MAX_EDGE: u32 = 2048;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ListingError> {
        image::load_from_memory(data)
            .map_err(|e| ListingError::ImageProcessing(format!("Invalid image format: {}", e)))
    }

    fn check_dimensions(&self, img: &DynamicImage) -> Result<(u32, u32), ListingError> {
        let (width, height) = img.dimensions();
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ListingError::ImageProcessing(format!(
                "Image is {}x{}, limit is {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }
        Ok((width, height))
    }

    pub fn validate_image(&self, data: &[u8]) -> Result<(u32, u32), ListingError> {
        let img = self.decode(data)?;
        self.check_dimensions(&img)
    }

    /// Re-encodes as PNG when the long edge exceeds `max_edge`; otherwise
    /// hands back the original bytes untouched.
    fn shrink_to_fit(
        &self,
        img: DynamicImage,
        data: &[u8],
        content_type: String,
        max_edge: u32,
    ) -> Result<(Vec<u8>, String), ListingError> {
        let (width, height) = img.dimensions();
        let long_edge = width.max(height);
        if long_edge <= max_edge {
            return Ok((data.to_vec(), content_type));
        }

        let scale = max_edge as f32 / long_edge as f32;
        let target_w = ((width as f32 * scale) as u32).max(1);
        let target_h = ((height as f32 * scale) as u32).max(1);
        let scaled = img.resize(target_w, target_h, image::imageops::FilterType::Lanczos3);

        let mut png = Vec::new();
        scaled
            .write_to(&mut std::io::Cursor::new(&mut png), ImgFormat::Png)
            .map_err(|e| ListingError::ImageProcessing(format!("Failed to re-encode image: {}", e)))?;

        Ok((png, "image/png".to_string()))
    }

    /// Validates an uploaded file and turns it into an analysis input.
    pub fn prepare_upload(
        &self,
        data: &[u8],
        content_type: &str,
    ) -> Result<AnalysisInput, ListingError> {
        if data.is_empty() {
            return Err(ListingError::Validation("Uploaded image is empty".to_string()));
        }
        let img = self.decode(data)?;
        self.check_dimensions(&img)?;

        let content_type = if content_type.starts_with("image/") {
            content_type.to_string()
        } else {
            image::guess_format(data)
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".to_string())
        };

        let (data, content_type) = self.shrink_to_fit(img, data, content_type, MAX_EDGE)?;
        Ok(AnalysisInput::Upload { content_type, data })
    }

    /// Decodes a `data:<mime>;base64,<payload>` URI and treats it as an upload.
    pub fn prepare_data_uri(&self, uri: &str) -> Result<AnalysisInput, ListingError> {
        let invalid = || ListingError::Validation("Malformed image data URI".to_string());

        let rest = uri.strip_prefix("data:").ok_or_else(invalid)?;
        let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
        let content_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;

        let data = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ListingError::Validation(format!("Invalid base64 image data: {}", e)))?;

        self.prepare_upload(&data, content_type)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{ImageBuffer, ImageInput};
use crate::services::compressor::{self, CompressionSettings};
use crate::services::nik_extractor::{self, ExtractionResult};
use crate::services::ocr_service::{ImageSource, OcrClient, OcrOutcome, OcrRequest};

/// Pipeline settings copied out of `Config` once at startup.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_image_bytes: usize,
    pub compression: CompressionSettings,
    pub crop_margin_percent: u8,
    pub ocr_language: String,
    pub ocr_engine: u8,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            compression: config.compression_settings(),
            crop_margin_percent: config.crop_margin_percent,
            ocr_language: config.ocr_language.clone(),
            ocr_engine: config.ocr_engine,
        }
    }
}

/// Image in, NIK out: crop, compress, OCR, extract.
pub struct IdentityService {
    ocr: Arc<dyn OcrClient>,
    settings: PipelineSettings,
}

impl IdentityService {
    pub fn new(config: &Config, ocr: Arc<dyn OcrClient>) -> Self {
        Self {
            ocr,
            settings: PipelineSettings::from(config),
        }
    }

    pub fn ocr_backend(&self) -> &str {
        self.ocr.name()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Turns validated input into what the OCR service receives. Byte
    /// buffers are cropped and compressed on the blocking pool; URLs pass
    /// through untouched.
    pub async fn prepare_source(&self, input: ImageInput) -> AppResult<ImageSource> {
        match input {
            ImageInput::Url(url) => Ok(ImageSource::Url(url)),
            ImageInput::Upload(buffer) => Ok(ImageSource::File(self.shrink(buffer).await?)),
            ImageInput::Base64(buffer) => {
                Ok(ImageSource::Base64(self.shrink(buffer).await?.to_data_uri()))
            }
        }
    }

    async fn shrink(&self, buffer: ImageBuffer) -> AppResult<ImageBuffer> {
        let ceiling = self.settings.max_image_bytes;
        let margin = self.settings.crop_margin_percent;
        let compression = self.settings.compression;

        if margin == 0 && buffer.size() <= ceiling {
            return Ok(buffer);
        }

        let outcome = tokio::task::spawn_blocking(move || {
            let cropped = compressor::crop_margins(buffer, margin);
            compressor::reduce_to_ceiling(cropped, ceiling, &compression)
        })
        .await?;

        if outcome.fell_back {
            warn!(size = outcome.buffer.size(), "Compression unavailable, submitting original image");
        } else if !outcome.met_ceiling {
            warn!(
                size = outcome.buffer.size(),
                ceiling = ceiling,
                attempts = outcome.attempts,
                "Submitting image above size ceiling"
            );
        }

        Ok(outcome.buffer)
    }

    /// Runs the image through OCR and returns the raw outcome, including
    /// service-side processing failures.
    pub async fn recognize(&self, input: ImageInput) -> AppResult<OcrOutcome> {
        let kind = input.kind();
        let source = self.prepare_source(input).await?;

        debug!(input = kind, source = source.kind(), backend = self.ocr.name(), "Submitting image for OCR");

        let request = OcrRequest::new(source, self.settings.ocr_language.clone(), self.settings.ocr_engine);
        self.ocr.recognize(request).await
    }

    pub async fn extract_identity(&self, input: ImageInput) -> AppResult<ExtractionResult> {
        let start = Instant::now();
        let outcome = self.recognize(input).await?;

        if outcome.is_errored {
            let message = outcome
                .error_message
                .unwrap_or_else(|| "OCR service could not process the image".to_string());
            return Err(AppError::ocr_processing(message));
        }

        let result = nik_extractor::extract(&outcome.recognized_text);

        info!(
            identity_found = result.identity_number.is_some(),
            name_found = result.full_name.is_some(),
            text_length = outcome.recognized_text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Identity extraction finished"
        );

        Ok(result)
    }
}

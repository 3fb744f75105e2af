use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::ImageBuffer;

/// Where the OCR service should read the image from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Url(String),
    /// A `data:<mime>;base64,...` URI.
    Base64(String),
    File(ImageBuffer),
}

impl ImageSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageSource::Url(_) => "url",
            ImageSource::Base64(_) => "base64",
            ImageSource::File(_) => "file",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub source: ImageSource,
    pub language: String,
    pub engine: u8,
    pub detect_orientation: bool,
    pub scale: bool,
    pub overlay_required: bool,
}

impl OcrRequest {
    pub fn new(source: ImageSource, language: impl Into<String>, engine: u8) -> Self {
        Self {
            source,
            language: language.into(),
            engine,
            detect_orientation: true,
            scale: true,
            overlay_required: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutcome {
    pub recognized_text: String,
    pub is_errored: bool,
    pub error_message: Option<String>,
    pub confidence: Option<f32>,
}

#[async_trait]
pub trait OcrClient: Send + Sync {
    fn name(&self) -> &str;

    /// Transport failures are errors; a service-side processing failure is
    /// reported through `OcrOutcome::is_errored`.
    async fn recognize(&self, request: OcrRequest) -> AppResult<OcrOutcome>;
}

/// Client for the OCR.space `parse/image` API.
pub struct OcrSpaceClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OcrSpaceClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ocr_timeout_seconds))
            .build()
            .map_err(|e| AppError::config(format!("Failed to build OCR HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: config.ocr_api_key.clone(),
            endpoint: config.ocr_api_url.clone(),
        })
    }

    fn build_form(request: OcrRequest) -> AppResult<multipart::Form> {
        let form = multipart::Form::new()
            .text("language", request.language)
            .text("OCREngine", request.engine.to_string())
            .text("detectOrientation", request.detect_orientation.to_string())
            .text("scale", request.scale.to_string())
            .text("isOverlayRequired", request.overlay_required.to_string());

        let form = match request.source {
            ImageSource::Url(url) => form.text("url", url),
            ImageSource::Base64(data_uri) => form.text("base64Image", data_uri),
            ImageSource::File(buffer) => {
                let file_name = buffer
                    .file_name
                    .clone()
                    .unwrap_or_else(|| default_file_name(&buffer.mime_type));
                let part = multipart::Part::bytes(buffer.data)
                    .file_name(file_name)
                    .mime_str(&buffer.mime_type)
                    .map_err(|e| AppError::invalid_image(format!("unsupported MIME type: {}", e)))?;
                form.part("file", part)
            }
        };
        Ok(form)
    }
}

#[async_trait]
impl OcrClient for OcrSpaceClient {
    fn name(&self) -> &str {
        "ocr.space"
    }

    async fn recognize(&self, request: OcrRequest) -> AppResult<OcrOutcome> {
        let start = Instant::now();
        let source_kind = request.source.kind();

        debug!(
            source = source_kind,
            language = %request.language,
            engine = request.engine,
            "Sending request to OCR service"
        );

        let form = Self::build_form(request)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = %status, "OCR service returned non-success status");
            return Err(AppError::ocr_transport(format!(
                "OCR service returned {}: {}",
                status,
                error_body.trim()
            )));
        }

        let body: OcrSpaceResponse = response.json().await?;
        let outcome = body.into_outcome();

        info!(
            source = source_kind,
            text_length = outcome.recognized_text.len(),
            is_errored = outcome.is_errored,
            latency_ms = start.elapsed().as_millis() as u64,
            "OCR request completed"
        );

        Ok(outcome)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(default)]
    is_errored_on_processing: bool,
    /// A string or an array of strings depending on the failure.
    #[serde(default)]
    error_message: Option<Value>,
    #[serde(default)]
    error_details: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: Option<String>,
    #[serde(default)]
    error_message: Option<Value>,
}

impl OcrSpaceResponse {
    fn into_outcome(self) -> OcrOutcome {
        let results = self.parsed_results.unwrap_or_default();

        let recognized_text = results
            .iter()
            .filter_map(|result| result.parsed_text.as_deref())
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let error_message = self
            .error_message
            .as_ref()
            .and_then(flatten_message)
            .or_else(|| self.error_details.as_ref().and_then(flatten_message))
            .or_else(|| {
                results
                    .iter()
                    .filter_map(|result| result.error_message.as_ref())
                    .find_map(flatten_message)
            });

        OcrOutcome {
            recognized_text,
            is_errored: self.is_errored_on_processing,
            error_message,
            confidence: None,
        }
    }
}

fn flatten_message(value: &Value) -> Option<String> {
    let message = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(flatten_message)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}

fn default_file_name(mime_type: &str) -> String {
    let extension = match mime_type {
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tif",
        _ => "jpg",
    };
    format!("ktp.{}", extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> OcrOutcome {
        serde_json::from_value::<OcrSpaceResponse>(value).unwrap().into_outcome()
    }

    #[test]
    fn joins_parsed_text_of_all_results() {
        let outcome = parse(json!({
            "ParsedResults": [
                { "ParsedText": "NIK : 3201014503900021\r\n", "ErrorMessage": "", "FileParseExitCode": 1 },
                { "ParsedText": "Nama : BUDI", "ErrorMessage": "" }
            ],
            "OCRExitCode": 1,
            "IsErroredOnProcessing": false,
            "ProcessingTimeInMilliseconds": "531"
        }));

        assert!(!outcome.is_errored);
        assert_eq!(outcome.recognized_text, "NIK : 3201014503900021\r\n\nNama : BUDI");
        assert_eq!(outcome.error_message, None);
    }

    #[test]
    fn error_message_array_is_flattened() {
        let outcome = parse(json!({
            "ParsedResults": null,
            "OCRExitCode": 99,
            "IsErroredOnProcessing": true,
            "ErrorMessage": ["File failed validation.", "Maximum size is 1024 KB"],
        }));

        assert!(outcome.is_errored);
        assert!(outcome.recognized_text.is_empty());
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("File failed validation.; Maximum size is 1024 KB")
        );
    }

    #[test]
    fn error_message_falls_back_to_parsed_result() {
        let outcome = parse(json!({
            "ParsedResults": [{ "ParsedText": "", "ErrorMessage": "Unable to recognize the file type" }],
            "IsErroredOnProcessing": true
        }));
        assert_eq!(outcome.error_message.as_deref(), Some("Unable to recognize the file type"));
    }

    #[test]
    fn form_accepts_every_source_kind() {
        let sources = [
            ImageSource::Url("https://example.com/ktp.jpg".to_string()),
            ImageSource::Base64("data:image/png;base64,AAAA".to_string()),
            ImageSource::File(ImageBuffer::new(vec![1, 2, 3], "image/png")),
        ];
        for source in sources {
            assert!(OcrSpaceClient::build_form(OcrRequest::new(source, "eng", 2)).is_ok());
        }
    }

    #[test]
    fn file_name_follows_mime_type() {
        assert_eq!(default_file_name("image/png"), "ktp.png");
        assert_eq!(default_file_name("image/jpeg"), "ktp.jpg");
    }
}

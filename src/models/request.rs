use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// JSON body accepted by the extract and debug endpoints.
///
/// `image` carries either a base64 payload (bare or as a `data:` URI) or an
/// http(s) URL that is handed to the OCR service untouched.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ExtractRequest {
    #[serde(default, alias = "base64", alias = "url")]
    pub image: Option<String>,
}

impl ExtractRequest {
    pub fn into_input(self) -> AppResult<ImageInput> {
        let raw = self.image.unwrap_or_default();
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(AppError::MissingInput);
        }

        if is_http_url(raw) {
            return Ok(ImageInput::Url(raw.to_string()));
        }

        Ok(ImageInput::Base64(ImageBuffer::from_base64(raw)?))
    }
}

/// Validated image input, one variant per request shape.
#[derive(Debug, Clone)]
pub enum ImageInput {
    Upload(ImageBuffer),
    Base64(ImageBuffer),
    Url(String),
}

impl ImageInput {
    pub fn kind(&self) -> &'static str {
        match self {
            ImageInput::Upload(_) => "upload",
            ImageInput::Base64(_) => "base64",
            ImageInput::Url(_) => "url",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: Option<String>,
}

impl ImageBuffer {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    /// Builds a buffer whose MIME type is sniffed from the magic bytes,
    /// falling back to `declared` when the format is not recognised.
    pub fn sniffed(data: Vec<u8>, declared: Option<&str>) -> Self {
        let mime_type = match sniff_mime_type(&data) {
            Some(mime) => mime.to_string(),
            None => declared.unwrap_or("application/octet-stream").to_string(),
        };
        Self::new(data, mime_type)
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Decodes a bare base64 string or a `data:<mime>;base64,<payload>` URI.
    pub fn from_base64(payload: &str) -> AppResult<Self> {
        let (declared, encoded) = match payload.strip_prefix("data:") {
            Some(rest) => {
                let (header, body) = rest
                    .split_once(',')
                    .ok_or_else(|| AppError::invalid_image("malformed data URI"))?;
                let mime = header.split(';').next().filter(|m| !m.is_empty());
                (mime, body)
            }
            None => (None, payload),
        };

        // Clients commonly wrap long payloads; the decoder rejects whitespace.
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let data = general_purpose::STANDARD.decode(cleaned.as_bytes())?;

        if data.is_empty() {
            return Err(AppError::invalid_image("decoded image is empty"));
        }

        let buffer = Self::sniffed(data, declared);
        if !buffer.is_image() {
            return Err(AppError::invalid_image("payload is not a recognised image format"));
        }
        Ok(buffer)
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.data)
        )
    }
}

pub fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn sniff_mime_type(data: &[u8]) -> Option<&'static str> {
    use image::ImageFormat;

    let format = image::guess_format(data).ok()?;
    let mime = match format {
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Png => "image/png",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

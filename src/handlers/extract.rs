use axum::{
    extract::{Multipart, State},
    response::Json,
};
use bytes::Bytes;
use std::time::Instant;
use tracing::{info, debug, error};

use crate::error::{AppError, AppResult};
use crate::handlers::AppState;
use crate::middleware::logging::current_request_id;
use crate::models::{
    ApiResponse, DebugData, DebugResponse, ExtractRequest, ExtractResponse, IdentityData,
    ImageBuffer, ImageInput,
};
use crate::services::nik_extractor;

/// Multipart upload: the card image arrives in the `image` (or `file`) field.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ExtractResponse>> {
    let start = Instant::now();
    let request_id = current_request_id();

    info!(request_id = %request_id, "Starting KTP upload extraction request");

    let buffer = match extract_image_from_multipart(&mut multipart).await {
        Ok(buffer) => {
            info!(
                request_id = %request_id,
                file_size = buffer.size(),
                mime_type = %buffer.mime_type,
                "Image extracted from multipart form"
            );
            buffer
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to extract image from multipart");
            return Err(e);
        }
    };

    let result = state.identity.extract_identity(ImageInput::Upload(buffer)).await?;

    info!(
        request_id = %request_id,
        identity_found = result.identity_number.is_some(),
        total_time_ms = start.elapsed().as_millis() as u64,
        "Upload request completed"
    );

    Ok(Json(ExtractResponse::from_extraction(result)))
}

/// JSON body with a base64 payload, data URI or image URL.
pub async fn extract_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<ExtractResponse>> {
    let start = Instant::now();
    let request_id = current_request_id();

    let input = parse_json_input(&body)?;
    info!(request_id = %request_id, input = input.kind(), "Starting KTP extraction request");

    let result = state.identity.extract_identity(input).await?;

    info!(
        request_id = %request_id,
        identity_found = result.identity_number.is_some(),
        total_time_ms = start.elapsed().as_millis() as u64,
        "Extraction request completed"
    );

    Ok(Json(ExtractResponse::from_extraction(result)))
}

/// Returns the raw OCR text alongside what the extractor makes of it.
/// Service-side OCR failures are reported in the body instead of as errors.
pub async fn debug_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<DebugResponse>> {
    let start = Instant::now();
    let request_id = current_request_id();

    let input = parse_json_input(&body)?;
    debug!(request_id = %request_id, input = input.kind(), "Starting OCR debug request");

    let outcome = state.identity.recognize(input).await?;
    let extraction = nik_extractor::extract(&outcome.recognized_text);

    let message = if outcome.is_errored {
        "OCR service reported an error"
    } else {
        "OCR completed"
    };

    let data = DebugData {
        normalized_text: nik_extractor::normalize_text(&outcome.recognized_text),
        raw_text: outcome.recognized_text,
        is_errored: outcome.is_errored,
        error_message: outcome.error_message,
        confidence: outcome.confidence,
        extraction: IdentityData::from(extraction),
        processing_time_ms: start.elapsed().as_millis() as u64,
    };

    Ok(Json(ApiResponse::success(message, data)))
}

fn parse_json_input(body: &[u8]) -> AppResult<ImageInput> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(AppError::MissingInput);
    }
    let request: ExtractRequest = serde_json::from_slice(body)?;
    request.into_input()
}

async fn extract_image_from_multipart(multipart: &mut Multipart) -> AppResult<ImageBuffer> {
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::InvalidImage {
        message: format!("Failed to read multipart field: {}", e),
    })? {
        let field_name = field.name().unwrap_or("");

        if field_name == "image" || field_name == "file" {
            let file_name = field.file_name().map(|name| name.to_string());
            let content_type = field.content_type().map(|ct| ct.to_string());

            let data = field.bytes().await.map_err(|e| AppError::InvalidImage {
                message: format!("Failed to read file data: {}", e),
            })?;

            if data.is_empty() {
                return Err(AppError::MissingInput);
            }

            let mut buffer = ImageBuffer::sniffed(data.to_vec(), content_type.as_deref());
            if let Some(name) = file_name {
                buffer = buffer.with_file_name(name);
            }

            if !buffer.is_image() {
                return Err(AppError::invalid_image("Uploaded file is not an image"));
            }

            debug!(
                "Extracted upload: {:?} ({} bytes, type: {})",
                buffer.file_name,
                buffer.size(),
                buffer.mime_type
            );

            return Ok(buffer);
        }
    }

    Err(AppError::MissingInput)
}

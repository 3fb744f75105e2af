use serde::{Deserialize, Serialize};

use crate::services::nik_extractor::ExtractionResult;

pub const MESSAGE_FOUND: &str = "Identity number extracted successfully";
pub const MESSAGE_NOT_FOUND: &str = "Identity number not found";

/// Envelope shared by every successful API response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityData {
    pub identity_number: Option<String>,
    pub fullname: Option<String>,
}

impl From<ExtractionResult> for IdentityData {
    fn from(result: ExtractionResult) -> Self {
        Self {
            identity_number: result.identity_number,
            fullname: result.full_name,
        }
    }
}

pub type ExtractResponse = ApiResponse<IdentityData>;

impl ExtractResponse {
    pub fn from_extraction(result: ExtractionResult) -> Self {
        let message = if result.identity_number.is_some() {
            MESSAGE_FOUND
        } else {
            MESSAGE_NOT_FOUND
        };
        ApiResponse::success(message, IdentityData::from(result))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DebugData {
    pub raw_text: String,
    pub normalized_text: String,
    pub is_errored: bool,
    pub error_message: Option<String>,
    pub confidence: Option<f32>,
    pub extraction: IdentityData,
    pub processing_time_ms: u64,
}

pub type DebugResponse = ApiResponse<DebugData>;

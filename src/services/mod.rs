pub mod compressor;
pub mod identity_service;
pub mod nik_extractor;
pub mod ocr_service;

pub use compressor::{CompressionOutcome, CompressionSettings};
pub use identity_service::{IdentityService, PipelineSettings};
pub use nik_extractor::ExtractionResult;
pub use ocr_service::{ImageSource, OcrClient, OcrOutcome, OcrRequest, OcrSpaceClient};

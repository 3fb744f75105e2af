//! Unit tests for individual components

use ktpscan::{
    config::Config,
    error::AppError,
    models::{ExtractResponse, ImageBuffer},
    services::{
        compressor::{self, CompressionSettings},
        nik_extractor::{self, ExtractionResult, MatchStrategy},
    },
};
use std::env;

#[test]
fn test_config_from_env() {
    env::remove_var("PORT");
    env::set_var("SERVER_PORT", "8081");
    env::set_var("OCR_API_KEY", "K812345678");
    env::set_var("MAX_IMAGE_BYTES", "524288");
    env::set_var("COMPRESSION_QUALITY", "not-a-number");
    env::set_var("CORS_ORIGIN", "https://app.example.com");

    let config = Config::from_env().unwrap();
    assert_eq!(config.server_port, 8081);
    assert_eq!(config.ocr_api_key, "K812345678");
    assert_eq!(config.max_image_bytes, 524_288);
    // Unparseable values fall back to defaults
    assert_eq!(config.compression_quality, 80);
    assert_eq!(config.cors_origin, "https://app.example.com");
    assert!(!format!("{:?}", config).contains("K812345678"));

    for var in ["SERVER_PORT", "OCR_API_KEY", "MAX_IMAGE_BYTES", "COMPRESSION_QUALITY", "CORS_ORIGIN"] {
        env::remove_var(var);
    }
}

#[test]
fn test_config_defaults_and_validation() {
    let config = Config::default();
    assert_eq!(config.max_image_bytes, 1_048_576);
    assert_eq!(config.ocr_timeout_seconds, 60);
    assert_eq!(config.compression_settings(), CompressionSettings::default());
    assert!(config.validate().is_ok());

    let bad_quality = Config {
        compression_quality: 0,
        ..Config::default()
    };
    assert!(bad_quality.validate().is_err());

    let bad_crop = Config {
        crop_margin_percent: 45,
        ..Config::default()
    };
    assert!(bad_crop.validate().is_err());

    let bad_engine = Config {
        ocr_engine: 7,
        ..Config::default()
    };
    assert!(bad_engine.validate().is_err());
}

#[test]
fn test_upload_limit_saturates() {
    let config = Config::default();
    assert_eq!(config.upload_limit_bytes(), 10 * 1024 * 1024);

    let huge = Config {
        max_upload_size_mb: usize::MAX,
        ..Config::default()
    };
    assert!(huge.validate().is_ok());
    assert_eq!(huge.upload_limit_bytes(), usize::MAX);
}

#[test]
fn test_error_codes() {
    assert_eq!(AppError::MissingInput.error_code(), "MISSING_INPUT");
    assert_eq!(AppError::invalid_image("x").error_code(), "INVALID_IMAGE");
    assert_eq!(AppError::ocr_processing("x").error_code(), "OCR_PROCESSING_ERROR");
    assert_eq!(AppError::ocr_transport("x").error_code(), "OCR_TRANSPORT_ERROR");
    assert_eq!(AppError::config("x").error_code(), "CONFIG_ERROR");
}

#[test]
fn test_error_status_codes() {
    use axum::http::StatusCode;

    assert_eq!(AppError::MissingInput.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::ocr_processing("x").status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::ocr_transport("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(AppError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_ocr_processing_message_is_verbatim() {
    let error = AppError::ocr_processing("Unable to recognize the file type");
    assert_eq!(error.to_string(), "Unable to recognize the file type");
}

#[test]
fn test_error_conversions() {
    let anyhow_error = anyhow::anyhow!("Test error");
    let app_error: AppError = anyhow_error.into();
    match app_error {
        AppError::Internal { message } => assert!(message.contains("Test error")),
        _ => panic!("Expected Internal error"),
    }

    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
    let app_error: AppError = io_error.into();
    match app_error {
        AppError::Internal { message } => assert!(message.contains("IO error")),
        _ => panic!("Expected Internal error"),
    }

    let json_error = serde_json::from_str::<serde_json::Value>("{invalid json").unwrap_err();
    let app_error: AppError = json_error.into();
    match app_error {
        AppError::ValidationError { message } => assert!(message.contains("JSON parsing error")),
        _ => panic!("Expected ValidationError"),
    }

    let app_error = ImageBuffer::from_base64("***").unwrap_err();
    assert!(matches!(app_error, AppError::InvalidImage { .. }));
}

#[test]
fn test_response_envelope_serialization() {
    let found = ExtractResponse::from_extraction(ExtractionResult {
        identity_number: Some("3201014503900021".to_string()),
        full_name: Some("BUDI SANTOSO".to_string()),
    });
    let value = serde_json::to_value(&found).unwrap();
    assert_eq!(value["status"], "success");
    assert_eq!(value["message"], "Identity number extracted successfully");
    assert_eq!(value["data"]["identity_number"], "3201014503900021");
    assert_eq!(value["data"]["fullname"], "BUDI SANTOSO");

    let missing = ExtractResponse::from_extraction(ExtractionResult::default());
    let value = serde_json::to_value(&missing).unwrap();
    assert_eq!(value["message"], "Identity number not found");
    assert!(value["data"]["identity_number"].is_null());
    assert!(value["data"]["fullname"].is_null());
}

#[test]
fn test_end_to_end_text_scenarios() {
    assert_eq!(
        nik_extractor::extract_identity_number("... NIK: 3201 0145 0390 0021 ...").as_deref(),
        Some("3201014503900021")
    );
    assert_eq!(nik_extractor::extract_identity_number("KARTU TANDA PENDUDUK 12345"), None);

    let unlabeled = nik_extractor::find_identity_number("12345678901234567").unwrap();
    assert_eq!(unlabeled.number, "1234567890123456");
    assert_eq!(unlabeled.strategy, MatchStrategy::DigitRun);

    assert_eq!(
        nik_extractor::extract_full_name("Nama : John Doe\nTempat Lahir: Jakarta").as_deref(),
        Some("John Doe")
    );
}

#[test]
fn test_labeled_number_beats_other_sixteen_digit_numbers() {
    let text = "9876543210987654\nNIK 3201014503900021\nNama BUDI\n1111222233334444";
    let found = nik_extractor::find_identity_number(text).unwrap();
    assert_eq!(found.number, "3201014503900021");
    assert_eq!(found.strategy, MatchStrategy::Labeled);
}

#[test]
fn test_compression_never_fails_on_garbage() {
    let garbage = ImageBuffer::new(vec![0u8; 4096], "image/jpeg");
    let outcome = compressor::reduce_to_ceiling(garbage, 1024, &CompressionSettings::default());
    assert!(outcome.fell_back);
    assert_eq!(outcome.buffer.size(), 4096);
    assert!(outcome.attempts <= 5);
}

use std::env;
use anyhow::{Result, Context};
use tracing::{info, warn};

use crate::services::compressor::CompressionSettings;

pub const DEFAULT_OCR_API_URL: &str = "https://api.ocr.space/parse/image";

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub ocr_api_key: String,
    pub ocr_api_url: String,
    pub ocr_language: String,
    pub ocr_engine: u8,
    pub ocr_timeout_seconds: u64,
    pub max_image_bytes: usize,
    pub max_upload_size_mb: usize,
    pub compression_quality: u8,
    pub compression_max_dimension: u32,
    pub compression_max_attempts: u32,
    pub crop_margin_percent: u8,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            ocr_api_key: String::new(),
            ocr_api_url: DEFAULT_OCR_API_URL.to_string(),
            ocr_language: "eng".to_string(),
            ocr_engine: 2,
            ocr_timeout_seconds: 60,
            max_image_bytes: 1024 * 1024,
            max_upload_size_mb: 10,
            compression_quality: 80,
            compression_max_dimension: 2000,
            compression_max_attempts: 5,
            crop_margin_percent: 0,
            cors_origin: "*".to_string(),
        }
    }
}

// Keeps the API key out of startup logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("ocr_api_key", &if self.ocr_api_key.is_empty() { "<unset>" } else { "<redacted>" })
            .field("ocr_api_url", &self.ocr_api_url)
            .field("ocr_language", &self.ocr_language)
            .field("ocr_engine", &self.ocr_engine)
            .field("ocr_timeout_seconds", &self.ocr_timeout_seconds)
            .field("max_image_bytes", &self.max_image_bytes)
            .field("max_upload_size_mb", &self.max_upload_size_mb)
            .field("compression_quality", &self.compression_quality)
            .field("compression_max_dimension", &self.compression_max_dimension)
            .field("compression_max_attempts", &self.compression_max_attempts)
            .field("crop_margin_percent", &self.crop_margin_percent)
            .field("cors_origin", &self.cors_origin)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let defaults = Config::default();

        // PORT wins over SERVER_PORT for PaaS deployments
        let port_var = if env::var("PORT").is_ok() { "PORT" } else { "SERVER_PORT" };

        let config = Config {
            server_host: Self::string_env_var("SERVER_HOST", &defaults.server_host),
            server_port: Self::parse_env_var(port_var, defaults.server_port)
                .context("Failed to parse server port")?,
            ocr_api_key: env::var("OCR_API_KEY").unwrap_or_default(),
            ocr_api_url: Self::string_env_var("OCR_API_URL", &defaults.ocr_api_url),
            ocr_language: Self::string_env_var("OCR_LANGUAGE", &defaults.ocr_language),
            ocr_engine: Self::parse_env_var("OCR_ENGINE", defaults.ocr_engine)
                .context("Failed to parse OCR_ENGINE")?,
            ocr_timeout_seconds: Self::parse_env_var("OCR_TIMEOUT_SECONDS", defaults.ocr_timeout_seconds)
                .context("Failed to parse OCR_TIMEOUT_SECONDS")?,
            max_image_bytes: Self::parse_env_var("MAX_IMAGE_BYTES", defaults.max_image_bytes)
                .context("Failed to parse MAX_IMAGE_BYTES")?,
            max_upload_size_mb: Self::parse_env_var("MAX_UPLOAD_SIZE_MB", defaults.max_upload_size_mb)
                .context("Failed to parse MAX_UPLOAD_SIZE_MB")?,
            compression_quality: Self::parse_env_var("COMPRESSION_QUALITY", defaults.compression_quality)
                .context("Failed to parse COMPRESSION_QUALITY")?,
            compression_max_dimension: Self::parse_env_var("COMPRESSION_MAX_DIMENSION", defaults.compression_max_dimension)
                .context("Failed to parse COMPRESSION_MAX_DIMENSION")?,
            compression_max_attempts: Self::parse_env_var("COMPRESSION_MAX_ATTEMPTS", defaults.compression_max_attempts)
                .context("Failed to parse COMPRESSION_MAX_ATTEMPTS")?,
            crop_margin_percent: Self::parse_env_var("CROP_MARGIN_PERCENT", defaults.crop_margin_percent)
                .context("Failed to parse CROP_MARGIN_PERCENT")?,
            cors_origin: Self::string_env_var("CORS_ORIGIN", &defaults.cors_origin),
        };

        config.validate()?;

        if config.ocr_api_key.is_empty() {
            warn!("No OCR API key configured. Set OCR_API_KEY environment variable.");
        }

        info!("Configuration loaded successfully: {:?}", config);
        Ok(config)
    }

    fn string_env_var(var_name: &str, default: &str) -> String {
        match env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
            _ => {
                info!("{} not set, using default: {}", var_name, default);
                default.to_string()
            }
        }
    }

    fn parse_env_var<T>(var_name: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Debug,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(val) => match val.trim().parse() {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {} (using default: {:?})", var_name, e, default);
                    Ok(default)
                }
            },
            Err(_) => {
                info!("{} not set, using default: {:?}", var_name, default);
                Ok(default)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(anyhow::anyhow!("SERVER_PORT must be greater than 0"));
        }
        if !(1..=3).contains(&self.ocr_engine) {
            return Err(anyhow::anyhow!("OCR_ENGINE must be 1, 2 or 3"));
        }
        if self.ocr_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("OCR_TIMEOUT_SECONDS must be greater than 0"));
        }
        if self.max_image_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_IMAGE_BYTES must be greater than 0"));
        }
        if self.max_upload_size_mb == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        if !(1..=100).contains(&self.compression_quality) {
            return Err(anyhow::anyhow!("COMPRESSION_QUALITY must be between 1 and 100"));
        }
        if self.compression_max_dimension == 0 {
            return Err(anyhow::anyhow!("COMPRESSION_MAX_DIMENSION must be greater than 0"));
        }
        if self.compression_max_attempts == 0 {
            return Err(anyhow::anyhow!("COMPRESSION_MAX_ATTEMPTS must be greater than 0"));
        }
        if self.crop_margin_percent > 40 {
            return Err(anyhow::anyhow!("CROP_MARGIN_PERCENT must be at most 40"));
        }
        Ok(())
    }

    pub fn compression_settings(&self) -> CompressionSettings {
        CompressionSettings {
            initial_quality: self.compression_quality,
            initial_max_dimension: self.compression_max_dimension,
            max_attempts: self.compression_max_attempts,
            ..CompressionSettings::default()
        }
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}

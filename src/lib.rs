//! ktpscan
//!
//! HTTP service that reads Indonesian identity cards (KTP) through an
//! external OCR API and extracts the 16-digit NIK and holder name.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};

use std::io::Cursor;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, DynamicImage};
use tracing::{debug, info, warn};

use crate::models::ImageBuffer;

/// Tuning for the size reduction loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    pub initial_quality: u8,
    pub initial_max_dimension: u32,
    pub max_attempts: u32,
    pub quality_step: u8,
    pub dimension_factor: f32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            initial_quality: 80,
            initial_max_dimension: 2000,
            max_attempts: 5,
            quality_step: 10,
            dimension_factor: 0.9,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionOutcome {
    pub buffer: ImageBuffer,
    pub attempts: u32,
    /// Size of the smallest encoding kept after each attempt.
    pub size_history: Vec<usize>,
    pub met_ceiling: bool,
    /// Set when decoding or encoding failed and the original bytes were kept.
    pub fell_back: bool,
}

/// Re-encodes `buffer` until it fits under `ceiling` bytes or the attempt
/// budget runs out. Never fails: codec errors return the original buffer.
pub fn reduce_to_ceiling(
    buffer: ImageBuffer,
    ceiling: usize,
    settings: &CompressionSettings,
) -> CompressionOutcome {
    if buffer.size() <= ceiling {
        return CompressionOutcome {
            buffer,
            attempts: 0,
            size_history: Vec::new(),
            met_ceiling: true,
            fell_back: false,
        };
    }

    let original_size = buffer.size();
    info!(
        original_size = original_size,
        ceiling = ceiling,
        mime_type = %buffer.mime_type,
        "Image exceeds size ceiling, compressing"
    );

    let source = match image::load_from_memory(&buffer.data) {
        Ok(img) => img,
        Err(e) => {
            warn!(error = %e, "Failed to decode image for compression, sending original");
            return fallback(buffer);
        }
    };

    let mut quality = settings.initial_quality.clamp(1, 100);
    let mut max_dimension = settings.initial_max_dimension.max(1);
    let mut attempts = 0;
    let mut best: Option<Vec<u8>> = None;
    let mut size_history = Vec::new();

    while best.as_ref().map_or(original_size, Vec::len) > ceiling && attempts < settings.max_attempts {
        let resized = fit_within(&source, max_dimension);

        let encoded = match encode_jpeg(&resized, quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, attempt = attempts + 1, "JPEG encoding failed, sending original");
                return fallback(buffer);
            }
        };

        debug!(
            attempt = attempts + 1,
            quality = quality,
            max_dimension = max_dimension,
            width = resized.width(),
            height = resized.height(),
            size = encoded.len(),
            "Compression attempt finished"
        );

        if best.as_ref().map_or(true, |current| encoded.len() < current.len()) {
            best = Some(encoded);
        }
        size_history.extend(best.as_ref().map(Vec::len));
        attempts += 1;

        // Quality must strictly decrease between attempts.
        match quality.checked_sub(settings.quality_step.max(1)).filter(|&next| next >= 1) {
            Some(next) => quality = next,
            None => {
                debug!(quality = quality, attempts = attempts, "Quality floor reached, stopping compression");
                break;
            }
        }
        max_dimension = ((max_dimension as f32 * settings.dimension_factor).floor() as u32).max(1);
    }

    let Some(data) = best else {
        return fallback(buffer);
    };

    // Re-encoding can still grow a small, already well-compressed input.
    if data.len() >= original_size {
        warn!(original_size = original_size, attempts = attempts, "Compression did not shrink image");
        return CompressionOutcome {
            buffer,
            attempts,
            size_history,
            met_ceiling: false,
            fell_back: false,
        };
    }

    let met_ceiling = data.len() <= ceiling;
    if met_ceiling {
        info!(original_size = original_size, compressed_size = data.len(), attempts = attempts, "Image compressed");
    } else {
        warn!(
            original_size = original_size,
            compressed_size = data.len(),
            ceiling = ceiling,
            attempts = attempts,
            "Image still above ceiling after compression, proceeding with smallest result"
        );
    }

    let mut compressed = ImageBuffer::new(data, "image/jpeg");
    compressed.file_name = buffer.file_name.map(|name| jpeg_file_name(&name));

    CompressionOutcome {
        buffer: compressed,
        attempts,
        size_history,
        met_ceiling,
        fell_back: false,
    }
}

/// Trims `margin_percent` of the width and height from every edge, keeping
/// the source format. Any failure returns the uncropped buffer.
pub fn crop_margins(buffer: ImageBuffer, margin_percent: u8) -> ImageBuffer {
    if margin_percent == 0 {
        return buffer;
    }

    match try_crop(&buffer, margin_percent) {
        Ok(cropped) => cropped,
        Err(e) => {
            warn!(error = %e, "Crop failed, continuing with uncropped image");
            buffer
        }
    }
}

fn try_crop(buffer: &ImageBuffer, margin_percent: u8) -> image::ImageResult<ImageBuffer> {
    let format = image::guess_format(&buffer.data)?;
    let img = image::load_from_memory_with_format(&buffer.data, format)?;

    let margin = f32::from(margin_percent.min(40)) / 100.0;
    let dx = (img.width() as f32 * margin) as u32;
    let dy = (img.height() as f32 * margin) as u32;
    let width = img.width().saturating_sub(dx * 2).max(1);
    let height = img.height().saturating_sub(dy * 2).max(1);

    let cropped = img.crop_imm(dx, dy, width, height);

    let mut out = Cursor::new(Vec::new());
    cropped.write_to(&mut out, format)?;

    debug!(
        original_width = img.width(),
        original_height = img.height(),
        width = width,
        height = height,
        "Image cropped"
    );

    Ok(ImageBuffer {
        data: out.into_inner(),
        mime_type: buffer.mime_type.clone(),
        file_name: buffer.file_name.clone(),
    })
}

fn fallback(buffer: ImageBuffer) -> CompressionOutcome {
    CompressionOutcome {
        buffer,
        attempts: 0,
        size_history: Vec::new(),
        met_ceiling: false,
        fell_back: true,
    }
}

/// Downscales so neither side exceeds `max_dimension`; never upscales.
fn fit_within(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img.clone();
    }
    img.resize(max_dimension, max_dimension, FilterType::Triangle)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok(out)
}

fn jpeg_file_name(name: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!("{}.jpg", stem)
}

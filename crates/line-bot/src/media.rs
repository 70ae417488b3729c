//! Image transcoding for vision turns
//!
//! Inbound photos are re-encoded before being stored: scaled down to fit the
//! configured bounding box (never up), JPEG at a low fixed quality, then
//! wrapped as a base64 data URI the completion API accepts inline.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;

/// Transcode raw image bytes to a `data:image/jpeg;base64,…` URI.
///
/// Encoding is CPU-bound, so it runs on the blocking pool; the caller awaits
/// the result before continuing the pipeline.
pub async fn to_jpeg_data_uri(bytes: Vec<u8>, max_pixel: u32, quality: u8) -> Result<String> {
    tokio::task::spawn_blocking(move || transcode(&bytes, max_pixel, quality))
        .await
        .context("image transcoding task failed")?
}

fn transcode(bytes: &[u8], max_pixel: u32, quality: u8) -> Result<String> {
    let mut img = image::load_from_memory(bytes).context("failed to decode image")?;

    // Fit within the bounding box only when a dimension exceeds it; small
    // images keep their native size.
    if img.width() > max_pixel || img.height() > max_pixel {
        img = img.thumbnail(max_pixel, max_pixel);
    }

    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    rgb.write_with_encoder(encoder)
        .context("failed to encode jpeg")?;

    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg)))
}

//! Image encoding: composited canvas → PNG bytes, source photo → VLM payload.
//!
//! PNG is the only output format. It is lossless, so the crisp edges of the
//! rendered text survive, and the `image` encoder is deterministic: the same
//! buffer always produces the same bytes.

use crate::error::EncodeError;
use crate::model::RasterBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode a composited buffer as PNG at its native resolution.
///
/// # Errors
/// [`EncodeError::ZeroArea`] for a buffer without pixels,
/// [`EncodeError::Image`] if the encoder itself fails.
pub fn encode_png(buffer: &RasterBuffer) -> Result<Vec<u8>, EncodeError> {
    let (width, height) = buffer.dimensions();
    if width == 0 || height == 0 {
        return Err(EncodeError::ZeroArea { width, height });
    }
    let mut bytes = Vec::new();
    buffer.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    debug!("Encoded {}x{} canvas → {} PNG bytes", width, height, bytes.len());
    Ok(bytes)
}

/// Encode the source photo as a base64 PNG attachment for the recognizer.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// reading a single downscaled overview; small receipt print needs it.
pub fn encode_for_recognizer(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded source image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

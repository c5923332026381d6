//! Image decoding and encoding for the photo-library path.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::error::SaveError;

/// Decode the file at `path` into an in-memory image.
///
/// A missing, unreadable, or undecodable file is an `InvalidPath`.
pub fn decode_image(path: &Path) -> Result<DynamicImage, SaveError> {
    if !path.is_file() {
        warn!(path = %path.display(), "Image file not found");
        return Err(SaveError::InvalidPath);
    }

    let reader = image::ImageReader::open(path)
        .and_then(image::ImageReader::with_guessed_format)
        .map_err(|e| {
            warn!(path = %path.display(), error = %e, "Could not open image");
            SaveError::InvalidPath
        })?;
    let img = reader.decode().map_err(|e| {
        warn!(path = %path.display(), error = %e, "Could not decode image");
        SaveError::InvalidPath
    })?;

    debug!(
        path = %path.display(),
        width = img.width(),
        height = img.height(),
        "Decoded image"
    );
    Ok(img)
}

/// Encode an image as JPEG bytes, dropping any alpha channel.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Jpeg)?;
    Ok(buf.into_inner())
}

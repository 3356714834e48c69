//! Pure image operations: decode, orient, resize-to-width, JPEG encode, and
//! blur-placeholder synthesis.
//!
//! All functions here operate on in-memory buffers and a `DynamicImage`, and
//! none of them touch the object store or the database — keeping them pure
//! makes them trivial to unit test and lets the workers decide what to do
//! with the bytes (PUT, discard, re-derive).

use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat};

use crate::error::{AppError, AppResult};

/// The fixed longest-side extent the blur placeholder is downsampled to.
/// Small enough that the resulting JPEG is a few hundred bytes.
pub const DEFAULT_BLUR_EXTENT: u32 = 40;

/// Decodes raw image bytes into a `DynamicImage`. Any format the `image`
/// crate supports (JPEG, PNG, WebP) is accepted; unsupported/corrupt bytes
/// are rejected with `AppError::Decode`.
pub fn decode(bytes: &[u8]) -> AppResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|err| AppError::Decode(err.to_string()))
}

/// Applies the EXIF orientation tag (values 1–8) to `img`, returning an
/// upright image. Orientation `1` (or any value outside 1..=8) is a no-op.
pub fn apply_orientation(img: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.fliph().rotate180(),
        5 => img.fliph().rotate90(),
        6 => img.rotate90(),
        7 => img.fliph().rotate270(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Resizes `img` to exactly width `target_width`, preserving aspect ratio
/// (height is derived, not requested). A `target_width` at or above the
/// source width still runs through the filter rather than being
/// short-circuited, so the output is always re-encoded at the configured
/// JPEG quality.
pub fn resize_to_width(img: &DynamicImage, target_width: u32) -> DynamicImage {
    let target_width = target_width.max(1);
    let ratio = target_width as f64 / img.width().max(1) as f64;
    let target_height = ((img.height() as f64) * ratio).round().max(1.0) as u32;
    img.resize_exact(target_width, target_height, imageops::FilterType::Lanczos3)
}

/// Aggressively downsamples `img` along its longest side to `extent`
/// pixels — the source for the `_blur` derivative. The caller JPEG-encodes
/// the result same as any other derivative.
pub fn placeholder(img: &DynamicImage, extent: u32) -> DynamicImage {
    let (w, h) = (img.width().max(1), img.height().max(1));
    let (target_w, target_h) = if w >= h {
        (extent, (extent as f64 * h as f64 / w as f64).round().max(1.0) as u32)
    } else {
        ((extent as f64 * w as f64 / h as f64).round().max(1.0) as u32, extent)
    };
    img.resize_exact(target_w, target_h, imageops::FilterType::Triangle)
}

/// Encodes `img` as a JPEG at `quality` (1–100). The image crate's JPEG
/// encoder only supports 8-bit RGB, so non-RGB sources (e.g. RGBA PNGs with
/// an alpha channel, greyscale) are flattened first.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> AppResult<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let mut cursor = Cursor::new(&mut buf);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|err| AppError::Internal(format!("jpeg encode failed: {err}")))?;
    Ok(buf)
}

/// Guesses an `image::ImageFormat` from a file extension, defaulting to
/// JPEG for anything unrecognized (uploads are validated against
/// `Config::allowed_file_types` before this is ever called).
pub fn format_from_ext(ext: &str) -> ImageFormat {
    ImageFormat::from_extension(ext).unwrap_or(ImageFormat::Jpeg)
}

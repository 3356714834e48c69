//! Derivative key synthesis and derivative-bytes construction.
//!
//! A derivative key is always *synthesized* from `(dir, slug, ext, width)`,
//! never parsed back out of an existing key — see `pipeline::key` for why.
//! This module is the single place that knows the three derivative name
//! shapes (`_w<W>`, `_tile_w<W>`, `_blur`), so upload and reprocess can
//! agree on exactly the same set of keys without duplicating the format
//! strings.

use image::DynamicImage;

use crate::config::Config;
use crate::error::AppResult;
use crate::pipeline::image_ops;

/// One derivative the pipeline is responsible for producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivativeKind {
    Resolution(u32),
    Tile(u32),
    Blur,
}

/// A planned derivative: what to build, and the key it belongs at.
#[derive(Debug, Clone)]
pub struct DerivativeSpec {
    pub kind: DerivativeKind,
    pub key: String,
}

/// The full set of derivatives an image of `dir/slug.ext` must have once
/// ingestion completes successfully.
pub fn plan(dir: &str, slug: &str, ext: &str, config: &Config) -> Vec<DerivativeSpec> {
    let mut specs = Vec::new();

    for &w in &config.resolution_widths_images {
        specs.push(DerivativeSpec {
            kind: DerivativeKind::Resolution(w),
            key: resolution_key(dir, slug, ext, w),
        });
    }
    for &w in &config.resolution_widths_tiles {
        specs.push(DerivativeSpec {
            kind: DerivativeKind::Tile(w),
            key: tile_key(dir, slug, ext, w),
        });
    }
    specs.push(DerivativeSpec {
        kind: DerivativeKind::Blur,
        key: blur_key(dir, slug, ext),
    });

    specs
}

pub fn resolution_key(dir: &str, slug: &str, ext: &str, width: u32) -> String {
    format!("{dir}/{slug}_w{width}.{ext}")
}

pub fn tile_key(dir: &str, slug: &str, ext: &str, width: u32) -> String {
    format!("{dir}/{slug}_tile_w{width}.{ext}")
}

pub fn blur_key(dir: &str, slug: &str, ext: &str) -> String {
    format!("{dir}/{slug}_blur.{ext}")
}

/// Builds the JPEG bytes for one derivative from the already-decoded and
/// already-oriented canonical image. CPU-bound; callers run this inside
/// `spawn_blocking`.
pub fn build_bytes(kind: DerivativeKind, canonical: &DynamicImage, config: &Config) -> AppResult<Vec<u8>> {
    let rendered = match kind {
        DerivativeKind::Resolution(w) | DerivativeKind::Tile(w) => image_ops::resize_to_width(canonical, w),
        DerivativeKind::Blur => image_ops::placeholder(canonical, config.blur_extent),
    };
    image_ops::encode_jpeg(&rendered, config.jpeg_quality)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            resolution_widths_images: vec![320, 768, 1280],
            resolution_widths_tiles: vec![160, 320],
            ..Config::test_defaults()
        }
    }

    #[test]
    fn plan_covers_every_configured_width_and_blur() {
        let specs = plan("2023", "11111111-1111-1111-1111-111111111111", "jpg", &test_config());
        let keys: Vec<&str> = specs.iter().map(|s| s.key.as_str()).collect();

        assert!(keys.contains(&"2023/11111111-1111-1111-1111-111111111111_w320.jpg"));
        assert!(keys.contains(&"2023/11111111-1111-1111-1111-111111111111_w768.jpg"));
        assert!(keys.contains(&"2023/11111111-1111-1111-1111-111111111111_w1280.jpg"));
        assert!(keys.contains(&"2023/11111111-1111-1111-1111-111111111111_tile_w160.jpg"));
        assert!(keys.contains(&"2023/11111111-1111-1111-1111-111111111111_tile_w320.jpg"));
        assert!(keys.contains(&"2023/11111111-1111-1111-1111-111111111111_blur.jpg"));
        assert_eq!(specs.len(), 6);
    }

    #[test]
    fn key_helpers_match_plan_output() {
        assert_eq!(resolution_key("uploads", "s", "png", 320), "uploads/s_w320.png");
        assert_eq!(tile_key("uploads", "s", "png", 160), "uploads/s_tile_w160.png");
        assert_eq!(blur_key("uploads", "s", "png"), "uploads/s_blur.png");
    }
}

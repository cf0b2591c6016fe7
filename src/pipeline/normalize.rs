//! Normalisation: bound the longest edge and re-encode as a JPEG data URI.
//!
//! Phone photos are 3000–5000 px on the long side. Vision APIs downscale
//! them server-side anyway, so shipping the full frame only inflates the
//! request body (a 4 MB JPEG becomes 5.3 MB of base64). Capping the longest
//! edge at 1024 px and re-encoding at quality 0.7 typically yields a
//! 100–200 KB payload that still reads fine print.
//!
//! Scaling and encoding happen on a [`RenderSurface`]. When the surface
//! fails the photo is passed through untouched and a
//! [`CompressionDegraded`] warning travels with it: a bigger request is
//! better than no request.

use crate::config::AnalysisConfig;
use crate::error::CompressionDegraded;
use crate::pipeline::load::DecodedBitmap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::borrow::Cow;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Output dimensions for a `width × height` bitmap bounded by `max`.
///
/// The longest edge is clamped to `max` and the other edge scaled by the same
/// factor, rounded half away from zero. Images already within bounds are
/// returned unchanged: never upscaled. When both edges are equal the height
/// branch applies, which yields the same result.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width > height {
        if width > max {
            (max, scale_edge(height, max, width))
        } else {
            (width, height)
        }
    } else if height > max {
        (scale_edge(width, max, height), max)
    } else {
        (width, height)
    }
}

fn scale_edge(edge: u32, max: u32, longest: u32) -> u32 {
    let scaled = (f64::from(edge) * f64::from(max) / f64::from(longest)).round();
    (scaled as u32).max(1)
}

/// Failure of a [`RenderSurface`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SurfaceError(pub String);

impl From<image::ImageError> for SurfaceError {
    fn from(e: image::ImageError) -> Self {
        SurfaceError(e.to_string())
    }
}

/// Something that can draw a bitmap at a given size and encode the result.
pub trait RenderSurface: Send + Sync {
    /// Scale `image` to exactly `width × height` and encode it.
    ///
    /// `quality` is on the 1–100 scale.
    fn render(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, SurfaceError>;

    /// Mime type of the bytes [`Self::render`] produces.
    fn mime_type(&self) -> &'static str {
        "image/jpeg"
    }
}

/// Default surface: triangle-filter resize, flatten to RGB, baseline JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegSurface;

impl RenderSurface for JpegSurface {
    fn render(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        quality: u8,
    ) -> Result<Vec<u8>, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError(format!(
                "cannot render a {width}x{height} surface"
            )));
        }

        let scaled = if (image.width(), image.height()) == (width, height) {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(image.resize_exact(width, height, FilterType::Triangle))
        };

        // JPEG has no alpha channel.
        let rgb = scaled.to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buf)
    }
}

/// A photo ready to be sent: a self-describing data URI plus its geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    data_uri: String,
    mime: String,
    width: u32,
    height: u32,
    original_data_uri_len: usize,
}

impl NormalizedImage {
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of the data URI the untouched file would have produced.
    pub fn original_data_uri_len(&self) -> usize {
        self.original_data_uri_len
    }

    /// `true` when normalisation actually shrank the payload.
    pub fn is_smaller_than_original(&self) -> bool {
        self.data_uri.len() < self.original_data_uri_len
    }

    pub fn into_data_uri(self) -> String {
        self.data_uri
    }
}

/// Output of [`normalize`]: the image, plus a warning when it fell back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub image: NormalizedImage,
    pub degraded: Option<CompressionDegraded>,
}

/// Bound and re-encode a decoded bitmap.
///
/// Never fails: on surface failure the source bytes are emitted as-is and
/// [`Normalized::degraded`] is set.
pub fn normalize(
    bitmap: &DecodedBitmap,
    surface: &dyn RenderSurface,
    config: &AnalysisConfig,
) -> Normalized {
    let (width, height) = target_dimensions(bitmap.width, bitmap.height, config.max_dimension);
    let original_data_uri_len = bitmap.source.data_uri_len();
    debug!(
        "Normalising {}x{} → {}x{} (max {})",
        bitmap.width, bitmap.height, width, height, config.max_dimension
    );

    match surface.render(&bitmap.image, width, height, config.jpeg_quality_percent()) {
        Ok(bytes) => {
            let mime = surface.mime_type();
            let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(&bytes));
            let image = NormalizedImage {
                data_uri,
                mime: mime.to_string(),
                width,
                height,
                original_data_uri_len,
            };
            if image.is_smaller_than_original() {
                info!(
                    "Image compressed: {} → {} bytes as data URI",
                    original_data_uri_len,
                    image.data_uri.len()
                );
            }
            Normalized {
                image,
                degraded: None,
            }
        }
        Err(e) => {
            warn!("Render surface failed, using original image: {}", e);
            Normalized {
                image: NormalizedImage {
                    data_uri: bitmap.source.to_data_uri(),
                    mime: bitmap.source.mime.clone(),
                    width: bitmap.width,
                    height: bitmap.height,
                    original_data_uri_len,
                },
                degraded: Some(CompressionDegraded {
                    reason: e.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::load::RawImageFile;
    use image::{Rgba, RgbaImage};

    struct UnavailableSurface;

    impl RenderSurface for UnavailableSurface {
        fn render(&self, _: &DynamicImage, _: u32, _: u32, _: u8) -> Result<Vec<u8>, SurfaceError> {
            Err(SurfaceError("2d context unavailable".into()))
        }
    }

    fn bitmap(w: u32, h: u32) -> DecodedBitmap {
        DecodedBitmap {
            image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 255, 128]))),
            width: w,
            height: h,
            source: RawImageFile::new(vec![1, 2, 3, 4, 5], "image/png"),
        }
    }

    #[test]
    fn landscape_over_bound() {
        assert_eq!(target_dimensions(4000, 3000, 1024), (1024, 768));
        assert_eq!(target_dimensions(2048, 1000, 1024), (1024, 500));
        // 333 * 1024 / 2000 = 170.496
        assert_eq!(target_dimensions(2000, 333, 1024), (1024, 170));
    }

    #[test]
    fn portrait_and_square_over_bound() {
        assert_eq!(target_dimensions(3000, 4000, 1024), (768, 1024));
        assert_eq!(target_dimensions(2000, 2000, 1024), (1024, 1024));
    }

    #[test]
    fn within_bound_is_untouched() {
        assert_eq!(target_dimensions(1024, 1024, 1024), (1024, 1024));
        assert_eq!(target_dimensions(800, 20, 1024), (800, 20));
        assert_eq!(target_dimensions(1, 1, 1024), (1, 1));
    }

    #[test]
    fn rounds_half_away_from_zero() {
        // 3 * 1024 / 2048 = 1.5
        assert_eq!(target_dimensions(2048, 3, 1024), (1024, 2));
    }

    #[test]
    fn extreme_strip_keeps_one_pixel() {
        assert_eq!(target_dimensions(100_000, 1, 1024), (1024, 1));
    }

    #[test]
    fn jpeg_surface_scales_and_encodes() {
        let out = normalize(&bitmap(2048, 1000), &JpegSurface, &AnalysisConfig::default());
        assert!(out.degraded.is_none());
        assert_eq!((out.image.width(), out.image.height()), (1024, 500));
        assert_eq!(out.image.mime(), "image/jpeg");

        let payload = out
            .image
            .data_uri()
            .strip_prefix("data:image/jpeg;base64,")
            .expect("jpeg data uri");
        let bytes = STANDARD.decode(payload).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1024, 500));
    }

    #[test]
    fn small_image_is_reencoded_not_upscaled() {
        let out = normalize(&bitmap(300, 200), &JpegSurface, &AnalysisConfig::default());
        assert_eq!((out.image.width(), out.image.height()), (300, 200));
        assert!(out.image.data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn unavailable_surface_degrades_to_original() {
        let bm = bitmap(2048, 1000);
        let out = normalize(&bm, &UnavailableSurface, &AnalysisConfig::default());
        let warning = out.degraded.expect("degraded signal");
        assert!(warning.reason.contains("unavailable"));
        assert_eq!(out.image.data_uri(), bm.source.to_data_uri());
        assert_eq!(out.image.mime(), "image/png");
        assert_eq!((out.image.width(), out.image.height()), (2048, 1000));
        assert!(!out.image.is_smaller_than_original());
    }

    #[test]
    fn deterministic_for_same_input() {
        let bm = bitmap(1500, 900);
        let a = normalize(&bm, &JpegSurface, &AnalysisConfig::default());
        let b = normalize(&bm, &JpegSurface, &AnalysisConfig::default());
        assert_eq!(a, b);
    }
}

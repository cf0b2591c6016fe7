//! Image loading: raw selected bytes → decoded bitmap.
//!
//! Cheap checks run first (declared mime, byte ceiling, empty input) so a
//! wrong or oversized file is rejected before the decoder allocates. The
//! decode itself runs in `spawn_blocking`: `image` decoders are CPU-bound
//! and a 12 MP JPEG would stall a Tokio worker for tens of milliseconds.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::request::is_valid_mime;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// A user-selected file, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageFile {
    pub bytes: Vec<u8>,
    /// Declared mime type, e.g. `image/png`.
    pub mime: String,
    pub name: Option<String>,
}

impl RawImageFile {
    pub fn new(bytes: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a file from disk, declaring its mime type from the extension.
    ///
    /// Unknown extensions are declared `application/octet-stream` and then
    /// rejected by [`load_image`].
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AnalysisError::ReadFailed {
                detail: format!("{}: {}", path.display(), e),
            })?;

        let mime = image::ImageFormat::from_path(path)
            .map(|f| f.to_mime_type())
            .unwrap_or("application/octet-stream");

        let mut file = Self::new(bytes, mime);
        file.name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(file)
    }

    /// `data:<mime>;base64,<payload>` of the untouched bytes.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Length [`Self::to_data_uri`] would have, without encoding.
    pub fn data_uri_len(&self) -> usize {
        "data:;base64,".len() + self.mime.len() + self.bytes.len().div_ceil(3) * 4
    }

    /// `image/<subtype>` in the same grammar the request builder accepts.
    fn has_image_mime(&self) -> bool {
        is_valid_mime(&self.mime)
            && self
                .mime
                .split('/')
                .next()
                .is_some_and(|top| top.eq_ignore_ascii_case("image"))
    }
}

/// A decoded photo with its natural dimensions.
///
/// Keeps the source file so normalisation can fall back to it.
#[derive(Debug, Clone)]
pub struct DecodedBitmap {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub source: RawImageFile,
}

/// Decode a selected file into a bitmap.
///
/// # Errors
/// Every failure has kind [`crate::error::ErrorKind::DecodeError`]:
/// - [`AnalysisError::NotAnImage`] — declared mime is not `image/*`
/// - [`AnalysisError::InputTooLarge`] — more than `config.max_input_bytes`
/// - [`AnalysisError::Decode`] — empty, corrupt or unsupported content
pub async fn load_image(
    file: RawImageFile,
    config: &AnalysisConfig,
) -> Result<DecodedBitmap, AnalysisError> {
    if !file.has_image_mime() {
        return Err(AnalysisError::NotAnImage { mime: file.mime });
    }
    if file.bytes.len() > config.max_input_bytes {
        return Err(AnalysisError::InputTooLarge {
            size: file.bytes.len(),
            limit: config.max_input_bytes,
        });
    }
    if file.bytes.is_empty() {
        return Err(AnalysisError::Decode {
            detail: "file is empty".into(),
        });
    }

    let (file, decoded) = tokio::task::spawn_blocking(move || {
        let decoded = image::load_from_memory(&file.bytes);
        (file, decoded)
    })
    .await
    .map_err(|e| AnalysisError::Decode {
        detail: format!("decoder task panicked: {}", e),
    })?;

    let image = decoded.map_err(|e| AnalysisError::Decode {
        detail: e.to_string(),
    })?;

    let (width, height) = (image.width(), image.height());
    debug!(
        "Decoded {} ({}) → {}x{} px",
        file.name.as_deref().unwrap_or("<unnamed>"),
        file.mime,
        width,
        height
    );

    Ok(DecodedBitmap {
        image,
        width,
        height,
        source: file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn decodes_natural_dimensions() {
        let file = RawImageFile::new(png_bytes(40, 25), "image/png").with_name("a.png");
        let bitmap = load_image(file, &AnalysisConfig::default()).await.unwrap();
        assert_eq!((bitmap.width, bitmap.height), (40, 25));
        assert_eq!(bitmap.source.name.as_deref(), Some("a.png"));
    }

    #[tokio::test]
    async fn corrupt_bytes_are_decode_errors() {
        let file = RawImageFile::new(b"definitely not a png".to_vec(), "image/png");
        let err = load_image(file, &AnalysisConfig::default()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::Decode { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn non_image_mime_rejected_before_decode() {
        let file = RawImageFile::new(png_bytes(4, 4), "text/plain");
        let err = load_image(file, &AnalysisConfig::default()).await.unwrap_err();
        assert_eq!(err, AnalysisError::NotAnImage { mime: "text/plain".into() });
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }

    #[tokio::test]
    async fn byte_ceiling_enforced() {
        let config = AnalysisConfig::builder().max_input_bytes(16).build().unwrap();
        let file = RawImageFile::new(vec![0u8; 17], "image/jpeg");
        let err = load_image(file, &config).await.unwrap_err();
        assert_eq!(err, AnalysisError::InputTooLarge { size: 17, limit: 16 });
    }

    #[test]
    fn empty_file_is_decode_error() {
        let file = RawImageFile::new(Vec::new(), "image/png");
        let err = tokio_test::block_on(load_image(file, &AnalysisConfig::default())).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn mime_check_requires_image_top_level_type() {
        assert!(RawImageFile::new(vec![], "IMAGE/PNG").has_image_mime());
        assert!(!RawImageFile::new(vec![], "image").has_image_mime());
        assert!(!RawImageFile::new(vec![], "application/pdf").has_image_mime());
        assert!(!RawImageFile::new(vec![], "image/").has_image_mime());
        assert!(!RawImageFile::new(vec![], "image/jpeg; charset=x").has_image_mime());
    }

    #[tokio::test]
    async fn malformed_mime_is_decode_error() {
        for mime in ["image/", "image/png; charset=x"] {
            let file = RawImageFile::new(png_bytes(4, 4), mime);
            let err = load_image(file, &AnalysisConfig::default()).await.unwrap_err();
            assert_eq!(err, AnalysisError::NotAnImage { mime: mime.into() });
            assert_eq!(err.kind(), ErrorKind::DecodeError);
        }
    }

    #[test]
    fn data_uri_len_matches_encoding() {
        for n in [0usize, 1, 2, 3, 4, 100] {
            let f = RawImageFile::new(vec![7u8; n], "image/webp");
            assert_eq!(f.data_uri_len(), f.to_data_uri().len(), "n={n}");
        }
    }

    #[tokio::test]
    async fn from_path_declares_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, png_bytes(3, 3)).unwrap();

        let file = RawImageFile::from_path(&path).await.unwrap();
        assert_eq!(file.mime, "image/png");
        assert_eq!(file.name.as_deref(), Some("scan.png"));
    }

    #[tokio::test]
    async fn from_path_missing_file_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = RawImageFile::from_path(dir.path().join("nope.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ReadFailed { .. }));
    }
}

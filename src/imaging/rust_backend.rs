//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader` with guessed format |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e) |
//! | Encode → progressive JPEG | `jpeg_encoder::Encoder` |
//! | Placeholder | `resize_exact` (`Triangle`) + baseline JPEG, optimized Huffman tables |

use super::backend::{BackendError, Dimensions, EncodedVariant, ImageBackend};
use super::calculations::fit_inside;
use super::params::{BoundingBox, PlaceholderParams, Quality, VariantParams};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders may be compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Best-effort media type for a file extension, e.g. `"png"` → `"image/png"`.
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_ascii_lowercase();
    PHOTO_CANDIDATES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, fmt)| fmt.to_mime_type())
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn dimensions_of(image: &DynamicImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}

/// Resize to fit inside `target`, borrowing the source when it already fits.
fn fit_image<'a>(
    image: &'a DynamicImage,
    target: BoundingBox,
    filter: FilterType,
) -> Cow<'a, DynamicImage> {
    let dims = dimensions_of(image);
    let (width, height) = fit_inside((dims.width, dims.height), target);
    if (width, height) == (dims.width, dims.height) {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(image.resize_exact(width, height, filter))
    }
}

/// Encode as AVIF using rav1e.
///
/// The encoder only takes 8-bit RGB(A); anything else is converted first.
fn encode_avif(image: &DynamicImage, quality: Quality, speed: u8) -> Result<Vec<u8>, BackendError> {
    let converted = match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        other if other.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    };

    let mut buf = Vec::new();
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        &mut buf,
        speed.clamp(1, 10),
        quality.value(),
    );
    converted
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode {
            format: "AVIF",
            message: e.to_string(),
        })?;
    Ok(buf)
}

/// Encode as JPEG. Alpha is discarded.
///
/// Huffman tables are always optimized: for tiny images the standard tables
/// outweigh the scan data.
fn encode_jpeg(
    image: &DynamicImage,
    quality: Quality,
    progressive: bool,
) -> Result<Vec<u8>, BackendError> {
    let encode_error = |message: String| BackendError::Encode {
        format: "JPEG",
        message,
    };

    let rgb = image.to_rgb8();
    let width = u16::try_from(rgb.width())
        .map_err(|_| encode_error(format!("width {} exceeds JPEG limit", rgb.width())))?;
    let height = u16::try_from(rgb.height())
        .map_err(|_| encode_error(format!("height {} exceeds JPEG limit", rgb.height())))?;

    let mut buf = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut buf, quality.value());
    encoder.set_progressive(progressive);
    encoder.set_optimized_huffman_tables(true);
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| encode_error(e.to_string()))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn encode_variant(
        &self,
        image: &DynamicImage,
        params: &VariantParams,
    ) -> Result<EncodedVariant, BackendError> {
        let resized = fit_image(image, params.target, FilterType::Lanczos3);
        let dims = dimensions_of(&resized);

        let avif = encode_avif(&resized, params.avif_quality, params.avif_speed)?;
        let jpeg = encode_jpeg(&resized, params.jpeg_quality, true)?;

        Ok(EncodedVariant {
            avif,
            jpeg,
            width: dims.width,
            height: dims.height,
        })
    }

    fn encode_placeholder(
        &self,
        image: &DynamicImage,
        params: &PlaceholderParams,
    ) -> Result<Vec<u8>, BackendError> {
        // Lanczos is wasted on a 20px preview
        let tiny = fit_image(image, params.target, FilterType::Triangle);
        encode_jpeg(&tiny, params.quality, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{encode_test_jpeg, encode_test_png, synthetic_image};

    fn variant_params(edge: u32) -> VariantParams {
        VariantParams {
            target: BoundingBox::square(edge),
            avif_quality: Quality::new(80),
            avif_speed: 10,
            jpeg_quality: Quality::new(85),
        }
    }

    #[test]
    fn supported_extensions_match_decodable_formats() {
        let exts = supported_input_extensions();
        for expected in &["jpg", "jpeg", "png", "tif", "tiff", "webp", "gif", "bmp"] {
            assert!(
                exts.contains(expected),
                "expected {expected} in supported extensions"
            );
        }
    }

    #[test]
    fn media_type_lookup_is_case_insensitive() {
        assert_eq!(media_type_for_extension("PNG"), Some("image/png"));
        assert_eq!(media_type_for_extension("jpg"), Some("image/jpeg"));
        assert_eq!(media_type_for_extension("psd"), None);
    }

    #[test]
    fn decode_png_bytes() {
        let backend = RustBackend::new();
        let image = backend.decode(&encode_test_png(120, 80)).unwrap();
        assert_eq!((image.width(), image.height()), (120, 80));
    }

    #[test]
    fn decode_jpeg_bytes() {
        let backend = RustBackend::new();
        let image = backend.decode(&encode_test_jpeg(64, 48)).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let backend = RustBackend::new();
        let result = backend.decode(b"definitely not pixels");
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn decode_truncated_png_is_decode_error() {
        let backend = RustBackend::new();
        let mut bytes = encode_test_png(50, 50);
        bytes.truncate(40);
        assert!(matches!(backend.decode(&bytes), Err(BackendError::Decode(_))));
    }

    #[test]
    fn variant_downscales_into_box() {
        let backend = RustBackend::new();
        let source = synthetic_image(300, 200);

        let variant = backend.encode_variant(&source, &variant_params(150)).unwrap();

        assert_eq!((variant.width, variant.height), (150, 100));
        assert!(!variant.avif.is_empty());
        assert!(!variant.jpeg.is_empty());
    }

    #[test]
    fn variant_never_upscales() {
        let backend = RustBackend::new();
        let source = synthetic_image(40, 30);

        let variant = backend.encode_variant(&source, &variant_params(1200)).unwrap();

        assert_eq!((variant.width, variant.height), (40, 30));
    }

    #[test]
    fn variant_jpeg_is_progressive_and_decodable() {
        let backend = RustBackend::new();
        let source = synthetic_image(90, 60);

        let variant = backend.encode_variant(&source, &variant_params(60)).unwrap();

        // SOF2 marker identifies a progressive DCT frame
        assert!(variant.jpeg.windows(2).any(|w| w == [0xFF, 0xC2]));
        let decoded = image::load_from_memory(&variant.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 40));
    }

    #[test]
    fn variant_accepts_rgba_and_luma_sources() {
        let backend = RustBackend::new();
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(32, 32));
        let luma = DynamicImage::ImageLuma8(image::GrayImage::new(32, 32));

        assert!(backend.encode_variant(&rgba, &variant_params(16)).is_ok());
        assert!(backend.encode_variant(&luma, &variant_params(16)).is_ok());
    }

    #[test]
    fn placeholder_is_tiny() {
        let backend = RustBackend::new();
        let source = synthetic_image(400, 300);

        let bytes = backend
            .encode_placeholder(&source, &PlaceholderParams::default())
            .unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 15));
        assert!(bytes.len() < 1024, "placeholder was {} bytes", bytes.len());
    }
}

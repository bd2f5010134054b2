//! Profile picture encoding.
//!
//! A user-picked image is shrunk so its longer side is at most `bound`
//! pixels (aspect ratio kept, never upscaled), re-encoded as JPEG at a fixed
//! quality, and wrapped in a `data:` URL that travels inside the join intent.
//!
//! Pictures are always optional: any failure along the way yields `None`
//! rather than an error, so a bad file can never block a join.

/// Longest side, in pixels, of an encoded picture unless told otherwise.
pub const DEFAULT_PICTURE_BOUND: u32 = 256;

/// JPEG quality used for every encoded picture.
pub const JPEG_QUALITY: u8 = 90;

/// Upper limit on the length of an encoded `data:` URL.
pub const MAX_PICTURE_BYTES: usize = 256 * 1024;

/// A bounded, transportable profile picture.
///
/// Only the encoder can produce one, so every value respects
/// [`MAX_PICTURE_BYTES`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPicture {
    data_url: String,
    width: u32,
    height: u32,
}

impl EncodedPicture {
    /// The `data:image/jpeg;base64,...` URL sent to the server.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn into_data_url(self) -> String {
        self.data_url
    }
}

/// Output size for a `width`×`height` image bounded to `bound` on its longer side.
///
/// Images that already fit are returned unchanged.
pub fn scaled_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= bound {
        return (width, height);
    }
    let scale = f64::from(bound) / f64::from(longest);
    let scale_side = |side: u32| -> u32 {
        // Clamped to [1, bound], so the cast cannot truncate.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = (f64::from(side) * scale).round() as u32;
        scaled.clamp(1, bound.max(1))
    };
    (scale_side(width), scale_side(height))
}

#[cfg(feature = "picture")]
mod encode {
    use std::io::Cursor;
    use std::path::Path;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use image::codecs::jpeg::JpegEncoder;
    use image::imageops::FilterType;
    use tracing::{debug, warn};

    use super::{scaled_dimensions, EncodedPicture, JPEG_QUALITY, MAX_PICTURE_BYTES};

    /// Encode raw image bytes into a bounded JPEG `data:` URL.
    ///
    /// Decoding and encoding run on the blocking thread pool. Returns `None`
    /// when `source` is `None`, the bytes are not a decodable image, encoding
    /// fails, or the result exceeds [`MAX_PICTURE_BYTES`].
    pub async fn encode_picture(source: Option<Vec<u8>>, bound: u32) -> Option<EncodedPicture> {
        let bytes = source?;
        match tokio::task::spawn_blocking(move || encode_blocking(&bytes, bound)).await {
            Ok(picture) => picture,
            Err(e) => {
                warn!("picture encoder task failed: {e}");
                None
            }
        }
    }

    /// Read an image file and encode it like [`encode_picture`].
    ///
    /// An unreadable file yields `None`.
    pub async fn encode_picture_file(
        path: impl AsRef<Path>,
        bound: u32,
    ) -> Option<EncodedPicture> {
        let path = path.as_ref().to_path_buf();
        let read = tokio::task::spawn_blocking(move || std::fs::read(&path)).await;
        match read {
            Ok(Ok(bytes)) => encode_picture(Some(bytes), bound).await,
            Ok(Err(e)) => {
                warn!("could not read picture file: {e}");
                None
            }
            Err(e) => {
                warn!("picture reader task failed: {e}");
                None
            }
        }
    }

    fn encode_blocking(bytes: &[u8], bound: u32) -> Option<EncodedPicture> {
        let img = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!("could not decode picture: {e}");
                return None;
            }
        };

        let (width, height) = scaled_dimensions(img.width(), img.height(), bound);
        let img = if (width, height) == (img.width(), img.height()) {
            img
        } else {
            img.resize_exact(width, height, FilterType::Triangle)
        };
        // JPEG has no alpha channel.
        let rgb = img.to_rgb8();

        let mut jpeg = Cursor::new(Vec::new());
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
        if let Err(e) = encoder.encode_image(&rgb) {
            warn!("could not encode picture: {e}");
            return None;
        }

        let data_url = format!(
            "data:image/jpeg;base64,{}",
            STANDARD.encode(jpeg.into_inner())
        );
        if data_url.len() > MAX_PICTURE_BYTES {
            warn!(
                len = data_url.len(),
                max = MAX_PICTURE_BYTES,
                "encoded picture too large, dropping it"
            );
            return None;
        }

        debug!(width, height, len = data_url.len(), "picture encoded");
        Some(EncodedPicture {
            data_url,
            width,
            height,
        })
    }
}

#[cfg(feature = "picture")]
pub use encode::{encode_picture, encode_picture_file};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_is_clamped_on_its_longer_side() {
        assert_eq!(scaled_dimensions(1000, 500, 256), (256, 128));
    }

    #[test]
    fn tall_image_is_clamped_on_its_longer_side() {
        assert_eq!(scaled_dimensions(300, 1200, 256), (64, 256));
    }

    #[test]
    fn small_image_is_not_upscaled() {
        assert_eq!(scaled_dimensions(200, 100, 256), (200, 100));
        assert_eq!(scaled_dimensions(256, 256, 256), (256, 256));
    }

    #[test]
    fn extreme_aspect_ratio_keeps_at_least_one_pixel() {
        assert_eq!(scaled_dimensions(10_000, 1, 256), (256, 1));
    }

    #[cfg(feature = "picture")]
    mod encoding {
        use super::super::*;
        use image::{ImageFormat, RgbImage};

        fn png(width: u32, height: u32) -> Vec<u8> {
            let img = RgbImage::from_fn(width, height, |x, y| {
                image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
            });
            let mut out = std::io::Cursor::new(Vec::new());
            img.write_to(&mut out, ImageFormat::Png).unwrap();
            out.into_inner()
        }

        fn decoded_size(picture: &EncodedPicture) -> (u32, u32) {
            use base64::Engine;
            let b64 = picture
                .data_url()
                .strip_prefix("data:image/jpeg;base64,")
                .unwrap();
            let jpeg = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .unwrap();
            let img = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
            (img.width(), img.height())
        }

        #[tokio::test]
        async fn large_image_is_downscaled_to_bound() {
            let picture = encode_picture(Some(png(1000, 500)), 256).await.unwrap();
            assert_eq!((picture.width(), picture.height()), (256, 128));
            assert_eq!(decoded_size(&picture), (256, 128));
        }

        #[tokio::test]
        async fn small_image_passes_through_at_original_size() {
            let picture = encode_picture(Some(png(200, 100)), 256).await.unwrap();
            assert_eq!(decoded_size(&picture), (200, 100));
        }

        #[tokio::test]
        async fn absent_input_yields_no_picture() {
            assert!(encode_picture(None, 256).await.is_none());
        }

        #[tokio::test]
        async fn undecodable_input_yields_no_picture() {
            let garbage = b"definitely not an image".to_vec();
            assert!(encode_picture(Some(garbage), 256).await.is_none());
        }

        #[tokio::test]
        async fn missing_file_yields_no_picture() {
            let picture =
                encode_picture_file("/nonexistent/buzzer-client/picture.png", 256).await;
            assert!(picture.is_none());
        }
    }
}

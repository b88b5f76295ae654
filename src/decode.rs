use crate::error::{RecognizeError, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Read;

/// Codecs tried by [`decode`], in priority order.
pub const SUPPORTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Jpeg, ImageFormat::Png];

/// A decoded pixel grid together with the encoding it was read from.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
    format: ImageFormat,
}

impl DecodedImage {
    pub fn new(image: DynamicImage, format: ImageFormat) -> Self {
        Self { image, format }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }
}

pub(crate) fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        _ => "other",
    }
}

/// Decodes an in-memory image by trying each supported codec in turn.
///
/// Every attempt reads from its own view of `bytes`, so a failed attempt never
/// leaves state behind for the next one.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage> {
    for format in SUPPORTED_FORMATS {
        match image::load_from_memory_with_format(bytes, format) {
            Ok(image) => {
                if image.width() == 0 || image.height() == 0 {
                    return Err(RecognizeError::InvalidImage(format!(
                        "{} image has zero size ({}x{})",
                        format_name(format),
                        image.width(),
                        image.height()
                    )));
                }
                log::debug!(
                    "Decoded {} image of {}x{}",
                    format_name(format),
                    image.width(),
                    image.height()
                );
                return Ok(DecodedImage::new(image, format));
            }
            Err(e) => log::trace!("{} decode attempt failed: {}", format_name(format), e),
        }
    }

    Err(RecognizeError::UnsupportedFormat {
        attempted: SUPPORTED_FORMATS.iter().copied().map(format_name).collect(),
    })
}

/// Buffers `reader` to the end once, then decodes the buffer.
pub fn decode_reader<R: Read>(mut reader: R) -> Result<DecodedImage> {
    let mut buffer = Vec::new();
    reader
        .read_to_end(&mut buffer)
        .map_err(|e| RecognizeError::InvalidImage(format!("failed to read image bytes: {e}")))?;
    decode(&buffer)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    pub(crate) fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7) as u8, (y * 5) as u8, 128])
        }))
    }

    #[test]
    fn decodes_jpeg() {
        let bytes = encode(&gradient(32, 24), ImageFormat::Jpeg);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.format(), ImageFormat::Jpeg);
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
    }

    #[test]
    fn falls_back_to_png_after_jpeg_fails() {
        let bytes = encode(&gradient(5, 9), ImageFormat::Png);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.format(), ImageFormat::Png);
        assert_eq!((decoded.width(), decoded.height()), (5, 9));
    }

    #[test]
    fn rejects_garbage_naming_all_formats() {
        let err = decode(b"definitely not an image").unwrap_err();
        match err {
            RecognizeError::UnsupportedFormat { attempted } => {
                assert_eq!(attempted, vec!["JPEG", "PNG"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            decode(&[]),
            Err(RecognizeError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn reader_input_is_buffered_once() {
        let bytes = encode(&gradient(3, 4), ImageFormat::Png);
        // A plain slice reader cannot seek back; PNG still decodes after the
        // JPEG attempt because both run against the same buffer.
        let decoded = decode_reader(&bytes[..]).unwrap();
        assert_eq!(decoded.format(), ImageFormat::Png);
        assert_eq!((decoded.width(), decoded.height()), (3, 4));
    }
}

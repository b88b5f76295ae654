use crate::decode::DecodedImage;
use crate::error::{RecognizeError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use ndarray::Array4;

/// Number of color channels packed per pixel.
pub const CHANNELS: usize = 3;

/// Batch tensor fed to the inference engine.
///
/// Shape is always `[1, H, W, 3]` in standard (row-major) layout: y outer,
/// x inner, channel innermost. Values lie in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    /// Wraps an existing array, checking the batch layout.
    pub fn from_array(data: Array4<f32>) -> Result<Self> {
        let shape = data.shape();
        if shape[0] != 1 || shape[3] != CHANNELS || shape[1] == 0 || shape[2] == 0 {
            return Err(RecognizeError::Preprocess(format!(
                "expected tensor shape [1, H, W, {CHANNELS}], got {shape:?}"
            )));
        }
        if !data.is_standard_layout() {
            return Err(RecognizeError::Preprocess(
                "tensor is not in row-major layout".to_string(),
            ));
        }
        Ok(Self { data })
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, self.height(), self.width(), CHANNELS]
    }

    /// Flat view of the values in `[1, H, W, 3]` order.
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_inner(self) -> Array4<f32> {
        self.data
    }
}

/// Resizes `image` to `target_width` x `target_height` with Lanczos3,
/// normalizes each channel to `[0, 1]` and packs it as `[1, H, W, 3]`.
///
/// The aspect ratio is not preserved.
pub fn preprocess(
    image: &DecodedImage,
    target_height: u32,
    target_width: u32,
) -> Result<InputTensor> {
    if image.width() == 0 || image.height() == 0 {
        return Err(RecognizeError::InvalidImage(format!(
            "image has zero size ({}x{})",
            image.width(),
            image.height()
        )));
    }
    if target_height == 0 || target_width == 0 {
        return Err(RecognizeError::Preprocess(format!(
            "target size must be non-zero, got {target_width}x{target_height}"
        )));
    }

    // 8-bit sources are widened by 257, so every input normalizes against
    // the same 16-bit maximum.
    let rgb = premultiplied_rgb16(image.as_dynamic());
    let resized = imageops::resize(&rgb, target_width, target_height, FilterType::Lanczos3);
    if resized.dimensions() != (target_width, target_height) {
        return Err(RecognizeError::Preprocess(format!(
            "resampling produced {}x{}, expected {target_width}x{target_height}",
            resized.width(),
            resized.height()
        )));
    }

    let scale = f32::from(u16::MAX);
    let values: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|sample| f32::from(sample) / scale)
        .collect();

    // ImageBuffer stores rows top to bottom with interleaved channels,
    // which is exactly the NHWC order.
    let data = Array4::from_shape_vec(
        (1, target_height as usize, target_width as usize, CHANNELS),
        values,
    )
    .map_err(|e| RecognizeError::Preprocess(format!("failed to pack tensor: {e}")))?;

    InputTensor::from_array(data)
}

/// Widens to 16-bit RGB, scaling color by alpha before alpha is dropped.
fn premultiplied_rgb16(image: &DynamicImage) -> ImageBuffer<Rgb<u16>, Vec<u16>> {
    if !image.color().has_alpha() {
        return image.to_rgb16();
    }

    let rgba = image.to_rgba16();
    ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
        let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
        let max = u32::from(u16::MAX);
        let scale = |c: u16| ((u32::from(c) * u32::from(a) + max / 2) / max) as u16;
        Rgb([scale(r), scale(g), scale(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage, RgbaImage};

    fn decoded(image: DynamicImage) -> DecodedImage {
        DecodedImage::new(image, ImageFormat::Png)
    }

    fn assert_in_unit_range(tensor: &InputTensor) {
        for value in tensor.view().iter() {
            assert!((0.0..=1.0).contains(value), "value out of range: {value}");
        }
    }

    #[test]
    fn output_shape_matches_target_for_any_input() {
        for (w, h) in [(1, 1), (17, 3), (300, 200), (1024, 768)] {
            let image = decoded(DynamicImage::ImageRgb8(RgbImage::from_pixel(
                w,
                h,
                Rgb([10, 20, 30]),
            )));
            let tensor = preprocess(&image, 224, 224).unwrap();
            assert_eq!(tensor.shape(), [1, 224, 224, 3]);
            assert_eq!(tensor.as_slice().map(|s| s.len()), Some(224 * 224 * 3));
        }
    }

    #[test]
    fn non_square_targets_are_stretched() {
        let image = decoded(DynamicImage::ImageRgb8(RgbImage::new(10, 10)));
        let tensor = preprocess(&image, 3, 5).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 5, 3]);
        assert_eq!(tensor.height(), 3);
        assert_eq!(tensor.width(), 5);
    }

    #[test]
    fn eight_bit_extremes_map_to_unit_interval() {
        let image = decoded(DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })));
        let tensor = preprocess(&image, 16, 16).unwrap();
        assert_in_unit_range(&tensor);
        let view = tensor.view();
        assert!(view[[0, 0, 0, 0]].abs() < 1e-3);
        assert!((view[[0, 0, 15, 2]] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn sixteen_bit_input_stays_in_range() {
        let image = decoded(DynamicImage::ImageRgb16(image::ImageBuffer::from_fn(
            9,
            7,
            |x, y| {
                if (x + y) % 2 == 0 {
                    Rgb([u16::MAX, 0, u16::MAX])
                } else {
                    Rgb([0, u16::MAX, 0])
                }
            },
        )));
        let tensor = preprocess(&image, 32, 20).unwrap();
        assert_eq!(tensor.shape(), [1, 32, 20, 3]);
        assert_in_unit_range(&tensor);
    }

    #[test]
    fn packs_rows_then_columns_then_channels() {
        // Distinct corners make any transposition visible.
        let image = decoded(DynamicImage::ImageRgb8(RgbImage::from_fn(2, 2, |x, y| {
            match (x, y) {
                (0, 0) => Rgb([255, 0, 0]),
                (1, 0) => Rgb([0, 255, 0]),
                (0, 1) => Rgb([0, 0, 255]),
                _ => Rgb([255, 255, 255]),
            }
        })));
        let tensor = preprocess(&image, 2, 2).unwrap();
        let flat = tensor.as_slice().unwrap();
        let expected = [
            1.0, 0.0, 0.0, // y0 x0
            0.0, 1.0, 0.0, // y0 x1
            0.0, 0.0, 1.0, // y1 x0
            1.0, 1.0, 1.0, // y1 x1
        ];
        for (got, want) in flat.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "got {got}, want {want}");
        }
    }

    #[test]
    fn color_is_premultiplied_by_alpha() {
        let transparent = decoded(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 0, 0, 0]),
        )));
        let tensor = preprocess(&transparent, 4, 4).unwrap();
        assert!(tensor.view().iter().all(|value| value.abs() < 1e-3));

        let half = decoded(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 255, 0, 128]),
        )));
        let tensor = preprocess(&half, 4, 4).unwrap();
        let view = tensor.view();
        let expected = 128.0 / 255.0;
        assert!((view[[0, 1, 1, 0]] - expected).abs() < 1e-3);
        assert!((view[[0, 1, 1, 1]] - expected).abs() < 1e-3);
        assert!(view[[0, 1, 1, 2]].abs() < 1e-3);

        let opaque = decoded(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 0, 0, 255]),
        )));
        let tensor = preprocess(&opaque, 4, 4).unwrap();
        assert!((tensor.view()[[0, 2, 3, 0]] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn zero_size_image_is_invalid() {
        let image = decoded(DynamicImage::new_rgb8(0, 0));
        assert!(matches!(
            preprocess(&image, 224, 224),
            Err(RecognizeError::InvalidImage(_))
        ));
    }

    #[test]
    fn zero_target_is_a_preprocess_error() {
        let image = decoded(DynamicImage::new_rgb8(4, 4));
        assert!(matches!(
            preprocess(&image, 0, 224),
            Err(RecognizeError::Preprocess(_))
        ));
    }

    #[test]
    fn from_array_rejects_wrong_layout() {
        let err = InputTensor::from_array(Array4::zeros((2, 4, 4, 3))).unwrap_err();
        assert!(matches!(err, RecognizeError::Preprocess(_)));
        let err = InputTensor::from_array(Array4::zeros((1, 4, 4, 4))).unwrap_err();
        assert!(matches!(err, RecognizeError::Preprocess(_)));
        assert!(InputTensor::from_array(Array4::zeros((1, 4, 4, 3))).is_ok());
    }
}

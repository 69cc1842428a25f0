use image::{DynamicImage, ImageReader};
use ndarray::Array4;
use std::io::Cursor;

use super::InferenceError;
use super::config::ModelConfig;

/// Decodes an image, detecting the format from its content. Stored uploads
/// carry no extension so the bytes are the only hint.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| InferenceError::Preprocessing(e.to_string()))?
        .decode()
        .map_err(|e| InferenceError::Preprocessing(e.to_string()))
}

/// Resizes to the model's input size and lays the pixels out as a normalized
/// NCHW batch of one.
pub fn to_input_tensor(
    image: &DynamicImage,
    config: &ModelConfig,
) -> Result<Array4<f32>, InferenceError> {
    let filter = config
        .filter_type()
        .map_err(|e| InferenceError::Preprocessing(e.to_string()))?;
    let (height, width) = (config.height(), config.width());
    let rgb = image.resize_exact(width, height, filter).to_rgb8();

    let mean = &config.normalization.mean;
    let std = &config.normalization.std;
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - mean[c]) / std[c];
        }
    }
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn config() -> ModelConfig {
        ModelConfig::from_yaml(
            "version: 1.0\nclasses: [a, b]\nimage:\n  size: [4, 6]\n  channels: 3\n\
             \x20 preprocessing:\n    resize_method: nearest\n\
             normalization:\n  mean: [0.0, 0.0, 0.5]\n  std: [1.0, 1.0, 0.5]\n",
        )
        .unwrap()
    }

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_without_extension_hint() {
        let img = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let decoded = decode_image(&png_bytes(&img)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = decode_image(b"just some text").unwrap_err();
        assert!(matches!(err, InferenceError::Preprocessing(_)));
    }

    #[test]
    fn tensor_shape_and_normalization() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 0, 255])));
        let tensor = to_input_tensor(&img, &config()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 4, 6]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 3, 5]].abs() < 1e-6);
        assert!((tensor[[0, 2, 2, 2]] - 1.0).abs() < 1e-6);
    }
}

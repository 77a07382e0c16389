use crate::error::PredictError;
use candle_core::{Device, Tensor};
use image::imageops::FilterType;
use std::path::Path;

pub const IMAGE_SIZE: usize = 224;

// ImageNet channel statistics; part of the checkpoint's training contract
// and must not change independently of the weights.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Deterministic transform from an image file to a `[1, 3, 224, 224]` input
/// tensor: decode, force 3-channel RGB, resize with bilinear filtering
/// (`FilterType::Triangle`, matching torchvision's `Resize` default the model
/// was trained with -- results are not filter-invariant), scale to [0, 1] and
/// normalize each channel with the ImageNet statistics.
pub fn preprocess(image_path: &Path) -> Result<Tensor, PredictError> {
    let reader = image::ImageReader::open(image_path)?.with_guessed_format()?;
    let img = reader.decode().map_err(|e| PredictError::ImageDecode {
        path: image_path.display().to_string(),
        source: e,
    })?;

    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(
        &rgb,
        IMAGE_SIZE as u32,
        IMAGE_SIZE as u32,
        FilterType::Triangle,
    );

    let mut data = vec![0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            data[channel * IMAGE_SIZE * IMAGE_SIZE + y as usize * IMAGE_SIZE + x as usize] =
                (value - MEAN[channel]) / STD[channel];
        }
    }

    let tensor = Tensor::from_vec(data, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &Device::Cpu)?;
    Ok(tensor)
}

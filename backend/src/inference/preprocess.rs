use image::{RgbImage, imageops};
use ndarray::Array4;

use super::config::{InputConfig, Normalization};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const CAFFE_BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Turns a decoded RGB image into the NHWC batch the classifier expects:
/// resized to the model's input size, batch of one, backbone-normalized.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input: InputConfig,
}

impl Preprocessor {
    pub fn new(input: InputConfig) -> Self {
        Self { input }
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.input.height as usize, self.input.width as usize, 3]
    }

    pub fn prepare(&self, image: &RgbImage) -> Array4<f32> {
        let resized = imageops::resize(
            image,
            self.input.width,
            self.input.height,
            self.input.resize_filter.into(),
        );

        let normalization = self.input.normalization;
        Array4::from_shape_fn(self.input_shape(), |(_, y, x, c)| {
            let pixel = resized.get_pixel(x as u32, y as u32);
            match normalization {
                Normalization::Caffe => normalize_caffe(pixel.0, c),
                _ => normalize(normalization, pixel.0[c], c),
            }
        })
    }
}

fn normalize(mode: Normalization, value: u8, channel: usize) -> f32 {
    let value = f32::from(value);
    match mode {
        Normalization::Tf => value / 127.5 - 1.0,
        Normalization::Torch => (value / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        Normalization::Caffe => value - CAFFE_BGR_MEAN[channel],
    }
}

/// Caffe-style models read BGR, so output channel `c` takes input channel `2 - c`.
fn normalize_caffe(rgb: [u8; 3], channel: usize) -> f32 {
    normalize(Normalization::Caffe, rgb[2 - channel], channel)
}

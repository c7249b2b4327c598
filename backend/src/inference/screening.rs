//! Coarse "does this look like a grayscale scan" check.
//!
//! MRI slices are stored as grayscale even when wrapped in an RGB container, so
//! their colour channels are nearly equal at every pixel. Natural photographs
//! are not. This is a heuristic: desaturated photos pass and colourised scans
//! can fail.

use image::RgbImage;

/// Mean absolute difference between each pair of colour channels, on the
/// 0-255 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSpread {
    pub red_green: f64,
    pub red_blue: f64,
    pub green_blue: f64,
}

impl ChannelSpread {
    pub fn measure(image: &RgbImage) -> Self {
        let pixel_count = u64::from(image.width()) * u64::from(image.height());
        if pixel_count == 0 {
            return Self {
                red_green: 0.0,
                red_blue: 0.0,
                green_blue: 0.0,
            };
        }

        let (mut rg, mut rb, mut gb) = (0u64, 0u64, 0u64);
        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            rg += u64::from(r.abs_diff(g));
            rb += u64::from(r.abs_diff(b));
            gb += u64::from(g.abs_diff(b));
        }

        let n = pixel_count as f64;
        Self {
            red_green: rg as f64 / n,
            red_blue: rb as f64 / n,
            green_blue: gb as f64 / n,
        }
    }

    pub fn max(&self) -> f64 {
        self.red_green.max(self.red_blue).max(self.green_blue)
    }

    /// True only when every pair is strictly below `threshold`.
    pub fn within(&self, threshold: f64) -> bool {
        self.red_green < threshold && self.red_blue < threshold && self.green_blue < threshold
    }
}

/// Verdict of the screen, with the measured spread for logging.
#[derive(Debug, Clone, Copy)]
pub struct Screening {
    pub admitted: bool,
    pub spread: ChannelSpread,
}

pub struct MriScreen {
    threshold: f64,
}

impl MriScreen {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn assess(&self, image: &RgbImage) -> Screening {
        let spread = ChannelSpread::measure(image);
        Screening {
            admitted: spread.within(self.threshold),
            spread,
        }
    }
}

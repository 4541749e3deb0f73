use std::sync::Arc;

use image::DynamicImage;

use crate::error::Error;
use crate::geom::ImageSize;
use crate::gpu::{GpuContext, Kernel};

use super::{KernelConfig, Processor};

/// Independent per-channel scale factors for the channel-scale kernel.
///
/// Factors are unclamped inputs; the kernel clamps the scaled result to
/// [0, 255] with round-to-nearest, so factors above 1 saturate and
/// negative factors clamp to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorDominance {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for ColorDominance {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
        }
    }
}

impl KernelConfig for ColorDominance {
    const KERNEL: Kernel = Kernel::ChannelScale;

    fn output_size(&self, input: ImageSize) -> ImageSize {
        input
    }

    fn params(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Recolors an image by scaling each channel independently.
pub type RecolorProcessor = Processor<ColorDominance>;

impl RecolorProcessor {
    /// Decodes the image once and seeds an identity dominance.
    pub fn new(image: &DynamicImage, gpu: Arc<GpuContext>) -> Result<Self, Error> {
        Self::from_parts(image, gpu, ColorDominance::default())
    }

    pub fn set_red(&self, value: f32) {
        self.update(|d| d.r = value);
    }

    pub fn set_green(&self, value: f32) {
        self.update(|d| d.g = value);
    }

    pub fn set_blue(&self, value: f32) {
        self.update(|d| d.b = value);
    }

    pub fn set_alpha(&self, value: f32) {
        self.update(|d| d.a = value);
    }

    /// Replaces all four factors as one atomic update.
    pub fn set_dominance(&self, dominance: ColorDominance) {
        self.update(|d| *d = dominance);
    }
}

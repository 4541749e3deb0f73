use std::sync::Arc;

use image::DynamicImage;

use crate::error::Error;
use crate::geom::{ImageSize, Point};
use crate::gpu::{GpuContext, Kernel};

use super::{KernelConfig, Processor};

/// Circular mask parameters: pixels outside the circle become fully
/// transparent.
///
/// `base_radius` is `min(width, height) / 2` recorded at construction so
/// that slider multipliers have a stable reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleMask {
    pub size: ImageSize,
    pub center: Point,
    pub radius: f32,
    base_radius: f32,
}

impl CircleMask {
    fn for_image(size: ImageSize) -> Self {
        let base_radius = size.width.min(size.height) as f32 / 2.0;
        Self {
            size,
            center: Point::new(size.width as f32 / 2.0, size.height as f32 / 2.0),
            radius: base_radius,
            base_radius,
        }
    }

    pub fn base_radius(&self) -> f32 {
        self.base_radius
    }
}

impl KernelConfig for CircleMask {
    const KERNEL: Kernel = Kernel::CircularMask;

    fn output_size(&self, _input: ImageSize) -> ImageSize {
        self.size
    }

    fn params(&self) -> [f32; 4] {
        [self.center.x, self.center.y, self.radius, 0.0]
    }
}

/// Crops an image to a circle, leaving the outside transparent.
pub type CircleProcessor = Processor<CircleMask>;

impl CircleProcessor {
    /// Decodes the image once; the default circle is centered with
    /// radius `min(width, height) / 2`.
    pub fn new(image: &DynamicImage, gpu: Arc<GpuContext>) -> Result<Self, Error> {
        let size = ImageSize::new(image.width(), image.height());
        Self::from_parts(image, gpu, CircleMask::for_image(size))
    }

    /// Sets the radius to `base_radius * multiplier`, the slider
    /// contract of the interactive controller.
    pub fn scale_radius(&self, multiplier: f32) {
        self.update(|c| c.radius = c.base_radius * multiplier);
    }

    pub fn set_radius(&self, radius: f32) {
        self.update(|c| c.radius = radius);
    }

    pub fn set_center(&self, center: Point) {
        self.update(|c| c.center = center);
    }
}

use std::sync::Arc;

use image::DynamicImage;
use tracing::warn;

use crate::error::Error;
use crate::geom::{ImageSize, Point};
use crate::gpu::{GpuContext, Kernel};

use super::{KernelConfig, Processor};

/// Crop rectangle in source pixel space plus the preview grid it feeds.
///
/// The region-extract kernel translates without scaling, so the
/// rectangle is expected to match the preview size; [`PreviewProcessor`]
/// warns when the two disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOfInterest {
    pub source: ImageSize,
    pub preview: ImageSize,
    pub top_left: Point,
    pub bottom_right: Point,
}

impl KernelConfig for RegionOfInterest {
    const KERNEL: Kernel = Kernel::RegionExtract;

    fn output_size(&self, _input: ImageSize) -> ImageSize {
        self.preview
    }

    fn params(&self) -> [f32; 4] {
        [self.top_left.x, self.top_left.y, 0.0, 0.0]
    }
}

/// Extracts a preview-sized rectangle from the source for a pan preview.
pub type PreviewProcessor = Processor<RegionOfInterest>;

impl PreviewProcessor {
    /// Decodes the image once; both corners start at zero.
    pub fn new(
        image: &DynamicImage,
        gpu: Arc<GpuContext>,
        preview: ImageSize,
    ) -> Result<Self, Error> {
        if preview.is_empty() {
            return Err(Error::DegenerateDimension);
        }
        let config = RegionOfInterest {
            source: ImageSize::new(image.width(), image.height()),
            preview,
            top_left: Point::default(),
            bottom_right: Point::default(),
        };
        Self::from_parts(image, gpu, config)
    }

    /// Moves the crop rectangle, updating both corners as one unit.
    pub fn set_region(&self, top_left: Point, bottom_right: Point) {
        let preview = self.config().preview;
        let rect_w = bottom_right.x - top_left.x;
        let rect_h = bottom_right.y - top_left.y;
        if (rect_w - preview.width as f32).abs() > 0.5
            || (rect_h - preview.height as f32).abs() > 0.5
        {
            // The kernel only translates; a mismatched rectangle is
            // rendered at the preview size anyway.
            warn!(
                rect_w,
                rect_h,
                preview_w = preview.width,
                preview_h = preview.height,
                "crop rectangle does not match the preview size"
            );
        }
        self.update(|roi| {
            roi.top_left = top_left;
            roi.bottom_right = bottom_right;
        });
    }

    /// Centers the preview-sized rectangle on a source-image point, the
    /// shape a pan gesture produces after coordinate mapping.
    pub fn set_region_centered(&self, center: Point) {
        let preview = self.config().preview;
        let half_w = preview.width as f32 / 2.0;
        let half_h = preview.height as f32 / 2.0;
        self.set_region(
            Point::new(center.x - half_w, center.y - half_h),
            Point::new(center.x + half_w, center.y + half_h),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gpu() -> Option<Arc<GpuContext>> {
        match GpuContext::shared() {
            Ok(ctx) => Some(ctx),
            Err(_) => {
                eprintln!("skipping: no compute adapter available");
                None
            }
        }
    }

    #[test]
    fn region_params_carry_the_top_left_corner() {
        let roi = RegionOfInterest {
            source: ImageSize::new(100, 100),
            preview: ImageSize::new(10, 10),
            top_left: Point::new(30.0, 40.0),
            bottom_right: Point::new(40.0, 50.0),
        };
        assert_eq!(roi.params(), [30.0, 40.0, 0.0, 0.0]);
        assert_eq!(roi.output_size(roi.source), ImageSize::new(10, 10));
    }

    #[test]
    fn zero_preview_dimensions_are_rejected_at_construction() {
        let Some(gpu) = gpu() else { return };
        let src = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        assert!(matches!(
            PreviewProcessor::new(&src, gpu, ImageSize::new(0, 8)),
            Err(Error::DegenerateDimension)
        ));
    }

    #[test]
    fn full_frame_region_reproduces_the_source() {
        let Some(gpu) = gpu() else { return };
        let mut img = RgbaImage::new(12, 9);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([x as u8 * 10, y as u8 * 20, 7, 255]);
        }
        let src = DynamicImage::ImageRgba8(img.clone());
        let processor =
            PreviewProcessor::new(&src, gpu, ImageSize::new(12, 9)).unwrap();
        processor.set_region(Point::new(0.0, 0.0), Point::new(12.0, 9.0));
        assert_eq!(processor.processed_image().unwrap().to_rgba8(), img);
    }

    #[test]
    fn centered_region_tracks_the_interaction_point() {
        let Some(gpu) = gpu() else { return };
        let mut img = RgbaImage::new(32, 32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([x as u8, y as u8, 0, 255]);
        }
        let src = DynamicImage::ImageRgba8(img);
        let processor =
            PreviewProcessor::new(&src, gpu, ImageSize::new(8, 8)).unwrap();
        processor.set_region_centered(Point::new(16.0, 16.0));

        let cfg = processor.config();
        assert_eq!(cfg.top_left, Point::new(12.0, 12.0));
        assert_eq!(cfg.bottom_right, Point::new(20.0, 20.0));

        let out = processor.processed_image().unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (8, 8));
        assert_eq!(out.get_pixel(0, 0).0, [12, 12, 0, 255]);
        assert_eq!(out.get_pixel(7, 7).0, [19, 19, 0, 255]);
    }
}

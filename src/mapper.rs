use crate::error::Error;
use crate::geom::{ImageSize, Point};

/// Policy for scaling a source image into a differently-proportioned
/// display area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Image fits entirely inside the view, preserving aspect ratio;
    /// the non-dominant axis is centered.
    AspectFit,
    /// Image covers the whole view, preserving aspect ratio; overflow
    /// is centered on the non-dominant axis.
    AspectFill,
    /// Independent per-axis scaling, no offsets.
    Stretch,
}

#[derive(Debug, Clone, Copy)]
struct FitTransform {
    scale_x: f32,
    scale_y: f32,
    offset_x: f32,
    offset_y: f32,
}

fn fit_transform(view: ImageSize, image: ImageSize, mode: ContentMode) -> FitTransform {
    let (vw, vh) = (view.width as f32, view.height as f32);
    let (iw, ih) = (image.width as f32, image.height as f32);
    match mode {
        ContentMode::AspectFit => {
            let scale = (vw / iw).min(vh / ih);
            FitTransform {
                scale_x: scale,
                scale_y: scale,
                offset_x: (vw - iw * scale) / 2.0,
                offset_y: (vh - ih * scale) / 2.0,
            }
        }
        ContentMode::AspectFill => {
            let scale = (vw / iw).max(vh / ih);
            FitTransform {
                scale_x: scale,
                scale_y: scale,
                offset_x: (vw - iw * scale) / 2.0,
                offset_y: (vh - ih * scale) / 2.0,
            }
        }
        ContentMode::Stretch => FitTransform {
            scale_x: vw / iw,
            scale_y: vh / ih,
            offset_x: 0.0,
            offset_y: 0.0,
        },
    }
}

/// Maps a point in display space back to source-image pixel space under
/// the given content-fit policy.
///
/// The inverse mapping is `(view - offset) / scale` per axis, clamped
/// into `[0, width] x [0, height]` so out-of-bounds interaction points
/// land on the nearest image edge. Zero view or image dimensions are an
/// error, never a silent divide.
pub fn map_view_to_image(
    point: Point,
    view: ImageSize,
    image: ImageSize,
    mode: ContentMode,
) -> Result<Point, Error> {
    if view.is_empty() || image.is_empty() {
        return Err(Error::DegenerateDimension);
    }
    let t = fit_transform(view, image, mode);
    let x = (point.x - t.offset_x) / t.scale_x;
    let y = (point.y - t.offset_y) / t.scale_y;
    Ok(Point::new(
        x.clamp(0.0, image.width as f32),
        y.clamp(0.0, image.height as f32),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(px: f32, py: f32, view: (u32, u32), image: (u32, u32), mode: ContentMode) -> Point {
        map_view_to_image(
            Point::new(px, py),
            ImageSize::new(view.0, view.1),
            ImageSize::new(image.0, image.1),
            mode,
        )
        .unwrap()
    }

    #[test]
    fn aspect_fit_letterboxes_the_wide_view() {
        // view 200x100, image 100x100: scale 1.0, offset_x 50, offset_y 0.
        let t = fit_transform(
            ImageSize::new(200, 100),
            ImageSize::new(100, 100),
            ContentMode::AspectFit,
        );
        assert_eq!(t.scale_x, 1.0);
        assert_eq!(t.offset_x, 50.0);
        assert_eq!(t.offset_y, 0.0);

        let p = map(100.0, 50.0, (200, 100), (100, 100), ContentMode::AspectFit);
        assert_eq!(p, Point::new(50.0, 50.0));
    }

    #[test]
    fn aspect_fit_maps_view_center_to_image_center() {
        for (vw, vh, iw, ih) in [
            (200, 100, 100, 100),
            (100, 200, 300, 40),
            (1920, 1080, 640, 480),
            (37, 91, 13, 240),
        ] {
            let p = map(
                vw as f32 / 2.0,
                vh as f32 / 2.0,
                (vw, vh),
                (iw, ih),
                ContentMode::AspectFit,
            );
            assert!((p.x - iw as f32 / 2.0).abs() < 1e-3, "{vw}x{vh} -> {p:?}");
            assert!((p.y - ih as f32 / 2.0).abs() < 1e-3, "{vw}x{vh} -> {p:?}");
        }
    }

    #[test]
    fn aspect_fill_centers_the_overflowing_axis() {
        // view 100x100, image 200x100: scale 1.0, image overflows
        // horizontally by 100, so view x=0 is image x=50.
        let p = map(0.0, 0.0, (100, 100), (200, 100), ContentMode::AspectFill);
        assert_eq!(p, Point::new(50.0, 0.0));
    }

    #[test]
    fn stretch_scales_each_axis_independently() {
        let p = map(50.0, 100.0, (100, 200), (400, 100), ContentMode::Stretch);
        assert_eq!(p, Point::new(200.0, 50.0));
    }

    #[test]
    fn out_of_bounds_points_clamp_to_the_image_edges() {
        let p = map(-40.0, 500.0, (200, 100), (100, 100), ContentMode::AspectFit);
        assert_eq!(p, Point::new(0.0, 100.0));

        let p = map(1e6, -1e6, (200, 100), (100, 100), ContentMode::Stretch);
        assert_eq!(p, Point::new(100.0, 0.0));
    }

    #[test]
    fn degenerate_dimensions_are_rejected() {
        for (view, image) in [((0, 100), (10, 10)), ((100, 100), (10, 0))] {
            let err = map_view_to_image(
                Point::new(1.0, 1.0),
                ImageSize::new(view.0, view.1),
                ImageSize::new(image.0, image.1),
                ContentMode::AspectFit,
            )
            .unwrap_err();
            assert!(matches!(err, Error::DegenerateDimension));
        }
    }
}

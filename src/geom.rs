/// Pixel dimensions of an image or texture. Both axes are positive for
/// every size the engine accepts; zero-sized inputs are rejected at the
/// boundary rather than propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Byte length of an RGBA8 buffer holding this many pixels.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A point in some 2D pixel space (source image or display view,
/// depending on context).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_len_is_four_bytes_per_pixel() {
        assert_eq!(ImageSize::new(4, 4).byte_len(), 64);
        assert_eq!(ImageSize::new(100, 1).byte_len(), 400);
        assert_eq!(ImageSize::new(0, 7).byte_len(), 0);
    }

    #[test]
    fn empty_sizes_are_detected_on_either_axis() {
        assert!(ImageSize::new(0, 10).is_empty());
        assert!(ImageSize::new(10, 0).is_empty());
        assert!(!ImageSize::new(1, 1).is_empty());
    }
}

use image::{DynamicImage, RgbaImage};

use crate::error::Error;
use crate::geom::ImageSize;

/// Raw interleaved RGBA8 pixel data, row-major with a top-left origin and
/// premultiplied alpha. Immutable after creation; each processor owns
/// exactly one for its lifetime.
///
/// Invariant: `data.len() == width * height * 4`, no row padding.
pub struct PixelBuffer {
    data: Vec<u8>,
    size: ImageSize,
}

impl PixelBuffer {
    /// Decodes a displayable image into a premultiplied RGBA8 buffer.
    ///
    /// The `image` crate stores straight (unassociated) alpha, so each
    /// color channel is scaled by alpha here, matching the layout the
    /// kernels expect.
    pub fn from_image(image: &DynamicImage) -> Result<Self, Error> {
        let size = ImageSize::new(image.width(), image.height());
        if size.is_empty() {
            return Err(Error::ImageDecode);
        }
        let mut data = image.to_rgba8().into_raw();
        premultiply(&mut data);
        Ok(Self { data, size })
    }

    /// Wraps raw premultiplied RGBA8 bytes, validating the length
    /// invariant.
    pub fn from_raw(data: Vec<u8>, size: ImageSize) -> Result<Self, Error> {
        if data.len() != size.byte_len() {
            return Err(Error::BufferSizeMismatch {
                expected: size.byte_len(),
                actual: data.len(),
            });
        }
        Ok(Self { data, size })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// CPU-only reconstruction of a displayable image from this buffer.
    pub fn to_image(&self) -> Result<DynamicImage, Error> {
        encode(&self.data, self.size)
    }
}

/// Builds a displayable image from raw premultiplied RGBA8 bytes.
///
/// Fails when the byte length does not match `size`. Alpha is divided
/// back out because `RgbaImage` stores straight alpha; fully opaque
/// buffers round-trip unchanged.
pub fn encode(data: &[u8], size: ImageSize) -> Result<DynamicImage, Error> {
    if data.len() != size.byte_len() {
        return Err(Error::BufferSizeMismatch {
            expected: size.byte_len(),
            actual: data.len(),
        });
    }
    let mut bytes = data.to_vec();
    unpremultiply(&mut bytes);
    let rgba = RgbaImage::from_raw(size.width, size.height, bytes).ok_or(
        Error::BufferSizeMismatch {
            expected: size.byte_len(),
            actual: data.len(),
        },
    )?;
    Ok(DynamicImage::ImageRgba8(rgba))
}

fn premultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
}

fn unpremultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 255 || a == 0 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(px)))
    }

    #[test]
    fn decode_yields_four_bytes_per_pixel() {
        for (w, h) in [(1, 1), (4, 4), (7, 3), (100, 100)] {
            let buf = PixelBuffer::from_image(&solid(w, h, [10, 20, 30, 255])).unwrap();
            assert_eq!(buf.data().len(), (w * h * 4) as usize);
            assert_eq!(buf.size(), ImageSize::new(w, h));
        }
    }

    #[test]
    fn decode_rejects_images_without_pixel_data() {
        let empty = DynamicImage::new_rgba8(0, 0);
        assert!(matches!(
            PixelBuffer::from_image(&empty),
            Err(Error::ImageDecode)
        ));
    }

    #[test]
    fn opaque_images_round_trip_unchanged() {
        let src = solid(5, 3, [200, 100, 50, 255]);
        let buf = PixelBuffer::from_image(&src).unwrap();
        assert_eq!(buf.to_image().unwrap().to_rgba8(), src.to_rgba8());
    }

    #[test]
    fn decode_premultiplies_color_channels_by_alpha() {
        let buf = PixelBuffer::from_image(&solid(1, 1, [255, 128, 0, 128])).unwrap();
        // 255 * 128/255 = 128, 128 * 128/255 rounds to 64.
        assert_eq!(buf.data(), &[128, 64, 0, 128]);
    }

    #[test]
    fn encode_rejects_mismatched_lengths() {
        let err = encode(&[0_u8; 12], ImageSize::new(2, 2)).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferSizeMismatch {
                expected: 16,
                actual: 12
            }
        ));
    }

    #[test]
    fn from_raw_enforces_the_length_invariant() {
        assert!(PixelBuffer::from_raw(vec![0; 16], ImageSize::new(2, 2)).is_ok());
        assert!(PixelBuffer::from_raw(vec![0; 15], ImageSize::new(2, 2)).is_err());
    }
}

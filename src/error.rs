use thiserror::Error;

/// Failure taxonomy for the processing engine.
///
/// All failures surface as `Result` values to the immediate caller; a
/// failed processing call leaves the pixel buffer and configuration
/// untouched, so the caller may retry after addressing the cause.
#[derive(Debug, Error)]
pub enum Error {
    /// The source image exposes no backing pixel data. Permanent for the
    /// processor whose construction hit it.
    #[error("image exposes no backing pixel data")]
    ImageDecode,

    /// Device acquisition or kernel compilation failed at context
    /// initialization. Permanent for the shared context; there is no
    /// software fallback.
    #[error("no compute-capable GPU device is available")]
    GpuUnavailable,

    /// Requested texture dimensions are zero or exceed the device limit.
    #[error("cannot allocate a {width}x{height} texture")]
    TextureAllocation { width: u32, height: u32 },

    /// Command submission or readback failed for a single request.
    #[error("kernel dispatch failed: {0}")]
    KernelDispatch(String),

    /// A raw buffer's length disagrees with its declared dimensions.
    #[error("buffer is {actual} bytes but {expected} are required")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// A view or image dimension of zero was passed to the coordinate
    /// mapper; there is no silent divide.
    #[error("view and image dimensions must be positive")]
    DegenerateDimension,
}

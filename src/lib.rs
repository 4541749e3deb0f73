//! GPU per-pixel transformations for an interactive image viewer.
//!
//! An interactive controller constructs a processor from a decoded image,
//! mutates its configuration in response to input, and pulls the
//! re-rendered image after each synchronous change notification. Three
//! compute kernels cover the supported transformations: per-channel
//! recoloring, circular masking, and rectangular region extraction for a
//! pan preview. A separate coordinate mapper translates display-space
//! interaction points back into source-image pixel space under the usual
//! content-fit policies.

pub mod buffer;
pub mod config;
pub mod error;
pub mod geom;
pub mod gpu;
pub mod mapper;
pub mod processor;

pub use buffer::PixelBuffer;
pub use config::GpuSettings;
pub use error::Error;
pub use geom::{ImageSize, Point};
pub use gpu::{GpuContext, Kernel};
pub use mapper::{ContentMode, map_view_to_image};
pub use processor::{
    ChangeListener, CircleMask, CircleProcessor, ColorDominance, PreviewProcessor,
    RecolorProcessor, RegionOfInterest,
};

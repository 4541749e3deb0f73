mod circle;
mod preview;
mod recolor;

pub use circle::{CircleMask, CircleProcessor};
pub use preview::{PreviewProcessor, RegionOfInterest};
pub use recolor::{ColorDominance, RecolorProcessor};

use std::sync::{Arc, Mutex, Weak};

use image::DynamicImage;
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::error::Error;
use crate::geom::ImageSize;
use crate::gpu::{GpuContext, Kernel};

/// Receives a synchronous callback after every configuration update.
///
/// The processor holds the listener by `Weak` reference: registering
/// never keeps the listener alive, and the listener is never required to
/// keep the processor alive.
pub trait ChangeListener: Send + Sync {
    fn configuration_updated(&self);
}

/// Binds a configuration type to its kernel: which pipeline to run, the
/// output dimensions, and the four-slot parameter blob.
pub trait KernelConfig {
    const KERNEL: Kernel;
    fn output_size(&self, input: ImageSize) -> ImageSize;
    fn params(&self) -> [f32; 4];
}

/// Common core of the three processor variants.
///
/// Owns one immutable decoded pixel buffer, one mutable configuration,
/// and a single-slot non-owning listener. The configuration sits behind
/// a mutex so an update and a concurrent [`processed_image`] call can
/// never observe a half-written struct; the buffer is read-only after
/// construction and safe to read from any thread.
///
/// [`processed_image`]: Processor::processed_image
pub struct Processor<C> {
    buffer: PixelBuffer,
    gpu: Arc<GpuContext>,
    config: Mutex<C>,
    listener: Mutex<Option<Weak<dyn ChangeListener>>>,
}

impl<C: KernelConfig + Clone> Processor<C> {
    pub(crate) fn from_parts(
        image: &DynamicImage,
        gpu: Arc<GpuContext>,
        config: C,
    ) -> Result<Self, Error> {
        let buffer = PixelBuffer::from_image(image)?;
        Ok(Self {
            buffer,
            gpu,
            config: Mutex::new(config),
            listener: Mutex::new(None),
        })
    }

    /// Stores the single notification slot, replacing any previous
    /// registration. The reference is non-owning; a listener that has
    /// been dropped is skipped silently.
    pub fn register<L: ChangeListener + 'static>(&self, listener: &Arc<L>) {
        *self.listener.lock().unwrap() =
            Some(Arc::downgrade(listener) as Weak<dyn ChangeListener>);
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> C {
        self.config.lock().unwrap().clone()
    }

    pub fn source_size(&self) -> ImageSize {
        self.buffer.size()
    }

    /// Mutates the configuration as one atomic unit, then notifies the
    /// listener exactly once. The lock is released before the callback
    /// so the listener may call [`Processor::processed_image`] directly.
    pub(crate) fn update(&self, mutate: impl FnOnce(&mut C)) {
        {
            let mut config = self.config.lock().unwrap();
            mutate(&mut config);
        }
        debug!("configuration updated");
        self.notify();
    }

    fn notify(&self) {
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener.and_then(|weak| weak.upgrade()) {
            listener.configuration_updated();
        }
    }

    /// Re-runs the full kernel pass against the original buffer and the
    /// current configuration snapshot.
    ///
    /// No caching: every call recomputes even when the configuration is
    /// unchanged. That keeps results trivially consistent at the cost of
    /// redundant dispatches; memoizing on a configuration fingerprint is
    /// the obvious refinement if profiling ever demands it.
    pub fn processed_image(&self) -> Result<DynamicImage, Error> {
        let config = self.config();
        let output_size = config.output_size(self.buffer.size());
        self.gpu.run(C::KERNEL, &self.buffer, output_size, config.params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        calls: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChangeListener for CountingListener {
        fn configuration_updated(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gpu() -> Option<Arc<GpuContext>> {
        match GpuContext::shared() {
            Ok(ctx) => Some(ctx),
            Err(_) => {
                eprintln!("skipping: no compute adapter available");
                None
            }
        }
    }

    fn white_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 255, 255, 255]),
        ))
    }

    #[test]
    fn each_update_notifies_exactly_once() {
        let Some(gpu) = gpu() else { return };
        let processor = RecolorProcessor::new(&white_image(4, 4), gpu).unwrap();
        let listener = CountingListener::new();
        processor.register(&listener);

        processor.set_red(0.5);
        assert_eq!(listener.count(), 1);
        processor.set_dominance(ColorDominance::default());
        assert_eq!(listener.count(), 2);
    }

    #[test]
    fn last_registration_wins() {
        let Some(gpu) = gpu() else { return };
        let processor = RecolorProcessor::new(&white_image(4, 4), gpu).unwrap();
        let first = CountingListener::new();
        let second = CountingListener::new();
        processor.register(&first);
        processor.register(&second);

        processor.set_green(0.25);
        assert_eq!(first.count(), 0);
        assert_eq!(second.count(), 1);
    }

    #[test]
    fn dropped_listeners_are_skipped() {
        let Some(gpu) = gpu() else { return };
        let processor = RecolorProcessor::new(&white_image(4, 4), gpu).unwrap();
        let listener = CountingListener::new();
        processor.register(&listener);
        drop(listener);

        // Must not panic or resurrect the listener.
        processor.set_blue(0.75);
    }

    #[test]
    fn repeat_calls_without_updates_are_pixel_identical() {
        let Some(gpu) = gpu() else { return };
        let processor = RecolorProcessor::new(&white_image(16, 16), gpu).unwrap();
        processor.set_dominance(ColorDominance {
            r: 0.3,
            g: 0.7,
            b: 0.9,
            a: 1.0,
        });

        let first = processor.processed_image().unwrap().to_rgba8();
        let second = processor.processed_image().unwrap().to_rgba8();
        assert_eq!(first, second);
    }

    #[test]
    fn construction_fails_for_images_without_pixels() {
        let Some(gpu) = gpu() else { return };
        let empty = DynamicImage::new_rgba8(0, 0);
        assert!(matches!(
            RecolorProcessor::new(&empty, gpu),
            Err(Error::ImageDecode)
        ));
    }

    #[test]
    fn processing_leaves_the_configuration_untouched() {
        let Some(gpu) = gpu() else { return };
        let processor = RecolorProcessor::new(&white_image(8, 8), gpu).unwrap();
        processor.set_red(0.5);
        let before = processor.config();
        let _ = processor.processed_image();
        assert_eq!(processor.config(), before);
    }
}

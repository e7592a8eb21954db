//! Colorization adapter boundary.
//!
//! The model is an opaque capability: it is configured with the per-job
//! settings and a decoded source image, then asked for the colorized image.
//! Implementations hold exclusive model state and are not assumed to be
//! thread-safe; callers serialize access.

mod external;

pub use external::ExternalColorizer;

use anyhow::Result;
use image::DynamicImage;

use crate::config::ColorizeConfig;

pub trait Colorizer: Send {
    /// Load the source image and the settings for the next `colorize` call.
    fn set_image(&mut self, image: DynamicImage, config: &ColorizeConfig) -> Result<()>;

    /// Colorize the loaded image.
    fn colorize(&mut self) -> Result<DynamicImage>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use anyhow::anyhow;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts `colorize` calls and returns the loaded image inverted.
    pub struct FakeColorizer {
        pub calls: Arc<AtomicUsize>,
        loaded: Option<DynamicImage>,
        delay: Duration,
        panic_on_first: bool,
    }

    impl FakeColorizer {
        pub fn new() -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: calls.clone(),
                    loaded: None,
                    delay: Duration::ZERO,
                    panic_on_first: false,
                },
                calls,
            )
        }

        /// Every `colorize` call takes at least `delay`.
        pub fn slow(delay: Duration) -> (Self, Arc<AtomicUsize>) {
            let (fake, calls) = Self::new();
            (Self { delay, ..fake }, calls)
        }

        /// The first `colorize` call panics; later calls behave normally.
        pub fn panicking_once() -> (Self, Arc<AtomicUsize>) {
            let (fake, calls) = Self::new();
            (
                Self {
                    panic_on_first: true,
                    ..fake
                },
                calls,
            )
        }
    }

    impl Colorizer for FakeColorizer {
        fn set_image(&mut self, image: DynamicImage, _config: &ColorizeConfig) -> Result<()> {
            self.loaded = Some(image);
            Ok(())
        }

        fn colorize(&mut self) -> Result<DynamicImage> {
            let previous = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_first && previous == 0 {
                panic!("model crashed");
            }
            std::thread::sleep(self.delay);
            let mut image = self
                .loaded
                .take()
                .ok_or_else(|| anyhow!("no image loaded"))?;
            image.invert();
            Ok(image)
        }
    }

    pub fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * 30) as u8, (y * 30) as u8, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode test image");
        bytes
    }

    pub fn write_png(path: &Path) {
        std::fs::write(path, png_bytes()).expect("write test image");
    }
}

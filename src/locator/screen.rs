use anyhow::{Context, Result, anyhow};
use enigo::Mouse as _;
use enigo::{Enigo, Settings as EnigoSettings};
use image::GrayImage;
use std::path::Path;
use tracing::{debug, trace};

/// Something that can produce full-screen captures.
pub trait ScreenSource {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Capture the whole screen as grayscale, in physical pixels.
    fn capture(&mut self) -> Result<GrayImage>;

    /// Width of the screen in pointer (logical) coordinates.
    fn logical_width(&mut self) -> Result<u32>;
}

/// Primary monitor captured through `xcap`. The logical width comes from
/// Enigo's view of the main display, i.e. the space pointer clicks are issued in.
pub struct XcapScreen {
    monitor: xcap::Monitor,
}

impl XcapScreen {
    /// Select the primary monitor, falling back to the first one reported.
    pub fn primary() -> Result<Self> {
        let monitors = xcap::Monitor::all().context("Failed to enumerate monitors")?;
        let mut fallback = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                debug!(target: "atlas::locator", "Using primary monitor for capture");
                return Ok(Self { monitor });
            }
            if fallback.is_none() {
                fallback = Some(monitor);
            }
        }
        fallback
            .map(|monitor| Self { monitor })
            .ok_or_else(|| anyhow!("No monitors available for screen capture"))
    }
}

impl ScreenSource for XcapScreen {
    fn name(&self) -> &'static str {
        "xcap"
    }

    fn capture(&mut self) -> Result<GrayImage> {
        let rgba = self
            .monitor
            .capture_image()
            .context("Failed to capture primary monitor")?;
        trace!(
            target: "atlas::locator",
            width = rgba.width(), height = rgba.height(),
            "Captured screen"
        );
        Ok(image::imageops::grayscale(&rgba))
    }

    fn logical_width(&mut self) -> Result<u32> {
        let enigo =
            Enigo::new(&EnigoSettings::default()).context("Failed to initialize Enigo")?;
        let (width, _height) = enigo
            .main_display()
            .context("Failed to query main display size")?;
        u32::try_from(width).context("Main display reported a negative width")
    }
}

/// A fixed capture, e.g. a saved screenshot. Always returns the same image.
#[derive(Debug, Clone)]
pub struct StaticScreen {
    image: GrayImage,
    logical_width: u32,
}

impl StaticScreen {
    pub fn new(image: GrayImage, logical_width: u32) -> Self {
        Self {
            image,
            logical_width,
        }
    }

    /// Same density as the capture (ratio 1.0).
    pub fn unscaled(image: GrayImage) -> Self {
        let width = image.width();
        Self::new(image, width)
    }

    /// Load a screenshot from disk. `logical_width` defaults to the image width.
    pub fn from_file<P: AsRef<Path>>(path: P, logical_width: Option<u32>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("Failed to open screenshot {}", path.display()))?
            .to_luma8();
        let width = logical_width.unwrap_or(image.width());
        Ok(Self::new(image, width))
    }
}

impl ScreenSource for StaticScreen {
    fn name(&self) -> &'static str {
        "static"
    }

    fn capture(&mut self) -> Result<GrayImage> {
        Ok(self.image.clone())
    }

    fn logical_width(&mut self) -> Result<u32> {
        Ok(self.logical_width)
    }
}

/*!
On-screen element locator.

Finds a previously captured reference image inside live screen captures:
- `screen`: capture sources (`XcapScreen` for the real desktop, `StaticScreen` for saved shots)
- `matcher`: grayscale normalized cross-correlation
- `cache`: bounded recency cache of decoded references, owned by each `Locator`
- `templates`: resolution of script template names to image files

Captures are in physical pixels; pointer clicks are in logical coordinates. The
density ratio between the two is measured once, when the `Locator` is built, and
every returned coordinate is divided by it.
*/

pub mod cache;
pub mod matcher;
pub mod screen;
pub mod templates;

use image::GrayImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::LocatorSettings;
use crate::error::LocatorError;

pub use cache::ImageCache;
pub use matcher::{BestMatch, Matcher, best_match};
pub use screen::{ScreenSource, StaticScreen, XcapScreen};
pub use templates::TemplateLibrary;

/// A point in logical (pointer) coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A rectangle in logical (pointer) coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Outcome of one `locate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatorMatch {
    pub found: bool,
    /// Score of the returned placement when found, otherwise the best score observed.
    pub confidence: f32,
    pub center: Point,
    pub bounding_box: Rect,
    pub reference_path: PathBuf,
    /// Number of captures that were taken (successfully or not).
    pub attempts: u32,
}

/// Template-matching element locator with timeout-bounded retry.
pub struct Locator {
    screen: Box<dyn ScreenSource>,
    cache: ImageCache,
    density: f64,
    retry_interval: Duration,
}

impl Locator {
    /// Build a locator over `screen`, measuring the display density ratio once.
    pub fn new(
        mut screen: Box<dyn ScreenSource>,
        settings: &LocatorSettings,
    ) -> Result<Self, LocatorError> {
        let density = measure_density(screen.as_mut())?;
        if (density - 1.0).abs() > f64::EPSILON {
            info!(target: "atlas::locator", density, "High-density display detected");
        }
        Ok(Self {
            screen,
            cache: ImageCache::new(settings.cache_capacity),
            density,
            retry_interval: settings.retry_interval(),
        })
    }

    /// Physical capture pixels per logical pointer unit.
    pub fn density_ratio(&self) -> f64 {
        self.density
    }

    pub fn cached_references(&self) -> usize {
        self.cache.len()
    }

    /// Search for `reference` on screen until a placement scores at least `threshold`
    /// or `timeout` elapses. A zero timeout makes exactly one attempt; a timeout too
    /// large to represent as a deadline never expires.
    ///
    /// Missing or undecodable reference images fail immediately. A timeout is not an
    /// error: it returns `found = false` with the best observed confidence.
    pub fn locate(
        &mut self,
        reference: &Path,
        threshold: f32,
        timeout: Duration,
    ) -> Result<LocatorMatch, LocatorError> {
        let template = self.load_reference(reference)?;
        let mut matcher = Matcher::new(&template);
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let mut best_score = 0.0_f32;
        let mut attempts = 0_u32;

        debug!(
            target: "atlas::locator",
            reference = %reference.display(), threshold, timeout_ms = timeout.as_millis() as u64,
            "Locating reference"
        );

        loop {
            attempts += 1;
            match self.screen.capture() {
                Ok(capture) => match matcher.best_match(&capture) {
                    Some(hit) => {
                        best_score = best_score.max(hit.score);
                        trace!(
                            target: "atlas::locator",
                            attempts, score = hit.score,
                            "Capture scored"
                        );
                        if hit.score >= threshold {
                            let found = self.to_match(reference, &template, hit, attempts);
                            debug!(
                                target: "atlas::locator",
                                confidence = found.confidence,
                                x = found.center.x, y = found.center.y,
                                attempts,
                                "Reference found"
                            );
                            return Ok(found);
                        }
                    }
                    None => trace!(
                        target: "atlas::locator",
                        "Reference is larger than the capture"
                    ),
                },
                Err(err) => warn!(
                    target: "atlas::locator",
                    error = %err, attempts,
                    "Screen capture failed; retrying"
                ),
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => break,
                Some(deadline) => self.retry_interval.min(deadline - now),
                None => self.retry_interval,
            };
            thread::sleep(pause);
        }

        debug!(
            target: "atlas::locator",
            reference = %reference.display(), best_score, attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reference not found before timeout"
        );
        Ok(LocatorMatch {
            found: false,
            confidence: best_score,
            center: Point::default(),
            bounding_box: Rect::default(),
            reference_path: reference.to_path_buf(),
            attempts,
        })
    }

    fn load_reference(&mut self, path: &Path) -> Result<Arc<GrayImage>, LocatorError> {
        if let Some(image) = self.cache.get(path) {
            return Ok(image);
        }
        if !path.is_file() {
            return Err(LocatorError::MissingReference {
                path: path.to_path_buf(),
            });
        }
        let decoded = image::open(path)
            .map_err(|source| LocatorError::UndecodableReference {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();
        trace!(
            target: "atlas::locator",
            path = %path.display(), width = decoded.width(), height = decoded.height(),
            "Decoded reference"
        );
        let image = Arc::new(decoded);
        self.cache.insert(path.to_path_buf(), Arc::clone(&image));
        Ok(image)
    }

    fn to_match(
        &self,
        reference: &Path,
        template: &GrayImage,
        hit: BestMatch,
        attempts: u32,
    ) -> LocatorMatch {
        let (w, h) = template.dimensions();
        let center_x = hit.x + w / 2;
        let center_y = hit.y + h / 2;
        let logical = |v: u32| (f64::from(v) / self.density).round() as i32;
        LocatorMatch {
            found: true,
            confidence: hit.score,
            center: Point {
                x: logical(center_x),
                y: logical(center_y),
            },
            bounding_box: Rect {
                x: logical(hit.x),
                y: logical(hit.y),
                width: logical(w),
                height: logical(h),
            },
            reference_path: reference.to_path_buf(),
            attempts,
        }
    }
}

/// Capture width ÷ logical width; 1.0 when the logical width is unusable.
fn measure_density(screen: &mut dyn ScreenSource) -> Result<f64, LocatorError> {
    let capture = screen
        .capture()
        .map_err(|e| LocatorError::ScreenUnavailable(format!("{}: {e:#}", screen.name())))?;
    let logical = screen
        .logical_width()
        .map_err(|e| LocatorError::ScreenUnavailable(format!("{}: {e:#}", screen.name())))?;
    if logical == 0 || capture.width() == 0 {
        warn!(
            target: "atlas::locator",
            logical, physical = capture.width(),
            "Unusable display size; assuming density 1.0"
        );
        return Ok(1.0);
    }
    Ok(f64::from(capture.width()) / f64::from(logical))
}

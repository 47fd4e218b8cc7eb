//! Hybrid empty-PDF detection
//!
//! Classifies one file with two independent signals: raw byte size
//! against a threshold, and content-pixel density inside a region of
//! interest on the rendered first page. Both signals firing outranks
//! either alone.

use std::path::Path;

use image::{Rgb, RgbImage};

use crate::area::{compute_area, DetectionArea};
use crate::rasterizer::{PageRasterizer, RasterError, Rendered};
use crate::record::{DetectionResult, FileRecord};
use crate::util::extract_task_id;

/// Channel floor above which a sample counts as near-white background
const NEAR_WHITE_MIN: u8 = 240;

/// Resolution used for the analysis render; detail is irrelevant here,
/// only coverage, so the lowest common density keeps renders cheap.
pub const ANALYSIS_DPI: u32 = 72;

/// Detection thresholds and toggles
#[derive(Debug, Clone)]
pub struct DetectorOptions {
    /// Files at or below this size are suspicious by size (KB)
    pub size_threshold_kb: u64,
    /// Densities below this percentage are suspicious by pixels
    pub density_threshold_pct: f64,
    /// Region-of-interest width as a percentage of the page width
    pub area_width_pct: f64,
    /// Region-of-interest height as a percentage of the page height
    pub area_height_pct: f64,
    /// Horizontal shift of the region center (-100..100)
    pub horizontal_offset_pct: f64,
    /// Enable the size signal
    pub size_detection: bool,
    /// Enable the pixel-density signal
    pub image_detection: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            size_threshold_kb: 10,
            density_threshold_pct: 10.0,
            area_width_pct: 22.2,
            area_height_pct: 33.3,
            horizontal_offset_pct: 0.0,
            size_detection: true,
            image_detection: true,
        }
    }
}

impl DetectorOptions {
    /// Create a new options builder
    pub fn builder() -> DetectorOptionsBuilder {
        DetectorOptionsBuilder::default()
    }
}

/// Builder for [`DetectorOptions`]
#[derive(Debug, Default)]
pub struct DetectorOptionsBuilder {
    options: DetectorOptions,
}

impl DetectorOptionsBuilder {
    /// Set the size threshold in KB
    pub fn size_threshold_kb(mut self, kb: u64) -> Self {
        self.options.size_threshold_kb = kb;
        self
    }

    /// Set the density threshold percentage
    pub fn density_threshold_pct(mut self, pct: f64) -> Self {
        self.options.density_threshold_pct = pct;
        self
    }

    /// Set the region width percentage
    pub fn area_width_pct(mut self, pct: f64) -> Self {
        self.options.area_width_pct = pct;
        self
    }

    /// Set the region height percentage
    pub fn area_height_pct(mut self, pct: f64) -> Self {
        self.options.area_height_pct = pct;
        self
    }

    /// Set the horizontal offset percentage
    pub fn horizontal_offset_pct(mut self, pct: f64) -> Self {
        self.options.horizontal_offset_pct = pct;
        self
    }

    /// Enable or disable the size signal
    pub fn size_detection(mut self, enabled: bool) -> Self {
        self.options.size_detection = enabled;
        self
    }

    /// Enable or disable the pixel-density signal
    pub fn image_detection(mut self, enabled: bool) -> Self {
        self.options.image_detection = enabled;
        self
    }

    /// Build the options
    pub fn build(self) -> DetectorOptions {
        self.options
    }
}

/// Outcome of the pixel-analysis stage
enum PixelSignal {
    Suspicious,
    Clear,
    Failed(String),
}

/// Classifies files by size and rendered-page pixel density
pub struct HybridDetector<R: PageRasterizer> {
    options: DetectorOptions,
    rasterizer: R,
}

impl<R: PageRasterizer> HybridDetector<R> {
    pub fn new(options: DetectorOptions, rasterizer: R) -> Self {
        Self {
            options,
            rasterizer,
        }
    }

    /// Classify one file, updating its detection result, task id, and
    /// error message in place.
    ///
    /// Never returns an error: every failure resolves to
    /// [`DetectionResult::Failed`] with a message on the record.
    pub fn detect(&self, record: &mut FileRecord) -> DetectionResult {
        tracing::debug!(file = %record.file_name, "starting detection");

        record.task_id = extract_task_id(&record.path);

        if !record.path.exists() {
            tracing::warn!(file = %record.file_name, "file not found");
            record.error_message = Some("file not found".to_string());
            record.detection = DetectionResult::Failed;
            return record.detection;
        }

        let by_size = self.options.size_detection
            && record.size_bytes <= self.options.size_threshold_kb * 1024;

        let by_pixels = if self.options.image_detection {
            match self.pixel_signal(&record.path) {
                PixelSignal::Suspicious => true,
                PixelSignal::Clear => false,
                PixelSignal::Failed(message) => {
                    tracing::error!(file = %record.file_name, error = %message, "detection failed");
                    record.error_message = Some(message);
                    record.detection = DetectionResult::Failed;
                    return record.detection;
                }
            }
        } else {
            false
        };

        let result = match (by_size, by_pixels) {
            (true, true) => DetectionResult::SuspiciousBoth,
            (true, false) => DetectionResult::SuspiciousSize,
            (false, true) => DetectionResult::SuspiciousPixels,
            (false, false) => DetectionResult::Normal,
        };

        if result.is_suspicious() {
            tracing::info!(
                file = %record.file_name,
                size = %record.formatted_size(),
                result = result.label(),
                "suspected empty PDF"
            );
        } else {
            tracing::debug!(file = %record.file_name, "file looks normal");
        }

        record.detection = result;
        result
    }

    /// Run the pixel-density signal on the first page.
    ///
    /// A document that cannot be opened is a failure; a document that
    /// opens but yields no bitmap (zero pages, render-tool breakage) is
    /// treated as content-free and therefore suspicious.
    fn pixel_signal(&self, path: &Path) -> PixelSignal {
        let rendered = match self.rasterizer.render(path, 0, ANALYSIS_DPI) {
            Ok(rendered) => rendered,
            Err(RasterError::FileNotFound(_)) => {
                return PixelSignal::Failed("file not found".to_string());
            }
            Err(e) => return PixelSignal::Failed(e.to_string()),
        };

        let image = match rendered {
            Rendered::Page(image) => image,
            Rendered::NoPages => {
                tracing::debug!(path = %path.display(), "document has no pages");
                return PixelSignal::Suspicious;
            }
            Rendered::ToolFailed(reason) => {
                tracing::warn!(path = %path.display(), reason = %reason, "page render failed, treating as content-free");
                return PixelSignal::Suspicious;
            }
        };

        let area = compute_area(
            image.width(),
            image.height(),
            self.options.area_width_pct,
            self.options.area_height_pct,
            self.options.horizontal_offset_pct,
        );

        let density = content_density(&image, &area);
        let threshold = self.options.density_threshold_pct / 100.0;

        tracing::debug!(
            path = %path.display(),
            density_pct = %format!("{:.2}", density * 100.0),
            threshold_pct = %format!("{:.2}", threshold * 100.0),
            "content density analysis"
        );

        if density < threshold {
            PixelSignal::Suspicious
        } else {
            PixelSignal::Clear
        }
    }
}

/// A pixel carries content when it is not near-white background
#[inline]
pub fn is_content_pixel(pixel: &Rgb<u8>) -> bool {
    let Rgb([r, g, b]) = *pixel;
    !(r > NEAR_WHITE_MIN && g > NEAR_WHITE_MIN && b > NEAR_WHITE_MIN)
}

/// Count content pixels inside the detection area
pub fn count_content_pixels(image: &RgbImage, area: &DetectionArea) -> u64 {
    let mut count = 0u64;
    for y in area.start_y..area.end_y {
        for x in area.start_x..area.end_x {
            if is_content_pixel(image.get_pixel(x, y)) {
                count += 1;
            }
        }
    }
    count
}

/// Fraction of the detection area covered by content pixels.
///
/// An area clipped to zero pixels reports density 0 rather than
/// dividing by zero.
pub fn content_density(image: &RgbImage, area: &DetectionArea) -> f64 {
    let total = area.pixel_count();
    if total == 0 {
        return 0.0;
    }
    count_content_pixels(image, area) as f64 / total as f64
}

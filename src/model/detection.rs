//! Raw per-page detections handed from the model stage to the aggregator.
//!
//! Detections are transient: the orchestrator builds one [`PageDetections`]
//! per page, the aggregator consumes it by value, and nothing survives the
//! page except the ordered items and stored artifact links.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// Pixels added on every side of a region before it is cropped.
///
/// Detection boxes hug glyphs tightly; recognisers read edge characters more
/// reliably with a small margin.
pub const CROP_PADDING: f32 = 5.0;

/// Axis-aligned box in page pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// The whole of a `width` × `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn top(&self) -> f32 {
        self.y1
    }

    pub fn left(&self) -> f32 {
        self.x1
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Grow by `pad` on every side, clamped to a `width` × `height` page.
    pub fn padded(&self, pad: f32, width: u32, height: u32) -> Self {
        Self {
            x1: (self.x1 - pad).max(0.0),
            y1: (self.y1 - pad).max(0.0),
            x2: (self.x2 + pad).min(width as f32),
            y2: (self.y2 + pad).min(height as f32),
        }
    }

    /// Reading-order comparison: top edge first, then left edge.
    pub fn reading_cmp(&self, other: &Self) -> Ordering {
        self.top()
            .total_cmp(&other.top())
            .then_with(|| self.left().total_cmp(&other.left()))
    }

    /// Integer crop rectangle `(x, y, w, h)` inside a `width` × `height`
    /// image, never empty.
    fn crop_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = (self.x1.max(0.0).floor() as u32).min(width.saturating_sub(1));
        let y = (self.y1.max(0.0).floor() as u32).min(height.saturating_sub(1));
        let x2 = (self.x2.ceil().max(0.0) as u32).min(width);
        let y2 = (self.y2.ceil().max(0.0) as u32).min(height);
        (x, y, x2.saturating_sub(x).max(1), y2.saturating_sub(y).max(1))
    }
}

/// Crop `region` (padded by [`CROP_PADDING`]) out of a page image.
///
/// Returns the crop and the padded box actually used, whose top-left corner
/// is the offset for mapping crop-relative coordinates back to the page.
pub fn crop_padded(image: &DynamicImage, region: &BoundingBox) -> (DynamicImage, BoundingBox) {
    let padded = region.padded(CROP_PADDING, image.width(), image.height());
    let (x, y, w, h) = padded.crop_rect(image.width(), image.height());
    (image.crop_imm(x, y, w, h), padded)
}

/// A recognised block of text.
#[derive(Debug, Clone)]
pub struct TextDetection {
    pub page_number: usize,
    pub region: BoundingBox,
    pub content: String,
}

/// A recognised table: its structure export and its rendering.
#[derive(Debug, Clone)]
pub struct TableDetection {
    pub page_number: usize,
    pub region: BoundingBox,
    /// Table structure as HTML markup.
    pub html: String,
    /// Crop of the table region from the page image.
    pub rendering: DynamicImage,
}

/// A figure cropped out of the page.
#[derive(Debug, Clone)]
pub struct ImageRegion {
    pub page_number: usize,
    pub region: BoundingBox,
    pub image: DynamicImage,
}

/// One raw model output.
#[derive(Debug, Clone)]
pub enum Detection {
    Text(TextDetection),
    Table(TableDetection),
    Image(ImageRegion),
}

impl Detection {
    pub fn page_number(&self) -> usize {
        match self {
            Detection::Text(d) => d.page_number,
            Detection::Table(d) => d.page_number,
            Detection::Image(d) => d.page_number,
        }
    }
}

/// Everything the model stage produced for one page.
#[derive(Debug, Clone, Default)]
pub struct PageDetections {
    pub page_number: usize,
    pub detections: Vec<Detection>,
}

impl PageDetections {
    pub fn new(page_number: usize) -> Self {
        Self {
            page_number,
            detections: Vec::new(),
        }
    }

    /// Add a detection. Detections belonging to another page are dropped.
    pub fn push(&mut self, detection: Detection) {
        if detection.page_number() != self.page_number {
            warn!(
                "Dropping detection for page {} from page {}",
                detection.page_number(),
                self.page_number
            );
            return;
        }
        self.detections.push(detection);
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

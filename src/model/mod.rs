//! Model gateway: the three model families the pipeline drives.
//!
//! Each family is an async trait taking a page (or region) image and
//! returning raw outputs with boxes relative to that image. The orchestrator
//! never knows which backend sits behind a trait object; [`vlm`] ships one
//! built on vision-language models, tests plug in deterministic fakes.
//!
//! ```text
//! LayoutModel ──▶ regions (Text/Title/List/Table/Figure)
//! TextModel   ──▶ text spans
//! TableModel  ──▶ tables as HTML
//! ```

pub mod detection;
pub mod registry;
pub mod vlm;

pub use detection::{
    crop_padded, BoundingBox, Detection, ImageRegion, PageDetections, TableDetection,
    TextDetection, CROP_PADDING,
};

use crate::error::ModelError;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A result stream of the extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Text,
    Table,
    Image,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Text => "text",
            Stream::Table => "table",
            Stream::Image => "image",
        })
    }
}

/// Layout region classes, using the PubLayNet label map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutKind {
    Text,
    Title,
    List,
    Table,
    Figure,
}

impl LayoutKind {
    /// Map a numeric label (`0: Text, 1: Title, 2: List, 3: Table, 4: Figure`).
    pub fn from_label(label: u32) -> Option<Self> {
        match label {
            0 => Some(LayoutKind::Text),
            1 => Some(LayoutKind::Title),
            2 => Some(LayoutKind::List),
            3 => Some(LayoutKind::Table),
            4 => Some(LayoutKind::Figure),
            _ => None,
        }
    }

    /// Map a class name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" | "paragraph" => Some(LayoutKind::Text),
            "title" | "heading" => Some(LayoutKind::Title),
            "list" => Some(LayoutKind::List),
            "table" => Some(LayoutKind::Table),
            "figure" | "image" | "picture" => Some(LayoutKind::Figure),
            _ => None,
        }
    }

    /// Regions whose content goes to the text model.
    pub fn is_text_like(self) -> bool {
        matches!(self, LayoutKind::Text | LayoutKind::Title | LayoutKind::List)
    }
}

/// One region found by the layout model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRegion {
    pub kind: LayoutKind,
    pub region: BoundingBox,
    pub score: f32,
}

/// One line or block of recognised text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub region: BoundingBox,
    pub text: String,
}

/// One recognised table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRecognition {
    pub region: BoundingBox,
    pub html: String,
}

/// Text detection + recognition.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Recognise every text span in `image`; boxes are relative to `image`.
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextSpan>, ModelError>;
}

/// Table structure recognition.
#[async_trait]
pub trait TableModel: Send + Sync {
    /// Recognise every table in `image`; boxes are relative to `image`.
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<TableRecognition>, ModelError>;
}

/// Page layout analysis.
#[async_trait]
pub trait LayoutModel: Send + Sync {
    /// Detect layout regions in a full page image.
    async fn detect(&self, image: &DynamicImage) -> Result<Vec<LayoutRegion>, ModelError>;
}

/// The models available to a run. Absent families cannot be requested.
#[derive(Clone, Default)]
pub struct ModelSet {
    pub text: Option<Arc<dyn TextModel>>,
    pub table: Option<Arc<dyn TableModel>>,
    pub layout: Option<Arc<dyn LayoutModel>>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, model: Arc<dyn TextModel>) -> Self {
        self.text = Some(model);
        self
    }

    pub fn with_table(mut self, model: Arc<dyn TableModel>) -> Self {
        self.table = Some(model);
        self
    }

    pub fn with_layout(mut self, model: Arc<dyn LayoutModel>) -> Self {
        self.layout = Some(model);
        self
    }
}

impl fmt::Debug for ModelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSet")
            .field("text", &self.text.is_some())
            .field("table", &self.table.is_some())
            .field("layout", &self.layout.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_map_matches_publaynet() {
        assert_eq!(LayoutKind::from_label(0), Some(LayoutKind::Text));
        assert_eq!(LayoutKind::from_label(3), Some(LayoutKind::Table));
        assert_eq!(LayoutKind::from_label(4), Some(LayoutKind::Figure));
        assert_eq!(LayoutKind::from_label(9), None);
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(LayoutKind::from_name(" Title "), Some(LayoutKind::Title));
        assert_eq!(LayoutKind::from_name("FIGURE"), Some(LayoutKind::Figure));
        assert_eq!(LayoutKind::from_name("footer"), None);
    }

    #[test]
    fn text_like_kinds() {
        assert!(LayoutKind::Title.is_text_like());
        assert!(LayoutKind::List.is_text_like());
        assert!(!LayoutKind::Table.is_text_like());
        assert!(!LayoutKind::Figure.is_text_like());
    }

    #[test]
    fn stream_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&Stream::Table).unwrap(), "\"table\"");
        assert_eq!(Stream::Image.to_string(), "image");
    }
}

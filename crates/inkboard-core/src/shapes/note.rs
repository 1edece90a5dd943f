//! Sticky note.

use super::{DEFAULT_FONT_SIZE, ElementId, SerializableColor};
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// A colored note whose font size is auto-fitted to its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickyNote {
    pub id: ElementId,
    /// Top-left corner before rotation.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation angle in radians (around center).
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub text: String,
    /// Last auto-fitted font size.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "SerializableColor::note_yellow")]
    pub color: SerializableColor,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

impl StickyNote {
    pub fn new(id: ElementId, rect: Rect) -> Self {
        let rect = rect.abs();
        Self {
            id,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            rotation: 0.0,
            text: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            color: SerializableColor::note_yellow(),
        }
    }
}

//! Free text.

use super::{DEFAULT_FONT_SIZE, ElementId, SerializableColor};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A free-standing text block.
///
/// The unscaled size comes from laying the text out against `wrap_width`
/// (or its longest line when unwrapped); `scale_x`/`scale_y` stretch the
/// laid-out block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub id: ElementId,
    /// Top-left corner before rotation.
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Wrap width in unscaled units (None = only explicit line breaks).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_width: Option<f64>,
    /// Rotation angle in radians (around center).
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "unit_scale")]
    pub scale_x: f64,
    #[serde(default = "unit_scale")]
    pub scale_y: f64,
    #[serde(default = "SerializableColor::black")]
    pub color: SerializableColor,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn unit_scale() -> f64 {
    1.0
}

impl TextElement {
    pub fn new(id: ElementId, position: Point) -> Self {
        Self {
            id,
            x: position.x,
            y: position.y,
            text: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            wrap_width: None,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            color: SerializableColor::black(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

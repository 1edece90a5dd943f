//! Basic geometric shapes sharing one payload.
//!
//! Rectangle, rounded rectangle, ellipse, diamond, triangle and speech bubble
//! only differ in outline, which is decided by the enclosing
//! [`BoardElement`](super::BoardElement) variant.

use super::{ElementId, SerializableColor};
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// Default outline width for shapes and connectors.
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicShape {
    pub id: ElementId,
    /// Top-left corner before rotation.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Rotation angle in radians (around center).
    #[serde(default)]
    pub rotation: f64,
    /// Fill color (None = no fill).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<SerializableColor>,
    #[serde(default = "SerializableColor::black")]
    pub stroke: SerializableColor,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Centered label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

impl BasicShape {
    pub fn new(id: ElementId, rect: Rect) -> Self {
        let rect = rect.abs();
        Self {
            id,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            rotation: 0.0,
            fill: None,
            stroke: SerializableColor::black(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            text: None,
            font_size: None,
        }
    }
}

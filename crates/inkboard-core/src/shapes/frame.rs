//! Frame container.

use super::{ElementId, SerializableColor};
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// A titled, axis-aligned container.
///
/// Membership is not stored: whatever lies fully inside the frame's bounds
/// when asked belongs to it (see `Scene::frame_members`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameElement {
    pub id: ElementId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<SerializableColor>,
}

impl FrameElement {
    pub fn new(id: ElementId, rect: Rect) -> Self {
        let rect = rect.abs();
        Self {
            id,
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            title: "Frame".to_string(),
            fill: None,
        }
    }
}

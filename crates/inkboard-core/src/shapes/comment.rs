//! Comment pin.

use super::ElementId;
use serde::{Deserialize, Serialize};

/// Radius of a comment pin in board units.
pub const COMMENT_RADIUS: f64 = 14.0;

/// A point annotation carrying a discussion body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentElement {
    pub id: ElementId,
    /// Pin position.
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub resolved: bool,
}

impl CommentElement {
    pub fn new(id: ElementId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            text: String::new(),
            author: None,
            resolved: false,
        }
    }
}

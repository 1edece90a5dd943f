//! Tool selection.

use crate::shapes::{LineRoute, ShapeKind};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ToolKind {
    #[default]
    Select,
    Pan,
    StickyNote,
    Text,
    Rectangle,
    RoundedRectangle,
    Ellipse,
    Diamond,
    Triangle,
    SpeechBubble,
    Frame,
    /// Straight line with an end arrow.
    Line,
    /// Automatically routed orthogonal connector.
    Connector,
    Comment,
}

impl ToolKind {
    /// Element kind created by dragging with this tool.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        Some(match self {
            ToolKind::StickyNote => ShapeKind::StickyNote,
            ToolKind::Text => ShapeKind::Text,
            ToolKind::Rectangle => ShapeKind::Rectangle,
            ToolKind::RoundedRectangle => ShapeKind::RoundedRectangle,
            ToolKind::Ellipse => ShapeKind::Ellipse,
            ToolKind::Diamond => ShapeKind::Diamond,
            ToolKind::Triangle => ShapeKind::Triangle,
            ToolKind::SpeechBubble => ShapeKind::SpeechBubble,
            ToolKind::Frame => ShapeKind::Frame,
            _ => return None,
        })
    }

    pub fn is_line_tool(self) -> bool {
        matches!(self, ToolKind::Line | ToolKind::Connector)
    }

    /// Route given to lines drawn with this tool.
    pub fn line_route(self) -> LineRoute {
        match self {
            ToolKind::Connector => LineRoute::auto_orthogonal(),
            _ => LineRoute::Straight,
        }
    }

    /// Whether the tool creates something on empty canvas.
    pub fn creates(self) -> bool {
        self.shape_kind().is_some() || self.is_line_tool() || self == ToolKind::Comment
    }
}

//! Lines and connectors.

use super::{Anchor, DEFAULT_STROKE_WIDTH, ElementId, SerializableColor};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Reference from a connector endpoint to another element's anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub element_id: ElementId,
    pub anchor: Anchor,
}

impl Binding {
    pub fn new(element_id: impl Into<ElementId>, anchor: Anchor) -> Self {
        Self {
            element_id: element_id.into(),
            anchor,
        }
    }
}

/// Two-bend orthogonal route shapes.
///
/// `Hvh` runs horizontal, vertical, horizontal and its offset is the x of the
/// vertical run; `Vhv` is the transpose and its offset is a y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElbowVariant {
    #[serde(rename = "HVH")]
    Hvh,
    #[serde(rename = "VHV")]
    Vhv,
}

/// How the body of a line is drawn between its endpoints.
///
/// Exactly one routing mode is active at a time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LineRoute {
    #[default]
    Straight,
    /// Free bend points between the endpoints.
    Polyline { points: Vec<Point> },
    /// Quadratic curve passing through `handle`.
    Curve { handle: Point },
    /// Horizontal/vertical segments only.
    Orthogonal {
        variant: ElbowVariant,
        offset: f64,
        /// When true the route is synthesized around obstacles and
        /// `variant`/`offset` are ignored.
        auto: bool,
    },
}

impl LineRoute {
    /// Automatically routed orthogonal connector.
    pub fn auto_orthogonal() -> Self {
        LineRoute::Orthogonal {
            variant: ElbowVariant::Hvh,
            offset: 0.0,
            auto: true,
        }
    }

    pub fn is_orthogonal(&self) -> bool {
        matches!(self, LineRoute::Orthogonal { .. })
    }
}

/// One of the two endpoints of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineEnd {
    Start,
    End,
}

/// A line or connector between two points.
///
/// The literal `x1/y1` and `x2/y2` coordinates are only used while the
/// corresponding endpoint is unbound or its binding target is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineElement {
    pub id: ElementId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_binding: Option<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_binding: Option<Binding>,
    #[serde(default)]
    pub route: LineRoute,
    #[serde(default = "SerializableColor::black")]
    pub stroke: SerializableColor,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    #[serde(default)]
    pub start_arrow: bool,
    #[serde(default = "default_end_arrow")]
    pub end_arrow: bool,
}

fn default_stroke_width() -> f64 {
    DEFAULT_STROKE_WIDTH
}

fn default_end_arrow() -> bool {
    true
}

impl LineElement {
    pub fn new(id: ElementId, start: Point, end: Point) -> Self {
        Self {
            id,
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
            start_binding: None,
            end_binding: None,
            route: LineRoute::Straight,
            stroke: SerializableColor::black(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            start_arrow: false,
            end_arrow: true,
        }
    }

    /// Literal coordinate of an endpoint.
    pub fn literal(&self, end: LineEnd) -> Point {
        match end {
            LineEnd::Start => Point::new(self.x1, self.y1),
            LineEnd::End => Point::new(self.x2, self.y2),
        }
    }

    pub fn set_literal(&mut self, end: LineEnd, point: Point) {
        match end {
            LineEnd::Start => (self.x1, self.y1) = (point.x, point.y),
            LineEnd::End => (self.x2, self.y2) = (point.x, point.y),
        }
    }

    pub fn binding(&self, end: LineEnd) -> Option<&Binding> {
        match end {
            LineEnd::Start => self.start_binding.as_ref(),
            LineEnd::End => self.end_binding.as_ref(),
        }
    }

    pub fn set_binding(&mut self, end: LineEnd, binding: Option<Binding>) {
        match end {
            LineEnd::Start => self.start_binding = binding,
            LineEnd::End => self.end_binding = binding,
        }
    }

    pub fn has_arrow(&self, end: LineEnd) -> bool {
        match end {
            LineEnd::Start => self.start_arrow,
            LineEnd::End => self.end_arrow,
        }
    }

    /// Whether either endpoint is bound to `id`.
    pub fn is_bound_to(&self, id: &str) -> bool {
        [&self.start_binding, &self.end_binding]
            .into_iter()
            .flatten()
            .any(|b| b.element_id == id)
    }

    /// Literal endpoints plus any stored route geometry.
    pub fn literal_points(&self) -> Vec<Point> {
        let mut points = vec![self.literal(LineEnd::Start)];
        match &self.route {
            LineRoute::Polyline { points: bends } => points.extend(bends.iter().copied()),
            LineRoute::Curve { handle } => points.push(*handle),
            LineRoute::Straight | LineRoute::Orthogonal { .. } => {}
        }
        points.push(self.literal(LineEnd::End));
        points
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x1 += delta.x;
        self.y1 += delta.y;
        self.x2 += delta.x;
        self.y2 += delta.y;
        match &mut self.route {
            LineRoute::Straight => {}
            LineRoute::Polyline { points } => {
                for p in points.iter_mut() {
                    *p += delta;
                }
            }
            LineRoute::Curve { handle } => *handle += delta,
            LineRoute::Orthogonal {
                variant,
                offset,
                auto,
            } => {
                if !*auto {
                    *offset += match variant {
                        ElbowVariant::Hvh => delta.x,
                        ElbowVariant::Vhv => delta.y,
                    };
                }
            }
        }
    }
}

//! Selection state and manipulation handles.

use crate::geometry::TransformBounds;
use crate::routing::ResolvedLine;
use crate::shapes::{BoardElement, ElementId, LineElement, LineEnd, LineRoute};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Ordered set of selected element ids plus the hovered element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: Vec<ElementId>,
    pub hovered: Option<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// The selected id when exactly one element is selected.
    pub fn single(&self) -> Option<&str> {
        match self.ids.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    pub fn select_only(&mut self, id: impl Into<ElementId>) {
        self.ids.clear();
        self.ids.push(id.into());
    }

    pub fn set(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.ids.clear();
        for id in ids {
            self.add(id);
        }
    }

    pub fn add(&mut self, id: impl Into<ElementId>) {
        let id = id.into();
        if !self.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.retain(|s| s != id);
    }

    pub fn toggle(&mut self, id: &str) {
        if self.contains(id) {
            self.remove(id);
        } else {
            self.ids.push(id.to_string());
        }
    }

    /// Symmetric difference with `ids`.
    pub fn toggle_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a ElementId>) {
        for id in ids {
            self.toggle(id);
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids for which `exists` is false, including the hovered one.
    pub fn retain(&mut self, exists: impl Fn(&str) -> bool) {
        self.ids.retain(|id| exists(id));
        if self.hovered.as_deref().is_some_and(|id| !exists(id)) {
            self.hovered = None;
        }
    }
}

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::TopLeft, Corner::TopRight, Corner::BottomRight, Corner::BottomLeft];

    /// Index into `TransformBounds::corners`.
    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }

    pub fn opposite(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomRight => Corner::TopLeft,
            Corner::BottomLeft => Corner::TopRight,
        }
    }

    /// Sign of the corner relative to the center on each axis.
    pub fn signs(self) -> Vec2 {
        match self {
            Corner::TopLeft => Vec2::new(-1.0, -1.0),
            Corner::TopRight => Vec2::new(1.0, -1.0),
            Corner::BottomRight => Vec2::new(1.0, 1.0),
            Corner::BottomLeft => Vec2::new(-1.0, 1.0),
        }
    }
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub fn is_horizontal_resize(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }

    /// Outward unit normal in the element's unrotated frame.
    pub fn normal(self) -> Vec2 {
        match self {
            Edge::Top => Vec2::new(0.0, -1.0),
            Edge::Right => Vec2::new(1.0, 0.0),
            Edge::Bottom => Vec2::new(0.0, 1.0),
            Edge::Left => Vec2::new(-1.0, 0.0),
        }
    }
}

/// Type of manipulation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Scale from a corner of a rotatable element.
    Corner(Corner),
    /// Single-axis resize (or text wrap width).
    Edge(Edge),
    /// Rotation handle above the top edge.
    Rotate,
    /// Axis-aligned frame resize from a corner.
    ResizeCorner(Corner),
    LineEndpoint(LineEnd),
    /// Midpoint of a straight line; dragging bends it into a curve.
    LineMidpoint,
    /// Free bend point of a polyline.
    LineBend(usize),
    CurveHandle,
    /// Middle segment of an orthogonal route.
    ElbowSegment,
}

impl HandleKind {
    pub fn is_transform(self) -> bool {
        matches!(self, HandleKind::Corner(_) | HandleKind::Edge(_) | HandleKind::Rotate)
    }

    pub fn is_line(self) -> bool {
        matches!(
            self,
            HandleKind::LineEndpoint(_)
                | HandleKind::LineMidpoint
                | HandleKind::LineBend(_)
                | HandleKind::CurveHandle
                | HandleKind::ElbowSegment
        )
    }
}

/// A handle with its position in board coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// `tolerance` is in board units (already divided by zoom).
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// Corner, edge and rotate handles of a rotatable element.
///
/// Text gets only left/right edges, which set its wrap width.
/// `rotate_offset` is the board distance of the rotate handle above the top edge.
pub fn transform_handles(element: &BoardElement, bounds: &TransformBounds, rotate_offset: f64) -> Vec<Handle> {
    if !element.supports_transform() {
        return Vec::new();
    }
    let (hw, hh) = (bounds.width / 2.0, bounds.height / 2.0);
    let mut handles: Vec<Handle> = Corner::ALL
        .iter()
        .map(|c| Handle::new(bounds.corners[c.index()], HandleKind::Corner(*c)))
        .collect();
    let edges: &[Edge] = if matches!(element, BoardElement::Text(_)) {
        &[Edge::Right, Edge::Left]
    } else {
        &[Edge::Top, Edge::Right, Edge::Bottom, Edge::Left]
    };
    for edge in edges {
        let n = edge.normal();
        let local = Vec2::new(n.x * hw, n.y * hh);
        handles.push(Handle::new(bounds.from_local(local), HandleKind::Edge(*edge)));
    }
    handles.push(Handle::new(
        bounds.from_local(Vec2::new(0.0, -hh - rotate_offset)),
        HandleKind::Rotate,
    ));
    handles
}

/// Legacy axis-aligned corner handles for frames.
pub fn frame_resize_handles(rect: Rect) -> Vec<Handle> {
    vec![
        Handle::new(Point::new(rect.x0, rect.y0), HandleKind::ResizeCorner(Corner::TopLeft)),
        Handle::new(Point::new(rect.x1, rect.y0), HandleKind::ResizeCorner(Corner::TopRight)),
        Handle::new(Point::new(rect.x1, rect.y1), HandleKind::ResizeCorner(Corner::BottomRight)),
        Handle::new(Point::new(rect.x0, rect.y1), HandleKind::ResizeCorner(Corner::BottomLeft)),
    ]
}

/// Endpoint handles first, then the route's own handles.
pub fn line_handles(line: &LineElement, resolved: &ResolvedLine) -> Vec<Handle> {
    let mut handles = vec![
        Handle::new(resolved.start, HandleKind::LineEndpoint(LineEnd::Start)),
        Handle::new(resolved.end, HandleKind::LineEndpoint(LineEnd::End)),
    ];
    match &line.route {
        LineRoute::Straight => {
            handles.push(Handle::new(resolved.start.midpoint(resolved.end), HandleKind::LineMidpoint));
        }
        LineRoute::Polyline { points } => {
            handles.extend(
                points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| Handle::new(*p, HandleKind::LineBend(i))),
            );
        }
        LineRoute::Curve { handle } => handles.push(Handle::new(*handle, HandleKind::CurveHandle)),
        LineRoute::Orthogonal { .. } => {
            if let Some((a, b)) = resolved.elbow_segment() {
                handles.push(Handle::new(a.midpoint(b), HandleKind::ElbowSegment));
            }
        }
    }
    handles
}

/// First handle within `tolerance` of `point`.
pub fn hit_test_handles(handles: &[Handle], point: Point, tolerance: f64) -> Option<HandleKind> {
    handles.iter().find(|h| h.hit_test(point, tolerance)).map(|h| h.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ApproxMeasure, bounds_of};
    use crate::routing::resolve_endpoints;
    use crate::shapes::{ShapeKind, TextElement};
    use std::f64::consts::PI;

    #[test]
    fn test_selection_toggle_and_retain() {
        let mut sel = Selection::new();
        sel.set(["a".to_string(), "b".to_string()]);
        sel.toggle_all(&["b".to_string(), "c".to_string()]);
        assert_eq!(sel.ids(), &["a".to_string(), "c".to_string()]);
        sel.hovered = Some("c".into());
        sel.retain(|id| id != "c");
        assert_eq!(sel.single(), Some("a"));
        assert!(sel.hovered.is_none());
    }

    #[test]
    fn test_rotate_handle_follows_rotation() {
        let mut el = BoardElement::new_shape(ShapeKind::Rectangle, Rect::new(0.0, 0.0, 100.0, 100.0));
        el.set_rotation(PI / 2.0);
        let bounds = bounds_of(&el, &ApproxMeasure);
        let handles = transform_handles(&el, &bounds, 20.0);
        let rotate = handles.iter().find(|h| h.kind == HandleKind::Rotate).unwrap();
        // Top now faces +x.
        assert!((rotate.position.x - 120.0).abs() < 1e-9);
        assert!((rotate.position.y - 50.0).abs() < 1e-9);
        assert_eq!(handles.len(), 9);
    }

    #[test]
    fn test_text_has_only_side_edges() {
        let mut text = TextElement::new("t".into(), Point::ZERO);
        text.text = "hi".into();
        let el = BoardElement::Text(text);
        let bounds = bounds_of(&el, &ApproxMeasure);
        let edges: Vec<_> = transform_handles(&el, &bounds, 20.0)
            .into_iter()
            .filter(|h| matches!(h.kind, HandleKind::Edge(_)))
            .collect();
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_frames_and_lines_have_no_transform_handles() {
        let frame = BoardElement::new_shape(ShapeKind::Frame, Rect::new(0.0, 0.0, 200.0, 200.0));
        let bounds = bounds_of(&frame, &ApproxMeasure);
        assert!(transform_handles(&frame, &bounds, 20.0).is_empty());
        assert_eq!(frame_resize_handles(Rect::new(0.0, 0.0, 200.0, 200.0)).len(), 4);
    }

    #[test]
    fn test_line_handles_per_route() {
        let mut line = LineElement::new("l".into(), Point::ZERO, Point::new(100.0, 0.0));
        let resolved = resolve_endpoints(&line, |_| None, &ApproxMeasure);
        let handles = line_handles(&line, &resolved);
        assert_eq!(
            hit_test_handles(&handles, Point::new(51.0, 1.0), 5.0),
            Some(HandleKind::LineMidpoint)
        );
        assert_eq!(
            hit_test_handles(&handles, Point::new(99.0, 0.0), 5.0),
            Some(HandleKind::LineEndpoint(LineEnd::End))
        );

        line.route = LineRoute::Polyline {
            points: vec![Point::new(30.0, 30.0), Point::new(60.0, -30.0)],
        };
        let resolved = resolve_endpoints(&line, |_| None, &ApproxMeasure);
        let handles = line_handles(&line, &resolved);
        assert_eq!(
            hit_test_handles(&handles, Point::new(60.0, -29.0), 5.0),
            Some(HandleKind::LineBend(1))
        );
        assert_eq!(hit_test_handles(&handles, Point::new(50.0, 0.0), 5.0), None);
    }
}

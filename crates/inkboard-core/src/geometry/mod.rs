//! Geometry and bounds engine.
//!
//! Rotation/scale-aware bounds for every element variant, anchor points,
//! hit testing and text layout.

mod anchor;
mod hit;
mod layout;

pub use anchor::{AnchorPoint, anchor_point, triangle_vertices};
pub use hit::{HitContext, element_contains_point, frame_label_rect, hit_test};
pub use layout::{
    ApproxMeasure, LINE_HEIGHT_FACTOR, LayoutLine, MeasureContext, NOTE_MAX_FONT, NOTE_PADDING,
    TextLayout, fit_font_size, layout_text, wrap_line,
};

use crate::shapes::{BoardElement, COMMENT_RADIUS, TEXT_MIN_WRAP, TextElement};
use kurbo::{Affine, Point, Rect, Vec2};

/// Oriented bounds of an element.
///
/// `width`/`height` are the scaled, unrotated extents. Corners are
/// top-left, top-right, bottom-right, bottom-left before rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformBounds {
    pub center: Point,
    pub rotation: f64,
    pub scale: Vec2,
    pub width: f64,
    pub height: f64,
    pub corners: [Point; 4],
    pub aabb: Rect,
}

impl TransformBounds {
    /// Bounds of `rect` rotated by `rotation` about its center.
    pub fn new(rect: Rect, rotation: f64, scale: Vec2) -> Self {
        let center = rect.center();
        let (hw, hh) = (rect.width() / 2.0, rect.height() / 2.0);
        let to_world = Affine::translate(center.to_vec2()) * Affine::rotate(rotation);
        let corners = [
            to_world * Point::new(-hw, -hh),
            to_world * Point::new(hw, -hh),
            to_world * Point::new(hw, hh),
            to_world * Point::new(-hw, hh),
        ];
        let mut aabb = Rect::from_points(corners[0], corners[1]);
        aabb = aabb.union_pt(corners[2]).union_pt(corners[3]);
        Self {
            center,
            rotation,
            scale,
            width: rect.width(),
            height: rect.height(),
            corners,
            aabb,
        }
    }

    /// The unrotated rectangle with the same center and extents.
    pub fn local_rect(&self) -> Rect {
        Rect::from_center_size(self.center, (self.width, self.height))
    }

    /// Vector from the center to `point` in the unrotated frame.
    pub fn to_local(&self, point: Point) -> Vec2 {
        (Affine::rotate(-self.rotation) * (point - self.center).to_point()).to_vec2()
    }

    /// Inverse of [`to_local`](Self::to_local).
    pub fn from_local(&self, local: Vec2) -> Point {
        self.center + (Affine::rotate(self.rotation) * local.to_point()).to_vec2()
    }

    /// Point-in-rotated-polygon test against the corners.
    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.corners)
    }
}

/// Bounds of an element.
///
/// Lines report the box of their literal points; scene-level callers that
/// need bound endpoints resolved use `routing::resolve_line` instead.
pub fn bounds_of(element: &BoardElement, measure: &dyn MeasureContext) -> TransformBounds {
    match element {
        BoardElement::Text(text) => {
            let (rect, scale) = text_box(text, measure);
            TransformBounds::new(rect, text.rotation, scale)
        }
        BoardElement::Line(line) => {
            let points = line.literal_points();
            TransformBounds::new(points_aabb(&points), 0.0, Vec2::new(1.0, 1.0))
        }
        BoardElement::Comment(comment) => {
            let rect = Rect::from_center_size(
                Point::new(comment.x, comment.y),
                (COMMENT_RADIUS * 2.0, COMMENT_RADIUS * 2.0),
            );
            TransformBounds::new(rect, 0.0, Vec2::new(1.0, 1.0))
        }
        _ => {
            let rect = element.rect().unwrap_or_default();
            TransformBounds::new(rect, element.rotation(), Vec2::new(1.0, 1.0))
        }
    }
}

/// Laid-out box of a text element and its scale.
pub fn text_box(text: &TextElement, measure: &dyn MeasureContext) -> (Rect, Vec2) {
    let layout = text_layout(text, measure);
    let base_width = text
        .wrap_width
        .map(|w| w.max(TEXT_MIN_WRAP))
        .unwrap_or(layout.width)
        .max(1.0);
    let width = base_width * text.scale_x;
    let height = layout.height * text.scale_y;
    (
        Rect::new(text.x, text.y, text.x + width, text.y + height),
        Vec2::new(text.scale_x, text.scale_y),
    )
}

/// Unscaled layout of a text element.
pub fn text_layout(text: &TextElement, measure: &dyn MeasureContext) -> TextLayout {
    layout_text(
        &text.text,
        text.font_size,
        text.wrap_width.map(|w| w.max(TEXT_MIN_WRAP)),
        measure,
    )
}

/// Smallest axis-aligned rectangle containing `points`.
pub fn points_aabb(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (a + seg * t)).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => (point - *only).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Even-odd point-in-polygon test. Points on the boundary count as inside.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (a, b) = (polygon[i], polygon[j]);
        if point_to_segment_dist(point, a, b) < 1e-9 {
            return true;
        }
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Test if two line segments (a-b) and (c-d) intersect.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let cross = |o: Point, p: Point, q: Point| -> f64 {
        (p.x - o.x) * (q.y - o.y) - (p.y - o.y) * (q.x - o.x)
    };
    let d1 = cross(c, d, a);
    let d2 = cross(c, d, b);
    let d3 = cross(a, b, c);
    let d4 = cross(a, b, d);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    let on_segment = |p: Point, q: Point, r: Point| -> bool {
        r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
    };
    (d1.abs() < 1e-10 && on_segment(c, d, a))
        || (d2.abs() < 1e-10 && on_segment(c, d, b))
        || (d3.abs() < 1e-10 && on_segment(a, b, c))
        || (d4.abs() < 1e-10 && on_segment(a, b, d))
}

/// Whether any segment of the polyline touches the rectangle.
pub fn polyline_intersects_rect(points: &[Point], rect: Rect) -> bool {
    if points.iter().any(|p| rect.contains(*p)) {
        return true;
    }
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    points.windows(2).any(|w| {
        (0..4).any(|i| segments_intersect(w[0], w[1], corners[i], corners[(i + 1) % 4]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{ShapeKind, TextElement};
    use std::f64::consts::PI;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_unrotated_bounds() {
        let el = BoardElement::new_shape(ShapeKind::Rectangle, Rect::new(10.0, 20.0, 110.0, 70.0));
        let b = bounds_of(&el, &ApproxMeasure);
        assert_eq!(b.center, Point::new(60.0, 45.0));
        assert_eq!(b.corners[0], Point::new(10.0, 20.0));
        assert_eq!(b.corners[2], Point::new(110.0, 70.0));
        assert_eq!(b.aabb, Rect::new(10.0, 20.0, 110.0, 70.0));
    }

    #[test]
    fn test_quarter_turn_swaps_aabb_extents() {
        let mut el = BoardElement::new_shape(ShapeKind::Rectangle, Rect::new(0.0, 0.0, 100.0, 40.0));
        el.set_rotation(PI / 2.0);
        let b = bounds_of(&el, &ApproxMeasure);
        assert!(approx(b.aabb.width(), 40.0));
        assert!(approx(b.aabb.height(), 100.0));
        assert!(approx(b.width, 100.0));
    }

    #[test]
    fn test_bounds_round_trip_recovers_unrotated_rect() {
        for kind in [ShapeKind::Rectangle, ShapeKind::Ellipse, ShapeKind::StickyNote, ShapeKind::Image] {
            for rotation in [0.0, 0.3, 1.1, PI, -2.4, 5.0] {
                let mut el = BoardElement::new_shape(kind, Rect::new(-30.0, 15.0, 90.0, 95.0));
                el.set_rotation(rotation);
                let b = bounds_of(&el, &ApproxMeasure);
                let undo = Affine::rotate_about(-rotation, b.center);
                let back: Vec<Point> = b.corners.iter().map(|c| undo * *c).collect();
                assert!(approx(back[0].y, back[1].y));
                assert!(approx(back[2].y, back[3].y));
                assert!(approx(back[0].x, back[3].x));
                assert!(approx(back[1].x, back[2].x));
                assert!(approx(back[1].x - back[0].x, b.width));
                assert!(approx(back[3].y - back[0].y, b.height));
                assert!(approx(b.width, 120.0));
                assert!(approx(b.height, 80.0));
            }
        }
    }

    #[test]
    fn test_local_round_trip() {
        let b = TransformBounds::new(Rect::new(0.0, 0.0, 80.0, 20.0), 0.7, Vec2::new(1.0, 1.0));
        let p = Point::new(13.0, -4.0);
        let back = b.from_local(b.to_local(p));
        assert!(approx(back.x, p.x) && approx(back.y, p.y));
    }

    #[test]
    fn test_text_bounds_follow_layout_and_scale() {
        let mut text = TextElement::new("t".into(), Point::new(5.0, 5.0));
        text.text = "one\ntwo".into();
        text.font_size = 20.0;
        text.wrap_width = Some(100.0);
        text.scale_x = 2.0;
        let b = bounds_of(&BoardElement::Text(text), &ApproxMeasure);
        assert!(approx(b.width, 200.0));
        assert!(approx(b.height, 50.0));
        assert_eq!(b.scale, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(5.0, 5.0), &square));
        assert!(point_in_polygon(Point::new(10.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(11.0, 5.0), &square));
    }

    #[test]
    fn test_polyline_rect_intersection() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(polyline_intersects_rect(&[Point::new(-5.0, 5.0), Point::new(15.0, 5.0)], rect));
        assert!(!polyline_intersects_rect(&[Point::new(-5.0, 15.0), Point::new(15.0, 15.0)], rect));
    }
}

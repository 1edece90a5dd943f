//! Connector anchor points.

use super::{MeasureContext, TransformBounds, bounds_of};
use crate::shapes::{Anchor, BoardElement};
use kurbo::{Point, Vec2};

/// Resolved anchor position together with the element center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPoint {
    pub point: Point,
    pub center: Point,
}

impl AnchorPoint {
    /// Unit vector from the center out through the anchor, if they differ.
    pub fn outward(&self) -> Option<Vec2> {
        let v = self.point - self.center;
        let len = v.hypot();
        (len > 1e-9).then(|| v / len)
    }
}

/// Apex, bottom-right and bottom-left vertices of a triangle's bounds.
pub fn triangle_vertices(bounds: &TransformBounds) -> [Point; 3] {
    let (hw, hh) = (bounds.width / 2.0, bounds.height / 2.0);
    [
        bounds.from_local(Vec2::new(0.0, -hh)),
        bounds.from_local(Vec2::new(hw, hh)),
        bounds.from_local(Vec2::new(-hw, hh)),
    ]
}

/// Position of `anchor` on `element`.
///
/// Edge anchors are the midpoints of the rotated bounds' edges, except for
/// triangles where they sit on the actual outline.
pub fn anchor_point(element: &BoardElement, anchor: Anchor, measure: &dyn MeasureContext) -> AnchorPoint {
    let bounds = bounds_of(element, measure);
    let center = bounds.center;
    if matches!(element, BoardElement::Comment(_) | BoardElement::Line(_)) || anchor == Anchor::Center {
        return AnchorPoint { point: center, center };
    }

    let point = if matches!(element, BoardElement::Triangle(_)) {
        let [apex, right, left] = triangle_vertices(&bounds);
        match anchor {
            Anchor::Top => apex,
            Anchor::Bottom => left.midpoint(right),
            Anchor::Left => apex.midpoint(left),
            Anchor::Right => apex.midpoint(right),
            Anchor::Center => center,
        }
    } else {
        let c = bounds.corners;
        match anchor {
            Anchor::Top => c[0].midpoint(c[1]),
            Anchor::Right => c[1].midpoint(c[2]),
            Anchor::Bottom => c[2].midpoint(c[3]),
            Anchor::Left => c[3].midpoint(c[0]),
            Anchor::Center => center,
        }
    };
    AnchorPoint { point, center }
}

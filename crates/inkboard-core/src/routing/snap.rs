//! Connector endpoint snapping to element anchors.

use crate::geometry::{MeasureContext, anchor_point};
use crate::shapes::{Anchor, BoardElement, ElementId};
use kurbo::Point;

/// Anchor a dragged endpoint snapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSnap {
    pub element_id: ElementId,
    pub anchor: Anchor,
    pub point: Point,
}

fn can_bind(element: &BoardElement) -> bool {
    !element.is_line() && !element.is_comment()
}

/// Nearest cardinal anchor within `threshold` (board units) of `point`.
///
/// When nothing is close enough but the pointer is over a bindable element
/// (`under_pointer`), its nearest anchor is used instead.
pub fn snap_to_anchor<'a>(
    candidates: impl IntoIterator<Item = &'a BoardElement>,
    point: Point,
    threshold: f64,
    measure: &dyn MeasureContext,
    under_pointer: Option<&BoardElement>,
) -> Option<AnchorSnap> {
    let mut best: Option<(f64, AnchorSnap)> = None;
    for element in candidates.into_iter().filter(|e| can_bind(e)) {
        let Some((dist, snap)) = nearest_anchor(element, point, measure) else {
            continue;
        };
        if dist <= threshold && best.as_ref().is_none_or(|(d, _)| dist < *d) {
            best = Some((dist, snap));
        }
    }
    best.map(|(_, snap)| snap).or_else(|| {
        under_pointer
            .filter(|e| can_bind(e))
            .and_then(|e| nearest_anchor(e, point, measure))
            .map(|(_, snap)| snap)
    })
}

fn nearest_anchor(element: &BoardElement, point: Point, measure: &dyn MeasureContext) -> Option<(f64, AnchorSnap)> {
    Anchor::CARDINAL
        .into_iter()
        .map(|anchor| {
            let p = anchor_point(element, anchor, measure).point;
            (
                (p - point).hypot(),
                AnchorSnap {
                    element_id: element.id().to_string(),
                    anchor,
                    point: p,
                },
            )
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ApproxMeasure;
    use crate::shapes::{LineElement, ShapeKind};
    use kurbo::Rect;

    fn shape(x: f64) -> BoardElement {
        BoardElement::new_shape(ShapeKind::Rectangle, Rect::new(x, 0.0, x + 100.0, 100.0))
    }

    #[test]
    fn test_snaps_to_nearest_anchor_in_range() {
        let a = shape(0.0);
        let b = shape(120.0);
        let snap = snap_to_anchor([&a, &b], Point::new(112.0, 52.0), 16.0, &ApproxMeasure, None);
        let snap = snap.unwrap();
        assert_eq!(snap.element_id, b.id());
        assert_eq!(snap.anchor, Anchor::Left);
        assert_eq!(snap.point, Point::new(120.0, 50.0));
    }

    #[test]
    fn test_out_of_range_falls_back_to_element_under_pointer() {
        let a = shape(0.0);
        assert!(snap_to_anchor([&a], Point::new(50.0, 20.0), 16.0, &ApproxMeasure, None).is_none());
        let snap = snap_to_anchor([&a], Point::new(50.0, 20.0), 16.0, &ApproxMeasure, Some(&a)).unwrap();
        assert_eq!(snap.anchor, Anchor::Top);
    }

    #[test]
    fn test_lines_are_not_snap_targets() {
        let line = BoardElement::Line(LineElement::new("l".into(), Point::ZERO, Point::new(10.0, 0.0)));
        assert!(snap_to_anchor([&line], Point::ZERO, 100.0, &ApproxMeasure, Some(&line)).is_none());
    }
}

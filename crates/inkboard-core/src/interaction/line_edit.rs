//! Connector edits: endpoints, bends and elbow segments.

use crate::routing::AnchorSnap;
use crate::selection::HandleKind;
use crate::shapes::{Binding, ElbowVariant, LineElement, LineEnd, LineRoute};
use kurbo::Point;

/// Move one endpoint, binding it when it snapped to an anchor.
///
/// Orthogonal routes go back to automatic routing.
pub fn move_endpoint(original: &LineElement, end: LineEnd, pointer: Point, snap: Option<AnchorSnap>) -> LineElement {
    let mut line = original.clone();
    match snap {
        Some(snap) => {
            line.set_literal(end, snap.point);
            line.set_binding(end, Some(Binding::new(snap.element_id, snap.anchor)));
        }
        None => {
            line.set_literal(end, pointer);
            line.set_binding(end, None);
        }
    }
    if let LineRoute::Orthogonal { auto, .. } = &mut line.route {
        *auto = true;
    }
    line
}

/// Drag a bend handle to `pointer`.
///
/// The midpoint handle of a straight line turns it into a curve through the
/// pointer.
pub fn bend(original: &LineElement, handle: HandleKind, pointer: Point) -> LineElement {
    let mut line = original.clone();
    match (handle, &mut line.route) {
        (HandleKind::LineMidpoint, route @ LineRoute::Straight) => {
            *route = LineRoute::Curve { handle: pointer };
        }
        (HandleKind::CurveHandle, LineRoute::Curve { handle }) => *handle = pointer,
        (HandleKind::LineBend(i), LineRoute::Polyline { points }) => {
            if let Some(p) = points.get_mut(i) {
                *p = pointer;
            }
        }
        _ => {}
    }
    line
}

/// Drag the middle segment of an orthogonal route. The route stops being
/// automatic and keeps the offset under the pointer.
pub fn drag_segment(original: &LineElement, variant: ElbowVariant, pointer: Point) -> LineElement {
    let mut line = original.clone();
    let offset = match variant {
        ElbowVariant::Hvh => pointer.x,
        ElbowVariant::Vhv => pointer.y,
    };
    line.route = LineRoute::Orthogonal {
        variant,
        offset,
        auto: false,
    };
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Anchor;

    fn line() -> LineElement {
        LineElement::new("l".into(), Point::ZERO, Point::new(100.0, 0.0))
    }

    #[test]
    fn test_endpoint_binds_and_unbinds() {
        let mut original = line();
        original.route = LineRoute::Orthogonal {
            variant: ElbowVariant::Vhv,
            offset: 5.0,
            auto: false,
        };
        let snap = AnchorSnap {
            element_id: "a".into(),
            anchor: Anchor::Top,
            point: Point::new(120.0, 10.0),
        };
        let bound = move_endpoint(&original, LineEnd::End, Point::new(118.0, 12.0), Some(snap));
        assert_eq!(bound.end_binding, Some(Binding::new("a", Anchor::Top)));
        assert_eq!(bound.literal(LineEnd::End), Point::new(120.0, 10.0));
        assert!(matches!(bound.route, LineRoute::Orthogonal { auto: true, .. }));

        let free = move_endpoint(&bound, LineEnd::End, Point::new(300.0, 300.0), None);
        assert!(free.end_binding.is_none());
        assert_eq!(free.literal(LineEnd::End), Point::new(300.0, 300.0));
    }

    #[test]
    fn test_midpoint_turns_straight_into_curve() {
        let curved = bend(&line(), HandleKind::LineMidpoint, Point::new(50.0, 40.0));
        assert_eq!(curved.route, LineRoute::Curve { handle: Point::new(50.0, 40.0) });
        let moved = bend(&curved, HandleKind::CurveHandle, Point::new(50.0, -40.0));
        assert_eq!(moved.route, LineRoute::Curve { handle: Point::new(50.0, -40.0) });
    }

    #[test]
    fn test_polyline_bend_moves_one_point() {
        let mut original = line();
        original.route = LineRoute::Polyline {
            points: vec![Point::new(30.0, 0.0), Point::new(60.0, 0.0)],
        };
        let out = bend(&original, HandleKind::LineBend(1), Point::new(60.0, 25.0));
        assert_eq!(
            out.route,
            LineRoute::Polyline {
                points: vec![Point::new(30.0, 0.0), Point::new(60.0, 25.0)]
            }
        );
    }

    #[test]
    fn test_segment_drag_freezes_route() {
        let mut original = line();
        original.route = LineRoute::auto_orthogonal();
        let out = drag_segment(&original, ElbowVariant::Vhv, Point::new(10.0, 77.0));
        assert_eq!(
            out.route,
            LineRoute::Orthogonal {
                variant: ElbowVariant::Vhv,
                offset: 77.0,
                auto: false
            }
        );
    }
}

//! Connector routing engine.
//!
//! Turns a [`LineElement`] into the path that is actually drawn: bound
//! endpoints are resolved against the current scene, orthogonal connectors
//! are routed around other elements, curves are sampled and arrowheads trim
//! the path ends.

mod arrow;
mod curve;
mod elbow;
mod snap;

pub use arrow::{ArrowHead, DecoratedPath, arrow_length, decorate, path_length};
pub use curve::{curve_control, curve_segments, sample_quadratic};
pub use elbow::{Obstacle, RouteScore, auto_route, elbow_points, score_route};
pub use snap::{AnchorSnap, snap_to_anchor};

use crate::canvas::Scene;
use crate::geometry::{self, AnchorPoint, MeasureContext, anchor_point};
use crate::shapes::{Anchor, Axis, BoardElement, ElbowVariant, LineElement, LineEnd, LineRoute};
use kurbo::Point;

/// A bound endpoint after resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedAnchor {
    pub anchor: Anchor,
    pub point: AnchorPoint,
}

impl ResolvedAnchor {
    /// Axis the anchor faces, taking rotation into account.
    pub fn facing_axis(&self) -> Option<Axis> {
        let out = self.point.outward()?;
        Some(if out.x.abs() >= out.y.abs() {
            Axis::Horizontal
        } else {
            Axis::Vertical
        })
    }
}

/// Geometry of a line with bindings and routing applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLine {
    pub start: Point,
    pub end: Point,
    pub start_anchor: Option<ResolvedAnchor>,
    pub end_anchor: Option<ResolvedAnchor>,
    /// Drawn path from start to end (curves sampled), before arrow trimming.
    pub points: Vec<Point>,
    /// Route shape actually used by an orthogonal connector.
    pub elbow: Option<(ElbowVariant, f64)>,
    /// Quadratic control point of a curved line.
    pub curve_control: Option<Point>,
}

impl ResolvedLine {
    pub fn endpoint(&self, end: LineEnd) -> Point {
        match end {
            LineEnd::Start => self.start,
            LineEnd::End => self.end,
        }
    }

    pub fn anchor(&self, end: LineEnd) -> Option<&ResolvedAnchor> {
        match end {
            LineEnd::Start => self.start_anchor.as_ref(),
            LineEnd::End => self.end_anchor.as_ref(),
        }
    }

    /// Middle segment of an orthogonal route, the one a user can drag.
    pub fn elbow_segment(&self) -> Option<(Point, Point)> {
        let (variant, offset) = self.elbow?;
        Some(match variant {
            ElbowVariant::Hvh => (Point::new(offset, self.start.y), Point::new(offset, self.end.y)),
            ElbowVariant::Vhv => (Point::new(self.start.x, offset), Point::new(self.end.x, offset)),
        })
    }
}

/// Resolve both endpoints of `line` through `resolve_element` and build its
/// path without obstacle avoidance.
///
/// A binding whose target cannot be found falls back to the literal point.
pub fn resolve_endpoints<'a>(
    line: &LineElement,
    resolve_element: impl Fn(&str) -> Option<&'a BoardElement>,
    measure: &dyn MeasureContext,
) -> ResolvedLine {
    resolve_with(line, resolve_element, measure, &[], 0.0)
}

fn resolve_with<'a>(
    line: &LineElement,
    resolve_element: impl Fn(&str) -> Option<&'a BoardElement>,
    measure: &dyn MeasureContext,
    obstacles: &[Obstacle],
    clearance: f64,
) -> ResolvedLine {
    let resolve_end = |end: LineEnd| -> (Point, Option<ResolvedAnchor>) {
        let bound = line.binding(end).and_then(|binding| {
            let target = resolve_element(&binding.element_id)?;
            let point = anchor_point(target, binding.anchor, measure);
            Some(ResolvedAnchor {
                anchor: binding.anchor,
                point,
            })
        });
        match bound {
            Some(anchor) => (anchor.point.point, Some(anchor)),
            None => (line.literal(end), None),
        }
    };
    let (start, start_anchor) = resolve_end(LineEnd::Start);
    let (end, end_anchor) = resolve_end(LineEnd::End);

    let mut resolved = ResolvedLine {
        start,
        end,
        start_anchor,
        end_anchor,
        points: vec![start, end],
        elbow: None,
        curve_control: None,
    };
    match &line.route {
        LineRoute::Straight => {}
        LineRoute::Polyline { points } => {
            resolved.points = std::iter::once(start)
                .chain(points.iter().copied())
                .chain(std::iter::once(end))
                .collect();
        }
        LineRoute::Curve { handle } => {
            let control = curve_control(start, *handle, end);
            resolved.points = sample_quadratic(start, control, end);
            resolved.curve_control = Some(control);
        }
        LineRoute::Orthogonal {
            variant,
            offset,
            auto,
        } => {
            if *auto {
                let (points, elbow) = auto_route(start, end, facing(&resolved), obstacles, clearance);
                resolved.points = points;
                resolved.elbow = Some(elbow);
            } else {
                resolved.points = elbow_points(start, end, *variant, *offset);
                resolved.elbow = Some((*variant, *offset));
            }
        }
    }
    resolved
}

fn facing(resolved: &ResolvedLine) -> (Option<Axis>, Option<Axis>) {
    (
        resolved.start_anchor.and_then(|a| a.facing_axis()),
        resolved.end_anchor.and_then(|a| a.facing_axis()),
    )
}

/// Resolve `line` against `scene`, routing automatic orthogonal connectors
/// around every other shape.
pub fn resolve_line(
    line: &LineElement,
    scene: &Scene,
    measure: &dyn MeasureContext,
    clearance: f64,
) -> ResolvedLine {
    let obstacles = if matches!(line.route, LineRoute::Orthogonal { auto: true, .. }) {
        collect_obstacles(line, scene, measure, clearance)
    } else {
        Vec::new()
    };
    resolve_with(line, |id| scene.get(id), measure, &obstacles, clearance)
}

/// Padded bounds of every shape a connector should avoid.
pub fn collect_obstacles(
    line: &LineElement,
    scene: &Scene,
    measure: &dyn MeasureContext,
    clearance: f64,
) -> Vec<Obstacle> {
    scene
        .ordered()
        .filter(|e| !e.is_line() && !e.is_comment())
        .map(|e| Obstacle {
            id: e.id().to_string(),
            rect: geometry::bounds_of(e, measure).aabb.inflate(clearance, clearance),
            exit_allowed: line.is_bound_to(e.id()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ApproxMeasure, polyline_intersects_rect};
    use crate::shapes::{Binding, ShapeKind};
    use kurbo::{Rect, Vec2};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> BoardElement {
        BoardElement::new_shape(ShapeKind::Rectangle, Rect::new(x, y, x + w, y + h))
    }

    fn connector(a: &BoardElement, b: &BoardElement, route: LineRoute) -> LineElement {
        let mut line = LineElement::new("c".into(), Point::new(-1.0, -1.0), Point::new(-2.0, -2.0));
        line.start_binding = Some(Binding::new(a.id(), Anchor::Right));
        line.end_binding = Some(Binding::new(b.id(), Anchor::Left));
        line.route = route;
        line
    }

    #[test]
    fn test_bound_endpoint_follows_target() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(300.0, 0.0, 100.0, 100.0);
        let line = connector(&a, &b, LineRoute::Straight);
        let mut scene = Scene::from_elements([a.clone(), b.clone(), BoardElement::Line(line.clone())]);

        let before = resolve_line(&line, &scene, &ApproxMeasure, 16.0);
        assert_eq!(before.start, Point::new(100.0, 50.0));
        assert_eq!(before.end, Point::new(300.0, 50.0));

        if let Some(el) = scene.get_mut(a.id()) {
            el.translate(Vec2::new(50.0, 0.0));
        }
        let after = resolve_line(&line, &scene, &ApproxMeasure, 16.0);
        assert_eq!(after.start - before.start, Vec2::new(50.0, 0.0));
        assert_eq!(line.literal(LineEnd::Start), Point::new(-1.0, -1.0));
    }

    #[test]
    fn test_dangling_binding_uses_literal() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(300.0, 0.0, 100.0, 100.0);
        let line = connector(&a, &b, LineRoute::Straight);
        let scene = Scene::from_elements([b.clone()]);
        let resolved = resolve_line(&line, &scene, &ApproxMeasure, 16.0);
        assert_eq!(resolved.start, Point::new(-1.0, -1.0));
        assert!(resolved.start_anchor.is_none());
        assert!(resolved.end_anchor.is_some());
    }

    #[test]
    fn test_auto_route_avoids_obstacle() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(300.0, 0.0, 100.0, 100.0);
        let blocker = rect(175.0, 0.0, 50.0, 100.0);
        let line = connector(&a, &b, LineRoute::auto_orthogonal());
        let scene = Scene::from_elements([
            a.clone(),
            b.clone(),
            blocker.clone(),
            BoardElement::Line(line.clone()),
        ]);

        let resolved = resolve_line(&line, &scene, &ApproxMeasure, 16.0);
        let padded = Rect::new(175.0, 0.0, 225.0, 100.0).inflate(16.0, 16.0);
        assert!(!polyline_intersects_rect(&resolved.points, padded));
        assert_eq!(resolved.points.first(), Some(&Point::new(100.0, 50.0)));
        assert_eq!(resolved.points.last(), Some(&Point::new(300.0, 50.0)));
        for w in resolved.points.windows(2) {
            assert!(w[0].x == w[1].x || w[0].y == w[1].y, "non-orthogonal segment {w:?}");
        }
    }

    #[test]
    fn test_obstacles_only_come_from_the_scene() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(300.0, 0.0, 100.0, 100.0);
        let blocker = rect(175.0, 0.0, 50.0, 100.0);
        let line = connector(&a, &b, LineRoute::auto_orthogonal());
        let scene = Scene::from_elements([a.clone(), b.clone(), blocker]);

        let bare = resolve_endpoints(&line, |id| scene.get(id), &ApproxMeasure);
        assert_eq!(bare.points, vec![Point::new(100.0, 50.0), Point::new(300.0, 50.0)]);

        let routed = resolve_line(&line, &scene, &ApproxMeasure, 16.0);
        let obstacles = collect_obstacles(&line, &scene, &ApproxMeasure, 16.0);
        let (points, elbow) = auto_route(routed.start, routed.end, facing(&routed), &obstacles, 16.0);
        assert_eq!(routed.points, points);
        assert_eq!(routed.elbow, Some(elbow));
        assert_ne!(routed.points, bare.points);
    }

    #[test]
    fn test_manual_elbow_used_verbatim() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(300.0, 200.0, 100.0, 100.0);
        let line = connector(
            &a,
            &b,
            LineRoute::Orthogonal {
                variant: ElbowVariant::Hvh,
                offset: 150.0,
                auto: false,
            },
        );
        let scene = Scene::from_elements([a.clone(), b.clone()]);
        let resolved = resolve_line(&line, &scene, &ApproxMeasure, 16.0);
        assert_eq!(
            resolved.points,
            vec![
                Point::new(100.0, 50.0),
                Point::new(150.0, 50.0),
                Point::new(150.0, 250.0),
                Point::new(300.0, 250.0),
            ]
        );
        assert_eq!(
            resolved.elbow_segment(),
            Some((Point::new(150.0, 50.0), Point::new(150.0, 250.0)))
        );
    }

    #[test]
    fn test_curve_passes_through_handle() {
        let mut line = LineElement::new("c".into(), Point::new(0.0, 0.0), Point::new(200.0, 0.0));
        line.route = LineRoute::Curve {
            handle: Point::new(100.0, 80.0),
        };
        let resolved = resolve_endpoints(&line, |_| None, &ApproxMeasure);
        assert_eq!(resolved.curve_control, Some(Point::new(100.0, 160.0)));
        let dist = geometry::point_to_polyline_dist(Point::new(100.0, 80.0), &resolved.points);
        assert!(dist < 1.5, "handle is {dist} away from the sampled curve");
    }

    #[test]
    fn test_polyline_keeps_bend_points() {
        let mut line = LineElement::new("p".into(), Point::new(0.0, 0.0), Point::new(100.0, 0.0));
        line.route = LineRoute::Polyline {
            points: vec![Point::new(50.0, 40.0)],
        };
        let resolved = resolve_endpoints(&line, |_| None, &ApproxMeasure);
        assert_eq!(resolved.points.len(), 3);
        assert_eq!(resolved.points[1], Point::new(50.0, 40.0));
    }
}

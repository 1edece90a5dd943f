//! Orthogonal (elbow) connector routing.

use crate::geometry::polyline_intersects_rect;
use crate::shapes::{Axis, ElbowVariant, ElementId};
use kurbo::{Point, Rect};
use std::cmp::Ordering;

const EPSILON: f64 = 1e-6;

/// A padded element a connector should route around.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: ElementId,
    pub rect: Rect,
    /// The connector is bound to this element, so segments leaving an
    /// endpoint that sits inside it do not count as crossings.
    pub exit_allowed: bool,
}

/// Quality of a candidate route. Lower is better, compared field by field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteScore {
    pub intersections: usize,
    pub proximity: f64,
    pub length: f64,
}

impl RouteScore {
    fn cmp_fuzzy(&self, other: &Self) -> Ordering {
        let fuzzy = |a: f64, b: f64| {
            if (a - b).abs() <= EPSILON {
                Ordering::Equal
            } else {
                a.total_cmp(&b)
            }
        };
        self.intersections
            .cmp(&other.intersections)
            .then_with(|| fuzzy(self.proximity, other.proximity))
            .then_with(|| fuzzy(self.length, other.length))
    }

    pub fn is_better_than(&self, other: &Self) -> bool {
        self.cmp_fuzzy(other) == Ordering::Less
    }
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

fn same_point(a: Point, b: Point) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y)
}

/// Path of a two-bend route.
///
/// Repeated points and collinear bends are removed, so a route whose offset
/// lines up with an endpoint has fewer than four points.
pub fn elbow_points(start: Point, end: Point, variant: ElbowVariant, offset: f64) -> Vec<Point> {
    let raw = match variant {
        ElbowVariant::Hvh => [start, Point::new(offset, start.y), Point::new(offset, end.y), end],
        ElbowVariant::Vhv => [start, Point::new(start.x, offset), Point::new(end.x, offset), end],
    };
    simplify(&raw)
}

fn simplify(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().is_some_and(|last| same_point(*last, p)) {
            continue;
        }
        if out.len() >= 2 {
            let (a, b) = (out[out.len() - 2], out[out.len() - 1]);
            let collinear = (approx(a.x, b.x) && approx(b.x, p.x)) || (approx(a.y, b.y) && approx(b.y, p.y));
            if collinear {
                out.pop();
            }
        }
        out.push(p);
    }
    if out.len() == 1 {
        // Zero-length connector still draws as a segment.
        out.push(out[0]);
    }
    out
}

/// Whether segment a→b passes through the interior of `rect`.
fn segment_crosses(a: Point, b: Point, rect: Rect) -> bool {
    if approx(a.y, b.y) {
        a.y > rect.y0 && a.y < rect.y1 && a.x.max(b.x) > rect.x0 && a.x.min(b.x) < rect.x1
    } else if approx(a.x, b.x) {
        a.x > rect.x0 && a.x < rect.x1 && a.y.max(b.y) > rect.y0 && a.y.min(b.y) < rect.y1
    } else {
        polyline_intersects_rect(&[a, b], rect)
    }
}

fn segment_gap(a: Point, b: Point, rect: Rect) -> f64 {
    let dx = (rect.x0 - a.x.max(b.x)).max(a.x.min(b.x) - rect.x1).max(0.0);
    let dy = (rect.y0 - a.y.max(b.y)).max(a.y.min(b.y) - rect.y1).max(0.0);
    dx.hypot(dy)
}

/// Score `points` against `obstacles`.
///
/// A segment touching `start` (or `end`) is exempt from an exit-allowed
/// obstacle when that endpoint lies inside it.
pub fn score_route(
    points: &[Point],
    start: Point,
    end: Point,
    obstacles: &[Obstacle],
    clearance: f64,
) -> RouteScore {
    let mut score = RouteScore {
        intersections: 0,
        proximity: 0.0,
        length: 0.0,
    };
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        score.length += (b.x - a.x).abs() + (b.y - a.y).abs();
        let touches_start = same_point(a, start) || same_point(b, start);
        let touches_end = same_point(a, end) || same_point(b, end);
        for obstacle in obstacles {
            if obstacle.exit_allowed
                && ((touches_start && obstacle.rect.contains(start))
                    || (touches_end && obstacle.rect.contains(end)))
            {
                continue;
            }
            if segment_crosses(a, b, obstacle.rect) {
                score.intersections += 1;
            } else {
                let gap = segment_gap(a, b, obstacle.rect);
                if gap < clearance {
                    score.proximity += clearance - gap;
                }
            }
        }
    }
    score
}

/// Synthesize an orthogonal route from `start` to `end`.
///
/// `facing` is the axis each endpoint's anchor faces, if bound. Returns the
/// path and the `(variant, offset)` that produced it.
pub fn auto_route(
    start: Point,
    end: Point,
    facing: (Option<Axis>, Option<Axis>),
    obstacles: &[Obstacle],
    clearance: f64,
) -> (Vec<Point>, (ElbowVariant, f64)) {
    let mid = start.midpoint(end);
    let score = |points: &[Point]| score_route(points, start, end, obstacles, clearance);
    let best_of = |candidates: Vec<(ElbowVariant, f64)>| {
        let mut best: Option<(Vec<Point>, (ElbowVariant, f64), RouteScore)> = None;
        for (variant, offset) in candidates {
            let points = elbow_points(start, end, variant, offset);
            let s = score(&points);
            if best.as_ref().is_none_or(|(_, _, b)| s.is_better_than(b)) {
                best = Some((points, (variant, offset), s));
            }
        }
        best.map(|(points, elbow, _)| (points, elbow))
    };

    if approx(start.x, end.x) || approx(start.y, end.y) {
        let elbow = if approx(start.y, end.y) {
            (ElbowVariant::Hvh, mid.x)
        } else {
            (ElbowVariant::Vhv, mid.y)
        };
        let points = elbow_points(start, end, elbow.0, elbow.1);
        if score(&points).intersections == 0 {
            return (points, elbow);
        }
    }

    let horizontal_first = facing.0 != Some(Axis::Vertical);
    let candidates = match facing {
        (Some(a), Some(b)) if a != b => {
            let h_then_v = (ElbowVariant::Hvh, end.x);
            let v_then_h = (ElbowVariant::Vhv, end.y);
            if horizontal_first {
                vec![h_then_v, v_then_h]
            } else {
                vec![v_then_h, h_then_v]
            }
        }
        _ => {
            let offsets = |variant: ElbowVariant| -> Vec<(ElbowVariant, f64)> {
                let pick = |p: Point| match variant {
                    ElbowVariant::Hvh => p.x,
                    ElbowVariant::Vhv => p.y,
                };
                let mut values = vec![pick(mid), pick(start), pick(end)];
                for obstacle in obstacles {
                    let (lo, hi) = match variant {
                        ElbowVariant::Hvh => (obstacle.rect.x0, obstacle.rect.x1),
                        ElbowVariant::Vhv => (obstacle.rect.y0, obstacle.rect.y1),
                    };
                    values.extend([lo - 1.0, lo + 1.0, hi - 1.0, hi + 1.0]);
                }
                values.into_iter().map(|v| (variant, v)).collect()
            };
            let (first, second) = if horizontal_first {
                (ElbowVariant::Hvh, ElbowVariant::Vhv)
            } else {
                (ElbowVariant::Vhv, ElbowVariant::Hvh)
            };
            let mut all = offsets(first);
            all.extend(offsets(second));
            all
        }
    };

    best_of(candidates).unwrap_or_else(|| {
        let elbow = (ElbowVariant::Hvh, mid.x);
        (elbow_points(start, end, elbow.0, elbow.1), elbow)
    })
}

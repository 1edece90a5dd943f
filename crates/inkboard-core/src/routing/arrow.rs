//! Arrowheads and path trimming.

use super::ResolvedLine;
use crate::shapes::{Anchor, LineElement, LineEnd};
use kurbo::{Point, Vec2};

/// Share of the path length all arrowheads together may cover.
const MAX_ARROW_SHARE: f64 = 0.8;

/// Filled triangle drawn at an arrowed end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowHead {
    pub tip: Point,
    pub left: Point,
    pub right: Point,
}

/// Path ready to stroke plus its arrowheads.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedPath {
    pub points: Vec<Point>,
    pub heads: Vec<ArrowHead>,
    pub arrow_length: f64,
}

pub fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).hypot()).sum()
}

/// Arrowhead length for a stroke width, limited so that `arrowed_ends`
/// heads never cover more than 80% of the path.
pub fn arrow_length(stroke_width: f64, path_len: f64, arrowed_ends: usize, min: f64, max: f64) -> f64 {
    if arrowed_ends == 0 {
        return 0.0;
    }
    let base = (stroke_width * 4.0).clamp(min, max);
    base.min(MAX_ARROW_SHARE * path_len / arrowed_ends as f64).max(0.0)
}

/// Trim the path under each arrowhead and build the heads.
pub fn decorate(line: &LineElement, resolved: &ResolvedLine, min: f64, max: f64) -> DecoratedPath {
    let mut points = resolved.points.clone();
    let ends: Vec<LineEnd> = [LineEnd::Start, LineEnd::End]
        .into_iter()
        .filter(|end| line.has_arrow(*end))
        .collect();
    let length = arrow_length(line.stroke_width, path_length(&points), ends.len(), min, max);
    if length <= 0.0 || points.len() < 2 {
        return DecoratedPath {
            points,
            heads: Vec::new(),
            arrow_length: 0.0,
        };
    }

    let mut heads = Vec::with_capacity(ends.len());
    for end in ends {
        let tip = match end {
            LineEnd::Start => points[0],
            LineEnd::End => points[points.len() - 1],
        };
        let Some(dir) = head_direction(resolved, &points, end) else {
            continue;
        };
        heads.push(head_at(tip, dir, length));
    }
    if line.has_arrow(LineEnd::End) {
        trim_end(&mut points, length);
    }
    if line.has_arrow(LineEnd::Start) {
        points.reverse();
        trim_end(&mut points, length);
        points.reverse();
    }
    DecoratedPath {
        points,
        heads,
        arrow_length: length,
    }
}

/// Unit direction of travel into the tip at `end`.
fn head_direction(resolved: &ResolvedLine, points: &[Point], end: LineEnd) -> Option<Vec2> {
    let outward = resolved
        .anchor(end)
        .filter(|a| a.anchor != Anchor::Center)
        .and_then(|a| a.point.outward());
    if let Some(out) = outward {
        return Some(-out);
    }
    let (tip, rest): (Point, Box<dyn Iterator<Item = &Point>>) = match end {
        LineEnd::Start => (points[0], Box::new(points.iter().skip(1))),
        LineEnd::End => (points[points.len() - 1], Box::new(points.iter().rev().skip(1))),
    };
    rest.map(|p| tip - *p)
        .find(|v| v.hypot() > 1e-9)
        .map(|v| v / v.hypot())
}

fn head_at(tip: Point, dir: Vec2, length: f64) -> ArrowHead {
    let back = tip - dir * length;
    let perp = Vec2::new(-dir.y, dir.x) * (length * 0.5);
    ArrowHead {
        tip,
        left: back + perp,
        right: back - perp,
    }
}

/// Remove `length` of path from the end, keeping at least two points.
fn trim_end(points: &mut Vec<Point>, length: f64) {
    let mut remaining = length;
    while points.len() >= 2 && remaining > 0.0 {
        let last = points[points.len() - 1];
        let prev = points[points.len() - 2];
        let seg = (last - prev).hypot();
        if seg > remaining {
            let t = remaining / seg;
            let n = points.len();
            points[n - 1] = last.lerp(prev, t);
            return;
        }
        remaining -= seg;
        points.pop();
    }
    if points.len() == 1 {
        points.push(points[0]);
    }
}

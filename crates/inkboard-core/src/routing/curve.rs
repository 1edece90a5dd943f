//! Quadratic curve connectors.

use kurbo::{ParamCurve, Point, QuadBez};

/// Board distance covered by one sampled segment.
const SEGMENT_LENGTH: f64 = 24.0;
const MIN_SEGMENTS: usize = 8;
const MAX_SEGMENTS: usize = 32;

/// Control point of the quadratic that passes through `handle` at t = 0.5.
pub fn curve_control(start: Point, handle: Point, end: Point) -> Point {
    let mid = start.midpoint(end);
    Point::new(2.0 * handle.x - mid.x, 2.0 * handle.y - mid.y)
}

/// Number of polyline segments used to draw a curve between two endpoints.
pub fn curve_segments(start: Point, end: Point) -> usize {
    let n = ((end - start).hypot() / SEGMENT_LENGTH).ceil() as usize;
    n.clamp(MIN_SEGMENTS, MAX_SEGMENTS)
}

/// Sample the quadratic `start, control, end` into a polyline.
pub fn sample_quadratic(start: Point, control: Point, end: Point) -> Vec<Point> {
    let quad = QuadBez::new(start, control, end);
    let n = curve_segments(start, end);
    (0..=n).map(|i| quad.eval(i as f64 / n as f64)).collect()
}

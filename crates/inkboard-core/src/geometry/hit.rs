//! Point-in-element tests.

use super::{MeasureContext, bounds_of, point_to_polyline_dist, triangle_vertices};
use crate::camera::Camera;
use crate::shapes::{BoardElement, COMMENT_RADIUS, ElementId, FrameElement, LineElement};
use kurbo::{Point, Rect};

/// Screen font size of frame title labels.
const FRAME_LABEL_FONT_PX: f64 = 12.0;
const FRAME_LABEL_PADDING_PX: f64 = 8.0;

/// Inputs shared by every hit test of one pointer event.
pub struct HitContext<'a> {
    pub camera: &'a Camera,
    pub line_tolerance_px: f64,
    pub frame_label_height_px: f64,
    pub measure: &'a dyn MeasureContext,
    /// Resolved path of a line (bindings and routing applied).
    pub line_path: &'a dyn Fn(&LineElement) -> Vec<Point>,
}

/// Title label of a frame, in screen coordinates, sitting on its top edge.
pub fn frame_label_rect(
    frame: &FrameElement,
    camera: &Camera,
    label_height_px: f64,
    measure: &dyn MeasureContext,
) -> Rect {
    let origin = camera.board_to_screen(Point::new(frame.x, frame.y));
    let width = measure.text_width(&frame.title, FRAME_LABEL_FONT_PX) + FRAME_LABEL_PADDING_PX * 2.0;
    Rect::new(origin.x, origin.y - label_height_px, origin.x + width, origin.y)
}

/// Whether `point` (board space) hits `element`.
pub fn element_contains_point(element: &BoardElement, point: Point, ctx: &HitContext<'_>) -> bool {
    match element {
        BoardElement::Line(line) => {
            let path = (ctx.line_path)(line);
            let tolerance = ctx.camera.px_to_board(ctx.line_tolerance_px) + line.stroke_width / 2.0;
            point_to_polyline_dist(point, &path) <= tolerance
        }
        BoardElement::Comment(comment) => {
            (point - Point::new(comment.x, comment.y)).hypot() <= COMMENT_RADIUS
        }
        BoardElement::Ellipse(_) => {
            let bounds = bounds_of(element, ctx.measure);
            let (rx, ry) = (bounds.width / 2.0, bounds.height / 2.0);
            if rx <= 0.0 || ry <= 0.0 {
                return false;
            }
            let local = bounds.to_local(point);
            (local.x / rx).powi(2) + (local.y / ry).powi(2) <= 1.0
        }
        BoardElement::Diamond(_) => {
            let bounds = bounds_of(element, ctx.measure);
            let (hw, hh) = (bounds.width / 2.0, bounds.height / 2.0);
            if hw <= 0.0 || hh <= 0.0 {
                return false;
            }
            let local = bounds.to_local(point);
            local.x.abs() / hw + local.y.abs() / hh <= 1.0
        }
        BoardElement::Triangle(_) => {
            let bounds = bounds_of(element, ctx.measure);
            let [a, b, c] = triangle_vertices(&bounds);
            let total = triangle_area(a, b, c);
            let sum = triangle_area(point, b, c) + triangle_area(a, point, c) + triangle_area(a, b, point);
            (sum - total).abs() <= total.max(1.0) * 1e-9
        }
        _ => bounds_of(element, ctx.measure).contains(point),
    }
}

fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    ((b - a).cross(c - a) / 2.0).abs()
}

/// Topmost element under `point`.
///
/// `ordered` is back to front. Non-frames are tested first so a shape inside
/// a frame wins over the frame itself; frames also hit on their title label.
pub fn hit_test(ordered: &[&BoardElement], point: Point, ctx: &HitContext<'_>) -> Option<ElementId> {
    let found = ordered
        .iter()
        .rev()
        .filter(|e| !e.is_frame())
        .find(|e| element_contains_point(e, point, ctx));
    if let Some(element) = found {
        return Some(element.id().to_string());
    }

    let screen = ctx.camera.board_to_screen(point);
    ordered
        .iter()
        .rev()
        .find(|e| match e {
            BoardElement::Frame(frame) => {
                element_contains_point(e, point, ctx)
                    || frame_label_rect(frame, ctx.camera, ctx.frame_label_height_px, ctx.measure)
                        .contains(screen)
            }
            _ => false,
        })
        .map(|e| e.id().to_string())
}

//! Rotate, scale and resize, always relative to the start-of-gesture state.

use crate::geometry::{MeasureContext, TransformBounds, text_box};
use crate::selection::{Corner, Edge, HandleKind};
use crate::shapes::{BoardElement, TEXT_MIN_WRAP, TextElement};
use kurbo::{Point, Rect, Size, Vec2};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Apply a transform handle drag to `original`.
///
/// `start` is the element's bounds when the gesture began; it is never
/// updated mid-gesture.
pub fn apply_transform(
    original: &BoardElement,
    start: &TransformBounds,
    handle: HandleKind,
    pointer: Point,
    measure: &dyn MeasureContext,
    snap_epsilon: f64,
) -> BoardElement {
    let mut element = original.clone();
    match (handle, &mut element) {
        (HandleKind::Rotate, el) => {
            let v = pointer - start.center;
            // Handle sits above the top edge, so straight up is zero
            let angle = v.y.atan2(v.x) + FRAC_PI_2;
            el.set_rotation(snap_rotation(angle, snap_epsilon));
        }
        (HandleKind::Corner(corner), BoardElement::Text(text)) => {
            scale_text_free(text, start, corner, pointer);
        }
        (HandleKind::Corner(corner), el) => {
            let min = el.shape_kind().map(|k| k.min_size()).unwrap_or(Size::ZERO);
            let (center, size) = scale_uniform(start, corner, pointer, min);
            el.set_rect(Rect::from_center_size(center, size));
        }
        (HandleKind::Edge(edge), BoardElement::Text(text)) => {
            set_text_wrap(text, start, edge, pointer, measure);
        }
        (HandleKind::Edge(edge), el) => {
            let min = el.shape_kind().map(|k| k.min_size()).unwrap_or(Size::ZERO);
            let (center, size) = resize_edge(start, edge, pointer, min);
            el.set_rect(Rect::from_center_size(center, size));
        }
        _ => {}
    }
    element
}

/// Normalize to `[0, 2π)` and snap to the nearest quarter turn within `epsilon`.
pub fn snap_rotation(angle: f64, epsilon: f64) -> f64 {
    let angle = angle.rem_euclid(TAU);
    let quarter = (angle / FRAC_PI_2).round() * FRAC_PI_2;
    if (angle - quarter).abs() <= epsilon {
        quarter.rem_euclid(TAU)
    } else {
        angle
    }
}

/// Position of the corner opposite `corner` in the local frame.
fn opposite_local(start: &TransformBounds, corner: Corner) -> Vec2 {
    let s = corner.opposite().signs();
    Vec2::new(s.x * start.width / 2.0, s.y * start.height / 2.0)
}

/// Uniform scale about the opposite corner, by projecting the pointer onto
/// the box diagonal. Returns the new center and size.
fn scale_uniform(start: &TransformBounds, corner: Corner, pointer: Point, min: Size) -> (Point, Size) {
    let (w, h) = (start.width.max(1e-9), start.height.max(1e-9));
    let signs = corner.signs();
    let anchor = opposite_local(start, corner);
    let diagonal = Vec2::new(signs.x * w, signs.y * h);
    let v = start.to_local(pointer) - anchor;
    let min_scale = (min.width / w).max(min.height / h);
    let scale = (v.dot(diagonal) / diagonal.hypot2()).max(min_scale);
    let size = Size::new(w * scale, h * scale);
    let center_local = anchor + Vec2::new(signs.x * size.width / 2.0, signs.y * size.height / 2.0);
    (start.from_local(center_local), size)
}

/// Single-axis resize with the opposite edge fixed.
fn resize_edge(start: &TransformBounds, edge: Edge, pointer: Point, min: Size) -> (Point, Size) {
    let n = edge.normal();
    let local = start.to_local(pointer);
    let (hw, hh) = (start.width / 2.0, start.height / 2.0);
    if edge.is_horizontal_resize() {
        let anchor = -n.x * hw;
        let width = ((local.x - anchor) * n.x).max(min.width);
        let center = Vec2::new(anchor + n.x * width / 2.0, 0.0);
        (start.from_local(center), Size::new(width, start.height))
    } else {
        let anchor = -n.y * hh;
        let height = ((local.y - anchor) * n.y).max(min.height);
        let center = Vec2::new(0.0, anchor + n.y * height / 2.0);
        (start.from_local(center), Size::new(start.width, height))
    }
}

/// Free two-axis stretch of a text block from a corner.
fn scale_text_free(text: &mut TextElement, start: &TransformBounds, corner: Corner, pointer: Point) {
    let signs = corner.signs();
    let anchor = opposite_local(start, corner);
    let v = start.to_local(pointer) - anchor;
    let width = (v.x * signs.x).max(1.0);
    let height = (v.y * signs.y).max(1.0);
    if start.width > 0.0 {
        text.scale_x *= width / start.width;
    }
    if start.height > 0.0 {
        text.scale_y *= height / start.height;
    }
    let center = start.from_local(anchor + Vec2::new(signs.x * width / 2.0, signs.y * height / 2.0));
    text.x = center.x - width / 2.0;
    text.y = center.y - height / 2.0;
}

/// Left/right edges of a text block set its wrap width; the height follows
/// from the new layout with the top edge fixed.
fn set_text_wrap(
    text: &mut TextElement,
    start: &TransformBounds,
    edge: Edge,
    pointer: Point,
    measure: &dyn MeasureContext,
) {
    if !edge.is_horizontal_resize() {
        return;
    }
    let n = edge.normal();
    let anchor = -n.x * start.width / 2.0;
    let min_width = TEXT_MIN_WRAP * text.scale_x;
    let width = ((start.to_local(pointer).x - anchor) * n.x).max(min_width);
    text.wrap_width = Some(width / text.scale_x.max(1e-9));
    let (rect, _) = text_box(text, measure);
    let height = rect.height();
    let center_local = Vec2::new(anchor + n.x * rect.width() / 2.0, -start.height / 2.0 + height / 2.0);
    let center = start.from_local(center_local);
    text.x = center.x - rect.width() / 2.0;
    text.y = center.y - height / 2.0;
}

/// Axis-aligned frame resize with the corner opposite `corner` fixed.
pub fn resize_frame(start: Rect, corner: Corner, pointer: Point, min: Size) -> Rect {
    let fixed = match corner.opposite() {
        Corner::TopLeft => Point::new(start.x0, start.y0),
        Corner::TopRight => Point::new(start.x1, start.y0),
        Corner::BottomRight => Point::new(start.x1, start.y1),
        Corner::BottomLeft => Point::new(start.x0, start.y1),
    };
    let width = (pointer.x - fixed.x).abs().max(min.width);
    let height = (pointer.y - fixed.y).abs().max(min.height);
    let x0 = if pointer.x < fixed.x { fixed.x - width } else { fixed.x };
    let y0 = if pointer.y < fixed.y { fixed.y - height } else { fixed.y };
    Rect::new(x0, y0, x0 + width, y0 + height)
}

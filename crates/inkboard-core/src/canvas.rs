//! The scene: all elements of a board and their stacking order.

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::geometry::{self, HitContext, MeasureContext, polyline_intersects_rect};
use crate::routing::{self, ResolvedLine};
use crate::shapes::{BoardElement, ElementId, LineElement};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What geometry queries over the scene need besides the elements.
#[derive(Clone, Copy)]
pub struct LayoutContext<'a> {
    pub measure: &'a dyn MeasureContext,
    /// Obstacle padding for automatically routed connectors.
    pub route_clearance: f64,
}

/// Elements keyed by id plus their z-order (back to front).
///
/// Cloning a scene is the undo snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    elements: HashMap<ElementId, BoardElement>,
    z_order: Vec<ElementId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a scene from elements given back to front.
    pub fn from_elements(elements: impl IntoIterator<Item = BoardElement>) -> Self {
        let mut scene = Self::new();
        for element in elements {
            scene.upsert(element);
        }
        scene
    }

    /// Insert or replace an element. New elements go on top; replaced ones
    /// keep their stacking position.
    pub fn upsert(&mut self, element: BoardElement) {
        let id = element.id().to_string();
        if !self.elements.contains_key(&id) {
            self.z_order.push(id.clone());
        }
        self.elements.insert(id, element);
    }

    pub fn remove(&mut self, id: &str) -> Option<BoardElement> {
        let removed = self.elements.remove(id);
        if removed.is_some() {
            self.z_order.retain(|z| z != id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.z_order.clear();
    }

    pub fn get(&self, id: &str) -> Option<&BoardElement> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut BoardElement> {
        self.elements.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.elements.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Ids back to front.
    pub fn z_order(&self) -> &[ElementId] {
        &self.z_order
    }

    /// Elements back to front.
    pub fn ordered(&self) -> impl DoubleEndedIterator<Item = &BoardElement> {
        self.z_order.iter().filter_map(|id| self.elements.get(id))
    }

    pub fn bring_to_front(&mut self, id: &str) {
        if let Some(pos) = self.z_order.iter().position(|z| z == id) {
            let id = self.z_order.remove(pos);
            self.z_order.push(id);
        }
    }

    pub fn send_to_back(&mut self, id: &str) {
        if let Some(pos) = self.z_order.iter().position(|z| z == id) {
            let id = self.z_order.remove(pos);
            self.z_order.insert(0, id);
        }
    }

    /// Connectors with an endpoint bound to `id`.
    pub fn lines_bound_to(&self, id: &str) -> Vec<ElementId> {
        self.ordered()
            .filter_map(BoardElement::as_line)
            .filter(|line| line.is_bound_to(id))
            .map(|line| line.id.clone())
            .collect()
    }

    /// Bindings, routing and sampling applied to a line.
    pub fn resolve_line(&self, line: &LineElement, ctx: LayoutContext<'_>) -> ResolvedLine {
        routing::resolve_line(line, self, ctx.measure, ctx.route_clearance)
    }

    /// Axis-aligned bounds as drawn (lines use their resolved path).
    pub fn element_aabb(&self, element: &BoardElement, ctx: LayoutContext<'_>) -> Rect {
        match element {
            BoardElement::Line(line) => geometry::points_aabb(&self.resolve_line(line, ctx).points),
            _ => geometry::bounds_of(element, ctx.measure).aabb,
        }
    }

    /// Union of every element's bounds.
    pub fn content_bounds(&self, ctx: LayoutContext<'_>) -> Option<Rect> {
        self.ordered()
            .map(|e| self.element_aabb(e, ctx))
            .reduce(|a, b| a.union(b))
    }

    /// Elements whose bounds intersect `rect` (touching counts), back to front.
    /// Lines must have a path segment inside or crossing the rectangle.
    pub fn elements_in_rect(&self, rect: Rect, ctx: LayoutContext<'_>) -> Vec<ElementId> {
        let rect = rect.abs();
        self.ordered()
            .filter(|e| match e {
                BoardElement::Line(line) => {
                    polyline_intersects_rect(&self.resolve_line(line, ctx).points, rect)
                }
                _ => rects_overlap(rect, geometry::bounds_of(e, ctx.measure).aabb),
            })
            .map(|e| e.id().to_string())
            .collect()
    }

    /// Topmost element under `point` (board space), skipping `exclude`.
    pub fn hit_test(
        &self,
        point: Point,
        camera: &Camera,
        config: &EngineConfig,
        measure: &dyn MeasureContext,
        exclude: Option<&str>,
    ) -> Option<ElementId> {
        let ctx = LayoutContext {
            measure,
            route_clearance: config.route_clearance,
        };
        let line_path = |line: &LineElement| self.resolve_line(line, ctx).points;
        let hit = HitContext {
            camera,
            line_tolerance_px: config.line_hit_tolerance_px,
            frame_label_height_px: config.frame_label_height_px,
            measure,
            line_path: &line_path,
        };
        let ordered: Vec<&BoardElement> = self.ordered().filter(|e| Some(e.id()) != exclude).collect();
        geometry::hit_test(&ordered, point, &hit)
    }

    /// Elements lying fully inside frame `frame_id`, computed from current bounds.
    pub fn frame_members(&self, frame_id: &str, ctx: LayoutContext<'_>) -> Vec<ElementId> {
        let Some(frame_rect) = self.get(frame_id).filter(|e| e.is_frame()).and_then(BoardElement::rect)
        else {
            return Vec::new();
        };
        self.ordered()
            .filter(|e| e.id() != frame_id)
            .filter(|e| rect_contains_rect(frame_rect, self.element_aabb(e, ctx)))
            .map(|e| e.id().to_string())
            .collect()
    }
}

/// Closed-interval overlap test.
pub fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

pub fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

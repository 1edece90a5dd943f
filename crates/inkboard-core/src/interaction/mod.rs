//! Pointer gestures: select, drag, marquee, create, transform and connector editing.
//!
//! Each gesture snapshots the scene when it starts. Pointer moves always
//! recompute from that start state, so there is no drift across moves.

mod editing;
mod line_edit;
mod transform;

pub use editing::{EditOutcome, EditingState};
pub use line_edit::{bend, drag_segment, move_endpoint};
pub use transform::{apply_transform, resize_frame, snap_rotation};

use crate::camera::Camera;
use crate::canvas::{LayoutContext, Scene};
use crate::config::EngineConfig;
use crate::geometry::{MeasureContext, TransformBounds, bounds_of};
use crate::input::{MouseButton, PointerInput};
use crate::routing::{AnchorSnap, snap_to_anchor};
use crate::selection::{
    Corner, HandleKind, Selection, frame_resize_handles, hit_test_handles, line_handles, transform_handles,
};
use crate::shapes::{
    BoardElement, CommentElement, ElbowVariant, ElementId, FRAME_MIN_HEIGHT, FRAME_MIN_WIDTH, LineElement, LineEnd,
    ShapeKind, TEXT_MIN_WRAP, new_element_id,
};
use crate::tools::ToolKind;
use kurbo::{Point, Rect, Size};

/// Everything a gesture reads or mutates.
pub struct GestureContext<'a> {
    pub scene: &'a mut Scene,
    pub selection: &'a mut Selection,
    pub camera: &'a mut Camera,
    pub tool: ToolKind,
    pub config: &'a EngineConfig,
    pub measure: &'a dyn MeasureContext,
}

impl<'a> GestureContext<'a> {
    fn layout(&self) -> LayoutContext<'a> {
        LayoutContext {
            measure: self.measure,
            route_clearance: self.config.route_clearance,
        }
    }

    fn to_board(&self, screen: Point) -> Point {
        self.camera.screen_to_board(screen)
    }

    /// Screen pixels to board units at the current zoom.
    fn px(&self, px: f64) -> f64 {
        self.camera.px_to_board(px)
    }

    fn hit(&self, point: Point, exclude: Option<&str>) -> Option<ElementId> {
        self.scene
            .hit_test(point, self.camera, self.config, self.measure, exclude)
    }

    /// Anchor snap for a connector endpoint at `point`, ignoring `exclude`.
    fn snap(&self, point: Point, exclude: Option<&str>) -> Option<AnchorSnap> {
        let under = self.hit(point, exclude);
        let under = under.as_deref().and_then(|id| self.scene.get(id));
        let candidates = self.scene.ordered().filter(|e| Some(e.id()) != exclude);
        snap_to_anchor(
            candidates,
            point,
            self.px(self.config.snap_distance_px),
            self.measure,
            under,
        )
    }
}

/// What the owner of the scene has to do after a pointer event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    SelectionChanged,
    /// Elements changed mid-gesture; broadcast them (throttled).
    Live(Vec<ElementId>),
    /// The gesture finished with changes. `before` is the undo snapshot.
    Commit {
        before: Scene,
        /// Element to open for text editing right away.
        edit: Option<ElementId>,
    },
    /// A cancelled gesture restored these elements.
    Rollback(Vec<ElementId>),
}

/// An endpoint of a dragged connector that was bound to something staying put.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedEnd {
    pub line_id: ElementId,
    pub end: LineEnd,
    /// Resolved position when the drag started.
    pub start: Point,
}

/// Current gesture.
#[derive(Debug, Clone, Default)]
pub enum InteractionMode {
    #[default]
    None,
    Pan {
        last_screen: Point,
    },
    /// Pressed on empty canvas, not yet far enough to count as a marquee.
    MarqueeCandidate {
        origin: Point,
        origin_screen: Point,
        additive: bool,
    },
    Marquee {
        origin: Point,
        current: Point,
        additive: bool,
    },
    Drag {
        origin: Point,
        originals: Vec<BoardElement>,
        detached: Vec<DetachedEnd>,
        before: Scene,
        moved: bool,
    },
    Resize {
        id: ElementId,
        corner: Corner,
        start: Rect,
        before: Scene,
    },
    Transform {
        id: ElementId,
        handle: HandleKind,
        start: TransformBounds,
        original: BoardElement,
        before: Scene,
    },
    ShapeCreate {
        id: ElementId,
        kind: ShapeKind,
        origin: Point,
        origin_screen: Point,
        before: Scene,
    },
    LineCreate {
        id: ElementId,
        origin_screen: Point,
        before: Scene,
    },
    LineHandle {
        id: ElementId,
        end: LineEnd,
        original: LineElement,
        before: Scene,
    },
    LineBend {
        id: ElementId,
        handle: HandleKind,
        original: LineElement,
        before: Scene,
    },
    LineSegment {
        id: ElementId,
        variant: ElbowVariant,
        original: LineElement,
        before: Scene,
    },
}

/// Pointer gesture state machine.
#[derive(Debug, Clone, Default)]
pub struct Interaction {
    mode: InteractionMode,
}

impl Interaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.mode, InteractionMode::None)
    }

    /// Marquee rectangle in board space, while one is being dragged.
    pub fn marquee_rect(&self) -> Option<Rect> {
        match &self.mode {
            InteractionMode::Marquee { origin, current, .. } => Some(Rect::from_points(*origin, *current)),
            _ => None,
        }
    }

    pub fn pointer_down(&mut self, ctx: &mut GestureContext<'_>, input: &PointerInput, space_held: bool) -> Effect {
        if self.is_active() {
            return Effect::None;
        }
        let screen = input.position;
        if input.button == MouseButton::Middle || space_held || ctx.tool == ToolKind::Pan {
            self.mode = InteractionMode::Pan { last_screen: screen };
            return Effect::None;
        }
        if input.button != MouseButton::Left {
            return Effect::None;
        }
        let point = ctx.to_board(screen);

        if ctx.tool.is_line_tool() {
            if let Some(snap) = ctx.snap(point, None) {
                return self.begin_line_create(ctx, point, Some(snap), screen);
            }
        }
        if ctx.tool == ToolKind::Comment {
            return place_comment(ctx, point);
        }
        if let Some(effect) = self.try_handles(ctx, point) {
            return effect;
        }
        if let Some(id) = ctx.hit(point, None) {
            return self.begin_drag(ctx, id, point, input.modifiers.shift);
        }
        if let Some(kind) = ctx.tool.shape_kind() {
            return self.begin_shape_create(ctx, kind, point, screen);
        }
        if ctx.tool.is_line_tool() {
            return self.begin_line_create(ctx, point, None, screen);
        }
        self.mode = InteractionMode::MarqueeCandidate {
            origin: point,
            origin_screen: screen,
            additive: input.modifiers.shift,
        };
        Effect::None
    }

    pub fn pointer_move(&mut self, ctx: &mut GestureContext<'_>, input: &PointerInput) -> Effect {
        let screen = input.position;
        let point = ctx.to_board(screen);
        match &mut self.mode {
            InteractionMode::None => Effect::None,
            InteractionMode::Pan { last_screen } => {
                let delta = screen - *last_screen;
                *last_screen = screen;
                ctx.camera.pan(delta);
                Effect::None
            }
            InteractionMode::MarqueeCandidate {
                origin,
                origin_screen,
                additive,
            } => {
                if (screen - *origin_screen).hypot() > ctx.config.marquee_threshold_px {
                    self.mode = InteractionMode::Marquee {
                        origin: *origin,
                        current: point,
                        additive: *additive,
                    };
                }
                Effect::None
            }
            InteractionMode::Marquee { current, .. } => {
                *current = point;
                Effect::None
            }
            InteractionMode::Drag {
                origin,
                originals,
                detached,
                moved,
                ..
            } => {
                let delta = point - *origin;
                if !*moved && delta.hypot2() == 0.0 {
                    return Effect::None;
                }
                *moved = true;
                let mut ids = Vec::with_capacity(originals.len());
                for original in originals.iter() {
                    let mut element = original.clone();
                    element.translate(delta);
                    if let BoardElement::Line(line) = &mut element {
                        let line_id = line.id.clone();
                        for d in detached.iter().filter(|d| d.line_id == line_id) {
                            line.set_literal(d.end, d.start + delta);
                            line.set_binding(d.end, None);
                        }
                    }
                    ids.push(element.id().to_string());
                    ctx.scene.upsert(element);
                }
                Effect::Live(ids)
            }
            InteractionMode::Resize { id, corner, start, .. } => {
                let min = Size::new(FRAME_MIN_WIDTH, FRAME_MIN_HEIGHT);
                let rect = resize_frame(*start, *corner, point, min);
                match ctx.scene.get_mut(id) {
                    Some(element) => {
                        element.set_rect(rect);
                        Effect::Live(vec![id.clone()])
                    }
                    None => Effect::None,
                }
            }
            InteractionMode::Transform {
                id,
                handle,
                start,
                original,
                ..
            } => {
                let element = apply_transform(
                    original,
                    start,
                    *handle,
                    point,
                    ctx.measure,
                    ctx.config.rotate_snap_epsilon,
                );
                ctx.scene.upsert(element);
                Effect::Live(vec![id.clone()])
            }
            InteractionMode::ShapeCreate { id, origin, .. } => {
                let rect = Rect::from_points(*origin, point);
                if let Some(element) = ctx.scene.get_mut(id) {
                    fit_draft(element, rect);
                }
                // Drafts are not broadcast until committed
                Effect::None
            }
            InteractionMode::LineCreate { id, .. } => {
                let id = id.clone();
                let snap = ctx.snap(point, Some(&id));
                if let Some(BoardElement::Line(line)) = ctx.scene.get(&id) {
                    let line = move_endpoint(line, LineEnd::End, point, snap);
                    ctx.scene.upsert(BoardElement::Line(line));
                }
                Effect::None
            }
            InteractionMode::LineHandle { id, end, original, .. } => {
                let snap = ctx.snap(point, Some(id.as_str()));
                let line = move_endpoint(original, *end, point, snap);
                ctx.scene.upsert(BoardElement::Line(line));
                Effect::Live(vec![id.clone()])
            }
            InteractionMode::LineBend {
                id, handle, original, ..
            } => {
                ctx.scene.upsert(BoardElement::Line(bend(original, *handle, point)));
                Effect::Live(vec![id.clone()])
            }
            InteractionMode::LineSegment {
                id, variant, original, ..
            } => {
                ctx.scene
                    .upsert(BoardElement::Line(drag_segment(original, *variant, point)));
                Effect::Live(vec![id.clone()])
            }
        }
    }

    pub fn pointer_up(&mut self, ctx: &mut GestureContext<'_>, input: &PointerInput) -> Effect {
        // Apply the final position first so a fast release is not lost
        let last = self.pointer_move(ctx, input);
        let screen = input.position;
        match std::mem::take(&mut self.mode) {
            InteractionMode::None => last,
            InteractionMode::Pan { .. } => Effect::None,
            InteractionMode::MarqueeCandidate { additive, .. } => {
                if additive || ctx.selection.is_empty() {
                    return Effect::None;
                }
                ctx.selection.clear();
                Effect::SelectionChanged
            }
            InteractionMode::Marquee {
                origin,
                current,
                additive,
            } => {
                let hits = ctx
                    .scene
                    .elements_in_rect(Rect::from_points(origin, current), ctx.layout());
                if additive {
                    ctx.selection.toggle_all(&hits);
                } else {
                    ctx.selection.set(hits);
                }
                Effect::SelectionChanged
            }
            InteractionMode::Drag { before, moved, .. } => {
                if moved {
                    Effect::Commit { before, edit: None }
                } else {
                    Effect::SelectionChanged
                }
            }
            InteractionMode::Resize { id, before, .. }
            | InteractionMode::Transform { id, before, .. }
            | InteractionMode::LineHandle { id, before, .. }
            | InteractionMode::LineBend { id, before, .. }
            | InteractionMode::LineSegment { id, before, .. } => {
                if ctx.scene.get(&id) == before.get(&id) {
                    Effect::None
                } else {
                    Effect::Commit { before, edit: None }
                }
            }
            InteractionMode::ShapeCreate {
                id,
                kind,
                origin,
                origin_screen,
                before,
            } => {
                if (screen - origin_screen).hypot() >= ctx.config.create_min_distance_px {
                    ctx.selection.select_only(id.clone());
                    let edit = (kind == ShapeKind::Text).then_some(id);
                    return Effect::Commit { before, edit };
                }
                ctx.scene.remove(&id);
                if !ctx.config.place_on_click {
                    return Effect::None;
                }
                let element = BoardElement::new_shape(kind, Rect::from_center_size(origin, kind.default_size()));
                let id = element.id().to_string();
                ctx.scene.upsert(element);
                ctx.selection.select_only(id.clone());
                let edit = matches!(kind, ShapeKind::Text | ShapeKind::StickyNote).then_some(id);
                Effect::Commit { before, edit }
            }
            InteractionMode::LineCreate {
                id,
                origin_screen,
                before,
            } => {
                let long_enough = match ctx.scene.get(&id).and_then(BoardElement::as_line) {
                    Some(line) => {
                        let resolved = ctx.scene.resolve_line(line, ctx.layout());
                        let length = (resolved.end - resolved.start).hypot();
                        length / ctx.px(1.0) >= ctx.config.create_min_distance_px
                            && (screen - origin_screen).hypot() > 0.0
                    }
                    None => false,
                };
                if !long_enough {
                    ctx.scene.remove(&id);
                    return Effect::None;
                }
                ctx.selection.select_only(id);
                Effect::Commit { before, edit: None }
            }
        }
    }

    /// Abort the current gesture, restoring everything it touched.
    pub fn cancel(&mut self, ctx: &mut GestureContext<'_>) -> Effect {
        match std::mem::take(&mut self.mode) {
            InteractionMode::Drag {
                originals, moved, ..
            } => {
                if !moved {
                    return Effect::None;
                }
                let ids = originals.iter().map(|e| e.id().to_string()).collect();
                for original in originals {
                    ctx.scene.upsert(original);
                }
                Effect::Rollback(ids)
            }
            InteractionMode::Resize { id, before, .. }
            | InteractionMode::Transform { id, before, .. }
            | InteractionMode::LineHandle { id, before, .. }
            | InteractionMode::LineBend { id, before, .. }
            | InteractionMode::LineSegment { id, before, .. } => {
                match before.get(&id) {
                    Some(original) if ctx.scene.get(&id) != Some(original) => {
                        ctx.scene.upsert(original.clone());
                        Effect::Rollback(vec![id])
                    }
                    _ => Effect::None,
                }
            }
            InteractionMode::ShapeCreate { id, .. } | InteractionMode::LineCreate { id, .. } => {
                ctx.scene.remove(&id);
                Effect::None
            }
            InteractionMode::None
            | InteractionMode::Pan { .. }
            | InteractionMode::MarqueeCandidate { .. }
            | InteractionMode::Marquee { .. } => Effect::None,
        }
    }

    /// Whether the current gesture is manipulating element `id`.
    ///
    /// Creation drafts are not counted: their ids are new and only known locally.
    pub fn involves(&self, id: &str) -> bool {
        match &self.mode {
            InteractionMode::Drag { originals, .. } => originals.iter().any(|e| e.id() == id),
            InteractionMode::Resize { id: target, .. }
            | InteractionMode::Transform { id: target, .. }
            | InteractionMode::LineHandle { id: target, .. }
            | InteractionMode::LineBend { id: target, .. }
            | InteractionMode::LineSegment { id: target, .. } => target == id,
            _ => false,
        }
    }

    /// Stop the current gesture where it is, without restoring anything.
    ///
    /// Returns the start-of-gesture snapshot of an editing gesture so the
    /// caller can commit what was already applied.
    pub fn abandon(&mut self) -> Option<Scene> {
        match std::mem::take(&mut self.mode) {
            InteractionMode::Drag { before, moved, .. } => moved.then_some(before),
            InteractionMode::Resize { before, .. }
            | InteractionMode::Transform { before, .. }
            | InteractionMode::LineHandle { before, .. }
            | InteractionMode::LineBend { before, .. }
            | InteractionMode::LineSegment { before, .. } => Some(before),
            _ => None,
        }
    }

    /// Fold a merged remote change into the start-of-gesture snapshot, so
    /// the commit carries only this gesture's own edits and undo leaves the
    /// remote change in place. Elements the gesture is editing keep their
    /// start state.
    pub fn absorb_remote(&mut self, scene: &Scene, upserted: &[ElementId], deleted: &[ElementId]) {
        let draft = match &self.mode {
            InteractionMode::ShapeCreate { id, .. } | InteractionMode::LineCreate { id, .. } => Some(id.clone()),
            _ => None,
        };
        let foreign = |id: &ElementId| !self.involves(id) && draft.as_ref() != Some(id);
        let upserted: Vec<&BoardElement> = upserted
            .iter()
            .filter(|id| foreign(id))
            .filter_map(|id| scene.get(id))
            .collect();
        let deleted: Vec<&ElementId> = deleted.iter().filter(|id| foreign(id)).collect();

        let before = match &mut self.mode {
            InteractionMode::Drag { before, .. }
            | InteractionMode::Resize { before, .. }
            | InteractionMode::Transform { before, .. }
            | InteractionMode::ShapeCreate { before, .. }
            | InteractionMode::LineCreate { before, .. }
            | InteractionMode::LineHandle { before, .. }
            | InteractionMode::LineBend { before, .. }
            | InteractionMode::LineSegment { before, .. } => before,
            _ => return,
        };
        for element in upserted {
            before.upsert(element.clone());
        }
        for id in deleted {
            before.remove(id);
        }
    }

    /// Handles of the single selected element take priority over hit testing.
    fn try_handles(&mut self, ctx: &mut GestureContext<'_>, point: Point) -> Option<Effect> {
        let id = ctx.selection.single()?.to_string();
        let element = ctx.scene.get(&id)?.clone();
        let tolerance = ctx.px(ctx.config.handle_size_px);

        if element.supports_transform() {
            let bounds = bounds_of(&element, ctx.measure);
            let handles = transform_handles(&element, &bounds, ctx.px(ctx.config.rotate_handle_offset_px));
            let handle = hit_test_handles(&handles, point, tolerance)?;
            self.mode = InteractionMode::Transform {
                id,
                handle,
                start: bounds,
                original: element,
                before: ctx.scene.clone(),
            };
            return Some(Effect::None);
        }

        match &element {
            BoardElement::Frame(_) => {
                let rect = element.rect()?;
                let Some(HandleKind::ResizeCorner(corner)) = hit_test_handles(&frame_resize_handles(rect), point, tolerance)
                else {
                    return None;
                };
                self.mode = InteractionMode::Resize {
                    id,
                    corner,
                    start: rect,
                    before: ctx.scene.clone(),
                };
                Some(Effect::None)
            }
            BoardElement::Line(line) => {
                let resolved = ctx.scene.resolve_line(line, ctx.layout());
                let handle = hit_test_handles(&line_handles(line, &resolved), point, tolerance)?;
                let before = ctx.scene.clone();
                let original = line.clone();
                self.mode = match handle {
                    HandleKind::LineEndpoint(end) => InteractionMode::LineHandle {
                        id,
                        end,
                        original,
                        before,
                    },
                    HandleKind::ElbowSegment => InteractionMode::LineSegment {
                        id,
                        variant: resolved.elbow.map(|(v, _)| v).unwrap_or(ElbowVariant::Hvh),
                        original,
                        before,
                    },
                    handle => InteractionMode::LineBend {
                        id,
                        handle,
                        original,
                        before,
                    },
                };
                Some(Effect::None)
            }
            _ => None,
        }
    }

    fn begin_drag(&mut self, ctx: &mut GestureContext<'_>, id: ElementId, point: Point, additive: bool) -> Effect {
        if additive {
            ctx.selection.toggle(&id);
            if !ctx.selection.contains(&id) {
                return Effect::SelectionChanged;
            }
        } else if !ctx.selection.contains(&id) {
            ctx.selection.select_only(id);
        }

        let layout = ctx.layout();
        let mut ids: Vec<ElementId> = ctx.selection.ids().to_vec();
        for selected in ctx.selection.ids() {
            for member in ctx.scene.frame_members(selected, layout) {
                if !ids.contains(&member) {
                    ids.push(member);
                }
            }
        }

        let originals: Vec<BoardElement> = ids.iter().filter_map(|id| ctx.scene.get(id).cloned()).collect();
        let mut detached = Vec::new();
        for line in originals.iter().filter_map(BoardElement::as_line) {
            for end in [LineEnd::Start, LineEnd::End] {
                let stays = line
                    .binding(end)
                    .is_some_and(|b| !ids.contains(&b.element_id));
                if stays {
                    let resolved = ctx.scene.resolve_line(line, layout);
                    detached.push(DetachedEnd {
                        line_id: line.id.clone(),
                        end,
                        start: resolved.endpoint(end),
                    });
                }
            }
        }

        log::debug!("Drag started with {} element(s)", originals.len());
        self.mode = InteractionMode::Drag {
            origin: point,
            originals,
            detached,
            before: ctx.scene.clone(),
            moved: false,
        };
        Effect::SelectionChanged
    }

    fn begin_shape_create(&mut self, ctx: &mut GestureContext<'_>, kind: ShapeKind, point: Point, screen: Point) -> Effect {
        let before = ctx.scene.clone();
        let draft = BoardElement::new_shape(kind, Rect::from_points(point, point));
        let id = draft.id().to_string();
        ctx.scene.upsert(draft);
        self.mode = InteractionMode::ShapeCreate {
            id,
            kind,
            origin: point,
            origin_screen: screen,
            before,
        };
        Effect::None
    }

    fn begin_line_create(
        &mut self,
        ctx: &mut GestureContext<'_>,
        point: Point,
        snap: Option<AnchorSnap>,
        screen: Point,
    ) -> Effect {
        let before = ctx.scene.clone();
        let mut line = LineElement::new(new_element_id(), point, point);
        line.route = ctx.tool.line_route();
        let line = move_endpoint(&line, LineEnd::Start, point, snap);
        let id = line.id.clone();
        ctx.scene.upsert(BoardElement::Line(line));
        self.mode = InteractionMode::LineCreate {
            id,
            origin_screen: screen,
            before,
        };
        Effect::None
    }
}

fn place_comment(ctx: &mut GestureContext<'_>, point: Point) -> Effect {
    let before = ctx.scene.clone();
    let comment = CommentElement::new(new_element_id(), point.x, point.y);
    let id = comment.id.clone();
    ctx.scene.upsert(BoardElement::Comment(comment));
    ctx.selection.select_only(id.clone());
    Effect::Commit {
        before,
        edit: Some(id),
    }
}

/// Size a creation draft to the dragged rectangle.
fn fit_draft(element: &mut BoardElement, rect: Rect) {
    match element {
        BoardElement::Text(text) => {
            text.x = rect.x0;
            text.y = rect.y0;
            text.wrap_width = Some(rect.width().max(TEXT_MIN_WRAP));
        }
        el => el.set_rect(rect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ApproxMeasure;
    use crate::input::Modifiers;
    use crate::shapes::{Anchor, Binding};
    use kurbo::Vec2;

    struct Fixture {
        scene: Scene,
        selection: Selection,
        camera: Camera,
        config: EngineConfig,
        tool: ToolKind,
        interaction: Interaction,
        clock: u64,
    }

    impl Fixture {
        fn new(elements: impl IntoIterator<Item = BoardElement>) -> Self {
            Self {
                scene: Scene::from_elements(elements),
                selection: Selection::new(),
                camera: Camera::new(),
                config: EngineConfig::default(),
                tool: ToolKind::Select,
                interaction: Interaction::new(),
                clock: 0,
            }
        }

        fn input(&mut self, x: f64, y: f64, modifiers: Modifiers) -> PointerInput {
            self.clock += 16;
            PointerInput::new(Point::new(x, y), self.clock).with_modifiers(modifiers)
        }

        fn down(&mut self, x: f64, y: f64, modifiers: Modifiers) -> Effect {
            let input = self.input(x, y, modifiers);
            let mut ctx = GestureContext {
                scene: &mut self.scene,
                selection: &mut self.selection,
                camera: &mut self.camera,
                tool: self.tool,
                config: &self.config,
                measure: &ApproxMeasure,
            };
            self.interaction.pointer_down(&mut ctx, &input, false)
        }

        fn drag_to(&mut self, x: f64, y: f64) -> Effect {
            let input = self.input(x, y, Modifiers::NONE);
            let mut ctx = GestureContext {
                scene: &mut self.scene,
                selection: &mut self.selection,
                camera: &mut self.camera,
                tool: self.tool,
                config: &self.config,
                measure: &ApproxMeasure,
            };
            self.interaction.pointer_move(&mut ctx, &input)
        }

        fn up(&mut self, x: f64, y: f64) -> Effect {
            let input = self.input(x, y, Modifiers::NONE);
            let mut ctx = GestureContext {
                scene: &mut self.scene,
                selection: &mut self.selection,
                camera: &mut self.camera,
                tool: self.tool,
                config: &self.config,
                measure: &ApproxMeasure,
            };
            self.interaction.pointer_up(&mut ctx, &input)
        }

        fn cancel(&mut self) -> Effect {
            let mut ctx = GestureContext {
                scene: &mut self.scene,
                selection: &mut self.selection,
                camera: &mut self.camera,
                tool: self.tool,
                config: &self.config,
                measure: &ApproxMeasure,
            };
            self.interaction.cancel(&mut ctx)
        }

        fn gesture(&mut self, from: (f64, f64), to: (f64, f64), modifiers: Modifiers) -> Effect {
            self.down(from.0, from.1, modifiers);
            self.drag_to((from.0 + to.0) / 2.0, (from.1 + to.1) / 2.0);
            self.drag_to(to.0, to.1);
            self.up(to.0, to.1)
        }

        fn origin_of(&self, id: &str) -> Point {
            self.scene.get(id).map(BoardElement::origin).unwrap_or(Point::ZERO)
        }
    }

    fn shape(kind: ShapeKind, x: f64, y: f64, w: f64, h: f64) -> BoardElement {
        BoardElement::new_shape(kind, Rect::new(x, y, x + w, y + h))
    }

    #[test]
    fn test_drag_moves_element_and_commits() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut f = Fixture::new([a]);
        let effect = f.gesture((50.0, 50.0), (80.0, 90.0), Modifiers::NONE);
        match effect {
            Effect::Commit { before, edit } => {
                assert_eq!(before.get(&id).map(BoardElement::origin), Some(Point::ZERO));
                assert!(edit.is_none());
            }
            other => panic!("expected commit, got {other:?}"),
        }
        assert_eq!(f.origin_of(&id), Point::new(30.0, 40.0));
        assert!(f.selection.contains(&id));
    }

    #[test]
    fn test_click_without_move_only_selects() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut f = Fixture::new([a]);
        f.down(50.0, 50.0, Modifiers::NONE);
        assert_eq!(f.up(50.0, 50.0), Effect::SelectionChanged);
        assert_eq!(f.selection.single(), Some(id.as_str()));
    }

    #[test]
    fn test_frame_drag_carries_members() {
        let frame = shape(ShapeKind::Frame, 0.0, 0.0, 400.0, 400.0);
        let inside = shape(ShapeKind::StickyNote, 50.0, 50.0, 100.0, 100.0);
        let outside = shape(ShapeKind::StickyNote, 600.0, 50.0, 100.0, 100.0);
        let (fid, iid, oid) = (
            frame.id().to_string(),
            inside.id().to_string(),
            outside.id().to_string(),
        );
        let mut f = Fixture::new([frame, inside, outside]);
        f.selection.select_only(fid.clone());
        // Grab the frame body away from members and handles
        f.gesture((300.0, 300.0), (320.0, 310.0), Modifiers::NONE);
        assert_eq!(f.origin_of(&fid), Point::new(20.0, 10.0));
        assert_eq!(f.origin_of(&iid), Point::new(70.0, 60.0));
        assert_eq!(f.origin_of(&oid), Point::new(600.0, 50.0));
    }

    #[test]
    fn test_marquee_replaces_and_shift_toggles() {
        let a = shape(ShapeKind::StickyNote, 10.0, 10.0, 50.0, 50.0);
        let b = shape(ShapeKind::StickyNote, 100.0, 10.0, 50.0, 50.0);
        let c = shape(ShapeKind::StickyNote, 300.0, 10.0, 50.0, 50.0);
        let (aid, bid, cid) = (a.id().to_string(), b.id().to_string(), c.id().to_string());
        let mut f = Fixture::new([a, b, c]);

        f.gesture((0.0, 0.0), (200.0, 100.0), Modifiers::NONE);
        assert!(f.selection.contains(&aid) && f.selection.contains(&bid));
        assert!(!f.selection.contains(&cid));

        // Shift marquee over b and c flips both
        f.gesture((90.0, 0.0), (400.0, 100.0), Modifiers::SHIFT);
        assert!(f.selection.contains(&aid));
        assert!(!f.selection.contains(&bid));
        assert!(f.selection.contains(&cid));
    }

    #[test]
    fn test_click_on_empty_clears_selection() {
        let a = shape(ShapeKind::StickyNote, 10.0, 10.0, 50.0, 50.0);
        let aid = a.id().to_string();
        let mut f = Fixture::new([a]);
        f.selection.select_only(aid);
        f.down(500.0, 500.0, Modifiers::NONE);
        f.drag_to(501.0, 500.0);
        assert_eq!(f.up(501.0, 500.0), Effect::SelectionChanged);
        assert!(f.selection.is_empty());
    }

    #[test]
    fn test_marquee_starts_only_past_threshold() {
        let mut f = Fixture::new([]);
        let threshold = f.config.marquee_threshold_px;
        f.down(500.0, 500.0, Modifiers::NONE);
        f.drag_to(500.0 + threshold, 500.0);
        assert!(matches!(f.interaction.mode(), InteractionMode::MarqueeCandidate { .. }));
        assert!(f.interaction.marquee_rect().is_none());
        f.drag_to(500.0 + threshold + 0.5, 500.0);
        assert!(matches!(f.interaction.mode(), InteractionMode::Marquee { .. }));
    }

    #[test]
    fn test_shift_click_toggles_off_without_drag() {
        let a = shape(ShapeKind::StickyNote, 10.0, 10.0, 50.0, 50.0);
        let b = shape(ShapeKind::StickyNote, 100.0, 10.0, 50.0, 50.0);
        let (aid, bid) = (a.id().to_string(), b.id().to_string());
        let mut f = Fixture::new([a, b]);
        f.selection.set([aid.clone(), bid.clone()]);
        assert_eq!(f.down(30.0, 30.0, Modifiers::SHIFT), Effect::SelectionChanged);
        assert!(!f.interaction.is_active());
        assert_eq!(f.selection.ids(), &[bid]);
    }

    #[test]
    fn test_create_drag_commits_shape() {
        let mut f = Fixture::new([]);
        f.tool = ToolKind::Ellipse;
        let effect = f.gesture((10.0, 10.0), (110.0, 60.0), Modifiers::NONE);
        assert!(matches!(effect, Effect::Commit { edit: None, .. }));
        assert_eq!(f.scene.len(), 1);
        let id = f.selection.single().unwrap().to_string();
        assert_eq!(f.scene.get(&id).and_then(BoardElement::rect), Some(Rect::new(10.0, 10.0, 110.0, 60.0)));
    }

    #[test]
    fn test_create_click_places_default_or_discards() {
        let mut f = Fixture::new([]);
        f.tool = ToolKind::StickyNote;
        f.down(200.0, 200.0, Modifiers::NONE);
        let effect = f.up(202.0, 201.0);
        let Effect::Commit { before, edit } = effect else {
            panic!("expected commit");
        };
        assert!(before.is_empty());
        let id = edit.unwrap();
        let rect = f.scene.get(&id).and_then(BoardElement::rect).unwrap();
        assert_eq!(rect.size(), ShapeKind::StickyNote.default_size());
        assert_eq!(rect.center(), Point::new(200.0, 200.0));

        let mut f = Fixture::new([]);
        f.config.place_on_click = false;
        f.tool = ToolKind::Rectangle;
        f.down(200.0, 200.0, Modifiers::NONE);
        assert_eq!(f.up(202.0, 201.0), Effect::None);
        assert!(f.scene.is_empty());
    }

    #[test]
    fn test_text_create_opens_editor() {
        let mut f = Fixture::new([]);
        f.tool = ToolKind::Text;
        let effect = f.gesture((0.0, 0.0), (150.0, 40.0), Modifiers::NONE);
        let Effect::Commit { edit: Some(id), .. } = effect else {
            panic!("expected commit with edit");
        };
        match f.scene.get(&id) {
            Some(BoardElement::Text(text)) => assert_eq!(text.wrap_width, Some(150.0)),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_connector_binds_both_ends() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let b = shape(ShapeKind::Rectangle, 300.0, 0.0, 100.0, 100.0);
        let (aid, bid) = (a.id().to_string(), b.id().to_string());
        let mut f = Fixture::new([a, b]);
        f.tool = ToolKind::Connector;
        let effect = f.gesture((98.0, 50.0), (302.0, 52.0), Modifiers::NONE);
        assert!(matches!(effect, Effect::Commit { .. }));
        let id = f.selection.single().unwrap().to_string();
        let line = f.scene.get(&id).and_then(BoardElement::as_line).unwrap();
        assert_eq!(line.start_binding, Some(Binding::new(aid, Anchor::Right)));
        assert_eq!(line.end_binding, Some(Binding::new(bid, Anchor::Left)));
        assert!(line.route.is_orthogonal());
    }

    #[test]
    fn test_tiny_line_is_discarded() {
        let mut f = Fixture::new([]);
        f.tool = ToolKind::Line;
        let effect = f.gesture((10.0, 10.0), (12.0, 11.0), Modifiers::NONE);
        assert_eq!(effect, Effect::None);
        assert!(f.scene.is_empty());
    }

    #[test]
    fn test_cancel_restores_dragged_elements() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut f = Fixture::new([a]);
        f.down(50.0, 50.0, Modifiers::NONE);
        assert_eq!(f.drag_to(150.0, 50.0), Effect::Live(vec![id.clone()]));
        assert_eq!(f.cancel(), Effect::Rollback(vec![id.clone()]));
        assert_eq!(f.origin_of(&id), Point::ZERO);
        assert!(!f.interaction.is_active());
    }

    #[test]
    fn test_abandon_keeps_applied_changes() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut f = Fixture::new([a]);
        f.down(50.0, 50.0, Modifiers::NONE);
        assert!(f.interaction.involves(&id));
        f.drag_to(70.0, 50.0);
        let before = f.interaction.abandon().unwrap();
        assert_eq!(before.get(&id).map(BoardElement::origin), Some(Point::ZERO));
        assert_eq!(f.origin_of(&id), Point::new(20.0, 0.0));
        assert!(!f.interaction.involves(&id));
        assert_eq!(f.up(90.0, 50.0), Effect::None);
    }

    #[test]
    fn test_cancel_drops_create_draft() {
        let mut f = Fixture::new([]);
        f.tool = ToolKind::Rectangle;
        f.down(0.0, 0.0, Modifiers::NONE);
        f.drag_to(100.0, 100.0);
        assert_eq!(f.scene.len(), 1);
        f.cancel();
        assert!(f.scene.is_empty());
    }

    #[test]
    fn test_dragging_line_detaches_from_still_targets() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let aid = a.id().to_string();
        let mut line = LineElement::new("l".into(), Point::new(100.0, 50.0), Point::new(300.0, 50.0));
        line.start_binding = Some(Binding::new(aid.clone(), Anchor::Right));
        let mut f = Fixture::new([a, BoardElement::Line(line)]);
        f.gesture((200.0, 50.0), (200.0, 80.0), Modifiers::NONE);
        let line = f.scene.get("l").and_then(BoardElement::as_line).unwrap();
        assert!(line.start_binding.is_none());
        assert_eq!(line.literal(LineEnd::Start), Point::new(100.0, 80.0));
        assert_eq!(line.literal(LineEnd::End), Point::new(300.0, 80.0));
    }

    #[test]
    fn test_bound_line_follows_moved_target() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let aid = a.id().to_string();
        let mut line = LineElement::new("l".into(), Point::new(100.0, 50.0), Point::new(300.0, 50.0));
        line.start_binding = Some(Binding::new(aid.clone(), Anchor::Right));
        let mut f = Fixture::new([a, BoardElement::Line(line)]);
        f.gesture((50.0, 50.0), (50.0, 100.0), Modifiers::NONE);
        let line = f.scene.get("l").and_then(BoardElement::as_line).unwrap().clone();
        assert!(line.start_binding.is_some());
        let layout = LayoutContext {
            measure: &ApproxMeasure,
            route_clearance: 16.0,
        };
        let resolved = f.scene.resolve_line(&line, layout);
        assert_eq!(resolved.start, Point::new(100.0, 100.0));
    }

    #[test]
    fn test_rotate_handle_and_transform_commit() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut f = Fixture::new([a]);
        f.selection.select_only(id.clone());
        // Rotate handle sits 24px above the top center
        f.down(50.0, -24.0, Modifiers::NONE);
        assert!(matches!(f.interaction.mode(), InteractionMode::Transform { .. }));
        let effect = f.up(150.0, 50.0);
        assert!(matches!(effect, Effect::Commit { .. }));
        let rotation = f.scene.get(&id).map(BoardElement::rotation).unwrap();
        assert!((rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_frame_corner_resize() {
        let frame = shape(ShapeKind::Frame, 0.0, 0.0, 200.0, 200.0);
        let id = frame.id().to_string();
        let mut f = Fixture::new([frame]);
        f.selection.select_only(id.clone());
        f.gesture((200.0, 200.0), (300.0, 250.0), Modifiers::NONE);
        assert_eq!(
            f.scene.get(&id).and_then(BoardElement::rect),
            Some(Rect::new(0.0, 0.0, 300.0, 250.0))
        );
    }

    #[test]
    fn test_endpoint_handle_rebinds() {
        let a = shape(ShapeKind::Rectangle, 300.0, 0.0, 100.0, 100.0);
        let aid = a.id().to_string();
        let line = LineElement::new("l".into(), Point::new(0.0, 50.0), Point::new(200.0, 50.0));
        let mut f = Fixture::new([a, BoardElement::Line(line)]);
        f.selection.select_only("l");
        f.gesture((200.0, 50.0), (303.0, 50.0), Modifiers::NONE);
        let line = f.scene.get("l").and_then(BoardElement::as_line).unwrap();
        assert_eq!(line.end_binding, Some(Binding::new(aid, Anchor::Left)));
    }

    #[test]
    fn test_pan_moves_camera() {
        let mut f = Fixture::new([]);
        f.tool = ToolKind::Pan;
        f.gesture((0.0, 0.0), (40.0, -20.0), Modifiers::NONE);
        assert_eq!(f.camera.screen_to_board(Point::ZERO), Point::ZERO - Vec2::new(40.0, -20.0));
    }
}

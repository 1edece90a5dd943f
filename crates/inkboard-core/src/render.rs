//! Render pass.
//!
//! [`build_draw_list`] turns a scene into backend-neutral draw commands. Board
//! commands are in board coordinates and drawn through [`DrawList::transform`];
//! overlay commands (selection chrome, frame labels, the marquee) are already
//! in screen pixels so they keep a constant size at any zoom.

use crate::camera::Camera;
use crate::canvas::{LayoutContext, Scene, rects_overlap};
use crate::config::EngineConfig;
use crate::geometry::{
    MeasureContext, NOTE_PADDING, TransformBounds, bounds_of, frame_label_rect, layout_text, text_box, text_layout,
    triangle_vertices,
};
use crate::resources::{AttachmentStore, Bitmap, ResourceCache, resolve_image_url};
use crate::routing::decorate;
use crate::selection::{HandleKind, Selection, frame_resize_handles, line_handles, transform_handles};
use crate::shapes::{
    BasicShape, BoardElement, COMMENT_RADIUS, DEFAULT_FONT_SIZE, ElementId, FrameElement, ImageElement, LineElement,
    ShapeKind, StickyNote, TextElement,
};
use kurbo::{Affine, BezPath, Circle, Ellipse, Point, Rect, RoundedRect, Shape, Size, Vec2};
use peniko::Color;
use std::sync::Arc;

/// Path flattening tolerance.
const TOLERANCE: f64 = 0.1;
/// Grid spacing in board units.
const GRID_SIZE: f64 = 20.0;
/// Grid lines closer than this on screen are not drawn.
const GRID_MIN_SPACING_PX: f64 = 6.0;
const FRAME_LABEL_FONT_PX: f64 = 12.0;

/// Grid display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridStyle {
    /// No grid (plain background).
    None,
    #[default]
    Lines,
    Dots,
}

impl GridStyle {
    /// Cycle to the next grid style.
    pub fn next(self) -> Self {
        match self {
            GridStyle::None => GridStyle::Lines,
            GridStyle::Lines => GridStyle::Dots,
            GridStyle::Dots => GridStyle::None,
        }
    }
}

/// A single drawing operation.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Fill {
        path: BezPath,
        color: Color,
    },
    Stroke {
        path: BezPath,
        color: Color,
        width: f64,
    },
    /// One line of text. `origin` is the start of the baseline in the
    /// coordinate space produced by `transform`.
    Text {
        text: String,
        origin: Point,
        font_size: f64,
        color: Color,
        transform: Affine,
    },
    /// A loaded bitmap stretched over `rect`, then transformed.
    Image {
        id: ElementId,
        bitmap: Arc<Bitmap>,
        rect: Rect,
        transform: Affine,
    },
}

/// Output of one render pass.
#[derive(Debug, Clone)]
pub struct DrawList {
    pub background: Color,
    /// Board-to-screen transform for `board` commands.
    pub transform: Affine,
    pub board: Vec<DrawCommand>,
    pub overlay: Vec<DrawCommand>,
}

/// Inputs of a render pass.
pub struct RenderContext<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub selection: &'a Selection,
    pub config: &'a EngineConfig,
    pub measure: &'a dyn MeasureContext,
    /// Viewport size in screen pixels.
    pub viewport_size: Size,
    pub background_color: Color,
    pub grid_style: GridStyle,
    pub selection_color: Color,
    /// Marquee in board coordinates.
    pub marquee: Option<Rect>,
    /// Element whose text is drawn by the host's editor instead.
    pub editing_id: Option<&'a str>,
    pub attachments: Option<&'a dyn AttachmentStore>,
    pub resources: Option<&'a ResourceCache>,
}

impl<'a> RenderContext<'a> {
    pub fn new(
        scene: &'a Scene,
        camera: &'a Camera,
        selection: &'a Selection,
        config: &'a EngineConfig,
        measure: &'a dyn MeasureContext,
        viewport_size: Size,
    ) -> Self {
        Self {
            scene,
            camera,
            selection,
            config,
            measure,
            viewport_size,
            background_color: Color::from_rgba8(250, 250, 250, 255),
            grid_style: GridStyle::Lines,
            selection_color: Color::from_rgba8(59, 130, 246, 255),
            marquee: None,
            editing_id: None,
            attachments: None,
            resources: None,
        }
    }

    pub fn with_grid(mut self, style: GridStyle) -> Self {
        self.grid_style = style;
        self
    }

    pub fn with_marquee(mut self, rect: Option<Rect>) -> Self {
        self.marquee = rect;
        self
    }

    pub fn with_editing(mut self, id: Option<&'a str>) -> Self {
        self.editing_id = id;
        self
    }

    pub fn with_images(mut self, attachments: &'a dyn AttachmentStore, resources: &'a ResourceCache) -> Self {
        self.attachments = Some(attachments);
        self.resources = Some(resources);
        self
    }

    fn layout(&self) -> LayoutContext<'a> {
        LayoutContext {
            measure: self.measure,
            route_clearance: self.config.route_clearance,
        }
    }

    /// Board units covering `px` screen pixels.
    fn px(&self, px: f64) -> f64 {
        self.camera.px_to_board(px)
    }
}

/// Build the draw commands for one frame.
pub fn build_draw_list(ctx: &RenderContext<'_>) -> DrawList {
    let mut list = DrawList {
        background: ctx.background_color,
        transform: ctx.camera.transform(),
        board: Vec::new(),
        overlay: Vec::new(),
    };
    let visible = ctx.camera.visible_rect(ctx.viewport_size);
    render_grid(&mut list.board, ctx, visible);

    let layout = ctx.layout();
    for element in ctx.scene.ordered() {
        if !rects_overlap(visible, ctx.scene.element_aabb(element, layout)) {
            continue;
        }
        render_element(&mut list, ctx, element);
    }

    render_selection(&mut list.overlay, ctx);
    if let Some(rect) = ctx.marquee {
        render_marquee(&mut list.overlay, ctx, rect);
    }
    list
}

/// Image URLs the scene will want drawn, for the host to request from a
/// [`ResourceCache`].
pub fn image_sources(scene: &Scene, attachments: &dyn AttachmentStore) -> Vec<String> {
    let mut urls: Vec<String> = scene
        .ordered()
        .filter_map(|e| match e {
            BoardElement::Image(image) => resolve_image_url(image, attachments),
            _ => None,
        })
        .collect();
    urls.sort();
    urls.dedup();
    urls
}

fn render_element(list: &mut DrawList, ctx: &RenderContext<'_>, element: &BoardElement) {
    let draw_text = ctx.editing_id != Some(element.id());
    let out = &mut list.board;
    match element {
        BoardElement::StickyNote(note) => render_note(out, ctx, note, draw_text),
        BoardElement::Text(text) => {
            if draw_text {
                render_text(out, ctx, text);
            }
        }
        BoardElement::Frame(frame) => {
            render_frame(out, ctx, frame);
            render_frame_label(&mut list.overlay, ctx, frame);
        }
        BoardElement::Image(image) => render_image(out, ctx, image),
        BoardElement::Line(line) => render_line(out, ctx, line),
        BoardElement::Comment(comment) => {
            let color = if comment.resolved {
                Color::from_rgba8(160, 160, 160, 255)
            } else {
                Color::from_rgba8(250, 204, 21, 255)
            };
            let circle = Circle::new(Point::new(comment.x, comment.y), COMMENT_RADIUS);
            out.push(DrawCommand::Fill {
                path: circle.to_path(TOLERANCE),
                color,
            });
            out.push(DrawCommand::Stroke {
                path: circle.to_path(TOLERANCE),
                color: Color::WHITE,
                width: ctx.px(1.5),
            });
        }
        _ => {
            if let (Some(kind), Some(shape)) = (element.shape_kind(), element.as_basic()) {
                render_basic(out, ctx, kind, shape, draw_text);
            }
        }
    }
}

fn rotation_about_center(rect: Rect, rotation: f64) -> Affine {
    if rotation == 0.0 {
        Affine::IDENTITY
    } else {
        Affine::rotate_about(rotation, rect.center())
    }
}

fn polygon(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
        path.close_path();
    }
    path
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    if let Some((first, rest)) = points.split_first() {
        path.move_to(*first);
        for p in rest {
            path.line_to(*p);
        }
    }
    path
}

/// Unrotated outline of a basic shape.
pub fn shape_outline(kind: ShapeKind, rect: Rect) -> BezPath {
    match kind {
        ShapeKind::RoundedRectangle => {
            let radius = (rect.width().min(rect.height()) * 0.15).min(16.0);
            RoundedRect::from_rect(rect, radius).to_path(TOLERANCE)
        }
        ShapeKind::Ellipse => Ellipse::from_rect(rect).to_path(TOLERANCE),
        ShapeKind::Diamond => {
            let c = rect.center();
            polygon(&[
                Point::new(c.x, rect.y0),
                Point::new(rect.x1, c.y),
                Point::new(c.x, rect.y1),
                Point::new(rect.x0, c.y),
            ])
        }
        ShapeKind::Triangle => {
            let bounds = TransformBounds::new(rect, 0.0, Vec2::new(1.0, 1.0));
            polygon(&triangle_vertices(&bounds))
        }
        ShapeKind::SpeechBubble => {
            let body = Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + rect.height() * 0.8);
            let radius = (body.width().min(body.height()) * 0.15).min(16.0);
            let mut path = RoundedRect::from_rect(body, radius).to_path(TOLERANCE);
            let w = rect.width();
            path.extend(polygon(&[
                Point::new(rect.x0 + w * 0.2, body.y1),
                Point::new(rect.x0 + w * 0.38, body.y1),
                Point::new(rect.x0 + w * 0.15, rect.y1),
            ]));
            path
        }
        _ => rect.to_path(TOLERANCE),
    }
}

fn render_basic(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, kind: ShapeKind, shape: &BasicShape, draw_text: bool) {
    let rect = Rect::new(shape.x, shape.y, shape.x + shape.width, shape.y + shape.height);
    let transform = rotation_about_center(rect, shape.rotation);
    let mut path = shape_outline(kind, rect);
    path.apply_affine(transform);
    if let Some(fill) = shape.fill {
        out.push(DrawCommand::Fill {
            path: path.clone(),
            color: fill.into(),
        });
    }
    if shape.stroke_width > 0.0 {
        out.push(DrawCommand::Stroke {
            path,
            color: shape.stroke.into(),
            width: shape.stroke_width,
        });
    }
    if !draw_text {
        return;
    }
    if let Some(text) = shape.text.as_deref().filter(|t| !t.is_empty()) {
        let font_size = shape.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        centered_text(out, ctx, text, font_size, rect, transform, shape.stroke.into());
    }
}

fn render_note(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, note: &StickyNote, draw_text: bool) {
    let rect = Rect::new(note.x, note.y, note.x + note.width, note.y + note.height);
    let transform = rotation_about_center(rect, note.rotation);
    let mut path = rect.to_path(TOLERANCE);
    path.apply_affine(transform);
    out.push(DrawCommand::Fill {
        path,
        color: note.color.into(),
    });
    if draw_text && !note.text.is_empty() {
        centered_text(out, ctx, &note.text, note.font_size, rect, transform, Color::BLACK);
    }
}

/// Text wrapped inside `rect` minus padding, centered both ways.
fn centered_text(
    out: &mut Vec<DrawCommand>,
    ctx: &RenderContext<'_>,
    text: &str,
    font_size: f64,
    rect: Rect,
    transform: Affine,
    color: Color,
) {
    let wrap = (rect.width() - NOTE_PADDING * 2.0).max(1.0);
    let layout = layout_text(text, font_size, Some(wrap), ctx.measure);
    let top = rect.y0 + (rect.height() - layout.height) / 2.0;
    for line in &layout.lines {
        out.push(DrawCommand::Text {
            text: line.text.clone(),
            origin: Point::new(rect.x0 + (rect.width() - line.width) / 2.0, top + line.baseline),
            font_size,
            color,
            transform,
        });
    }
}

fn render_text(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, text: &TextElement) {
    let (rect, scale) = text_box(text, ctx.measure);
    // Lines are laid out unscaled from the top-left, then scaled and rotated
    let transform = rotation_about_center(rect, text.rotation)
        * Affine::translate(Vec2::new(rect.x0, rect.y0))
        * Affine::scale_non_uniform(scale.x, scale.y);
    let layout = text_layout(text, ctx.measure);
    for line in &layout.lines {
        out.push(DrawCommand::Text {
            text: line.text.clone(),
            origin: Point::new(0.0, line.baseline),
            font_size: layout.font_size,
            color: text.color.into(),
            transform,
        });
    }
}

fn render_frame(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, frame: &FrameElement) {
    let rect = Rect::new(frame.x, frame.y, frame.x + frame.width, frame.y + frame.height);
    if let Some(fill) = frame.fill {
        out.push(DrawCommand::Fill {
            path: rect.to_path(TOLERANCE),
            color: fill.into(),
        });
    }
    out.push(DrawCommand::Stroke {
        path: rect.to_path(TOLERANCE),
        color: Color::from_rgba8(120, 120, 120, 255),
        width: ctx.px(1.0),
    });
}

fn render_frame_label(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, frame: &FrameElement) {
    let label = frame_label_rect(frame, ctx.camera, ctx.config.frame_label_height_px, ctx.measure);
    out.push(DrawCommand::Fill {
        path: label.to_path(TOLERANCE),
        color: Color::from_rgba8(238, 238, 238, 255),
    });
    let text_width = ctx.measure.text_width(&frame.title, FRAME_LABEL_FONT_PX);
    out.push(DrawCommand::Text {
        text: frame.title.clone(),
        origin: Point::new(
            label.x0 + (label.width() - text_width) / 2.0,
            label.y0 + (label.height() + FRAME_LABEL_FONT_PX * 0.7) / 2.0,
        ),
        font_size: FRAME_LABEL_FONT_PX,
        color: Color::from_rgba8(60, 60, 60, 255),
        transform: Affine::IDENTITY,
    });
}

fn render_image(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, image: &ImageElement) {
    let rect = Rect::new(image.x, image.y, image.x + image.width, image.y + image.height);
    let transform = rotation_about_center(rect, image.rotation);
    let bitmap = match (ctx.attachments, ctx.resources) {
        (Some(attachments), Some(resources)) => {
            resolve_image_url(image, attachments).and_then(|url| resources.ready(&url))
        }
        _ => None,
    };
    match bitmap {
        Some(bitmap) => out.push(DrawCommand::Image {
            id: image.id.clone(),
            bitmap,
            rect,
            transform,
        }),
        None => {
            // Placeholder until the bitmap is loaded
            let mut path = rect.to_path(TOLERANCE);
            path.apply_affine(transform);
            out.push(DrawCommand::Fill {
                path: path.clone(),
                color: Color::from_rgba8(229, 229, 229, 255),
            });
            out.push(DrawCommand::Stroke {
                path,
                color: Color::from_rgba8(180, 180, 180, 255),
                width: ctx.px(1.0),
            });
        }
    }
}

fn render_line(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, line: &LineElement) {
    let resolved = ctx.scene.resolve_line(line, ctx.layout());
    let decorated = decorate(line, &resolved, ctx.config.min_arrow, ctx.config.max_arrow);
    let color: Color = line.stroke.into();
    out.push(DrawCommand::Stroke {
        path: polyline(&decorated.points),
        color,
        width: line.stroke_width,
    });
    for head in &decorated.heads {
        out.push(DrawCommand::Fill {
            path: polygon(&[head.tip, head.left, head.right]),
            color,
        });
    }
}

fn render_grid(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, visible: Rect) {
    if ctx.grid_style == GridStyle::None || GRID_SIZE * ctx.camera.zoom < GRID_MIN_SPACING_PX {
        return;
    }
    let color = Color::from_rgba8(225, 225, 225, 255);
    let x_start = (visible.x0 / GRID_SIZE).floor() as i64;
    let x_end = (visible.x1 / GRID_SIZE).ceil() as i64;
    let y_start = (visible.y0 / GRID_SIZE).floor() as i64;
    let y_end = (visible.y1 / GRID_SIZE).ceil() as i64;
    let mut path = BezPath::new();
    match ctx.grid_style {
        GridStyle::Lines => {
            for i in x_start..=x_end {
                let x = i as f64 * GRID_SIZE;
                path.move_to(Point::new(x, visible.y0));
                path.line_to(Point::new(x, visible.y1));
            }
            for j in y_start..=y_end {
                let y = j as f64 * GRID_SIZE;
                path.move_to(Point::new(visible.x0, y));
                path.line_to(Point::new(visible.x1, y));
            }
            out.push(DrawCommand::Stroke {
                path,
                color,
                width: ctx.px(1.0),
            });
        }
        GridStyle::Dots => {
            let radius = ctx.px(1.0);
            for i in x_start..=x_end {
                for j in y_start..=y_end {
                    let center = Point::new(i as f64 * GRID_SIZE, j as f64 * GRID_SIZE);
                    path.extend(Circle::new(center, radius).path_elements(TOLERANCE));
                }
            }
            out.push(DrawCommand::Fill {
                path,
                color: Color::from_rgba8(200, 200, 200, 255),
            });
        }
        GridStyle::None => {}
    }
}

fn render_selection(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>) {
    let camera = ctx.camera;
    let to_screen = |p: Point| camera.board_to_screen(p);
    for id in ctx.selection.ids() {
        let Some(element) = ctx.scene.get(id) else {
            continue;
        };
        if element.is_line() {
            continue;
        }
        let bounds = bounds_of(element, ctx.measure);
        let corners: Vec<Point> = bounds.corners.iter().map(|c| to_screen(*c)).collect();
        out.push(DrawCommand::Stroke {
            path: polygon(&corners),
            color: ctx.selection_color,
            width: 1.5,
        });
    }

    if let Some(hovered) = ctx.selection.hovered.as_deref().filter(|h| !ctx.selection.contains(h)) {
        if let Some(element) = ctx.scene.get(hovered).filter(|e| !e.is_line()) {
            let bounds = bounds_of(element, ctx.measure);
            let corners: Vec<Point> = bounds.corners.iter().map(|c| to_screen(*c)).collect();
            out.push(DrawCommand::Stroke {
                path: polygon(&corners),
                color: ctx.selection_color.with_alpha(0.5),
                width: 1.0,
            });
        }
    }

    // Handles only for a single selection that is not being edited
    let Some(id) = ctx.selection.single() else {
        return;
    };
    if ctx.editing_id == Some(id) {
        return;
    }
    let Some(element) = ctx.scene.get(id) else {
        return;
    };
    let handles = match element {
        BoardElement::Line(line) => line_handles(line, &ctx.scene.resolve_line(line, ctx.layout())),
        BoardElement::Frame(_) => element.rect().map(frame_resize_handles).unwrap_or_default(),
        _ => {
            let bounds = bounds_of(element, ctx.measure);
            let handles = transform_handles(element, &bounds, ctx.px(ctx.config.rotate_handle_offset_px));
            if let Some(rotate) = handles.iter().find(|h| h.kind == HandleKind::Rotate) {
                let top = bounds.from_local(Vec2::new(0.0, -bounds.height / 2.0));
                out.push(DrawCommand::Stroke {
                    path: polyline(&[to_screen(top), to_screen(rotate.position)]),
                    color: ctx.selection_color,
                    width: 1.0,
                });
            }
            handles
        }
    };
    let half = ctx.config.handle_size_px / 2.0;
    for handle in handles {
        let center = to_screen(handle.position);
        let path = match handle.kind {
            HandleKind::Rotate
            | HandleKind::LineEndpoint(_)
            | HandleKind::LineMidpoint
            | HandleKind::LineBend(_)
            | HandleKind::CurveHandle => Circle::new(center, half).to_path(TOLERANCE),
            _ => Rect::from_center_size(center, (half * 2.0, half * 2.0)).to_path(TOLERANCE),
        };
        out.push(DrawCommand::Fill {
            path: path.clone(),
            color: Color::WHITE,
        });
        out.push(DrawCommand::Stroke {
            path,
            color: ctx.selection_color,
            width: 1.5,
        });
    }
}

fn render_marquee(out: &mut Vec<DrawCommand>, ctx: &RenderContext<'_>, rect: Rect) {
    let screen = Rect::from_points(
        ctx.camera.board_to_screen(Point::new(rect.x0, rect.y0)),
        ctx.camera.board_to_screen(Point::new(rect.x1, rect.y1)),
    );
    out.push(DrawCommand::Fill {
        path: screen.to_path(TOLERANCE),
        color: Color::from_rgba8(59, 130, 246, 25),
    });
    out.push(DrawCommand::Stroke {
        path: screen.to_path(TOLERANCE),
        color: ctx.selection_color,
        width: 1.0,
    });
}

//! Board element definitions.
//!
//! Every element on a board is one variant of [`BoardElement`], a closed
//! tagged union serialized with a `type` discriminator and camelCase fields.
//! The same JSON shape is used on the realtime channel and by the
//! persistence service.

mod basic;
mod comment;
mod frame;
mod image;
mod line;
mod note;
mod text;

pub use basic::{BasicShape, DEFAULT_STROKE_WIDTH};
pub use comment::{COMMENT_RADIUS, CommentElement};
pub use frame::FrameElement;
pub use image::{ImageElement, ImageFormat};
pub use line::{Binding, ElbowVariant, LineElement, LineEnd, LineRoute};
pub use note::StickyNote;
pub use text::TextElement;

use kurbo::{Point, Rect, Size, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Unique identifier for board elements (UUID v4 string for locally created ones).
pub type ElementId = String;

/// Generate a fresh element id.
pub fn new_element_id() -> ElementId {
    uuid::Uuid::new_v4().to_string()
}

/// Minimum side length of a sticky note.
pub const STICKY_MIN_SIZE: f64 = 40.0;
/// Minimum side length of the basic geometric shapes.
pub const SHAPE_MIN_SIZE: f64 = 8.0;
/// Minimum frame width.
pub const FRAME_MIN_WIDTH: f64 = 80.0;
/// Minimum frame height.
pub const FRAME_MIN_HEIGHT: f64 = 60.0;
/// Minimum side length of an image.
pub const IMAGE_MIN_SIZE: f64 = 16.0;
/// Minimum wrap width of a free text element.
pub const TEXT_MIN_WRAP: f64 = 20.0;

/// Smallest font size accepted anywhere on the board.
pub const MIN_FONT_SIZE: f64 = 8.0;
/// Largest font size accepted anywhere on the board.
pub const MAX_FONT_SIZE: f64 = 200.0;
/// Default font size for text-capable elements.
pub const DEFAULT_FONT_SIZE: f64 = 24.0;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    /// Default sticky-note yellow.
    pub const fn note_yellow() -> Self {
        Self::new(255, 235, 130, 255)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match digits.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self::new(out[0], out[1], out[2], 255))
            }
            6 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
                255,
            )),
            8 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
                channel(&digits[6..8])?,
            )),
            _ => None,
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Named attachment point on an element's rotated bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Top,
    Right,
    Bottom,
    Left,
    Center,
}

/// Direction a connector leaves an anchor in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Anchor {
    /// The four edge anchors, in clockwise order from the top.
    pub const CARDINAL: [Anchor; 4] = [Anchor::Top, Anchor::Right, Anchor::Bottom, Anchor::Left];

    /// Axis a route leaves this anchor along. `Center` has none.
    pub fn axis(self) -> Option<Axis> {
        match self {
            Anchor::Left | Anchor::Right => Some(Axis::Horizontal),
            Anchor::Top | Anchor::Bottom => Some(Axis::Vertical),
            Anchor::Center => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(Anchor::Top),
            "right" => Some(Anchor::Right),
            "bottom" => Some(Anchor::Bottom),
            "left" => Some(Anchor::Left),
            "center" => Some(Anchor::Center),
            _ => None,
        }
    }
}

/// Kinds of element a creation tool can produce (everything but lines and comments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    StickyNote,
    Text,
    Rectangle,
    RoundedRectangle,
    Ellipse,
    Diamond,
    Triangle,
    SpeechBubble,
    Frame,
    Image,
}

impl ShapeKind {
    /// Size used when an element is placed with a single click.
    pub fn default_size(self) -> Size {
        match self {
            ShapeKind::StickyNote => Size::new(200.0, 200.0),
            ShapeKind::Text => Size::new(200.0, DEFAULT_FONT_SIZE * 1.25),
            ShapeKind::Frame => Size::new(400.0, 300.0),
            ShapeKind::Image => Size::new(240.0, 180.0),
            _ => Size::new(160.0, 100.0),
        }
    }

    /// Smallest size the element may be resized to.
    pub fn min_size(self) -> Size {
        match self {
            ShapeKind::StickyNote => Size::new(STICKY_MIN_SIZE, STICKY_MIN_SIZE),
            ShapeKind::Text => Size::new(TEXT_MIN_WRAP, MIN_FONT_SIZE),
            ShapeKind::Frame => Size::new(FRAME_MIN_WIDTH, FRAME_MIN_HEIGHT),
            ShapeKind::Image => Size::new(IMAGE_MIN_SIZE, IMAGE_MIN_SIZE),
            _ => Size::new(SHAPE_MIN_SIZE, SHAPE_MIN_SIZE),
        }
    }
}

/// A single element on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BoardElement {
    StickyNote(StickyNote),
    Text(TextElement),
    Rectangle(BasicShape),
    RoundedRectangle(BasicShape),
    Ellipse(BasicShape),
    Diamond(BasicShape),
    Triangle(BasicShape),
    SpeechBubble(BasicShape),
    Frame(FrameElement),
    Image(ImageElement),
    Line(LineElement),
    Comment(CommentElement),
}

impl BoardElement {
    /// Create an element of `kind` filling `rect` (clamped to the kind's minimum size).
    pub fn new_shape(kind: ShapeKind, rect: Rect) -> Self {
        let id = new_element_id();
        let mut element = match kind {
            ShapeKind::StickyNote => BoardElement::StickyNote(StickyNote::new(id, rect)),
            ShapeKind::Text => {
                let mut text = TextElement::new(id, rect.origin());
                text.wrap_width = Some(rect.width().max(TEXT_MIN_WRAP));
                BoardElement::Text(text)
            }
            ShapeKind::Rectangle => BoardElement::Rectangle(BasicShape::new(id, rect)),
            ShapeKind::RoundedRectangle => BoardElement::RoundedRectangle(BasicShape::new(id, rect)),
            ShapeKind::Ellipse => BoardElement::Ellipse(BasicShape::new(id, rect)),
            ShapeKind::Diamond => BoardElement::Diamond(BasicShape::new(id, rect)),
            ShapeKind::Triangle => BoardElement::Triangle(BasicShape::new(id, rect)),
            ShapeKind::SpeechBubble => BoardElement::SpeechBubble(BasicShape::new(id, rect)),
            ShapeKind::Frame => BoardElement::Frame(FrameElement::new(id, rect)),
            ShapeKind::Image => BoardElement::Image(ImageElement::new(id, rect)),
        };
        element.clamp_size();
        element
    }

    pub fn id(&self) -> &str {
        match self {
            BoardElement::StickyNote(e) => &e.id,
            BoardElement::Text(e) => &e.id,
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => &e.id,
            BoardElement::Frame(e) => &e.id,
            BoardElement::Image(e) => &e.id,
            BoardElement::Line(e) => &e.id,
            BoardElement::Comment(e) => &e.id,
        }
    }

    /// Replace the id (used when duplicating elements).
    pub fn set_id(&mut self, id: ElementId) {
        match self {
            BoardElement::StickyNote(e) => e.id = id,
            BoardElement::Text(e) => e.id = id,
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => e.id = id,
            BoardElement::Frame(e) => e.id = id,
            BoardElement::Image(e) => e.id = id,
            BoardElement::Line(e) => e.id = id,
            BoardElement::Comment(e) => e.id = id,
        }
    }

    /// Wire name of the variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            BoardElement::StickyNote(_) => "stickyNote",
            BoardElement::Text(_) => "text",
            BoardElement::Rectangle(_) => "rectangle",
            BoardElement::RoundedRectangle(_) => "roundedRectangle",
            BoardElement::Ellipse(_) => "ellipse",
            BoardElement::Diamond(_) => "diamond",
            BoardElement::Triangle(_) => "triangle",
            BoardElement::SpeechBubble(_) => "speechBubble",
            BoardElement::Frame(_) => "frame",
            BoardElement::Image(_) => "image",
            BoardElement::Line(_) => "line",
            BoardElement::Comment(_) => "comment",
        }
    }

    /// Creation kind of this element, `None` for lines and comments.
    pub fn shape_kind(&self) -> Option<ShapeKind> {
        Some(match self {
            BoardElement::StickyNote(_) => ShapeKind::StickyNote,
            BoardElement::Text(_) => ShapeKind::Text,
            BoardElement::Rectangle(_) => ShapeKind::Rectangle,
            BoardElement::RoundedRectangle(_) => ShapeKind::RoundedRectangle,
            BoardElement::Ellipse(_) => ShapeKind::Ellipse,
            BoardElement::Diamond(_) => ShapeKind::Diamond,
            BoardElement::Triangle(_) => ShapeKind::Triangle,
            BoardElement::SpeechBubble(_) => ShapeKind::SpeechBubble,
            BoardElement::Frame(_) => ShapeKind::Frame,
            BoardElement::Image(_) => ShapeKind::Image,
            BoardElement::Line(_) | BoardElement::Comment(_) => return None,
        })
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, BoardElement::Frame(_))
    }

    pub fn is_line(&self) -> bool {
        matches!(self, BoardElement::Line(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, BoardElement::Comment(_))
    }

    pub fn as_line(&self) -> Option<&LineElement> {
        match self {
            BoardElement::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_line_mut(&mut self) -> Option<&mut LineElement> {
        match self {
            BoardElement::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_basic(&self) -> Option<&BasicShape> {
        match self {
            BoardElement::Rectangle(s)
            | BoardElement::RoundedRectangle(s)
            | BoardElement::Ellipse(s)
            | BoardElement::Diamond(s)
            | BoardElement::Triangle(s)
            | BoardElement::SpeechBubble(s) => Some(s),
            _ => None,
        }
    }

    /// Rotation angle in radians (0 for variants that cannot rotate).
    pub fn rotation(&self) -> f64 {
        match self {
            BoardElement::StickyNote(e) => e.rotation,
            BoardElement::Text(e) => e.rotation,
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => e.rotation,
            BoardElement::Image(e) => e.rotation,
            BoardElement::Frame(_) | BoardElement::Line(_) | BoardElement::Comment(_) => 0.0,
        }
    }

    pub fn set_rotation(&mut self, rotation: f64) {
        match self {
            BoardElement::StickyNote(e) => e.rotation = rotation,
            BoardElement::Text(e) => e.rotation = rotation,
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => e.rotation = rotation,
            BoardElement::Image(e) => e.rotation = rotation,
            BoardElement::Frame(_) | BoardElement::Line(_) | BoardElement::Comment(_) => {}
        }
    }

    /// Whether the transform handles (scale, rotate, width/height) apply.
    pub fn supports_transform(&self) -> bool {
        !matches!(
            self,
            BoardElement::Frame(_) | BoardElement::Line(_) | BoardElement::Comment(_)
        )
    }

    /// Unrotated box of the element for variants stored as a box.
    ///
    /// Text is laid out (see `geometry::bounds_of`), lines and comments are
    /// points, so they return `None`.
    pub fn rect(&self) -> Option<Rect> {
        let (x, y, w, h) = match self {
            BoardElement::StickyNote(e) => (e.x, e.y, e.width, e.height),
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => (e.x, e.y, e.width, e.height),
            BoardElement::Frame(e) => (e.x, e.y, e.width, e.height),
            BoardElement::Image(e) => (e.x, e.y, e.width, e.height),
            BoardElement::Text(_) | BoardElement::Line(_) | BoardElement::Comment(_) => {
                return None;
            }
        };
        Some(Rect::new(x, y, x + w, y + h))
    }

    /// Set the unrotated box, clamping to the variant's minimum size.
    /// No-op for text, lines and comments.
    pub fn set_rect(&mut self, rect: Rect) {
        let rect = rect.abs();
        match self {
            BoardElement::StickyNote(e) => {
                (e.x, e.y, e.width, e.height) = (rect.x0, rect.y0, rect.width(), rect.height())
            }
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => {
                (e.x, e.y, e.width, e.height) = (rect.x0, rect.y0, rect.width(), rect.height())
            }
            BoardElement::Frame(e) => {
                (e.x, e.y, e.width, e.height) = (rect.x0, rect.y0, rect.width(), rect.height())
            }
            BoardElement::Image(e) => {
                (e.x, e.y, e.width, e.height) = (rect.x0, rect.y0, rect.width(), rect.height())
            }
            BoardElement::Text(_) | BoardElement::Line(_) | BoardElement::Comment(_) => return,
        }
        self.clamp_size();
    }

    /// Clamp width/height (or wrap width for text) to the variant minimum.
    pub fn clamp_size(&mut self) {
        if let BoardElement::Text(text) = self {
            if let Some(wrap) = text.wrap_width.as_mut() {
                *wrap = wrap.max(TEXT_MIN_WRAP);
            }
            return;
        }
        let Some(min) = self.shape_kind().map(ShapeKind::min_size) else {
            return;
        };
        let clamp = |w: &mut f64, h: &mut f64| {
            *w = w.max(min.width);
            *h = h.max(min.height);
        };
        match self {
            BoardElement::StickyNote(e) => clamp(&mut e.width, &mut e.height),
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => clamp(&mut e.width, &mut e.height),
            BoardElement::Frame(e) => clamp(&mut e.width, &mut e.height),
            BoardElement::Image(e) => clamp(&mut e.width, &mut e.height),
            _ => {}
        }
    }

    /// Move the element by `delta` in board space.
    ///
    /// Lines move their literal endpoints and route data; bound endpoints
    /// keep following their targets.
    pub fn translate(&mut self, delta: Vec2) {
        match self {
            BoardElement::Text(e) => {
                e.x += delta.x;
                e.y += delta.y;
            }
            BoardElement::Line(line) => line.translate(delta),
            BoardElement::Comment(e) => {
                e.x += delta.x;
                e.y += delta.y;
            }
            _ => {
                if let Some(rect) = self.rect() {
                    self.set_rect(rect + delta);
                }
            }
        }
    }

    /// Whether the element carries editable text.
    pub fn is_text_capable(&self) -> bool {
        !matches!(self, BoardElement::Line(_) | BoardElement::Image(_))
    }

    /// Current text (frame title for frames, body for comments).
    pub fn text(&self) -> Option<&str> {
        match self {
            BoardElement::StickyNote(e) => Some(&e.text),
            BoardElement::Text(e) => Some(&e.text),
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => Some(e.text.as_deref().unwrap_or("")),
            BoardElement::Frame(e) => Some(&e.title),
            BoardElement::Comment(e) => Some(&e.text),
            BoardElement::Image(_) | BoardElement::Line(_) => None,
        }
    }

    pub fn set_text(&mut self, value: String) {
        match self {
            BoardElement::StickyNote(e) => e.text = value,
            BoardElement::Text(e) => e.text = value,
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => {
                e.text = if value.is_empty() { None } else { Some(value) };
            }
            BoardElement::Frame(e) => e.title = value,
            BoardElement::Comment(e) => e.text = value,
            BoardElement::Image(_) | BoardElement::Line(_) => {}
        }
    }

    pub fn font_size(&self) -> Option<f64> {
        match self {
            BoardElement::StickyNote(e) => Some(e.font_size),
            BoardElement::Text(e) => Some(e.font_size),
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => Some(e.font_size.unwrap_or(DEFAULT_FONT_SIZE)),
            _ => None,
        }
    }

    pub fn set_font_size(&mut self, size: f64) {
        let size = size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        match self {
            BoardElement::StickyNote(e) => e.font_size = size,
            BoardElement::Text(e) => e.font_size = size,
            BoardElement::Rectangle(e)
            | BoardElement::RoundedRectangle(e)
            | BoardElement::Ellipse(e)
            | BoardElement::Diamond(e)
            | BoardElement::Triangle(e)
            | BoardElement::SpeechBubble(e) => e.font_size = Some(size),
            _ => {}
        }
    }

    /// Reference point used when placing or moving pins.
    pub fn origin(&self) -> Point {
        match self {
            BoardElement::Text(e) => Point::new(e.x, e.y),
            BoardElement::Line(e) => Point::new(e.x1, e.y1),
            BoardElement::Comment(e) => Point::new(e.x, e.y),
            _ => self.rect().map(|r| r.origin()).unwrap_or(Point::ZERO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        assert_eq!(
            SerializableColor::from_hex("#fff"),
            Some(SerializableColor::white())
        );
        assert_eq!(
            SerializableColor::from_hex("#102030"),
            Some(SerializableColor::new(0x10, 0x20, 0x30, 255))
        );
        assert_eq!(
            SerializableColor::from_hex("#10203040"),
            Some(SerializableColor::new(0x10, 0x20, 0x30, 0x40))
        );
        assert_eq!(SerializableColor::from_hex("102030"), None);
        assert_eq!(SerializableColor::from_hex("#12"), None);
        assert_eq!(SerializableColor::from_hex("#zzzzzz"), None);
        assert_eq!(SerializableColor::from_hex("#ééé"), None);
    }

    #[test]
    fn test_new_shape_clamps_to_minimum() {
        let note = BoardElement::new_shape(ShapeKind::StickyNote, Rect::new(0.0, 0.0, 5.0, 5.0));
        let rect = note.rect().unwrap();
        assert_eq!(rect.width(), STICKY_MIN_SIZE);
        assert_eq!(rect.height(), STICKY_MIN_SIZE);

        let frame = BoardElement::new_shape(ShapeKind::Frame, Rect::new(0.0, 0.0, 10.0, 10.0));
        let rect = frame.rect().unwrap();
        assert_eq!(rect.width(), FRAME_MIN_WIDTH);
        assert_eq!(rect.height(), FRAME_MIN_HEIGHT);
    }

    #[test]
    fn test_serialized_shape_is_camel_case_and_tagged() {
        let el = BoardElement::new_shape(
            ShapeKind::RoundedRectangle,
            Rect::new(10.0, 20.0, 110.0, 70.0),
        );
        let value = serde_json::to_value(&el).unwrap();
        assert_eq!(value["type"], "roundedRectangle");
        assert_eq!(value["x"], 10.0);
        assert!(value.get("strokeWidth").is_some());

        let back: BoardElement = serde_json::from_value(value).unwrap();
        assert_eq!(back, el);
    }

    #[test]
    fn test_translate_moves_box() {
        let mut el = BoardElement::new_shape(ShapeKind::Ellipse, Rect::new(0.0, 0.0, 50.0, 50.0));
        el.translate(Vec2::new(5.0, -5.0));
        assert_eq!(el.rect().unwrap(), Rect::new(5.0, -5.0, 55.0, 45.0));
    }

    #[test]
    fn test_set_text_on_shape_clears_when_empty() {
        let mut el = BoardElement::new_shape(ShapeKind::Diamond, Rect::new(0.0, 0.0, 50.0, 50.0));
        el.set_text("hi".to_string());
        assert_eq!(el.text(), Some("hi"));
        el.set_text(String::new());
        assert_eq!(el.as_basic().unwrap().text, None);
    }

    #[test]
    fn test_anchor_axes() {
        assert_eq!(Anchor::Left.axis(), Some(Axis::Horizontal));
        assert_eq!(Anchor::Top.axis(), Some(Axis::Vertical));
        assert_eq!(Anchor::Center.axis(), None);
        assert_eq!(Anchor::parse("bottom"), Some(Anchor::Bottom));
        assert_eq!(Anchor::parse("middle"), None);
    }
}

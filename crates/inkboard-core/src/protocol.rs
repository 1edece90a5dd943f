//! Realtime channel messages and tolerant element parsing.
//!
//! Every frame is a JSON envelope `{ "type": ..., "payload": ... }`. Element
//! payloads travel as raw JSON values so that a single malformed element can
//! be dropped without losing the rest of a batch.

use crate::shapes::{
    BoardElement, Binding, ElementId, LineRoute, MAX_FONT_SIZE, MIN_FONT_SIZE, SerializableColor,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::f64::consts::TAU;

/// Accepted stroke width range.
pub const MIN_STROKE_WIDTH: f64 = 0.5;
pub const MAX_STROKE_WIDTH: f64 = 64.0;
/// Accepted text scale range.
pub const MIN_TEXT_SCALE: f64 = 0.05;
pub const MAX_TEXT_SCALE: f64 = 50.0;

/// Identity announced when joining a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// A channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Envelope {
    JoinBoard {
        board_id: String,
        user: UserInfo,
    },
    /// Sent back to a joining client, optionally with the current elements.
    JoinAck {
        board_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elements: Option<Vec<Value>>,
    },
    ElementUpdate {
        board_id: String,
        element: Value,
    },
    ElementsUpdate {
        board_id: String,
        elements: Vec<Value>,
    },
    ElementsDelete {
        board_id: String,
        ids: Vec<ElementId>,
    },
}

impl Envelope {
    pub fn join(board_id: impl Into<String>, user: UserInfo) -> Self {
        Envelope::JoinBoard {
            board_id: board_id.into(),
            user,
        }
    }

    pub fn element_update(board_id: impl Into<String>, element: &BoardElement) -> Self {
        Envelope::ElementUpdate {
            board_id: board_id.into(),
            element: element_to_value(element),
        }
    }

    pub fn elements_update<'a>(
        board_id: impl Into<String>,
        elements: impl IntoIterator<Item = &'a BoardElement>,
    ) -> Self {
        Envelope::ElementsUpdate {
            board_id: board_id.into(),
            elements: elements.into_iter().map(element_to_value).collect(),
        }
    }

    pub fn elements_delete(board_id: impl Into<String>, ids: Vec<ElementId>) -> Self {
        Envelope::ElementsDelete {
            board_id: board_id.into(),
            ids,
        }
    }

    pub fn board_id(&self) -> &str {
        match self {
            Envelope::JoinBoard { board_id, .. }
            | Envelope::JoinAck { board_id, .. }
            | Envelope::ElementUpdate { board_id, .. }
            | Envelope::ElementsUpdate { board_id, .. }
            | Envelope::ElementsDelete { board_id, .. } => board_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn element_to_value(element: &BoardElement) -> Value {
    serde_json::to_value(element).unwrap_or_else(|e| {
        log::warn!("Failed to serialize element {}: {}", element.id(), e);
        Value::Null
    })
}

/// Geometry each variant cannot do without.
fn required_fields(type_name: &str) -> Option<&'static [&'static str]> {
    const BOX: &[&str] = &["x", "y", "width", "height"];
    match type_name {
        "stickyNote" | "rectangle" | "roundedRectangle" | "ellipse" | "diamond" | "triangle"
        | "speechBubble" | "frame" | "image" => Some(BOX),
        "text" | "comment" => Some(&["x", "y"]),
        "line" => Some(&["x1", "y1", "x2", "y2"]),
        _ => None,
    }
}

const OPTIONAL_NUMBERS: &[&str] = &["rotation", "strokeWidth", "fontSize", "wrapWidth", "scaleX", "scaleY"];
const COLOR_FIELDS: &[&str] = &["fill", "stroke", "color"];
const STRING_FIELDS: &[&str] = &["text", "title", "author", "attachmentId", "url"];
const BOOL_FIELDS: &[&str] = &["resolved", "startArrow", "endArrow"];

/// Numbers may arrive as JSON numbers or numeric strings.
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Colors may arrive as `{r,g,b,a}` objects or hex strings.
fn coerce_color(value: &Value) -> Option<SerializableColor> {
    match value {
        Value::String(s) => SerializableColor::from_hex(s.trim()),
        Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        _ => None,
    }
}

/// Validate and normalize one inbound element.
///
/// Returns `None` when the id, the type or the variant's required geometry is
/// missing or unusable. Optional fields that fail to parse are dropped so
/// they take their defaults, and numeric fields are clamped into range.
pub fn parse_element(value: &Value) -> Option<BoardElement> {
    let Some(obj) = value.as_object() else {
        log::debug!("Dropping element: payload is not an object");
        return None;
    };
    let Some(id) = obj.get("id").and_then(Value::as_str).filter(|id| !id.trim().is_empty()) else {
        log::debug!("Dropping element: missing id");
        return None;
    };
    let Some(required) = obj.get("type").and_then(Value::as_str).and_then(required_fields) else {
        log::debug!("Dropping element {}: unknown type", id);
        return None;
    };

    let mut clean: Map<String, Value> = obj.clone();
    for field in required {
        let Some(n) = obj.get(*field).and_then(coerce_number) else {
            log::debug!("Dropping element {}: bad {}", id, field);
            return None;
        };
        clean.insert((*field).to_string(), Value::from(n));
    }
    for field in OPTIONAL_NUMBERS {
        if let Some(v) = obj.get(*field) {
            match coerce_number(v) {
                Some(n) => clean.insert((*field).to_string(), Value::from(n)),
                None => clean.remove(*field),
            };
        }
    }
    for field in COLOR_FIELDS {
        if let Some(v) = obj.get(*field) {
            match coerce_color(v).and_then(|c| serde_json::to_value(c).ok()) {
                Some(c) => clean.insert((*field).to_string(), c),
                None => clean.remove(*field),
            };
        }
    }
    for field in STRING_FIELDS {
        if obj.get(*field).is_some_and(|v| !v.is_string()) {
            clean.remove(*field);
        }
    }
    for field in BOOL_FIELDS {
        if obj.get(*field).is_some_and(|v| !v.is_boolean()) {
            clean.remove(*field);
        }
    }
    for field in ["startBinding", "endBinding"] {
        if let Some(v) = obj.get(field) {
            if serde_json::from_value::<Binding>(v.clone()).is_err() {
                clean.remove(field);
            }
        }
    }
    if let Some(v) = obj.get("route") {
        if serde_json::from_value::<LineRoute>(v.clone()).is_err() {
            clean.remove("route");
        }
    }

    match serde_json::from_value::<BoardElement>(Value::Object(clean)) {
        Ok(mut element) => {
            clamp_element(&mut element);
            Some(element)
        }
        Err(e) => {
            log::debug!("Dropping element {}: {}", id, e);
            None
        }
    }
}

/// Parse a batch, skipping the elements that fail.
pub fn parse_elements(values: &[Value]) -> Vec<BoardElement> {
    values.iter().filter_map(parse_element).collect()
}

fn clamp_element(element: &mut BoardElement) {
    element.clamp_size();
    let rotation = element.rotation();
    element.set_rotation(rotation.rem_euclid(TAU));
    let font = |size: f64| size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    match element {
        BoardElement::Rectangle(s)
        | BoardElement::RoundedRectangle(s)
        | BoardElement::Ellipse(s)
        | BoardElement::Diamond(s)
        | BoardElement::Triangle(s)
        | BoardElement::SpeechBubble(s) => {
            s.stroke_width = s.stroke_width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
            s.font_size = s.font_size.map(font);
        }
        BoardElement::StickyNote(note) => note.font_size = font(note.font_size),
        BoardElement::Line(line) => {
            line.stroke_width = line.stroke_width.clamp(MIN_STROKE_WIDTH, MAX_STROKE_WIDTH);
        }
        BoardElement::Text(text) => {
            text.font_size = font(text.font_size);
            text.scale_x = text.scale_x.clamp(MIN_TEXT_SCALE, MAX_TEXT_SCALE);
            text.scale_y = text.scale_y.clamp(MIN_TEXT_SCALE, MAX_TEXT_SCALE);
        }
        _ => {}
    }
}

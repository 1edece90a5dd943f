//! In-place text editing.

use crate::canvas::Scene;
use crate::geometry::{MeasureContext, fit_font_size};
use crate::shapes::{BoardElement, ElementId};

/// The element being edited and its uncommitted text.
#[derive(Debug, Clone, PartialEq)]
pub struct EditingState {
    pub id: ElementId,
    pub draft: String,
    /// Live font size for sticky notes, which shrink text to fit.
    pub font_size: Option<f64>,
}

/// What committing an edit did to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    Unchanged,
    Updated(ElementId),
    /// Empty free text is removed instead of kept.
    Deleted(ElementId),
}

impl EditingState {
    /// Start editing `element` if it carries text.
    pub fn begin(element: &BoardElement) -> Option<Self> {
        if !element.is_text_capable() {
            return None;
        }
        let font_size = match element {
            BoardElement::StickyNote(note) => Some(note.font_size),
            _ => None,
        };
        Some(Self {
            id: element.id().to_string(),
            draft: element.text().unwrap_or_default().to_string(),
            font_size,
        })
    }

    /// Replace the draft, refitting the font of sticky notes.
    pub fn set_text(&mut self, text: impl Into<String>, scene: &Scene, measure: &dyn MeasureContext) {
        self.draft = text.into();
        if let Some(BoardElement::StickyNote(note)) = scene.get(&self.id) {
            let size = kurbo::Size::new(note.width, note.height);
            self.font_size = Some(fit_font_size(&self.draft, size, measure));
        }
    }

    /// Write the draft back into `scene`.
    pub fn commit(self, scene: &mut Scene) -> EditOutcome {
        let Some(element) = scene.get_mut(&self.id) else {
            return EditOutcome::Unchanged;
        };
        if matches!(element, BoardElement::Text(_)) && self.draft.trim().is_empty() {
            scene.remove(&self.id);
            return EditOutcome::Deleted(self.id);
        }
        let text_changed = element.text() != Some(self.draft.as_str());
        let font_changed = self.font_size.is_some_and(|f| element.font_size() != Some(f));
        if !text_changed && !font_changed {
            return EditOutcome::Unchanged;
        }
        element.set_text(self.draft);
        if let Some(font) = self.font_size {
            element.set_font_size(font);
        }
        EditOutcome::Updated(self.id)
    }
}

//! The board: one place through which every local and remote mutation flows.
//!
//! A [`Board`] owns the scene, the gesture state machine, undo history and the
//! collaboration manager. Host events go in; outgoing channel messages,
//! persistence calls and draw lists come out.

use crate::camera::Camera;
use crate::canvas::{LayoutContext, Scene};
use crate::collaboration::{CollaborationManager, RemoteChange, SceneDiff};
use crate::config::EngineConfig;
use crate::geometry::{ApproxMeasure, MeasureContext};
use crate::history::History;
use crate::input::{InputState, KeyEvent, MouseButton, PointerInput, WheelInput};
use crate::interaction::{EditOutcome, EditingState, Effect, GestureContext, Interaction};
use crate::persistence::{ElementStore, PersistOp, PersistWorker};
use crate::protocol::{Envelope, UserInfo};
use crate::render::{DrawList, RenderContext, build_draw_list};
use crate::selection::Selection;
use crate::shapes::{BoardElement, ElementId};
use crate::sync::{ChannelClient, SyncEvent};
use crate::tools::ToolKind;
use kurbo::{Point, Size};
use std::sync::Arc;

/// Padding around content when fitting the camera.
const FIT_PADDING_PX: f64 = 40.0;
const WHEEL_ZOOM_IN: f64 = 1.1;
const WHEEL_ZOOM_OUT: f64 = 0.9;

/// A whiteboard session for one user on one board.
pub struct Board {
    scene: Scene,
    selection: Selection,
    camera: Camera,
    config: EngineConfig,
    tool: ToolKind,
    interaction: Interaction,
    editing: Option<EditingState>,
    history: History,
    collab: CollaborationManager,
    input: InputState,
    measure: Box<dyn MeasureContext>,
    persister: Option<PersistWorker>,
}

impl Board {
    pub fn new(board_id: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            scene: Scene::new(),
            selection: Selection::new(),
            camera: Camera::with_limits(config.min_zoom, config.max_zoom),
            tool: ToolKind::Select,
            interaction: Interaction::new(),
            editing: None,
            history: History::new(config.history_limit),
            collab: CollaborationManager::new(board_id, config.broadcast_interval_ms),
            input: InputState::new(),
            measure: Box::new(ApproxMeasure),
            persister: None,
            config,
        }
    }

    /// Use a real text measurer instead of the built-in approximation.
    pub fn with_measure(mut self, measure: Box<dyn MeasureContext>) -> Self {
        self.measure = measure;
        self
    }

    /// Persist committed changes to `store`. Without a store, persistence
    /// ops stay queued for [`take_persist_ops`](Self::take_persist_ops).
    pub fn with_store(mut self, store: Arc<dyn ElementStore>) -> Self {
        match PersistWorker::spawn(store) {
            Ok(worker) => self.persister = Some(worker),
            Err(e) => log::warn!("Failed to start persistence worker: {}", e),
        }
        self
    }

    pub fn board_id(&self) -> &str {
        self.collab.board_id()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn editing(&self) -> Option<&EditingState> {
        self.editing.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn layout(&self) -> LayoutContext<'_> {
        LayoutContext {
            measure: self.measure.as_ref(),
            route_clearance: self.config.route_clearance,
        }
    }

    fn with_gesture<R>(&mut self, f: impl FnOnce(&mut Interaction, &mut GestureContext<'_>) -> R) -> R {
        let mut ctx = GestureContext {
            scene: &mut self.scene,
            selection: &mut self.selection,
            camera: &mut self.camera,
            tool: self.tool,
            config: &self.config,
            measure: self.measure.as_ref(),
        };
        f(&mut self.interaction, &mut ctx)
    }

    /// Replace the whole scene, e.g. with what the persistence service
    /// returned on open. History is cleared.
    pub fn load(&mut self, elements: Vec<BoardElement>) {
        self.cancel_gesture(0);
        self.editing = None;
        self.scene = Scene::from_elements(elements);
        self.selection.clear();
        self.selection.hovered = None;
        self.history.clear();
    }

    /// Switch tools, ending any gesture or text edit in progress.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool == self.tool {
            return;
        }
        self.cancel_gesture(self.input.last_timestamp());
        self.commit_editing();
        log::debug!("Tool changed: {:?} -> {:?}", self.tool, tool);
        self.tool = tool;
    }

    // --- pointer and keyboard ---

    /// Returns whether the board needs to be redrawn.
    pub fn pointer_down(&mut self, input: &PointerInput) -> bool {
        let double_click = self.input.register_click(input);
        let was_editing = self.commit_editing();

        if double_click && input.button == MouseButton::Left && self.tool == ToolKind::Select {
            let point = self.camera.screen_to_board(input.position);
            let hit = self
                .scene
                .hit_test(point, &self.camera, &self.config, self.measure.as_ref(), None);
            if let Some(id) = hit {
                if self.begin_editing(&id) {
                    return true;
                }
            }
        }

        let space_held = self.input.space_held();
        let effect = self.with_gesture(|interaction, ctx| interaction.pointer_down(ctx, input, space_held));
        self.apply_effect(effect, input.timestamp_ms) || was_editing
    }

    pub fn pointer_move(&mut self, input: &PointerInput) -> bool {
        self.input.track(input);
        if !self.interaction.is_active() {
            return self.update_hover(input.position);
        }
        let effect = self.with_gesture(|interaction, ctx| interaction.pointer_move(ctx, input));
        self.apply_effect(effect, input.timestamp_ms);
        true
    }

    pub fn pointer_up(&mut self, input: &PointerInput) -> bool {
        self.input.track(input);
        if !self.interaction.is_active() {
            return false;
        }
        let effect = self.with_gesture(|interaction, ctx| interaction.pointer_up(ctx, input));
        self.apply_effect(effect, input.timestamp_ms);
        // Peers end on the final state even when nothing was committed
        if self.collab.has_pending_live() {
            self.collab.flush_live(&self.scene);
        }
        true
    }

    /// The pointer left the canvas or the host lost pointer capture. An
    /// active gesture is rolled back and creation drafts are discarded.
    pub fn pointer_cancel(&mut self, timestamp_ms: u64) -> bool {
        let hovered = self.selection.hovered.take().is_some();
        if !self.interaction.is_active() {
            return hovered;
        }
        self.cancel_gesture(timestamp_ms);
        true
    }

    fn update_hover(&mut self, screen: Point) -> bool {
        let point = self.camera.screen_to_board(screen);
        let hovered = self
            .scene
            .hit_test(point, &self.camera, &self.config, self.measure.as_ref(), None);
        if hovered == self.selection.hovered {
            return false;
        }
        self.selection.hovered = hovered;
        true
    }

    /// Ctrl/Cmd + wheel zooms at the cursor, plain wheel pans.
    pub fn wheel(&mut self, input: &WheelInput) -> bool {
        if input.modifiers.command() {
            if input.delta.y == 0.0 {
                return false;
            }
            let factor = if input.delta.y < 0.0 {
                WHEEL_ZOOM_IN
            } else {
                WHEEL_ZOOM_OUT
            };
            self.camera.zoom_at(input.position, factor);
        } else {
            self.camera.pan(-input.delta);
        }
        true
    }

    pub fn key_event(&mut self, event: &KeyEvent) -> bool {
        self.input.handle_key_event(event);
        let KeyEvent::Pressed { key, modifiers } = event else {
            return false;
        };

        if self.editing.is_some() {
            // Everything else belongs to the host's text editor
            if key == "Escape" {
                self.cancel_editing();
                return true;
            }
            return false;
        }

        let now = self.input.last_timestamp();
        match key.as_str() {
            "Escape" => {
                if self.interaction.is_active() {
                    self.cancel_gesture(now);
                } else {
                    self.selection.clear();
                }
                true
            }
            "Delete" | "Backspace" => self.delete_selected(),
            k if modifiers.command() && k.eq_ignore_ascii_case("z") => {
                if modifiers.shift {
                    self.redo()
                } else {
                    self.undo()
                }
            }
            k if modifiers.command() && k.eq_ignore_ascii_case("y") => self.redo(),
            k if modifiers.command() && k.eq_ignore_ascii_case("a") => {
                self.select_all();
                true
            }
            _ => false,
        }
    }

    fn cancel_gesture(&mut self, now_ms: u64) {
        let effect = self.with_gesture(|interaction, ctx| interaction.cancel(ctx));
        self.apply_effect(effect, now_ms);
        if self.collab.has_pending_live() {
            self.collab.flush_live(&self.scene);
        }
    }

    // --- effects ---

    fn apply_effect(&mut self, effect: Effect, now_ms: u64) -> bool {
        match effect {
            Effect::None => false,
            Effect::SelectionChanged => true,
            Effect::Live(ids) => {
                self.collab.queue_live(ids, &self.scene, now_ms);
                true
            }
            Effect::Commit { before, edit } => {
                self.commit(before);
                if let Some(id) = edit {
                    self.begin_editing(&id);
                }
                true
            }
            Effect::Rollback(ids) => {
                // Restored states go out right away so peers drop the preview
                self.collab.queue_live(ids, &self.scene, now_ms);
                self.collab.flush_live(&self.scene);
                true
            }
        }
    }

    /// Record `before` for undo and publish everything that changed since.
    fn commit(&mut self, before: Scene) -> SceneDiff {
        let diff = self.collab.publish_diff(&before, &self.scene);
        if !diff.is_empty() {
            self.history.push(before);
        }
        self.dispatch_persistence();
        diff
    }

    // --- editing ---

    /// Open `id` for text editing. Returns false for elements without text.
    pub fn begin_editing(&mut self, id: &str) -> bool {
        let Some(editing) = self.scene.get(id).and_then(EditingState::begin) else {
            return false;
        };
        self.selection.select_only(id);
        self.editing = Some(editing);
        true
    }

    /// Replace the draft text of the element being edited.
    pub fn set_editing_text(&mut self, text: impl Into<String>) {
        if let Some(editing) = self.editing.as_mut() {
            editing.set_text(text, &self.scene, self.measure.as_ref());
        }
    }

    /// Write the draft back. Returns whether an edit was open.
    pub fn commit_editing(&mut self) -> bool {
        let Some(editing) = self.editing.take() else {
            return false;
        };
        let before = self.scene.clone();
        match editing.commit(&mut self.scene) {
            EditOutcome::Unchanged => {}
            EditOutcome::Updated(_) => {
                self.commit(before);
            }
            EditOutcome::Deleted(id) => {
                self.selection.remove(&id);
                self.commit(before);
            }
        }
        true
    }

    pub fn cancel_editing(&mut self) {
        self.editing = None;
    }

    // --- discrete actions ---

    pub fn select_all(&mut self) {
        self.selection.set(self.scene.z_order().to_vec());
    }

    pub fn delete_selected(&mut self) -> bool {
        let ids: Vec<ElementId> = self
            .selection
            .ids()
            .iter()
            .filter(|id| self.scene.contains(id))
            .cloned()
            .collect();
        if ids.is_empty() {
            return false;
        }
        let before = self.scene.clone();
        for id in &ids {
            self.scene.remove(id);
        }
        self.selection.clear();
        if self.selection.hovered.as_ref().is_some_and(|h| ids.contains(h)) {
            self.selection.hovered = None;
        }
        self.commit(before);
        true
    }

    /// Insert elements created outside of a gesture (paste, image drop).
    pub fn insert(&mut self, elements: Vec<BoardElement>) {
        if elements.is_empty() {
            return;
        }
        let before = self.scene.clone();
        let ids: Vec<ElementId> = elements.iter().map(|e| e.id().to_string()).collect();
        for element in elements {
            self.scene.upsert(element);
        }
        self.selection.set(ids);
        self.commit(before);
    }

    pub fn undo(&mut self) -> bool {
        self.step_history(true)
    }

    pub fn redo(&mut self) -> bool {
        self.step_history(false)
    }

    fn step_history(&mut self, undo: bool) -> bool {
        self.cancel_gesture(self.input.last_timestamp());
        self.editing = None;
        let current = self.scene.clone();
        let restored = if undo {
            self.history.undo(current)
        } else {
            self.history.redo(current)
        };
        let Some(restored) = restored else {
            return false;
        };
        let before = std::mem::replace(&mut self.scene, restored);
        let scene = &self.scene;
        self.selection.retain(|id| scene.contains(id));
        self.collab.publish_diff(&before, &self.scene);
        self.dispatch_persistence();
        true
    }

    // --- camera ---

    /// Fit the camera to all content.
    pub fn fit_to_content(&mut self, viewport: Size) {
        match self.scene.content_bounds(self.layout()) {
            Some(bounds) => self.camera.fit_to_bounds(bounds, viewport, FIT_PADDING_PX),
            None => self.camera.reset(),
        }
    }

    // --- collaboration ---

    /// The join message for this board, sent first on every connect.
    pub fn join_envelope(&self, user: UserInfo) -> Envelope {
        Envelope::join(self.board_id(), user)
    }

    /// Send throttled live updates whose interval has elapsed.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        self.collab.poll(&self.scene, now_ms);
        self.collab.has_outgoing()
    }

    pub fn take_outgoing(&mut self) -> Vec<String> {
        self.collab.take_outgoing()
    }

    /// Persistence ops queued while no store is attached.
    pub fn take_persist_ops(&mut self) -> Vec<PersistOp> {
        self.collab.take_persist_ops()
    }

    /// Apply an inbound JSON frame.
    pub fn receive(&mut self, json: &str) -> RemoteChange {
        let change = self
            .collab
            .handle_message(json, &mut self.scene, &mut self.selection, &mut self.editing);
        self.after_remote(change)
    }

    pub fn receive_envelope(&mut self, envelope: Envelope) -> RemoteChange {
        let change = self
            .collab
            .apply_remote(envelope, &mut self.scene, &mut self.selection, &mut self.editing);
        self.after_remote(change)
    }

    fn after_remote(&mut self, change: RemoteChange) -> RemoteChange {
        if let Some(hovered) = self.selection.hovered.clone() {
            if change.deleted.contains(&hovered) {
                self.selection.hovered = None;
            }
        }
        self.interaction
            .absorb_remote(&self.scene, &change.upserted, &change.deleted);
        // A gesture on an element someone else deleted stops where it is
        if change.deleted.iter().any(|id| self.interaction.is_active() && self.interaction.involves(id)) {
            log::debug!("Gesture target deleted remotely, abandoning gesture");
            if let Some(mut before) = self.interaction.abandon() {
                for id in &change.deleted {
                    before.remove(id);
                }
                self.commit(before);
            }
        }
        change
    }

    /// Exchange messages with `client`: apply what arrived, send what is queued.
    pub fn pump(&mut self, client: &mut ChannelClient) -> bool {
        let mut changed = false;
        for event in client.poll_events() {
            match event {
                SyncEvent::Message(envelope) => changed |= !self.receive_envelope(envelope).is_empty(),
                SyncEvent::Error { message } => log::warn!("Channel error: {}", message),
                SyncEvent::Connected | SyncEvent::Disconnected => {}
            }
        }
        for json in self.collab.take_outgoing() {
            if let Err(e) = client.send(json) {
                log::warn!("Failed to send on board {}: {}", self.board_id(), e);
            }
        }
        changed
    }

    // --- persistence ---

    fn dispatch_persistence(&mut self) {
        let Some(worker) = self.persister.as_ref() else {
            return;
        };
        let ops = self.collab.take_persist_ops();
        worker.submit(self.collab.board_id(), ops);
    }

    /// Block until every dispatched persistence call has finished.
    pub fn flush_persistence(&mut self) {
        if let Some(worker) = self.persister.as_ref() {
            worker.flush();
        }
    }

    // --- rendering ---

    /// Render inputs for the current state; hosts add images as needed.
    pub fn render_context(&self, viewport: Size) -> RenderContext<'_> {
        RenderContext::new(
            &self.scene,
            &self.camera,
            &self.selection,
            &self.config,
            self.measure.as_ref(),
            viewport,
        )
        .with_marquee(self.interaction.marquee_rect())
        .with_editing(self.editing.as_ref().map(|e| e.id.as_str()))
    }

    pub fn render(&self, viewport: Size) -> DrawList {
        build_draw_list(&self.render_context(viewport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::persistence::{self, MemoryElementStore};
    use crate::shapes::{Anchor, Binding, LineElement, LineEnd, ShapeKind};
    use kurbo::{Rect, Vec2};

    struct Session {
        board: Board,
        clock: u64,
    }

    impl Session {
        fn new(elements: impl IntoIterator<Item = BoardElement>) -> Self {
            let mut board = Board::new("board-1", EngineConfig::default());
            board.load(elements.into_iter().collect());
            Self { board, clock: 1_000 }
        }

        fn input(&mut self, x: f64, y: f64, step: u64) -> PointerInput {
            self.clock += step;
            PointerInput::new(Point::new(x, y), self.clock)
        }

        fn click(&mut self, x: f64, y: f64) {
            let down = self.input(x, y, 200);
            self.board.pointer_down(&down);
            let up = self.input(x, y, 10);
            self.board.pointer_up(&up);
        }

        fn drag(&mut self, from: (f64, f64), to: (f64, f64), steps: usize) {
            let down = self.input(from.0, from.1, 600);
            self.board.pointer_down(&down);
            for i in 1..=steps {
                let t = i as f64 / steps as f64;
                let p = self.input(from.0 + (to.0 - from.0) * t, from.1 + (to.1 - from.1) * t, 16);
                self.board.pointer_move(&p);
            }
            let up = self.input(to.0, to.1, 16);
            self.board.pointer_up(&up);
        }

        fn key(&mut self, key: &str, modifiers: Modifiers) -> bool {
            self.board.key_event(&KeyEvent::Pressed {
                key: key.into(),
                modifiers,
            })
        }

        fn sent(&mut self) -> Vec<Envelope> {
            self.board
                .take_outgoing()
                .iter()
                .map(|json| Envelope::from_json(json).unwrap())
                .collect()
        }

        fn origin_of(&self, id: &str) -> Point {
            self.board.scene().get(id).map(BoardElement::origin).unwrap()
        }
    }

    fn ctrl() -> Modifiers {
        Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        }
    }

    fn shape(kind: ShapeKind, x: f64, y: f64, w: f64, h: f64) -> BoardElement {
        BoardElement::new_shape(kind, Rect::new(x, y, x + w, y + h))
    }

    #[test]
    fn test_live_updates_throttled_with_final_message() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut s = Session::new([a]);
        // 10 moves 16ms apart span 160ms: at most one live message per 50ms
        s.drag((50.0, 50.0), (150.0, 50.0), 10);
        let sent = s.sent();
        let updates = sent
            .iter()
            .filter(|e| matches!(e, Envelope::ElementUpdate { .. }))
            .count();
        assert!(updates >= 2 && updates <= 6, "got {updates} updates");
        match sent.last() {
            Some(Envelope::ElementUpdate { element, .. }) => {
                assert_eq!(element["id"], id.as_str());
                assert_eq!(element["x"], 100.0);
            }
            other => panic!("expected final update, got {other:?}"),
        }
        assert!(s.board.can_undo());
    }

    #[test]
    fn test_undo_redo_restore_identical_state() {
        let a = shape(ShapeKind::Ellipse, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut s = Session::new([a]);
        let start = s.board.scene().clone();
        s.drag((50.0, 50.0), (90.0, 70.0), 3);
        let moved = s.board.scene().clone();
        s.sent();

        assert!(s.key("z", ctrl()));
        assert_eq!(s.board.scene(), &start);
        assert!(matches!(&s.sent()[..], [Envelope::ElementUpdate { .. }]));

        assert!(s.key("Z", Modifiers { shift: true, ..ctrl() }));
        assert_eq!(s.board.scene(), &moved);
        assert_eq!(s.origin_of(&id), Point::new(40.0, 20.0));
        assert!(!s.board.redo());
    }

    #[test]
    fn test_undo_of_create_broadcasts_delete() {
        let mut s = Session::new([]);
        s.board.set_tool(ToolKind::Rectangle);
        s.drag((0.0, 0.0), (120.0, 80.0), 4);
        assert_eq!(s.board.scene().len(), 1);
        s.sent();
        s.board.undo();
        assert!(s.board.scene().is_empty());
        assert!(s.board.selection().is_empty());
        assert!(matches!(&s.sent()[..], [Envelope::ElementsDelete { ids, .. }] if ids.len() == 1));
    }

    #[test]
    fn test_click_places_note_and_opens_editor() {
        let mut s = Session::new([]);
        s.board.set_tool(ToolKind::StickyNote);
        s.click(300.0, 300.0);
        let id = s.board.editing().map(|e| e.id.clone()).unwrap();
        assert!(s.board.selection().contains(&id));

        s.board.set_editing_text("Ship it");
        // Clicking elsewhere commits the edit
        s.board.set_tool(ToolKind::Select);
        assert!(s.board.editing().is_none());
        assert_eq!(s.board.scene().get(&id).and_then(|e| e.text()), Some("Ship it"));
        let sent = s.sent();
        assert_eq!(sent.len(), 2);
        assert!(s.board.take_persist_ops().iter().any(|op| matches!(op, PersistOp::Create(_))));
    }

    #[test]
    fn test_double_click_opens_editor_and_escape_cancels() {
        let note = shape(ShapeKind::StickyNote, 0.0, 0.0, 200.0, 200.0);
        let id = note.id().to_string();
        let mut s = Session::new([note]);
        s.click(100.0, 100.0);
        s.click(100.0, 100.0);
        assert_eq!(s.board.editing().map(|e| e.id.as_str()), Some(id.as_str()));

        s.board.set_editing_text("draft");
        assert!(s.key("Escape", Modifiers::NONE));
        assert!(s.board.editing().is_none());
        assert_eq!(s.board.scene().get(&id).and_then(|e| e.text()), Some(""));
        assert!(!s.board.can_undo());
    }

    #[test]
    fn test_empty_new_text_is_removed() {
        let mut s = Session::new([]);
        s.board.set_tool(ToolKind::Text);
        s.click(50.0, 50.0);
        assert!(s.board.editing().is_some());
        assert!(s.board.commit_editing());
        assert!(s.board.scene().is_empty());
    }

    #[test]
    fn test_delete_select_all_and_escape() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 50.0, 50.0);
        let b = shape(ShapeKind::Diamond, 100.0, 0.0, 50.0, 50.0);
        let mut s = Session::new([a, b]);
        assert!(s.key("a", ctrl()));
        assert_eq!(s.board.selection().len(), 2);
        assert!(s.key("Escape", Modifiers::NONE));
        assert!(s.board.selection().is_empty());

        s.key("a", ctrl());
        assert!(s.key("Delete", Modifiers::NONE));
        assert!(s.board.scene().is_empty());
        assert!(matches!(&s.sent()[..], [Envelope::ElementsDelete { ids, .. }] if ids.len() == 2));
        assert!(!s.key("Delete", Modifiers::NONE));
    }

    #[test]
    fn test_escape_mid_drag_rolls_back_and_settles_peers() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut s = Session::new([a]);
        let down = s.input(50.0, 50.0, 600);
        s.board.pointer_down(&down);
        let p = s.input(150.0, 50.0, 16);
        s.board.pointer_move(&p);
        s.key("Escape", Modifiers::NONE);
        assert_eq!(s.origin_of(&id), Point::ZERO);
        match s.sent().last() {
            Some(Envelope::ElementUpdate { element, .. }) => assert_eq!(element["x"], 0.0),
            other => panic!("expected restoring update, got {other:?}"),
        }
        assert!(!s.board.can_undo());
    }

    #[test]
    fn test_remote_messages_merge_and_prune() {
        let note = shape(ShapeKind::StickyNote, 0.0, 0.0, 100.0, 100.0);
        let id = note.id().to_string();
        let mut s = Session::new([note]);
        s.board.begin_editing(&id);

        let other_board = format!(
            r#"{{"type":"elementsDelete","payload":{{"boardId":"elsewhere","ids":["{id}"]}}}}"#
        );
        assert!(s.board.receive(&other_board).is_empty());
        assert!(s.board.editing().is_some());

        let incoming = r#"{"type":"elementUpdate","payload":{"boardId":"board-1",
            "element":{"id":"r1","type":"rectangle","x":"10","y":10,"width":50,"height":50}}}"#;
        assert_eq!(s.board.receive(incoming).upserted, vec!["r1".to_string()]);
        assert_eq!(s.origin_of("r1"), Point::new(10.0, 10.0));

        let delete = format!(r#"{{"type":"elementsDelete","payload":{{"boardId":"board-1","ids":["{id}"]}}}}"#);
        assert_eq!(s.board.receive(&delete).deleted, vec![id.clone()]);
        assert!(s.board.editing().is_none());
        assert!(!s.board.selection().contains(&id));
        // Remote changes are not published back
        assert!(s.board.take_outgoing().is_empty());
    }

    #[test]
    fn test_remote_delete_of_dragged_element_abandons_gesture() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let b = shape(ShapeKind::Rectangle, 200.0, 0.0, 100.0, 100.0);
        let (aid, bid) = (a.id().to_string(), b.id().to_string());
        let mut s = Session::new([a, b]);
        s.key("a", ctrl());
        let down = s.input(50.0, 50.0, 600);
        s.board.pointer_down(&down);
        let p = s.input(60.0, 50.0, 16);
        s.board.pointer_move(&p);

        s.board
            .receive_envelope(Envelope::elements_delete("board-1", vec![aid.clone()]));
        assert!(!s.board.interaction().is_active());
        assert!(!s.board.scene().contains(&aid));
        assert_eq!(s.origin_of(&bid), Point::new(210.0, 0.0));

        // Further moves do not resurrect the deleted element
        let p = s.input(90.0, 50.0, 16);
        s.board.pointer_move(&p);
        assert!(!s.board.scene().contains(&aid));
        s.board.undo();
        assert_eq!(s.origin_of(&bid), Point::new(200.0, 0.0));
        assert!(!s.board.scene().contains(&aid));
    }

    fn sent_ids(sent: &[Envelope]) -> Vec<String> {
        let mut ids = Vec::new();
        for envelope in sent {
            match envelope {
                Envelope::ElementUpdate { element, .. } => ids.extend(element["id"].as_str().map(String::from)),
                Envelope::ElementsUpdate { elements, .. } => {
                    ids.extend(elements.iter().filter_map(|e| e["id"].as_str().map(String::from)))
                }
                Envelope::ElementsDelete { ids: deleted, .. } => ids.extend(deleted.iter().cloned()),
                Envelope::JoinBoard { .. } | Envelope::JoinAck { .. } => {}
            }
        }
        ids
    }

    #[test]
    fn test_remote_edits_mid_drag_stay_remote() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let b = shape(ShapeKind::Rectangle, 300.0, 0.0, 100.0, 100.0);
        let (aid, bid) = (a.id().to_string(), b.id().to_string());
        let mut s = Session::new([a, b.clone()]);
        let down = s.input(50.0, 50.0, 600);
        s.board.pointer_down(&down);
        let p = s.input(60.0, 50.0, 16);
        s.board.pointer_move(&p);

        let mut b_remote = b;
        b_remote.translate(Vec2::new(100.0, 0.0));
        let c_remote = shape(ShapeKind::Ellipse, 0.0, 300.0, 50.0, 50.0);
        let cid = c_remote.id().to_string();
        s.board
            .receive_envelope(Envelope::elements_update("board-1", [&b_remote, &c_remote]));

        let p = s.input(80.0, 50.0, 16);
        s.board.pointer_move(&p);
        let up = s.input(80.0, 50.0, 16);
        s.board.pointer_up(&up);

        let ids = sent_ids(&s.sent());
        assert!(ids.iter().all(|id| *id == aid), "republished {ids:?}");
        match &s.board.take_persist_ops()[..] {
            [PersistOp::Update(elements)] => {
                assert_eq!(elements.len(), 1);
                assert_eq!(elements[0].id(), aid);
            }
            other => panic!("expected one update of the dragged element, got {other:?}"),
        }

        // Undo reverts only the drag
        assert!(s.board.undo());
        assert_eq!(s.origin_of(&aid), Point::ZERO);
        assert_eq!(s.origin_of(&bid), Point::new(400.0, 0.0));
        assert!(s.board.scene().contains(&cid));
        assert_eq!(sent_ids(&s.sent()), vec![aid]);
    }

    #[test]
    fn test_pointer_cancel_rolls_back_drag_and_drafts() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut s = Session::new([a]);
        let down = s.input(50.0, 50.0, 600);
        s.board.pointer_down(&down);
        let p = s.input(150.0, 50.0, 16);
        s.board.pointer_move(&p);

        assert!(s.board.pointer_cancel(s.clock + 16));
        assert!(!s.board.interaction().is_active());
        assert_eq!(s.origin_of(&id), Point::ZERO);
        match s.sent().last() {
            Some(Envelope::ElementUpdate { element, .. }) => assert_eq!(element["x"], 0.0),
            other => panic!("expected restoring update, got {other:?}"),
        }
        assert!(!s.board.can_undo());

        s.board.set_tool(ToolKind::Rectangle);
        let down = s.input(400.0, 400.0, 600);
        s.board.pointer_down(&down);
        let p = s.input(500.0, 480.0, 16);
        s.board.pointer_move(&p);
        assert!(s.board.pointer_cancel(s.clock + 16));
        assert_eq!(s.board.scene().len(), 1);
        assert!(s.sent().is_empty());
        assert!(s.board.take_persist_ops().is_empty());
        // Nothing to cancel
        assert!(!s.board.pointer_cancel(s.clock + 32));
    }

    #[test]
    fn test_connector_follows_moved_shape() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let b = shape(ShapeKind::Rectangle, 300.0, 0.0, 100.0, 100.0);
        let mut line = LineElement::new("l".into(), Point::new(100.0, 50.0), Point::new(300.0, 50.0));
        line.start_binding = Some(Binding::new(a.id(), Anchor::Right));
        line.end_binding = Some(Binding::new(b.id(), Anchor::Left));
        let mut s = Session::new([a, b, BoardElement::Line(line)]);

        s.drag((50.0, 20.0), (100.0, 20.0), 2);
        let line = s.board.scene().get("l").and_then(BoardElement::as_line).unwrap();
        let resolved = s.board.scene().resolve_line(line, s.board.layout());
        assert_eq!(resolved.endpoint(LineEnd::Start), Point::new(150.0, 50.0));
        assert_eq!(line.literal(LineEnd::Start), Point::new(100.0, 50.0));
    }

    #[test]
    fn test_frame_drag_carries_contained_note_only() {
        let frame = shape(ShapeKind::Frame, 0.0, 0.0, 400.0, 300.0);
        let inside = shape(ShapeKind::StickyNote, 50.0, 50.0, 100.0, 100.0);
        let outside = shape(ShapeKind::StickyNote, 500.0, 50.0, 100.0, 100.0);
        let (fid, iid, oid) = (
            frame.id().to_string(),
            inside.id().to_string(),
            outside.id().to_string(),
        );
        let mut s = Session::new([frame, inside, outside]);
        // Frames are grabbed by their title label
        s.click(10.0, -10.0);
        assert!(s.board.selection().contains(&fid));
        s.drag((10.0, -10.0), (30.0, 10.0), 2);
        assert_eq!(s.origin_of(&fid), Point::new(20.0, 20.0));
        assert_eq!(s.origin_of(&iid), Point::new(70.0, 70.0));
        assert_eq!(s.origin_of(&oid), Point::new(500.0, 50.0));
    }

    #[test]
    fn test_wheel_zoom_keeps_cursor_point() {
        let mut s = Session::new([]);
        let cursor = Point::new(200.0, 150.0);
        let anchor = s.board.camera().screen_to_board(cursor);
        s.board.wheel(&WheelInput {
            position: cursor,
            delta: Vec2::new(0.0, -1.0),
            modifiers: ctrl(),
        });
        assert!(s.board.camera().zoom > 1.0);
        let after = s.board.camera().screen_to_board(cursor);
        assert!((after - anchor).hypot() < 1e-9);

        s.board.wheel(&WheelInput {
            position: cursor,
            delta: Vec2::new(10.0, 0.0),
            modifiers: Modifiers::NONE,
        });
        assert!(s.board.camera().screen_to_board(cursor).x > after.x);
    }

    #[test]
    fn test_commits_reach_the_store() {
        let store = Arc::new(MemoryElementStore::new());
        let mut board = Board::new("b", EngineConfig::default()).with_store(store.clone());
        let a = shape(ShapeKind::Triangle, 0.0, 0.0, 80.0, 80.0);
        board.insert(vec![a.clone()]);
        board.flush_persistence();
        assert_eq!(pollster::block_on(store.fetch_all("b")).unwrap(), vec![a]);
        assert!(board.take_persist_ops().is_empty());

        board.delete_selected();
        board.flush_persistence();
        assert!(pollster::block_on(store.fetch_all("b")).unwrap().is_empty());
    }

    struct SlowCreateStore(MemoryElementStore);

    impl ElementStore for SlowCreateStore {
        fn create(&self, board_id: &str, element: &BoardElement) -> persistence::BoxFuture<'_, persistence::PersistResult<()>> {
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.0.create(board_id, element)
        }

        fn update(&self, board_id: &str, elements: &[BoardElement]) -> persistence::BoxFuture<'_, persistence::PersistResult<()>> {
            self.0.update(board_id, elements)
        }

        fn delete(&self, board_id: &str, ids: &[ElementId]) -> persistence::BoxFuture<'_, persistence::PersistResult<()>> {
            self.0.delete(board_id, ids)
        }

        fn fetch_all(&self, board_id: &str) -> persistence::BoxFuture<'_, persistence::PersistResult<Vec<BoardElement>>> {
            self.0.fetch_all(board_id)
        }
    }

    #[test]
    fn test_store_sees_commits_in_order() {
        let store = Arc::new(SlowCreateStore(MemoryElementStore::new()));
        let mut board = Board::new("b", EngineConfig::default()).with_store(store.clone());
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 80.0, 80.0);
        let b = shape(ShapeKind::Ellipse, 200.0, 0.0, 80.0, 80.0);
        board.insert(vec![a]);
        board.delete_selected();
        board.insert(vec![b.clone()]);
        board.flush_persistence();
        assert_eq!(pollster::block_on(store.fetch_all("b")).unwrap(), vec![b]);
    }

    #[test]
    fn test_hover_tracks_pointer() {
        let a = shape(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        let id = a.id().to_string();
        let mut s = Session::new([a]);
        let p = s.input(50.0, 50.0, 16);
        assert!(s.board.pointer_move(&p));
        assert_eq!(s.board.selection().hovered.as_deref(), Some(id.as_str()));
        let p = s.input(50.0, 51.0, 16);
        assert!(!s.board.pointer_move(&p));
        let p = s.input(500.0, 500.0, 16);
        assert!(s.board.pointer_move(&p));
        assert!(s.board.selection().hovered.is_none());
    }

    #[test]
    fn test_render_skips_text_being_edited() {
        let mut note = shape(ShapeKind::StickyNote, 0.0, 0.0, 200.0, 200.0);
        note.set_text("visible".into());
        let id = note.id().to_string();
        let mut s = Session::new([note]);
        let has_text = |list: &DrawList| {
            list.board
                .iter()
                .any(|c| matches!(c, crate::render::DrawCommand::Text { .. }))
        };
        assert!(has_text(&s.board.render(Size::new(800.0, 600.0))));
        s.board.begin_editing(&id);
        assert!(!has_text(&s.board.render(Size::new(800.0, 600.0))));
    }
}

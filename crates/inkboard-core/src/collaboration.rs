//! Collaboration management for real-time multi-user editing.
//!
//! Local edits are applied to the scene first and then published: broadcast
//! on the realtime channel and queued for persistence. Remote edits merge by
//! element id, last writer wins.

use crate::canvas::Scene;
use crate::interaction::EditingState;
use crate::persistence::PersistOp;
use crate::protocol::{Envelope, UserInfo, parse_element, parse_elements};
use crate::selection::Selection;
use crate::shapes::{BoardElement, ElementId};

/// Elements touched by a remote message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteChange {
    pub upserted: Vec<ElementId>,
    pub deleted: Vec<ElementId>,
}

impl RemoteChange {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }
}

/// Changes between two scene states.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDiff {
    pub created: Vec<ElementId>,
    pub updated: Vec<ElementId>,
    pub deleted: Vec<ElementId>,
}

impl SceneDiff {
    /// Compare `before` and `after`. Created and updated ids follow the
    /// z-order of `after`; deleted ids the z-order of `before`.
    pub fn between(before: &Scene, after: &Scene) -> Self {
        let mut diff = SceneDiff::default();
        for element in after.ordered() {
            match before.get(element.id()) {
                None => diff.created.push(element.id().to_string()),
                Some(old) if old != element => diff.updated.push(element.id().to_string()),
                Some(_) => {}
            }
        }
        diff.deleted = before
            .z_order()
            .iter()
            .filter(|id| !after.contains(id))
            .cloned()
            .collect();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Manages the outbound broadcast queue, live-update throttling and
/// persistence ops, and merges inbound messages into the scene.
pub struct CollaborationManager {
    board_id: String,
    /// Minimum spacing between live broadcasts.
    interval_ms: u64,
    last_live_ms: Option<u64>,
    /// Ids changed mid-gesture and not yet broadcast.
    pending_live: Vec<ElementId>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    persist: Vec<PersistOp>,
}

impl CollaborationManager {
    pub fn new(board_id: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            board_id: board_id.into(),
            interval_ms,
            last_live_ms: None,
            pending_live: Vec::new(),
            outgoing: Vec::new(),
            persist: Vec::new(),
        }
    }

    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Queue the join message sent on every (re)connect.
    pub fn join(&mut self, user: UserInfo) {
        self.push(Envelope::join(self.board_id.clone(), user));
    }

    /// Record ids changed by an in-progress gesture. They are broadcast at
    /// most once per interval.
    pub fn queue_live(&mut self, ids: impl IntoIterator<Item = ElementId>, scene: &Scene, now_ms: u64) {
        for id in ids {
            if !self.pending_live.contains(&id) {
                self.pending_live.push(id);
            }
        }
        self.poll(scene, now_ms);
    }

    /// Broadcast pending live updates when the throttle interval has elapsed.
    pub fn poll(&mut self, scene: &Scene, now_ms: u64) {
        if self.pending_live.is_empty() {
            return;
        }
        let due = self
            .last_live_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.interval_ms);
        if due {
            self.flush_live(scene);
            self.last_live_ms = Some(now_ms);
        }
    }

    pub fn has_pending_live(&self) -> bool {
        !self.pending_live.is_empty()
    }

    /// Broadcast pending live updates now, regardless of the throttle.
    pub fn flush_live(&mut self, scene: &Scene) {
        let ids = std::mem::take(&mut self.pending_live);
        let elements: Vec<&BoardElement> = ids.iter().filter_map(|id| scene.get(id)).collect();
        self.broadcast_elements(&elements);
    }

    /// Publish the outcome of a committed edit: one broadcast for the
    /// changed elements, one for deletions, and the matching persistence ops.
    ///
    /// Live updates still pending for the same gesture are folded into the
    /// final broadcast so collaborators end on the committed state.
    pub fn publish_diff(&mut self, before: &Scene, after: &Scene) -> SceneDiff {
        let diff = SceneDiff::between(before, after);

        let mut changed: Vec<ElementId> = diff.created.iter().chain(&diff.updated).cloned().collect();
        for id in std::mem::take(&mut self.pending_live) {
            if !changed.contains(&id) && !diff.deleted.contains(&id) {
                changed.push(id);
            }
        }
        let elements: Vec<&BoardElement> = changed.iter().filter_map(|id| after.get(id)).collect();
        self.broadcast_elements(&elements);
        if !diff.deleted.is_empty() {
            self.push(Envelope::elements_delete(self.board_id.clone(), diff.deleted.clone()));
        }

        for id in &diff.created {
            if let Some(element) = after.get(id) {
                self.persist.push(PersistOp::Create(element.clone()));
            }
        }
        let updated: Vec<BoardElement> = diff.updated.iter().filter_map(|id| after.get(id).cloned()).collect();
        if !updated.is_empty() {
            self.persist.push(PersistOp::Update(updated));
        }
        if !diff.deleted.is_empty() {
            self.persist.push(PersistOp::Delete(diff.deleted.clone()));
        }
        diff
    }

    fn broadcast_elements(&mut self, elements: &[&BoardElement]) {
        let envelope = match elements {
            [] => return,
            [single] => Envelope::element_update(self.board_id.clone(), single),
            many => Envelope::elements_update(self.board_id.clone(), many.iter().copied()),
        };
        self.push(envelope);
    }

    fn push(&mut self, envelope: Envelope) {
        match envelope.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::warn!("Failed to encode {} message: {}", self.board_id, e),
        }
    }

    /// Take all pending outgoing messages.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Take all queued persistence operations.
    pub fn take_persist_ops(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.persist)
    }

    /// Parse and apply an inbound JSON frame.
    pub fn handle_message(
        &mut self,
        json: &str,
        scene: &mut Scene,
        selection: &mut Selection,
        editing: &mut Option<EditingState>,
    ) -> RemoteChange {
        match Envelope::from_json(json) {
            Ok(envelope) => self.apply_remote(envelope, scene, selection, editing),
            Err(e) => {
                log::debug!("Ignoring malformed message: {}", e);
                RemoteChange::default()
            }
        }
    }

    /// Merge a remote envelope into the scene.
    ///
    /// Messages for other boards are ignored. Deleted elements leave the
    /// selection, and editing of a deleted element is aborted.
    pub fn apply_remote(
        &mut self,
        envelope: Envelope,
        scene: &mut Scene,
        selection: &mut Selection,
        editing: &mut Option<EditingState>,
    ) -> RemoteChange {
        if envelope.board_id() != self.board_id {
            log::debug!("Ignoring message for board {}", envelope.board_id());
            return RemoteChange::default();
        }
        let mut change = RemoteChange::default();
        match envelope {
            Envelope::ElementUpdate { element, .. } => {
                if let Some(element) = parse_element(&element) {
                    change.upserted.push(element.id().to_string());
                    scene.upsert(element);
                }
            }
            Envelope::ElementsUpdate { elements, .. }
            | Envelope::JoinAck {
                elements: Some(elements),
                ..
            } => {
                for element in parse_elements(&elements) {
                    change.upserted.push(element.id().to_string());
                    scene.upsert(element);
                }
            }
            Envelope::ElementsDelete { ids, .. } => {
                for id in ids {
                    if scene.remove(&id).is_some() {
                        selection.remove(&id);
                        if editing.as_ref().is_some_and(|e| e.id == id) {
                            *editing = None;
                        }
                        change.deleted.push(id);
                    }
                }
            }
            Envelope::JoinBoard { .. } | Envelope::JoinAck { elements: None, .. } => {}
        }
        change
    }
}

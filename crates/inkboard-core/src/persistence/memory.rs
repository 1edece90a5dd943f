//! In-memory element store.

use super::{BoxFuture, ElementStore, PersistError, PersistResult};
use crate::canvas::Scene;
use crate::shapes::{BoardElement, ElementId};
use std::collections::HashMap;
use std::sync::RwLock;

/// Element store held in memory, used by tests and the relay server.
#[derive(Default)]
pub struct MemoryElementStore {
    boards: RwLock<HashMap<String, Scene>>,
}

impl MemoryElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of boards with at least one stored element.
    pub fn board_count(&self) -> usize {
        self.boards
            .read()
            .map(|boards| boards.values().filter(|s| !s.is_empty()).count())
            .unwrap_or(0)
    }
}

fn lock_error(e: impl std::fmt::Display) -> PersistError {
    PersistError::Other(format!("Lock error: {}", e))
}

impl ElementStore for MemoryElementStore {
    fn create(&self, board_id: &str, element: &BoardElement) -> BoxFuture<'_, PersistResult<()>> {
        let board_id = board_id.to_string();
        let element = element.clone();
        Box::pin(async move {
            let mut boards = self.boards.write().map_err(lock_error)?;
            boards.entry(board_id).or_default().upsert(element);
            Ok(())
        })
    }

    /// Unknown ids are inserted; the last write wins.
    fn update(&self, board_id: &str, elements: &[BoardElement]) -> BoxFuture<'_, PersistResult<()>> {
        let board_id = board_id.to_string();
        let elements = elements.to_vec();
        Box::pin(async move {
            let mut boards = self.boards.write().map_err(lock_error)?;
            let scene = boards.entry(board_id).or_default();
            for element in elements {
                scene.upsert(element);
            }
            Ok(())
        })
    }

    fn delete(&self, board_id: &str, ids: &[ElementId]) -> BoxFuture<'_, PersistResult<()>> {
        let board_id = board_id.to_string();
        let ids = ids.to_vec();
        Box::pin(async move {
            let mut boards = self.boards.write().map_err(lock_error)?;
            let scene = boards
                .get_mut(&board_id)
                .ok_or_else(|| PersistError::NotFound(board_id.clone()))?;
            for id in &ids {
                scene.remove(id);
            }
            Ok(())
        })
    }

    fn fetch_all(&self, board_id: &str) -> BoxFuture<'_, PersistResult<Vec<BoardElement>>> {
        let board_id = board_id.to_string();
        Box::pin(async move {
            let boards = self.boards.read().map_err(lock_error)?;
            Ok(boards
                .get(&board_id)
                .map(|scene| scene.ordered().cloned().collect())
                .unwrap_or_default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{LineElement, ShapeKind};
    use kurbo::{Point, Rect};

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

        fn dummy_raw_waker() -> RawWaker {
            fn no_op(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                dummy_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
            RawWaker::new(std::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
        let mut cx = Context::from_waker(&waker);
        let mut f = std::pin::pin!(f);

        loop {
            if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
                return result;
            }
        }
    }

    fn rect() -> BoardElement {
        BoardElement::new_shape(ShapeKind::Rectangle, Rect::new(0.0, 0.0, 50.0, 50.0))
    }

    #[test]
    fn test_create_and_fetch_keeps_order() {
        let store = MemoryElementStore::new();
        let a = rect();
        let b = BoardElement::Line(LineElement::new("l".into(), Point::ZERO, Point::new(10.0, 0.0)));
        block_on(store.create("board", &a)).unwrap();
        block_on(store.create("board", &b)).unwrap();
        assert_eq!(block_on(store.fetch_all("board")).unwrap(), vec![a, b]);
        assert!(block_on(store.fetch_all("other")).unwrap().is_empty());
    }

    #[test]
    fn test_update_replaces_in_place() {
        let store = MemoryElementStore::new();
        let a = rect();
        let b = rect();
        block_on(store.update("board", &[a.clone(), b.clone()])).unwrap();
        let mut moved = a.clone();
        moved.translate(kurbo::Vec2::new(5.0, 5.0));
        block_on(store.update("board", std::slice::from_ref(&moved))).unwrap();
        assert_eq!(block_on(store.fetch_all("board")).unwrap(), vec![moved, b]);
    }

    #[test]
    fn test_delete() {
        let store = MemoryElementStore::new();
        let a = rect();
        block_on(store.create("board", &a)).unwrap();
        block_on(store.delete("board", &[a.id().to_string(), "missing".into()])).unwrap();
        assert!(block_on(store.fetch_all("board")).unwrap().is_empty());
        assert_eq!(store.board_count(), 0);

        let result = block_on(store.delete("nowhere", &["x".into()]));
        assert!(matches!(result, Err(PersistError::NotFound(_))));
    }
}

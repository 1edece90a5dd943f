//! Element persistence interface.
//!
//! The core never waits on persistence: operations are handed to
//! a [`PersistWorker`], which runs them off the UI thread and only logs failures.

mod memory;

pub use memory::MemoryElementStore;

use crate::shapes::{BoardElement, ElementId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Element not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Persistence error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for PersistError {
    fn from(e: serde_json::Error) -> Self {
        PersistError::Serialization(e.to_string())
    }
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Boxed future returned by store operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Element storage keyed by board.
///
/// Elements use the same JSON shape as the realtime channel.
pub trait ElementStore: Send + Sync {
    fn create(&self, board_id: &str, element: &BoardElement) -> BoxFuture<'_, PersistResult<()>>;

    fn update(&self, board_id: &str, elements: &[BoardElement]) -> BoxFuture<'_, PersistResult<()>>;

    fn delete(&self, board_id: &str, ids: &[ElementId]) -> BoxFuture<'_, PersistResult<()>>;

    /// All elements of a board, back to front.
    fn fetch_all(&self, board_id: &str) -> BoxFuture<'_, PersistResult<Vec<BoardElement>>>;
}

/// One queued persistence call.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    Create(BoardElement),
    Update(Vec<BoardElement>),
    Delete(Vec<ElementId>),
}

impl PersistOp {
    pub fn name(&self) -> &'static str {
        match self {
            PersistOp::Create(_) => "create",
            PersistOp::Update(_) => "update",
            PersistOp::Delete(_) => "delete",
        }
    }
}

/// Run one operation against `store`.
pub async fn execute(store: &dyn ElementStore, board_id: &str, op: &PersistOp) -> PersistResult<()> {
    match op {
        PersistOp::Create(element) => store.create(board_id, element).await,
        PersistOp::Update(elements) => store.update(board_id, elements).await,
        PersistOp::Delete(ids) => store.delete(board_id, ids).await,
    }
}

enum Job {
    Run { board_id: String, ops: Vec<PersistOp> },
    Flush(Sender<()>),
}

/// Fire-and-forget persistence on one background thread.
///
/// Jobs run strictly in submission order, so a delete never overtakes the
/// create it follows. Failures are logged and never retried or rolled back.
pub struct PersistWorker {
    jobs: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl PersistWorker {
    pub fn spawn(store: Arc<dyn ElementStore>) -> std::io::Result<Self> {
        let (jobs, rx) = channel();
        let thread = thread::Builder::new()
            .name("inkboard-persist".into())
            .spawn(move || run(store, rx))?;
        Ok(Self {
            jobs: Some(jobs),
            thread: Some(thread),
        })
    }

    /// Queue `ops` behind everything submitted before.
    pub fn submit(&self, board_id: &str, ops: Vec<PersistOp>) {
        if ops.is_empty() {
            return;
        }
        let job = Job::Run {
            board_id: board_id.to_string(),
            ops,
        };
        if self.jobs.as_ref().is_none_or(|jobs| jobs.send(job).is_err()) {
            log::warn!("Persistence worker is gone, dropping ops for board {}", board_id);
        }
    }

    /// Block until every job submitted so far has run.
    pub fn flush(&self) {
        let (done, wait) = channel();
        let Some(jobs) = self.jobs.as_ref() else {
            return;
        };
        if jobs.send(Job::Flush(done)).is_ok() {
            let _ = wait.recv();
        }
    }
}

impl Drop for PersistWorker {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain what is left and exit
        self.jobs = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Persistence thread panicked");
            }
        }
    }
}

fn run(store: Arc<dyn ElementStore>, jobs: Receiver<Job>) {
    for job in jobs {
        match job {
            Job::Run { board_id, ops } => {
                for op in &ops {
                    if let Err(e) = pollster::block_on(execute(store.as_ref(), &board_id, op)) {
                        log::warn!("Persist {} on board {} failed: {}", op.name(), board_id, e);
                    }
                }
            }
            Job::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

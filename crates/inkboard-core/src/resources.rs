//! Image attachments and off-thread resource loading.
//!
//! Loaded resources are cached by resolved URL. Loads run on worker threads
//! and completions are picked up by [`ResourceCache::poll`], after which the
//! host re-renders.

use crate::shapes::{ImageElement, ImageFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use thiserror::Error;

/// Resource loading errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// An uploaded file as returned by the attachment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub url: String,
    pub mime_type: String,
}

/// Resolves attachment ids to fetchable URLs.
pub trait AttachmentStore: Send + Sync {
    fn resolve_url(&self, attachment_id: &str) -> Option<String>;
}

/// Attachment registry kept in memory.
#[derive(Debug, Default)]
pub struct MemoryAttachments {
    by_id: HashMap<String, Attachment>,
}

impl MemoryAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attachment: Attachment) {
        self.by_id.insert(attachment.id.clone(), attachment);
    }
}

impl AttachmentStore for MemoryAttachments {
    fn resolve_url(&self, attachment_id: &str) -> Option<String> {
        self.by_id.get(attachment_id).map(|a| a.url.clone())
    }
}

/// URL of an image's bitmap: the attachment first, then the literal URL.
pub fn resolve_image_url(image: &ImageElement, store: &dyn AttachmentStore) -> Option<String> {
    image
        .attachment_id
        .as_deref()
        .and_then(|id| store.resolve_url(id))
        .or_else(|| image.url.clone())
}

/// Encoded image bytes with what could be read from the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub format: ImageFormat,
    /// Pixel size, when the header could be read.
    pub size: Option<(u32, u32)>,
    pub bytes: Arc<Vec<u8>>,
}

impl Bitmap {
    /// Sniff the format and read the pixel size of PNGs.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ResourceError> {
        let format = ImageFormat::from_magic_bytes(&bytes)
            .ok_or_else(|| ResourceError::Decode("unrecognised image format".into()))?;
        let size = match format {
            ImageFormat::Png => {
                let reader = png::Decoder::new(Cursor::new(bytes.as_slice()))
                    .read_info()
                    .map_err(|e| ResourceError::Decode(e.to_string()))?;
                let info = reader.info();
                Some((info.width, info.height))
            }
            _ => None,
        };
        Ok(Self {
            format,
            size,
            bytes: Arc::new(bytes),
        })
    }
}

/// Fetches raw resource bytes.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<Vec<u8>, ResourceError>;
}

/// Loads `file://` URLs and paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ResourceLoader for FileLoader {
    fn load(&self, url: &str) -> Result<Vec<u8>, ResourceError> {
        let path = self.path_for(url);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound(path.display().to_string()),
            _ => ResourceError::Io(e.to_string()),
        })
    }
}

/// Cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState {
    Loading,
    Ready(Arc<Bitmap>),
    Failed(ResourceError),
}

type Completion = (String, Result<Bitmap, ResourceError>);

/// Keyed cache of decoded resources, filled by worker threads.
pub struct ResourceCache {
    loader: Arc<dyn ResourceLoader>,
    entries: HashMap<String, ResourceState>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl ResourceCache {
    pub fn new(loader: Arc<dyn ResourceLoader>) -> Self {
        let (tx, rx) = channel();
        Self {
            loader,
            entries: HashMap::new(),
            tx,
            rx,
        }
    }

    /// Current state of `key`, starting a load the first time it is asked for.
    pub fn request(&mut self, key: &str) -> &ResourceState {
        if !self.entries.contains_key(key) {
            self.spawn_load(key.to_string());
        }
        self.entries.get(key).unwrap_or(&ResourceState::Loading)
    }

    fn spawn_load(&mut self, key: String) {
        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();
        let worker_key = key.clone();
        let spawned = thread::Builder::new()
            .name("inkboard-resource".into())
            .spawn(move || {
                let result = loader.load(&worker_key).and_then(Bitmap::from_bytes);
                let _ = tx.send((worker_key, result));
            });
        let state = match spawned {
            Ok(_) => ResourceState::Loading,
            Err(e) => ResourceState::Failed(ResourceError::Io(e.to_string())),
        };
        self.entries.insert(key, state);
    }

    pub fn get(&self, key: &str) -> Option<&ResourceState> {
        self.entries.get(key)
    }

    /// Bitmap for `key` if it finished loading.
    pub fn ready(&self, key: &str) -> Option<Arc<Bitmap>> {
        match self.entries.get(key) {
            Some(ResourceState::Ready(bitmap)) => Some(Arc::clone(bitmap)),
            _ => None,
        }
    }

    /// Record finished loads. Returns the keys that completed.
    pub fn poll(&mut self) -> Vec<String> {
        let mut done = Vec::new();
        while let Ok((key, result)) = self.rx.try_recv() {
            let state = match result {
                Ok(bitmap) => ResourceState::Ready(Arc::new(bitmap)),
                Err(e) => {
                    log::warn!("Failed to load resource {}: {}", key, e);
                    ResourceState::Failed(e)
                }
            };
            self.entries.insert(key.clone(), state);
            done.push(key);
        }
        done
    }

    /// Forget `key` so the next request loads it again.
    pub fn evict(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

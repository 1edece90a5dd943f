//! Inkboard Core Library
//!
//! Platform-agnostic scene model, geometry, connector routing, interaction
//! and collaboration logic for the Inkboard whiteboard.

pub mod board;
pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod persistence;
pub mod protocol;
pub mod render;
pub mod resources;
pub mod routing;
pub mod selection;
pub mod shapes;
pub mod sync;
pub mod tools;

pub use board::Board;
pub use camera::Camera;
pub use canvas::{LayoutContext, Scene};
pub use collaboration::{CollaborationManager, RemoteChange, SceneDiff};
pub use config::{ConfigError, EngineConfig};
pub use geometry::{ApproxMeasure, MeasureContext, TransformBounds, bounds_of};
pub use history::History;
pub use input::{InputState, KeyEvent, Modifiers, MouseButton, PointerInput, WheelInput};
pub use interaction::{EditingState, Effect, Interaction, InteractionMode};
pub use persistence::{ElementStore, MemoryElementStore, PersistError, PersistOp, PersistWorker};
pub use protocol::{Envelope, UserInfo, parse_element};
pub use render::{DrawCommand, DrawList, RenderContext, build_draw_list};
pub use resources::{AttachmentStore, ResourceCache};
pub use routing::{ResolvedLine, resolve_line};
pub use selection::{Handle, HandleKind, Selection};
pub use shapes::{BoardElement, ElementId, LineElement, ShapeKind};
pub use sync::{Backoff, ChannelClient, ChannelError, ConnectionState, SyncEvent};
pub use tools::ToolKind;

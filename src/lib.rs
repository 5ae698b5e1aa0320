//! # treelens: runtime inspector backend
//!
//! treelens attaches to a UI host runtime that renders a tree of nodes with
//! double-buffered commits, keeps a shadow copy of the visible tree, and
//! streams every change to a frontend as compact integer operation messages.
//!
//! ## Architecture
//!
//! - **Tracker**: identity registry, filter engine and tree differ, composed
//!   into one [`Renderer`] per attached host
//! - **Protocol**: the operations wire format, its encoder and decoder
//! - **Bridge**: batched, coalescing message queue over a pluggable [`bridge::Wall`]
//! - **Profiling**: per-commit render durations and a span timeline
//! - **Session**: composition root and the frontend command surface
//!
//! ## Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use treelens::{
//!     bridge::ChannelWall, host::{ArenaHost, Element}, scheduler::SystemClock,
//!     InspectorConfig, Session,
//! };
//!
//! let mut host = ArenaHost::new("18.2.0");
//! let root = host.create_root();
//! let config = InspectorConfig::default();
//! let (wall, mut frontend) = ChannelWall::pair(&config.bridge);
//! let mut session = Session::attach(host, wall, &config, Rc::new(SystemClock::new()));
//! session.connect();
//!
//! let report = session.host_mut().render(root, Some(Element::function("App")))?;
//! session.on_commit_root(root, Some(report.priority));
//! session.tick();
//!
//! for message in frontend.messages() {
//!     println!("{} {}", message.event, message.payload);
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod profiling;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod tracker;
pub mod types;

// Re-export commonly used types
pub use bridge::{Bridge, BridgeHandle, BridgeMessage, Wall};
pub use config::{ComponentFilter, InspectorConfig};
pub use error::{InspectorError, Result, ResultExt};
pub use host::{HostRuntime, HostTree, NodeHandle, RootHandle};
pub use protocol::{decode_operations, DecodedOperations, TreeOperation};
pub use session::{Command, Session};
pub use tracker::{Renderer, RendererEvent, ShadowId};
pub use types::{ConsoleKind, ElementType};

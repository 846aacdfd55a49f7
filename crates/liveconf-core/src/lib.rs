//! liveconf-core: Lazily parsed JSON configuration with hot reload
//!
//! Values are addressed by dotted paths with optional sequence indices
//! (`servers[0].host`), decoded on first access and cached per document.
//! A background monitor re-fingerprints registered files and swaps in a
//! fresh document when one changes.
//!
//! # Example
//!
//! ```rust
//! use liveconf_core::Document;
//!
//! let json = r#"{"database": {"host": "localhost", "ports": [5432, 5433]}}"#;
//!
//! let config = Document::from_json_str(json).unwrap();
//! assert_eq!(config.get_string("database.host").unwrap(), "localhost");
//! assert_eq!(config.get_int("database.ports[1]").unwrap(), 5433);
//! ```

pub mod error;
pub mod fileutil;
pub mod monitor;
pub mod path;
pub mod tree;

mod document;
mod registry;

pub use document::{CachedValue, ConfigValue, Document};
pub use error::{Error, ErrorKind, Result};
pub use monitor::{MonitorOptions, ReloadMonitor};
pub use path::{PathExpression, PathResolver, PathSegment};
pub use registry::{ChangeCallback, ConfigRegistry};
pub use tree::{RawFragment, RawTree};

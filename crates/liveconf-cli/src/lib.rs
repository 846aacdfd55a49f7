//! liveconf CLI library
//!
//! Exposes the CLI entry point and the value lookup helpers it is built on.

mod cli;

pub use cli::{lookup, render_text, run, ValueType};

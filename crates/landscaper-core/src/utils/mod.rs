//! Utility functions and helpers.
//!
//! Common functionality used across multiple Landscaper crates.

pub mod path;
pub mod text;

// Re-export commonly used utilities
pub use path::{expand_path, get_extension, normalize_path};
pub use text::{format_command_result, indent_lines};

//! External tool invocation.

pub mod command;

pub use command::{run_tool, ToolSpec};

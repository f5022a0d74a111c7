//! Git operations backing the MCP tool set

pub mod operations;

pub use operations::{GitError, GitOperations};

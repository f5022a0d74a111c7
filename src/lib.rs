//! mcp-git - Git MCP server served over SSE
//!
//! This library provides an MCP (Model Context Protocol) server exposing git
//! operations as tools, carried over an SSE transport on a TCP port.

pub mod git;
pub mod mcp;
pub mod transport;

pub use git::{GitError, GitOperations};
pub use mcp::{InitializationOptions, McpServer, serve_sse};
pub use transport::{MessageReader, MessageWriter, SseTransport, TransportError};

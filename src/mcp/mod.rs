//! MCP protocol server and the SSE serve lifecycle

pub mod server;

pub use server::{InitializationOptions, McpServer, serve_sse};

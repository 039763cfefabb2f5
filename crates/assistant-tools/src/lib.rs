// MCP tool discovery and catalog sync (spec.md §4.8): client transports
// over HTTP/SSE/stdio, header sanitization, and the discover-then-replace
// orchestration that keeps a connector's persisted tool set in sync.

pub mod error;
pub mod headers;
pub mod jsonrpc;
pub mod registry;
pub mod transport;

pub use error::{Result, ToolsError};
pub use headers::sanitize_headers;
pub use registry::sync_connector;
pub use transport::{McpTransport, SseTransport, StdioTransport, StreamableHttpTransport};

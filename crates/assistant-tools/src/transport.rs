// MCP client transports (spec.md §4.8 step 2). Three shapes: a
// one-shot HTTP POST ("StreamableHTTP"), an SSE side-channel, and a
// stdio subprocess — never a shell, per the spawn requirement.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use assistant_contracts::DiscoveredTool;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex};

use crate::headers::sanitize_headers;
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A live connection to an MCP server. `list_tools`/`call_tool` map
/// directly onto the MCP `tools/list` and `tools/call` JSON-RPC methods;
/// `close` releases whatever resource backs the transport (socket,
/// subprocess).
#[async_trait]
pub trait McpTransport: Send {
    async fn list_tools(&mut self) -> anyhow::Result<Vec<DiscoveredTool>>;
    async fn call_tool(&mut self, name: &str, arguments: Value) -> anyhow::Result<Value>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

fn parse_tools_list(result: Value) -> anyhow::Result<Vec<DiscoveredTool>> {
    #[derive(serde::Deserialize)]
    struct RawTool {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(rename = "inputSchema", default = "default_schema")]
        input_schema: Value,
    }
    fn default_schema() -> Value {
        json!({"type": "object", "properties": {}})
    }
    #[derive(serde::Deserialize)]
    struct ToolsList {
        tools: Vec<RawTool>,
    }

    let parsed: ToolsList = serde_json::from_value(result)?;
    Ok(parsed
        .tools
        .into_iter()
        .map(|t| DiscoveredTool { name: t.name, description: t.description, schema: t.input_schema })
        .collect())
}

fn call_tool_params(name: &str, arguments: Value) -> Value {
    json!({ "name": name, "arguments": arguments })
}

// ---------------------------------------------------------------------
// StreamableHTTP: a plain request/response POST per JSON-RPC call.
// ---------------------------------------------------------------------

pub struct StreamableHttpTransport {
    client: reqwest::Client,
    endpoint: String,
    headers: Vec<(String, String)>,
    next_id: u64,
}

impl StreamableHttpTransport {
    pub fn new(endpoint: impl Into<String>, headers: Vec<(String, String)>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self { client, endpoint: endpoint.into(), headers: sanitize_headers(headers), next_id: 0 })
    }

    async fn call(&mut self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.next_id += 1;
        let request = JsonRpcRequest::new(self.next_id, method, params);

        let mut req = self.client.post(&self.endpoint).json(&request);
        for (name, value) in &self.headers {
            req = req.header(name, value);
        }

        let response: JsonRpcResponse = req.send().await?.error_for_status()?.json().await?;
        response.into_result()
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn list_tools(&mut self) -> anyhow::Result<Vec<DiscoveredTool>> {
        let result = self.call("tools/list", json!({})).await?;
        parse_tools_list(result)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> anyhow::Result<Value> {
        self.call("tools/call", call_tool_params(name, arguments)).await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// SSE: requests are POSTed to a side-channel URL, responses arrive over
// the event stream and are correlated back to the request by JSON-RPC id.
// ---------------------------------------------------------------------

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

pub struct SseTransport {
    client: reqwest::Client,
    message_url: String,
    headers: Vec<(String, String)>,
    next_id: u64,
    pending: PendingMap,
    reader_task: tokio::task::JoinHandle<()>,
}

impl SseTransport {
    /// `sse_url` is the long-lived event stream; `message_url` is where
    /// outbound JSON-RPC requests are POSTed (the two are often the same
    /// origin but distinct paths, per the MCP SSE transport convention).
    pub async fn connect(
        sse_url: &str,
        message_url: impl Into<String>,
        headers: Vec<(String, String)>,
    ) -> anyhow::Result<Self> {
        let headers = sanitize_headers(headers);
        let client = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;

        let mut req = client.get(sse_url);
        for (name, value) in &headers {
            req = req.header(name, value);
        }
        let response = req.send().await?.error_for_status()?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pending_for_task = pending.clone();
        let mut stream = response.bytes_stream().eventsource();

        let reader_task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let Ok(event) = event else { continue };
                let Ok(msg) = serde_json::from_str::<JsonRpcResponse>(&event.data) else { continue };
                let Some(id) = msg.id else { continue };
                if let Some(tx) = pending_for_task.lock().await.remove(&id) {
                    let _ = tx.send(msg.result.unwrap_or(Value::Null));
                }
            }
        });

        Ok(Self { client, message_url: message_url.into(), headers, next_id: 0, pending, reader_task })
    }

    async fn call(&mut self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = JsonRpcRequest::new(id, method, params);
        let mut req = self.client.post(&self.message_url).json(&request);
        for (name, value) in &self.headers {
            req = req.header(name, value);
        }
        req.send().await?.error_for_status()?;

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => anyhow::bail!("MCP SSE response channel closed before a reply arrived"),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                anyhow::bail!("timed out waiting for an MCP SSE response")
            }
        }
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn list_tools(&mut self) -> anyhow::Result<Vec<DiscoveredTool>> {
        let result = self.call("tools/list", json!({})).await?;
        parse_tools_list(result)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> anyhow::Result<Value> {
        self.call("tools/call", call_tool_params(name, arguments)).await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.reader_task.abort();
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Stdio: the MCP server is a subprocess speaking newline-delimited
// JSON-RPC over its stdin/stdout. Spawned as an argv list — never
// through a shell, so no command the caller supplies is interpolated.
// ---------------------------------------------------------------------

pub struct StdioTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    next_id: u64,
}

impl StdioTransport {
    pub fn spawn(command: &str, args: &[String]) -> anyhow::Result<Self> {
        let mut child = tokio::process::Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("subprocess has no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("subprocess has no stdout"))?;

        Ok(Self { child, stdin, stdout: BufReader::new(stdout).lines(), next_id: 0 })
    }

    async fn call(&mut self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let request = JsonRpcRequest::new(id, method, params);

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| anyhow::anyhow!("MCP subprocess closed stdout before replying"))?;
            let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&line) else { continue };
            if response.id == Some(id) {
                return response.into_result();
            }
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn list_tools(&mut self) -> anyhow::Result<Vec<DiscoveredTool>> {
        let result = self.call("tools/list", json!({})).await?;
        parse_tools_list(result)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> anyhow::Result<Value> {
        self.call("tools/call", call_tool_params(name, arguments)).await
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.child.start_kill().ok();
        self.child.wait().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_tools_list_result() {
        let result = json!({
            "tools": [
                {"name": "search_mail", "description": "Search mail", "inputSchema": {"type": "object"}},
                {"name": "no_schema_tool"},
            ]
        });

        let tools = parse_tools_list(result).unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "search_mail");
        assert_eq!(tools[1].description, "");
        assert_eq!(tools[1].schema, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn rejects_a_result_with_no_tools_array() {
        assert!(parse_tools_list(json!({"not_tools": []})).is_err());
    }

    #[test]
    fn call_tool_params_wraps_name_and_arguments() {
        let params = call_tool_params("search_mail", json!({"q": "invoice"}));
        assert_eq!(params["name"], "search_mail");
        assert_eq!(params["arguments"]["q"], "invoice");
    }
}

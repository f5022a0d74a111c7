//! MCP server implementation using JSON-RPC over SSE
//!
//! This is a manual implementation of the MCP protocol for maximum control
//! and simpler debugging.

use crate::git::GitOperations;
use crate::transport::{MessageReader, MessageWriter, SseTransport};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::path::PathBuf;

/// JSON-RPC request
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
        }
    }
}

/// Options derived from the server before serving, used to answer `initialize`
#[derive(Debug, Clone)]
pub struct InitializationOptions {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: String,
    pub capabilities: Value,
}

/// MCP server state
pub struct McpServer {
    /// Repository the handlers are bound to; when absent, each tool call
    /// supplies its own `repo_path`
    repository: Option<PathBuf>,
}

impl McpServer {
    pub fn new(repository: Option<PathBuf>) -> Self {
        Self { repository }
    }

    /// Derive the initialization options for this server instance
    pub fn initialization_options(&self) -> InitializationOptions {
        InitializationOptions {
            server_name: "mcp-git".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: "2024-11-05".to_string(),
            capabilities: json!({ "tools": {} }),
        }
    }

    /// Resolve which repository a tool call operates on.
    ///
    /// A server bound at startup always uses its own repository; otherwise
    /// the caller must supply `repo_path` with each request.
    fn resolve_repo(&self, args: &Value) -> Result<PathBuf, String> {
        if let Some(repo) = &self.repository {
            return Ok(repo.clone());
        }
        args.get("repo_path")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .ok_or_else(|| "Missing 'repo_path': server is not bound to a repository".to_string())
    }

    /// Handle a JSON-RPC request and return a response
    fn handle_request(
        &self,
        options: &InitializationOptions,
        request: &JsonRpcRequest,
    ) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id, options),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params.as_ref()),
            _ => {
                JsonRpcResponse::error(id, -32601, format!("Method not found: {}", request.method))
            }
        }
    }

    fn handle_initialize(&self, id: Value, options: &InitializationOptions) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": options.protocol_version,
                "capabilities": options.capabilities,
                "serverInfo": {
                    "name": options.server_name,
                    "version": options.server_version
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let repo_path_schema = json!({
            "type": "string",
            "description": "Path to the Git repository (ignored when the server is bound to one)"
        });

        let tools = json!({
            "tools": [
                {
                    "name": "git_status",
                    "description": "Show the working tree status",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema
                        }
                    }
                },
                {
                    "name": "git_diff_unstaged",
                    "description": "Show changes in the working tree not yet staged",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "context_lines": {"type": "integer", "description": "Lines of context, default 3"}
                        }
                    }
                },
                {
                    "name": "git_diff_staged",
                    "description": "Show changes staged for commit",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "context_lines": {"type": "integer", "description": "Lines of context, default 3"}
                        }
                    }
                },
                {
                    "name": "git_diff",
                    "description": "Show differences between the working tree and a target revision",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "target": {"type": "string", "description": "Branch or revision to compare with"},
                            "context_lines": {"type": "integer", "description": "Lines of context, default 3"}
                        },
                        "required": ["target"]
                    }
                },
                {
                    "name": "git_commit",
                    "description": "Record changes to the repository",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "message": {"type": "string", "description": "Commit message"}
                        },
                        "required": ["message"]
                    }
                },
                {
                    "name": "git_add",
                    "description": "Stage file contents for the next commit",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "files": {"type": "array", "items": {"type": "string"}, "description": "Files to stage"}
                        },
                        "required": ["files"]
                    }
                },
                {
                    "name": "git_reset",
                    "description": "Unstage all staged changes",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema
                        }
                    }
                },
                {
                    "name": "git_log",
                    "description": "Show the commit history",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "max_count": {"type": "integer", "description": "Maximum commits to show, default 10"}
                        }
                    }
                },
                {
                    "name": "git_create_branch",
                    "description": "Create a new branch",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "branch_name": {"type": "string", "description": "Name of the new branch"},
                            "base_branch": {"type": "string", "description": "Base revision, defaults to HEAD"}
                        },
                        "required": ["branch_name"]
                    }
                },
                {
                    "name": "git_checkout",
                    "description": "Switch branches",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "branch_name": {"type": "string", "description": "Branch to check out"}
                        },
                        "required": ["branch_name"]
                    }
                },
                {
                    "name": "git_show",
                    "description": "Show the metadata and patch of a commit",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": repo_path_schema,
                            "revision": {"type": "string", "description": "Revision to show"}
                        },
                        "required": ["revision"]
                    }
                },
                {
                    "name": "git_init",
                    "description": "Initialize a new Git repository",
                    "inputSchema": {
                        "type": "object",
                        "properties": {
                            "repo_path": {"type": "string", "description": "Path to initialize"}
                        },
                        "required": ["repo_path"]
                    }
                }
            ]
        });

        JsonRpcResponse::success(id, tools)
    }

    fn handle_tools_call(&self, id: Value, params: Option<&Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => return JsonRpcResponse::error(id, -32602, "Missing params".to_string()),
        };

        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        let result = match name {
            "git_status" => self.tool_git_status(&args),
            "git_diff_unstaged" => self.tool_git_diff_unstaged(&args),
            "git_diff_staged" => self.tool_git_diff_staged(&args),
            "git_diff" => self.tool_git_diff(&args),
            "git_commit" => self.tool_git_commit(&args),
            "git_add" => self.tool_git_add(&args),
            "git_reset" => self.tool_git_reset(&args),
            "git_log" => self.tool_git_log(&args),
            "git_create_branch" => self.tool_git_create_branch(&args),
            "git_checkout" => self.tool_git_checkout(&args),
            "git_show" => self.tool_git_show(&args),
            "git_init" => self.tool_git_init(&args),
            _ => Err(format!("Unknown tool: {}", name)),
        };

        match result {
            Ok(text) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": text
                    }]
                }),
            ),
            Err(e) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": format!("Error: {}", e)
                    }],
                    "isError": true
                }),
            ),
        }
    }

    fn tool_git_status(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let status = GitOperations::status(&repo).map_err(|e| e.to_string())?;
        Ok(format!("Repository status:\n{}", status))
    }

    fn tool_git_diff_unstaged(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let context = context_lines(args);
        let diff = GitOperations::diff_unstaged(&repo, context).map_err(|e| e.to_string())?;
        Ok(format!("Unstaged changes:\n{}", diff))
    }

    fn tool_git_diff_staged(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let context = context_lines(args);
        let diff = GitOperations::diff_staged(&repo, context).map_err(|e| e.to_string())?;
        Ok(format!("Changes staged for commit:\n{}", diff))
    }

    fn tool_git_diff(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let target = args
            .get("target")
            .and_then(|v| v.as_str())
            .ok_or("Missing 'target'")?;
        let context = context_lines(args);
        let diff = GitOperations::diff(&repo, target, context).map_err(|e| e.to_string())?;
        Ok(format!("Diff with {}:\n{}", target, diff))
    }

    fn tool_git_commit(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or("Missing 'message'")?;
        let hash = GitOperations::commit(&repo, message).map_err(|e| e.to_string())?;
        Ok(format!("Changes committed successfully with hash {}", hash))
    }

    fn tool_git_add(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let files: Vec<String> = args
            .get("files")
            .and_then(|v| v.as_array())
            .ok_or("Missing 'files'")?
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect();
        if files.is_empty() {
            return Err("'files' must contain at least one path".to_string());
        }
        GitOperations::add(&repo, &files).map_err(|e| e.to_string())?;
        Ok("Files staged successfully".to_string())
    }

    fn tool_git_reset(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        GitOperations::reset(&repo).map_err(|e| e.to_string())?;
        Ok("All staged changes reset".to_string())
    }

    fn tool_git_log(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let max_count = args
            .get("max_count")
            .and_then(|v| v.as_u64())
            .unwrap_or(10) as usize;
        let entries = GitOperations::log(&repo, max_count).map_err(|e| e.to_string())?;
        Ok(format!("Commit history:\n{}", entries.join("\n")))
    }

    fn tool_git_create_branch(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let name = args
            .get("branch_name")
            .and_then(|v| v.as_str())
            .ok_or("Missing 'branch_name'")?;
        let base = args.get("base_branch").and_then(|v| v.as_str());
        let base_id =
            GitOperations::create_branch(&repo, name, base).map_err(|e| e.to_string())?;
        Ok(format!("Created branch '{}' from {}", name, base_id))
    }

    fn tool_git_checkout(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let name = args
            .get("branch_name")
            .and_then(|v| v.as_str())
            .ok_or("Missing 'branch_name'")?;
        GitOperations::checkout(&repo, name).map_err(|e| e.to_string())?;
        Ok(format!("Switched to branch '{}'", name))
    }

    fn tool_git_show(&self, args: &Value) -> Result<String, String> {
        let repo = self.resolve_repo(args)?;
        let revision = args
            .get("revision")
            .and_then(|v| v.as_str())
            .ok_or("Missing 'revision'")?;
        GitOperations::show(&repo, revision).map_err(|e| e.to_string())
    }

    fn tool_git_init(&self, args: &Value) -> Result<String, String> {
        // init always takes an explicit path: a bound repository is already valid
        let path = args
            .get("repo_path")
            .and_then(|v| v.as_str())
            .ok_or("Missing 'repo_path'")?;
        let git_dir =
            GitOperations::init(&PathBuf::from(path)).map_err(|e| e.to_string())?;
        Ok(format!("Initialized empty Git repository in {}", git_dir))
    }

    /// Run the serve loop against a transport's paired streams.
    ///
    /// Blocks until the transport closes or `shutdown` completes. Transport
    /// and serialization failures propagate out rather than being swallowed.
    pub async fn run<F>(
        &self,
        mut reader: MessageReader,
        writer: MessageWriter,
        options: InitializationOptions,
        shutdown: F,
    ) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping serve loop");
                    break;
                }
                message = reader.recv() => {
                    let Some(message) = message else {
                        // Transport closed
                        break;
                    };

                    let trimmed = message.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                        Ok(request) => {
                            // Handle notifications (no id) silently
                            if request.id.is_none() {
                                continue;
                            }

                            let response = self.handle_request(&options, &request);
                            writer.send(serde_json::to_string(&response)?)?;
                        }
                        Err(e) => {
                            let response = JsonRpcResponse::error(
                                Value::Null,
                                -32700,
                                format!("Parse error: {}", e),
                            );
                            writer.send(serde_json::to_string(&response)?)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn context_lines(args: &Value) -> u32 {
    args.get("context_lines")
        .and_then(|v| v.as_u64())
        .unwrap_or(3) as u32
}

/// Serve the Git MCP server over SSE.
///
/// Validates the repository (when given), constructs the server, binds the
/// SSE listener and runs the serve loop until `shutdown` completes. An
/// invalid repository is reported and the listener is never bound; a bind
/// failure or an in-loop fault propagates to the caller.
pub async fn serve_sse<F>(
    repository: Option<PathBuf>,
    port: u16,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    if let Some(repo) = &repository {
        if let Err(e) = GitOperations::validate_repository(repo) {
            log::error!("{}", e);
            return Ok(());
        }
        log::info!("Using repository at {}", repo.display());
    }

    let server = McpServer::new(repository);
    let options = server.initialization_options();

    let (transport, reader, writer) = SseTransport::bind(port).await?;
    log::info!(
        "Git MCP server running on SSE port {}",
        transport.local_addr().port()
    );

    // The transport is held for the whole serve loop and released on every
    // exit path when it drops at the end of this scope.
    server.run(reader, writer, options, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::{broadcast, mpsc, oneshot};

    fn setup_git_repo() -> TempDir {
        let temp = TempDir::new().unwrap();

        Command::new("git")
            .args(["init"])
            .current_dir(temp.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@test.com"])
            .current_dir(temp.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(temp.path())
            .output()
            .unwrap();

        temp
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    fn call(server: &McpServer, tool: &str, args: Value) -> Value {
        let options = server.initialization_options();
        let response = server.handle_request(
            &options,
            &request("tools/call", Some(json!({"name": tool, "arguments": args}))),
        );
        serde_json::to_value(&response).unwrap()
    }

    fn content_text(response: &Value) -> String {
        response["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }

    fn tool_names(tools: &Value) -> Vec<String> {
        tools["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_initialize_reports_service_identity() {
        let server = McpServer::new(None);
        let options = server.initialization_options();
        let response = server.handle_request(&options, &request("initialize", None));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["result"]["serverInfo"]["name"], "mcp-git");
        assert_eq!(value["result"]["protocolVersion"], "2024-11-05");
        assert!(value["result"]["capabilities"]["tools"].is_object());
    }

    #[test]
    fn test_tools_list_exposes_git_tool_set() {
        let server = McpServer::new(None);
        let options = server.initialization_options();
        let response = server.handle_request(&options, &request("tools/list", None));
        let names = tool_names(&serde_json::to_value(&response).unwrap());

        for expected in [
            "git_status",
            "git_diff_unstaged",
            "git_diff_staged",
            "git_diff",
            "git_commit",
            "git_add",
            "git_reset",
            "git_log",
            "git_create_branch",
            "git_checkout",
            "git_show",
            "git_init",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_unknown_method_is_an_error() {
        let server = McpServer::new(None);
        let options = server.initialization_options();
        let response = server.handle_request(&options, &request("resources/list", None));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["error"]["code"], -32601);
    }

    #[test]
    fn test_tool_call_with_repo_path() {
        let temp = setup_git_repo();
        let server = McpServer::new(None);

        let response = call(
            &server,
            "git_status",
            json!({"repo_path": temp.path().to_str().unwrap()}),
        );
        let text = content_text(&response);
        assert!(text.starts_with("Repository status:"));
    }

    #[test]
    fn test_missing_repo_path_is_a_tool_error() {
        let server = McpServer::new(None);
        let response = call(&server, "git_status", json!({}));

        assert_eq!(response["result"]["isError"], true);
        assert!(content_text(&response).contains("repo_path"));
    }

    #[test]
    fn test_bound_repository_takes_precedence() {
        let bound = setup_git_repo();
        let other = TempDir::new().unwrap();
        let server = McpServer::new(Some(bound.path().to_path_buf()));

        // repo_path pointing at a non-repo is ignored in favor of the bound one
        let response = call(
            &server,
            "git_status",
            json!({"repo_path": other.path().to_str().unwrap()}),
        );
        assert!(response["result"].get("isError").is_none());
    }

    #[test]
    fn test_add_commit_log_tools() {
        let temp = setup_git_repo();
        std::fs::write(temp.path().join("a.txt"), "content").unwrap();
        let server = McpServer::new(Some(temp.path().to_path_buf()));

        let added = call(&server, "git_add", json!({"files": ["a.txt"]}));
        assert_eq!(content_text(&added), "Files staged successfully");

        let committed = call(&server, "git_commit", json!({"message": "add a.txt"}));
        assert!(content_text(&committed).starts_with("Changes committed successfully with hash "));

        let log = call(&server, "git_log", json!({}));
        assert!(content_text(&log).contains("add a.txt"));
    }

    #[test]
    fn test_invalid_repository_surfaces_as_tool_error() {
        let temp = TempDir::new().unwrap();
        let server = McpServer::new(None);

        let response = call(
            &server,
            "git_status",
            json!({"repo_path": temp.path().to_str().unwrap()}),
        );
        assert_eq!(response["result"]["isError"], true);
        assert!(content_text(&response).contains("is not a valid Git repository"));
    }

    fn test_streams() -> (
        mpsc::Sender<String>,
        broadcast::Receiver<String>,
        MessageReader,
        MessageWriter,
    ) {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, out_rx) = broadcast::channel(8);
        (
            in_tx,
            out_rx,
            MessageReader::new(in_rx),
            MessageWriter::new(out_tx),
        )
    }

    #[tokio::test]
    async fn test_run_dispatches_and_stops_on_shutdown() {
        let (in_tx, mut out_rx, reader, writer) = test_streams();
        let server = McpServer::new(None);
        let options = server.initialization_options();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            server
                .run(reader, writer, options, async {
                    let _ = stop_rx.await;
                })
                .await
        });

        in_tx
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string())
            .await
            .unwrap();
        let response = tokio::time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(response.contains("git_status"));

        stop_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_replies_parse_error_for_garbage() {
        let (in_tx, mut out_rx, reader, writer) = test_streams();
        let server = McpServer::new(None);
        let options = server.initialization_options();

        let task = tokio::spawn(async move {
            server
                .run(reader, writer, options, std::future::pending())
                .await
        });

        in_tx.send("not json".to_string()).await.unwrap();
        let response = tokio::time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(response.contains("-32700"));

        // Closing the transport ends the loop cleanly
        drop(in_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_propagates_write_failure() {
        let (in_tx, _out_rx, reader, writer) = test_streams();
        // Transport released out from under the serve loop
        writer.close();
        let server = McpServer::new(None);
        let options = server.initialization_options();

        let task = tokio::spawn(async move {
            server
                .run(reader, writer, options, std::future::pending())
                .await
        });

        in_tx
            .send(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string())
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_ignores_notifications() {
        let (in_tx, mut out_rx, reader, writer) = test_streams();
        let server = McpServer::new(None);
        let options = server.initialization_options();

        let task = tokio::spawn(async move {
            server
                .run(reader, writer, options, std::future::pending())
                .await
        });

        in_tx
            .send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string())
            .await
            .unwrap();
        in_tx
            .send(json!({"jsonrpc": "2.0", "id": 2, "method": "initialized"}).to_string())
            .await
            .unwrap();

        // Only the second request gets a response
        let response = tokio::time::timeout(Duration::from_secs(5), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(response.contains("\"id\":2"));

        drop(in_tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_resolve_repo_requires_path_when_unbound() {
        let server = McpServer::new(None);
        assert!(server.resolve_repo(&json!({})).is_err());
        assert_eq!(
            server.resolve_repo(&json!({"repo_path": "/tmp/r"})).unwrap(),
            Path::new("/tmp/r")
        );
    }
}

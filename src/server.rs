use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData, RoleServer, ServerHandler, ServiceExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::app::AppContext;
use crate::tools::{self, ToolResponse};

/// MCP handler exposing the tool catalog over one session.
#[derive(Clone)]
pub struct DdmonServer {
    ctx: AppContext,
}

impl DdmonServer {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }
}

/// `tools/list` entries built from the tool catalog.
pub fn tool_list() -> Vec<Tool> {
    tools::catalog()
        .into_iter()
        .map(|definition| {
            let schema = match definition.input_schema {
                Value::Object(schema) => schema,
                _ => Default::default(),
            };
            Tool::new(definition.name, definition.description, Arc::new(schema))
        })
        .collect()
}

fn call_result(response: ToolResponse) -> CallToolResult {
    let content: Vec<Content> = response
        .content
        .into_iter()
        .map(|block| Content::text(block.text))
        .collect();
    if response.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

impl ServerHandler for DdmonServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.ctx.server_name().to_string(),
                version: self.ctx.server_version().to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(
                "Datadog alerts, metrics, logs and monitors, plus heuristic alert analysis."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(tool_list()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let arguments = request.arguments.map(Value::Object).unwrap_or(Value::Null);
        // One anchor for every relative time in this call.
        let now = Utc::now().timestamp();
        let response = tools::call_tool(&self.ctx, &request.name, arguments, now).await;
        Ok(call_result(response))
    }
}

/// Run one MCP session over `transport` until the peer disconnects.
pub async fn serve<R, W>(ctx: AppContext, transport: (R, W)) -> Result<()>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    info!(server = ctx.server_name(), "serving tool calls over stdio");

    let service = DdmonServer::new(ctx)
        .serve(transport)
        .await
        .map_err(|err| anyhow!("failed to start MCP server: {err}"))?;
    service.waiting().await.context("MCP session task failed")?;

    info!("MCP session closed");
    Ok(())
}

// Bridges transport requests to the executor

use crate::comm::{ResponsePayload, ToolRequest};
use crate::executor::{Executor, ToolCall, ToolResult};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

impl From<ToolResult> for ResponsePayload {
    fn from(result: ToolResult) -> Self {
        Self {
            tool_call_id: result.tool_call_id,
            success: result.success,
            output: result.output,
            error: result.error,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

/// Runs every incoming tool call on its own task
pub struct Worker {
    executor: Arc<Executor>,
}

impl Worker {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    /// Dispatch a request without waiting for it
    pub fn handle(&self, request: ToolRequest) -> JoinHandle<()> {
        let executor = self.executor.clone();
        tokio::spawn(async move {
            let ToolRequest {
                tool_call_id,
                tool_name,
                arguments,
                reply,
                source_addr,
            } = request;
            debug!(client = %source_addr, tool_call_id = %tool_call_id, "dispatching tool call");

            let call = ToolCall {
                tool_call_id,
                tool_name,
                arguments,
            };
            let tool_name = call.tool_name.clone();
            let result = executor.dispatch(call).await;
            info!(
                tool_name = %tool_name,
                success = result.success,
                duration_ms = result.execution_time_ms.unwrap_or_default(),
                "tool call finished"
            );

            if reply.send(result.into()).is_err() {
                warn!(tool_name = %tool_name, "requester went away before the result was ready");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use crate::search::{SearchClient, SearchConfig};
    use tokio::sync::oneshot;

    fn worker() -> Worker {
        let search = Arc::new(SearchClient::new(SearchConfig::default()).unwrap());
        Worker::new(Arc::new(Executor::init(ExecutorConfig::default(), search)))
    }

    fn request(
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> (ToolRequest, oneshot::Receiver<ResponsePayload>) {
        let (reply, rx) = oneshot::channel();
        let request = ToolRequest {
            tool_call_id: "call-7".to_string(),
            tool_name: tool_name.to_string(),
            arguments,
            reply,
            source_addr: "127.0.0.1:40000".parse().unwrap(),
        };
        (request, rx)
    }

    #[tokio::test]
    async fn test_shell_call_round_trip() {
        let worker = worker();
        let (req, rx) = request("run_shell", serde_json::json!({"command": "echo hi"}));

        worker.handle(req).await.unwrap();
        let response = rx.await.unwrap();

        assert_eq!(response.tool_call_id, "call-7");
        assert!(response.success);
        assert!(response.output.unwrap().contains("hi"));
        assert!(response.execution_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_failure() {
        let worker = worker();
        let (req, rx) = request("format_disk", serde_json::json!({}));

        worker.handle(req).await.unwrap();
        let response = rx.await.unwrap();

        assert!(!response.success);
        assert!(response.error.unwrap().contains("format_disk"));
        assert!(response.output.is_none());
    }
}

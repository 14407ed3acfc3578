//! Test doubles shared by the agent integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use seopilot_agent::tools::{ToolError, ToolResult, ToolTrait};
use seopilot_agent::{BrainLoop, BrainSettings, ToolRegistry};
use seopilot_provider::{ChatParams, ChatResponse, Provider, ProviderError, ToolCall};
use seopilot_session::ConversationMemory;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns queued responses in order and records every request
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    pub requests: Mutex<Vec<ChatParams>>,
    configured: bool,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
            configured: true,
        }
    }

    pub fn with_results(results: Vec<Result<ChatResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(vec![])
        }
    }

    pub fn requests(&self) -> Vec<ChatParams> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(params);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ChatResponse::text("out of script")))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> String {
        "scripted-model".to_string()
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

/// Always asks for one more tool call, after a delay
pub struct SlowProvider {
    pub delay: Duration,
}

#[async_trait]
impl Provider for SlowProvider {
    async fn chat(&self, _params: ChatParams) -> Result<ChatResponse, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(ChatResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_slow", "echo", r#"{"text":"tick"}"#)],
        ))
    }

    fn name(&self) -> &'static str {
        "slow"
    }

    fn default_model(&self) -> String {
        "slow-model".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Echoes its arguments and counts calls
#[derive(Default)]
pub struct EchoTool {
    pub calls: Arc<Mutex<Vec<Value>>>,
}

#[async_trait]
impl ToolTrait for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the arguments back"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        self.calls.lock().unwrap().push(args.clone());
        Ok(json!({ "echo": args }))
    }
}

/// Always fails
pub struct FailingTool;

#[async_trait]
impl ToolTrait for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    async fn execute(&self, _args: Value) -> ToolResult {
        Err(ToolError::execution("backend unavailable"))
    }
}

/// Registry with `echo` and `broken`, plus a handle on the echo calls
pub fn test_registry() -> (Arc<ToolRegistry>, Arc<Mutex<Vec<Value>>>) {
    let echo = EchoTool::default();
    let calls = Arc::clone(&echo.calls);
    let mut registry = ToolRegistry::new();
    registry.register(echo);
    registry.register(FailingTool);
    (Arc::new(registry), calls)
}

pub fn brain<P: Provider>(
    provider: Arc<P>,
    tools: Arc<ToolRegistry>,
    memory: Arc<ConversationMemory>,
    settings: BrainSettings,
) -> BrainLoop<P> {
    BrainLoop::new(provider, tools, memory, settings)
}

pub fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
    ToolCall::new(id, name, arguments)
}

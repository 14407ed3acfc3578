//! Brain loop: tool-calling orchestration
//!
//! One invocation walks an explicit state machine:
//!
//! ```text
//! AwaitingModel --tool calls--> ExecutingTools --> AwaitingModel
//! AwaitingModel --plain text--> Done
//! AwaitingModel --budget spent--> TimedOut | StepLimitReached
//! ```
//!
//! The time budget is checked only between steps. A slow provider or tool
//! call already in flight is never interrupted, so a run can overrun its
//! budget by the length of that call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use seopilot_config::Config;
use seopilot_provider::{ChatOptions, ChatParams, ChatResponse, Message, Provider, Usage};
use seopilot_session::ConversationMemory;

use crate::context::ContextBuilder;
use crate::tools::{ToolError, ToolRegistry};
use crate::{AgentError, Result};

const TIME_LIMIT_PREFIX: &str = "[Time limit reached]";
const STEP_LIMIT_PREFIX: &str = "[Step limit reached]";
const EMPTY_ANSWER: &str = "Done.";
const SNIPPET_MAX_CHARS: usize = 1500;

/// Loop limits and model options
#[derive(Debug, Clone)]
pub struct BrainSettings {
    pub max_steps: u32,
    pub time_budget: Duration,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Memory entries offered to the model as context
    pub memory_context_entries: usize,
    /// `None` allows every registered tool
    pub allowed_tools: Option<Vec<String>>,
}

impl Default for BrainSettings {
    fn default() -> Self {
        Self {
            max_steps: 6,
            time_budget: Duration::from_secs(60),
            model: None,
            temperature: None,
            max_tokens: None,
            memory_context_entries: 6,
            allowed_tools: None,
        }
    }
}

impl BrainSettings {
    pub fn from_config(config: &Config) -> Self {
        let brain = &config.brain;
        Self {
            max_steps: brain.max_steps,
            time_budget: Duration::from_secs(brain.time_budget_secs),
            model: config.model(),
            temperature: Some(brain.temperature),
            max_tokens: Some(brain.max_tokens),
            memory_context_entries: brain.memory_context_entries,
            allowed_tools: if brain.allowed_tools.is_empty() {
                None
            } else {
                Some(brain.allowed_tools.clone())
            },
        }
    }
}

/// One invocation
#[derive(Debug, Clone, Default)]
pub struct BrainRequest {
    pub prompt: String,
    /// A fresh id is generated when absent
    pub conversation_id: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
    pub max_steps: Option<u32>,
    pub time_budget: Option<Duration>,
    pub model: Option<String>,
}

impl BrainRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn allowed_tools(mut self, tools: Vec<String>) -> Self {
        self.allowed_tools = Some(tools);
        self
    }

    pub fn max_steps(mut self, steps: u32) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// A single tool attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Provider round-trip that requested the call, from 1
    pub step: u32,
    pub tool: String,
    pub input: Value,
    pub output: Option<Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    TimedOut,
    StepLimitReached,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrainResponse {
    pub final_text: String,
    pub tool_trace: Vec<TraceEntry>,
    pub steps_used: u32,
    pub provider: String,
    pub model: String,
    pub conversation_id: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub usage: Usage,
}

/// Loop states
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTools(ChatResponse),
    Done(String),
    TimedOut,
    StepLimitReached,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Done(_) | LoopState::TimedOut | LoopState::StepLimitReached
        )
    }
}

/// Per-invocation bookkeeping
struct Run {
    messages: Vec<Message>,
    trace: Vec<TraceEntry>,
    steps: u32,
    partial: String,
    usage: Usage,
    model: Option<String>,
}

/// Drives a provider through tool calls until it answers
pub struct BrainLoop<P: Provider> {
    provider: Arc<P>,
    tools: Arc<ToolRegistry>,
    memory: Arc<ConversationMemory>,
    context: ContextBuilder,
    settings: BrainSettings,
}

impl<P: Provider> BrainLoop<P> {
    pub fn new(
        provider: Arc<P>,
        tools: Arc<ToolRegistry>,
        memory: Arc<ConversationMemory>,
        settings: BrainSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            memory,
            context: ContextBuilder::new(),
            settings,
        }
    }

    pub fn with_context(mut self, context: ContextBuilder) -> Self {
        self.context = context;
        self
    }

    pub fn settings(&self) -> &BrainSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Fails when the provider has no credential
    pub fn check_provider(&self) -> Result<()> {
        if self.provider.is_configured() {
            Ok(())
        } else {
            Err(AgentError::Configuration(format!(
                "{} provider is not configured: missing API key",
                self.provider.name()
            )))
        }
    }

    /// Run one invocation.
    ///
    /// Tool failures are recorded in the trace and never abort the loop.
    /// Provider failures abort it with no partial result.
    pub async fn run(&self, request: BrainRequest) -> Result<BrainResponse> {
        self.check_provider()?;

        let started = Instant::now();
        let conversation_id = request
            .conversation_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let allow_list = request
            .allowed_tools
            .clone()
            .or_else(|| self.settings.allowed_tools.clone());
        let max_steps = request.max_steps.unwrap_or(self.settings.max_steps);
        let budget = request.time_budget.unwrap_or(self.settings.time_budget);
        let options = ChatOptions {
            model: request.model.clone().or_else(|| self.settings.model.clone()),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        info!(
            "Brain run {} (max {} steps, {}s budget)",
            conversation_id,
            max_steps,
            budget.as_secs()
        );

        let snippet = self
            .memory
            .context_snippet(
                &conversation_id,
                self.settings.memory_context_entries,
                SNIPPET_MAX_CHARS,
            )
            .await;
        let definitions = self.tools.definitions(allow_list.as_deref());

        let mut run = Run {
            messages: self.context.build_messages(&request.prompt, snippet).await,
            trace: Vec::new(),
            steps: 0,
            partial: String::new(),
            usage: Usage::default(),
            model: None,
        };

        let mut state = LoopState::AwaitingModel;
        let (outcome, final_text) = loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if started.elapsed() >= budget {
                        LoopState::TimedOut
                    } else if run.steps >= max_steps {
                        LoopState::StepLimitReached
                    } else {
                        run.steps += 1;
                        debug!("Brain step {} of {}", run.steps, max_steps);

                        let response = self
                            .provider
                            .chat(ChatParams {
                                messages: run.messages.clone(),
                                tools: definitions.clone(),
                                options: options.clone(),
                            })
                            .await?;

                        run.usage.add(&response.usage);
                        if !response.model.is_empty() {
                            run.model = Some(response.model.clone());
                        }
                        if !response.content.trim().is_empty() {
                            run.partial = response.content.clone();
                        }

                        if response.has_tool_calls() {
                            LoopState::ExecutingTools(response)
                        } else {
                            LoopState::Done(response.content)
                        }
                    }
                }
                LoopState::ExecutingTools(response) => {
                    self.execute_tool_calls(&mut run, response, allow_list.as_deref())
                        .await;
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => {
                    let text = if text.trim().is_empty() {
                        EMPTY_ANSWER.to_string()
                    } else {
                        text
                    };
                    break (Outcome::Completed, text);
                }
                LoopState::TimedOut => {
                    warn!("Brain run {} hit its time budget", conversation_id);
                    break (Outcome::TimedOut, best_effort(TIME_LIMIT_PREFIX, &run));
                }
                LoopState::StepLimitReached => {
                    warn!("Brain run {} hit its step limit", conversation_id);
                    break (Outcome::StepLimitReached, best_effort(STEP_LIMIT_PREFIX, &run));
                }
            };
        };

        if outcome == Outcome::Completed {
            self.memory
                .append_exchange(&conversation_id, &request.prompt, &final_text)
                .await;
        }

        let model = run
            .model
            .or(options.model)
            .unwrap_or_else(|| self.provider.default_model());

        Ok(BrainResponse {
            final_text,
            tool_trace: run.trace,
            steps_used: run.steps,
            provider: self.provider.name().to_string(),
            model,
            conversation_id,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            outcome,
            usage: run.usage,
        })
    }

    /// Execute each call in order, appending the request and then its result
    /// before moving to the next call
    async fn execute_tool_calls(
        &self,
        run: &mut Run,
        response: ChatResponse,
        allow_list: Option<&[String]>,
    ) {
        let ChatResponse {
            content,
            tool_calls,
            ..
        } = response;
        let mut content = Some(content);

        for call in tool_calls {
            let input = call.parsed_arguments();
            run.messages.push(Message::assistant_tool_calls(
                content.take(),
                vec![call.clone()],
            ));

            let result = if ToolRegistry::is_allowed(&call.name, allow_list) {
                self.tools.execute(&call.name, input.clone()).await
            } else {
                Err(ToolError::Disallowed(call.name.clone()))
            };

            let (payload, entry) = match result {
                Ok(output) => {
                    debug!("Tool {} succeeded", call.name);
                    let entry = TraceEntry {
                        step: run.steps,
                        tool: call.name.clone(),
                        input,
                        output: Some(output.clone()),
                        success: true,
                        error: None,
                        timestamp: Utc::now(),
                    };
                    (output, entry)
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!("Tool {} failed: {}", call.name, message);
                    let entry = TraceEntry {
                        step: run.steps,
                        tool: call.name.clone(),
                        input,
                        output: None,
                        success: false,
                        error: Some(message.clone()),
                        timestamp: Utc::now(),
                    };
                    (json!({ "error": message }), entry)
                }
            };

            let serialized =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
            run.messages
                .push(Message::tool(&call.id, &call.name, serialized));
            run.trace.push(entry);
        }
    }
}

/// Partial answer for a run that ran out of budget
fn best_effort(prefix: &str, run: &Run) -> String {
    if !run.partial.trim().is_empty() {
        return format!("{} {}", prefix, run.partial.trim());
    }
    if run.trace.is_empty() {
        return format!("{} No answer was produced.", prefix);
    }

    let mut names: Vec<&str> = Vec::new();
    for entry in &run.trace {
        if !names.contains(&entry.tool.as_str()) {
            names.push(&entry.tool);
        }
    }
    let failed = run.trace.iter().filter(|e| !e.success).count();
    format!(
        "{} Ran {} tool call(s) ({}), {} failed, before stopping.",
        prefix,
        run.trace.len(),
        names.join(", "),
        failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(partial: &str, trace: Vec<TraceEntry>) -> Run {
        Run {
            messages: Vec::new(),
            trace,
            steps: 1,
            partial: partial.to_string(),
            usage: Usage::default(),
            model: None,
        }
    }

    fn entry(tool: &str, success: bool) -> TraceEntry {
        TraceEntry {
            step: 1,
            tool: tool.to_string(),
            input: json!({}),
            output: None,
            success,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_best_effort_prefers_partial_text() {
        let text = best_effort(TIME_LIMIT_PREFIX, &run_with("  Half done ", vec![]));
        assert_eq!(text, "[Time limit reached] Half done");
    }

    #[test]
    fn test_best_effort_summarizes_tools() {
        let run = run_with(
            "",
            vec![entry("list_leads", true), entry("fetch_website", false), entry("list_leads", true)],
        );
        let text = best_effort(STEP_LIMIT_PREFIX, &run);
        assert_eq!(
            text,
            "[Step limit reached] Ran 3 tool call(s) (list_leads, fetch_website), 1 failed, before stopping."
        );
    }

    #[test]
    fn test_best_effort_nothing() {
        let text = best_effort(STEP_LIMIT_PREFIX, &run_with("", vec![]));
        assert_eq!(text, "[Step limit reached] No answer was produced.");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!LoopState::AwaitingModel.is_terminal());
        assert!(!LoopState::ExecutingTools(ChatResponse::text("")).is_terminal());
        assert!(LoopState::Done("x".into()).is_terminal());
        assert!(LoopState::TimedOut.is_terminal());
        assert!(LoopState::StepLimitReached.is_terminal());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.brain.allowed_tools = vec!["list_leads".to_string()];
        config.brain.max_steps = 3;
        let settings = BrainSettings::from_config(&config);
        assert_eq!(settings.max_steps, 3);
        assert_eq!(settings.allowed_tools, Some(vec!["list_leads".to_string()]));

        let settings = BrainSettings::from_config(&Config::default());
        assert!(settings.allowed_tools.is_none());
    }
}

//! Anthropic Messages API adapter

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .unwrap_or_else(|| ANTHROPIC_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            default_model: default_model.unwrap_or_else(|| "claude-3-5-sonnet-latest".to_string()),
        }
    }

    fn model_for(&self, params: &ChatParams) -> String {
        params
            .options
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Content blocks for one message, with the wire role it maps to
    fn blocks_for(message: &Message) -> (&'static str, Vec<serde_json::Value>) {
        match message.role {
            Role::Tool => (
                "user",
                vec![json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.text(),
                })],
            ),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !message.text().is_empty() {
                    blocks.push(json!({"type": "text", "text": message.text()}));
                }
                for call in &message.tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": &call.id,
                        "name": &call.name,
                        "input": call.parsed_arguments(),
                    }));
                }
                ("assistant", blocks)
            }
            _ => {
                let blocks = if message.text().is_empty() {
                    Vec::new()
                } else {
                    vec![json!({"type": "text", "text": message.text()})]
                };
                ("user", blocks)
            }
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let system: Vec<&str> = params
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.text())
            .filter(|t| !t.is_empty())
            .collect();

        // The API requires alternating turns, so consecutive same-role messages merge
        let mut turns: Vec<(&'static str, Vec<serde_json::Value>)> = Vec::new();
        for message in params.messages.iter().filter(|m| m.role != Role::System) {
            let (role, blocks) = Self::blocks_for(message);
            if blocks.is_empty() {
                continue;
            }
            let same_role = matches!(turns.last(), Some((last_role, _)) if *last_role == role);
            if same_role {
                if let Some((_, last_blocks)) = turns.last_mut() {
                    last_blocks.extend(blocks);
                }
            } else {
                turns.push((role, blocks));
            }
        }

        let messages: Vec<serde_json::Value> = turns
            .into_iter()
            .map(|(role, content)| json!({"role": role, "content": content}))
            .collect();

        let mut body = json!({
            "model": self.model_for(params),
            "messages": messages,
            "max_tokens": params.options.max_tokens(),
            "temperature": params.options.temperature(),
        });

        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }

        if !params.tools.is_empty() {
            let tools: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "name": &t.name,
                        "description": &t.description,
                        "input_schema": &t.parameters
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!({"type": "auto"});
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value, model: &str) -> Result<ChatResponse> {
        let blocks = json["content"]
            .as_array()
            .ok_or_else(|| ProviderError::InvalidResponse("missing content blocks".to_string()))?;

        let mut text = Vec::new();
        let mut tool_calls = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(t) = block["text"].as_str() {
                        text.push(t.to_string());
                    }
                }
                Some("tool_use") => {
                    let id = block["id"]
                        .as_str()
                        .filter(|id| !id.is_empty())
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| format!("toolu_{}", index));
                    let arguments = if block["input"].is_null() {
                        "{}".to_string()
                    } else {
                        block["input"].to_string()
                    };
                    tool_calls.push(ToolCall {
                        id,
                        name: block["name"].as_str().unwrap_or("").to_string(),
                        arguments,
                    });
                }
                _ => {}
            }
        }

        let input = json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
        let output = json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(ChatResponse {
            content: text.join(""),
            tool_calls,
            finish_reason: json["stop_reason"]
                .as_str()
                .unwrap_or("end_turn")
                .to_string(),
            usage: Usage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: input + output,
            },
            model: json["model"].as_str().unwrap_or(model).to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Provider for AnthropicProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured(self.name().to_string()));
        }

        trace!("Sending messages request to {}", self.api_base);

        let url = format!("{}/messages", self.api_base);
        let model = self.model_for(&params);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let json: serde_json::Value = serde_json::from_str(&text)?;
        let parsed = self.parse_response(json, &model)?;
        debug!("anthropic response: {} tool calls", parsed.tool_calls.len());
        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

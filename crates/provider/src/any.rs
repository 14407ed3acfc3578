//! Closed set of supported backends behind one `Provider`

use crate::anthropic::AnthropicProvider;
use crate::openai::{OpenAiProvider, OPENROUTER_API_BASE};
use crate::{ChatParams, ChatResponse, Provider, ProviderError, Result};

pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
}

impl AnyProvider {
    /// Select a backend by its configured name
    pub fn from_settings(
        kind: &str,
        api_key: impl Into<String>,
        api_base: Option<String>,
        model: Option<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        match kind {
            "openai" => Ok(Self::OpenAi(OpenAiProvider::new(api_key, api_base, model))),
            "openrouter" => {
                let base = api_base.or_else(|| Some(OPENROUTER_API_BASE.to_string()));
                Ok(Self::OpenAi(OpenAiProvider::new(api_key, base, model)))
            }
            "anthropic" => Ok(Self::Anthropic(AnthropicProvider::new(
                api_key, api_base, model,
            ))),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Self::OpenAi(p) => p,
            Self::Anthropic(p) => p,
        }
    }
}

#[async_trait::async_trait]
impl Provider for AnyProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        self.inner().chat(params).await
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn default_model(&self) -> String {
        self.inner().default_model()
    }

    fn is_configured(&self) -> bool {
        self.inner().is_configured()
    }
}

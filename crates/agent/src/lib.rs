//! Brain loop, tool registry and business tools
//!
//! The [`BrainLoop`] drives a provider through tool calls until it answers.
//! [`AppContext`] wires everything from a [`seopilot_config::Config`].

use seopilot_provider::ProviderError;
use thiserror::Error;

pub mod brain;
pub mod context;
pub mod runtime;
pub mod services;
pub mod tools;

pub use brain::{BrainLoop, BrainRequest, BrainResponse, BrainSettings, LoopState, Outcome, TraceEntry};
pub use context::ContextBuilder;
pub use runtime::AppContext;
pub use tools::{ToolError, ToolRegistry, ToolTrait};

/// Errors that end a brain invocation
#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing credential or unknown backend
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider error: {0}")]
    Provider(ProviderError),

    #[error("knowledge error: {0}")]
    Knowledge(#[from] seopilot_knowledge::KnowledgeError),

    #[error("memory error: {0}")]
    Memory(#[from] seopilot_session::MemoryError),

    #[error("tool setup error: {0}")]
    Tool(#[from] ToolError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        if e.is_configuration() {
            AgentError::Configuration(e.to_string())
        } else {
            AgentError::Provider(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;

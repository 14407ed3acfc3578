//! SEOPilot command implementations

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::io::Write;
use tracing::{info, warn};

use seopilot_agent::runtime::vector_index;
use seopilot_agent::{AppContext, BrainRequest, BrainResponse};
use seopilot_config::{self, paths, Config};
use seopilot_intent::IntentParser;
use seopilot_knowledge::{KnowledgeBase, KnowledgeStore};

/// Flags for `pilot ask`
pub struct AskOptions {
    pub message: Option<String>,
    pub conversation: Option<String>,
    pub max_steps: Option<u32>,
    pub tools: Option<Vec<String>>,
    pub trace: bool,
}

impl AskOptions {
    fn request(&self, prompt: &str, conversation: &str) -> BrainRequest {
        let mut request = BrainRequest::new(prompt).conversation(conversation);
        request.max_steps = self.max_steps;
        request.allowed_tools = self.tools.clone().map(|tools| {
            tools
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        });
        request
    }
}

/// Initialize config and data directories
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing SEOPilot...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = seopilot_config::init().await?;
    create_template(&paths::data_dir(), "PERSONA.md", PERSONA_MD).await?;
    create_template(&config.knowledge_dir(), "local-seo-checklist.md", CHECKLIST_MD).await?;

    println!("\n◆ SEOPilot initialized");
    println!("\nNext steps:");
    println!("  1. Add your API key to {}", paths::config_path().display());
    println!("     or export OPENAI_API_KEY / ANTHROPIC_API_KEY / OPENROUTER_API_KEY");
    println!("  2. Drop notes into {}", config.knowledge_dir().display());
    println!("  3. Ask away: pilot ask -m \"What should I check for a dentist in Austin?\"");

    Ok(())
}

async fn create_template(dir: &std::path::Path, filename: &str, content: &str) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(filename);
    if !path.exists() {
        tokio::fs::write(&path, content).await?;
        info!("◆ Created {}", path.display());
    }
    Ok(())
}

fn print_response(response: &BrainResponse, trace: bool) -> Result<()> {
    println!("\n◆ {}", response.final_text);
    if trace {
        println!("{}", serde_json::to_string_pretty(&response.tool_trace)?);
    }
    info!(
        "{} step(s), {} tool call(s), {}ms via {}/{}",
        response.steps_used,
        response.tool_trace.len(),
        response.duration_ms,
        response.provider,
        response.model
    );
    Ok(())
}

/// Ask the assistant, once or interactively
pub async fn ask_command(options: AskOptions) -> Result<()> {
    let config = Config::load().await.context("Failed to load config")?;
    let mut app = AppContext::build(config).await?;
    app.brain
        .check_provider()
        .context("Set an API key in the config file or environment")?;
    app.start_flush();

    let conversation = options
        .conversation
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let outcome = match &options.message {
        Some(message) => ask_once(&app, &options, message, &conversation).await,
        None => ask_interactive(&app, &options, &conversation).await,
    };

    app.shutdown().await?;
    outcome
}

async fn ask_once(
    app: &AppContext,
    options: &AskOptions,
    message: &str,
    conversation: &str,
) -> Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("Message must not be empty");
    }
    let response = app.ask(options.request(message, conversation)).await?;
    print_response(&response, options.trace)
}

async fn ask_interactive(app: &AppContext, options: &AskOptions, conversation: &str) -> Result<()> {
    println!("◆ Interactive mode (type 'exit' to quit)");
    println!("◆ Conversation {}", conversation);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    loop {
        print!("◆ ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match app.ask(options.request(input, conversation)).await {
            Ok(response) => print_response(&response, options.trace)?,
            Err(e) => warn!("Request failed: {}", e),
        }
        println!();
    }

    Ok(())
}

/// Classify text with the intent parser and print the result as JSON
pub fn parse_command(text: String, context: Option<String>) -> Result<()> {
    let context: Map<String, Value> = match context {
        Some(raw) => serde_json::from_str(&raw).context("--context must be a JSON object")?,
        None => Map::new(),
    };

    let parser = IntentParser::new()?;
    let parsed = parser.parse(&text, &context);

    let mut output = serde_json::to_value(&parsed)?;
    output["clarifying_question"] = json!(parsed.clarifying_question());
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Search the knowledge folder
pub async fn knowledge_search_command(query: String, limit: Option<usize>) -> Result<()> {
    let config = Config::load().await?;
    let store = KnowledgeStore::new(
        config.knowledge.max_content_chars,
        config.knowledge.snippet_chars,
    );
    store
        .load_dir(&config.knowledge_dir())
        .await
        .context("Failed to read knowledge folder")?;

    let mut knowledge = KnowledgeBase::new(std::sync::Arc::new(store));
    if let Some(index) = vector_index(&config) {
        match index.load().await {
            Ok(_) => knowledge = knowledge.with_index(std::sync::Arc::new(index)),
            Err(e) => warn!("Vector index unavailable: {}", e),
        }
    }

    let limit = limit.unwrap_or(config.knowledge.default_limit);
    let hits = knowledge.search(&query, limit).await;
    if hits.is_empty() {
        println!("No matches for \"{}\"", query);
        return Ok(());
    }

    for hit in hits {
        println!("◆ {} ({:.2})", hit.title, hit.score);
        println!("  {}", hit.snippet.replace('\n', " "));
    }
    Ok(())
}

/// Re-embed every knowledge file
pub async fn knowledge_rebuild_command() -> Result<()> {
    let config = Config::load().await?;
    let index = vector_index(&config).context(
        "Embeddings are disabled or have no API key; set knowledge.embeddings in the config",
    )?;

    println!("◆ Rebuilding vector index...");
    let count = index
        .rebuild(&config.knowledge_dir())
        .await
        .context("Failed to rebuild vector index")?;
    println!("◆ Indexed {} chunk(s) into {}", count, index.path().display());
    Ok(())
}

fn mark(ok: bool, yes: &str, no: &str) -> String {
    format!("[{}]", if ok { yes } else { no })
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = paths::config_path();

    println!("◆ SEOPilot System Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Config:    {} {}",
        config_path.display(),
        mark(config_path.exists(), "OK", "Missing")
    );

    let config = Config::load().await?;
    let knowledge_dir = config.knowledge_dir();
    println!(
        "Knowledge: {} {}",
        knowledge_dir.display(),
        mark(knowledge_dir.exists(), "OK", "Missing")
    );
    println!("Provider:  {}", config.brain.provider);
    println!(
        "Model:     {}",
        config.model().unwrap_or_else(|| "(provider default)".to_string())
    );
    println!("API Key:   {}", mark(config.has_api_key(), "Set", "Missing"));
    println!(
        "Embeddings: {}",
        mark(config.knowledge.embeddings.enabled, "Enabled", "Disabled")
    );
    println!(
        "Notify:    {}",
        mark(!config.tools.notify.webhook_url.is_empty(), "Webhook", "Simulated")
    );
    println!(
        "Limits:    {} steps, {}s budget",
        config.brain.max_steps, config.brain.time_budget_secs
    );

    println!("\n◆ Ready");
    Ok(())
}

const PERSONA_MD: &str = r#"# Persona overrides

Notes here are appended to the assistant's instructions.

- Sign off client messages with the agency name.
"#;

const CHECKLIST_MD: &str = r#"# Local SEO checklist

- Claim and verify the Google Business Profile.
- Pick a precise primary category and add secondary ones.
- Keep name, address and phone identical across citations.
- Ask every happy customer for a review and reply to all reviews.
- Add location pages with embedded maps and local schema.
"#;

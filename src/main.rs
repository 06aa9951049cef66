// SPDX-License-Identifier: MIT

use agentflow_rs::adk::guardrail::{GuardAction, GuardPattern, RegexGuardrail};
use agentflow_rs::adk::model::factory::{ModelFactory, ProviderType};
use agentflow_rs::adk::Llm;
use agentflow_rs::flow::state::{FieldType, StateFieldDef};
use agentflow_rs::flow::{
    AgentNode, AgentWorkflow, DynamicState, NodeConfig, NodeCore, StateSchema, WorkflowEvent,
};
use agentflow_rs::FrameworkConfig;
use anyhow::Context as _;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file; environment variables fill missing values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one prompt through a single-node workflow
    Run {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// The model to use
        #[arg(short, long)]
        model: Option<String>,

        /// Provider (anthropic, openai, google, lmstudio); inferred from the model name,
        /// or from the models loaded in LM Studio, if omitted
        #[arg(long)]
        provider: Option<String>,

        /// Instruction placed before the prompt
        #[arg(short, long, default_value = "You are a helpful assistant.")]
        instruction: String,

        /// Regex that blocks the answer when it matches
        #[arg(long)]
        block: Vec<String>,

        /// Regex whose matches are redacted from the answer
        #[arg(long)]
        redact: Vec<String>,
    },
    /// List the models served by LM Studio
    Models,
}

/// Answers the `input` field and stores the reply in `output`
struct PromptNode {
    core: NodeCore,
}

#[async_trait]
impl AgentNode<DynamicState> for PromptNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn proc(&self, mut state: DynamicState) -> agentflow_rs::Result<DynamicState> {
        let input = state.get_str("input").unwrap_or_default().to_string();
        let answer = self.core.run_with_instruction(&state, &input, None).await?;
        state.set("output", answer)?;
        Ok(state)
    }
}

fn guardrail(
    name: &str,
    action: GuardAction,
    patterns: &[String],
) -> anyhow::Result<Option<RegexGuardrail>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let patterns = patterns
        .iter()
        .map(|p| GuardPattern::new(p.clone(), action, format!("Matched '{}'", p)))
        .collect();
    Ok(Some(RegexGuardrail::new(name, "Command line patterns", patterns)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FrameworkConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FrameworkConfig::from_env(),
    };
    let factory = ModelFactory::new(config.clone());

    match args.command {
        Commands::Run {
            prompt,
            model,
            provider,
            instruction,
            block,
            redact,
        } => {
            let model_name = model
                .or_else(|| config.default_model.clone())
                .context("No model given; pass --model or set AGENTFLOW_MODEL")?;
            let provider = provider
                .map(|p| p.parse::<ProviderType>())
                .transpose()?;

            let model = factory.create_resolved(&model_name, provider).await?;

            let mut core =
                NodeCore::new(NodeConfig::new("assistant", instruction), Llm::new(model));
            if let Some(g) = guardrail("cli_block", GuardAction::Block, &block)? {
                core.register_guardrail(Arc::new(g));
            }
            if let Some(g) = guardrail("cli_redact", GuardAction::Redact, &redact)? {
                core.register_guardrail(Arc::new(g));
            }

            let node: Arc<dyn AgentNode<DynamicState>> = Arc::new(PromptNode { core });
            let app = AgentWorkflow::new(vec![node])?
                .with_recursion_limit(config.recursion_limit())
                .get_app()?;

            let schema = StateSchema::new()
                .field("input", StateFieldDef::new(FieldType::String).required())
                .field("output", StateFieldDef::new(FieldType::String));
            let state = DynamicState::new(schema, json!({ "input": prompt }))?;

            let (tx, mut rx) = mpsc::channel(16);
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let WorkflowEvent::NodeStarted { node } = event {
                        eprintln!("Running {}...", node);
                    }
                }
            });

            let result = app.invoke_stream(state, tx).await?;
            printer.await?;

            println!("{}", result.get_str("output").unwrap_or_default());
        }
        Commands::Models => {
            for model in factory.list_lmstudio_models().await? {
                println!("{}", model);
            }
        }
    }

    Ok(())
}

//! CLI subcommand handlers.

use crate::render::{activity_line, render_markdown, report_body};
use crate::{Commands, ConfigAction};
use sleuth_core::brain::Brain;
use sleuth_core::config::SleuthConfig;
use sleuth_core::gateway::{GatewayState, run_gateway};
use sleuth_core::providers::create_provider;
use sleuth_core::research::{
    ActivityStatus, ChannelSink, Clarification, DeepResearch, ResearchEvent, ResearchRequest,
    SearchAggregator, generate_questions,
};
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    config: SleuthConfig,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Research {
            topic,
            clarify,
            json,
        } => handle_research(topic, &clarify, json, quiet, &config).await,
        Commands::Questions { topic } => handle_questions(&topic, &config).await,
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            handle_serve(&host, port, &config).await
        }
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

/// Parse a `question=answer` pair.
fn parse_clarification(raw: &str) -> anyhow::Result<Clarification> {
    let (question, answer) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Clarification must look like \"question=answer\": {raw}"))?;
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Clarification question is empty: {raw}");
    }
    Ok(Clarification::new(question, answer.trim()))
}

fn build_brain(config: &SleuthConfig) -> anyhow::Result<Brain> {
    for warning in config.llm.validate().into_iter().chain(config.research.validate()) {
        warn!("{warning}");
    }
    let provider = create_provider(&config.llm)?;
    Ok(Brain::from_config(provider, &config.llm, &config.research))
}

/// Check credentials and assemble the research engine.
fn build_engine(config: &SleuthConfig) -> anyhow::Result<DeepResearch> {
    config.validate_credentials()?;
    let brain = build_brain(config)?;
    let providers = sleuth_tools::build_search_providers(&config.search)?;
    let search = SearchAggregator::new(providers, config.research.max_content_chars);
    Ok(DeepResearch::new(
        Arc::new(brain),
        Arc::new(search),
        config.research.clone(),
    ))
}

async fn handle_research(
    topic: String,
    clarify: &[String],
    json: bool,
    quiet: bool,
    config: &SleuthConfig,
) -> anyhow::Result<()> {
    let clarifications = clarify
        .iter()
        .map(|raw| parse_clarification(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let request = ResearchRequest::new(topic, clarifications)?;
    let engine = Arc::new(build_engine(config)?);

    let (sink, mut rx) = ChannelSink::new();
    let run = tokio::spawn(async move {
        let mut state = request.new_state();
        engine.run(&mut state, Arc::new(sink)).await
    });

    let color = std::io::stderr().is_terminal();
    let mut report = None;
    while let Some(event) = rx.recv().await {
        if json {
            println!("{}", event.to_wire());
            continue;
        }
        match event {
            ResearchEvent::Activity(activity) => {
                if !quiet || activity.status == ActivityStatus::Error {
                    eprintln!("{}", activity_line(&activity, color));
                }
            }
            ResearchEvent::Report(text) => report = Some(text),
        }
    }

    let outcome = run.await?;
    info!(
        phase = %outcome.phase,
        iterations = outcome.iterations,
        findings = outcome.findings,
        steps = outcome.completed_steps,
        tokens = outcome.tokens_used,
        "Research finished"
    );

    if let Some(report) = report {
        let body = report_body(&report);
        if std::io::stdout().is_terminal() {
            println!("{}", render_markdown(body));
        } else {
            println!("{body}");
        }
    }

    if !outcome.is_success() {
        anyhow::bail!(
            "Research failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn handle_questions(topic: &str, config: &SleuthConfig) -> anyhow::Result<()> {
    if topic.trim().is_empty() {
        anyhow::bail!("Topic is required");
    }
    config.validate_credentials()?;
    let brain = build_brain(config)?;
    let model = config.research.models.resolved(brain.model_name()).planning;

    let questions = generate_questions(&brain, &model, topic).await;
    if questions.is_empty() {
        eprintln!("No clarifying questions were generated.");
    }
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {question}", i + 1);
    }
    Ok(())
}

async fn handle_serve(host: &str, port: u16, config: &SleuthConfig) -> anyhow::Result<()> {
    let engine = build_engine(config)?;
    let state = GatewayState::new(Arc::new(engine));
    run_gateway(state, host, port).await?;
    Ok(())
}

fn handle_config(action: ConfigAction, config: &SleuthConfig, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".sleuth");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&SleuthConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{toml_str}");
            Ok(())
        }
    }
}

//! Headless simulation driver
//! Loads configuration, builds one Ollama client and one scheduler manager,
//! seeds a demo roster, and runs until ctrl-c.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crewsim::agents::{
    AgentEventType, PersonnelProfile, SchedulerManager, SchedulerNotification, StaticDirectory,
    TriggerEvent,
};
use crewsim::ai::OllamaClient;
use crewsim::config::{load_config, SimulationConfig};

#[derive(Parser, Debug)]
#[command(name = "crewsim", about = "Autonomous workplace persona simulator")]
struct Args {
    /// Path to a TOML config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the Ollama server URL
    #[arg(long, env = "CREWSIM_OLLAMA_URL")]
    ollama_url: Option<String>,

    /// Override the Ollama model
    #[arg(long, env = "CREWSIM_OLLAMA_MODEL")]
    ollama_model: Option<String>,

    /// Start the scheduler even if the config says disabled
    #[arg(long)]
    force_start: bool,
}

fn demo_roster() -> Vec<PersonnelProfile> {
    vec![
        PersonnelProfile {
            id: "p-iris".to_string(),
            name: "Iris Chen".to_string(),
            title: Some("Staff Engineer".to_string()),
            department: Some("Platform".to_string()),
            bio: Some("Owns the build system and keeps CI green".to_string()),
        },
        PersonnelProfile {
            id: "p-marcus".to_string(),
            name: "Marcus Webb".to_string(),
            title: Some("Product Manager".to_string()),
            department: Some("Product".to_string()),
            bio: Some("Writes the weekly roadmap update".to_string()),
        },
        PersonnelProfile {
            id: "p-sol".to_string(),
            name: "Sol Alvarez".to_string(),
            title: Some("Support Lead".to_string()),
            department: Some("Customer Success".to_string()),
            bio: None,
        },
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut config: SimulationConfig = load_config(args.config.as_deref());
    if let Some(url) = args.ollama_url {
        config.ollama_url = url;
    }
    if let Some(model) = args.ollama_model {
        config.ollama_model = model;
    }

    if !config.enabled && !args.force_start {
        tracing::info!("scheduler disabled in config; pass --force-start to run anyway");
        return Ok(());
    }

    let backend = Arc::new(OllamaClient::new(&config.ollama_url, &config.ollama_model));
    match backend.list_models().await {
        Ok(models) => tracing::info!("Ollama reachable, {} model(s) installed", models.len()),
        Err(e) => tracing::warn!("Ollama probe failed ({e}), agents will stay dormant"),
    }

    let roster = demo_roster();
    let agent_ids: Vec<String> = roster.iter().map(|p| p.id.clone()).collect();
    let directory = Arc::new(StaticDirectory::new(roster));

    let (manager, mut notifications) = SchedulerManager::spawn(backend, directory, agent_ids.clone());
    let agent_count = manager.start(config.clone()).await?;
    tracing::info!("simulation started with {} agent(s)", agent_count);

    // Seed an idle check per agent so the run produces output immediately.
    for agent_id in &agent_ids {
        manager
            .trigger(
                agent_id.clone(),
                TriggerEvent {
                    event_type: AgentEventType::IdleCheck,
                    payload: Default::default(),
                    scheduled_for: None,
                },
            )
            .await?;
    }

    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            match notification {
                SchedulerNotification::AgentStateChanged { state } => {
                    tracing::debug!(
                        "agent {} is {:?} ({} pending)",
                        state.name,
                        state.status,
                        state.pending_action_count
                    );
                }
                SchedulerNotification::EventProcessed { result } => {
                    if result.success {
                        tracing::info!(
                            "action {:?}{}",
                            result.action.kind,
                            result
                                .response
                                .as_deref()
                                .map(|r| format!(": {r}"))
                                .unwrap_or_default()
                        );
                    } else {
                        tracing::warn!(
                            "event failed: {}",
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
                SchedulerNotification::SchedulerError { message } => {
                    tracing::error!("scheduler error: {message}");
                }
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    manager.stop().await?;
    manager.shutdown();
    printer.abort();
    Ok(())
}

//! lexrag - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use lexrag::{
    cli::{Args, Commands, Verbosity},
    config::Config,
    doctor::Doctor,
    rag::RagServices,
    repl::{default_history_file, DisplayManager, ReplSession},
    telemetry::init_tracing,
};
use std::sync::Arc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if let Err(message) = args.validate() {
        eprintln!("{} {}", "Error:".red().bold(), message);
        std::process::exit(2);
    }

    let verbosity = args.verbosity();
    init_tracing(verbosity);

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    match args.resolved_command() {
        Commands::Start => run_repl(&config, verbosity).await?,
        Commands::Ask { question, json } => run_ask(&config, verbosity, &question, json).await?,
        Commands::Doctor => run_doctor(config).await?,
        Commands::Stats => run_stats(&config).await?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}

/// Build services or exit: a pipeline is never served in a degraded state
async fn start_services(config: &Config, verbosity: Verbosity) -> Result<Arc<RagServices>> {
    let display = DisplayManager::new(verbosity.show_progress());
    if verbosity.show_progress() {
        display.show_info("Modeller yükleniyor ve vektör veritabanı kontrol ediliyor...");
    }

    match RagServices::bootstrap(config).await {
        Ok(services) => Ok(services),
        Err(e) => {
            tracing::error!(error = %e, class = ?e.class(), "Startup failed");
            display.show_error(&format!("Startup failed: {}", e));
            display.show_info("Run 'lexrag doctor' for details.");
            std::process::exit(1);
        }
    }
}

async fn run_repl(config: &Config, verbosity: Verbosity) -> Result<()> {
    let services = start_services(config, verbosity).await?;
    let mut repl = ReplSession::new(services, verbosity, default_history_file()).await?;
    repl.run(VERSION).await
}

async fn run_ask(config: &Config, verbosity: Verbosity, question: &str, json: bool) -> Result<()> {
    let services = start_services(config, verbosity).await?;
    let mut pipeline = services.pipeline();

    let display = DisplayManager::new(verbosity.show_progress() && !json);
    let pb = display.start_thinking();
    let payload = pipeline.answer(question).await;
    pb.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if payload.is_success() {
        display.show_answer(&payload.answer);
    } else {
        display.show_error(&payload.answer);
    }

    if !payload.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_doctor(config: Config) -> Result<()> {
    let doctor = Doctor::new(config);
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
}

async fn run_stats(config: &Config) -> Result<()> {
    let services = start_services(config, Verbosity::Quiet).await?;
    let stats = services
        .store()
        .collection_stats()
        .await
        .context("Failed to read collection statistics")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    if shown.chat.api_key.is_some() {
        shown.chat.api_key = Some("***".to_string());
    }
    if shown.vector_store.api_key.is_some() {
        shown.vector_store.api_key = Some("***".to_string());
    }

    println!("{}", "lexrag configuration".bold().cyan());
    if let Ok(path) = Config::config_path() {
        println!("{}", format!("# default file: {}", path.display()).dimmed());
    }
    println!();
    println!("{}", toml::to_string_pretty(&shown).context("Failed to render configuration")?);
    Ok(())
}

//! Trading Arena Runtime
//!
//! Entry point for the autonomous trading agent: CLI parsing, bootstrapping
//! the collaborator clients, and orchestrating the run loop with graceful
//! shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::signal;
use tracing::info;

use arena::agent::{
    run_trading_loop, ConversationState, CycleController, CyclePolicy, RunLoopOptions,
};
use arena::agent::system_prompt::build_system_prompt;
use arena::broker::AlpacaClient;
use arena::config::{load_config, resolve_path};
use arena::inference::OllamaClient;
use arena::search::TavilyClient;
use arena::state::{performance_summary, Database, DecisionRecorder};
use arena::tools::{create_builtin_tools, ToolContext, ToolRegistry};
use arena::types::{ArenaConfig, LogLevel, ToolOutcome};

const VERSION: &str = "0.1.0";

/// Trading Arena -- Autonomous Crypto Trading Agent
#[derive(Parser, Debug)]
#[command(
    name = "arena",
    version = VERSION,
    about = "Trading Arena -- Autonomous Crypto Trading Agent",
    long_about = "Autonomous crypto trading agent. The model makes all decisions via tool calling."
)]
struct Cli {
    /// Start the trading loop
    #[arg(long)]
    run: bool,

    /// Show current configuration and history size
    #[arg(long)]
    status: bool,

    /// Print recent decisions and the performance summary
    #[arg(long)]
    history: bool,

    /// Override the configured model
    #[arg(long)]
    model: Option<String>,

    /// Override seconds between trading cycles
    #[arg(long)]
    interval: Option<u64>,

    /// Override the maximum number of cycles (0 = infinite)
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Reduce logging verbosity
    #[arg(long)]
    quiet: bool,
}

fn init_tracing(config: &ArenaConfig, quiet: bool) {
    let level = if quiet {
        tracing::Level::WARN
    } else {
        match config.log_level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

fn show_status(config: &ArenaConfig) {
    let db_path = resolve_path(&config.db_path);
    let decision_count = Database::open(&db_path)
        .and_then(|db| db.decision_count())
        .unwrap_or(0);

    println!(
        r#"
=== ARENA STATUS ===
Model:      {}
Ollama:     {}
Interval:   {}s
Max cycles: {}
DB path:    {}
Decisions:  {}
Trading:    {}
Version:    {}
====================
"#,
        config.model,
        config.ollama_url,
        config.interval_seconds,
        if config.max_cycles == 0 {
            "infinite".to_string()
        } else {
            config.max_cycles.to_string()
        },
        db_path,
        decision_count,
        if config.alpaca_live_trading {
            "LIVE".red().bold().to_string()
        } else {
            "paper".to_string()
        },
        VERSION,
    );
}

fn show_history(config: &ArenaConfig) -> Result<()> {
    let db_path = resolve_path(&config.db_path);
    let db = Database::open(&db_path).context("Failed to open decision database")?;

    let records = db.get_recent_decisions(20)?;
    if records.is_empty() {
        println!("No decisions recorded yet.");
        return Ok(());
    }

    println!("{}", "Recent decisions:".bold());
    for record in &records {
        let outcome = match &record.result {
            Some(ToolOutcome::Success { .. }) => "ok".green().to_string(),
            Some(ToolOutcome::Failure { .. }) => "failed".red().to_string(),
            None => "-".to_string(),
        };
        println!(
            "#{:<5} {} {:<20} [{}]",
            record.decision_id,
            record.timestamp,
            record.action,
            outcome
        );
        if !record.reasoning.is_empty() {
            let preview: String = record.reasoning.chars().take(160).collect();
            println!("       {}", preview.dimmed());
        }
    }

    let all = db.get_all_decisions()?;
    println!(
        "\n{}\n{}",
        "Performance summary:".bold(),
        serde_json::to_string_pretty(&performance_summary(&all))?
    );
    Ok(())
}

/// Build every subsystem and drive the run loop until completion or a stop
/// signal.
async fn run(config: ArenaConfig) -> Result<()> {
    println!("{}", "=".repeat(60));
    println!("{}", "AUTONOMOUS CRYPTO TRADING AGENT".bold());
    println!("Model: {}", config.model);
    println!("Cycle interval: {}s", config.interval_seconds);
    println!(
        "Max cycles: {}",
        if config.max_cycles == 0 {
            "infinite".to_string()
        } else {
            config.max_cycles.to_string()
        }
    );
    println!("{}", "=".repeat(60));
    if config.alpaca_live_trading {
        println!(
            "{}",
            "WARNING: live trading is enabled. This agent will place real orders."
                .red()
                .bold()
        );
    } else {
        println!("Paper trading endpoint in use.");
    }
    println!("Press Ctrl+C to stop the agent.\n");

    let db_path = resolve_path(&config.db_path);
    let db = Arc::new(Mutex::new(
        Database::open(&db_path).context("Failed to open decision database")?,
    ));
    let recorder =
        DecisionRecorder::load(Arc::clone(&db)).context("Failed to load decision history")?;
    info!(
        history = recorder.all().len(),
        db_path = %db_path,
        "decision history loaded"
    );

    let broker = Arc::new(AlpacaClient::new(
        config.alpaca_api_key.clone(),
        config.alpaca_secret_key.clone(),
        config.alpaca_live_trading,
    ));
    let search = Arc::new(TavilyClient::new(config.tavily_api_key.clone()));
    let model = Arc::new(OllamaClient::new(
        config.ollama_url.clone(),
        config.model.clone(),
    ));

    let registry =
        ToolRegistry::new(create_builtin_tools()).context("Failed to build tool registry")?;
    info!(tools = registry.len(), "tool registry constructed");

    let ctx = ToolContext {
        broker,
        search,
        db,
    };
    let conversation = ConversationState::new(
        build_system_prompt(&config.model),
        config.max_context_turns,
    );
    let policy = CyclePolicy {
        max_tool_iterations: config.max_tool_iterations,
        ..CyclePolicy::default()
    };

    let stop = Arc::new(AtomicBool::new(false));
    let mut controller = CycleController::new(
        registry,
        model,
        ctx,
        recorder,
        conversation,
        policy,
        Arc::clone(&stop),
    );

    let options = RunLoopOptions {
        interval: Duration::from_secs(config.interval_seconds),
        max_cycles: config.max_cycles,
        stop: Arc::clone(&stop),
    };

    let mut loop_handle =
        tokio::spawn(async move { run_trading_loop(&mut controller, options).await });

    // Cooperative shutdown: the signal only raises the stop flag; the loop
    // finishes its in-flight tool call and records the cycle before exiting.
    let stop_on_signal = Arc::clone(&stop);
    let shutdown = async {
        let ctrl_c = signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT, requesting graceful stop"),
                _ = sigterm.recv() => info!("received SIGTERM, requesting graceful stop"),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to register Ctrl+C handler");
            info!("received shutdown signal, requesting graceful stop");
        }
        stop_on_signal.store(true, Ordering::SeqCst);
    };

    let summary = tokio::select! {
        result = &mut loop_handle => result.context("run loop task failed")?,
        _ = shutdown => {
            // Wait for the loop to wind down cleanly.
            loop_handle.await.context("run loop task failed")?
        }
    };

    println!(
        "\nAgent stopped. Cycles: {} | Trades: {}{}",
        summary.cycles_completed,
        summary.trades_executed,
        if summary.cancelled { " | cancelled" } else { "" }
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = load_config();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(interval) = cli.interval {
        config.interval_seconds = interval;
    }
    if let Some(max_cycles) = cli.max_cycles {
        config.max_cycles = max_cycles;
    }

    if cli.status {
        show_status(&config);
        return;
    }

    if cli.history {
        if let Err(e) = show_history(&config) {
            eprintln!("Failed to read history: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    if cli.run {
        init_tracing(&config, cli.quiet);
        if let Err(e) = run(config).await {
            eprintln!("Fatal: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    println!("Run \"arena --help\" for usage information.");
    println!("Run \"arena --run\" to start the agent.");
}

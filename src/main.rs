//! Main entry point for the alliance-skill service
//!
//! `serve` runs the long-lived service with health endpoints and periodic
//! rebuilds. The remaining subcommands rebuild once from the match log and
//! answer a single query.

use alliance_skill::config::{validate_config, AppConfig};
use alliance_skill::match_log::JsonFileMatchSource;
use alliance_skill::rating::TrueSkillRatingCalculator;
use alliance_skill::service::{AppState, HealthCheck, PredictionService};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Alliance Skill - TrueSkill ratings and win probabilities for alliance matches
#[derive(Parser)]
#[command(
    name = "alliance-skill",
    version,
    about = "Skill ratings and alliance win probabilities from a match history",
    long_about = "Alliance Skill replays a chronological log of red-versus-blue alliance \
                 matches through a two-team TrueSkill update and answers win-probability, \
                 team-detail and accuracy queries against the resulting ratings."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Match log override
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Override the JSON match log path"
    )]
    matches: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without loading matches")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the service with health endpoints and periodic rebuilds
    Serve,
    /// Show the rating of one team
    Details {
        /// Team identifier (case-insensitive)
        team: String,
    },
    /// Predict the chance that the red alliance beats the blue alliance
    Predict {
        #[arg(long, num_args = 1..=3, required = true)]
        red: Vec<String>,
        #[arg(long, num_args = 1..=3, required = true)]
        blue: Vec<String>,
    },
    /// Replay the match log against the final ratings
    Accuracy,
    /// List every team with a rating
    Teams,
    /// Show teams ordered by skill estimate
    Leaderboard {
        #[arg(short = 'n', long, default_value_t = 25)]
        limit: usize,
    },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                info!("Received SIGINT (Ctrl+C) signal");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM signal");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received SIGINT (Ctrl+C) signal");
    }

    Ok(())
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Alliance Skill Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   Match log: {}", config.data.match_log_path.display());
    info!(
        "   Rating: mu0={}, sigma0={:.3}, beta={}, sigma_min={}, draw_probability={}",
        config.rating.initial_mu,
        config.rating.initial_sigma,
        config.rating.beta,
        config.rating.sigma_min,
        config.rating.draw_probability
    );
    match config.rebuild_interval() {
        Some(interval) => info!("   Rebuild interval: {}s", interval.as_secs()),
        None => info!("   Rebuild interval: disabled"),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment, file and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(matches) = &args.matches {
        config.data.match_log_path = matches.clone();
    }

    validate_config(&config)?;
    Ok(config)
}

/// Build a prediction service over the configured match log and train it once
async fn trained_service(config: &AppConfig) -> Result<PredictionService> {
    let calculator = TrueSkillRatingCalculator::new(config.rating.clone())?;
    let source = JsonFileMatchSource::new(config.data.match_log_path.clone());
    let service = PredictionService::new(Arc::new(source), Arc::new(calculator));

    let snapshot = service
        .rebuild()
        .await
        .with_context(|| format!("Failed to rate {}", config.data.match_log_path.display()))?;

    if snapshot.info().matches_rejected > 0 {
        warn!(
            "{} match records were rejected; run with --debug for details",
            snapshot.info().matches_rejected
        );
    }

    Ok(service)
}

async fn run_query(service: &PredictionService, command: Command) -> Result<()> {
    match command {
        Command::Serve => anyhow::bail!("serve is not a one-shot query"),
        Command::Details { team } => {
            let rating = service.team_detail(&team)?;
            println!("Team {}", team.trim().to_uppercase());
            println!("  mu:    {:.3}", rating.mu);
            println!("  sigma: {:.3}", rating.sigma);
        }
        Command::Predict { red, blue } => {
            let red_win = service.win_probability(&red, &blue)?;
            println!("Red alliance:  {}", red.join(", "));
            println!("Blue alliance: {}", blue.join(", "));
            println!("Red win probability:  {:.2}%", red_win);
            println!("Blue win probability: {:.2}%", 100.0 - red_win);
        }
        Command::Accuracy => {
            let report = service.evaluate_accuracy().await?;
            println!("Self-consistency accuracy: {}", report);
        }
        Command::Teams => {
            let teams = service.list_known_teams();
            println!("{} teams", teams.len());
            for team in teams {
                println!("  {}", team);
            }
        }
        Command::Leaderboard { limit } => {
            for (rank, entry) in service.leaderboard(Some(limit)).iter().enumerate() {
                println!(
                    "{:>4}. {:<10} mu {:>7.3}  sigma {:>6.3}  ({} matches)",
                    rank + 1,
                    entry.team_id,
                    entry.rating.mu,
                    entry.rating.sigma,
                    entry.matches_played
                );
            }
        }
    }

    Ok(())
}

async fn run_service(config: AppConfig) -> Result<()> {
    display_startup_banner(&config);

    let mut app_state = AppState::new(config)?;
    app_state.start().await?;

    let health = HealthCheck::check(&app_state.prediction(), &app_state.config().service.name);
    info!("Health after startup: {}", health.status);
    info!("✅ Alliance Skill Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await?;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    if let Err(e) = app_state.shutdown().await {
        warn!("⚠️  Shutdown completed with errors: {}", e);
    }

    info!("🛑 Alliance Skill Service stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without loading matches");
        return Ok(());
    }

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_service(config).await,
        command => match trained_service(&config).await {
            Ok(service) => run_query(&service, command).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

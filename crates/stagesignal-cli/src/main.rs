//! stagesignal command line interface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use stagesignal_core::load_app_config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "stagesignal")]
#[command(about = "Weekly engagement-signal pipeline for Broadway shows")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Collect raw signals from every configured source.
    Pull(PullArgs),
    /// Aggregate raw signals into the canonical weekly panel.
    Panel(PanelArgs),
    /// Run the quality gate over a panel and write the validation report.
    Validate(ValidateArgs),
    /// Fit the lagged causality models against a modeling panel.
    Model(ModelArgs),
}

#[derive(Debug, clap::Args)]
struct PullArgs {
    /// First day of the collection window (YYYY-MM-DD).
    #[arg(long)]
    start: NaiveDate,
    /// Last day of the collection window (YYYY-MM-DD).
    #[arg(long)]
    end: NaiveDate,
    /// Search-interest gateway root; the source is skipped when unset.
    #[arg(long, env = "SIGNAL_TRENDS_BASE_URL")]
    trends_base_url: Option<String>,
    /// Short-video gateway root; the source is skipped when unset.
    #[arg(long, env = "SIGNAL_VIDEO_BASE_URL")]
    video_base_url: Option<String>,
    /// Photo-feed gateway root; the source is skipped when unset.
    #[arg(long, env = "SIGNAL_PHOTO_BASE_URL")]
    photo_base_url: Option<String>,
    /// Forum API root override (defaults to the public endpoint).
    #[arg(long, env = "SIGNAL_FORUM_BASE_URL")]
    forum_base_url: Option<String>,
}

#[derive(Debug, clap::Args)]
struct PanelArgs {
    /// Raw-item JSON files from `pull`; later files win on duplicate ids.
    #[arg(long, required = true, num_args = 1..)]
    raw: Vec<PathBuf>,
    /// Output directory (defaults to the configured data dir).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Override the panel's first week (defaults to the earliest item).
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Override the panel's last week (defaults to the latest item).
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Debug, clap::Args)]
struct ValidateArgs {
    /// Panel CSV to validate.
    #[arg(long)]
    panel: PathBuf,
    /// Where to write the validation report JSON.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Outcome {
    Gross,
    CapacityPct,
    AvgTicketPrice,
}

impl Outcome {
    fn column(self) -> &'static str {
        match self {
            Outcome::Gross => "gross",
            Outcome::CapacityPct => "capacity_pct",
            Outcome::AvgTicketPrice => "avg_ticket_price",
        }
    }
}

#[derive(Debug, clap::Args)]
struct ModelArgs {
    /// Modeling panel CSV (engagement metrics joined with outcomes).
    #[arg(long)]
    panel: PathBuf,
    /// Output directory (defaults to the configured data dir).
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Lag, in weeks, between predictor and outcome.
    #[arg(long, default_value_t = 4)]
    lag: usize,
    #[arg(long, value_enum, default_value_t = Outcome::Gross)]
    outcome: Outcome,
    /// Minimum complete observations per predictor (defaults from env).
    #[arg(long)]
    min_obs: Option<usize>,
    /// Also run the lag-sensitivity sweep.
    #[arg(long)]
    sensitivity: bool,
    /// Also run per-show Granger tests with Fisher combination.
    #[arg(long)]
    granger: bool,
    /// Validation report guarding this panel; defaults to
    /// validation_report.json under the data dir. Refused when ACTION_NEEDED.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Proceed even when the validation report says ACTION_NEEDED.
    #[arg(long)]
    allow_action_needed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Pull(args) => commands::pull::run(&config, &args).await,
        Commands::Panel(args) => commands::panel::run(&config, &args),
        Commands::Validate(args) => commands::validate::run(&config, &args),
        Commands::Model(args) => commands::model::run(&config, &args),
    }
}

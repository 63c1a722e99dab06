use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use solarscope_ai::AnalysisOrchestrator;
use solarscope_core::{
    AnalysisOutcome, AnalysisSource, ConfigManager, LoggingConfig, PaybackPeriod, RooftopImage,
    SolarReport,
};
use std::fmt;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

#[derive(Parser)]
#[command(
    name = "solarscope",
    version,
    about = "SolarScope - rooftop solar potential from a single image",
    long_about = "SolarScope asks a vision model to measure a rooftop, then estimates yearly energy production, cost after incentives and payback period."
)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(long, global = true, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Estimate solar potential for a rooftop image (placeholder data without one)")]
    Analyze {
        #[arg(help = "Rooftop image (png, jpg or jpeg)")]
        image: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "pretty", help = "Output format")]
        output: OutputFormat,

        #[arg(long, help = "Average daily insolation in kWh/m²/day")]
        insolation: Option<f64>,

        #[arg(long, help = "Vision model identifier")]
        model: Option<String>,
    },

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, help = "Where to write the file (default: ~/.solarscope/config.toml)")]
        path: Option<PathBuf>,

        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Show the effective configuration (API key redacted)")]
    Show {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            image,
            output,
            insolation,
            model,
        } => handle_analyze(cli.config, cli.verbose, image, output, insolation, model).await,
        Commands::Config { action } => handle_config(cli.config, cli.verbose, action),
    }
}

fn load_config(path: Option<&PathBuf>, verbose: bool) -> Result<ConfigManager> {
    let config_mgr =
        ConfigManager::load_with(path.map(|p| p.as_path())).context("Failed to load configuration")?;
    init_tracing(&config_mgr.config().logging, verbose);
    config_mgr.log_summary();
    Ok(config_mgr)
}

/// Logs go to stderr so `--output json` stays machine-readable.
fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let registry = Registry::default().with(filter);
    let result = match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)),
        ),
        "compact" => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)),
        ),
        _ => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr)),
        ),
    };
    result.ok();
}

async fn handle_analyze(
    config_path: Option<PathBuf>,
    verbose: bool,
    image_path: Option<PathBuf>,
    output: OutputFormat,
    insolation: Option<f64>,
    model: Option<String>,
) -> Result<()> {
    let config_mgr = load_config(config_path.as_ref(), verbose)?;
    let mut config = config_mgr.config().clone();

    if let Some(insolation) = insolation {
        if !(insolation.is_finite() && insolation > 0.0) {
            bail!("--insolation must be a positive number, got {}", insolation);
        }
        config.parameters.insolation = insolation;
    }
    if let Some(model) = model {
        config.inference.model = model;
    }

    let orchestrator = AnalysisOrchestrator::from_config(&config.inference)
        .context("Failed to create vision model client")?;

    let outcome = match image_path {
        None => orchestrator.analyze_with_source(None).await,
        Some(path) => match RooftopImage::from_path(&path) {
            Ok(image) => orchestrator.analyze_with_source(Some(&image)).await,
            Err(e) => {
                error!("Could not use image {}: {}", path.display(), e);
                AnalysisOutcome::placeholder(format!("image could not be read: {}", e))
            }
        },
    };

    let report = SolarReport::build(outcome, &config.parameters);

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Pretty => print!("{}", PrettyReport(&report)),
    }

    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, verbose: bool, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { path, force } => {
            let path = path
                .or(config_path)
                .or_else(ConfigManager::user_config_path)
                .unwrap_or_else(|| PathBuf::from(".solarscope.toml"));

            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }

            ConfigManager::create_default_config(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;

            println!("{} {}", "✓ Created config file:".green(), path.display());
            println!();
            println!("Next steps:");
            println!("1. Set OPENROUTER_API_KEY in your environment or a .env file");
            println!("2. Run 'solarscope config show' to verify your configuration");
            println!("3. Run 'solarscope analyze <image>' to estimate a rooftop");
        }
        ConfigAction::Show { json } => {
            let config_mgr = load_config(config_path.as_ref(), verbose)?;
            let mut config = config_mgr.config().clone();
            config.inference = config.inference.redacted();

            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", "Current Configuration:".blue().bold());
                match config_mgr.config_path() {
                    Some(path) => println!("  Config File: {}", path.display()),
                    None => println!("  Config File: {}", "none (defaults)".dimmed()),
                }
                println!("\n  {}", "Inference:".green().bold());
                println!("    Endpoint: {}", config.inference.base_url.yellow());
                println!("    Model: {}", config.inference.model.yellow());
                println!(
                    "    API Key: {}",
                    config.inference.api_key.as_deref().unwrap_or("not set")
                );
                println!("    Timeout: {}s", config.inference.timeout_secs);
                println!("    Max Retries: {}", config.inference.max_retries);

                let params = &config.parameters;
                println!("\n  {}", "Parameters:".green().bold());
                println!("    Panel Efficiency: {}", params.panel_efficiency);
                println!("    Insolation: {} kWh/m²/day", params.insolation);
                println!("    Cost per Watt: ${}", params.cost_per_watt);
                println!("    Incentive: {:.0}%", params.incentive_fraction * 100.0);
                println!("    Electricity Rate: ${}/kWh", params.electricity_rate);

                println!("\n  {}", "Logging:".green().bold());
                println!("    Level: {}", config.logging.level);
                println!("    Format: {}", config.logging.format);
            }
        }
    }

    Ok(())
}

/// Human-readable rendering of a report for the terminal.
struct PrettyReport<'a>(&'a SolarReport);

impl fmt::Display for PrettyReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        let analysis = &report.outcome.analysis;

        writeln!(f, "{}", "Solar Rooftop Analysis".cyan().bold())?;
        match &report.outcome.source {
            AnalysisSource::Model => writeln!(f, "Source: {}", "vision model".green())?,
            AnalysisSource::Placeholder { reason } => {
                writeln!(f, "Source: {} ({})", "placeholder data".yellow().bold(), reason)?;
                writeln!(
                    f,
                    "{}",
                    "Using placeholder data: 100m², south-facing, 10% shading.".yellow()
                )?;
            }
        }

        writeln!(f, "\n{}", "Rooftop Analysis".bold())?;
        writeln!(f, "  Area:         {} m²", analysis.area_m2)?;
        writeln!(
            f,
            "  Orientation:  {}° ({})",
            analysis.orientation_deg,
            compass_point(analysis.orientation_deg)
        )?;
        writeln!(f, "  Shading:      {}%", analysis.shading_percent)?;
        if analysis.obstructions.is_empty() {
            writeln!(f, "  Obstructions: none")?;
        } else {
            writeln!(f, "  Obstructions: {}", analysis.obstructions.join(", "))?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "{}: {} kWh",
            "Estimated Annual Energy Production".bold(),
            report.energy.annual_kwh
        )?;
        let cost_label = format!(
            "Estimated Cost (after {:.0}% incentive)",
            report.parameters.incentive_fraction * 100.0
        );
        writeln!(
            f,
            "{}: ${:.2}",
            cost_label.bold(),
            report.financials.cost_after_incentive
        )?;
        let payback = match report.financials.payback {
            PaybackPeriod::Years(_) => report.financials.payback.to_string().normal(),
            PaybackPeriod::NotApplicable => "not applicable".yellow(),
        };
        writeln!(f, "{}: {}", "Payback Period".bold(), payback)?;

        writeln!(f, "\n{}", "Installation Recommendations".bold())?;
        for item in &report.recommendations {
            writeln!(f, "  - {}: {}", item.label.bold(), item.detail)?;
        }
        Ok(())
    }
}

/// Eight-point compass name for an azimuth in degrees.
fn compass_point(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = [
        "north",
        "north-east",
        "east",
        "south-east",
        "south",
        "south-west",
        "west",
        "north-west",
    ];
    let index = ((degrees.rem_euclid(360.0) + 22.5) / 45.0).floor() as usize % POINTS.len();
    POINTS[index]
}

//! Load generator CLI for bbox query services.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use bbox_load::{LoadRunner, ResultsReport, RunLog, ScenarioConfig, PRESETS};

#[derive(Parser)]
#[command(name = "bbox-load")]
#[command(about = "Synthetic bounding-box query load generator", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "BBOX_LOAD_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a load test from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the service base URL
        #[arg(short, long)]
        url: Option<String>,

        /// Override the number of virtual users
        #[arg(short, long)]
        concurrency: Option<u32>,

        /// Override the run duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Override users hatched per second
        #[arg(long)]
        spawn_rate: Option<f64>,

        /// Stop each user after this many counted results
        #[arg(long)]
        iterations: Option<u64>,

        /// Override the result log path
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Hide the live progress spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Run a built-in scenario against a URL
    Quick {
        /// Preset name (featureserver, query-api)
        #[arg(short, long, default_value = "featureserver")]
        preset: String,

        /// Base URL
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,

        /// Number of virtual users
        #[arg(short, long, default_value = "10")]
        concurrency: u32,

        /// Run duration in seconds
        #[arg(short, long, default_value = "30")]
        duration: u64,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },

    /// Summarize a result log from a previous run
    Analyze {
        /// Path to the result log
        #[arg(short, long)]
        file: PathBuf,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Commands::Run {
            scenario,
            url,
            concurrency,
            duration,
            spawn_rate,
            iterations,
            log_file,
            output,
            no_progress,
        } => {
            eprintln!("Loading scenario: {}", scenario.display());

            let mut config = ScenarioConfig::from_file(&scenario)?;

            // Apply overrides
            if let Some(url) = url {
                config.base_url = url;
            }
            if let Some(c) = concurrency {
                config.target_concurrency = c;
            }
            if let Some(d) = duration {
                config.duration_secs = Some(d);
            }
            if let Some(rate) = spawn_rate {
                config.spawn_rate = Some(rate);
            }
            if let Some(n) = iterations {
                config.iterations_per_user = Some(n);
            }
            if let Some(path) = log_file {
                config.output.path = Some(path);
            }

            config.validate()?;
            print_config(&config);

            execute(config, &output, !no_progress).await
        }
        Commands::Quick {
            preset,
            url,
            concurrency,
            duration,
        } => {
            let Some(mut config) = ScenarioConfig::preset(&preset, &url) else {
                anyhow::bail!("Unknown preset '{}' (available: {})", preset, PRESETS.join(", "));
            };
            config.target_concurrency = concurrency;
            config.duration_secs = Some(duration);
            config.validate()?;

            eprintln!("Running quick test:");
            print_config(&config);

            execute(config, "table", true).await
        }
        Commands::List { dir } => {
            println!("Available scenarios in {}:", dir.display());
            println!();

            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("Error reading directory: {}", e);
                    eprintln!("Make sure the directory exists and is readable");
                    return Ok(());
                }
            };

            let mut scenarios = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) != Some("yaml") {
                    continue;
                }
                match ScenarioConfig::from_file(&path) {
                    Ok(config) => scenarios.push((
                        entry.file_name().to_string_lossy().to_string(),
                        config.name,
                        config.description,
                    )),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping scenario"),
                }
            }
            scenarios.sort_by(|a, b| a.0.cmp(&b.0));

            if scenarios.is_empty() {
                println!("No scenario files found");
            } else {
                for (filename, name, desc) in scenarios {
                    println!("  {} - {}", filename, name);
                    println!("    {}", desc);
                    println!();
                }
            }
            println!("Built-in presets: {}", PRESETS.join(", "));

            Ok(())
        }
        Commands::Analyze { file, output } => {
            let log = RunLog::read(&file)?;
            let analysis = log.analyze(file.display().to_string())?;
            match output.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&analysis)?),
                _ => println!("{}", ResultsReport::format_analysis(&analysis)),
            }
            Ok(())
        }
    }
}

async fn execute(config: ScenarioConfig, output: &str, progress: bool) -> anyhow::Result<()> {
    let runner = LoadRunner::new(config)?.with_progress(progress);
    let report = runner.run().await?;

    match output {
        "json" => {
            println!("{}", ResultsReport::format_json(&report)?);
        }
        "csv" => {
            println!("{}", ResultsReport::csv_header());
            println!("{}", ResultsReport::format_csv(&report));
        }
        _ => {
            println!("{}", ResultsReport::format_table(&report));
        }
    }

    Ok(())
}

// Goes to stderr so stdout carries only the report
fn print_config(config: &ScenarioConfig) {
    eprintln!("  Name: {}", config.name);
    if !config.description.is_empty() {
        eprintln!("  Description: {}", config.description);
    }
    eprintln!("  Endpoint: {}", config.endpoint_url());
    eprintln!("  Users: {}", config.target_concurrency);
    match config.duration_secs {
        Some(d) => eprintln!("  Duration: {}s", d),
        None => eprintln!("  Duration: until stopped (ctrl-c)"),
    }
    eprintln!();
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so reports on stdout stay machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

use chordfx::{ChordPipeline, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chord feature pipelines and estimation scoring
#[derive(Parser)]
#[command(name = "chordfx")]
#[command(about = "Score chord estimations and inspect pipeline configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a JSON file of chord estimations
    Score {
        /// Path to a JSON file of estimations
        estimation_file: PathBuf,

        /// Path for the resulting statistics as plaintext
        stats_file: PathBuf,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of ranked confusions per quality
        #[arg(long)]
        top_k: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            estimation_file,
            stats_file,
            config,
            top_k,
            verbose,
        } => {
            init_logging(verbose);

            let mut config = if let Some(config_path) = config {
                chordfx::config::load_config(config_path)?
            } else {
                Config::default()
            };
            if let Some(top_k) = top_k {
                config.scoring.top_k = top_k;
            }

            let pipeline = ChordPipeline::new(config)?;
            if let Some(stats) = pipeline.score_file(&estimation_file, &stats_file)? {
                println!("\n\n{}\n{}", estimation_file.display(), stats);
            }
        }
        Commands::ValidateConfig { config } => {
            init_logging(false);
            let config = chordfx::config::load_config(config)?;
            println!("Configuration is valid");
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        Commands::ShowConfig => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}

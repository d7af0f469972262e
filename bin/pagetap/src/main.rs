mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pagetap")]
#[command(about = "Relay runtime console output to AI coding agents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the capture server
    Start {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8090)]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Output format (json|text|structured)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file path for mirrored events
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to the event log file
        #[arg(short = 'l', long)]
        log_file: Option<PathBuf>,

        /// Allowed CORS origin
        #[arg(long)]
        cors_origin: Option<String>,

        /// Authentication token for the API and the persistent channel
        #[arg(long)]
        token: Option<String>,

        /// Watch mode: mirror each captured event as it arrives
        #[arg(short, long)]
        watch: bool,
    },

    /// Render the currently captured events
    Capture {
        /// Output format (json|text|structured)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file path (stdout if not given)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to the event log file
        #[arg(short = 'l', long)]
        log_file: Option<PathBuf>,
    },

    /// Print the summary document for an AI agent
    AgentInfo {
        /// Target agent (cursor|claude|copilot|windsurfer)
        #[arg(short, long, default_value = "cursor")]
        agent: String,

        /// Path to the event log file
        #[arg(short = 'l', long)]
        log_file: Option<PathBuf>,
    },

    /// Clear stored events
    Clear {
        /// Path to the event log file
        #[arg(short = 'l', long)]
        log_file: Option<PathBuf>,
    },

    /// Relay stdin lines to the capture server as console events
    Relay {
        /// Level to record lines at (log|warn|error|info|debug)
        #[arg(long, default_value = "log")]
        level: String,

        /// Origin tag attached to relayed events
        #[arg(long, default_value = "simulator")]
        source: String,
    },

    /// Show whether a capture server is running
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Start {
            port,
            host,
            format,
            output,
            log_file,
            cors_origin,
            token,
            watch,
        } => {
            let options = pagetap_core::ServerOptions {
                port,
                host,
                format,
                output_file: output,
                watch,
                log_file,
                cors_origin,
                auth_token: token,
            };
            commands::start::run(options).await?;
        }
        Commands::Capture {
            format,
            output,
            log_file,
        } => {
            commands::capture::run(&format, output, log_file).await?;
        }
        Commands::AgentInfo { agent, log_file } => {
            commands::agent_info::run(&agent, log_file).await?;
        }
        Commands::Clear { log_file } => {
            commands::clear::run(log_file).await?;
        }
        Commands::Relay { level, source } => {
            commands::relay::run(&level, &source).await?;
        }
        Commands::Status => {
            commands::status::run().await?;
        }
    }

    Ok(())
}

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use restwise_core::config::get_data_dir;
use restwise_storage::BreakType;
use std::path::PathBuf;

use commands::daemon::{run_daemon_process, show_status, start_daemon, stop_daemon};
use commands::report::ReportFormat;

#[derive(Parser)]
#[command(name = "restwise")]
#[command(about = "Fatigue monitoring and break enforcement daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize restwise (first-time setup)
    Init {
        /// Start the daemon on login
        #[arg(long)]
        autostart: bool,
    },
    /// Start the monitoring daemon
    Start,
    /// (Internal) Run the daemon process
    #[command(hide = true)]
    DaemonInternalStart,
    /// Stop the monitoring daemon
    Stop,
    /// Show activity, fatigue and break status
    Status {
        /// Print the raw status snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Schedule a break
    Break {
        /// Break length in seconds (defaults to the configured length for the type)
        #[arg(short, long)]
        duration: Option<u64>,
        /// Break type: micro, regular, long, personalized
        #[arg(short = 't', long = "type", default_value = "micro")]
        break_type: BreakType,
        /// Countdown in seconds before the break is enforced
        #[arg(short, long)]
        lead: Option<u64>,
        /// Lock the screen while the break runs
        #[arg(long)]
        lock: bool,
        /// Mute keyboard and mouse while the break runs (Linux/X11 via xinput; unsupported elsewhere)
        #[arg(long)]
        mute: bool,
    },
    /// Cancel the scheduled or running break
    Cancel,
    /// Suggest a break activity for the current fatigue level
    Recommend {
        /// Minutes available for the break
        #[arg(short, long)]
        minutes: Option<u32>,
    },
    /// Break compliance report and export
    Report {
        /// Number of days to cover
        #[arg(short, long, default_value_t = 7)]
        days: u32,
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        format: ReportFormat,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
        /// Write to this path instead of the data directory
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the effective configuration
    Show {
        /// Read this file instead of the default location
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::DaemonInternalStart) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .format_timestamp_secs()
            .init();
    }

    let data_dir = get_data_dir()?;

    match cli.command {
        Commands::Init { autostart } => commands::init::init_command(&data_dir, autostart).await,
        Commands::Start => start_daemon(&data_dir),
        Commands::DaemonInternalStart => run_daemon_process().await,
        Commands::Stop => stop_daemon(&data_dir).await,
        Commands::Status { json } => show_status(&data_dir, json).await,
        Commands::Break {
            duration,
            break_type,
            lead,
            lock,
            mute,
        } => {
            let options = commands::breaks::BreakOptions {
                duration,
                break_type,
                lead,
                lock,
                mute,
            };
            commands::breaks::request_break(&data_dir, options).await
        }
        Commands::Cancel => commands::breaks::cancel_break(&data_dir).await,
        Commands::Recommend { minutes } => commands::breaks::recommend(&data_dir, minutes).await,
        Commands::Report {
            days,
            format,
            output,
        } => commands::report::handle_report_command(days, format, output.as_deref()),
        Commands::Config { action } => match action {
            ConfigAction::Init { force, path } => {
                commands::config::handle_config_init(path.as_deref(), force)
            }
            ConfigAction::Show { path } => commands::config::handle_config_show(path.as_deref()),
        },
    }
}

/// Daemon lifecycle management commands
use anyhow::{Context, Result};
use restwise_core::{
    config::{get_data_dir, Config},
    ipc::{IpcClient, IpcRequest, IpcResponse, SOCKET_NAME},
    Daemon, StatusSnapshot,
};
use restwise_storage::Database;
use std::fmt::Write as _;
use std::{env, fs, io, path::Path, process::Command, thread::sleep, time};
use sysinfo::{Pid, System};

use super::helpers::{format_duration, label, percent};

const PID_FILE: &str = "restwise.pid";
const LOG_FILE: &str = "restwise.log";

pub fn start_daemon(data_dir: &Path) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    let sock_path = data_dir.join(SOCKET_NAME);

    if pid_file_path.exists() {
        if let Some(pid) = read_pid(&pid_file_path) {
            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                log::info!("Daemon is already running (PID: {pid}).");
                return Ok(());
            }
        }
        log::warn!("Removing stale PID file.");
        let _ = fs::remove_file(&pid_file_path);
    }

    if sock_path.exists() {
        log::warn!("Removing stale socket file.");
        fs::remove_file(&sock_path)?;
    }

    // Refuse to spawn a daemon that would exit on a bad config
    let config = Config::load(None)?;
    config.validate()?;

    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    log::info!("Starting restwise daemon...");

    let current_exe = env::current_exe()?;
    let current_dir = env::current_dir()?;
    let child = Command::new(current_exe)
        .arg("daemon-internal-start")
        .current_dir(current_dir)
        .spawn()?;

    log::info!("Daemon process started with PID: {}", child.id());
    fs::write(&pid_file_path, child.id().to_string())?;

    Ok(())
}

pub async fn run_daemon_process() -> Result<()> {
    if let Err(e) = setup_daemon_logging() {
        eprintln!("Failed to set up daemon logging: {e:#}");
        return Err(e);
    }
    log::info!("Daemon process started internally.");

    if let Err(e) = daemon_main_logic().await {
        log::error!("Daemon main logic exited with a fatal error: {e:#}");
        return Err(e);
    }

    Ok(())
}

async fn daemon_main_logic() -> Result<()> {
    let config = Config::load(None)?;
    let db = Database::new(None)?;
    let daemon = Daemon::new(config, db)?;
    daemon.run_with_signals().await
}

pub async fn stop_daemon(data_dir: &Path) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    let sock_path = data_dir.join(SOCKET_NAME);

    if !pid_file_path.exists() {
        log::info!("Daemon is not running (no PID file).");
        if sock_path.exists() {
            fs::remove_file(&sock_path)?;
        }
        return Ok(());
    }

    let pid = fs::read_to_string(&pid_file_path)?
        .trim()
        .parse::<usize>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    log::info!("Stopping restwise daemon (PID: {pid})...");
    let client = IpcClient::new(&sock_path);

    match client.send_command(IpcRequest::Shutdown).await {
        Ok(IpcResponse::Shutdown) => {
            log::info!("Daemon shutdown signal sent. Waiting for process to exit...");
            sleep(time::Duration::from_secs(2));

            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                log::warn!("Daemon did not stop gracefully. Force killing...");
                if let Some(process) = sys.process(Pid::from(pid)) {
                    process.kill();
                }
            } else {
                log::info!("Daemon stopped successfully.");
            }
        }
        Ok(resp) => log::error!("Received unexpected response from daemon: {resp:?}"),
        Err(e) => {
            log::error!("Failed to send shutdown command: {e}. Forcing cleanup.");
            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                if let Some(process) = sys.process(Pid::from(pid)) {
                    process.kill();
                    log::info!("Process killed.");
                }
            }
        }
    }

    fs::remove_file(&pid_file_path)?;
    if sock_path.exists() {
        fs::remove_file(&sock_path)?;
    }

    Ok(())
}

pub async fn show_status(data_dir: &Path, json: bool) -> Result<()> {
    let sock_path = data_dir.join(SOCKET_NAME);

    if !sock_path.exists() {
        println!("Daemon Status: Not running");
        return Ok(());
    }

    let client = IpcClient::new(&sock_path);
    match client.send_command(IpcRequest::Status).await {
        Ok(IpcResponse::Status(status)) if json => {
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Ok(IpcResponse::Status(status)) => print_status(&status),
        Ok(IpcResponse::Error(message)) => anyhow::bail!("Daemon error: {message}"),
        Ok(_) => anyhow::bail!("Unexpected response from daemon"),
        Err(e) => {
            log::error!("Failed to get status: {e}");
            println!("Daemon Status: Not running (or not responding)");
        }
    }
    Ok(())
}

fn print_status(status: &StatusSnapshot) {
    print!("{}", render_status(status));
}

fn render_status(status: &StatusSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Daemon Status: {}",
        if status.running { "Running" } else { "Stopped" }
    );

    let _ = writeln!(out, "\nActivity ({}):", status.tracker_mode);
    let _ = writeln!(out, "  Idle: {:.0}s", status.activity.idle_seconds);
    let _ = writeln!(
        out,
        "  Clicks: {}  Keys: {}  Total: {}  Level: {:.0}%",
        status.activity.mouse_clicks,
        status.activity.key_presses,
        status.activity.total_events(),
        status.activity.activity_level
    );
    if status.dropped_events > 0 {
        let _ = writeln!(out, "  Dropped events: {}", status.dropped_events);
    }

    let fatigue = &status.fatigue;
    let _ = writeln!(out, "\nFatigue ({}):", status.fatigue_level);
    let _ = writeln!(out, "  Score: {}", percent(fatigue.fatigue_score));
    let _ = writeln!(out, "  Eye strain: {:.0}/100", fatigue.eye_strain_level);
    let _ = writeln!(out, "  Posture: {:.0}/100", fatigue.posture_score);
    let _ = writeln!(out, "  Blink rate: {:.1}/min", fatigue.blink_rate);
    let _ = writeln!(
        out,
        "  Expression: {}  Trend: {}  Source: {}",
        label(&fatigue.facial_expression),
        label(&fatigue.trend),
        label(&fatigue.source)
    );

    let session = &status.break_session;
    let _ = writeln!(
        out,
        "\nBreak: {} ({})",
        session.state,
        session.state.description()
    );
    if !session.is_idle() {
        let _ = writeln!(out, "  Type: {} ({})", session.break_type, session.trigger);
        let _ = writeln!(
            out,
            "  Progress: {} of {}",
            format_duration(session.elapsed),
            format_duration(session.requested)
        );
    }

    if status.advisor_enabled {
        let advisor = &status.advisor;
        let _ = writeln!(
            out,
            "\nAdvisor: {} calls, {} usable, {} timeouts, {} unavailable",
            advisor.calls,
            advisor.well_formed + advisor.partial,
            advisor.timeouts,
            advisor.unavailable
        );
    } else {
        let _ = writeln!(out, "\nAdvisor: disabled");
    }
    out
}

fn read_pid(pid_file_path: &Path) -> Option<usize> {
    fs::read_to_string(pid_file_path)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
}

fn setup_daemon_logging() -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = get_data_dir()?.join(LOG_FILE);

    if let Some(parent) = log_path.parent() {
        create_dir_all(parent)?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Debug)
        .init();

    Ok(())
}

//! First-time setup: database, configuration file, permissions and auto-start

use anyhow::{Context, Result};
use restwise_ai::{AdvisorConfig, LlmAdvisor};
use restwise_core::config::{default_config_path, Config};
use restwise_storage::Database;
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::config::write_default_config;

/// Initialize restwise with complete setup
///
/// # Errors
///
/// Returns an error if the data directory, database or configuration file cannot be created
pub async fn init_command(data_dir: &Path, autostart: bool) -> Result<()> {
    println!("Initializing restwise...\n");

    println!("Step 1/4: Database Setup");
    println!("{}", "-".repeat(40));
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;
    let db = Database::new(None)?;
    drop(db);
    println!("Database ready.");

    println!("\nStep 2/4: Configuration");
    println!("{}", "-".repeat(40));
    let config_path = default_config_path()?;
    if write_default_config(&config_path, false)? {
        println!("Wrote defaults to {}", config_path.display());
    } else {
        println!("Keeping existing {}", config_path.display());
    }
    let config = Config::load(Some(&config_path))?;
    config.validate()?;
    if config.advisor.enabled {
        println!("{}", check_advisor(&config.advisor).await);
    } else {
        println!("AI advisor disabled, heuristics only.");
    }

    println!("\nStep 3/4: System Permissions");
    println!("{}", "-".repeat(40));
    show_permission_guidance();

    println!("\nStep 4/4: Auto-start Configuration");
    println!("{}", "-".repeat(40));
    if autostart {
        if let Err(e) = setup_autostart(data_dir) {
            println!("Warning: Could not configure auto-start: {e}");
            println!("You can start restwise manually with: restwise start");
        }
    } else {
        println!("Skipped. Run 'restwise init --autostart' to start on login.");
    }

    println!("\n========================================");
    println!("  Setup Complete!");
    println!("========================================");
    println!("\nStart monitoring with: restwise start");

    Ok(())
}

/// One-line verdict on whether the configured advisor backend answers
async fn check_advisor(config: &AdvisorConfig) -> String {
    let advisor = match LlmAdvisor::from_config(config) {
        Ok(advisor) => advisor,
        Err(e) => return format!("Warning: AI advisor unusable, heuristics only: {e:#}"),
    };
    let reachable = tokio::time::timeout(Duration::from_secs(5), advisor.is_available()).await;
    if matches!(reachable, Ok(true)) {
        format!("AI advisor reachable ({} via {}).", advisor.model_name(), config.provider)
    } else {
        format!(
            "Warning: AI advisor {} via {} is not reachable; heuristics will be used until it is.",
            advisor.model_name(),
            config.provider
        )
    }
}

fn show_permission_guidance() {
    #[cfg(target_os = "macos")]
    {
        println!("restwise needs Accessibility permission to lock the screen");
        println!("and Input Monitoring permission to count keyboard and mouse events.");
        println!();
        println!("Please grant permission:");
        println!("  1. Open System Settings > Privacy & Security");
        println!("  2. Add your terminal app under Accessibility and Input Monitoring");
    }

    #[cfg(target_os = "linux")]
    {
        println!("Input events are read from /dev/input/event*.");
        println!("Add yourself to the input group if activity stays idle-only:");
        println!("  sudo usermod -aG input $USER");
        println!("Screen locking uses loginctl lock-session.");
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        println!("Platform-specific permissions may be required.");
    }
}

#[cfg(target_os = "macos")]
fn setup_autostart(data_dir: &Path) -> Result<()> {
    use std::process::Command;

    let exe_path = std::env::current_exe().context("Failed to get executable path")?;
    let home_dir = dirs::home_dir().context("Failed to get home directory")?;

    let launch_agents_dir = home_dir.join("Library/LaunchAgents");
    let plist_path = launch_agents_dir.join("dev.rikai.restwise.plist");
    fs::create_dir_all(&launch_agents_dir)?;

    if plist_path.exists() {
        let _ = Command::new("launchctl")
            .arg("unload")
            .arg(&plist_path)
            .output();
    }

    fs::write(&plist_path, macos_plist(&exe_path, data_dir))?;
    println!("Created: {}", plist_path.display());

    let output = Command::new("launchctl")
        .arg("load")
        .arg(&plist_path)
        .output()?;
    if output.status.success() {
        println!("Auto-start enabled. restwise will start on login.");
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        println!("Warning: launchctl load failed: {stderr}");
    }

    Ok(())
}

#[cfg(target_os = "macos")]
fn macos_plist(exe_path: &Path, data_dir: &Path) -> String {
    let err_log_path = data_dir.join("restwise.err.log");

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>dev.rikai.restwise</string>
    <key>ProgramArguments</key>
    <array>
        <string>{}</string>
        <string>daemon-internal-start</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <dict>
        <key>SuccessfulExit</key>
        <false/>
    </dict>
    <key>StandardErrorPath</key>
    <string>{}</string>
</dict>
</plist>
"#,
        exe_path.display(),
        err_log_path.display()
    )
}

#[cfg(target_os = "linux")]
fn setup_autostart(_data_dir: &Path) -> Result<()> {
    use std::process::Command;

    let exe_path = std::env::current_exe().context("Failed to get executable path")?;
    let home_dir = dirs::home_dir().context("Failed to get home directory")?;

    let systemd_dir = home_dir.join(".config/systemd/user");
    let service_path = systemd_dir.join("restwise.service");
    fs::create_dir_all(&systemd_dir)?;

    fs::write(&service_path, systemd_unit(&exe_path))?;
    println!("Created: {}", service_path.display());

    for args in [
        &["--user", "daemon-reload"][..],
        &["--user", "enable", "restwise.service"],
        &["--user", "start", "restwise.service"],
    ] {
        let _ = Command::new("systemctl").args(args).output();
    }

    println!("Auto-start enabled. restwise will start on login.");
    Ok(())
}

#[cfg(target_os = "linux")]
fn systemd_unit(exe_path: &Path) -> String {
    format!(
        r"[Unit]
Description=restwise fatigue monitor
After=graphical-session.target

[Service]
Type=simple
ExecStart={} daemon-internal-start
Restart=on-failure
RestartSec=5

[Install]
WantedBy=default.target
",
        exe_path.display()
    )
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn setup_autostart(_data_dir: &Path) -> Result<()> {
    println!("Auto-start not supported on this platform.");
    println!("Please start restwise manually with: restwise start");
    Ok(())
}

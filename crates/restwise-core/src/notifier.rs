use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::NotificationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Fire-and-forget user notifications. Implementations must not block and
/// must swallow their own failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Writes notifications to the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => log::info!("{message}"),
            Severity::Warning | Severity::Critical => log::warn!("{message}"),
        }
    }
}

/// Shows notifications through the desktop notification service
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(message: &str, severity: Severity) -> Option<Command> {
        #[cfg(target_os = "linux")]
        {
            let urgency = match severity {
                Severity::Info => "low",
                Severity::Warning => "normal",
                Severity::Critical => "critical",
            };
            let mut cmd = Command::new("notify-send");
            cmd.args(["-a", "restwise", "-u", urgency, "restwise", message]);
            Some(cmd)
        }

        #[cfg(target_os = "macos")]
        {
            let _ = severity;
            let script = format!(
                "display notification \"{}\" with title \"restwise\"",
                escape_applescript(message)
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", &script]);
            Some(cmd)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = (message, severity);
            None
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        LogNotifier.notify(message, severity);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let Some(mut cmd) = Self::command(message, severity) else {
            return;
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let _enter = handle.enter();
        match cmd.spawn() {
            Ok(mut child) => {
                handle.spawn(async move {
                    if let Err(e) = child.wait().await {
                        log::debug!("Notification process failed: {e}");
                    }
                });
            }
            Err(e) => log::debug!("Desktop notification unavailable: {e}"),
        }
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(message: &str) -> String {
    message.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build the notifier selected by configuration
#[must_use]
pub fn create_notifier(config: &NotificationConfig) -> Box<dyn Notifier> {
    if config.enabled && config.desktop {
        Box::new(DesktopNotifier)
    } else {
        Box::new(LogNotifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \ now"#), r#"say \"hi\" \\ now"#);
    }

    #[test]
    fn test_notify_outside_runtime_does_not_panic() {
        DesktopNotifier.notify("break finished", Severity::Info);
        LogNotifier.notify("fatigue high", Severity::Critical);
    }

    #[test]
    fn test_create_notifier_honours_config() {
        let quiet = NotificationConfig {
            enabled: true,
            desktop: false,
        };
        create_notifier(&quiet).notify("log only", Severity::Warning);
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}

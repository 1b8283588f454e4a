/// Break control and recommendation command handlers
use anyhow::Result;
use restwise_ai::{Recommendation, RecommendationSource};
use restwise_core::{
    config::Config,
    ipc::{IpcClient, IpcRequest, IpcResponse, SOCKET_NAME},
};
use restwise_storage::{BreakType, ComplianceRecord};
use std::path::Path;

use super::helpers::{default_break_secs, format_duration, percent};

#[derive(Debug)]
pub struct BreakOptions {
    pub duration: Option<u64>,
    pub break_type: BreakType,
    pub lead: Option<u64>,
    pub lock: bool,
    pub mute: bool,
}

impl BreakOptions {
    /// Resolve unset flags against the configuration
    fn into_request(self, config: &Config) -> IpcRequest {
        IpcRequest::RequestBreak {
            duration_secs: self
                .duration
                .unwrap_or_else(|| default_break_secs(&config.breaks, self.break_type)),
            break_type: self.break_type,
            lead_secs: self.lead,
            lock_screen: self.lock || config.breaks.lock_screen,
            mute_input: self.mute || config.breaks.mute_input,
        }
    }
}

pub async fn request_break(data_dir: &Path, options: BreakOptions) -> Result<()> {
    let config = Config::load(None)?;
    let request = options.into_request(&config);

    match send(data_dir, request).await? {
        IpcResponse::BreakScheduled(session) => {
            println!(
                "Scheduled a {} break of {}.",
                session.break_type,
                format_duration(session.requested)
            );
            if let Some(starts_at) = session.starts_at {
                println!(
                    "Enforcement starts at {}.",
                    starts_at.with_timezone(&chrono::Local).format("%H:%M:%S")
                );
            }
            if session.lock_screen || session.mute_input {
                println!(
                    "Screen lock: {}  Input mute: {}",
                    on_off(session.lock_screen),
                    on_off(session.mute_input)
                );
            }
            Ok(())
        }
        IpcResponse::Error(message) => anyhow::bail!("Break rejected: {message}"),
        other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
    }
}

pub async fn cancel_break(data_dir: &Path) -> Result<()> {
    match send(data_dir, IpcRequest::CancelBreak).await? {
        IpcResponse::BreakCancelled(Some(record)) => {
            print_cancelled(&record);
            Ok(())
        }
        IpcResponse::BreakCancelled(None) => {
            println!("Scheduled break cancelled before it started.");
            Ok(())
        }
        IpcResponse::Error(message) => anyhow::bail!("Nothing to cancel: {message}"),
        other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
    }
}

pub async fn recommend(data_dir: &Path, minutes: Option<u32>) -> Result<()> {
    match send(
        data_dir,
        IpcRequest::Recommend {
            available_minutes: minutes,
        },
    )
    .await?
    {
        IpcResponse::Recommendation(recommendation) => {
            print_recommendation(&recommendation);
            Ok(())
        }
        IpcResponse::Error(message) => anyhow::bail!("Daemon error: {message}"),
        other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
    }
}

async fn send(data_dir: &Path, request: IpcRequest) -> Result<IpcResponse> {
    let sock_path = data_dir.join(SOCKET_NAME);
    if !sock_path.exists() {
        anyhow::bail!("Daemon is not running. Start it with: restwise start");
    }
    IpcClient::new(&sock_path).send_command(request).await
}

fn print_cancelled(record: &ComplianceRecord) {
    println!(
        "Break cancelled after {} of {} ({} complete).",
        format_duration(record.elapsed),
        format_duration(record.requested),
        percent(record.completion_ratio())
    );
    for failure in &record.guard_failures {
        println!("  Guard failure: {failure}");
    }
}

fn print_recommendation(recommendation: &Recommendation) {
    let source = match recommendation.source {
        RecommendationSource::Advisor => "advisor",
        RecommendationSource::Catalog => "catalog",
    };
    println!("{} ({source})", recommendation.activity);
    println!(
        "  {} to {} minutes, {} intensity, {}% effective",
        recommendation.duration_min,
        recommendation.duration_max,
        recommendation.intensity,
        recommendation.effectiveness
    );
    if !recommendation.reason.is_empty() {
        println!("  Why: {}", recommendation.reason);
    }
    if !recommendation.benefits.is_empty() {
        println!("  Benefits: {}", recommendation.benefits);
    }
    for (i, step) in recommendation.steps.iter().enumerate() {
        println!("  {}. {step}", i + 1);
    }
    println!(
        "\nStart it with: restwise break --duration {}",
        u64::from(recommendation.duration_min) * 60
    );
}

const fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(break_type: BreakType) -> BreakOptions {
        BreakOptions {
            duration: None,
            break_type,
            lead: None,
            lock: false,
            mute: false,
        }
    }

    #[test]
    fn test_request_uses_configured_length() {
        let config = Config::default();
        let request = options(BreakType::Long).into_request(&config);
        assert_eq!(
            request,
            IpcRequest::RequestBreak {
                duration_secs: config.breaks.long_secs,
                break_type: BreakType::Long,
                lead_secs: None,
                lock_screen: false,
                mute_input: false,
            }
        );
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.breaks.mute_input = true;
        let request = BreakOptions {
            duration: Some(42),
            lead: Some(0),
            lock: true,
            ..options(BreakType::Micro)
        }
        .into_request(&config);
        assert_eq!(
            request,
            IpcRequest::RequestBreak {
                duration_secs: 42,
                break_type: BreakType::Micro,
                lead_secs: Some(0),
                lock_screen: true,
                mute_input: true,
            }
        );
    }

    #[tokio::test]
    async fn test_send_requires_running_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let err = send(dir.path(), IpcRequest::Status).await.unwrap_err();
        assert!(err.to_string().contains("not running"));
    }
}

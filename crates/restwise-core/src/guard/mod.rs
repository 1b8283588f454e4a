use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;

use crate::error::CoreError;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "windows")]
pub mod windows;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardAction {
    Lock,
    Unlock,
    MuteInput,
    Restore,
}

impl std::fmt::Display for GuardAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lock => write!(f, "lock"),
            Self::Unlock => write!(f, "unlock"),
            Self::MuteInput => write!(f, "mute_input"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

/// OS-level actions taken while a break is enforced
#[async_trait]
pub trait ScreenGuard: Send + Sync {
    /// # Errors
    ///
    /// Returns `CoreError::GuardActionFailed` if the screen could not be locked.
    async fn lock(&self) -> Result<(), CoreError>;

    /// # Errors
    ///
    /// Returns `CoreError::GuardActionFailed` if the screen could not be unlocked.
    async fn unlock(&self) -> Result<(), CoreError>;

    /// # Errors
    ///
    /// Returns `CoreError::GuardActionFailed` if input could not be muted.
    async fn mute_input(&self) -> Result<(), CoreError>;

    /// Undo whatever lock or mute is active. A no-op when nothing is.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::GuardActionFailed` if an active action could not be undone.
    async fn restore(&self) -> Result<(), CoreError>;
}

/// Guard used when OS actions are disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGuard;

#[async_trait]
impl ScreenGuard for NoopGuard {
    async fn lock(&self) -> Result<(), CoreError> {
        log::debug!("Screen lock skipped, OS actions disabled");
        Ok(())
    }

    async fn unlock(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn mute_input(&self) -> Result<(), CoreError> {
        log::debug!("Input mute skipped, OS actions disabled");
        Ok(())
    }

    async fn restore(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// One external program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl GuardCommand {
    #[must_use]
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Commands backing each guard action; `None` means unsupported on this platform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTable {
    pub lock: Option<GuardCommand>,
    pub unlock: Option<GuardCommand>,
    pub mute: Option<GuardCommand>,
    pub unmute: Option<GuardCommand>,
}

/// Guard that shells out to the platform's session tools
pub struct CommandGuard {
    table: CommandTable,
    locked: AtomicBool,
    muted: AtomicBool,
}

impl CommandGuard {
    #[must_use]
    pub fn new(table: CommandTable) -> Self {
        Self {
            table,
            locked: AtomicBool::new(false),
            muted: AtomicBool::new(false),
        }
    }

    async fn run(command: Option<&GuardCommand>, action: GuardAction) -> Result<(), CoreError> {
        let Some(command) = command else {
            return Err(CoreError::GuardActionFailed {
                action,
                reason: "not supported on this platform".to_string(),
            });
        };

        let status = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CoreError::GuardActionFailed {
                action,
                reason: format!("{}: {e}", command.program),
            })?;

        if status.success() {
            log::debug!("Guard action {action} via {}", command.program);
            Ok(())
        } else {
            Err(CoreError::GuardActionFailed {
                action,
                reason: format!("{} exited with {status}", command.program),
            })
        }
    }
}

#[async_trait]
impl ScreenGuard for CommandGuard {
    async fn lock(&self) -> Result<(), CoreError> {
        Self::run(self.table.lock.as_ref(), GuardAction::Lock).await?;
        self.locked.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn unlock(&self) -> Result<(), CoreError> {
        Self::run(self.table.unlock.as_ref(), GuardAction::Unlock).await?;
        self.locked.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn mute_input(&self) -> Result<(), CoreError> {
        Self::run(self.table.mute.as_ref(), GuardAction::MuteInput).await?;
        self.muted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn restore(&self) -> Result<(), CoreError> {
        let mut result = Ok(());

        if self.muted.swap(false, Ordering::SeqCst) {
            if let Err(e) = Self::run(self.table.unmute.as_ref(), GuardAction::Restore).await {
                result = Err(e);
            }
        }
        // A lock without an unlock command is left for the user to dismiss
        if self.locked.swap(false, Ordering::SeqCst) && self.table.unlock.is_some() {
            if let Err(e) = Self::run(self.table.unlock.as_ref(), GuardAction::Restore).await {
                result = Err(e);
            }
        }
        result
    }
}

/// Create the guard for the current platform
#[must_use]
pub fn create_guard(os_actions: bool) -> Arc<dyn ScreenGuard> {
    if !os_actions {
        return Arc::new(NoopGuard);
    }

    #[cfg(target_os = "macos")]
    {
        Arc::new(CommandGuard::new(macos::command_table()))
    }

    #[cfg(target_os = "linux")]
    {
        Arc::new(CommandGuard::new(linux::command_table()))
    }

    #[cfg(target_os = "windows")]
    {
        Arc::new(CommandGuard::new(windows::command_table()))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Arc::new(CommandGuard::new(CommandTable::default()))
    }
}

use super::{CommandTable, GuardCommand};

/// Workstation lock only; input muting is unsupported
#[must_use]
pub fn command_table() -> CommandTable {
    CommandTable {
        lock: Some(GuardCommand::new(
            "rundll32.exe",
            &["user32.dll,LockWorkStation"],
        )),
        unlock: None,
        mute: None,
        unmute: None,
    }
}

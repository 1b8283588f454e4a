use super::{CommandTable, GuardCommand};

/// Sleeping the display locks it when "require password" is set. There is no
/// unlock counterpart, so restore leaves the lock screen up. Input muting is
/// unsupported.
#[must_use]
pub fn command_table() -> CommandTable {
    CommandTable {
        lock: Some(GuardCommand::new("pmset", &["displaysleepnow"])),
        unlock: None,
        mute: None,
        unmute: None,
    }
}

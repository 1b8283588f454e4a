use super::{CommandTable, GuardCommand};

/// Disable every X input slave device. Master devices refuse and are skipped.
const XINPUT_DISABLE: &str = "command -v xinput >/dev/null || exit 127; \
     for id in $(xinput list --id-only); do xinput disable \"$id\" 2>/dev/null; done; exit 0";

const XINPUT_ENABLE: &str = "command -v xinput >/dev/null || exit 127; \
     for id in $(xinput list --id-only); do xinput enable \"$id\" 2>/dev/null; done; exit 0";

/// logind session locking and `xinput` device muting (X11 sessions only)
#[must_use]
pub fn command_table() -> CommandTable {
    CommandTable {
        lock: Some(GuardCommand::new("loginctl", &["lock-session"])),
        unlock: Some(GuardCommand::new("loginctl", &["unlock-session"])),
        mute: Some(GuardCommand::new("sh", &["-c", XINPUT_DISABLE])),
        unmute: Some(GuardCommand::new("sh", &["-c", XINPUT_ENABLE])),
    }
}

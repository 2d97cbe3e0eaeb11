//! Best-effort terminal window resolution.
//!
//! When click-to-focus is enabled, SessionStart events try to resolve
//! the terminal hosting the assistant process by walking the process
//! parent chain until a known terminal emulator shows up. Resolution is
//! purely an enrichment: any failure just leaves the session without a
//! window reference.

use sysinfo::{Pid, System};
use tracing::debug;

use notch_core::TerminalWindow;

/// Process names (lowercased) treated as terminal emulators.
const TERMINAL_PROCESS_NAMES: &[&str] = &[
    "gnome-terminal",
    "konsole",
    "xterm",
    "alacritty",
    "kitty",
    "wezterm",
    "foot",
    "tilix",
    "terminator",
    "urxvt",
    "ptyxis",
    "windowsterminal",
    "iterm",
    "terminal",
];

/// How far up the parent chain to look before giving up.
const MAX_PARENT_HOPS: usize = 16;

/// Resolves the terminal window hosting `pid`, if one can be found.
pub fn find_window_for_pid(pid: u32) -> Option<TerminalWindow> {
    let system = System::new_all();
    find_in_system(&system, pid)
}

fn find_in_system(system: &System, pid: u32) -> Option<TerminalWindow> {
    let mut current = Pid::from_u32(pid);

    for _ in 0..MAX_PARENT_HOPS {
        let process = match system.process(current) {
            Some(process) => process,
            None => {
                debug!(pid = current.as_u32(), "process vanished during walk");
                return None;
            }
        };

        let name = process.name().to_string_lossy().to_lowercase();
        if TERMINAL_PROCESS_NAMES.iter().any(|t| name.contains(t)) {
            debug!(pid = current.as_u32(), name, "terminal process found");
            return Some(TerminalWindow::new(current.as_u32() as u64));
        }

        current = process.parent()?;
    }

    debug!(pid, "no terminal found within parent walk limit");
    None
}

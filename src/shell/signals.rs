use log::warn;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Pid};

/// Keyboard signals must reach foreground children through terminal
/// foreground-group delivery, not kill the shell itself. SIGTTOU/SIGTTIN
/// are ignored so tcsetpgrp from a non-foreground shell does not stop us.
pub fn setup_shell_signals() {
    let ignored = [
        Signal::SIGINT,
        Signal::SIGQUIT,
        Signal::SIGTSTP,
        Signal::SIGTTOU,
        Signal::SIGTTIN,
    ];
    for sig in ignored {
        if let Err(e) = unsafe { signal::signal(sig, SigHandler::SigIgn) } {
            warn!("failed to ignore {}: {}", sig, e);
        }
    }
}

/// Hands the controlling terminal's foreground process group to `pgid`.
/// A no-op without a controlling terminal (scripts, tests).
pub fn give_terminal_to(pgid: Pid) {
    let _ = unistd::tcsetpgrp(std::io::stdin(), pgid);
}

/// Takes the terminal back after a foreground job finishes or stops.
pub fn reclaim_terminal() {
    give_terminal_to(unistd::getpgrp());
}

pub fn stdin_is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

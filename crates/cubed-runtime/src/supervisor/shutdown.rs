//! Termination signalling and exit status mapping.

use std::io;
use std::process::ExitStatus;

#[cfg(unix)]
use tracing::debug;

/// Ask the process to terminate politely (SIGTERM).
///
/// A target that is already gone counts as success; stop paths race the
/// child's own exit all the time and that is not an error.
#[cfg(unix)]
pub(crate) fn signal_terminate(pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pid, "termination signal target already gone");
            Ok(())
        }
        Err(e) => Err(io::Error::from_raw_os_error(e as i32)),
    }
}

/// There is no polite termination signal on this platform; callers fall
/// through to the forced kill path.
#[cfg(not(unix))]
pub(crate) fn signal_terminate(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no graceful termination signal on this platform",
    ))
}

/// Whether a process with this pid currently exists.
#[cfg(unix)]
#[must_use]
pub fn process_exists(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Collapse an exit status to one code: the real exit code when present,
/// `128 + signal` for signal deaths on unix, `-1` when neither is known.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

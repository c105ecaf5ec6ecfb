#![allow(dead_code)]
use anyhow::Result;
use log::warn;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;

// Cross-platform signal handling
#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Cancellation flag shared by every pipeline thread. Clones observe the
/// same flag. Once set it never clears for the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Signal that triggered cancellation, 0 while none arrived.
static TERMINATION_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// The signal behind a cancelled run, for exit code selection.
pub fn termination_signal() -> Option<i32> {
    match TERMINATION_SIGNAL.load(Ordering::Relaxed) {
        0 => None,
        sig => Some(sig),
    }
}

/// Exit code for a run interrupted by the given signal.
pub fn signal_exit_code(signal: i32) -> ExitCode {
    #[cfg(unix)]
    if signal == SIGTERM {
        return ExitCode::SignalTerm;
    }
    #[cfg(windows)]
    let _ = signal;
    ExitCode::SignalInt
}

/// Background thread that routes process signals into a [`CancelToken`].
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    /// The first SIGINT or SIGTERM requests a graceful drain through the
    /// cancel token; a repeat exits immediately.
    pub fn install(cancel: CancelToken) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGTERM])?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    TERMINATION_SIGNAL.store(sig, Ordering::Relaxed);
                    shutdown_count += 1;
                    if shutdown_count > 1 {
                        match sig {
                            SIGTERM => ExitCode::SignalTerm.exit(),
                            _ => ExitCode::SignalInt.exit(),
                        }
                    }
                    warn!(
                        "received signal {}, draining in-flight records (repeat to exit now)",
                        sig
                    );
                    cancel.cancel();
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            // Windows signal handling using flag-based approach
            let term_flag = Arc::new(AtomicBool::new(false));
            flag::register(SIGINT, Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || {
                let mut fired = false;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        TERMINATION_SIGNAL.store(SIGINT, Ordering::Relaxed);
                        if fired {
                            ExitCode::SignalInt.exit();
                        }
                        fired = true;
                        warn!("received interrupt, draining in-flight records (repeat to exit now)");
                        cancel.cancel();
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }
}

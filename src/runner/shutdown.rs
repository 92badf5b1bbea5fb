//! Shutdown flag set from signal handlers.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

type Installed = std::result::Result<Shutdown, String>;

static HANDLERS: OnceLock<Installed> = OnceLock::new();
static INTERRUPTED_CODE: AtomicI32 = AtomicI32::new(130);

/// Cooperative shutdown request shared with the entry function.
///
/// `request` only asks workers to stop. A termination signal also marks the
/// flag as signalled, which is what turns a run into `Interrupted`.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    signalled: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Whether a termination signal arrived since the last reset.
    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }

    /// Ask the entry function's workers to stop.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Record a termination signal. Returns whether one was already pending.
    pub(crate) fn signal(&self) -> bool {
        let pending = self.signalled.swap(true, Ordering::SeqCst);
        self.request();
        pending
    }

    pub(crate) fn reset(&self) {
        self.requested.store(false, Ordering::SeqCst);
        self.signalled.store(false, Ordering::SeqCst);
    }

    /// Block until shutdown is requested or `timeout` elapses.
    ///
    /// Returns whether shutdown was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_requested() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
        true
    }
}

/// Install SIGINT, SIGTERM and SIGHUP handlers once per process.
///
/// The first signal marks the returned flag as signalled. A second signal
/// while it is pending exits with the `interrupted_code` of the most recent
/// call. A failed install is reported again on every call.
pub(crate) fn install_signal_handlers(interrupted_code: i32) -> Result<Shutdown> {
    INTERRUPTED_CODE.store(interrupted_code, Ordering::SeqCst);
    install_once(&HANDLERS, |shutdown| {
        ctrlc::set_handler(move || {
            if shutdown.signal() {
                std::process::exit(INTERRUPTED_CODE.load(Ordering::SeqCst));
            }
        })
    })
}

fn install_once<F>(cell: &OnceLock<Installed>, install: F) -> Result<Shutdown>
where
    F: FnOnce(Shutdown) -> std::result::Result<(), ctrlc::Error>,
{
    cell.get_or_init(|| {
        let shutdown = Shutdown::new();
        install(shutdown.clone()).map_err(|e| e.to_string())?;
        debug!("Signal handlers installed");
        Ok(shutdown)
    })
    .clone()
    .map_err(Error::Signal)
}

//! Process lifecycle around an application entry function.

use std::any::Any;
use std::ffi::OsString;
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::shutdown::{install_signal_handlers, Shutdown};
use super::timer::format_run_time;
use crate::args::{ArgumentResolver, Args};
use crate::error::Error;
use crate::logger::{self, LogSettings};

/// Lifecycle state of an [`AppRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Interrupted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Interrupted
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Process exit codes used by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes {
    pub success: i32,
    pub failure: i32,
    pub interrupted: i32,
}

impl Default for ExitCodes {
    fn default() -> Self {
        Self {
            success: 0,
            failure: 1,
            interrupted: 130,
        }
    }
}

/// Value returned by an entry function, turned into a process exit code.
pub trait ExitValue {
    fn into_exit_code(self, codes: &ExitCodes) -> i32;
}

impl ExitValue for () {
    fn into_exit_code(self, codes: &ExitCodes) -> i32 {
        codes.success
    }
}

impl ExitValue for i32 {
    fn into_exit_code(self, _codes: &ExitCodes) -> i32 {
        self
    }
}

impl ExitValue for u8 {
    fn into_exit_code(self, _codes: &ExitCodes) -> i32 {
        i32::from(self)
    }
}

impl ExitValue for bool {
    fn into_exit_code(self, codes: &ExitCodes) -> i32 {
        if self {
            codes.success
        } else {
            codes.failure
        }
    }
}

/// Final state and exit code of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub state: RunState,
    pub exit_code: i32,
}

impl RunOutcome {
    /// Terminate the process with this outcome's exit code.
    pub fn exit(self) -> ! {
        let _ = std::io::stdout().flush();
        std::process::exit(self.exit_code)
    }
}

/// Runs an entry function inside signal handling and an error boundary.
///
/// ```no_run
/// use apputil::{AppRunner, Args};
///
/// AppRunner::new("tool")
///     .run(&Args::new(), |_args, shutdown| {
///         let stopped = shutdown.wait_timeout(std::time::Duration::from_secs(5));
///         Ok(!stopped)
///     })
///     .exit();
/// ```
#[derive(Debug)]
pub struct AppRunner {
    name: String,
    exit_codes: ExitCodes,
    timer: bool,
    state: RunState,
}

impl AppRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exit_codes: ExitCodes::default(),
            timer: true,
            state: RunState::Idle,
        }
    }

    pub fn with_exit_codes(mut self, exit_codes: ExitCodes) -> Self {
        self.exit_codes = exit_codes;
        self
    }

    /// Skip the total run time log line.
    pub fn without_timer(mut self) -> Self {
        self.timer = false;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        debug!(app = %self.name, from = %self.state, to = %next, "Run state change");
        self.state = next;
    }

    fn finish(&mut self, state: RunState, exit_code: i32) -> RunOutcome {
        self.transition(state);
        RunOutcome { state, exit_code }
    }

    /// Call `entry` and map its result to an exit code.
    ///
    /// Errors and panics escaping `entry` become the failure code. A
    /// termination signal received while running overrides the entry's
    /// result with the interrupted code.
    pub fn run<T, F>(mut self, args: &Args, entry: F) -> RunOutcome
    where
        T: ExitValue,
        F: FnOnce(&Args, &Shutdown) -> anyhow::Result<T>,
    {
        let shutdown = match install_signal_handlers(self.exit_codes.interrupted) {
            Ok(shutdown) => shutdown,
            Err(e) => {
                warn!(error = %e, "Continuing without signal handlers");
                Shutdown::new()
            }
        };

        shutdown.reset();
        self.transition(RunState::Running);
        let started = Instant::now();

        // Panics are logged below; keep the default hook's trace off stderr.
        let hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        let result = panic::catch_unwind(AssertUnwindSafe(|| entry(args, &shutdown)));
        panic::set_hook(hook);

        let (mut state, mut exit_code) = match result {
            Ok(Ok(value)) => (RunState::Completed, value.into_exit_code(&self.exit_codes)),
            Ok(Err(err)) => {
                log_failure(&err);
                (RunState::Failed, self.exit_codes.failure)
            }
            Err(payload) => {
                error!("Unexpected error: panic: {}", panic_message(payload.as_ref()));
                (RunState::Failed, self.exit_codes.failure)
            }
        };

        if shutdown.is_signalled() {
            warn!("Aborted by user");
            state = RunState::Interrupted;
            exit_code = self.exit_codes.interrupted;
        }

        if self.timer {
            info!("{} total run time {}", self.name, format_run_time(started.elapsed()));
        }

        self.finish(state, exit_code)
    }

    /// Parse the process command line, set up logging, and run `entry`.
    pub fn run_cli<T, F>(self, resolver: &ArgumentResolver<'_>, entry: F) -> RunOutcome
    where
        T: ExitValue,
        F: FnOnce(&Args, &Shutdown) -> anyhow::Result<T>,
    {
        self.run_cli_from(resolver, std::env::args_os(), entry)
    }

    /// Like [`run_cli`](Self::run_cli) with an explicit argument vector.
    pub fn run_cli_from<I, A, T, F>(
        mut self,
        resolver: &ArgumentResolver<'_>,
        argv: I,
        entry: F,
    ) -> RunOutcome
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString> + Clone,
        T: ExitValue,
        F: FnOnce(&Args, &Shutdown) -> anyhow::Result<T>,
    {
        let matches = match resolver.matches_from(argv) {
            Ok(matches) => matches,
            Err(err) => {
                let _ = err.print();
                let exit_code = err.exit_code();
                let state = if exit_code == 0 {
                    RunState::Completed
                } else {
                    RunState::Failed
                };
                return self.finish(state, exit_code);
            }
        };

        let verbosity = ArgumentResolver::debug_level(&matches);
        let mut settings = LogSettings::new(self.name.clone(), verbosity);
        match resolver.config().get_or::<Option<PathBuf>>("log_dir", None) {
            Ok(Some(dir)) => settings = settings.log_dir(dir),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring log_dir setting"),
        }
        if let Err(e) = logger::init(&settings) {
            debug!(error = %e, "Logging already initialized");
        }

        let args = match resolver.resolve(&matches) {
            Ok(args) => args,
            Err(e) => {
                log_error(&e);
                let failure = self.exit_codes.failure;
                return self.finish(RunState::Failed, failure);
            }
        };

        self.run(&args, entry)
    }
}

fn log_error(err: &Error) {
    let validation = err.validation_errors();
    if validation.is_empty() {
        error!("{err}");
    } else {
        for failure in validation {
            error!("{failure}");
        }
    }
}

fn log_failure(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(e) if !e.validation_errors().is_empty() => log_error(e),
        _ => error!("Unexpected error: {err:#}"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ArgumentSpec;
    use crate::config::{ConfigLayer, MapEnv};
    use crate::error::ValidationError;
    use crate::validate::TypeSpec;
    use serde_json::json;
    use serial_test::serial;
    use std::time::Duration;

    fn runner() -> AppRunner {
        AppRunner::new("apputil-test").without_timer()
    }

    #[test]
    #[serial]
    fn test_error_maps_to_failure() {
        let outcome = runner().run(&Args::new(), |_, _| -> anyhow::Result<()> {
            anyhow::bail!("boom")
        });
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.exit_code, 1);
    }

    #[test]
    #[serial]
    fn test_validation_error_maps_to_failure() {
        let outcome = runner().run(&Args::new(), |_, _| -> anyhow::Result<()> {
            let err = ValidationError::new("count", "int", "abc is not a valid integer");
            Err(Error::Validation(err).into())
        });
        assert_eq!(outcome.exit_code, 1);
    }

    #[test]
    #[serial]
    fn test_panic_maps_to_failure() {
        let outcome = runner().run(&Args::new(), |_, _| -> anyhow::Result<()> {
            panic!("entry blew up")
        });
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.exit_code, 1);
    }

    #[test]
    #[serial]
    fn test_panic_hook_silenced_during_entry_and_restored() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

        panic::set_hook(Box::new(|_| {
            HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
        }));
        let outcome = runner().run(&Args::new(), |_, _| -> anyhow::Result<()> {
            panic!("entry blew up")
        });
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(HOOK_CALLS.load(Ordering::SeqCst), 0);

        let _ = panic::catch_unwind(|| panic!("after the run"));
        assert_eq!(HOOK_CALLS.load(Ordering::SeqCst), 1);
        let _ = panic::take_hook();
    }

    #[test]
    #[serial]
    fn test_exit_values() {
        assert_eq!(runner().run(&Args::new(), |_, _| Ok(())).exit_code, 0);
        assert_eq!(runner().run(&Args::new(), |_, _| Ok(5)).exit_code, 5);
        assert_eq!(runner().run(&Args::new(), |_, _| Ok(7u8)).exit_code, 7);
        assert_eq!(runner().run(&Args::new(), |_, _| Ok(true)).exit_code, 0);

        let outcome = runner().run(&Args::new(), |_, _| Ok(false));
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.exit_code, 1);
    }

    #[test]
    #[serial]
    fn test_request_without_signal_completes() {
        let outcome = runner().run(&Args::new(), |_, shutdown| {
            shutdown.request();
            Ok(())
        });
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    #[serial]
    fn test_signal_interrupts() {
        let outcome = runner().run(&Args::new(), |_, shutdown| {
            // what the installed handler does on SIGINT/SIGTERM
            shutdown.signal();
            Ok(shutdown.wait_timeout(Duration::from_secs(5)))
        });
        assert_eq!(outcome.state, RunState::Interrupted);
        assert_eq!(outcome.exit_code, 130);

        // the flag is cleared for the next run
        let outcome = runner().run(&Args::new(), |_, shutdown| Ok(!shutdown.is_requested()));
        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.exit_code, 0);
    }

    #[test]
    #[serial]
    fn test_custom_exit_codes() {
        let codes = ExitCodes {
            success: 0,
            failure: 3,
            interrupted: 4,
        };
        let outcome = runner()
            .with_exit_codes(codes)
            .run(&Args::new(), |_, _| -> anyhow::Result<()> { anyhow::bail!("no") });
        assert_eq!(outcome.exit_code, 3);

        let outcome = runner().with_exit_codes(codes).run(&Args::new(), |_, shutdown| {
            shutdown.signal();
            Ok(())
        });
        assert_eq!(outcome.exit_code, 4);
    }

    #[test]
    #[serial]
    fn test_run_cli_from_paths() {
        let config = ConfigLayer::new("apputil-test")
            .env_source(MapEnv::new())
            .search_dirs(Vec::new())
            .user_file("/nonexistent/apputil/userconfig.yml")
            .defaults(&json!({ "count": 1 }))
            .unwrap()
            .build()
            .unwrap();
        let resolver = ArgumentResolver::new("apputil-test", &config)
            .arg(ArgumentSpec::new("count", TypeSpec::positive_nonzero_integer()));

        let argv = ["apputil-test", "--count", "4"];
        let outcome =
            runner().run_cli_from(&resolver, argv, |args, _| Ok(args.get_i64("count") == Some(4)));
        assert_eq!(outcome.exit_code, 0);

        let argv = ["apputil-test", "--count", "0"];
        let outcome = runner().run_cli_from(&resolver, argv, |_, _| Ok(()));
        assert_eq!(outcome.state, RunState::Failed);
        assert_eq!(outcome.exit_code, 1);

        let argv = ["apputil-test", "--bogus"];
        let outcome = runner().run_cli_from(&resolver, argv, |_, _| Ok(()));
        assert_eq!(outcome.exit_code, 2);
    }

    #[test]
    fn test_states() {
        assert!(!RunState::Idle.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Interrupted.is_terminal());
        assert_eq!(runner().state(), RunState::Idle);
        assert_eq!(RunState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}

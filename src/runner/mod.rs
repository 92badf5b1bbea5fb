//! Application lifecycle: signal handling, error boundary, exit codes.

mod lifecycle;
mod shutdown;
mod timer;

pub use lifecycle::{AppRunner, ExitCodes, ExitValue, RunOutcome, RunState};
pub use shutdown::Shutdown;
pub use timer::format_run_time;

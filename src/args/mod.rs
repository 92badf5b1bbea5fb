//! Command-line arguments with configuration-derived defaults.

mod resolver;
mod spec;
mod values;

pub use resolver::ArgumentResolver;
pub use spec::{ArgKind, ArgumentSpec};
pub use values::Args;

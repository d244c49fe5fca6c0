//! Subcommand implementations.

mod check;
mod resolve;

pub use check::Check;
pub use resolve::Resolve;

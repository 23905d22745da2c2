//! minnow — a small interactive pipeline shell.
//!
//! A line of input becomes a [`Pipeline`] of commands connected by pipes,
//! optionally bounded by file redirection, run in the foreground or the
//! background. Terminated children are reclaimed asynchronously by a
//! signal-driven reaper and reported before the next prompt.

pub mod builtin;
pub mod command;
pub mod exec;
pub mod lexer;
pub mod parser;
pub mod reaper;

pub use command::{Command, OutputRedirect, Pipeline};
pub use exec::Executor;

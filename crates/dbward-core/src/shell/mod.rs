//! Shell command plumbing
//!
//! Every command line the workspace runs is a single string handed to
//! `sh -c`. Builders interpolate values only through [`escape`], and anything
//! that reaches a log passes through [`redact`] first.

mod escape;
mod executor;
mod process;
mod redaction;

pub use escape::{escape, escape_path};
pub use executor::{MAX_LOGGED_OUTPUT, ShellExecutor};
pub use process::ProcessGroupGuard;
pub use redaction::redact;

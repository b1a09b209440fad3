//! CLI command implementations for seqpipe.
//!
//! Each submodule implements one subcommand on top of the pipeline library.
//!
//! - [`sqrt_sum`] - Sum square roots of `1..=N` across worker threads
//! - [`lines`] - Apply a text operation to every line of a file
//! - [`runs`] - Collapse runs of related lines into one output line per run

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value
)]

pub mod command;
pub mod common;
pub mod lines;
pub mod runs;
pub mod sqrt_sum;

//! Integration tests for the seqpipe library and CLI.
//!
//! These tests exercise the public pipeline entry points end to end, across thread
//! counts, and the command-line tool built on top of them.

mod helpers;
mod test_failures;
mod test_scenarios;

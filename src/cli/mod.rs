//! CLI module for feedpull - command-line interface and subcommands.
//!
//! The binary is a thin demo over the library: pull a URL once or a bounded
//! number of times through the rate-limited queue, or print the effective config.

pub mod commands;

pub use commands::Cli;

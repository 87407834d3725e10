//! CLI subcommand implementations.

pub mod import;
pub mod push;
pub mod report;

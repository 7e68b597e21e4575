//! CLI subcommand implementations

pub mod analyze;
pub mod show_config;
pub mod summarize;

//! CLI subcommand implementations for the pagesnap binary.

pub mod archive_cmd;
pub mod doctor;
pub mod output;

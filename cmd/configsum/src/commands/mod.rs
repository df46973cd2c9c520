//! Subcommand implementations.

pub mod init;
pub mod render;
pub mod validate;

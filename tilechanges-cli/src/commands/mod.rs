//! CLI subcommands.

pub mod changes;
pub mod checkpoint;
pub mod collection;
pub mod common;
pub mod config;

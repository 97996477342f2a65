//! Command implementations

pub mod config;
pub mod create;
pub mod version;
